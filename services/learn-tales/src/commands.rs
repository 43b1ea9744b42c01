use learn_tales_core::content::OptionLetter;
use learn_tales_core::error::ValidationError;
use learn_tales_core::request::{ClassGrade, Language, Subject};
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  read            Read Aloud, or pause/resume while reading
  restart         Read the story again from the start
  quiz            Start the quiz
  answer <A-D>    Answer the current question
  next            Go to the next question
  topic <text>    Change the topic
  language <name> Change the language
  class <1-7>     Change the class
  subject <name>  Change the subject
  generate        Create a story for the current form
  status          Show the form and the current page
  help            Show this help
  quit            Exit";

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read,
    Restart,
    Quiz,
    Answer(OptionLetter),
    Next,
    Topic(String),
    Language(Language),
    Class(ClassGrade),
    Subject(Subject),
    Generate,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for the list")]
    Unknown(String),
    #[error("'{0}' needs a value")]
    MissingArgument(&'static str),
    #[error("'{0}' is not an option, choose A, B, C or D")]
    InvalidOption(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, argument) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let required = |command: &'static str| {
            if argument.is_empty() {
                Err(CommandError::MissingArgument(command))
            } else {
                Ok(argument)
            }
        };

        match name.to_lowercase().as_str() {
            "read" | "pause" | "resume" => Ok(Command::Read),
            "restart" => Ok(Command::Restart),
            "quiz" => Ok(Command::Quiz),
            "answer" => {
                let choice = required("answer")?;
                OptionLetter::try_from(choice.to_string())
                    .map(Command::Answer)
                    .map_err(|_| CommandError::InvalidOption(choice.to_string()))
            }
            "next" => Ok(Command::Next),
            // An empty topic is allowed here; it only disables generate.
            "topic" => Ok(Command::Topic(argument.to_string())),
            "language" => Ok(Command::Language(required("language")?.parse()?)),
            "class" => Ok(Command::Class(required("class")?.parse()?)),
            "subject" => Ok(Command::Subject(required("subject")?.parse()?)),
            "generate" => Ok(Command::Generate),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(name.to_string())),
        }
    }
}
