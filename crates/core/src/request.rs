use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// A school grade between Class 1 and Class 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassGrade(u8);

impl ClassGrade {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 7;

    pub fn new(grade: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&grade) {
            Ok(Self(grade))
        } else {
            Err(ValidationError::UnknownClass(grade.to_string()))
        }
    }

    pub fn grade(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = ClassGrade> {
        (Self::MIN..=Self::MAX).map(ClassGrade)
    }
}

impl Default for ClassGrade {
    fn default() -> Self {
        Self(4)
    }
}

impl fmt::Display for ClassGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class {}", self.0)
    }
}

impl FromStr for ClassGrade {
    type Err = ValidationError;

    /// Accepts both `4` and `Class 4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("Class")
            .or_else(|| trimmed.strip_prefix("class"))
            .unwrap_or(trimmed)
            .trim();
        digits
            .parse::<u8>()
            .map_err(|_| ValidationError::UnknownClass(s.to_string()))
            .and_then(|grade| {
                Self::new(grade).map_err(|_| ValidationError::UnknownClass(s.to_string()))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Subject {
    #[default]
    Science,
    Mathematics,
    English,
    SocialStudies,
    History,
    Geography,
    GeneralKnowledge,
}

impl Subject {
    pub const ALL: [Subject; 7] = [
        Subject::Science,
        Subject::Mathematics,
        Subject::English,
        Subject::SocialStudies,
        Subject::History,
        Subject::Geography,
        Subject::GeneralKnowledge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Subject::Science => "Science",
            Subject::Mathematics => "Mathematics",
            Subject::English => "English",
            Subject::SocialStudies => "Social Studies",
            Subject::History => "History",
            Subject::Geography => "Geography",
            Subject::GeneralKnowledge => "General Knowledge",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subject {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|subject| subject.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownSubject(s.to_string()))
    }
}

/// The languages a story can be generated in.
///
/// Each language carries the locale tag the speech engine uses to pick a
/// voice for narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    Bengali,
    #[default]
    English,
    Gujarati,
    Hindi,
    Kannada,
    Malayalam,
    Marathi,
    Nepali,
    Odia,
    Punjabi,
    Sindhi,
    Tamil,
    Telugu,
    Urdu,
}

impl Language {
    pub const ALL: [Language; 14] = [
        Language::Bengali,
        Language::English,
        Language::Gujarati,
        Language::Hindi,
        Language::Kannada,
        Language::Malayalam,
        Language::Marathi,
        Language::Nepali,
        Language::Odia,
        Language::Punjabi,
        Language::Sindhi,
        Language::Tamil,
        Language::Telugu,
        Language::Urdu,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::Bengali => "Bengali",
            Language::English => "English",
            Language::Gujarati => "Gujarati",
            Language::Hindi => "Hindi",
            Language::Kannada => "Kannada",
            Language::Malayalam => "Malayalam",
            Language::Marathi => "Marathi",
            Language::Nepali => "Nepali",
            Language::Odia => "Odia (Oriya)",
            Language::Punjabi => "Punjabi",
            Language::Sindhi => "Sindhi",
            Language::Tamil => "Tamil",
            Language::Telugu => "Telugu",
            Language::Urdu => "Urdu",
        }
    }

    /// Locale tag used for voice lookup, e.g. `hi-IN` for Hindi.
    pub fn voice_tag(self) -> &'static str {
        match self {
            Language::Bengali => "bn-IN",
            Language::English => "en-US",
            Language::Gujarati => "gu-IN",
            Language::Hindi => "hi-IN",
            Language::Kannada => "kn-IN",
            Language::Malayalam => "ml-IN",
            Language::Marathi => "mr-IN",
            Language::Nepali => "ne-NP",
            Language::Odia => "or-IN",
            Language::Punjabi => "pa-IN",
            Language::Sindhi => "sd-IN",
            Language::Tamil => "ta-IN",
            Language::Telugu => "te-IN",
            Language::Urdu => "ur-IN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("odia") || wanted.eq_ignore_ascii_case("oriya") {
            return Ok(Language::Odia);
        }
        Self::ALL
            .into_iter()
            .find(|language| language.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownLanguage(s.to_string()))
    }
}

/// A validated request for one story, quiz and illustration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningRequest {
    pub class_grade: ClassGrade,
    pub subject: Subject,
    pub topic: String,
    pub language: Language,
}

impl LearningRequest {
    pub fn new(
        class_grade: ClassGrade,
        subject: Subject,
        topic: &str,
        language: Language,
    ) -> Result<Self, ValidationError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        Ok(Self {
            class_grade,
            subject,
            topic: topic.to_string(),
            language,
        })
    }
}

/// The editable inputs in front of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningForm {
    pub class_grade: ClassGrade,
    pub subject: Subject,
    pub topic: String,
    pub language: Language,
}

impl Default for LearningForm {
    fn default() -> Self {
        Self {
            class_grade: ClassGrade::default(),
            subject: Subject::default(),
            topic: "Photosynthesis".to_string(),
            language: Language::default(),
        }
    }
}

impl LearningForm {
    /// Whether the submit action is enabled.
    pub fn can_submit(&self, is_loading: bool) -> bool {
        !is_loading && !self.topic.trim().is_empty()
    }

    pub fn to_request(&self) -> Result<LearningRequest, ValidationError> {
        LearningRequest::new(self.class_grade, self.subject, &self.topic, self.language)
    }
}
