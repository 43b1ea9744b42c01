use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer letter for one of the four options of a quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    /// `0 -> A` through `3 -> D`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_char(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<String> for OptionLetter {
    type Error = String;

    // The model sometimes answers "b" or "B." instead of "B".
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim().trim_end_matches(['.', ')']);
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => match c.to_ascii_uppercase() {
                'A' => Ok(OptionLetter::A),
                'B' => Ok(OptionLetter::B),
                'C' => Ok(OptionLetter::C),
                'D' => Ok(OptionLetter::D),
                _ => Err(format!("'{value}' is not an option letter A-D")),
            },
            _ => Err(format!("'{value}' is not an option letter A-D")),
        }
    }
}

impl From<OptionLetter> for String {
    fn from(letter: OptionLetter) -> Self {
        letter.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_option: OptionLetter,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringModel {
    pub class_level: String,
    pub subject: String,
    pub topic: String,
    pub expected_quiz_score: i64,
    pub difficulty: String,
    pub tags: Vec<String>,
}

/// Everything generated for one request: story, quiz, takeaways, metadata
/// and the prompt for the illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPayload {
    #[serde(rename = "story")]
    pub narrative: String,
    #[serde(rename = "quiz")]
    pub quiz_items: Vec<QuizItem>,
    pub takeaways: Vec<String>,
    #[serde(rename = "scoringModel")]
    pub metadata: ScoringModel,
    pub image_prompt: String,
}

impl ContentPayload {
    /// Parses the JSON text produced by the content service.
    ///
    /// Models occasionally wrap their JSON in a markdown code fence even when
    /// asked for raw JSON, so a surrounding ```json block is stripped first.
    pub fn from_json(text: &str) -> Result<Self, GenerationError> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err(GenerationError::Empty);
        }
        let payload: ContentPayload = serde_json::from_str(body)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Checks that every quiz item has exactly four options.
    pub fn validate(&self) -> Result<(), GenerationError> {
        for (index, item) in self.quiz_items.iter().enumerate() {
            if item.options.len() != OptionLetter::ALL.len() {
                return Err(GenerationError::Malformed(format!(
                    "quiz question {} has {} options, expected 4",
                    index + 1,
                    item.options.len()
                )));
            }
        }
        Ok(())
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// A generated illustration.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn quiz_item(prompt: &str, correct: OptionLetter) -> QuizItem {
        QuizItem {
            prompt: prompt.to_string(),
            options: vec![
                "Sunlight".to_string(),
                "Moonlight".to_string(),
                "Soil".to_string(),
                "Wind".to_string(),
            ],
            correct_option: correct,
            explanation: format!("{correct} is right."),
        }
    }

    /// A Class 4 science payload with a three sentence story and five questions.
    pub fn photosynthesis() -> ContentPayload {
        ContentPayload {
            narrative: "Leafy the plant woke up hungry. The sun smiled and shared its light! \
                        Did Leafy make sugar from sunshine?"
                .to_string(),
            quiz_items: vec![
                quiz_item("What does Leafy need?", OptionLetter::A),
                quiz_item("What gas do plants take in?", OptionLetter::B),
                quiz_item("Where is food made?", OptionLetter::C),
                quiz_item("What colour is chlorophyll?", OptionLetter::D),
                quiz_item("What do plants release?", OptionLetter::A),
            ],
            takeaways: vec![
                "Plants make food from sunlight 🌞".to_string(),
                "Leaves are little kitchens 🍃".to_string(),
                "Plants give us oxygen 💨".to_string(),
            ],
            metadata: ScoringModel {
                class_level: "Class 4".to_string(),
                subject: "Science".to_string(),
                topic: "Photosynthesis".to_string(),
                expected_quiz_score: 4,
                difficulty: "easy".to_string(),
                tags: vec!["plants".to_string(), "sunlight".to_string()],
            },
            image_prompt: "A smiling green plant under a bright sun, children's book style"
                .to_string(),
        }
    }
}
