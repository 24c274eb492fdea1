use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static RATING_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*on a scale (?:of|from) 1\s*[-–]\s*5")
        .expect("rating prefix pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText,
    YesNo,
    Rating,
}

impl QuestionKind {
    /// Resolves the kind a question text implies when none was given explicitly.
    pub fn infer(text: &str) -> Self {
        if RATING_PREFIX.is_match(text) {
            Self::Rating
        } else if text.trim_start().to_lowercase().starts_with("did") {
            Self::YesNo
        } else {
            Self::FreeText
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreeText => "free_text",
            Self::YesNo => "yes_no",
            Self::Rating => "rating",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered question with its answer kind fixed at registration time.
///
/// Stored as a bare string when the kind matches what the text implies, and as
/// `{ "text": ..., "kind": ... }` when the kind was set explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredQuestion", into = "StoredQuestion")]
pub struct Question {
    pub text: String,
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = QuestionKind::infer(&text);
        Self { text, kind }
    }

    pub fn with_kind(text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    fn trimmed(self) -> Self {
        Self {
            text: self.text.trim().to_string(),
            kind: self.kind,
        }
    }

    pub(crate) fn normalized(self) -> Option<Self> {
        let question = self.trimmed();
        (!question.text.is_empty()).then_some(question)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredQuestion {
    Plain(String),
    Tagged {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<QuestionKind>,
    },
}

impl From<StoredQuestion> for Question {
    fn from(value: StoredQuestion) -> Self {
        match value {
            StoredQuestion::Plain(text) => Question::new(text),
            StoredQuestion::Tagged {
                text,
                kind: Some(kind),
            } => Question::with_kind(text, kind),
            StoredQuestion::Tagged { text, kind: None } => Question::new(text),
        }
    }
}

impl From<Question> for StoredQuestion {
    fn from(value: Question) -> Self {
        if QuestionKind::infer(&value.text) == value.kind {
            StoredQuestion::Plain(value.text)
        } else {
            StoredQuestion::Tagged {
                text: value.text,
                kind: Some(value.kind),
            }
        }
    }
}
