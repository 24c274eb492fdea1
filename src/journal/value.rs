use crate::error::{JournalError, Result};
use crate::registry::question::QuestionKind;
use serde::Serialize;
use std::fmt;

pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// One cell of the journal table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Integer(i64),
    Text(String),
}

impl CellValue {
    /// Interprets a raw CSV cell.
    ///
    /// Only canonical integers (`to_string` gives back the same text) are
    /// read as `Integer`, so `"0700"` or `"+3"` stay text.
    pub fn from_cell(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Empty;
        }

        raw.parse::<i64>()
            .ok()
            .filter(|number| number.to_string() == raw)
            .map_or_else(|| Self::Text(raw.to_string()), Self::Integer)
    }

    pub fn to_cell(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Integer(number) => number.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(number) => Some(*number),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cell())
    }
}

/// Applies the answer rules of `kind` to a raw form value.
///
/// An `Err` means the value was rejected; callers store `CellValue::Empty`
/// in its place and report the issue instead of failing the submission.
pub fn coerce(kind: QuestionKind, raw: &str) -> Result<CellValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(CellValue::Empty);
    }

    match kind {
        QuestionKind::FreeText => Ok(CellValue::Text(trimmed.to_string())),
        QuestionKind::YesNo => match trimmed {
            "1" => Ok(CellValue::Integer(1)),
            "0" => Ok(CellValue::Integer(0)),
            _ => Err(JournalError::InvalidInput(format!(
                "expected 1 or 0, got {trimmed:?}"
            ))),
        },
        QuestionKind::Rating => trimmed
            .chars()
            .all(|character| character.is_ascii_digit())
            .then(|| trimmed.parse::<i64>().ok())
            .flatten()
            .filter(|rating| RATING_RANGE.contains(rating))
            .map(CellValue::Integer)
            .ok_or_else(|| {
                JournalError::InvalidInput(format!(
                    "expected a rating from 1 to 5, got {trimmed:?}"
                ))
            }),
    }
}
