use thiserror::Error;

use crate::model::ParseIdError;
use crate::region::RegionError;

/// Validation failures raised by the domain layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error("question count must be a positive number, got {raw:?}")]
    InvalidQuestionCount { raw: String },
}

/// Parse a user-entered question count.
///
/// # Errors
///
/// Returns `Error::InvalidQuestionCount` for non-numeric or zero input.
pub fn parse_question_count(raw: &str) -> Result<u32, Error> {
    match raw.trim().parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(Error::InvalidQuestionCount {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_count_rejects_non_numeric_input() {
        assert_eq!(parse_question_count(" 20 ").unwrap(), 20);
        assert!(parse_question_count("ten").is_err());
        assert!(parse_question_count("0").is_err());
    }
}
