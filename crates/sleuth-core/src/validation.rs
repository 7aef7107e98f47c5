use crate::domain::SearchRequest;
use crate::error::ValidationError;

/// Gate applied to every request before it reaches the orchestrator.
///
/// Format rules for phones, emails and document numbers belong to the
/// caller's input layer; plug them in through this trait.
pub trait QueryValidator: Send + Sync {
    fn validate(&self, request: &SearchRequest) -> Result<(), ValidationError>;
}

impl<F> QueryValidator for F
where
    F: Fn(&SearchRequest) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, request: &SearchRequest) -> Result<(), ValidationError> {
        self(request)
    }
}

/// Shape-only checks: non-blank, bounded length, no control characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicQueryValidator {
    max_len: usize,
}

impl BasicQueryValidator {
    pub const DEFAULT_MAX_LEN: usize = 256;

    pub const fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for BasicQueryValidator {
    fn default() -> Self {
        Self::with_max_len(Self::DEFAULT_MAX_LEN)
    }
}

impl QueryValidator for BasicQueryValidator {
    fn validate(&self, request: &SearchRequest) -> Result<(), ValidationError> {
        let value = request.value.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyValue);
        }

        let len = value.chars().count();
        if len > self.max_len {
            return Err(ValidationError::ValueTooLong {
                len,
                max: self.max_len,
            });
        }

        if let Some(index) = value.chars().position(char::is_control) {
            return Err(ValidationError::ControlCharacter { index });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchType;

    fn raw(value: &str) -> SearchRequest {
        SearchRequest {
            search_type: SearchType::Email,
            value: value.to_owned(),
        }
    }

    #[test]
    fn rejects_blank_and_oversized_values() {
        let validator = BasicQueryValidator::default();

        assert_eq!(validator.validate(&raw("  ")), Err(ValidationError::EmptyValue));
        assert_eq!(
            validator.validate(&raw(&"a".repeat(257))),
            Err(ValidationError::ValueTooLong { len: 257, max: 256 })
        );
        assert_eq!(validator.validate(&raw(&"a".repeat(256))), Ok(()));
    }

    #[test]
    fn rejects_control_characters() {
        let validator = BasicQueryValidator::default();
        assert_eq!(
            validator.validate(&raw("a@b\u{0}.test")),
            Err(ValidationError::ControlCharacter { index: 3 })
        );
    }

    #[test]
    fn closures_act_as_validators() {
        let only_phones = |request: &SearchRequest| {
            if request.search_type == SearchType::Phone {
                Ok(())
            } else {
                Err(ValidationError::InvalidSearchType {
                    value: request.search_type.to_string(),
                })
            }
        };

        assert!(only_phones.validate(&raw("a@b.test")).is_err());
    }
}
