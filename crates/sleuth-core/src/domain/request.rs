use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Kind of personal identifier a query carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Phone,
    Email,
    TaxId,
    NationalId,
    Passport,
}

impl SearchType {
    pub const ALL: [Self; 5] = [
        Self::Phone,
        Self::Email,
        Self::TaxId,
        Self::NationalId,
        Self::Passport,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
            Self::TaxId => "tax_id",
            Self::NationalId => "national_id",
            Self::Passport => "passport",
        }
    }
}

impl Display for SearchType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidSearchType {
                value: value.to_owned(),
            })
    }
}

/// One logical query, already validated by the caller's input layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_type: SearchType,
    pub value: String,
}

impl SearchRequest {
    pub fn new(search_type: SearchType, value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(ValidationError::EmptyValue);
        }
        Ok(Self { search_type, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_type_accepts_dashed_and_mixed_case_names() {
        assert_eq!("Tax-Id".parse::<SearchType>(), Ok(SearchType::TaxId));
        assert_eq!("PHONE".parse::<SearchType>(), Ok(SearchType::Phone));
    }

    #[test]
    fn unknown_search_type_is_rejected() {
        assert!(matches!(
            "fax".parse::<SearchType>(),
            Err(ValidationError::InvalidSearchType { .. })
        ));
    }

    #[test]
    fn request_trims_value_and_rejects_blank() {
        let request = SearchRequest::new(SearchType::Email, "  a@b.test ").expect("valid");
        assert_eq!(request.value, "a@b.test");

        assert_eq!(
            SearchRequest::new(SearchType::Email, "   "),
            Err(ValidationError::EmptyValue)
        );
    }
}
