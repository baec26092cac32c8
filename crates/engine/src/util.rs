//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidData(format!("invalid {label} id")))
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_text(value: &str) -> String {
    value.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(
            normalize_required_name("  Merkez Kasa ", "account").unwrap(),
            "Merkez Kasa"
        );
        assert!(normalize_required_name("   ", "account").is_err());
    }

    #[test]
    fn bad_uuid_is_invalid_data() {
        assert_eq!(
            parse_uuid("nope", "account"),
            Err(EngineError::InvalidData("invalid account id".to_string()))
        );
    }
}
