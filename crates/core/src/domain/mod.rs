pub mod identity;
pub mod org;
pub mod phone_line;
pub mod vendor;

use crate::errors::DomainError;

pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Optional free-text fields collapse to `None` when blank.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{optional_text, require_text};

    #[test]
    fn require_text_trims_and_rejects_blank_values() {
        assert_eq!(require_text("name", "  Building A ").expect("valid"), "Building A");
        let error = require_text("name", "   ").expect_err("blank should fail");
        assert_eq!(error.to_string(), "invalid input: name must not be blank");
    }

    #[test]
    fn optional_text_collapses_blank_to_none() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" x201 ")), Some("x201".to_string()));
        assert_eq!(optional_text(None), None);
    }
}
