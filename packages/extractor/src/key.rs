//! Row key synthesis.
//!
//! SEMP replies carry no unique row identifier, so one is derived from two
//! field values (by default `name` and `message-vpn`). The key correlates
//! rows across independently issued queries and links parent rows to their
//! nested table.

use crate::error::{ExtractorError, Result};

/// Reserved delimiter between the two key parts. Not expected in content.
pub const ROW_KEY_DELIMITER: &str = "?";

/// Default name of the identity column.
pub const ROW_KEY_COLUMN: &str = "RowUID";

/// Default tag of the first key part.
pub const DEFAULT_PRIMARY_KEY_FIELD: &str = "name";

/// Default tag of the second key part.
pub const DEFAULT_SECONDARY_KEY_FIELD: &str = "message-vpn";

/// Synthesized row identifier.
pub type RowKey = String;

/// Which fields form a row's key and whether it becomes a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKeySpec {
    /// Tag of the first key part.
    pub primary: String,

    /// Tag of the second key part. `None` keys rows by the primary alone.
    pub secondary: Option<String>,

    /// Name of the identity column prepended to each row.
    ///
    /// `None` keeps the key for lookups only.
    pub key_column: Option<String>,
}

impl Default for RowKeySpec {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_KEY_FIELD.to_string(),
            secondary: Some(DEFAULT_SECONDARY_KEY_FIELD.to_string()),
            key_column: Some(ROW_KEY_COLUMN.to_string()),
        }
    }
}

impl RowKeySpec {
    /// Key rows by a single field without emitting an identity column.
    ///
    /// This is how message-VPN replies are keyed: the VPN `name` already
    /// is a column.
    #[must_use]
    pub fn lookup_only(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
            key_column: None,
        }
    }

    /// Which part of the key `tag` supplies, if any.
    pub(crate) fn part_of(&self, tag: &str) -> Option<KeyPart> {
        if tag == self.primary {
            Some(KeyPart::Primary)
        } else if self.secondary.as_deref() == Some(tag) {
            Some(KeyPart::Secondary)
        } else {
            None
        }
    }

    /// Build the key from the captured parts.
    ///
    /// Parts are trimmed; a part never seen in the row is empty.
    ///
    /// # Examples
    /// ```
    /// use sempwatch_extractor::RowKeySpec;
    ///
    /// let spec = RowKeySpec::default();
    /// assert_eq!(spec.synthesize(" Q1 ", "VPN1\n"), "Q1?VPN1");
    /// assert_eq!(spec.synthesize("Q2", ""), "Q2?");
    /// ```
    #[must_use]
    pub fn synthesize(&self, primary: &str, secondary: &str) -> RowKey {
        match self.secondary {
            Some(_) => format!(
                "{}{ROW_KEY_DELIMITER}{}",
                primary.trim(),
                secondary.trim()
            ),
            None => primary.trim().to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.primary.trim().is_empty() {
            return Err(ExtractorError::InvalidConfig(
                "row key primary field is empty".to_string(),
            ));
        }
        if let Some(column) = &self.key_column {
            if column.trim().is_empty() {
                return Err(ExtractorError::InvalidConfig(
                    "row key column name is empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One half of a row key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyPart {
    Primary,
    Secondary,
}

/// Per-row accumulator for the key parts.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyParts {
    primary: String,
    secondary: String,
}

impl KeyParts {
    pub(crate) fn set(&mut self, part: KeyPart, value: &str) {
        let slot = match part {
            KeyPart::Primary => &mut self.primary,
            KeyPart::Secondary => &mut self.secondary,
        };
        slot.clear();
        slot.push_str(value);
    }

    pub(crate) fn finish(&self, spec: &RowKeySpec) -> RowKey {
        spec.synthesize(&self.primary, &self.secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec() {
        let spec = RowKeySpec::default();
        assert_eq!(spec.primary, "name");
        assert_eq!(spec.secondary.as_deref(), Some("message-vpn"));
        assert_eq!(spec.key_column.as_deref(), Some("RowUID"));
    }

    #[test]
    fn test_synthesize_missing_parts() {
        let spec = RowKeySpec::default();
        assert_eq!(spec.synthesize("", ""), "?");
        assert_eq!(spec.synthesize("", "VPN1"), "?VPN1");
    }

    #[test]
    fn test_lookup_only_uses_primary() {
        let spec = RowKeySpec::lookup_only("name");
        assert_eq!(spec.synthesize("  default ", "ignored"), "default");
        assert!(spec.key_column.is_none());
    }

    #[test]
    fn test_part_of() {
        let spec = RowKeySpec::default();
        assert_eq!(spec.part_of("name"), Some(KeyPart::Primary));
        assert_eq!(spec.part_of("message-vpn"), Some(KeyPart::Secondary));
        assert_eq!(spec.part_of("owner"), None);
        assert_eq!(RowKeySpec::lookup_only("name").part_of("message-vpn"), None);
    }

    #[test]
    fn test_key_parts_overwrite() {
        let spec = RowKeySpec::default();
        let mut parts = KeyParts::default();
        parts.set(KeyPart::Primary, "first");
        parts.set(KeyPart::Primary, "Q1");
        parts.set(KeyPart::Secondary, "VPN1");
        assert_eq!(parts.finish(&spec), "Q1?VPN1");
    }

    #[test]
    fn test_validate() {
        assert!(RowKeySpec::default().validate().is_ok());
        assert!(RowKeySpec::lookup_only(" ").validate().is_err());
        let spec = RowKeySpec {
            key_column: Some(String::new()),
            ..RowKeySpec::default()
        };
        assert!(spec.validate().is_err());
    }
}
