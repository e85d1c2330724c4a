//! Declarative extraction configuration.
//!
//! An `ExtractionConfig` says which tag marks a row, which tags become
//! columns, which subtrees to skip and whether a second row level exists.
//! It is built once per query type and never changes during a parse.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::error::{ExtractorError, Result};
use crate::key::RowKeySpec;

/// Envelope depth of multi-record replies (`rpc-reply/rpc/show/<cmd>`).
pub const MULTI_RECORD_ENVELOPE_DEPTH: usize = 5;

/// Envelope depth of message-VPN replies.
pub const VPN_RECORD_ENVELOPE_DEPTH: usize = 3;

/// The three extraction strategies, all run by the same state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Rows under a row tag; only listed tags become columns.
    Targeted,
    /// Rows under a row tag; every direct child becomes a column.
    CaptureAll,
    /// No rows: singleton values for a fixed set of tags, anywhere.
    Flat,
}

/// A repeating element inside each primary row that forms its own table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedRows {
    /// Tag that opens/closes one nested row.
    pub row_element: String,

    /// Tags within a nested row whose text becomes a nested column.
    pub captured_fields: IndexSet<String>,
}

/// Immutable description of what to capture from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Which extraction strategy to run.
    pub mode: ExtractionMode,

    /// Tag that opens and closes one primary row. Unused in `Flat` mode.
    pub row_element: String,

    /// Tags whose text becomes a column (the target set in `Flat` mode).
    ///
    /// Column order in the output is order of first encounter, not the
    /// order listed here, except in `Flat` mode.
    pub captured_fields: IndexSet<String>,

    /// Tags whose entire subtree is skipped.
    pub ignored_subtrees: HashSet<String>,

    /// Optional second extraction level.
    pub nested: Option<NestedRows>,

    /// How each primary row is identified. `None` disables row keys.
    pub row_key: Option<RowKeySpec>,

    /// Elements at a 1-based depth below this value are envelope.
    pub envelope_depth: usize,

    /// Initial value per target in `Flat` mode.
    pub flat_defaults: IndexMap<String, String>,
}

impl ExtractionConfig {
    /// Targeted extraction of the listed fields under `row_element`.
    ///
    /// Rows are keyed by `name` + `message-vpn` into a `RowUID` column and
    /// the multi-record envelope depth is assumed.
    ///
    /// # Examples
    /// ```
    /// use sempwatch_extractor::ExtractionConfig;
    ///
    /// let config = ExtractionConfig::targeted("queue", ["name", "message-vpn"])
    ///     .with_ignored(["event"]);
    /// assert!(config.validate().is_ok());
    /// assert!(config.ignored_subtrees.contains("event"));
    /// ```
    #[must_use]
    pub fn targeted(
        row_element: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            mode: ExtractionMode::Targeted,
            row_element: row_element.into(),
            captured_fields: fields.into_iter().map(Into::into).collect(),
            ignored_subtrees: HashSet::new(),
            nested: None,
            row_key: Some(RowKeySpec::default()),
            envelope_depth: MULTI_RECORD_ENVELOPE_DEPTH,
            flat_defaults: IndexMap::new(),
        }
    }

    /// Capture every direct child of `row_element` as a column.
    ///
    /// No keys, no envelope, no ignored subtrees, no nesting.
    #[must_use]
    pub fn capture_all(row_element: impl Into<String>) -> Self {
        Self {
            mode: ExtractionMode::CaptureAll,
            row_element: row_element.into(),
            captured_fields: IndexSet::new(),
            ignored_subtrees: HashSet::new(),
            nested: None,
            row_key: None,
            envelope_depth: 0,
            flat_defaults: IndexMap::new(),
        }
    }

    /// Capture the last value of each target tag, wherever it occurs.
    #[must_use]
    pub fn flat(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let captured_fields: IndexSet<String> = targets.into_iter().map(Into::into).collect();
        let flat_defaults = captured_fields
            .iter()
            .map(|t| (t.clone(), String::new()))
            .collect();
        Self {
            mode: ExtractionMode::Flat,
            row_element: String::new(),
            captured_fields,
            ignored_subtrees: HashSet::new(),
            nested: None,
            row_key: None,
            envelope_depth: 0,
            flat_defaults,
        }
    }

    /// Add tags whose subtrees are skipped.
    #[must_use]
    pub fn with_ignored(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored_subtrees.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Add a nested row level.
    #[must_use]
    pub fn with_nested(
        mut self,
        row_element: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.nested = Some(NestedRows {
            row_element: row_element.into(),
            captured_fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Replace the row key specification (`None` disables keys).
    #[must_use]
    pub fn with_row_key(mut self, row_key: Option<RowKeySpec>) -> Self {
        self.row_key = row_key;
        self
    }

    /// Set the envelope depth.
    #[must_use]
    pub fn with_envelope_depth(mut self, depth: usize) -> Self {
        self.envelope_depth = depth;
        self
    }

    /// Set the initial value of a `Flat` target.
    #[must_use]
    pub fn with_default(mut self, target: impl Into<String>, value: impl Into<String>) -> Self {
        let target = target.into();
        self.captured_fields.insert(target.clone());
        self.flat_defaults.insert(target, value.into());
        self
    }

    /// Check that the configuration can describe a table.
    ///
    /// # Returns
    /// * `Ok(())` if usable
    /// * `Err(ExtractorError::InvalidConfig)` naming the first problem found
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            ExtractionMode::Flat => {
                if self.captured_fields.is_empty() {
                    return Err(invalid("flat extraction needs at least one target tag"));
                }
                return Ok(());
            }
            ExtractionMode::Targeted | ExtractionMode::CaptureAll => {}
        }

        if self.row_element.trim().is_empty() {
            return Err(invalid("row element is empty"));
        }
        if self.mode == ExtractionMode::Targeted && self.captured_fields.is_empty() {
            return Err(invalid(format!(
                "no captured fields for row element <{}>",
                self.row_element
            )));
        }
        if self.ignored_subtrees.contains(&self.row_element) {
            return Err(invalid(format!(
                "row element <{}> is also an ignored subtree",
                self.row_element
            )));
        }

        if let Some(nested) = &self.nested {
            if self.mode != ExtractionMode::Targeted {
                return Err(invalid("nested rows need targeted extraction"));
            }
            if nested.row_element.trim().is_empty() {
                return Err(invalid("nested row element is empty"));
            }
            if nested.row_element == self.row_element {
                return Err(invalid(format!(
                    "nested row element <{}> equals the row element",
                    nested.row_element
                )));
            }
            if nested.captured_fields.is_empty() {
                return Err(invalid(format!(
                    "no captured fields for nested row element <{}>",
                    nested.row_element
                )));
            }
            if self.row_key.is_none() {
                return Err(invalid("nested rows need a row key to link them"));
            }
        }

        if let Some(key) = &self.row_key {
            key.validate()?;
        }

        Ok(())
    }

    /// Whether `tag` opens a primary row.
    pub(crate) fn is_row(&self, tag: &str) -> bool {
        self.mode != ExtractionMode::Flat && tag == self.row_element
    }

    /// Whether `tag` opens a nested row.
    pub(crate) fn is_nested_row(&self, tag: &str) -> bool {
        self.nested.as_ref().is_some_and(|n| n.row_element == tag)
    }

    /// Whether `tag` starts a skipped subtree.
    pub(crate) fn is_ignored(&self, tag: &str) -> bool {
        self.ignored_subtrees.contains(tag)
    }
}

fn invalid(message: impl Into<String>) -> ExtractorError {
    ExtractorError::InvalidConfig(message.into())
}
