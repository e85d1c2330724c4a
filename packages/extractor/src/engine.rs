//! Hierarchical record extraction.
//!
//! A single-pass state machine over the event stream from [`crate::events`].
//! One `match` on the current [`State`] decides what each open, text and
//! close event means; accumulators for the row being built live beside it
//! in [`Pass`] and are reset at the start of every parse.

use std::mem;

use indexmap::IndexMap;

use crate::columns::{put_cell, ColumnSet};
use crate::config::{ExtractionConfig, ExtractionMode};
use crate::dataset::{ExtractedDataset, Row, StructuralMismatch, TableLevel};
use crate::error::{ExtractorError, Result};
use crate::events::{read_events, XmlEvent};
use crate::key::{KeyPart, KeyParts, RowKey};

/// Streaming extractor bound to one configuration.
///
/// Reusable: every call to [`parse`](Self::parse) starts from a clean
/// state, so nothing leaks from one document into the next.
#[derive(Debug)]
pub struct RecordExtractor {
    config: ExtractionConfig,
    pass: Pass,
}

impl RecordExtractor {
    /// Create an extractor after validating `config`.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the configuration cannot describe a table.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pass: Pass::default(),
        })
    }

    /// Configuration this extractor runs.
    #[must_use]
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract a table from one complete document.
    ///
    /// # Arguments
    /// * `document` - Raw UTF-8 XML bytes of a SEMP reply
    ///
    /// # Returns
    /// The rows, columns and nested tables found in `document`.
    ///
    /// # Errors
    /// Returns `MalformedDocument` if the document cannot be tokenized or
    /// ends early. No partial dataset is produced in that case.
    ///
    /// # Examples
    /// ```
    /// use sempwatch_extractor::{ExtractionConfig, RecordExtractor};
    ///
    /// let config = ExtractionConfig::targeted("queue", ["name", "message-vpn"])
    ///     .with_envelope_depth(2);
    /// let mut extractor = RecordExtractor::new(config).unwrap();
    /// let dataset = extractor
    ///     .parse("<queues><queue><name>Q1</name><message-vpn>V</message-vpn></queue></queues>")
    ///     .unwrap();
    /// assert_eq!(dataset.columns(), ["RowUID", "name", "message-vpn"]);
    /// assert_eq!(dataset.rows()[0].cells, ["Q1?V", "Q1", "V"]);
    /// ```
    pub fn parse(&mut self, document: impl AsRef<[u8]>) -> Result<ExtractedDataset> {
        let document = document.as_ref();
        let config = &self.config;
        let pass = &mut self.pass;

        pass.reset(config);
        read_events(document, |event| match event {
            XmlEvent::Open(tag) => pass.open(config, tag),
            XmlEvent::Text(text) => pass.text(text),
            XmlEvent::Close(tag) => pass.close(config, tag),
        })?;

        if !pass.state.is_terminal(config.mode) {
            let position = u64::try_from(document.len()).unwrap_or(u64::MAX);
            return Err(ExtractorError::malformed(
                position,
                format!("document ended inside <{}>", config.row_element),
            ));
        }

        let dataset = pass.finish(config);
        if !dataset.mismatches().is_empty() {
            tracing::warn!(
                row_element = %config.row_element,
                count = dataset.mismatches().len(),
                "rows captured fewer fields than the table width and were padded"
            );
        }
        tracing::debug!(
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "document extracted"
        );
        Ok(dataset)
    }
}

/// Parse `document` once with `config`.
///
/// Convenience for callers that do not keep an extractor around.
///
/// # Errors
/// Returns `InvalidConfig` or `MalformedDocument`.
pub fn extract(document: impl AsRef<[u8]>, config: &ExtractionConfig) -> Result<ExtractedDataset> {
    RecordExtractor::new(config.clone())?.parse(document)
}

/// What the extractor is inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    /// Inside the echoed request/response envelope.
    #[default]
    BelowEnvelope,
    /// Past the envelope, between rows.
    Idle,
    InRow,
    InNestedRow,
    InField(FieldCapture),
    InNestedField(FieldCapture),
    /// Skipping everything until the element opened at `depth` closes.
    InIgnoredSubtree { depth: usize, within: Scope },
}

impl State {
    fn is_terminal(self, mode: ExtractionMode) -> bool {
        match self {
            Self::BelowEnvelope | Self::Idle => true,
            // Flat documents are one implicit row that never closes.
            Self::InRow => mode == ExtractionMode::Flat,
            _ => false,
        }
    }
}

/// State to return to when an ignored subtree closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Document,
    Row,
    NestedRow,
}

impl Scope {
    fn resume(self) -> State {
        match self {
            Self::Document => State::Idle,
            Self::Row => State::InRow,
            Self::NestedRow => State::InNestedRow,
        }
    }
}

/// An open field element whose text is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldCapture {
    depth: usize,
    column: Option<usize>,
    key: Option<KeyPart>,
}

/// Cells a finished row actually captured, checked against the final widths.
#[derive(Debug, Default)]
struct RowTally {
    captured: usize,
    nested: Vec<usize>,
}

/// Mutable accumulators for one parse.
#[derive(Debug, Default)]
struct Pass {
    state: State,
    depth: usize,
    row_depth: usize,
    nested_depth: usize,
    text: String,
    columns: ColumnSet,
    nested_columns: ColumnSet,
    cells: Vec<Option<String>>,
    nested_cells: Vec<Option<String>>,
    key_parts: KeyParts,
    pending_nested: Vec<Vec<String>>,
    pending_nested_captured: Vec<usize>,
    rows: Vec<Row>,
    tallies: Vec<RowTally>,
    nested_tables: IndexMap<RowKey, Vec<Vec<String>>>,
    mismatches: Vec<StructuralMismatch>,
}

impl Pass {
    fn reset(&mut self, config: &ExtractionConfig) {
        *self = Self::default();
        if config.mode == ExtractionMode::Flat {
            for target in &config.captured_fields {
                self.columns.index_or_insert(target);
            }
            self.state = State::InRow;
        }
    }

    fn open(&mut self, config: &ExtractionConfig, tag: &str) {
        self.depth += 1;
        let depth = self.depth;

        match self.state {
            State::BelowEnvelope | State::Idle => {
                if depth < config.envelope_depth {
                    self.state = State::BelowEnvelope;
                } else if config.is_ignored(tag) {
                    self.state = State::InIgnoredSubtree {
                        depth,
                        within: Scope::Document,
                    };
                } else if config.is_row(tag) {
                    self.begin_row(config, depth);
                } else {
                    self.state = State::Idle;
                }
            }
            State::InRow => self.open_in_row(config, tag, depth),
            State::InNestedRow => self.open_in_nested_row(config, tag, depth),
            // Markup inside a field contributes its text only.
            State::InField(_) | State::InNestedField(_) | State::InIgnoredSubtree { .. } => {}
        }
    }

    fn begin_row(&mut self, config: &ExtractionConfig, depth: usize) {
        if let Some(column) = key_column(config) {
            self.columns.index_or_insert(column);
        }
        self.row_depth = depth;
        self.cells.clear();
        self.key_parts = KeyParts::default();
        self.pending_nested.clear();
        self.pending_nested_captured.clear();
        self.state = State::InRow;
    }

    fn open_in_row(&mut self, config: &ExtractionConfig, tag: &str, depth: usize) {
        if config.is_ignored(tag) {
            self.state = State::InIgnoredSubtree {
                depth,
                within: Scope::Row,
            };
            return;
        }
        if config.is_nested_row(tag) {
            self.nested_depth = depth;
            self.nested_cells.clear();
            self.state = State::InNestedRow;
            return;
        }

        let wanted = match config.mode {
            ExtractionMode::Targeted | ExtractionMode::Flat => config.captured_fields.contains(tag),
            ExtractionMode::CaptureAll => depth == self.row_depth + 1 && !config.is_row(tag),
        };
        let column = wanted.then(|| column_index(&mut self.columns, tag));
        let key = match config.mode {
            ExtractionMode::Flat => None,
            _ => config.row_key.as_ref().and_then(|spec| spec.part_of(tag)),
        };

        if column.is_some() || key.is_some() {
            self.text.clear();
            self.state = State::InField(FieldCapture { depth, column, key });
        }
    }

    fn open_in_nested_row(&mut self, config: &ExtractionConfig, tag: &str, depth: usize) {
        if config.is_ignored(tag) {
            self.state = State::InIgnoredSubtree {
                depth,
                within: Scope::NestedRow,
            };
            return;
        }
        let Some(nested) = &config.nested else {
            return;
        };
        if nested.captured_fields.contains(tag) {
            let column = column_index(&mut self.nested_columns, tag);
            self.text.clear();
            self.state = State::InNestedField(FieldCapture {
                depth,
                column: Some(column),
                key: None,
            });
        }
    }

    fn text(&mut self, text: &str) {
        if matches!(self.state, State::InField(_) | State::InNestedField(_)) {
            self.text.push_str(text);
        }
    }

    fn close(&mut self, config: &ExtractionConfig, _tag: &str) {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        match self.state {
            State::InField(field) if field.depth == depth => {
                let value = mem::take(&mut self.text);
                if let Some(part) = field.key {
                    self.key_parts.set(part, &value);
                }
                if let Some(index) = field.column {
                    put_cell(&mut self.cells, index, value);
                }
                self.state = State::InRow;
            }
            State::InNestedField(field) if field.depth == depth => {
                let value = mem::take(&mut self.text);
                if let Some(index) = field.column {
                    put_cell(&mut self.nested_cells, index, value);
                }
                self.state = State::InNestedRow;
            }
            State::InIgnoredSubtree {
                depth: ignored_depth,
                within,
            } if ignored_depth == depth => {
                self.state = within.resume();
            }
            State::InNestedRow if depth == self.nested_depth => {
                self.finish_nested_row();
                self.state = State::InRow;
            }
            State::InRow if depth == self.row_depth && config.mode != ExtractionMode::Flat => {
                self.finish_row(config);
                self.state = State::Idle;
            }
            State::Idle if depth < config.envelope_depth => {
                self.state = State::BelowEnvelope;
            }
            _ => {}
        }
    }

    fn finish_nested_row(&mut self) {
        let cells = mem::take(&mut self.nested_cells);
        self.pending_nested_captured
            .push(cells.iter().flatten().count());
        self.pending_nested
            .push(cells.into_iter().map(Option::unwrap_or_default).collect());
    }

    fn finish_row(&mut self, config: &ExtractionConfig) {
        let mut cells = mem::take(&mut self.cells);
        let key = config
            .row_key
            .as_ref()
            .map(|spec| self.key_parts.finish(spec));

        if let (Some(key), Some(column)) = (&key, key_column(config)) {
            let index = column_index(&mut self.columns, column);
            put_cell(&mut cells, index, key.clone());
        }

        self.tallies.push(RowTally {
            captured: cells.iter().flatten().count(),
            nested: mem::take(&mut self.pending_nested_captured),
        });

        if config.nested.is_some() {
            let nested = mem::take(&mut self.pending_nested);
            self.nested_tables
                .insert(key.clone().unwrap_or_default(), nested);
        }

        self.rows.push(Row {
            key,
            cells: cells.into_iter().map(Option::unwrap_or_default).collect(),
        });
    }

    /// Report every row, primary or nested, that captured fewer cells than
    /// its table's final width. Such rows are padded by the dataset.
    fn report_ragged_rows(&mut self) {
        let width = self.columns.width();
        let nested_width = self.nested_columns.width();

        for (row_index, (row, tally)) in self.rows.iter().zip(&self.tallies).enumerate() {
            if tally.captured < width {
                record_mismatch(
                    &mut self.mismatches,
                    StructuralMismatch {
                        level: TableLevel::Primary,
                        row_index,
                        row_key: row.key.clone(),
                        captured: tally.captured,
                        expected: width,
                    },
                );
            }
            for (nested_index, &captured) in tally.nested.iter().enumerate() {
                if captured < nested_width {
                    record_mismatch(
                        &mut self.mismatches,
                        StructuralMismatch {
                            level: TableLevel::Nested,
                            row_index: nested_index,
                            row_key: row.key.clone(),
                            captured,
                            expected: nested_width,
                        },
                    );
                }
            }
        }
    }

    /// Hand the accumulated table over as a dataset.
    fn finish(&mut self, config: &ExtractionConfig) -> ExtractedDataset {
        self.report_ragged_rows();
        if config.mode == ExtractionMode::Flat {
            let captured = mem::take(&mut self.cells);
            let cells = config
                .captured_fields
                .iter()
                .enumerate()
                .map(|(i, target)| match captured.get(i).cloned().flatten() {
                    Some(value) => value,
                    None => config.flat_defaults.get(target).cloned().unwrap_or_default(),
                })
                .collect();
            self.rows.push(Row { key: None, cells });
        }

        let nested_tables = config
            .nested
            .is_some()
            .then(|| mem::take(&mut self.nested_tables));

        ExtractedDataset::new(
            config.mode,
            mem::take(&mut self.columns).into_vec(),
            mem::take(&mut self.rows),
            mem::take(&mut self.nested_columns).into_vec(),
            nested_tables,
            mem::take(&mut self.mismatches),
        )
    }
}

fn key_column(config: &ExtractionConfig) -> Option<&str> {
    config
        .row_key
        .as_ref()
        .and_then(|spec| spec.key_column.as_deref())
}

fn column_index(columns: &mut ColumnSet, tag: &str) -> usize {
    let (index, added) = columns.index_or_insert(tag);
    if added {
        tracing::trace!(column = tag, index, "new column");
    }
    index
}

fn record_mismatch(mismatches: &mut Vec<StructuralMismatch>, mismatch: StructuralMismatch) {
    tracing::debug!(
        level = ?mismatch.level,
        row = mismatch.row_index,
        key = mismatch.row_key.as_deref().unwrap_or(""),
        captured = mismatch.captured,
        expected = mismatch.expected,
        "ragged row"
    );
    mismatches.push(mismatch);
}
