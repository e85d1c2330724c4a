//! Extracted dataset returned by each parse.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::config::ExtractionMode;
use crate::key::RowKey;

/// One extracted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Synthesized key, when the configuration keys rows.
    pub key: Option<RowKey>,

    /// Cell values, aligned with the dataset's columns.
    pub cells: Vec<String>,
}

impl Row {
    /// Cell at `index`, if the row is that wide.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }
}

/// Which table a mismatch was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLevel {
    Primary,
    Nested,
}

/// A row that captured fewer fields than the columns known when it closed.
///
/// Non-fatal: the row is padded with empty strings, never shifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralMismatch {
    /// Table the row belongs to.
    pub level: TableLevel,

    /// Position of the row in its table (for nested rows: within the parent).
    pub row_index: usize,

    /// Key of the row, or of the parent row for nested rows.
    pub row_key: Option<RowKey>,

    /// Distinct fields the row actually captured.
    pub captured: usize,

    /// Column count known when the row closed.
    pub expected: usize,
}

/// Output of one parse: ordered columns, ordered rows, optional nested tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDataset {
    mode: ExtractionMode,
    columns: Vec<String>,
    rows: Vec<Row>,
    key_index: HashMap<RowKey, usize>,
    nested_columns: Vec<String>,
    nested_tables: Option<IndexMap<RowKey, Vec<Vec<String>>>>,
    mismatches: Vec<StructuralMismatch>,
}

impl ExtractedDataset {
    /// Assemble a dataset, padding every row to the final column width.
    pub(crate) fn new(
        mode: ExtractionMode,
        columns: Vec<String>,
        mut rows: Vec<Row>,
        nested_columns: Vec<String>,
        mut nested_tables: Option<IndexMap<RowKey, Vec<Vec<String>>>>,
        mismatches: Vec<StructuralMismatch>,
    ) -> Self {
        let width = columns.len();
        for row in &mut rows {
            row.cells.resize(width, String::new());
        }

        let nested_width = nested_columns.len();
        if let Some(tables) = nested_tables.as_mut() {
            for nested_row in tables.values_mut().flatten() {
                nested_row.resize(nested_width, String::new());
            }
        }

        // Later duplicates overwrite earlier ones.
        let key_index = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.key.clone().map(|key| (key, i)))
            .collect();

        Self {
            mode,
            columns,
            rows,
            key_index,
            nested_columns,
            nested_tables,
            mismatches,
        }
    }

    /// Extraction mode that produced this dataset.
    #[must_use]
    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in document order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Row with the given key (the last one, if keys repeat).
    #[must_use]
    pub fn row_by_key(&self, key: &str) -> Option<&Row> {
        self.key_index.get(key).and_then(|&i| self.rows.get(i))
    }

    /// Nested column names in order.
    #[must_use]
    pub fn nested_columns(&self) -> &[String] {
        &self.nested_columns
    }

    /// Nested rows of the parent row with `key`.
    ///
    /// Unknown keys yield an empty slice rather than an error.
    #[must_use]
    pub fn nested_table(&self, key: &str) -> &[Vec<String>] {
        self.nested_tables
            .as_ref()
            .and_then(|tables| tables.get(key))
            .map_or(&[], Vec::as_slice)
    }

    /// All nested tables keyed by parent row key, in document order.
    #[must_use]
    pub fn nested_tables(&self) -> Option<&IndexMap<RowKey, Vec<Vec<String>>>> {
        self.nested_tables.as_ref()
    }

    /// Ragged rows found during the parse.
    #[must_use]
    pub fn mismatches(&self) -> &[StructuralMismatch] {
        &self.mismatches
    }

    /// Value of a singleton field from a flat extraction.
    ///
    /// For row-based modes this reads the first row.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.cell(0, name)
    }

    /// All singleton fields from a flat extraction, in target order.
    #[must_use]
    pub fn fields(&self) -> IndexMap<&str, &str> {
        let Some(row) = self.rows.first() else {
            return IndexMap::new();
        };
        self.columns
            .iter()
            .map(String::as_str)
            .zip(row.cells.iter().map(String::as_str))
            .collect()
    }

    /// Header row followed by every data row.
    #[must_use]
    pub fn to_table(&self) -> Vec<Vec<String>> {
        std::iter::once(self.columns.clone())
            .chain(self.rows.iter().map(|r| r.cells.clone()))
            .collect()
    }

    /// Nested header row followed by the nested rows of `key`.
    #[must_use]
    pub fn nested_to_table(&self, key: &str) -> Vec<Vec<String>> {
        std::iter::once(self.nested_columns.clone())
            .chain(self.nested_table(key).iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, cells: &[&str]) -> Row {
        Row {
            key: Some(key.to_string()),
            cells: cells.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn sample() -> ExtractedDataset {
        let mut nested = IndexMap::new();
        nested.insert("Q1?V".to_string(), vec![vec!["c1".to_string()]]);
        nested.insert("Q2?V".to_string(), Vec::new());
        ExtractedDataset::new(
            ExtractionMode::Targeted,
            vec!["RowUID".into(), "name".into(), "owner".into()],
            vec![row("Q1?V", &["Q1?V", "Q1"]), row("Q2?V", &["Q2?V", "Q2", "bob"])],
            vec!["name".into(), "flow-id".into()],
            Some(nested),
            Vec::new(),
        )
    }

    #[test]
    fn test_rows_padded_to_width() {
        let dataset = sample();
        assert_eq!(dataset.rows()[0].cells, vec!["Q1?V", "Q1", ""]);
        assert_eq!(dataset.nested_table("Q1?V"), &[vec!["c1".to_string(), String::new()]]);
    }

    #[test]
    fn test_cell_lookup() {
        let dataset = sample();
        assert_eq!(dataset.cell(1, "owner"), Some("bob"));
        assert_eq!(dataset.cell(0, "missing"), None);
        assert_eq!(dataset.cell(5, "owner"), None);
    }

    #[test]
    fn test_row_by_key() {
        let dataset = sample();
        assert_eq!(dataset.row_by_key("Q2?V").and_then(|r| r.get(1)), Some("Q2"));
        assert!(dataset.row_by_key("nope").is_none());
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let dataset = ExtractedDataset::new(
            ExtractionMode::Targeted,
            vec!["RowUID".into(), "owner".into()],
            vec![row("K", &["K", "first"]), row("K", &["K", "second"])],
            Vec::new(),
            None,
            Vec::new(),
        );
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.row_by_key("K").and_then(|r| r.get(1)), Some("second"));
    }

    #[test]
    fn test_nested_unknown_key_is_empty() {
        let dataset = sample();
        assert!(dataset.nested_table("unknown").is_empty());
        assert!(dataset.nested_table("Q2?V").is_empty());
        assert_eq!(dataset.nested_to_table("unknown").len(), 1);
    }

    #[test]
    fn test_to_table_has_header() {
        let table = sample().to_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], vec!["RowUID", "name", "owner"]);
    }

    #[test]
    fn test_fields_of_flat_dataset() {
        let dataset = ExtractedDataset::new(
            ExtractionMode::Flat,
            vec!["a".into(), "b".into()],
            vec![Row {
                key: None,
                cells: vec!["1".into(), "2".into()],
            }],
            Vec::new(),
            None,
            Vec::new(),
        );
        assert_eq!(dataset.field("b"), Some("2"));
        let fields: Vec<_> = dataset.fields().into_iter().collect();
        assert_eq!(fields, vec![("a", "1"), ("b", "2")]);
    }
}
