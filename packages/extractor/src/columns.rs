//! Column discovery in order of first use.

use indexmap::IndexSet;

/// Append-only ordered set of column names.
///
/// A name is added the first time its tag is seen and keeps its index for
/// the rest of the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    names: IndexSet<String>,
}

impl ColumnSet {
    /// Index of `name`, adding it at the end if unseen.
    ///
    /// Returns `(index, true)` when the column was newly added.
    pub fn index_or_insert(&mut self, name: &str) -> (usize, bool) {
        if let Some(index) = self.names.get_index_of(name) {
            return (index, false);
        }
        let (index, _) = self.names.insert_full(name.to_string());
        (index, true)
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Consume into an ordered list of names.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.names.into_iter().collect()
    }
}

/// Store `value` at `index`, widening `cells` with unset slots if needed.
pub(crate) fn put_cell(cells: &mut Vec<Option<String>>, index: usize, value: String) {
    if cells.len() <= index {
        cells.resize(index + 1, None);
    }
    cells[index] = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_use_order() {
        let mut columns = ColumnSet::default();
        assert_eq!(columns.index_or_insert("name"), (0, true));
        assert_eq!(columns.index_or_insert("quota"), (1, true));
        assert_eq!(columns.index_or_insert("name"), (0, false));
        assert_eq!(columns.width(), 2);
        assert_eq!(columns.into_vec(), vec!["name", "quota"]);
    }

    #[test]
    fn test_put_cell_widens() {
        let mut cells = Vec::new();
        put_cell(&mut cells, 2, "x".to_string());
        assert_eq!(cells, vec![None, None, Some("x".to_string())]);
        put_cell(&mut cells, 0, "y".to_string());
        assert_eq!(cells[0].as_deref(), Some("y"));
        assert_eq!(cells.len(), 3);
    }
}
