use std::collections::BTreeMap;

use crate::{current_time_millis, Cell, Column, Row};

/// Fixed per-mutation overhead added to [`Mutation::heap_size`].
pub const MUTATION_OVERHEAD: usize = std::mem::size_of::<Mutation>();

/// Per-field overhead: the map node plus the column and field headers.
const FIELD_OVERHEAD: usize =
    std::mem::size_of::<Column>() + std::mem::size_of::<Field>() + 3 * std::mem::size_of::<usize>();

/// Timestamp and value of one field inside a [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub timestamp: u64,
    pub value: Vec<u8>,
}

/// A pending write for one row key.
///
/// Fields are keyed by [`Column`]. Merging a newer mutation into an older
/// one replaces the older value column by column and never removes a column
/// the newer mutation does not mention.
///
/// ```
/// use row::Mutation;
///
/// let mut m = Mutation::new("r1").with_column_at("cf", "name", 1, "alice");
/// m.merge(&Mutation::new("r1").with_column_at("cf", "age", 2, "30"));
/// assert_eq!(m.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    row: Vec<u8>,
    fields: BTreeMap<Column, Field>,
}

impl Mutation {
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field stamped with the current wall-clock time.
    #[must_use]
    pub fn with_column(
        self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.with_column_at(family, qualifier, current_time_millis(), value)
    }

    /// Adds a field with an explicit timestamp.
    #[must_use]
    pub fn with_column_at(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.add_column(Column::new(family, qualifier), timestamp, value);
        self
    }

    /// Sets `column` to `value`, replacing any earlier value in this mutation.
    pub fn add_column(&mut self, column: Column, timestamp: u64, value: impl Into<Vec<u8>>) {
        self.fields.insert(
            column,
            Field {
                timestamp,
                value: value.into(),
            },
        );
    }

    /// Builds a mutation that rewrites every cell of `row`.
    pub fn from_row(row: &Row) -> Self {
        let mut m = Self::new(row.key());
        for cell in row.cells() {
            m.add_column(cell.column.clone(), cell.timestamp, cell.value.clone());
        }
        m
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn field(&self, family: &[u8], qualifier: &[u8]) -> Option<&Field> {
        self.fields.get(&Column::new(family, qualifier))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Column, &Field)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Folds `newer` over `self`, field by field (last writer wins).
    ///
    /// Re-applying an identical mutation leaves `self` unchanged.
    pub fn merge(&mut self, newer: &Mutation) {
        debug_assert_eq!(self.row, newer.row);
        for (column, field) in &newer.fields {
            self.fields.insert(column.clone(), field.clone());
        }
    }

    /// Estimated byte footprint used for memtable size accounting.
    pub fn heap_size(&self) -> usize {
        MUTATION_OVERHEAD
            + self.row.len()
            + self
                .fields
                .iter()
                .map(|(c, f)| field_size(c, f))
                .sum::<usize>()
    }

    /// `heap_size` of `self` after [`merge`](Self::merge)`(newer)`, without
    /// merging.
    pub fn merged_heap_size(&self, newer: &Mutation) -> usize {
        let mut size = self.heap_size();
        for (column, field) in &newer.fields {
            match self.fields.get(column) {
                Some(old) => size = size - old.value.len() + field.value.len(),
                None => size += field_size(column, field),
            }
        }
        size
    }

    /// Materializes the mutation as a [`Row`] with cells in column order.
    pub fn to_row(&self) -> Row {
        let cells = self
            .fields
            .iter()
            .map(|(column, field)| Cell::new(column.clone(), field.timestamp, field.value.clone()))
            .collect();
        // BTreeMap iteration is already column-ordered and unique.
        Row::from_cells(self.row.clone(), cells)
    }
}

fn field_size(column: &Column, field: &Field) -> usize {
    FIELD_OVERHEAD + column.family.len() + column.qualifier.len() + field.value.len()
}
