use std::cmp::Ordering;

/// Identifies a field inside a row: `family:qualifier`.
///
/// Columns order by family first, then qualifier, both as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
}

impl Column {
    pub fn new(family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }

    /// Parses the `family:qualifier` form used by the shell.
    ///
    /// Returns `None` when there is no `:` separator or the family is empty.
    pub fn parse(text: &str) -> Option<Self> {
        let (family, qualifier) = text.split_once(':')?;
        if family.is_empty() {
            return None;
        }
        Some(Self::new(family, qualifier))
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            String::from_utf8_lossy(&self.family),
            String::from_utf8_lossy(&self.qualifier)
        )
    }
}

/// One field value of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub column: Column,
    pub timestamp: u64,
    pub value: Vec<u8>,
}

impl Cell {
    pub fn new(column: Column, timestamp: u64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            column,
            timestamp,
            value: value.into(),
        }
    }

    pub fn family(&self) -> &[u8] {
        &self.column.family
    }

    pub fn qualifier(&self) -> &[u8] {
        &self.column.qualifier
    }
}

/// The merged field set of a single row key.
///
/// Cells are kept sorted by [`Column`] with at most one cell per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    key: Vec<u8>,
    cells: Vec<Cell>,
}

impl Row {
    /// Creates a row with no cells.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            cells: Vec::new(),
        }
    }

    /// Builds a row from cells in any order.
    ///
    /// When two cells share a column, the one that appears later in `cells`
    /// is kept.
    pub fn from_cells(key: impl Into<Vec<u8>>, mut cells: Vec<Cell>) -> Self {
        // Stable sort keeps input order among equal columns; dedup_by keeps the
        // first of each run, so reverse first to keep the last writer.
        cells.reverse();
        cells.sort_by(|a, b| a.column.cmp(&b.column));
        cells.dedup_by(|later, earlier| later.column == earlier.column);
        Self {
            key: key.into(),
            cells,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Looks up the cell stored under `family:qualifier`.
    pub fn cell(&self, family: &[u8], qualifier: &[u8]) -> Option<&Cell> {
        self.cells
            .binary_search_by(|c| {
                c.column
                    .family
                    .as_slice()
                    .cmp(family)
                    .then_with(|| c.column.qualifier.as_slice().cmp(qualifier))
            })
            .ok()
            .map(|i| &self.cells[i])
    }

    /// Shorthand for the value of `family:qualifier`.
    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&[u8]> {
        self.cell(family, qualifier).map(|c| c.value.as_slice())
    }

    /// Lays the fields of an older version of this row underneath `self`.
    ///
    /// Columns present in `self` keep their value; columns only present in
    /// `older` are added. Both rows must share the same key.
    pub fn merge_older(&mut self, older: Row) {
        debug_assert_eq!(self.key, older.key);
        if older.cells.is_empty() {
            return;
        }
        let newer = std::mem::take(&mut self.cells);
        let mut merged = Vec::with_capacity(newer.len() + older.cells.len());
        let mut newer = newer.into_iter().peekable();
        let mut older = older.cells.into_iter().peekable();

        loop {
            let ord = match (newer.peek(), older.peek()) {
                (Some(n), Some(o)) => n.column.cmp(&o.column),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match ord {
                Ordering::Less => merged.extend(newer.next()),
                Ordering::Greater => merged.extend(older.next()),
                Ordering::Equal => {
                    merged.extend(newer.next());
                    older.next();
                }
            }
        }
        self.cells = merged;
    }

    /// Approximate in-memory footprint in bytes.
    pub fn heap_size(&self) -> usize {
        self.key.len()
            + self
                .cells
                .iter()
                .map(|c| c.column.family.len() + c.column.qualifier.len() + c.value.len() + 8)
                .sum::<usize>()
    }
}
