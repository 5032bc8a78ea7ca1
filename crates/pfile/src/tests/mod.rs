use row::{Cell, Column, Row};


/// `n` rows `row-000`.. with a name column on every row and an age column
/// on every other row.
pub(crate) fn sample_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let mut cells = vec![Cell::new(Column::new("cf", "name"), i as u64, format!("name-{i}"))];
            if i % 2 == 0 {
                cells.push(Cell::new(Column::new("cf", "age"), i as u64, format!("{i}")));
            }
            Row::from_cells(format!("row-{i:03}"), cells)
        })
        .collect()
}
