use crate::spreadsheet::reference::index_to_reference;
use crate::table::value::CellValue;

/// A sheet as raw rows, before any header is chosen.
///
/// Row 0 is the first sheet row and column 0 is column A. Rows run up to the
/// last used row; each row holds cells up to its own last used column and every
/// cell past that, up to [`Grid::width`], is empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Grid {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Grid { rows, width }
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Stored cells of a row; may be shorter than the grid width.
    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell at a position, empty anywhere inside the grid that holds no value.
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        static EMPTY: CellValue = CellValue::Empty;
        let cells = self.rows.get(row)?;
        if col >= self.width {
            None
        } else {
            Some(cells.get(col).unwrap_or(&EMPTY))
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }

    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }

    /// Used range such as `A1:C3`, `None` for an empty grid
    pub(crate) fn dimension(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(format!("A1:{}", index_to_reference(self.height() - 1, self.width - 1)))
        }
    }
}

/// Collects cells in any order and lays them out row by row.
#[derive(Default)]
pub(crate) struct GridBuilder {
    cells: Vec<(usize, usize, CellValue)>,
    height: usize,
    width: usize,
}

impl GridBuilder {
    /// Records a cell; missing values do not extend the used range.
    pub(crate) fn push(&mut self, row: usize, col: usize, value: CellValue) {
        if value.is_empty() {
            return;
        }
        self.height = self.height.max(row + 1);
        self.width = self.width.max(col + 1);
        self.cells.push((row, col, value));
    }

    /// Later cells at the same position replace earlier ones. Blank rows stay
    /// unallocated, so a single far-away cell costs one row, not the whole range.
    pub(crate) fn finish(self) -> Grid {
        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); self.height];
        for (row, col, value) in self.cells {
            let cells = &mut rows[row];
            if cells.len() <= col {
                cells.resize(col + 1, CellValue::Empty);
            }
            cells[col] = value;
        }
        Grid { rows, width: self.width }
    }
}
