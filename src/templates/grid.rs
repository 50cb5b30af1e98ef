//! # Template Grids
//!
//! Rectangular grids of single-character symbols.

use crate::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A rectangular grid of symbols, stored row by row.
///
/// Serialized as a list of equal-length strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Grid {
    rows: Vec<Vec<char>>,
}

impl Grid {
    /// Creates a grid from rows of text.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultwright::Grid;
    ///
    /// let grid = Grid::from_rows(&["xxx", "xAx", "xxx"]).unwrap();
    /// assert_eq!(grid.width(), 3);
    /// assert_eq!(grid.get(1, 1), Some('A'));
    /// assert!(Grid::from_rows(&["xx", "x"]).is_err());
    /// ```
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> VaultResult<Self> {
        let rows: Vec<Vec<char>> = rows.iter().map(|r| r.as_ref().chars().collect()).collect();

        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || width == 0 {
            return Err(VaultError::InvalidTemplate("grid is empty".to_string()));
        }
        if let Some(bad) = rows.iter().position(|row| row.len() != width) {
            return Err(VaultError::InvalidTemplate(format!(
                "grid row {} has width {}, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }

        Ok(Self { rows })
    }

    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Gets the symbol at a position.
    pub fn get(&self, x: usize, y: usize) -> Option<char> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Sets the symbol at a position. Out-of-range positions are ignored.
    pub fn set(&mut self, x: usize, y: usize, symbol: char) {
        if let Some(cell) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *cell = symbol;
        }
    }

    /// All distinct symbols in the grid.
    pub fn symbols(&self) -> BTreeSet<char> {
        self.rows.iter().flatten().copied().collect()
    }

    /// Positions holding `symbol`, in row-major order.
    pub fn positions_of(&self, symbol: char) -> Vec<(usize, usize)> {
        let mut positions = Vec::new();
        for (y, row) in self.rows.iter().enumerate() {
            for (x, &cell) in row.iter().enumerate() {
                if cell == symbol {
                    positions.push((x, y));
                }
            }
        }
        positions
    }

    /// Whether `symbol` appears anywhere in the grid.
    pub fn contains(&self, symbol: char) -> bool {
        self.rows.iter().flatten().any(|&c| c == symbol)
    }

    /// The grid as text rows.
    pub fn to_rows(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.iter().collect()).collect()
    }
}

impl TryFrom<Vec<String>> for Grid {
    type Error = VaultError;

    fn try_from(rows: Vec<String>) -> VaultResult<Self> {
        Grid::from_rows(&rows)
    }
}

impl From<Grid> for Vec<String> {
    fn from(grid: Grid) -> Self {
        grid.to_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::from_rows(&["xAAx", "x..x"]).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(1, 0), Some('A'));
        assert_eq!(grid.get(9, 9), None);
    }

    #[test]
    fn test_ragged_and_empty_grids_rejected() {
        assert!(Grid::from_rows(&["xxx", "xx"]).is_err());
        assert!(Grid::from_rows::<&str>(&[]).is_err());
        assert!(Grid::from_rows(&[""]).is_err());
    }

    #[test]
    fn test_positions_are_row_major() {
        let grid = Grid::from_rows(&["A.A", ".A."]).unwrap();
        assert_eq!(grid.positions_of('A'), vec![(0, 0), (2, 0), (1, 1)]);
        assert_eq!(grid.symbols().into_iter().collect::<String>(), ".A");
    }

    #[test]
    fn test_set_and_round_trip_rows() {
        let mut grid = Grid::from_rows(&["AB"]).unwrap();
        grid.set(1, 0, 'x');
        grid.set(5, 5, 'y');
        assert_eq!(grid.to_rows(), vec!["Ax".to_string()]);

        let json = serde_json::to_string(&grid).unwrap();
        assert_eq!(json, r#"["Ax"]"#);
        let ragged: Result<Grid, _> = serde_json::from_str(r#"["ab","c"]"#);
        assert!(ragged.is_err());
    }
}
