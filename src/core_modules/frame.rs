// THEORY:
// The `Frame` module is the lowest layer of the monitor. A `Frame` is a single
// snapshot from the thermal sensor: a rectangular grid of temperature readings.
//
// Key architectural principles:
// 1.  **Dumb Data Container**: Like a pixel buffer, a `Frame` holds its readings
//     in a flat, row-major `Vec<f64>` and knows how to summarise itself (min, max,
//     row access). It does not know about windows, thresholds or rendering.
// 2.  **Validated at the Boundary**: The only way to build a `Frame` from untrusted
//     input is `Frame::from_json`, which checks that the payload really is a
//     non-empty, rectangular, 2-D array of finite numbers. Anything else is an
//     `InvalidFrame` error and never reaches the window.
// 3.  **Identity by Position**: A frame's `sequence` is the zero-based index of the
//     raw record it came from, which keeps frames traceable after decimation.

use serde_json::Value;
use thiserror::Error;

/// Why a raw record could not be turned into a `Frame`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("record {sequence} is not a JSON object with an `image` field")]
    MissingImage { sequence: u64 },

    #[error("record {sequence}: `image` is not a 2-D array")]
    NotTwoDimensional { sequence: u64 },

    #[error("record {sequence}: `image` has no cells")]
    Empty { sequence: u64 },

    #[error("record {sequence}: row {row} has {found} cells, expected {expected}")]
    Ragged {
        sequence: u64,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("record {sequence}: cell ({row}, {col}) is not a finite number")]
    NonNumeric { sequence: u64, row: usize, col: usize },
}

impl FrameError {
    pub fn sequence(&self) -> u64 {
        match self {
            FrameError::MissingImage { sequence }
            | FrameError::NotTwoDimensional { sequence }
            | FrameError::Empty { sequence }
            | FrameError::Ragged { sequence, .. }
            | FrameError::NonNumeric { sequence, .. } => *sequence,
        }
    }
}

/// An immutable grid of temperature readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based position of the source record this frame was decoded from.
    sequence: u64,
    /// Number of grid rows.
    rows: usize,
    /// Number of grid columns.
    cols: usize,
    /// Row-major readings, `rows * cols` long.
    cells: Vec<f64>,
}

impl Frame {
    /// Builds a frame from already-validated rows.
    pub fn from_rows(sequence: u64, rows: Vec<Vec<f64>>) -> Result<Self, FrameError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(FrameError::Empty { sequence });
        }

        let mut cells = Vec::with_capacity(height * width);
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(FrameError::Ragged {
                    sequence,
                    row: row_index,
                    expected: width,
                    found: row.len(),
                });
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(FrameError::NonNumeric {
                    sequence,
                    row: row_index,
                    col,
                });
            }
            cells.extend(row);
        }

        Ok(Self {
            sequence,
            rows: height,
            cols: width,
            cells,
        })
    }

    /// Decodes the `image` payload of a source record.
    pub fn from_json(sequence: u64, image: &Value) -> Result<Self, FrameError> {
        let outer = image
            .as_array()
            .ok_or(FrameError::NotTwoDimensional { sequence })?;

        let mut rows = Vec::with_capacity(outer.len());
        for (row_index, row) in outer.iter().enumerate() {
            let row = row
                .as_array()
                .ok_or(FrameError::NotTwoDimensional { sequence })?;
            let mut values = Vec::with_capacity(row.len());
            for (col, cell) in row.iter().enumerate() {
                let value = cell.as_f64().ok_or(FrameError::NonNumeric {
                    sequence,
                    row: row_index,
                    col,
                })?;
                values.push(value);
            }
            rows.push(values);
        }

        Self::from_rows(sequence, rows)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.cols;
        &self.cells[start..start + self.cols]
    }

    /// Reading at `(row, col)`.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.cols + col]
    }

    pub fn max(&self) -> f64 {
        self.cells.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.cells.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_rectangular_grid() {
        let frame = Frame::from_json(7, &json!([[1, 2.5, 3], [4, 5, 60]])).unwrap();
        assert_eq!(frame.sequence(), 7);
        assert_eq!((frame.rows(), frame.cols()), (2, 3));
        assert_eq!(frame.row(1), &[4.0, 5.0, 60.0]);
        assert_eq!(frame.at(0, 1), 2.5);
        assert_eq!(frame.max(), 60.0);
        assert_eq!(frame.min(), 1.0);
    }

    #[test]
    fn rejects_flat_array() {
        let err = Frame::from_json(0, &json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, FrameError::NotTwoDimensional { sequence: 0 });
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Frame::from_json(3, &json!([[1, 2], [3]])).unwrap_err();
        assert_eq!(
            err,
            FrameError::Ragged {
                sequence: 3,
                row: 1,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(err.sequence(), 3);
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let err = Frame::from_json(1, &json!([[1, "hot"]])).unwrap_err();
        assert_eq!(
            err,
            FrameError::NonNumeric {
                sequence: 1,
                row: 0,
                col: 1
            }
        );
    }

    #[test]
    fn rejects_empty_grids() {
        assert!(matches!(
            Frame::from_json(0, &json!([])),
            Err(FrameError::Empty { .. })
        ));
        assert!(matches!(
            Frame::from_json(0, &json!([[]])),
            Err(FrameError::Empty { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_rows() {
        let err = Frame::from_rows(2, vec![vec![1.0, f64::NAN]]).unwrap_err();
        assert!(matches!(err, FrameError::NonNumeric { col: 1, .. }));
    }
}
