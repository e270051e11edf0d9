//! Error taxonomy for the navigation engine.
//!
//! Hot-path outcomes (blocked cells, missing paths, stale tokens) are values of
//! [`NavError`] returned alongside booleans and status enums; they are expected
//! game events, not failures. [`GridError`] and [`SnapshotError`] are the only
//! hard errors and surface at construction or load time.

use std::fmt;

/// Expected runtime outcomes of grid, occupancy and path queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NavError {
    OutOfBounds,
    BlockedByTerrain,
    BlockedByEntity,
    NoPath,
    BudgetExceeded,
    InvalidReservation,
    Truncated,
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NavError::OutOfBounds => "position out of bounds",
            NavError::BlockedByTerrain => "blocked by terrain",
            NavError::BlockedByEntity => "blocked by entity",
            NavError::NoPath => "no path exists",
            NavError::BudgetExceeded => "search budget exceeded",
            NavError::InvalidReservation => "reservation token does not match",
            NavError::Truncated => "path truncated to output buffer",
        };
        f.write_str(text)
    }
}

impl std::error::Error for NavError {}

/// Grid construction contract violations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridError {
    InvalidDimensions { width: i32, height: i32, layers: i32 },
    /// Morton storage packs coordinates into `u16`.
    DimensionsTooLarge { width: i32, height: i32 },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::InvalidDimensions { width, height, layers } => write!(
                f,
                "grid dimensions must be positive (width {width}, height {height}, layers {layers})"
            ),
            GridError::DimensionsTooLarge { width, height } => write!(
                f,
                "grid {width}x{height} exceeds the 65535x65535 Morton limit"
            ),
        }
    }
}

impl std::error::Error for GridError {}

/// Failures while saving or restoring a grid snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Encoding(bincode::Error),
    Deflate(std::io::Error),
    UnsupportedVersion(u32),
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Payload decoded to the wrong size or a malformed run stream.
    Corrupt(&'static str),
    Grid(GridError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "snapshot I/O failed: {e}"),
            SnapshotError::Encoding(e) => write!(f, "snapshot encoding failed: {e}"),
            SnapshotError::Deflate(e) => write!(f, "deflate stream failed: {e}"),
            SnapshotError::UnsupportedVersion(v) => write!(f, "unsupported snapshot version {v}"),
            SnapshotError::ChecksumMismatch { expected, actual } => write!(
                f,
                "snapshot checksum mismatch (expected {expected:#010x}, got {actual:#010x})"
            ),
            SnapshotError::Corrupt(what) => write!(f, "corrupt snapshot payload: {what}"),
            SnapshotError::Grid(e) => write!(f, "snapshot describes an invalid grid: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(e) | SnapshotError::Deflate(e) => Some(e),
            SnapshotError::Encoding(e) => Some(e),
            SnapshotError::Grid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<bincode::Error> for SnapshotError {
    fn from(e: bincode::Error) -> Self {
        SnapshotError::Encoding(e)
    }
}

impl From<GridError> for SnapshotError {
    fn from(e: GridError) -> Self {
        SnapshotError::Grid(e)
    }
}
