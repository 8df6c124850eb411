//! Elementary-collapse reduction of chain complexes with free chain groups.
//!
//! Given a finite sequence of free chain groups connected by boundary
//! matrices over the integers or over Z\[t\]/(t² − 1), the reducer repeatedly
//! pairs off a generator whose boundary carries another generator with a unit
//! coefficient and collapses the pair. The result is a chain-homotopy
//! equivalent complex with fewer generators; homology itself is computed by
//! the host, not here.
//!
//! The crate is three layers: [`coefficients`] defines the value contract the
//! two supported rings satisfy, [`sparse`] holds the dually indexed sparse
//! matrices every boundary lives in, and [`complex`] drives the elimination.
//! [`host`] decodes the packed input words a host runtime ships and repacks
//! the surviving matrices densely.

pub mod coefficients;
pub mod complex;
pub mod host;
pub mod sparse;

#[cfg(test)]
pub(crate) mod test_utils;

use std::fmt;

/// Every way a reduction can fail. All of these are fatal: the caller is
/// expected to drop the complex and surface the message to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseError {
    /// A row or column index lies outside the matrix.
    IndexOutOfRange,
    /// A tombstoned row or column was read or written.
    VectorDeleted(&'static str),
    /// The row and column views of a matrix disagree about an entry.
    EntryMismatch,
    /// An entry magnitude exceeded
    /// [`MAX_MAGNITUDE`](coefficients::Coefficient::MAX_MAGNITUDE).
    EntryTooLarge,
    /// Internal storage failed a structural check.
    Corrupt(&'static str),
    /// The packed host input could not be decoded.
    HostFormat(&'static str),
    /// Matrices must have at least one row and one column.
    EmptyDimensions,
}

impl fmt::Display for CollapseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapseError::IndexOutOfRange => write!(f, "matrix index out of range"),
            CollapseError::VectorDeleted(op) => write!(f, "{op}: vector is already deleted"),
            CollapseError::EntryMismatch => write!(f, "row and column entries don't match"),
            CollapseError::EntryTooLarge => write!(f, "entry's value is too big"),
            CollapseError::Corrupt(what) => write!(f, "{what}"),
            CollapseError::HostFormat(what) => write!(f, "bad packed input: {what}"),
            CollapseError::EmptyDimensions => {
                write!(f, "number of rows or columns is too small")
            }
        }
    }
}

impl std::error::Error for CollapseError {}
