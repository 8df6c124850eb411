//! Exchange formats for the host runtime.
//!
//! The host ships each boundary matrix as a flat array of ±1 entries packed
//! into machine words and receives the reduced complex back as dense
//! column-major blocks. Nothing here is clever; it only has to agree with
//! the host bit for bit.

use itertools::Itertools;

use crate::coefficients::{Coefficient, GroupRing};
use crate::complex::ChainComplex;
use crate::sparse::{Index, SparseMatrix};
use crate::CollapseError;

/// Coefficients the host knows how to ship across the boundary.
pub trait HostValue: Coefficient {
    /// Decode a packed ±1 entry. `odd` selects the t-component and is only
    /// meaningful for the group ring; an integer complex must reject it.
    fn from_packed_unit(negative: bool, odd: bool) -> Result<Self, CollapseError>;

    /// Split a value into its ordinary and t-component parts.
    fn parts(self) -> (i64, i64);
}

impl HostValue for i64 {
    fn from_packed_unit(negative: bool, odd: bool) -> Result<Self, CollapseError> {
        if odd {
            return Err(CollapseError::HostFormat(
                "t-component entry in an integer complex",
            ));
        }
        Ok(if negative { -1 } else { 1 })
    }

    fn parts(self) -> (i64, i64) {
        (self, 0)
    }
}

impl HostValue for GroupRing {
    fn from_packed_unit(negative: bool, odd: bool) -> Result<Self, CollapseError> {
        let unit = if negative { -1 } else { 1 };
        Ok(if odd {
            GroupRing::new(0, unit)
        } else {
            GroupRing::new(unit, 0)
        })
    }

    fn parts(self) -> (i64, i64) {
        (self.a, self.b)
    }
}

// ======== Packed input =======================================

/// Column indices occupy the low 31 bits of a shrunk word; bit 31 flags the
/// t-component and the upper half holds the row.
const COLUMN_BITS: u32 = 31;
const COLUMN_MASK: u64 = (1 << COLUMN_BITS) - 1;

/// One boundary matrix as shipped by the host.
///
/// `Shrunk` is the one-word-per-entry layout of 64-bit hosts:
/// `value · (row · 2³² + column)` with `value ∈ {+1, −1}` and bit 31
/// flagging the t-component. `Pairs` is the two-word legacy layout of
/// 32-bit hosts, `(row, value · column)`, where the sign of the row word
/// carries the t-flag instead. Shrunk is the default; Pairs is kept for
/// hosts that still produce it.
#[derive(Debug, Clone, Copy)]
pub enum PackedMatrix<'a> {
    Shrunk(&'a [i64]),
    Pairs(&'a [i32]),
}

struct PackedEntry {
    row: Index,
    col: Index,
    negative: bool,
    odd: bool,
}

impl PackedMatrix<'_> {
    fn entries(&self) -> Result<Vec<PackedEntry>, CollapseError> {
        match *self {
            PackedMatrix::Shrunk(words) => Ok(words
                .iter()
                .map(|&word| {
                    let packed = word.unsigned_abs();
                    PackedEntry {
                        row: (packed >> 32) as Index,
                        col: (packed & COLUMN_MASK) as Index,
                        negative: word < 0,
                        odd: packed & (1 << COLUMN_BITS) != 0,
                    }
                })
                .collect()),
            PackedMatrix::Pairs(words) => {
                if words.len() % 2 != 0 {
                    return Err(CollapseError::HostFormat(
                        "odd number of words in a pair-encoded matrix",
                    ));
                }
                Ok(words
                    .iter()
                    .tuples()
                    .map(|(&row, &col)| PackedEntry {
                        row: row.unsigned_abs(),
                        col: col.unsigned_abs(),
                        negative: col < 0,
                        odd: row < 0,
                    })
                    .collect())
            }
        }
    }
}

fn unpack<V: HostValue>(
    packed: PackedMatrix<'_>,
    num_rows: Index,
    num_cols: Index,
) -> Result<SparseMatrix<V>, CollapseError> {
    let mut matrix = SparseMatrix::new(num_rows, num_cols)?;
    for entry in packed.entries()? {
        let value = V::from_packed_unit(entry.negative, entry.odd)?;
        matrix.put(entry.row, entry.col, value)?;
    }
    Ok(matrix)
}

/// Reduce a complex delivered in the host's packed layout.
///
/// `ranks` has one entry per chain group and `matrices` one entry per
/// boundary. Matrices are unpacked lazily, the first time the reduction
/// touches them.
pub fn reduce_packed<V: HostValue>(
    ranks: &[Index],
    matrices: &[PackedMatrix<'_>],
) -> Result<Reduced<V>, CollapseError> {
    if matrices.len() != ranks.len().saturating_sub(1) {
        return Err(CollapseError::HostFormat(
            "expected one packed matrix per boundary",
        ));
    }
    let mut complex = ChainComplex::new(ranks.to_vec());
    complex.reduce_with(|g, num_rows, num_cols| unpack(matrices[g], num_rows, num_cols))?;
    complex.into_dense()
}

// ======== Dense output =======================================

/// A dense column-major matrix block handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dense<V> {
    pub num_rows: Index,
    pub num_cols: Index,
    /// Column-major, `num_rows · num_cols` values.
    pub entries: Vec<V>,
}

impl<V: Coefficient> Dense<V> {
    pub fn zeros(num_rows: Index, num_cols: Index) -> Self {
        Dense {
            num_rows,
            num_cols,
            entries: vec![V::zero(); (num_rows * num_cols) as usize],
        }
    }

    /// 1-based lookup, for symmetry with the sparse side.
    pub fn get(&self, row: Index, col: Index) -> V {
        self.entries[((col - 1) * self.num_rows + (row - 1)) as usize]
    }
}

impl<V: HostValue> Dense<V> {
    /// Split into the ordinary and t-component planes, both column-major.
    pub fn parts(&self) -> (Vec<i64>, Vec<i64>) {
        self.entries.iter().map(|&value| value.parts()).unzip()
    }
}

/// Result of a reduction in the host's exchange shape: the surviving rank of
/// every group, and one dense boundary block per differential. `None` stands
/// in for any 0×k or k×0 matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduced<V> {
    pub ranks: Vec<Index>,
    pub matrices: Vec<Option<Dense<V>>>,
}
