//! Chain complexes of free groups and their reduction by elementary
//! collapses.
//!
//! A generator of group g whose boundary carries a generator of group g−1
//! with a unit coefficient can be paired off with it: both collapse away and
//! the boundaries of the surviving generators are adjusted by column
//! additions. Exhausting such collapses shrinks the complex without changing
//! its homology, which is all the host needs.

use log::debug;

use crate::coefficients::Coefficient;
use crate::host::{Dense, Reduced};
use crate::sparse::{Index, SparseMatrix};
use crate::CollapseError;

/// A finite chain complex with free chain groups.
///
/// `ranks[g]` is the original rank of group g and never changes; `live[g]`
/// tracks how many generators survive. The boundary matrix `D[g]` sits
/// between groups g and g+1 with `rank[g+1]` rows and `rank[g]` columns: row
/// r lists the boundary of generator r of group g+1. A slot holds `None`
/// until the matrix is first needed (or forever, when either side has rank
/// zero).
pub struct ChainComplex<V> {
    ranks: Vec<Index>,
    live: Vec<Index>,
    matrices: Vec<Option<SparseMatrix<V>>>,
    /// First and last group with a non-zero rank, or `None` if the complex
    /// is empty.
    bounds: Option<(usize, usize)>,
}

impl<V: Coefficient> ChainComplex<V> {
    pub fn new(ranks: Vec<Index>) -> Self {
        let mut bounds = None;
        for (g, &rank) in ranks.iter().enumerate() {
            if rank > 0 {
                bounds = Some(match bounds {
                    None => (g, g),
                    Some((first, _)) => (first, g),
                });
            }
        }
        let groups = ranks.len();
        ChainComplex {
            live: ranks.clone(),
            ranks,
            matrices: (0..groups.saturating_sub(1)).map(|_| None).collect(),
            bounds,
        }
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn ranks(&self) -> &[Index] {
        &self.ranks
    }

    /// Current generator counts, one per group.
    pub fn live_ranks(&self) -> &[Index] {
        &self.live
    }

    pub fn boundary(&self, g: usize) -> Option<&SparseMatrix<V>> {
        self.matrices.get(g).and_then(Option::as_ref)
    }

    /// Install the boundary matrix between groups g and g+1.
    pub fn set_boundary(
        &mut self,
        g: usize,
        matrix: SparseMatrix<V>,
    ) -> Result<(), CollapseError> {
        if g + 1 >= self.ranks.len() {
            return Err(CollapseError::IndexOutOfRange);
        }
        if matrix.num_rows() != self.ranks[g + 1] || matrix.num_cols() != self.ranks[g] {
            return Err(CollapseError::Corrupt(
                "boundary dimensions don't match group ranks",
            ));
        }
        self.matrices[g] = Some(matrix);
        Ok(())
    }

    fn boundary_ref(&self, g: usize) -> Result<&SparseMatrix<V>, CollapseError> {
        self.matrices[g]
            .as_ref()
            .ok_or(CollapseError::Corrupt("boundary matrix is not materialized"))
    }

    fn boundary_mut(&mut self, g: usize) -> Result<&mut SparseMatrix<V>, CollapseError> {
        self.matrices[g]
            .as_mut()
            .ok_or(CollapseError::Corrupt("boundary matrix is not materialized"))
    }

    // ======== Reduction ======================================

    /// Collapse the complex as far as possible, using whatever boundary
    /// matrices are already installed (missing ones are taken as zero).
    pub fn reduce(&mut self) -> Result<(), CollapseError> {
        self.reduce_with(|_, num_rows, num_cols| SparseMatrix::new(num_rows, num_cols))
    }

    /// Collapse the complex as far as possible, materializing each missing
    /// boundary matrix on first touch through `materialize(g, rows, cols)`.
    ///
    /// Groups are processed left to right. For each one, rows with at most
    /// two entries are eliminated to exhaustion first: those sweeps are cheap
    /// and the cascades they trigger thin the matrix out before the full
    /// passes run.
    pub fn reduce_with<F>(&mut self, mut materialize: F) -> Result<(), CollapseError>
    where
        F: FnMut(usize, Index, Index) -> Result<SparseMatrix<V>, CollapseError>,
    {
        let Some((first, last)) = self.bounds else {
            return Ok(());
        };
        for group in first + 1..=last {
            self.ensure_boundaries(group, first, last, &mut materialize)?;

            let mut short_rounds = 0u32;
            let mut full_rounds = 0u32;
            while self.eliminate(group, true, first, last)? {
                short_rounds += 1;
            }
            while self.eliminate(group, false, first, last)? {
                full_rounds += 1;
            }
            debug!(
                "group {group}: {short_rounds} short and {full_rounds} full rounds, \
                 {} of {} generators left",
                self.live[group], self.ranks[group]
            );
        }
        Ok(())
    }

    fn ensure_boundaries<F>(
        &mut self,
        group: usize,
        first: usize,
        last: usize,
        materialize: &mut F,
    ) -> Result<(), CollapseError>
    where
        F: FnMut(usize, Index, Index) -> Result<SparseMatrix<V>, CollapseError>,
    {
        // Only differentials between non-empty groups are interesting.
        for g in group.saturating_sub(2)..=group {
            if g < first || g >= last || self.matrices[g].is_some() {
                continue;
            }
            let num_rows = self.ranks[g + 1];
            let num_cols = self.ranks[g];
            if num_rows == 0 || num_cols == 0 {
                continue;
            }
            let matrix = materialize(g, num_rows, num_cols)?;
            if matrix.num_rows() != num_rows || matrix.num_cols() != num_cols {
                return Err(CollapseError::Corrupt(
                    "materialized matrix has wrong dimensions",
                ));
            }
            self.matrices[g] = Some(matrix);
        }
        Ok(())
    }

    /// One scan over the rows of D[group−1], collapsing every generator of
    /// `group` whose row holds a unit. Returns whether anything was
    /// eliminated. With `short_only`, rows with more than two entries are
    /// skipped.
    fn eliminate(
        &mut self,
        group: usize,
        short_only: bool,
        first: usize,
        last: usize,
    ) -> Result<bool, CollapseError> {
        if self.matrices[group - 1].is_none() {
            return Ok(false);
        }
        let mut eliminated = 0u32;

        for gen in 1..=self.ranks[group] {
            let matrix = self.boundary_ref(group - 1)?;
            let Some(count) = matrix.row_count(gen)? else {
                continue; // already gone
            };
            if short_only && count > 2 {
                continue;
            }
            let Some((pivot_col, pivot_val)) = matrix.find_unit_in_row(gen)? else {
                continue;
            };
            eliminated += 1;

            // pivot² = 1, so −pivot is the scalar that clears the rest of
            // this row via column additions into the pivot column's partners.
            let scalar = -pivot_val;

            // Entries of this row are freed while the sweep runs (each
            // column addition zeroes one of them), so capture `next`
            // before the addition.
            let mut cur = self.boundary_ref(group - 1)?.row_head(gen);
            while let Some(slot) = cur {
                let (col, value, next) = self.boundary_ref(group - 1)?.entry(slot);
                cur = next;
                if col != pivot_col {
                    self.boundary_mut(group - 1)?
                        .add_cols(col, pivot_col, value * scalar)?;
                }
            }

            // Only the pivot entry may remain, and killing the incident
            // generator must take it with it.
            if self.boundary_ref(group - 1)?.row_count(gen)? != Some(1) {
                return Err(CollapseError::Corrupt("generator is not killed cleanly"));
            }
            self.kill_gen(group - 1, pivot_col, first, last)?;
            if self.boundary_ref(group - 1)?.row_count(gen)? != Some(0) {
                return Err(CollapseError::Corrupt("generator is not killed cleanly"));
            }
            self.kill_gen(group, gen, first, last)?;
        }

        Ok(eliminated > 0)
    }

    /// Remove a dying generator from both boundary matrices adjacent to its
    /// group and decrement the group's generator count.
    fn kill_gen(
        &mut self,
        group: usize,
        gen: Index,
        first: usize,
        last: usize,
    ) -> Result<(), CollapseError> {
        if group > first {
            if let Some(matrix) = self.matrices[group - 1].as_mut() {
                matrix.erase_row(gen, true)?;
            }
        }
        if group < last {
            if let Some(matrix) = self.matrices[group].as_mut() {
                matrix.erase_col(gen, true)?;
            }
        }
        self.live[group] -= 1;
        Ok(())
    }

    // ======== Export =========================================

    /// Consume the complex, exporting the live ranks and every surviving
    /// boundary matrix as a dense column-major block. Matrices with a zero
    /// side are reported as `None`. Entries are scrubbed out with `remove`
    /// as they are copied, so a bilateral inconsistency left behind by an
    /// earlier bug is caught here instead of shipped to the host.
    pub fn into_dense(mut self) -> Result<Reduced<V>, CollapseError> {
        let groups = self.ranks.len();
        let mut out = Reduced {
            ranks: self.live.clone(),
            matrices: (0..groups.saturating_sub(1)).map(|_| None).collect(),
        };
        let Some((first, last)) = self.bounds else {
            return Ok(out);
        };
        for group in first..last {
            let num_cols = self.live[group];
            let num_rows = self.live[group + 1];
            if num_rows == 0 || num_cols == 0 {
                continue;
            }
            out.matrices[group] = Some(match self.matrices[group].take() {
                Some(matrix) => densify(matrix, num_rows, num_cols)?,
                // Never materialized: survives as all zeroes.
                None => Dense::zeros(num_rows, num_cols),
            });
        }
        Ok(out)
    }
}

/// Copy the surviving entries of a sparse matrix into a dense column-major
/// block, renumbering past the tombstoned rows and columns.
fn densify<V: Coefficient>(
    mut matrix: SparseMatrix<V>,
    num_rows: Index,
    num_cols: Index,
) -> Result<Dense<V>, CollapseError> {
    let mut live_rows = Vec::with_capacity(num_rows as usize);
    for row in 1..=matrix.num_rows() {
        if matrix.row_count(row)?.is_some() {
            live_rows.push(row);
        }
    }
    let mut live_cols = Vec::with_capacity(num_cols as usize);
    for col in 1..=matrix.num_cols() {
        if matrix.col_count(col)?.is_some() {
            live_cols.push(col);
        }
    }
    if live_rows.len() != num_rows as usize || live_cols.len() != num_cols as usize {
        return Err(CollapseError::Corrupt("matrix is corrupt"));
    }

    let mut entries = Vec::with_capacity((num_rows * num_cols) as usize);
    for &col in &live_cols {
        for &row in &live_rows {
            entries.push(matrix.remove(row, col)?);
        }
    }
    Ok(Dense {
        num_rows,
        num_cols,
        entries,
    })
}
