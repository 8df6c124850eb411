//! Dually indexed sparse matrices.
//!
//! Every non-zero entry is stored twice: once in the ordered list for its row
//! and once in the ordered list for its column, with equal values. Keeping
//! the two views consistent across cascading row and column operations is the
//! whole game; the consistency checks here are cheap and stay on.
//!
//! Entry nodes live in a single arena per matrix (a `Vec` slab with an
//! intrusive free list) and link to their successor by slot id. A slot handle
//! stays valid until the entry it names is removed, so a traversal that
//! mutates the matrix must capture `next` before the mutation; see the
//! elimination sweep in [`crate::complex`].

use std::fmt;

use crate::coefficients::Coefficient;
use crate::CollapseError;


/// 1-based row/column index, matching the host's convention.
pub type Index = u32;

/// Handle into a matrix's entry arena.
pub(crate) type Slot = u32;

// ======== Storage ============================================

/// Which family of vectors an operation walks; the other family is the
/// "orthogonal" one that must be kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

impl Axis {
    fn across(self) -> Axis {
        match self {
            Axis::Row => Axis::Col,
            Axis::Col => Axis::Row,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    index: Index,
    value: V,
    next: Option<Slot>,
}

/// Root of one row or column. `len` counts live entries; a deleted vector is
/// permanently empty and must not be touched again.
#[derive(Debug, Clone, Copy)]
struct Root {
    head: Option<Slot>,
    len: u32,
    deleted: bool,
}

impl Root {
    const EMPTY: Root = Root {
        head: None,
        len: 0,
        deleted: false,
    };
}

/// A sparse matrix with row-wise and column-wise entry lists kept in
/// lockstep. Indices are 1-based.
pub struct SparseMatrix<V> {
    rows: Vec<Root>,
    cols: Vec<Root>,
    arena: Vec<Entry<V>>,
    free: Option<Slot>,
}

impl<V: Coefficient> SparseMatrix<V> {
    pub fn new(num_rows: Index, num_cols: Index) -> Result<Self, CollapseError> {
        if num_rows < 1 || num_cols < 1 {
            return Err(CollapseError::EmptyDimensions);
        }
        Ok(SparseMatrix {
            rows: vec![Root::EMPTY; num_rows as usize],
            cols: vec![Root::EMPTY; num_cols as usize],
            arena: Vec::new(),
            free: None,
        })
    }

    pub fn num_rows(&self) -> Index {
        self.rows.len() as Index
    }

    pub fn num_cols(&self) -> Index {
        self.cols.len() as Index
    }

    fn alloc(&mut self, index: Index, value: V, next: Option<Slot>) -> Slot {
        match self.free {
            Some(slot) => {
                self.free = self.arena[slot as usize].next;
                self.arena[slot as usize] = Entry { index, value, next };
                slot
            }
            None => {
                self.arena.push(Entry { index, value, next });
                (self.arena.len() - 1) as Slot
            }
        }
    }

    fn release(&mut self, slot: Slot) {
        let entry = &mut self.arena[slot as usize];
        entry.value = V::zero();
        entry.next = self.free;
        self.free = Some(slot);
    }

    fn root(&self, axis: Axis, at: Index) -> &Root {
        match axis {
            Axis::Row => &self.rows[(at - 1) as usize],
            Axis::Col => &self.cols[(at - 1) as usize],
        }
    }

    fn root_mut(&mut self, axis: Axis, at: Index) -> &mut Root {
        match axis {
            Axis::Row => &mut self.rows[(at - 1) as usize],
            Axis::Col => &mut self.cols[(at - 1) as usize],
        }
    }

    fn check_indices(&self, row: Index, col: Index) -> Result<(), CollapseError> {
        if row < 1 || row > self.num_rows() || col < 1 || col > self.num_cols() {
            return Err(CollapseError::IndexOutOfRange);
        }
        Ok(())
    }

    // ======== Single-vector operations =======================

    /// First slot whose entry index is `>= ind`, with its predecessor.
    fn seek(&self, head: Option<Slot>, ind: Index) -> (Option<Slot>, Option<Slot>) {
        let mut prev = None;
        let mut cur = head;
        while let Some(slot) = cur {
            if self.arena[slot as usize].index >= ind {
                break;
            }
            prev = cur;
            cur = self.arena[slot as usize].next;
        }
        (prev, cur)
    }

    fn line_get(&self, axis: Axis, at: Index, ind: Index) -> V {
        let (_, cur) = self.seek(self.root(axis, at).head, ind);
        match cur {
            Some(slot) if self.arena[slot as usize].index == ind => {
                self.arena[slot as usize].value
            }
            _ => V::zero(),
        }
    }

    /// Remove one entry, returning its value (or zero when absent).
    fn line_remove(
        &mut self,
        axis: Axis,
        at: Index,
        ind: Index,
        op: &'static str,
    ) -> Result<V, CollapseError> {
        if self.root(axis, at).deleted {
            return Err(CollapseError::VectorDeleted(op));
        }
        let (prev, cur) = self.seek(self.root(axis, at).head, ind);
        let Some(slot) = cur else {
            return Ok(V::zero());
        };
        if self.arena[slot as usize].index != ind {
            return Ok(V::zero());
        }
        let value = self.arena[slot as usize].value;
        let next = self.arena[slot as usize].next;
        match prev {
            Some(p) => self.arena[p as usize].next = next,
            None => self.root_mut(axis, at).head = next,
        }
        self.release(slot);
        self.root_mut(axis, at).len -= 1;
        Ok(value)
    }

    /// Insert or overwrite one entry; a zero value removes instead.
    fn line_put(
        &mut self,
        axis: Axis,
        at: Index,
        ind: Index,
        value: V,
        op: &'static str,
    ) -> Result<(), CollapseError> {
        if self.root(axis, at).deleted {
            return Err(CollapseError::VectorDeleted(op));
        }
        if value.is_zero() {
            self.line_remove(axis, at, ind, op)?;
            return Ok(());
        }
        let (prev, cur) = self.seek(self.root(axis, at).head, ind);
        if let Some(slot) = cur {
            if self.arena[slot as usize].index == ind {
                self.arena[slot as usize].value = value;
                return Ok(());
            }
        }
        let slot = self.alloc(ind, value, cur);
        match prev {
            Some(p) => self.arena[p as usize].next = Some(slot),
            None => self.root_mut(axis, at).head = Some(slot),
        }
        self.root_mut(axis, at).len += 1;
        Ok(())
    }

    // ======== Matrix operations ==============================

    /// The stored value at `(row, col)`, or zero. Debug builds cross-check
    /// the row view against the column view.
    pub fn get(&self, row: Index, col: Index) -> Result<V, CollapseError> {
        self.check_indices(row, col)?;
        let value = self.line_get(Axis::Row, row, col);
        #[cfg(debug_assertions)]
        {
            if value != self.line_get(Axis::Col, col, row) {
                return Err(CollapseError::EntryMismatch);
            }
        }
        Ok(value)
    }

    /// Insert or overwrite `(row, col)`; a zero value removes the entry.
    pub fn put(&mut self, row: Index, col: Index, value: V) -> Result<(), CollapseError> {
        self.check_indices(row, col)?;
        if value.magnitude() > V::MAX_MAGNITUDE {
            return Err(CollapseError::EntryTooLarge);
        }
        if value.is_zero() {
            self.remove(row, col)?;
            return Ok(());
        }
        self.line_put(Axis::Row, row, col, value, "put")?;
        self.line_put(Axis::Col, col, row, value, "put")
    }

    /// Remove `(row, col)` from both views, returning the removed value
    /// (or zero when absent).
    pub fn remove(&mut self, row: Index, col: Index) -> Result<V, CollapseError> {
        self.check_indices(row, col)?;
        let from_row = self.line_remove(Axis::Row, row, col, "remove")?;
        let from_col = self.line_remove(Axis::Col, col, row, "remove")?;
        if from_row != from_col {
            return Err(CollapseError::EntryMismatch);
        }
        Ok(from_row)
    }

    /// Erase every entry in `row`, cleaning the matching column entries.
    /// With `tombstone` set the row is marked deleted for good.
    pub fn erase_row(&mut self, row: Index, tombstone: bool) -> Result<(), CollapseError> {
        self.check_indices(row, 1)?;
        self.erase_line(Axis::Row, row, tombstone)
    }

    /// Erase every entry in `col`, cleaning the matching row entries.
    pub fn erase_col(&mut self, col: Index, tombstone: bool) -> Result<(), CollapseError> {
        self.check_indices(1, col)?;
        self.erase_line(Axis::Col, col, tombstone)
    }

    fn erase_line(&mut self, axis: Axis, at: Index, tombstone: bool) -> Result<(), CollapseError> {
        if self.root(axis, at).deleted {
            return Err(CollapseError::VectorDeleted("erase"));
        }
        // Unlink head-first so the vector stays well formed at every step.
        while let Some(slot) = self.root(axis, at).head {
            let index = self.arena[slot as usize].index;
            let value = self.arena[slot as usize].value;
            let removed = self.line_remove(axis.across(), index, at, "erase")?;
            if removed != value {
                return Err(CollapseError::EntryMismatch);
            }
            let next = self.arena[slot as usize].next;
            self.root_mut(axis, at).head = next;
            self.root_mut(axis, at).len -= 1;
            self.release(slot);
        }
        if self.root(axis, at).len != 0 {
            return Err(CollapseError::Corrupt("entry count is not 0 after erasing"));
        }
        if tombstone {
            self.root_mut(axis, at).deleted = true;
        }
        Ok(())
    }

    /// Row `row1` ← row `row1` + `scalar` · row `row2`, keeping every touched
    /// column in sync. Returns the largest magnitude produced.
    pub fn add_rows(
        &mut self,
        row1: Index,
        row2: Index,
        scalar: V,
    ) -> Result<i64, CollapseError> {
        self.check_indices(row1, 1)?;
        self.check_indices(row2, 1)?;
        self.add_lines(Axis::Row, row1, row2, scalar)
    }

    /// Column `col1` ← column `col1` + `scalar` · column `col2`.
    pub fn add_cols(
        &mut self,
        col1: Index,
        col2: Index,
        scalar: V,
    ) -> Result<i64, CollapseError> {
        self.check_indices(1, col1)?;
        self.check_indices(1, col2)?;
        self.add_lines(Axis::Col, col1, col2, scalar)
    }

    /// Classic ordered merge of two entry lists. `prev` trails the last entry
    /// kept in the target vector so a freshly cancelled entry can be unlinked
    /// without restarting; every created, updated, or dropped entry is
    /// mirrored into the orthogonal family before the merge advances.
    fn add_lines(
        &mut self,
        axis: Axis,
        at1: Index,
        at2: Index,
        scalar: V,
    ) -> Result<i64, CollapseError> {
        if self.root(axis, at1).deleted || self.root(axis, at2).deleted {
            return Err(CollapseError::VectorDeleted("add"));
        }
        let mut max_magnitude = 0i64;
        let mut prev: Option<Slot> = None;
        let mut cur1 = self.root(axis, at1).head;
        let mut cur2 = self.root(axis, at2).head;

        while let Some(slot2) = cur2 {
            let ind2 = self.arena[slot2 as usize].index;

            // An unmatched entry of the target vector is left alone.
            if let Some(slot1) = cur1 {
                if self.arena[slot1 as usize].index < ind2 {
                    prev = cur1;
                    cur1 = self.arena[slot1 as usize].next;
                    continue;
                }
            }

            // Where to relink from if the touched entry cancels to zero.
            let before = prev;

            let touched: Slot;
            match cur1 {
                Some(slot1) if self.arena[slot1 as usize].index == ind2 => {
                    let sum = self.arena[slot1 as usize].value
                        + scalar * self.arena[slot2 as usize].value;
                    self.arena[slot1 as usize].value = sum;
                    touched = slot1;
                    prev = cur1;
                    cur1 = self.arena[slot1 as usize].next;
                    cur2 = self.arena[slot2 as usize].next;
                }
                _ => {
                    // cur1 is exhausted or sits past ind2: splice in a new entry.
                    let value = scalar * self.arena[slot2 as usize].value;
                    let slot = self.alloc(ind2, value, cur1);
                    match prev {
                        Some(p) => self.arena[p as usize].next = Some(slot),
                        None => self.root_mut(axis, at1).head = Some(slot),
                    }
                    self.root_mut(axis, at1).len += 1;
                    touched = slot;
                    prev = Some(slot);
                    cur2 = self.arena[slot2 as usize].next;
                }
            }

            let value = self.arena[touched as usize].value;
            let magnitude = value.magnitude();
            if magnitude > max_magnitude {
                max_magnitude = magnitude;
            }
            if magnitude > V::MAX_MAGNITUDE {
                return Err(CollapseError::EntryTooLarge);
            }

            let touched_index = self.arena[touched as usize].index;
            self.line_put(axis.across(), touched_index, at1, value, "add")?;

            if value.is_zero() {
                let next = self.arena[touched as usize].next;
                match before {
                    Some(p) => self.arena[p as usize].next = next,
                    None => self.root_mut(axis, at1).head = next,
                }
                self.root_mut(axis, at1).len -= 1;
                self.release(touched);
                prev = before;
            }
        }

        Ok(max_magnitude)
    }

    /// Index and value of the first entry of magnitude 1 in a row, scanning
    /// in ascending column order.
    pub fn find_unit_in_row(
        &self,
        row: Index,
    ) -> Result<Option<(Index, V)>, CollapseError> {
        self.check_indices(row, 1)?;
        let root = self.root(Axis::Row, row);
        if root.deleted {
            return Err(CollapseError::VectorDeleted("find_unit"));
        }
        let mut cur = root.head;
        while let Some(slot) = cur {
            let entry = &self.arena[slot as usize];
            if entry.value.is_unit() {
                return Ok(Some((entry.index, entry.value)));
            }
            cur = entry.next;
        }
        Ok(None)
    }

    /// Live entry count of a row, or `None` once the row is tombstoned.
    pub fn row_count(&self, row: Index) -> Result<Option<u32>, CollapseError> {
        self.check_indices(row, 1)?;
        let root = self.root(Axis::Row, row);
        Ok(if root.deleted { None } else { Some(root.len) })
    }

    /// Live entry count of a column, or `None` once it is tombstoned.
    pub fn col_count(&self, col: Index) -> Result<Option<u32>, CollapseError> {
        self.check_indices(1, col)?;
        let root = self.root(Axis::Col, col);
        Ok(if root.deleted { None } else { Some(root.len) })
    }

    // ======== Raw traversal ==================================

    /// Head slot of a row's entry list, for traversals that mutate the matrix
    /// mid-walk. Capture `next` from [`entry`](Self::entry) before any
    /// operation that may remove the current entry.
    pub(crate) fn row_head(&self, row: Index) -> Option<Slot> {
        self.root(Axis::Row, row).head
    }

    pub(crate) fn entry(&self, slot: Slot) -> (Index, V, Option<Slot>) {
        let entry = &self.arena[slot as usize];
        (entry.index, entry.value, entry.next)
    }

    // ======== Consistency ====================================

    /// Verify every structural invariant: strictly ascending indices within
    /// bounds, no stored zeroes, magnitudes in range, counts matching the
    /// lists, tombstoned vectors empty, and the two views agreeing cell by
    /// cell. Intended for tests and debugging.
    pub fn check_consistency(&self) -> Result<(), CollapseError> {
        for row in 1..=self.num_rows() {
            self.check_line(Axis::Row, row)?;
        }
        for col in 1..=self.num_cols() {
            self.check_line(Axis::Col, col)?;
        }
        Ok(())
    }

    fn check_line(&self, axis: Axis, at: Index) -> Result<(), CollapseError> {
        let root = *self.root(axis, at);
        let max_index = match axis {
            Axis::Row => self.num_cols(),
            Axis::Col => self.num_rows(),
        };
        if root.deleted && root.head.is_some() {
            return Err(CollapseError::Corrupt("deleted vector is not empty"));
        }
        let mut seen = 0u32;
        let mut last = 0;
        let mut cur = root.head;
        while let Some(slot) = cur {
            let entry = &self.arena[slot as usize];
            if entry.index < 1 || entry.index > max_index {
                return Err(CollapseError::Corrupt("entry index out of range"));
            }
            if entry.index <= last {
                return Err(CollapseError::Corrupt("entry indices are not increasing"));
            }
            if entry.value.is_zero() {
                return Err(CollapseError::Corrupt("stored entry is zero"));
            }
            if entry.value.magnitude() > V::MAX_MAGNITUDE {
                return Err(CollapseError::EntryTooLarge);
            }
            if self.line_get(axis.across(), entry.index, at) != entry.value {
                return Err(CollapseError::EntryMismatch);
            }
            last = entry.index;
            seen += 1;
            cur = entry.next;
        }
        if seen != root.len {
            return Err(CollapseError::Corrupt("wrong number of entries"));
        }
        Ok(())
    }

    fn fmt_line(&self, f: &mut fmt::Formatter<'_>, axis: Axis, at: Index) -> fmt::Result {
        let root = self.root(axis, at);
        if root.deleted {
            return writeln!(f, "deleted");
        }
        write!(f, "{} entries:", root.len)?;
        let mut cur = root.head;
        while let Some(slot) = cur {
            let entry = &self.arena[slot as usize];
            write!(f, " ({}, {:?})", entry.index, entry.value)?;
            cur = entry.next;
        }
        writeln!(f)
    }
}

impl<V: Coefficient> fmt::Debug for SparseMatrix<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} rows and {} columns:", self.num_rows(), self.num_cols())?;
        for row in 1..=self.num_rows() {
            write!(f, "  row {row}: ")?;
            self.fmt_line(f, Axis::Row, row)?;
        }
        for col in 1..=self.num_cols() {
            write!(f, "  column {col}: ")?;
            self.fmt_line(f, Axis::Col, col)?;
        }
        Ok(())
    }
}
