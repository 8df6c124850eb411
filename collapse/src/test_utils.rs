//! Shared helpers for the reduction tests: building chain complexes out of
//! simplicial face lists, and computing homology rank/torsion profiles the
//! slow, certain way (dense Smith normal form) so reductions can be checked
//! against them.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::complex::ChainComplex;
use crate::host::Reduced;
use crate::sparse::{Index, SparseMatrix};

/// All faces of the given maximal simplices, as group ranks plus row-major
/// boundary matrices with the usual alternating signs. Vertex labels are
/// arbitrary; faces are ordered by sorted vertex list within each dimension.
pub(crate) fn simplicial_ranks_and_boundaries(
    maximal: &[&[u32]],
) -> (Vec<Index>, Vec<Vec<Vec<i64>>>) {
    let mut faces: Vec<Vec<Vec<u32>>> = Vec::new();
    let mut seen: FxHashSet<Vec<u32>> = FxHashSet::default();
    for simplex in maximal {
        let mut vertices: Vec<u32> = simplex.to_vec();
        vertices.sort_unstable();
        vertices.dedup();
        let k = vertices.len();
        for mask in 1u32..(1 << k) {
            let face: Vec<u32> = (0..k)
                .filter(|&i| mask & (1u32 << i) != 0)
                .map(|i| vertices[i])
                .collect();
            let dim = face.len() - 1;
            if seen.insert(face.clone()) {
                while faces.len() <= dim {
                    faces.push(Vec::new());
                }
                faces[dim].push(face);
            }
        }
    }
    for list in &mut faces {
        list.sort();
    }

    let index: Vec<FxHashMap<&[u32], usize>> = faces
        .iter()
        .map(|list| {
            list.iter()
                .enumerate()
                .map(|(i, f)| (f.as_slice(), i))
                .collect()
        })
        .collect();

    let ranks: Vec<Index> = faces.iter().map(|list| list.len() as Index).collect();
    let mut boundaries = Vec::new();
    for d in 0..faces.len().saturating_sub(1) {
        // D[d]: row r is the boundary of the r-th (d+1)-face
        let mut rows = vec![vec![0i64; faces[d].len()]; faces[d + 1].len()];
        for (r, face) in faces[d + 1].iter().enumerate() {
            for i in 0..face.len() {
                let mut sub = face.clone();
                sub.remove(i);
                let c = index[d][sub.as_slice()];
                rows[r][c] = if i % 2 == 0 { 1 } else { -1 };
            }
        }
        boundaries.push(rows);
    }
    (ranks, boundaries)
}

/// Build a [`ChainComplex`] from row-major boundary matrices.
pub(crate) fn complex_from_rows(
    ranks: &[Index],
    boundaries: &[Vec<Vec<i64>>],
) -> ChainComplex<i64> {
    let mut complex = ChainComplex::new(ranks.to_vec());
    for (g, rows) in boundaries.iter().enumerate() {
        if ranks[g] == 0 || ranks[g + 1] == 0 {
            continue;
        }
        let mut matrix = SparseMatrix::new(ranks[g + 1], ranks[g]).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                if value != 0 {
                    matrix.put(r as Index + 1, c as Index + 1, value).unwrap();
                }
            }
        }
        matrix.check_consistency().unwrap();
        complex.set_boundary(g, matrix).unwrap();
    }
    complex
}

/// Dense row-major copies of the matrices a reduction handed back.
pub(crate) fn reduced_rows(reduced: &Reduced<i64>) -> Vec<Option<Vec<Vec<i64>>>> {
    reduced
        .matrices
        .iter()
        .map(|slot| {
            slot.as_ref().map(|dense| {
                (1..=dense.num_rows)
                    .map(|r| (1..=dense.num_cols).map(|c| dense.get(r, c)).collect())
                    .collect()
            })
        })
        .collect()
}

pub(crate) fn present(boundaries: &[Vec<Vec<i64>>]) -> Vec<Option<Vec<Vec<i64>>>> {
    boundaries.iter().cloned().map(Some).collect()
}

/// Betti number and sorted torsion divisors of H_g, for every group g.
/// Uses the classical identities off the Smith normal forms of the two
/// boundary maps around each group.
pub(crate) fn homology_profile(
    ranks: &[Index],
    boundaries: &[Option<Vec<Vec<i64>>>],
) -> Vec<(i64, Vec<i64>)> {
    let groups = ranks.len();
    let mut boundary_rank = vec![0i64; groups + 1];
    let mut divisors_of = vec![Vec::new(); groups + 1];
    for g in 1..groups {
        let divisors = match &boundaries[g - 1] {
            Some(rows) if !rows.is_empty() && !rows[0].is_empty() => {
                smith_divisors(rows.clone())
            }
            _ => Vec::new(),
        };
        boundary_rank[g] = divisors.len() as i64;
        divisors_of[g] = divisors;
    }
    (0..groups)
        .map(|g| {
            let betti = ranks[g] as i64 - boundary_rank[g] - boundary_rank[g + 1];
            let mut torsion: Vec<i64> = divisors_of[g + 1]
                .iter()
                .map(|d| d.abs())
                .filter(|&d| d > 1)
                .collect();
            torsion.sort_unstable();
            (betti, torsion)
        })
        .collect()
}

/// Non-zero diagonal of the Smith normal form. Textbook pivoting on the
/// entry of least magnitude; fine for test-sized matrices.
pub(crate) fn smith_divisors(mut m: Vec<Vec<i64>>) -> Vec<i64> {
    let rows = m.len();
    let cols = if rows == 0 { 0 } else { m[0].len() };
    let mut divisors = Vec::new();
    let mut t = 0usize;
    while t < rows.min(cols) {
        let mut pivot: Option<(usize, usize)> = None;
        for i in t..rows {
            for j in t..cols {
                if m[i][j] != 0
                    && pivot.map_or(true, |(pi, pj)| m[i][j].abs() < m[pi][pj].abs())
                {
                    pivot = Some((i, j));
                }
            }
        }
        let Some((pi, pj)) = pivot else { break };
        m.swap(t, pi);
        for row in &mut m {
            row.swap(t, pj);
        }

        // Clear row t and column t; a non-zero remainder becomes the new,
        // strictly smaller pivot.
        'clearing: loop {
            for i in t + 1..rows {
                if m[i][t] % m[t][t] != 0 {
                    let q = m[i][t] / m[t][t];
                    for j in t..cols {
                        m[i][j] -= q * m[t][j];
                    }
                    m.swap(t, i);
                    continue 'clearing;
                }
            }
            for i in t + 1..rows {
                let q = m[i][t] / m[t][t];
                if q != 0 {
                    for j in t..cols {
                        m[i][j] -= q * m[t][j];
                    }
                }
            }
            for j in t + 1..cols {
                if m[t][j] % m[t][t] != 0 {
                    let q = m[t][j] / m[t][t];
                    for i in t..rows {
                        m[i][j] -= q * m[i][t];
                    }
                    for row in &mut m {
                        row.swap(t, j);
                    }
                    continue 'clearing;
                }
            }
            for j in t + 1..cols {
                let q = m[t][j] / m[t][t];
                if q != 0 {
                    for i in t..rows {
                        m[i][j] -= q * m[i][t];
                    }
                }
            }
            break;
        }

        // The pivot must divide everything below and to the right; if it
        // does not, fold the offending row in and redo this step.
        let mut divides_rest = true;
        'division: for i in t + 1..rows {
            for j in t + 1..cols {
                if m[i][j] % m[t][t] != 0 {
                    for jj in t..cols {
                        m[t][jj] += m[i][jj];
                    }
                    divides_rest = false;
                    break 'division;
                }
            }
        }
        if !divides_rest {
            continue;
        }
        divisors.push(m[t][t].abs());
        t += 1;
    }
    divisors
}

/// D[g+1] · D[g] = 0 wherever both matrices exist.
pub(crate) fn boundary_squared_is_zero(rows: &[Option<Vec<Vec<i64>>>]) -> bool {
    for g in 0..rows.len().saturating_sub(1) {
        let (Some(a), Some(b)) = (&rows[g + 1], &rows[g]) else {
            continue;
        };
        for i in 0..a.len() {
            for j in 0..b[0].len() {
                let sum: i64 = (0..b.len()).map(|k| a[i][k] * b[k][j]).sum();
                if sum != 0 {
                    return false;
                }
            }
        }
    }
    true
}

/// Relabel the generators of every group; `perms[g][old] = new`.
pub(crate) fn permute_boundaries(
    ranks: &[Index],
    boundaries: &[Vec<Vec<i64>>],
    perms: &[Vec<usize>],
) -> Vec<Vec<Vec<i64>>> {
    boundaries
        .iter()
        .enumerate()
        .map(|(g, rows)| {
            let mut out = vec![vec![0i64; ranks[g] as usize]; ranks[g + 1] as usize];
            for (r, row) in rows.iter().enumerate() {
                for (c, &value) in row.iter().enumerate() {
                    out[perms[g + 1][r]][perms[g][c]] = value;
                }
            }
            out
        })
        .collect()
}

/// Deterministic Fisher-Yates permutation of `0..n` driven by a seed, so
/// relabeling tests stay reproducible.
pub(crate) fn shuffled(n: usize, seed: u64) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    for i in (1..n).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        perm.swap(i, (state % (i as u64 + 1)) as usize);
    }
    perm
}

/// Sanity net for the helpers themselves: every generated complex must
/// satisfy ∂∘∂ = 0 before it is fed to the reducer.
pub(crate) fn assert_valid_complex(ranks: &[Index], boundaries: &[Vec<Vec<i64>>]) {
    assert_eq!(boundaries.len(), ranks.len().saturating_sub(1));
    for (g, rows) in boundaries.iter().enumerate() {
        assert_eq!(rows.len(), ranks[g + 1] as usize);
        for row in rows {
            assert_eq!(row.len(), ranks[g] as usize);
        }
    }
    assert!(boundary_squared_is_zero(&present(boundaries)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smith_divisors_of_known_matrices() {
        assert_eq!(
            smith_divisors(vec![vec![1, 0], vec![0, 1]]),
            vec![1, 1]
        );
        // diag(6, 4) has invariant factors 2 | 12
        assert_eq!(
            smith_divisors(vec![vec![6, 0], vec![0, 4]]),
            vec![2, 12]
        );
        assert_eq!(smith_divisors(vec![vec![0, 0], vec![0, 0]]), Vec::<i64>::new());
        assert_eq!(smith_divisors(vec![vec![2]]), vec![2]);
    }

    #[test]
    fn circle_profile() {
        // three edges glued into a circle
        let (ranks, boundaries) =
            simplicial_ranks_and_boundaries(&[&[1, 2][..], &[2, 3], &[1, 3]]);
        assert_eq!(ranks, vec![3, 3]);
        assert_valid_complex(&ranks, &boundaries);
        let profile = homology_profile(&ranks, &present(&boundaries));
        assert_eq!(profile, vec![(1, vec![]), (1, vec![])]);
    }

    #[test]
    fn filled_triangle_is_contractible() {
        let (ranks, boundaries) = simplicial_ranks_and_boundaries(&[&[1, 2, 3][..]]);
        assert_eq!(ranks, vec![3, 3, 1]);
        assert_valid_complex(&ranks, &boundaries);
        let profile = homology_profile(&ranks, &present(&boundaries));
        assert_eq!(profile, vec![(1, vec![]), (0, vec![]), (0, vec![])]);
    }
}
