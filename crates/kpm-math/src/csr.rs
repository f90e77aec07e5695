//! CSR (Compressed Sparse Row) matrix for Hamiltonian and operator storage.
//!
//! The sparse matrix-vector product is the inner loop of the Chebyshev
//! recurrence, so the layout is kept flat and cache-friendly: one pass over
//! `values` per application, O(nnz).

use crate::{CMat, CVec, Complex64};

/// Sparse complex matrix in Compressed Sparse Row format.
///
/// Column indices within each row are sorted ascending and duplicate-free
/// (enforced by the constructors). The matrix is immutable after
/// construction; the KPM engine only ever borrows it read-only, so it can
/// be shared freely across worker threads.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<Complex64>,
}

impl CsrMatrix {
    /// Build from (row, col, value) triplets.
    ///
    /// Entries are sorted per row and duplicates at the same (row, col)
    /// are summed. Zero-valued entries after merging are kept (they are
    /// rare and harmless).
    ///
    /// # Panics
    /// Panics if any index is out of range for an `n`×`n` matrix.
    pub fn from_triplets(n: usize, triplets: &[(usize, usize, Complex64)]) -> Self {
        // Accumulate entries per row: Vec<(col, val)>
        let mut rows: Vec<Vec<(usize, Complex64)>> = vec![Vec::new(); n];
        for &(i, j, v) in triplets {
            assert!(i < n && j < n, "triplet ({i},{j}) out of range for n={n}");
            rows[i].push((j, v));
        }

        // Sort each row by column index, merge duplicates, build CSR
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();

        row_ptr.push(0usize);

        for row in &mut rows {
            row.sort_by_key(|&(col, _)| col);

            let mut merged: Vec<(usize, Complex64)> = Vec::new();
            for &(col, val) in row.iter() {
                if let Some(last) = merged.last_mut() {
                    if last.0 == col {
                        last.1 += val;
                        continue;
                    }
                }
                merged.push((col, val));
            }

            for (col, val) in merged {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            n,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Build from real-valued triplets (no magnetic/complex phase terms).
    pub fn from_real_triplets(n: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let complex: Vec<(usize, usize, Complex64)> = triplets
            .iter()
            .map(|&(i, j, v)| (i, j, Complex64::new(v, 0.0)))
            .collect();
        Self::from_triplets(n, &complex)
    }

    /// Build from a square dense matrix, keeping only the non-zero entries.
    ///
    /// # Panics
    /// Panics if the matrix is not square.
    pub fn from_dense(m: &CMat) -> Self {
        assert_eq!(m.nrows(), m.ncols(), "dense matrix must be square");
        let n = m.nrows();
        let mut triplets = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let v = m[(i, j)];
                if v != Complex64::new(0.0, 0.0) {
                    triplets.push((i, j, v));
                }
            }
        }
        Self::from_triplets(n, &triplets)
    }

    /// Matrix dimension N.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Entry at (i, j), zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];
        match self.col_idx[start..end].binary_search(&j) {
            Ok(pos) => self.values[start + pos],
            Err(_) => Complex64::new(0.0, 0.0),
        }
    }

    /// Compute y = A * x.
    ///
    /// Single pass over the stored entries; the caller owns both buffers so
    /// repeated applications (the Chebyshev recurrence) allocate nothing.
    pub fn matvec(&self, x: &CVec, y: &mut CVec) {
        debug_assert_eq!(x.len(), self.n);
        debug_assert_eq!(y.len(), self.n);
        for i in 0..self.n {
            let mut sum = Complex64::new(0.0, 0.0);
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[idx] * x[self.col_idx[idx]];
            }
            y[i] = sum;
        }
    }

    /// Check H[i,j] == conj(H[j,i]) for all stored entries, to tolerance `tol`.
    pub fn is_hermitian(&self, tol: f64) -> bool {
        for i in 0..self.n {
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[idx];
                let diff = self.values[idx] - self.get(j, i).conj();
                if diff.norm() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// Densify (for tests and small reference computations).
    pub fn to_dense(&self) -> CMat {
        let mut m = CMat::zeros(self.n, self.n);
        for i in 0..self.n {
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                m[(i, self.col_idx[idx])] = self.values[idx];
            }
        }
        m
    }
}
