//! Square `i32` matrix stored row-major.

use std::fmt;

use crate::Error;

/// A square grid of `i32` values.
///
/// Operations never mutate their operands; products, sums and quadrants are
/// freshly allocated. The only in-place write is [`crate::ops::join`], which
/// fills a destination owned by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    size: usize,
    data: Vec<i32>,
}

impl Matrix {
    /// Creates an `n`×`n` matrix of zeros.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0; size * size],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut m = Self::zeros(size);
        for i in 0..size {
            m.set(i, i, 1);
        }
        m
    }

    /// Builds a matrix from row-major values.
    ///
    /// Fails with [`Error::NotSquare`] unless `values.len() == size * size`.
    pub fn from_vec(size: usize, values: Vec<i32>) -> Result<Self, Error> {
        if values.len() != size * size {
            return Err(Error::NotSquare);
        }
        Ok(Self { size, data: values })
    }

    pub(crate) fn from_parts(size: usize, data: Vec<i32>) -> Self {
        debug_assert_eq!(data.len(), size * size);
        Self { size, data }
    }

    /// Builds a matrix from nested rows, rejecting ragged or non-square input.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self, Error> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(Error::NotSquare);
            }
            data.extend(row);
        }
        Ok(Self { size, data })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.data[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: i32) {
        self.data[row * self.size + col] = value;
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [i32] {
        &mut self.data[row * self.size..(row + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks_exact(0) panics
        self.data.chunks_exact(self.size.max(1))
    }

    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        self.rows().map(<[i32]>::to_vec).collect()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.data
    }

    /// Checks that `size` is a power of two, the only shape Strassen splits.
    pub fn ensure_power_of_two(&self) -> Result<(), Error> {
        if !self.size.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(self.size));
        }
        Ok(())
    }

    /// Direct triple-loop product with wrapping arithmetic.
    ///
    /// Used for the Strassen base case and as the reference result.
    pub fn naive_multiply(a: &Matrix, b: &Matrix) -> Matrix {
        assert_eq!(a.size, b.size, "naive_multiply operands differ in size");
        let n = a.size;
        let mut c = Matrix::zeros(n);
        for i in 0..n {
            let a_row = a.row(i);
            let c_row = c.row_mut(i);
            for (k, &aik) in a_row.iter().enumerate() {
                for (cij, &bkj) in c_row.iter_mut().zip(b.row(k)) {
                    *cij = cij.wrapping_add(aik.wrapping_mul(bkj));
                }
            }
        }
        c
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({}x{}) ", self.size, self.size)?;
        f.debug_list().entries(self.rows()).finish()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line = row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
