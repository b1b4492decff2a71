//! Submatrix arithmetic used by the Strassen recursion.
//!
//! Size preconditions are asserted: a violation means the caller computed a
//! wrong offset or mixed operands, which no caller can recover from.

use crate::Matrix;

/// Copies the `size`×`size` block of `parent` starting at (`top`, `left`).
pub fn split(parent: &Matrix, top: usize, left: usize, size: usize) -> Matrix {
    assert!(
        top + size <= parent.size() && left + size <= parent.size(),
        "split of {size}x{size} at ({top}, {left}) exceeds parent {0}x{0}",
        parent.size()
    );
    let mut child = Matrix::zeros(size);
    for i in 0..size {
        child
            .row_mut(i)
            .copy_from_slice(&parent.row(top + i)[left..left + size]);
    }
    child
}

/// Writes `child` into `parent` with its top-left corner at (`top`, `left`).
pub fn join(child: &Matrix, parent: &mut Matrix, top: usize, left: usize) {
    let size = child.size();
    assert!(
        top + size <= parent.size() && left + size <= parent.size(),
        "join of {size}x{size} at ({top}, {left}) exceeds parent {0}x{0}",
        parent.size()
    );
    for i in 0..size {
        parent.row_mut(top + i)[left..left + size].copy_from_slice(child.row(i));
    }
}

/// Splits an even-sized matrix into `[X11, X12, X21, X22]`.
pub fn quadrants(m: &Matrix) -> [Matrix; 4] {
    let half = m.size() / 2;
    assert!(half * 2 == m.size(), "cannot quarter a {0}x{0} matrix", m.size());
    [
        split(m, 0, 0, half),
        split(m, 0, half, half),
        split(m, half, 0, half),
        split(m, half, half, half),
    ]
}

/// Reassembles four equal quadrants into one matrix of twice their size.
pub fn assemble([c11, c12, c21, c22]: [Matrix; 4]) -> Matrix {
    let half = c11.size();
    let mut c = Matrix::zeros(half * 2);
    join(&c11, &mut c, 0, 0);
    join(&c12, &mut c, 0, half);
    join(&c21, &mut c, half, 0);
    join(&c22, &mut c, half, half);
    c
}

pub fn add(a: &Matrix, b: &Matrix) -> Matrix {
    zip_with(a, b, i32::wrapping_add)
}

pub fn subtract(a: &Matrix, b: &Matrix) -> Matrix {
    zip_with(a, b, i32::wrapping_sub)
}

fn zip_with(a: &Matrix, b: &Matrix, f: impl Fn(i32, i32) -> i32) -> Matrix {
    assert_eq!(a.size(), b.size(), "elementwise operands differ in size");
    let values = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| f(x, y))
        .collect();
    Matrix::from_parts(a.size(), values)
}
