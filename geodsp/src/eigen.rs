// geodsp - DSP kernels for seismic and image processing pipelines
// Copyright (C) 2021 Julian Jeggle, Raphael Wittkowski

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Eigen-decomposition of small symmetric matrices
//!
//! These kernels are the foundation of the tensor fields consumed by the
//! anisotropic smoother: they are exact for 2x2 matrices (one Jacobi
//! rotation) and iterate to exact off-diagonal zeros for 3x3 matrices.
//! Eigenvalues are returned in descending order and the rows of the returned
//! matrix are the corresponding unit eigenvectors.

use num_traits::Float;

/// Threshold below which the Jacobi tangent is computed by the small-angle
/// shortcut `t = a01/u` (avoids overflow in `r*r`).
fn tiny<F: Float>() -> F {
    F::from(0.1).unwrap() * F::epsilon().sqrt()
}

/// Tangent of the Jacobi rotation zeroing an off-diagonal element `apq`,
/// chosen with `|t| <= 1` so the rotation angle stays below pi/4.
fn jacobi_tangent<F: Float>(apq: F, u: F) -> F {
    let one = F::one();
    if apq.abs() < tiny::<F>() * u.abs() {
        apq / u
    } else {
        let r = F::from(0.5).unwrap() * u / apq;
        if r >= F::zero() {
            one / (r + (one + r * r).sqrt())
        } else {
            one / (r - (one + r * r).sqrt())
        }
    }
}

/// Computes eigenvalues and eigenvectors of a symmetric 2x2 matrix
/// `((a00, a01), (a01, a11))`.
///
/// Returns `(v, d)` with `d[0] >= d[1]` and `v[k]` the unit eigenvector for
/// `d[k]`. A NaN anywhere in the input propagates into the output; no other
/// failure mode exists.
pub fn solve_symmetric_22<F: Float>(a: [[F; 2]; 2]) -> ([[F; 2]; 2], [F; 2]) {
    let (zero, one) = (F::zero(), F::one());
    let mut a00 = a[0][0];
    let mut a11 = a[1][1];
    let a01 = a[0][1];
    let (mut v00, mut v01) = (one, zero);
    let (mut v10, mut v11) = (zero, one);
    // One Jacobi rotation zeroes the off-diagonal element exactly.
    if a01 != zero {
        let t = jacobi_tangent(a01, a11 - a00);
        let c = one / (one + t * t).sqrt();
        let s = t * c;
        let u = s / (one + c);
        let r = t * a01;
        a00 = a00 - r;
        a11 = a11 + r;
        let (vpr, vqr) = (v00, v10);
        v00 = vpr - s * (vqr + vpr * u);
        v10 = vqr + s * (vpr - vqr * u);
        let (vpr, vqr) = (v01, v11);
        v01 = vpr - s * (vqr + vpr * u);
        v11 = vqr + s * (vpr - vqr * u);
    }
    let mut d = [a00, a11];
    let mut v = [[v00, v01], [v10, v11]];
    if d[0] < d[1] {
        d.swap(0, 1);
        v.swap(0, 1);
    }
    (v, d)
}

/// Computes eigenvalues and eigenvectors of a symmetric 3x3 matrix (only the
/// upper triangle of `a` is read).
///
/// Jacobi rotations are applied to the largest off-diagonal element until all
/// three off-diagonals are exactly zero. The rotation count is capped at 100;
/// reaching the cap is a programming error (unreachable for real input) and
/// panics.
pub fn solve_symmetric_33<F: Float>(a: [[F; 3]; 3]) -> ([[F; 3]; 3], [F; 3]) {
    let (zero, one) = (F::zero(), F::one());
    let mut aa = [
        [a[0][0], a[0][1], a[0][2]],
        [a[0][1], a[1][1], a[1][2]],
        [a[0][2], a[1][2], a[2][2]],
    ];
    let mut v = [[zero; 3]; 3];
    for (k, row) in v.iter_mut().enumerate() {
        row[k] = one;
    }
    let mut nrot = 0;
    loop {
        // Pivot on the largest off-diagonal element.
        let (mut p, mut q) = (0, 1);
        for &(i, j) in &[(0usize, 2usize), (1, 2)] {
            if aa[i][j].abs() > aa[p][q].abs() {
                p = i;
                q = j;
            }
        }
        let apq = aa[p][q];
        if apq == zero {
            break;
        }
        nrot += 1;
        if nrot > 100 {
            panic!("Jacobi eigensolver failed to converge in 100 rotations");
        }
        let t = jacobi_tangent(apq, aa[q][q] - aa[p][p]);
        let c = one / (one + t * t).sqrt();
        let s = t * c;
        let u = s / (one + c);
        let r = t * apq;
        aa[p][p] = aa[p][p] - r;
        aa[q][q] = aa[q][q] + r;
        aa[p][q] = zero;
        aa[q][p] = zero;
        for k in 0..3 {
            if k != p && k != q {
                let g = aa[k][p];
                let h = aa[k][q];
                aa[k][p] = g - s * (h + g * u);
                aa[p][k] = aa[k][p];
                aa[k][q] = h + s * (g - h * u);
                aa[q][k] = aa[k][q];
            }
        }
        for k in 0..3 {
            let g = v[p][k];
            let h = v[q][k];
            v[p][k] = g - s * (h + g * u);
            v[q][k] = h + s * (g - h * u);
        }
    }
    // Sort descending by eigenvalue.
    let mut d = [aa[0][0], aa[1][1], aa[2][2]];
    for i in 0..2 {
        let mut imax = i;
        for j in (i + 1)..3 {
            if d[j] > d[imax] {
                imax = j;
            }
        }
        d.swap(i, imax);
        v.swap(i, imax);
    }
    (v, d)
}
