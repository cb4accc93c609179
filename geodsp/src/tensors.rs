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

//! Spatially varying tensor fields for anisotropic smoothing
//!
//! A tensor field assigns a symmetric positive-semidefinite matrix to every
//! sample of a 2D or 3D image. The eigen-parameterized implementations store
//! one quadruple (2D) or one 9-tuple (3D) per sample as plain
//! struct-of-arrays and reconstruct `A = au*uu' + av*vv' (+ aw*ww')` on
//! demand.

use crate::eigen::{solve_symmetric_22, solve_symmetric_33};

/// A field of symmetric 2x2 tensors, indexed by sample.
pub trait Tensors2 {
    /// Gets the tensor elements `[a11, a12, a22]` for sample (i1,i2).
    fn get_tensor(&self, i1: usize, i2: usize, d: &mut [f32; 3]);
}

/// A field of symmetric 3x3 tensors, indexed by sample.
pub trait Tensors3 {
    /// Gets the tensor elements `[a11, a12, a13, a22, a23, a33]` for sample
    /// (i1,i2,i3).
    fn get_tensor(&self, i1: usize, i2: usize, i3: usize, d: &mut [f32; 6]);
}

/// Eigen-parameterized field of 2x2 tensors.
///
/// Each sample holds eigenvalues `au >= av >= 0` and the unit eigenvector
/// `u = (u1,u2)` with `u1 >= 0`; the second eigenvector is `v = (u2,-u1)`.
/// New fields are initialized to isotropic unit tensors.
pub struct EigenTensors2 {
    n1: usize,
    n2: usize,
    u1: Vec<f32>,
    u2: Vec<f32>,
    au: Vec<f32>,
    av: Vec<f32>,
}

impl EigenTensors2 {
    /// Creates a field of n1*n2 isotropic unit tensors.
    pub fn new(n1: usize, n2: usize) -> Self {
        let n = n1 * n2;
        Self {
            n1,
            n2,
            u1: vec![1.0; n],
            u2: vec![0.0; n],
            au: vec![1.0; n],
            av: vec![1.0; n],
        }
    }

    /// Number of samples in the 1st (fastest) dimension.
    pub fn n1(&self) -> usize {
        self.n1
    }

    /// Number of samples in the 2nd dimension.
    pub fn n2(&self) -> usize {
        self.n2
    }

    fn index(&self, i1: usize, i2: usize) -> usize {
        debug_assert!(i1 < self.n1 && i2 < self.n2);
        i2 * self.n1 + i1
    }

    /// Sets the eigenvalues (au,av) for sample (i1,i2).
    pub fn set_eigenvalues(&mut self, i1: usize, i2: usize, au: f32, av: f32) {
        let i = self.index(i1, i2);
        self.au[i] = au;
        self.av[i] = av;
    }

    /// Sets the eigenvector u for sample (i1,i2); u is normalized and
    /// negated if needed so that u1 >= 0.
    pub fn set_eigenvector_u(&mut self, i1: usize, i2: usize, u1: f32, u2: f32) {
        let i = self.index(i1, i2);
        let s = (u1 * u1 + u2 * u2).sqrt().recip() * if u1 < 0.0 { -1.0 } else { 1.0 };
        self.u1[i] = s * u1;
        self.u2[i] = s * u2;
    }

    /// Gets the eigenvalues (au,av) for sample (i1,i2).
    pub fn get_eigenvalues(&self, i1: usize, i2: usize) -> (f32, f32) {
        let i = self.index(i1, i2);
        (self.au[i], self.av[i])
    }

    /// Gets the eigenvector u for sample (i1,i2).
    pub fn get_eigenvector_u(&self, i1: usize, i2: usize) -> (f32, f32) {
        let i = self.index(i1, i2);
        (self.u1[i], self.u2[i])
    }

    /// Gets the eigenvector v = (u2,-u1) for sample (i1,i2).
    pub fn get_eigenvector_v(&self, i1: usize, i2: usize) -> (f32, f32) {
        let i = self.index(i1, i2);
        (self.u2[i], -self.u1[i])
    }

    /// Sets the tensor `[a11, a12, a22]` for sample (i1,i2) by
    /// eigen-decomposition.
    pub fn set_tensor(&mut self, i1: usize, i2: usize, a: [f32; 3]) {
        let (v, d) = solve_symmetric_22([[f64::from(a[0]), f64::from(a[1])],
                                         [f64::from(a[1]), f64::from(a[2])]]);
        self.set_eigenvalues(i1, i2, d[0] as f32, d[1] as f32);
        self.set_eigenvector_u(i1, i2, v[0][0] as f32, v[0][1] as f32);
    }
}

impl Tensors2 for EigenTensors2 {
    fn get_tensor(&self, i1: usize, i2: usize, d: &mut [f32; 3]) {
        let i = self.index(i1, i2);
        let (u1, u2) = (self.u1[i], self.u2[i]);
        let (au, av) = (self.au[i], self.av[i]);
        d[0] = au * u1 * u1 + av * u2 * u2;
        d[1] = (au - av) * u1 * u2;
        d[2] = au * u2 * u2 + av * u1 * u1;
    }
}

/// Eigen-parameterized field of 3x3 tensors.
///
/// Each sample holds eigenvalues `au >= av >= aw >= 0` and the unit
/// eigenvectors u and w (u1 >= 0, w1 >= 0); the remaining eigenvector is
/// `v = w x u`, whose sign is irrelevant in the outer product.
pub struct EigenTensors3 {
    n1: usize,
    n2: usize,
    n3: usize,
    u: [Vec<f32>; 3],
    w: [Vec<f32>; 3],
    au: Vec<f32>,
    av: Vec<f32>,
    aw: Vec<f32>,
}

impl EigenTensors3 {
    /// Creates a field of n1*n2*n3 isotropic unit tensors.
    pub fn new(n1: usize, n2: usize, n3: usize) -> Self {
        let n = n1 * n2 * n3;
        Self {
            n1,
            n2,
            n3,
            u: [vec![1.0; n], vec![0.0; n], vec![0.0; n]],
            w: [vec![0.0; n], vec![0.0; n], vec![1.0; n]],
            au: vec![1.0; n],
            av: vec![1.0; n],
            aw: vec![1.0; n],
        }
    }

    pub fn n1(&self) -> usize {
        self.n1
    }

    pub fn n2(&self) -> usize {
        self.n2
    }

    pub fn n3(&self) -> usize {
        self.n3
    }

    fn index(&self, i1: usize, i2: usize, i3: usize) -> usize {
        debug_assert!(i1 < self.n1 && i2 < self.n2 && i3 < self.n3);
        (i3 * self.n2 + i2) * self.n1 + i1
    }

    /// Sets the eigenvalues (au,av,aw) for sample (i1,i2,i3).
    pub fn set_eigenvalues(&mut self, i1: usize, i2: usize, i3: usize,
        au: f32, av: f32, aw: f32)
    {
        let i = self.index(i1, i2, i3);
        self.au[i] = au;
        self.av[i] = av;
        self.aw[i] = aw;
    }

    /// Sets the eigenvector u; normalized, with u1 >= 0.
    pub fn set_eigenvector_u(&mut self, i1: usize, i2: usize, i3: usize, u: [f32; 3]) {
        let i = self.index(i1, i2, i3);
        let s = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt().recip()
            * if u[0] < 0.0 { -1.0 } else { 1.0 };
        for k in 0..3 {
            self.u[k][i] = s * u[k];
        }
    }

    /// Sets the eigenvector w; normalized, with w1 >= 0.
    pub fn set_eigenvector_w(&mut self, i1: usize, i2: usize, i3: usize, w: [f32; 3]) {
        let i = self.index(i1, i2, i3);
        let s = (w[0] * w[0] + w[1] * w[1] + w[2] * w[2]).sqrt().recip()
            * if w[0] < 0.0 { -1.0 } else { 1.0 };
        for k in 0..3 {
            self.w[k][i] = s * w[k];
        }
    }

    /// Gets the eigenvalues (au,av,aw) for sample (i1,i2,i3).
    pub fn get_eigenvalues(&self, i1: usize, i2: usize, i3: usize) -> (f32, f32, f32) {
        let i = self.index(i1, i2, i3);
        (self.au[i], self.av[i], self.aw[i])
    }

    /// Gets the eigenvector u for sample (i1,i2,i3).
    pub fn get_eigenvector_u(&self, i1: usize, i2: usize, i3: usize) -> [f32; 3] {
        let i = self.index(i1, i2, i3);
        [self.u[0][i], self.u[1][i], self.u[2][i]]
    }

    /// Gets the eigenvector v = w x u for sample (i1,i2,i3).
    pub fn get_eigenvector_v(&self, i1: usize, i2: usize, i3: usize) -> [f32; 3] {
        let u = self.get_eigenvector_u(i1, i2, i3);
        let w = self.get_eigenvector_w(i1, i2, i3);
        [
            w[1] * u[2] - w[2] * u[1],
            w[2] * u[0] - w[0] * u[2],
            w[0] * u[1] - w[1] * u[0],
        ]
    }

    /// Gets the eigenvector w for sample (i1,i2,i3).
    pub fn get_eigenvector_w(&self, i1: usize, i2: usize, i3: usize) -> [f32; 3] {
        let i = self.index(i1, i2, i3);
        [self.w[0][i], self.w[1][i], self.w[2][i]]
    }

    /// Sets the tensor `[a11, a12, a13, a22, a23, a33]` for sample
    /// (i1,i2,i3) by eigen-decomposition.
    pub fn set_tensor(&mut self, i1: usize, i2: usize, i3: usize, a: [f32; 6]) {
        let a = [
            [f64::from(a[0]), f64::from(a[1]), f64::from(a[2])],
            [f64::from(a[1]), f64::from(a[3]), f64::from(a[4])],
            [f64::from(a[2]), f64::from(a[4]), f64::from(a[5])],
        ];
        let (v, d) = solve_symmetric_33(a);
        self.set_eigenvalues(i1, i2, i3, d[0] as f32, d[1] as f32, d[2] as f32);
        self.set_eigenvector_u(i1, i2, i3, [v[0][0] as f32, v[0][1] as f32, v[0][2] as f32]);
        self.set_eigenvector_w(i1, i2, i3, [v[2][0] as f32, v[2][1] as f32, v[2][2] as f32]);
    }
}

impl Tensors3 for EigenTensors3 {
    fn get_tensor(&self, i1: usize, i2: usize, i3: usize, d: &mut [f32; 6]) {
        let i = self.index(i1, i2, i3);
        let u = [self.u[0][i], self.u[1][i], self.u[2][i]];
        let w = [self.w[0][i], self.w[1][i], self.w[2][i]];
        let v = [
            w[1] * u[2] - w[2] * u[1],
            w[2] * u[0] - w[0] * u[2],
            w[0] * u[1] - w[1] * u[0],
        ];
        let (au, av, aw) = (self.au[i], self.av[i], self.aw[i]);
        d[0] = au * u[0] * u[0] + av * v[0] * v[0] + aw * w[0] * w[0];
        d[1] = au * u[0] * u[1] + av * v[0] * v[1] + aw * w[0] * w[1];
        d[2] = au * u[0] * u[2] + av * v[0] * v[2] + aw * w[0] * w[2];
        d[3] = au * u[1] * u[1] + av * v[1] * v[1] + aw * w[1] * w[1];
        d[4] = au * u[1] * u[2] + av * v[1] * v[2] + aw * w[1] * w[2];
        d[5] = au * u[2] * u[2] + av * v[2] * v[2] + aw * w[2] * w[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn tensor2_round_trip() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut field = EigenTensors2::new(4, 3);
        for i2 in 0..3 {
            for i1 in 0..4 {
                // random SPD tensor
                let (g1, g2): (f32, f32) = (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                let e = rng.gen_range(0.0..0.5);
                let a = [g1 * g1 + e, g1 * g2, g2 * g2 + e];
                field.set_tensor(i1, i2, a);
                let (au, av) = field.get_eigenvalues(i1, i2);
                assert!(au >= av && av >= -1e-6);
                let (u1, _) = field.get_eigenvector_u(i1, i2);
                assert!(u1 >= 0.0);
                let mut d = [0.0f32; 3];
                field.get_tensor(i1, i2, &mut d);
                for (got, want) in d.iter().zip(a.iter()) {
                    assert!((got - want).abs() <= 1e-5, "{} vs {}", got, want);
                }
            }
        }
    }

    #[test]
    fn tensor3_round_trip() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut field = EigenTensors3::new(2, 2, 2);
        for i3 in 0..2 {
            for i2 in 0..2 {
                for i1 in 0..2 {
                    // A = G'G + e I for a random 3x3 G
                    let g: Vec<f32> = (0..9).map(|_| rng.gen_range(-1.0..1.0)).collect();
                    let e = rng.gen_range(0.0..0.5);
                    let mut m = [[0.0f32; 3]; 3];
                    for i in 0..3 {
                        for j in 0..3 {
                            m[i][j] = (0..3).map(|k| g[3 * k + i] * g[3 * k + j]).sum();
                        }
                    }
                    let a = [m[0][0] + e, m[0][1], m[0][2], m[1][1] + e, m[1][2], m[2][2] + e];
                    field.set_tensor(i1, i2, i3, a);
                    let (au, av, aw) = field.get_eigenvalues(i1, i2, i3);
                    assert!(au >= av && av >= aw);
                    let u = field.get_eigenvector_u(i1, i2, i3);
                    assert!(u[0] >= 0.0);
                    let mut d = [0.0f32; 6];
                    field.get_tensor(i1, i2, i3, &mut d);
                    for (got, want) in d.iter().zip(a.iter()) {
                        assert!((got - want).abs() <= 2e-5, "{} vs {}", got, want);
                    }
                }
            }
        }
    }

    #[test]
    fn default_tensors_are_isotropic() {
        let field = EigenTensors2::new(2, 2);
        let mut d = [0.0f32; 3];
        field.get_tensor(1, 1, &mut d);
        assert_eq!(d, [1.0, 0.0, 1.0]);
    }
}
