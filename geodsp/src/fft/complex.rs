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

//! Complex-to-complex FFT plans

use num_complex::Complex32;

use crate::error::DspError;
use super::nfft;
use super::pfa;

/// A fast Fourier transform of complex-valued arrays, for a fixed valid
/// length.
///
/// The transform computes `Z_k = sum_n z_n * exp(sign*2*pi*i*n*k/N)` on
/// packed complex data (2N interleaved f32 values). Plans are immutable
/// after construction and may be shared freely between threads.
///
/// A forward transform with one sign followed by a forward transform with
/// the opposite sign and a [scale](FftComplex::scale) by 1/N recovers the
/// input.
#[derive(Debug)]
pub struct FftComplex {
    nfft: usize,
}

impl FftComplex {
    /// Creates a transform of length `nfft`, which must factor into
    /// mutually prime members of {2,3,4,5,7,8,9,11,13,16}.
    pub fn new(nfft: usize) -> Result<Self, DspError> {
        if !nfft::is_valid(nfft) {
            return Err(DspError::InvalidLength(nfft));
        }
        Ok(Self { nfft })
    }

    /// Creates a transform with the smallest valid length >= n.
    pub fn small(n: usize) -> Result<Self, DspError> {
        Ok(Self { nfft: nfft::nfft_small(n)? })
    }

    /// The transform length.
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    fn check_sign(sign: i32) -> Result<(), DspError> {
        if sign != 1 && sign != -1 {
            return Err(DspError::InvalidSign(sign));
        }
        Ok(())
    }

    fn check_len(required: usize, actual: usize) -> Result<(), DspError> {
        if actual < required {
            return Err(DspError::InsufficientBuffer { required, actual });
        }
        Ok(())
    }

    /// In-place transform of `z` (at least 2*nfft floats, packed complex).
    pub fn transform(&self, sign: i32, z: &mut [f32]) -> Result<(), DspError> {
        Self::check_sign(sign)?;
        Self::check_len(2 * self.nfft, z.len())?;
        pfa::transform(sign, self.nfft, z);
        Ok(())
    }

    /// Transforms `cx` into `cy` (both at least 2*nfft floats). For an
    /// in-place transform of a single buffer use
    /// [transform](FftComplex::transform).
    pub fn complex_to_complex(&self, sign: i32, cx: &[f32], cy: &mut [f32])
        -> Result<(), DspError>
    {
        Self::check_sign(sign)?;
        let n = 2 * self.nfft;
        Self::check_len(n, cx.len())?;
        Self::check_len(n, cy.len())?;
        cy[..n].copy_from_slice(&cx[..n]);
        pfa::transform(sign, self.nfft, cy);
        Ok(())
    }

    /// Convenience entry point for `Complex32` slices.
    pub fn complex_to_complex_slice(&self, sign: i32, cx: &[Complex32],
        cy: &mut [Complex32]) -> Result<(), DspError>
    {
        Self::check_sign(sign)?;
        Self::check_len(self.nfft, cx.len())?;
        Self::check_len(self.nfft, cy.len())?;
        let mut z = Vec::with_capacity(2 * self.nfft);
        for c in &cx[..self.nfft] {
            z.push(c.re);
            z.push(c.im);
        }
        pfa::transform(sign, self.nfft, &mut z);
        for (c, p) in cy[..self.nfft].iter_mut().zip(z.chunks_exact(2)) {
            c.re = p[0];
            c.im = p[1];
        }
        Ok(())
    }

    /// Transforms dimension 1 of a flat `[n2][2*nfft]` array: each of the
    /// n2 rows is transformed independently.
    pub fn complex_to_complex1(&self, sign: i32, n2: usize, cx: &[f32],
        cy: &mut [f32]) -> Result<(), DspError>
    {
        Self::check_sign(sign)?;
        let row = 2 * self.nfft;
        Self::check_len(row * n2, cx.len())?;
        Self::check_len(row * n2, cy.len())?;
        cy[..row * n2].copy_from_slice(&cx[..row * n2]);
        for r in cy[..row * n2].chunks_exact_mut(row) {
            pfa::transform(sign, self.nfft, r);
        }
        Ok(())
    }

    /// Transforms dimension 2 of a flat `[nfft][2*n1]` array: all n1 packed
    /// columns are transformed simultaneously by the strided multi-transform.
    pub fn complex_to_complex2(&self, sign: i32, n1: usize, cx: &[f32],
        cy: &mut [f32]) -> Result<(), DspError>
    {
        Self::check_sign(sign)?;
        let len = 2 * n1 * self.nfft;
        Self::check_len(len, cx.len())?;
        Self::check_len(len, cy.len())?;
        cy[..len].copy_from_slice(&cx[..len]);
        pfa::transform2a(sign, n1, self.nfft, cy);
        Ok(())
    }

    /// In-place variant of [complex_to_complex2](FftComplex::complex_to_complex2).
    pub fn transform2(&self, sign: i32, n1: usize, z: &mut [f32]) -> Result<(), DspError> {
        Self::check_sign(sign)?;
        Self::check_len(2 * n1 * self.nfft, z.len())?;
        pfa::transform2a(sign, n1, self.nfft, z);
        Ok(())
    }

    /// Multiplies the first n packed complex values by 1/nfft.
    pub fn scale(&self, n: usize, v: &mut [f32]) {
        let s = 1.0 / self.nfft as f32;
        let len = (2 * n).min(v.len());
        for x in v[..len].iter_mut() {
            *x *= s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use rustfft::FftPlanner;

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(FftComplex::new(17).unwrap_err(), DspError::InvalidLength(17));
        let fft = FftComplex::new(12).unwrap();
        let mut z = vec![0.0f32; 24];
        assert_eq!(fft.transform(2, &mut z).unwrap_err(), DspError::InvalidSign(2));
        let mut short = vec![0.0f32; 10];
        assert!(matches!(
            fft.transform(1, &mut short).unwrap_err(),
            DspError::InsufficientBuffer { required: 24, actual: 10 }
        ));
    }

    #[test]
    fn impulse_at_index_one() {
        // Forward transform of a unit impulse at complex index 1 is the
        // complex exponential exp(2*pi*i*k/12).
        let fft = FftComplex::new(12).unwrap();
        let mut z = vec![0.0f32; 24];
        z[2] = 1.0;
        fft.transform(1, &mut z).unwrap();
        let expect: [(f32, f32); 3] = [(1.0, 0.0), (0.866025, 0.5), (0.5, 0.866025)];
        for (k, &(re, im)) in expect.iter().enumerate() {
            assert!((z[2 * k] - re).abs() < 1e-6);
            assert!((z[2 * k + 1] - im).abs() < 1e-6);
        }
    }

    #[test]
    fn matches_rustfft() {
        let mut rng = SmallRng::seed_from_u64(99);
        let mut planner = FftPlanner::<f32>::new();
        for &n in &[7usize, 120, 1001, 5040] {
            let fft = FftComplex::new(n).unwrap();
            let x: Vec<Complex32> = (0..n)
                .map(|_| Complex32::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
                .collect();
            let mut got = vec![Complex32::new(0.0, 0.0); n];
            // sign -1 matches rustfft's forward convention exp(-2*pi*i*nk/N)
            fft.complex_to_complex_slice(-1, &x, &mut got).unwrap();
            let mut want = x.clone();
            planner.plan_fft_forward(n).process(&mut want);
            let scale = want.iter().fold(0.0f32, |m, c| m.max(c.norm()));
            for (g, w) in got.iter().zip(want.iter()) {
                assert!((g - w).norm() <= 1e-5 * scale, "n={}", n);
            }
        }
    }

    #[test]
    fn linearity() {
        let mut rng = SmallRng::seed_from_u64(4);
        let n = 90;
        let fft = FftComplex::new(n).unwrap();
        let x: Vec<f32> = (0..2 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let y: Vec<f32> = (0..2 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let (alpha, beta) = (0.7f32, -1.3f32);
        let mut zx = vec![0.0f32; 2 * n];
        let mut zy = vec![0.0f32; 2 * n];
        fft.complex_to_complex(1, &x, &mut zx).unwrap();
        fft.complex_to_complex(1, &y, &mut zy).unwrap();
        let mut mixed: Vec<f32> = x.iter().zip(y.iter())
            .map(|(x, y)| alpha * x + beta * y)
            .collect();
        fft.transform(1, &mut mixed).unwrap();
        let scale = mixed.iter().fold(1.0f32, |m, v| m.max(v.abs()));
        for (m, (zx, zy)) in mixed.iter().zip(zx.iter().zip(zy.iter())) {
            assert!((m - (alpha * zx + beta * zy)).abs() <= 1e-5 * scale);
        }
    }

    #[test]
    fn round_trip_2d_variants() {
        let mut rng = SmallRng::seed_from_u64(6);
        let (n1, n2) = (14usize, 15usize);
        // dim-1 rows
        let fft1 = FftComplex::new(n1).unwrap();
        let x: Vec<f32> = (0..2 * n1 * n2).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut f = vec![0.0f32; x.len()];
        let mut b = vec![0.0f32; x.len()];
        fft1.complex_to_complex1(1, n2, &x, &mut f).unwrap();
        fft1.complex_to_complex1(-1, n2, &f, &mut b).unwrap();
        fft1.scale(n1 * n2, &mut b);
        for (got, want) in b.iter().zip(x.iter()) {
            assert!((got - want).abs() <= 1e-5);
        }
        // dim-2 columns
        let fft2 = FftComplex::new(n2).unwrap();
        fft2.complex_to_complex2(1, n1, &x, &mut f).unwrap();
        fft2.complex_to_complex2(-1, n1, &f, &mut b).unwrap();
        fft2.scale(n1 * n2, &mut b);
        for (got, want) in b.iter().zip(x.iter()) {
            assert!((got - want).abs() <= 1e-5);
        }
    }
}
