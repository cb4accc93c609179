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

//! Real-to-complex and complex-to-real FFTs
//!
//! An even length-N real transform is built on a length-N/2 complex
//! transform: adjacent real samples are packed (halved) into complex pairs,
//! transformed, and the two interleaved half spectra are separated by a
//! rotating twiddle sweep. The inverse runs the same sweep backwards before
//! the half-length transform.

use crate::error::DspError;
use super::nfft;
use super::pfa;

/// A fast Fourier transform of real-valued arrays, for a fixed even length.
///
/// `real_to_complex` maps N real samples to N/2+1 packed complex values
/// (N+2 floats) with `Im[0] = Im[N/2] = 0`. `complex_to_real` is the reverse
/// map; running it with the opposite sign and a [scale](FftReal::scale) by
/// 1/N recovers the input. Plans are immutable and freely shareable.
pub struct FftReal {
    nfft: usize,
}

impl FftReal {
    /// Creates a transform of length `nfft`, which must be even with
    /// `nfft/2` a valid prime-factor length (maximum 1441440).
    pub fn new(nfft: usize) -> Result<Self, DspError> {
        if nfft % 2 != 0 || !nfft::is_valid(nfft / 2) {
            return Err(DspError::InvalidLength(nfft));
        }
        Ok(Self { nfft })
    }

    /// Creates a transform with the smallest valid length >= n.
    pub fn small(n: usize) -> Result<Self, DspError> {
        Ok(Self { nfft: Self::nfft_small(n)? })
    }

    /// Returns the smallest valid real-transform length not less than `n`.
    pub fn nfft_small(n: usize) -> Result<usize, DspError> {
        nfft::nfft_small((n + 1) / 2)
            .map(|m| 2 * m)
            .map_err(|_| DspError::InvalidLength(n))
    }

    /// Returns the smallest fast real-transform length not less than `n`.
    /// Identical to [nfft_small](FftReal::nfft_small).
    pub fn nfft_fast(n: usize) -> Result<usize, DspError> {
        Self::nfft_small(n)
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

    /// Transforms `rx` (nfft reals) into `cy` (nfft+2 floats, nfft/2+1
    /// packed complex values).
    pub fn real_to_complex(&self, sign: i32, rx: &[f32], cy: &mut [f32])
        -> Result<(), DspError>
    {
        Self::check_sign(sign)?;
        let n = self.nfft;
        Self::check_len(n, rx.len())?;
        Self::check_len(n + 2, cy.len())?;
        // Pack halved sample pairs as a length-n/2 complex sequence.
        for (c, r) in cy[..n].iter_mut().zip(rx[..n].iter()) {
            *c = 0.5 * r;
        }
        pfa::transform(sign, n / 2, cy);
        // Endpoints carry the sums of the even and odd half sequences.
        let cyn = 2.0 * (cy[0] - cy[1]);
        cy[0] = 2.0 * (cy[0] + cy[1]);
        cy[1] = 0.0;
        cy[n] = cyn;
        cy[n + 1] = 0.0;
        // Separate the interleaved half spectra with a rotating twiddle;
        // wpr = -2*sin^2(theta/2) avoids cancellation in the recurrence.
        let theta = f64::from(sign) * 2.0 * std::f64::consts::PI / n as f64;
        let wpr = -2.0 * (0.5 * theta).sin().powi(2);
        let wpi = theta.sin();
        let mut wr = 1.0 + wpr;
        let mut wi = wpi;
        let mut j = 2;
        while j <= n / 2 {
            let k = n - j;
            let (hr, hi) = (f64::from(cy[j]), f64::from(cy[j + 1]));
            let (gr, gi) = (f64::from(cy[k]), f64::from(cy[k + 1]));
            cy[j] = ((hr + gr) + wr * (hi + gi) - wi * (gr - hr)) as f32;
            cy[j + 1] = ((hi - gi) + wr * (gr - hr) + wi * (hi + gi)) as f32;
            cy[k] = ((hr + gr) - wr * (hi + gi) - wi * (hr - gr)) as f32;
            cy[k + 1] = ((gi - hi) - wr * (hr - gr) + wi * (gi + hi)) as f32;
            let wt = wr;
            wr += wr * wpr - wi * wpi;
            wi += wi * wpr + wt * wpi;
            j += 2;
        }
        Ok(())
    }

    /// Transforms `cy` (nfft+2 floats) into `rx` (nfft reals). The exact
    /// reverse of [real_to_complex](FftReal::real_to_complex): call with the
    /// opposite sign and scale by 1/nfft to invert.
    pub fn complex_to_real(&self, sign: i32, cy: &[f32], rx: &mut [f32])
        -> Result<(), DspError>
    {
        Self::check_sign(sign)?;
        let n = self.nfft;
        Self::check_len(n + 2, cy.len())?;
        Self::check_len(n, rx.len())?;
        rx[0] = cy[0] + cy[n];
        rx[1] = cy[0] - cy[n];
        let theta = f64::from(sign) * 2.0 * std::f64::consts::PI / n as f64;
        let wpr = -2.0 * (0.5 * theta).sin().powi(2);
        let wpi = theta.sin();
        let mut wr = 1.0 + wpr;
        let mut wi = wpi;
        let mut j = 2;
        while j <= n / 2 {
            let k = n - j;
            let (hr, hi) = (f64::from(cy[j]), f64::from(cy[j + 1]));
            let (gr, gi) = (f64::from(cy[k]), f64::from(cy[k + 1]));
            // Sum and rotated-difference of the mirrored bins.
            let (fr, fi) = (hr + gr, hi - gi);
            let (dr, di) = (hr - gr, hi + gi);
            let (er, ei) = (wr * dr - wi * di, wr * di + wi * dr);
            rx[j] = (fr - ei) as f32;
            rx[j + 1] = (fi + er) as f32;
            rx[k] = (fr + ei) as f32;
            rx[k + 1] = (er - fi) as f32;
            let wt = wr;
            wr += wr * wpr - wi * wpi;
            wi += wi * wpr + wt * wpi;
            j += 2;
        }
        pfa::transform(sign, n / 2, rx);
        Ok(())
    }

    /// Row-wise variant of [real_to_complex](FftReal::real_to_complex) for
    /// dimension 1 of a flat array: `rx` is `[n2][nfft]`, `cy` is
    /// `[n2][nfft+2]`.
    pub fn real_to_complex1(&self, sign: i32, n2: usize, rx: &[f32], cy: &mut [f32])
        -> Result<(), DspError>
    {
        let n = self.nfft;
        Self::check_len(n * n2, rx.len())?;
        Self::check_len((n + 2) * n2, cy.len())?;
        for (r, c) in rx[..n * n2].chunks_exact(n)
            .zip(cy[..(n + 2) * n2].chunks_exact_mut(n + 2))
        {
            self.real_to_complex(sign, r, c)?;
        }
        Ok(())
    }

    /// Row-wise variant of [complex_to_real](FftReal::complex_to_real) for
    /// dimension 1 of a flat array.
    pub fn complex_to_real1(&self, sign: i32, n2: usize, cy: &[f32], rx: &mut [f32])
        -> Result<(), DspError>
    {
        let n = self.nfft;
        Self::check_len((n + 2) * n2, cy.len())?;
        Self::check_len(n * n2, rx.len())?;
        for (c, r) in cy[..(n + 2) * n2].chunks_exact(n + 2)
            .zip(rx[..n * n2].chunks_exact_mut(n))
        {
            self.complex_to_real(sign, c, r)?;
        }
        Ok(())
    }

    /// Multiplies the first n values by 1/nfft.
    pub fn scale(&self, n: usize, rx: &mut [f32]) {
        let s = 1.0 / self.nfft as f32;
        let len = n.min(rx.len());
        for x in rx[..len].iter_mut() {
            *x *= s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn rejects_bad_lengths() {
        assert!(FftReal::new(7).is_err());
        assert!(FftReal::new(34).is_err()); // 17 is not a valid half length
        assert!(FftReal::new(1441440).is_ok());
        assert_eq!(FftReal::nfft_small(1441441).unwrap_err(),
            DspError::InvalidLength(1441441));
        assert_eq!(FftReal::nfft_small(9).unwrap(), 10);
    }

    #[test]
    fn impulse_spectrum() {
        // N=8 transform of an impulse at sample 1 with sign -1 is
        // exp(-2*pi*i*k/8).
        let fft = FftReal::new(8).unwrap();
        let mut rx = [0.0f32; 8];
        rx[1] = 1.0;
        let mut cy = [0.0f32; 10];
        fft.real_to_complex(-1, &rx, &mut cy).unwrap();
        let expect: [(f32, f32); 5] = [
            (1.0, 0.0),
            (0.707107, -0.707107),
            (0.0, -1.0),
            (-0.707107, -0.707107),
            (-1.0, 0.0),
        ];
        for (k, &(re, im)) in expect.iter().enumerate() {
            assert!((cy[2 * k] - re).abs() < 1e-6, "k={}", k);
            assert!((cy[2 * k + 1] - im).abs() < 1e-6, "k={}", k);
        }
    }

    #[test]
    fn hermitian_endpoints_are_real() {
        let mut rng = SmallRng::seed_from_u64(8);
        let fft = FftReal::new(90).unwrap();
        let rx: Vec<f32> = (0..90).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut cy = vec![0.0f32; 92];
        fft.real_to_complex(1, &rx, &mut cy).unwrap();
        assert_eq!(cy[1], 0.0);
        assert_eq!(cy[91], 0.0);
    }

    #[test]
    fn round_trip() {
        let mut rng = SmallRng::seed_from_u64(18);
        for &n in &[8usize, 10, 24, 180, 1456, 16380] {
            let fft = FftReal::new(n).unwrap();
            let rx: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut cy = vec![0.0f32; n + 2];
            fft.real_to_complex(1, &rx, &mut cy).unwrap();
            let mut back = vec![0.0f32; n];
            fft.complex_to_real(-1, &cy, &mut back).unwrap();
            fft.scale(n, &mut back);
            for (got, want) in back.iter().zip(rx.iter()) {
                assert!((got - want).abs() <= 1e-5, "n={}", n);
            }
        }
    }

    #[test]
    fn matches_complex_transform() {
        // The real transform must agree with the complex transform of the
        // same (zero-imaginary) sequence.
        let mut rng = SmallRng::seed_from_u64(28);
        let n = 24;
        let fft = FftReal::new(n).unwrap();
        let rx: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut cy = vec![0.0f32; n + 2];
        fft.real_to_complex(1, &rx, &mut cy).unwrap();
        let cfft = crate::fft::FftComplex::new(n).unwrap();
        let mut z = vec![0.0f32; 2 * n];
        for (i, &v) in rx.iter().enumerate() {
            z[2 * i] = v;
        }
        cfft.transform(1, &mut z).unwrap();
        for k in 0..=n / 2 {
            assert!((cy[2 * k] - z[2 * k]).abs() <= 1e-5);
            assert!((cy[2 * k + 1] - z[2 * k + 1]).abs() <= 1e-5);
        }
    }

    #[test]
    fn row_wise_round_trip() {
        let mut rng = SmallRng::seed_from_u64(38);
        let (n, n2) = (16usize, 5usize);
        let fft = FftReal::new(n).unwrap();
        let rx: Vec<f32> = (0..n * n2).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut cy = vec![0.0f32; (n + 2) * n2];
        fft.real_to_complex1(1, n2, &rx, &mut cy).unwrap();
        let mut back = vec![0.0f32; n * n2];
        fft.complex_to_real1(-1, n2, &cy, &mut back).unwrap();
        fft.scale(n * n2, &mut back);
        for (got, want) in back.iter().zip(rx.iter()) {
            assert!((got - want).abs() <= 1e-5);
        }
    }
}
