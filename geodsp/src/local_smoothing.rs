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

//! Local anisotropic smoothing
//!
//! Smooths a 2D or 3D image by solving `(I + c*G'DG) y = x` with conjugate
//! gradients, where G is a first-order finite-difference gradient on 2x2
//! (or 2x2x2) cells, D is a spatially varying SPD tensor field, and an
//! optional per-sample weight scales D pointwise. Smoothing is strong along
//! tensor eigenvectors with large eigenvalues and weak across them.
//!
//! The 1D variant is a symmetric tridiagonal system and is solved directly.
//!
//! In 3D the gradient-scatter kernel is data-parallel over the outermost
//! slice index: cells with odd i3 touch different sample pairs than cells
//! with even i3, so the sweep runs as two fully parallel phases with no
//! locking. Results are deterministic for a fixed thread phase split.

use log::{debug, warn};

use crate::error::DspError;
use crate::fft::{FftComplex, FftReal};
use crate::helpers::{saxpy, sdot, sxpay};
use crate::tensors::{Tensors2, Tensors3};

/// The discrete operator `y += c*s*G'DG x` on 2x2 (2D) or 2x2x2 (3D) cells.
///
/// For every cell the gradient is gathered from the corner samples as
/// averaged differences, rotated and scaled by the local tensor, and
/// scattered back to the corners with the transpose stencil. The operator
/// is symmetric positive-semidefinite by construction.
#[derive(Clone, Copy, Default)]
pub struct LocalDiffusionKernel;

impl LocalDiffusionKernel {
    pub fn new() -> Self {
        LocalDiffusionKernel
    }

    /// Accumulates `y += c*s*G'DG x` for a flat `[n2][n1]` image. Slices
    /// must hold n1*n2 samples; `s`, if present, likewise.
    pub fn apply2<T: Tensors2>(&self, d: &T, c: f32, s: Option<&[f32]>,
        n1: usize, n2: usize, x: &[f32], y: &mut [f32])
    {
        debug_assert!(x.len() >= n1 * n2 && y.len() >= n1 * n2);
        let mut di = [0.0f32; 3];
        for i2 in 1..n2 {
            for i1 in 1..n1 {
                d.get_tensor(i1, i2, &mut di);
                let csi = c * s.map_or(1.0, |s| s[i2 * n1 + i1]);
                let d11 = di[0] * csi;
                let d12 = di[1] * csi;
                let d22 = di[2] * csi;
                let x00 = x[i2 * n1 + i1];
                let x01 = x[i2 * n1 + i1 - 1];
                let x10 = x[(i2 - 1) * n1 + i1];
                let x11 = x[(i2 - 1) * n1 + i1 - 1];
                let xa = x00 - x11;
                let xb = x01 - x10;
                let x1 = 0.5 * (xa - xb);
                let x2 = 0.5 * (xa + xb);
                let y1 = d11 * x1 + d12 * x2;
                let y2 = d12 * x1 + d22 * x2;
                let ya = 0.5 * (y1 + y2);
                let yb = 0.5 * (y1 - y2);
                y[i2 * n1 + i1] += ya;
                y[i2 * n1 + i1 - 1] -= yb;
                y[(i2 - 1) * n1 + i1] += yb;
                y[(i2 - 1) * n1 + i1 - 1] -= ya;
            }
        }
    }

    /// One i3 layer of cells of the 3D operator. Writes only the two slabs
    /// i3-1 (`ylo`) and i3 (`yhi`), which is what makes the odd/even phase
    /// scheduling race free.
    fn apply3_layer<T: Tensors3>(&self, d: &T, c: f32, s: Option<&[f32]>,
        i3: usize, n1: usize, n2: usize, x: &[f32], ylo: &mut [f32], yhi: &mut [f32])
    {
        let slab = n1 * n2;
        let x0 = &x[i3 * slab..(i3 + 1) * slab];
        let xm = &x[(i3 - 1) * slab..i3 * slab];
        let mut di = [0.0f32; 6];
        for i2 in 1..n2 {
            for i1 in 1..n1 {
                d.get_tensor(i1, i2, i3, &mut di);
                let csi = c * s.map_or(1.0, |s| s[i3 * slab + i2 * n1 + i1]);
                let d11 = di[0] * csi;
                let d12 = di[1] * csi;
                let d13 = di[2] * csi;
                let d22 = di[3] * csi;
                let d23 = di[4] * csi;
                let d33 = di[5] * csi;
                // corner samples x_e3e2e1, e = 1 on the lagged side
                let x000 = x0[i2 * n1 + i1];
                let x001 = x0[i2 * n1 + i1 - 1];
                let x010 = x0[(i2 - 1) * n1 + i1];
                let x011 = x0[(i2 - 1) * n1 + i1 - 1];
                let x100 = xm[i2 * n1 + i1];
                let x101 = xm[i2 * n1 + i1 - 1];
                let x110 = xm[(i2 - 1) * n1 + i1];
                let x111 = xm[(i2 - 1) * n1 + i1 - 1];
                let g1 = 0.25 * ((x000 - x001) + (x010 - x011) + (x100 - x101) + (x110 - x111));
                let g2 = 0.25 * ((x000 - x010) + (x001 - x011) + (x100 - x110) + (x101 - x111));
                let g3 = 0.25 * ((x000 - x100) + (x001 - x101) + (x010 - x110) + (x011 - x111));
                let y1 = d11 * g1 + d12 * g2 + d13 * g3;
                let y2 = d12 * g1 + d22 * g2 + d23 * g3;
                let y3 = d13 * g1 + d23 * g2 + d33 * g3;
                yhi[i2 * n1 + i1] += 0.25 * (y1 + y2 + y3);
                yhi[i2 * n1 + i1 - 1] += 0.25 * (-y1 + y2 + y3);
                yhi[(i2 - 1) * n1 + i1] += 0.25 * (y1 - y2 + y3);
                yhi[(i2 - 1) * n1 + i1 - 1] += 0.25 * (-y1 - y2 + y3);
                ylo[i2 * n1 + i1] += 0.25 * (y1 + y2 - y3);
                ylo[i2 * n1 + i1 - 1] += 0.25 * (-y1 + y2 - y3);
                ylo[(i2 - 1) * n1 + i1] += 0.25 * (y1 - y2 - y3);
                ylo[(i2 - 1) * n1 + i1 - 1] += 0.25 * (-y1 - y2 - y3);
            }
        }
    }

    /// Accumulates `y += c*s*G'DG x` for a flat `[n3][n2][n1]` image,
    /// serially.
    pub fn apply3<T: Tensors3>(&self, d: &T, c: f32, s: Option<&[f32]>,
        n1: usize, n2: usize, n3: usize, x: &[f32], y: &mut [f32])
    {
        debug_assert!(x.len() >= n1 * n2 * n3 && y.len() >= n1 * n2 * n3);
        let slab = n1 * n2;
        for i3 in 1..n3 {
            let (lo, hi) = y.split_at_mut(i3 * slab);
            self.apply3_layer(d, c, s, i3, n1, n2, x,
                &mut lo[(i3 - 1) * slab..], &mut hi[..slab]);
        }
    }

    /// Parallel variant of [apply3](LocalDiffusionKernel::apply3): layers
    /// with odd i3 write disjoint slab pairs, as do layers with even i3, so
    /// the sweep runs in two phases with the layers of each phase spread
    /// over the pool.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn apply3_parallel<T: Tensors3 + Sync>(&self, d: &T, c: f32,
        s: Option<&[f32]>, n1: usize, n2: usize, n3: usize, x: &[f32],
        y: &mut [f32], pool: &mut scoped_threadpool::Pool)
    {
        if pool.thread_count() < 2 {
            return self.apply3(d, c, s, n1, n2, n3, x, y);
        }
        let slab = n1 * n2;
        let kernel = *self;
        // Phase one: odd i3, slab pairs (0,1), (2,3), ...
        pool.scoped(|sc| {
            for (ci, chunk) in y[..slab * n3].chunks_mut(2 * slab).enumerate() {
                if chunk.len() < 2 * slab {
                    continue;
                }
                let i3 = 2 * ci + 1;
                sc.execute(move || {
                    let (ylo, yhi) = chunk.split_at_mut(slab);
                    kernel.apply3_layer(d, c, s, i3, n1, n2, x, ylo, yhi);
                });
            }
        });
        // Phase two: even i3, slab pairs (1,2), (3,4), ...
        pool.scoped(|sc| {
            for (ci, chunk) in y[slab..slab * n3].chunks_mut(2 * slab).enumerate() {
                if chunk.len() < 2 * slab {
                    continue;
                }
                let i3 = 2 * ci + 2;
                sc.execute(move || {
                    let (ylo, yhi) = chunk.split_at_mut(slab);
                    kernel.apply3_layer(d, c, s, i3, n1, n2, x, ylo, yhi);
                });
            }
        });
    }
}

/// Anisotropic smoothing filter `y = (I + c*G'DG)^-1 x`.
///
/// The system is solved with unpreconditioned conjugate gradients starting
/// from `y = x`, stopping when `|r| <= small*|b|` or after `niter`
/// iterations (in which case the last iterate is returned and a warning is
/// logged). A diagonal preconditioner may be enabled; the incremental
/// residual is recomputed from scratch every 50 iterations to flush
/// accumulated rounding error.
pub struct LocalSmoothingFilter {
    small: f64,
    niter: usize,
    kernel: LocalDiffusionKernel,
    precon: bool,
    #[cfg(not(target_arch = "wasm32"))]
    thread_pool: Option<scoped_threadpool::Pool>,
}

impl Default for LocalSmoothingFilter {
    fn default() -> Self {
        Self::new(0.01, 100).unwrap()
    }
}

impl LocalSmoothingFilter {
    /// Creates a filter with the given CG stopping tolerance (relative to
    /// `|b|`) and iteration cap.
    pub fn new(small: f64, niter: usize) -> Result<Self, DspError> {
        Self::with_kernel(small, niter, LocalDiffusionKernel::new())
    }

    /// Creates a filter with an explicit diffusion kernel.
    pub fn with_kernel(small: f64, niter: usize, kernel: LocalDiffusionKernel)
        -> Result<Self, DspError>
    {
        if !(small > 0.0) || !small.is_finite() {
            return Err(DspError::InvalidArgument(format!(
                "stopping tolerance must be positive and finite, got {}", small)));
        }
        if niter == 0 {
            return Err(DspError::InvalidArgument("niter must be at least 1".into()));
        }
        Ok(Self {
            small,
            niter,
            kernel,
            precon: false,
            #[cfg(not(target_arch = "wasm32"))]
            thread_pool: None,
        })
    }

    /// Enables or disables the diagonal preconditioner.
    pub fn set_preconditioner(&mut self, precon: bool) {
        self.precon = precon;
    }

    /// Sets the number of threads used by the 3D apply. One (the default)
    /// keeps everything on the calling thread.
    pub fn set_num_threads(&mut self, num_threads: usize) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.thread_pool = if num_threads >= 2 {
                Some(scoped_threadpool::Pool::new(num_threads as u32))
            } else {
                None
            };
        }
        #[cfg(target_arch = "wasm32")]
        {
            if num_threads > 1 {
                panic!("Multithreading not supported in WASM");
            }
        }
    }

    fn check_len(required: usize, actual: usize) -> Result<(), DspError> {
        if actual < required {
            return Err(DspError::InsufficientBuffer { required, actual });
        }
        Ok(())
    }

    fn check_scale(c: f32, s: Option<&[f32]>, n: usize) -> Result<(), DspError> {
        if !c.is_finite() {
            return Err(DspError::InvalidArgument(format!(
                "scale factor must be finite, got {}", c)));
        }
        if let Some(s) = s {
            Self::check_len(n, s.len())?;
        }
        Ok(())
    }

    /// Smooths a 1D array: solves the symmetric tridiagonal system
    /// `(I + c*G'SG) y = x` directly (no iteration).
    pub fn apply1(&self, c: f32, s: Option<&[f32]>, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        let n = x.len();
        Self::check_len(n, y.len())?;
        Self::check_scale(c, s, n)?;
        if n == 0 {
            return Ok(());
        }
        // Cell weights between samples i-1 and i.
        let w = |i: usize| -> f64 {
            f64::from(c) * s.map_or(1.0, |s| 0.5 * f64::from(s[i] + s[i - 1]))
        };
        // Thomas algorithm on diag 1 + w_i + w_{i+1}, off-diagonals -w_i.
        let mut cp = vec![0.0f64; n];
        let mut dp = vec![0.0f64; n];
        let mut diag = 1.0 + if n > 1 { w(1) } else { 0.0 };
        cp[0] = if n > 1 { -w(1) / diag } else { 0.0 };
        dp[0] = f64::from(x[0]) / diag;
        for i in 1..n {
            let e = -w(i);
            diag = 1.0 + w(i) + if i + 1 < n { w(i + 1) } else { 0.0 };
            let m = diag - e * cp[i - 1];
            cp[i] = if i + 1 < n { -w(i + 1) / m } else { 0.0 };
            dp[i] = (f64::from(x[i]) - e * dp[i - 1]) / m;
        }
        y[n - 1] = dp[n - 1] as f32;
        for i in (0..n - 1).rev() {
            y[i] = (dp[i] - cp[i] * f64::from(y[i + 1])) as f32;
        }
        Ok(())
    }

    /// Smooths a 2D image with tensor field `d`: solves
    /// `(I + c*s*G'DG) y = x` by conjugate gradients.
    pub fn apply2<T: Tensors2>(&self, d: &T, c: f32, s: Option<&[f32]>,
        n1: usize, n2: usize, x: &[f32], y: &mut [f32]) -> Result<(), DspError>
    {
        let n = n1 * n2;
        Self::check_len(n, x.len())?;
        Self::check_len(n, y.len())?;
        Self::check_scale(c, s, n)?;
        let p = if self.precon {
            Some(make_precon2(d, c, s, n1, n2))
        } else {
            None
        };
        y[..n].copy_from_slice(&x[..n]);
        let kernel = &self.kernel;
        cg(self.small, self.niter,
            |v, q| {
                q.copy_from_slice(v);
                kernel.apply2(d, c, s, n1, n2, v, q);
            },
            &x[..n], &mut y[..n], p.as_deref());
        Ok(())
    }

    /// Smooths a 3D image with tensor field `d`. Data-parallel over the
    /// outermost slice index when threads have been requested with
    /// [set_num_threads](LocalSmoothingFilter::set_num_threads).
    pub fn apply3<T: Tensors3 + Sync>(&mut self, d: &T, c: f32, s: Option<&[f32]>,
        n1: usize, n2: usize, n3: usize, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        let n = n1 * n2 * n3;
        Self::check_len(n, x.len())?;
        Self::check_len(n, y.len())?;
        Self::check_scale(c, s, n)?;
        let p = if self.precon {
            Some(make_precon3(d, c, s, n1, n2, n3))
        } else {
            None
        };
        y[..n].copy_from_slice(&x[..n]);
        let kernel = self.kernel;
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(pool) = self.thread_pool.as_mut() {
                cg(self.small, self.niter,
                    |v, q| {
                        q.copy_from_slice(v);
                        kernel.apply3_parallel(d, c, s, n1, n2, n3, v, q, pool);
                    },
                    &x[..n], &mut y[..n], p.as_deref());
                return Ok(());
            }
        }
        cg(self.small, self.niter,
            |v, q| {
                q.copy_from_slice(v);
                kernel.apply3(d, c, s, n1, n2, n3, v, q);
            },
            &x[..n], &mut y[..n], p.as_deref());
        Ok(())
    }

    /// Applies a 3x3 weighted-average smoothing (weights 1/4, 1/8, 1/16 for
    /// center, edge and corner neighbors) with clamped boundaries. Useful as
    /// a cheap pre- or post-smoother around the CG core.
    pub fn apply_smooth_s2(&self, n1: usize, n2: usize, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        Self::check_len(n1 * n2, x.len())?;
        Self::check_len(n1 * n2, y.len())?;
        for i2 in 0..n2 {
            let m2 = i2.max(1) - 1;
            let p2 = (i2 + 1).min(n2 - 1);
            for i1 in 0..n1 {
                let m1 = i1.max(1) - 1;
                let p1 = (i1 + 1).min(n1 - 1);
                y[i2 * n1 + i1] = 0.25 * x[i2 * n1 + i1]
                    + 0.125
                        * (x[i2 * n1 + m1] + x[i2 * n1 + p1]
                            + x[m2 * n1 + i1] + x[p2 * n1 + i1])
                    + 0.0625
                        * (x[m2 * n1 + m1] + x[m2 * n1 + p1]
                            + x[p2 * n1 + m1] + x[p2 * n1 + p1]);
            }
        }
        Ok(())
    }

    /// 3D variant of [apply_smooth_s2](LocalSmoothingFilter::apply_smooth_s2)
    /// (weights 1/8, 1/16, 1/32, 1/64 for center, face, edge and corner).
    pub fn apply_smooth_s3(&self, n1: usize, n2: usize, n3: usize, x: &[f32],
        y: &mut [f32]) -> Result<(), DspError>
    {
        Self::check_len(n1 * n2 * n3, x.len())?;
        Self::check_len(n1 * n2 * n3, y.len())?;
        let at = |i1: usize, i2: usize, i3: usize| (i3 * n2 + i2) * n1 + i1;
        for i3 in 0..n3 {
            for i2 in 0..n2 {
                for i1 in 0..n1 {
                    let mut v = 0.0f32;
                    for e3 in -1i32..=1 {
                        let k3 = (i3 as i32 + e3).max(0).min(n3 as i32 - 1) as usize;
                        for e2 in -1i32..=1 {
                            let k2 = (i2 as i32 + e2).max(0).min(n2 as i32 - 1) as usize;
                            for e1 in -1i32..=1 {
                                let k1 = (i1 as i32 + e1).max(0).min(n1 as i32 - 1) as usize;
                                let taps = e1.abs() + e2.abs() + e3.abs();
                                v += 0.125 * 0.5f32.powi(taps) * x[at(k1, k2, k3)];
                            }
                        }
                    }
                    y[at(i1, i2, i3)] = v;
                }
            }
        }
        Ok(())
    }

    /// Applies an isotropic low-pass with cutoff `kmax` (cycles per sample,
    /// 0 < kmax <= 0.5) via padded 2D real FFTs; the transfer function rolls
    /// off to zero over a half-cosine taper below kmax. Exposed as an
    /// optional bandpass companion to the CG core.
    pub fn apply_smooth_l2(&self, kmax: f64, n1: usize, n2: usize, x: &[f32],
        y: &mut [f32]) -> Result<(), DspError>
    {
        if !(kmax > 0.0 && kmax <= 0.5) {
            return Err(DspError::InvalidArgument(format!(
                "kmax must be in (0,0.5], got {}", kmax)));
        }
        Self::check_len(n1 * n2, x.len())?;
        Self::check_len(n1 * n2, y.len())?;
        let nf1 = FftReal::nfft_small(n1)?;
        let nf2 = crate::fft::nfft_small(n2)?;
        let fft1 = FftReal::new(nf1)?;
        let fft2 = FftComplex::new(nf2)?;
        let row = nf1 + 2;
        let nc1 = nf1 / 2 + 1;
        let mut cx = vec![0.0f32; row * nf2];
        // Zero-padded copy, forward transforms along both dimensions. The
        // padded rows beyond n2 stay zero through the dim-1 transform.
        let mut rx = vec![0.0f32; nf1 * nf2];
        for i2 in 0..n2 {
            rx[i2 * nf1..i2 * nf1 + n1].copy_from_slice(&x[i2 * n1..(i2 + 1) * n1]);
        }
        fft1.real_to_complex1(1, nf2, &rx, &mut cx)?;
        fft2.transform2(1, nc1, &mut cx)?;
        // Isotropic transfer with a half-cosine rolloff below kmax.
        let width = 0.1f64.min(kmax);
        for j2 in 0..nf2 {
            let k2 = j2.min(nf2 - j2) as f64 / nf2 as f64;
            for j1 in 0..nc1 {
                let k1 = j1 as f64 / nf1 as f64;
                let k = (k1 * k1 + k2 * k2).sqrt();
                let h = if k <= kmax - width {
                    1.0
                } else if k < kmax {
                    0.5 * (1.0 + (std::f64::consts::PI * (k - kmax + width) / width).cos())
                } else {
                    0.0
                };
                cx[j2 * row + 2 * j1] *= h as f32;
                cx[j2 * row + 2 * j1 + 1] *= h as f32;
            }
        }
        fft2.transform2(-1, nc1, &mut cx)?;
        fft1.complex_to_real1(-1, nf2, &cx, &mut rx)?;
        let scale = 1.0 / (nf1 as f32 * nf2 as f32);
        for i2 in 0..n2 {
            for i1 in 0..n1 {
                y[i2 * n1 + i1] = scale * rx[i2 * nf1 + i1];
            }
        }
        Ok(())
    }
}

/// Diagonal of `I + c*s*G'DG` in 2D, inverted for use as a preconditioner.
fn make_precon2<T: Tensors2>(d: &T, c: f32, s: Option<&[f32]>, n1: usize, n2: usize)
    -> Vec<f32>
{
    let mut p = vec![1.0f32; n1 * n2];
    let mut di = [0.0f32; 3];
    for i2 in 1..n2 {
        for i1 in 1..n1 {
            d.get_tensor(i1, i2, &mut di);
            let csi = c * s.map_or(1.0, |s| s[i2 * n1 + i1]);
            let tp = 0.25 * csi * (di[0] + di[2] + 2.0 * di[1]);
            let tm = 0.25 * csi * (di[0] + di[2] - 2.0 * di[1]);
            p[i2 * n1 + i1] += tp;
            p[i2 * n1 + i1 - 1] += tm;
            p[(i2 - 1) * n1 + i1] += tm;
            p[(i2 - 1) * n1 + i1 - 1] += tp;
        }
    }
    for v in p.iter_mut() {
        *v = 1.0 / *v;
    }
    p
}

/// Diagonal of `I + c*s*G'DG` in 3D, inverted.
fn make_precon3<T: Tensors3>(d: &T, c: f32, s: Option<&[f32]>,
    n1: usize, n2: usize, n3: usize) -> Vec<f32>
{
    let mut p = vec![1.0f32; n1 * n2 * n3];
    let mut di = [0.0f32; 6];
    let slab = n1 * n2;
    for i3 in 1..n3 {
        for i2 in 1..n2 {
            for i1 in 1..n1 {
                d.get_tensor(i1, i2, i3, &mut di);
                let csi = c * s.map_or(1.0, |s| s[i3 * slab + i2 * n1 + i1]);
                let trace = di[0] + di[3] + di[5];
                // corner signs: e_k = 1 flips the sign of gradient axis k
                for e in 0..8usize {
                    let s1 = if e & 1 == 0 { 1.0f32 } else { -1.0 };
                    let s2 = if e & 2 == 0 { 1.0f32 } else { -1.0 };
                    let s3 = if e & 4 == 0 { 1.0f32 } else { -1.0 };
                    let cross = s1 * s2 * di[1] + s1 * s3 * di[2] + s2 * s3 * di[4];
                    let idx = (i3 - (e >> 2 & 1)) * slab
                        + (i2 - (e >> 1 & 1)) * n1
                        + (i1 - (e & 1));
                    p[idx] += 0.0625 * csi * (trace + 2.0 * cross);
                }
            }
        }
    }
    for v in p.iter_mut() {
        *v = 1.0 / *v;
    }
    p
}

/// Conjugate gradients for `A y = b` with `A` symmetric positive definite,
/// applied through `aop`, optionally preconditioned by a diagonal `p`.
/// `y` carries the initial iterate in and the solution out.
fn cg<F: FnMut(&[f32], &mut [f32])>(small: f64, niter: usize, mut aop: F,
    b: &[f32], y: &mut [f32], p: Option<&[f32]>)
{
    let n = b.len();
    let mut r = vec![0.0f32; n];
    let mut q = vec![0.0f32; n];
    let mut d = vec![0.0f32; n];
    let mut s = p.map(|_| vec![0.0f32; n]);
    aop(y, &mut q);
    for (r, (b, q)) in r.iter_mut().zip(b.iter().zip(q.iter())) {
        *r = b - q;
    }
    let bnorm = sdot(b, b).sqrt();
    let thresh = small * bnorm;
    let mut delta = match (&mut s, p) {
        (Some(s), Some(p)) => {
            for (s, (p, r)) in s.iter_mut().zip(p.iter().zip(r.iter())) {
                *s = p * r;
            }
            d.copy_from_slice(s);
            sdot(&r, s)
        }
        _ => {
            d.copy_from_slice(&r);
            sdot(&r, &r)
        }
    };
    let mut rr = sdot(&r, &r);
    let mut iter = 0;
    while iter < niter && rr.sqrt() > thresh {
        aop(&d, &mut q);
        let dq = sdot(&d, &q);
        if dq <= 0.0 {
            break;
        }
        let alpha = (delta / dq) as f32;
        saxpy(alpha, &d, y);
        if iter % 50 == 49 {
            // Flush accumulated rounding error in the incremental residual.
            aop(y, &mut q);
            for (r, (b, q)) in r.iter_mut().zip(b.iter().zip(q.iter())) {
                *r = b - q;
            }
        } else {
            saxpy(-alpha, &q, &mut r);
        }
        let delta_old = delta;
        delta = match (&mut s, p) {
            (Some(s), Some(p)) => {
                for (s, (p, r)) in s.iter_mut().zip(p.iter().zip(r.iter())) {
                    *s = p * r;
                }
                sdot(&r, s)
            }
            _ => sdot(&r, &r),
        };
        let beta = (delta / delta_old) as f32;
        match &s {
            Some(s) => sxpay(beta, s, &mut d),
            None => sxpay(beta, &r, &mut d),
        }
        rr = sdot(&r, &r);
        iter += 1;
    }
    if rr.sqrt() > thresh {
        warn!(
            "cg did not converge: iter={} |r|/|b|={:.3e} target={:.3e}",
            iter,
            rr.sqrt() / bnorm.max(f64::MIN_POSITIVE),
            small
        );
    } else {
        debug!("cg converged: iter={} |r|/|b|={:.3e}", iter,
            rr.sqrt() / bnorm.max(f64::MIN_POSITIVE));
    }
}
