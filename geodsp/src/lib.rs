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

//! This crate contains the numerical kernels shared by our seismic and
//! image processing pipelines: a self-sorting prime-factor FFT (complex and
//! real), Deriche's recursive Gaussian filter and its derivatives,
//! minimum-phase filtering on a helix, and local anisotropic smoothing by
//! conjugate-gradient solution of `(I + G'DG) y = x` with eigen-decomposed
//! tensor fields.
//!
//! Usage
//! -----
//! Kernels are constructed once for fixed parameters and reused; they are
//! immutable and freely shareable afterwards:
//!
//! ```
//! use geodsp::fft::FftComplex;
//!
//! // Plan a transform for at least 1000 complex samples.
//! let fft = FftComplex::small(1000).unwrap();
//! let n = fft.nfft();
//! // Packed complex data: interleaved re/im pairs.
//! let mut z = vec![0.0f32; 2 * n];
//! z[2] = 1.0; // impulse at complex index 1
//! fft.transform(1, &mut z).unwrap();
//! // Transforming back with the opposite sign and scaling by 1/n
//! // recovers the impulse.
//! fft.transform(-1, &mut z).unwrap();
//! fft.scale(n, &mut z);
//! assert!((z[2] - 1.0).abs() < 1e-5);
//! ```

pub mod fft;

mod eigen;
mod error;
mod helpers;
mod local_smoothing;
mod min_phase;
mod recursive_gaussian;
mod tensors;

pub use eigen::*;
pub use error::*;
pub use local_smoothing::*;
pub use min_phase::*;
pub use recursive_gaussian::*;
pub use tensors::*;
