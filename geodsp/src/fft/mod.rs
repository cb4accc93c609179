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

//! Prime-factor fast Fourier transforms
//!
//! Complex transforms of any length in the prime-factor table (up to
//! 720720) and real transforms of twice those lengths. All transforms
//! consume and produce packed complex data: interleaved re/im pairs of f32.

mod complex;
mod nfft;
mod pfa;
mod real;

pub use complex::FftComplex;
pub use nfft::{nfft_fast, nfft_small, NFFT_MAX};
pub use real::FftReal;
