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

//! Error type shared by all kernels

use thiserror::Error;

/// Failures reported at construction or call entry.
///
/// All conditions are detected before any output sample is written, so a
/// returned error implies no partial effect on the output buffers. Iterative
/// solvers that hit their iteration cap do *not* report an error; they return
/// the last iterate and log a warning instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// The requested FFT length does not factor into the prime-factor set.
    #[error("invalid FFT length: {0}")]
    InvalidLength(usize),
    /// A transform sign other than +1 or -1.
    #[error("invalid transform sign: {0} (must be +1 or -1)")]
    InvalidSign(i32),
    /// An input or output slice is smaller than the kernel requires.
    #[error("insufficient buffer: required {required} floats, got {actual}")]
    InsufficientBuffer { required: usize, actual: usize },
    /// A parameter is out of range, NaN, or violates an ordering invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
