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

/// Crate internal helper functions:

use itertools::izip;

/// Dot product accumulated in f64 so that conjugate-gradient reductions are
/// deterministic and well conditioned even for large images.
pub(crate) fn sdot(x: &[f32], y: &[f32]) -> f64 {
    x.iter().zip(y.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

/// y += a*x
pub(crate) fn saxpy(a: f32, x: &[f32], y: &mut [f32]) {
    for (x, y) in x.iter().zip(y.iter_mut()) {
        *y += a * x;
    }
}

/// y = x + a*y
pub(crate) fn sxpay(a: f32, x: &[f32], y: &mut [f32]) {
    for (x, y) in izip!(x.iter(), y.iter_mut()) {
        *y = x + a * *y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_updates() {
        let x = [1.0f32, 2.0, 3.0];
        let mut y = [4.0f32, 5.0, 6.0];
        assert_eq!(sdot(&x, &y), 32.0);
        saxpy(2.0, &x, &mut y);
        assert_eq!(y, [6.0, 9.0, 12.0]);
        sxpay(0.5, &x, &mut y);
        assert_eq!(y, [4.0, 6.5, 9.0]);
    }
}
