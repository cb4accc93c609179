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

//! Minimum-phase filtering on a helix
//!
//! A causal filter defined by an explicit list of (lag, coefficient) pairs.
//! Causality is with respect to the helix scan order: the multi-index is
//! linearized innermost dimension first, and every non-zero lag must point
//! into the past of that scan. Because the filter is causal with a non-zero
//! zero-lag coefficient, the inverse filter exists and is applied by simple
//! substitution in scan order.
//!
//! Array traversal is split into boundary and interior regions from the
//! precomputed lag bounds (3 regions in 1D, 9 in 2D, 27 in 3D); the interior
//! loops carry no bounds checks.
//!
//! Stability of the inverse requires the coefficients to be minimum-phase.
//! This precondition is not verified; applying the inverse of a filter that
//! is not minimum-phase produces unbounded output.

use itertools::izip;

use crate::error::DspError;

/// A causal filter on a 1D, 2D or 3D helix.
///
/// Immutable after construction and freely shareable. All apply methods
/// write an output distinct from the input; `apply_inverse*` methods may be
/// seeded in place since they read only already-written output samples.
pub struct MinPhaseFilter {
    lag1: Vec<i32>,
    lag2: Vec<i32>,
    lag3: Vec<i32>,
    a: Vec<f32>,
    min1: i32,
    max1: i32,
    min2: i32,
    max2: i32,
    min3: i32,
    max3: i32,
}

fn minmax(lags: &[i32]) -> (i32, i32) {
    let min = lags.iter().copied().min().unwrap();
    let max = lags.iter().copied().max().unwrap();
    (min, max)
}

impl MinPhaseFilter {
    /// Creates a 1D filter from lags and coefficients.
    pub fn new1(lag1: &[i32], a: &[f32]) -> Result<Self, DspError> {
        Self::new3(lag1, &vec![0; lag1.len()], &vec![0; lag1.len()], a)
    }

    /// Creates a 2D filter from lags and coefficients.
    pub fn new2(lag1: &[i32], lag2: &[i32], a: &[f32]) -> Result<Self, DspError> {
        Self::new3(lag1, lag2, &vec![0; lag1.len()], a)
    }

    /// Creates a 3D filter from lags and coefficients.
    ///
    /// Entry 0 must have all lags zero with a non-zero coefficient; every
    /// other entry must be lexicographically positive in (lag3,lag2,lag1),
    /// i.e. point into the past of the helix scan.
    pub fn new3(lag1: &[i32], lag2: &[i32], lag3: &[i32], a: &[f32])
        -> Result<Self, DspError>
    {
        let m = a.len();
        if m == 0 || lag1.len() != m || lag2.len() != m || lag3.len() != m {
            return Err(DspError::InvalidArgument(format!(
                "lag and coefficient arrays must have equal non-zero length \
                 ({},{},{} lags for {} coefficients)",
                lag1.len(), lag2.len(), lag3.len(), m)));
        }
        if lag1[0] != 0 || lag2[0] != 0 || lag3[0] != 0 {
            return Err(DspError::InvalidArgument(
                "entry 0 must have zero lags".into()));
        }
        if a[0] == 0.0 || !a[0].is_finite() {
            return Err(DspError::InvalidArgument(format!(
                "zero-lag coefficient must be non-zero and finite, got {}", a[0])));
        }
        if a.iter().any(|v| !v.is_finite()) {
            return Err(DspError::InvalidArgument(
                "coefficients must be finite".into()));
        }
        for (j, (l1, l2, l3)) in izip!(lag1, lag2, lag3).enumerate().skip(1) {
            let causal = *l3 > 0
                || (*l3 == 0 && *l2 > 0)
                || (*l3 == 0 && *l2 == 0 && *l1 > 0);
            if !causal {
                return Err(DspError::InvalidArgument(format!(
                    "lag {} = ({},{},{}) does not point into the helix past",
                    j, l1, l2, l3)));
            }
        }
        let (min1, max1) = minmax(lag1);
        let (min2, max2) = minmax(lag2);
        let (min3, max3) = minmax(lag3);
        Ok(Self {
            lag1: lag1.to_vec(),
            lag2: lag2.to_vec(),
            lag3: lag3.to_vec(),
            a: a.to_vec(),
            min1, max1, min2, max2, min3, max3,
        })
    }

    /// Number of (lag, coefficient) entries.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    fn check_dim(&self, dim: usize) -> Result<(), DspError> {
        let used = if self.lag3.iter().any(|&l| l != 0) {
            3
        } else if self.lag2.iter().any(|&l| l != 0) {
            2
        } else {
            1
        };
        if used > dim {
            return Err(DspError::InvalidArgument(format!(
                "filter has {}-dimensional lags, applied to {}D data", used, dim)));
        }
        Ok(())
    }

    fn check_len(required: usize, actual: usize) -> Result<(), DspError> {
        if actual < required {
            return Err(DspError::InsufficientBuffer { required, actual });
        }
        Ok(())
    }

    // Interior bounds along one axis for past-pointing access i-l (apply,
    // inverse) and future-pointing access i+l (transpose variants).
    fn past(min: i32, max: i32, n: i32) -> (i32, i32) {
        let lo = max.max(0).min(n);
        (lo, (n + min).max(lo))
    }

    fn future(min: i32, max: i32, n: i32) -> (i32, i32) {
        let lo = (-min).max(0).min(n);
        (lo, (n - max).max(lo))
    }

    /// y = A x (1D).
    pub fn apply1(&self, x: &[f32], y: &mut [f32]) -> Result<(), DspError> {
        self.check_dim(1)?;
        let n = x.len();
        Self::check_len(n, y.len())?;
        let ni = n as i32;
        let (lo, hi) = Self::past(self.min1, self.max1, ni);
        let masked = |i1: i32| {
            let mut s = 0.0f32;
            for (l1, aj) in self.lag1.iter().zip(self.a.iter()) {
                let k = i1 - l1;
                if 0 <= k && k < ni {
                    s += aj * x[k as usize];
                }
            }
            s
        };
        for i1 in 0..lo {
            y[i1 as usize] = masked(i1);
        }
        for i1 in lo..hi {
            let mut s = 0.0f32;
            for (l1, aj) in self.lag1.iter().zip(self.a.iter()) {
                s += aj * x[(i1 - l1) as usize];
            }
            y[i1 as usize] = s;
        }
        for i1 in hi..ni {
            y[i1 as usize] = masked(i1);
        }
        Ok(())
    }

    /// y = A' x (1D), scanning backward.
    pub fn apply_transpose1(&self, x: &[f32], y: &mut [f32]) -> Result<(), DspError> {
        self.check_dim(1)?;
        let n = x.len();
        Self::check_len(n, y.len())?;
        let ni = n as i32;
        let (lo, hi) = Self::future(self.min1, self.max1, ni);
        let masked = |i1: i32| {
            let mut s = 0.0f32;
            for (l1, aj) in self.lag1.iter().zip(self.a.iter()) {
                let k = i1 + l1;
                if 0 <= k && k < ni {
                    s += aj * x[k as usize];
                }
            }
            s
        };
        for i1 in (hi..ni).rev() {
            y[i1 as usize] = masked(i1);
        }
        for i1 in (lo..hi).rev() {
            let mut s = 0.0f32;
            for (l1, aj) in self.lag1.iter().zip(self.a.iter()) {
                s += aj * x[(i1 + l1) as usize];
            }
            y[i1 as usize] = s;
        }
        for i1 in (0..lo).rev() {
            y[i1 as usize] = masked(i1);
        }
        Ok(())
    }

    /// Solves A y = x (1D) by forward substitution.
    pub fn apply_inverse1(&self, x: &[f32], y: &mut [f32]) -> Result<(), DspError> {
        self.check_dim(1)?;
        let n = x.len();
        Self::check_len(n, y.len())?;
        let ni = n as i32;
        let a0 = self.a[0];
        let (lo, hi) = Self::past(self.min1, self.max1, ni);
        for i1 in 0..ni {
            let mut s = x[i1 as usize];
            if lo <= i1 && i1 < hi {
                for (l1, aj) in self.lag1.iter().zip(self.a.iter()).skip(1) {
                    s -= aj * y[(i1 - l1) as usize];
                }
            } else {
                for (l1, aj) in self.lag1.iter().zip(self.a.iter()).skip(1) {
                    let k = i1 - l1;
                    if 0 <= k && k < ni {
                        s -= aj * y[k as usize];
                    }
                }
            }
            y[i1 as usize] = s / a0;
        }
        Ok(())
    }

    /// Solves A' y = x (1D) by backward substitution.
    pub fn apply_inverse_transpose1(&self, x: &[f32], y: &mut [f32]) -> Result<(), DspError> {
        self.check_dim(1)?;
        let n = x.len();
        Self::check_len(n, y.len())?;
        let ni = n as i32;
        let a0 = self.a[0];
        let (lo, hi) = Self::future(self.min1, self.max1, ni);
        for i1 in (0..ni).rev() {
            let mut s = x[i1 as usize];
            if lo <= i1 && i1 < hi {
                for (l1, aj) in self.lag1.iter().zip(self.a.iter()).skip(1) {
                    s -= aj * y[(i1 + l1) as usize];
                }
            } else {
                for (l1, aj) in self.lag1.iter().zip(self.a.iter()).skip(1) {
                    let k = i1 + l1;
                    if 0 <= k && k < ni {
                        s -= aj * y[k as usize];
                    }
                }
            }
            y[i1 as usize] = s / a0;
        }
        Ok(())
    }

    /// y = A x (2D, flat `[n2][n1]`).
    pub fn apply2(&self, n1: usize, n2: usize, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        self.check_dim(2)?;
        Self::check_len(n1 * n2, x.len())?;
        Self::check_len(n1 * n2, y.len())?;
        let (n1i, n2i) = (n1 as i32, n2 as i32);
        let (lo1, hi1) = Self::past(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::past(self.min2, self.max2, n2i);
        macro_rules! masked2 {
            ($i1:expr, $i2:expr) => {{
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    let k1 = $i1 - l1;
                    let k2 = $i2 - l2;
                    if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i {
                        s += aj * x[(k2 * n1i + k1) as usize];
                    }
                }
                s
            }};
        }
        // Rows where dimension-2 accesses may leave the array.
        for i2 in (0..lo2).chain(hi2..n2i) {
            for i1 in 0..n1i {
                y[(i2 * n1i + i1) as usize] = masked2!(i1, i2);
            }
        }
        // Rows with all dimension-2 accesses valid: mask only dimension 1
        // on the row ends, none in the interior.
        for i2 in lo2..hi2 {
            for i1 in (0..lo1).chain(hi1..n1i) {
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    let k1 = i1 - l1;
                    if 0 <= k1 && k1 < n1i {
                        s += aj * x[((i2 - l2) * n1i + k1) as usize];
                    }
                }
                y[(i2 * n1i + i1) as usize] = s;
            }
            for i1 in lo1..hi1 {
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    s += aj * x[((i2 - l2) * n1i + (i1 - l1)) as usize];
                }
                y[(i2 * n1i + i1) as usize] = s;
            }
        }
        Ok(())
    }

    /// y = A' x (2D), scanning backward.
    pub fn apply_transpose2(&self, n1: usize, n2: usize, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        self.check_dim(2)?;
        Self::check_len(n1 * n2, x.len())?;
        Self::check_len(n1 * n2, y.len())?;
        let (n1i, n2i) = (n1 as i32, n2 as i32);
        let (lo1, hi1) = Self::future(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::future(self.min2, self.max2, n2i);
        macro_rules! masked2 {
            ($i1:expr, $i2:expr) => {{
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    let k1 = $i1 + l1;
                    let k2 = $i2 + l2;
                    if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i {
                        s += aj * x[(k2 * n1i + k1) as usize];
                    }
                }
                s
            }};
        }
        for i2 in (0..lo2).chain(hi2..n2i) {
            for i1 in (0..n1i).rev() {
                y[(i2 * n1i + i1) as usize] = masked2!(i1, i2);
            }
        }
        for i2 in (lo2..hi2).rev() {
            for i1 in (hi1..n1i).rev() {
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    let k1 = i1 + l1;
                    if 0 <= k1 && k1 < n1i {
                        s += aj * x[((i2 + l2) * n1i + k1) as usize];
                    }
                }
                y[(i2 * n1i + i1) as usize] = s;
            }
            for i1 in (lo1..hi1).rev() {
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    s += aj * x[((i2 + l2) * n1i + (i1 + l1)) as usize];
                }
                y[(i2 * n1i + i1) as usize] = s;
            }
            for i1 in (0..lo1).rev() {
                let mut s = 0.0f32;
                for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a) {
                    let k1 = i1 + l1;
                    if 0 <= k1 && k1 < n1i {
                        s += aj * x[((i2 + l2) * n1i + k1) as usize];
                    }
                }
                y[(i2 * n1i + i1) as usize] = s;
            }
        }
        Ok(())
    }

    /// Solves A y = x (2D) by forward substitution in helix scan order.
    pub fn apply_inverse2(&self, n1: usize, n2: usize, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        self.check_dim(2)?;
        Self::check_len(n1 * n2, x.len())?;
        Self::check_len(n1 * n2, y.len())?;
        let (n1i, n2i) = (n1 as i32, n2 as i32);
        let a0 = self.a[0];
        let (lo1, hi1) = Self::past(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::past(self.min2, self.max2, n2i);
        for i2 in 0..n2i {
            let row_interior = lo2 <= i2 && i2 < hi2;
            for i1 in 0..n1i {
                let mut s = x[(i2 * n1i + i1) as usize];
                if row_interior && lo1 <= i1 && i1 < hi1 {
                    for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a).skip(1) {
                        s -= aj * y[((i2 - l2) * n1i + (i1 - l1)) as usize];
                    }
                } else {
                    for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a).skip(1) {
                        let k1 = i1 - l1;
                        let k2 = i2 - l2;
                        if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i {
                            s -= aj * y[(k2 * n1i + k1) as usize];
                        }
                    }
                }
                y[(i2 * n1i + i1) as usize] = s / a0;
            }
        }
        Ok(())
    }

    /// Solves A' y = x (2D) by backward substitution in reverse scan order.
    pub fn apply_inverse_transpose2(&self, n1: usize, n2: usize, x: &[f32],
        y: &mut [f32]) -> Result<(), DspError>
    {
        self.check_dim(2)?;
        Self::check_len(n1 * n2, x.len())?;
        Self::check_len(n1 * n2, y.len())?;
        let (n1i, n2i) = (n1 as i32, n2 as i32);
        let a0 = self.a[0];
        let (lo1, hi1) = Self::future(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::future(self.min2, self.max2, n2i);
        for i2 in (0..n2i).rev() {
            let row_interior = lo2 <= i2 && i2 < hi2;
            for i1 in (0..n1i).rev() {
                let mut s = x[(i2 * n1i + i1) as usize];
                if row_interior && lo1 <= i1 && i1 < hi1 {
                    for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a).skip(1) {
                        s -= aj * y[((i2 + l2) * n1i + (i1 + l1)) as usize];
                    }
                } else {
                    for (l1, l2, aj) in izip!(&self.lag1, &self.lag2, &self.a).skip(1) {
                        let k1 = i1 + l1;
                        let k2 = i2 + l2;
                        if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i {
                            s -= aj * y[(k2 * n1i + k1) as usize];
                        }
                    }
                }
                y[(i2 * n1i + i1) as usize] = s / a0;
            }
        }
        Ok(())
    }

    /// y = A x (3D, flat `[n3][n2][n1]`).
    pub fn apply3(&self, n1: usize, n2: usize, n3: usize, x: &[f32], y: &mut [f32])
        -> Result<(), DspError>
    {
        self.check_dim(3)?;
        Self::check_len(n1 * n2 * n3, x.len())?;
        Self::check_len(n1 * n2 * n3, y.len())?;
        let (n1i, n2i, n3i) = (n1 as i32, n2 as i32, n3 as i32);
        let (lo1, hi1) = Self::past(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::past(self.min2, self.max2, n2i);
        let (lo3, hi3) = Self::past(self.min3, self.max3, n3i);
        macro_rules! masked3 {
            ($i1:expr, $i2:expr, $i3:expr) => {{
                let mut s = 0.0f32;
                for (l1, l2, l3, aj) in
                    izip!(&self.lag1, &self.lag2, &self.lag3, &self.a)
                {
                    let k1 = $i1 - l1;
                    let k2 = $i2 - l2;
                    let k3 = $i3 - l3;
                    if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i && 0 <= k3 && k3 < n3i {
                        s += aj * x[((k3 * n2i + k2) * n1i + k1) as usize];
                    }
                }
                s
            }};
        }
        for i3 in 0..n3i {
            let i3_interior = lo3 <= i3 && i3 < hi3;
            for i2 in 0..n2i {
                let i2_interior = i3_interior && lo2 <= i2 && i2 < hi2;
                if !i2_interior {
                    for i1 in 0..n1i {
                        y[((i3 * n2i + i2) * n1i + i1) as usize] = masked3!(i1, i2, i3);
                    }
                    continue;
                }
                for i1 in (0..lo1).chain(hi1..n1i) {
                    let mut s = 0.0f32;
                    for (l1, l2, l3, aj) in
                        izip!(&self.lag1, &self.lag2, &self.lag3, &self.a)
                    {
                        let k1 = i1 - l1;
                        if 0 <= k1 && k1 < n1i {
                            s += aj * x[(((i3 - l3) * n2i + (i2 - l2)) * n1i + k1) as usize];
                        }
                    }
                    y[((i3 * n2i + i2) * n1i + i1) as usize] = s;
                }
                for i1 in lo1..hi1 {
                    let mut s = 0.0f32;
                    for (l1, l2, l3, aj) in
                        izip!(&self.lag1, &self.lag2, &self.lag3, &self.a)
                    {
                        s += aj
                            * x[(((i3 - l3) * n2i + (i2 - l2)) * n1i + (i1 - l1)) as usize];
                    }
                    y[((i3 * n2i + i2) * n1i + i1) as usize] = s;
                }
            }
        }
        Ok(())
    }

    /// y = A' x (3D), scanning backward.
    pub fn apply_transpose3(&self, n1: usize, n2: usize, n3: usize, x: &[f32],
        y: &mut [f32]) -> Result<(), DspError>
    {
        self.check_dim(3)?;
        Self::check_len(n1 * n2 * n3, x.len())?;
        Self::check_len(n1 * n2 * n3, y.len())?;
        let (n1i, n2i, n3i) = (n1 as i32, n2 as i32, n3 as i32);
        let (lo1, hi1) = Self::future(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::future(self.min2, self.max2, n2i);
        let (lo3, hi3) = Self::future(self.min3, self.max3, n3i);
        macro_rules! masked3 {
            ($i1:expr, $i2:expr, $i3:expr) => {{
                let mut s = 0.0f32;
                for (l1, l2, l3, aj) in
                    izip!(&self.lag1, &self.lag2, &self.lag3, &self.a)
                {
                    let k1 = $i1 + l1;
                    let k2 = $i2 + l2;
                    let k3 = $i3 + l3;
                    if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i && 0 <= k3 && k3 < n3i {
                        s += aj * x[((k3 * n2i + k2) * n1i + k1) as usize];
                    }
                }
                s
            }};
        }
        for i3 in (0..n3i).rev() {
            let i3_interior = lo3 <= i3 && i3 < hi3;
            for i2 in (0..n2i).rev() {
                let i2_interior = i3_interior && lo2 <= i2 && i2 < hi2;
                if !i2_interior {
                    for i1 in (0..n1i).rev() {
                        y[((i3 * n2i + i2) * n1i + i1) as usize] = masked3!(i1, i2, i3);
                    }
                    continue;
                }
                for i1 in (hi1..n1i).rev().chain((0..lo1).rev()) {
                    let mut s = 0.0f32;
                    for (l1, l2, l3, aj) in
                        izip!(&self.lag1, &self.lag2, &self.lag3, &self.a)
                    {
                        let k1 = i1 + l1;
                        if 0 <= k1 && k1 < n1i {
                            s += aj * x[(((i3 + l3) * n2i + (i2 + l2)) * n1i + k1) as usize];
                        }
                    }
                    y[((i3 * n2i + i2) * n1i + i1) as usize] = s;
                }
                for i1 in (lo1..hi1).rev() {
                    let mut s = 0.0f32;
                    for (l1, l2, l3, aj) in
                        izip!(&self.lag1, &self.lag2, &self.lag3, &self.a)
                    {
                        s += aj
                            * x[(((i3 + l3) * n2i + (i2 + l2)) * n1i + (i1 + l1)) as usize];
                    }
                    y[((i3 * n2i + i2) * n1i + i1) as usize] = s;
                }
            }
        }
        Ok(())
    }

    /// Solves A y = x (3D) by forward substitution in helix scan order.
    pub fn apply_inverse3(&self, n1: usize, n2: usize, n3: usize, x: &[f32],
        y: &mut [f32]) -> Result<(), DspError>
    {
        self.check_dim(3)?;
        Self::check_len(n1 * n2 * n3, x.len())?;
        Self::check_len(n1 * n2 * n3, y.len())?;
        let (n1i, n2i, n3i) = (n1 as i32, n2 as i32, n3 as i32);
        let a0 = self.a[0];
        let (lo1, hi1) = Self::past(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::past(self.min2, self.max2, n2i);
        let (lo3, hi3) = Self::past(self.min3, self.max3, n3i);
        for i3 in 0..n3i {
            let i3_interior = lo3 <= i3 && i3 < hi3;
            for i2 in 0..n2i {
                let i2_interior = i3_interior && lo2 <= i2 && i2 < hi2;
                for i1 in 0..n1i {
                    let mut s = x[((i3 * n2i + i2) * n1i + i1) as usize];
                    if i2_interior && lo1 <= i1 && i1 < hi1 {
                        for (l1, l2, l3, aj) in
                            izip!(&self.lag1, &self.lag2, &self.lag3, &self.a).skip(1)
                        {
                            s -= aj
                                * y[(((i3 - l3) * n2i + (i2 - l2)) * n1i + (i1 - l1))
                                    as usize];
                        }
                    } else {
                        for (l1, l2, l3, aj) in
                            izip!(&self.lag1, &self.lag2, &self.lag3, &self.a).skip(1)
                        {
                            let k1 = i1 - l1;
                            let k2 = i2 - l2;
                            let k3 = i3 - l3;
                            if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i
                                && 0 <= k3 && k3 < n3i
                            {
                                s -= aj * y[((k3 * n2i + k2) * n1i + k1) as usize];
                            }
                        }
                    }
                    y[((i3 * n2i + i2) * n1i + i1) as usize] = s / a0;
                }
            }
        }
        Ok(())
    }

    /// Solves A' y = x (3D) by backward substitution in reverse scan order.
    pub fn apply_inverse_transpose3(&self, n1: usize, n2: usize, n3: usize,
        x: &[f32], y: &mut [f32]) -> Result<(), DspError>
    {
        self.check_dim(3)?;
        Self::check_len(n1 * n2 * n3, x.len())?;
        Self::check_len(n1 * n2 * n3, y.len())?;
        let (n1i, n2i, n3i) = (n1 as i32, n2 as i32, n3 as i32);
        let a0 = self.a[0];
        let (lo1, hi1) = Self::future(self.min1, self.max1, n1i);
        let (lo2, hi2) = Self::future(self.min2, self.max2, n2i);
        let (lo3, hi3) = Self::future(self.min3, self.max3, n3i);
        for i3 in (0..n3i).rev() {
            let i3_interior = lo3 <= i3 && i3 < hi3;
            for i2 in (0..n2i).rev() {
                let i2_interior = i3_interior && lo2 <= i2 && i2 < hi2;
                for i1 in (0..n1i).rev() {
                    let mut s = x[((i3 * n2i + i2) * n1i + i1) as usize];
                    if i2_interior && lo1 <= i1 && i1 < hi1 {
                        for (l1, l2, l3, aj) in
                            izip!(&self.lag1, &self.lag2, &self.lag3, &self.a).skip(1)
                        {
                            s -= aj
                                * y[(((i3 + l3) * n2i + (i2 + l2)) * n1i + (i1 + l1))
                                    as usize];
                        }
                    } else {
                        for (l1, l2, l3, aj) in
                            izip!(&self.lag1, &self.lag2, &self.lag3, &self.a).skip(1)
                        {
                            let k1 = i1 + l1;
                            let k2 = i2 + l2;
                            let k3 = i3 + l3;
                            if 0 <= k1 && k1 < n1i && 0 <= k2 && k2 < n2i
                                && 0 <= k3 && k3 < n3i
                            {
                                s -= aj * y[((k3 * n2i + k2) * n1i + k1) as usize];
                            }
                        }
                    }
                    y[((i3 * n2i + i2) * n1i + i1) as usize] = s / a0;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::sdot;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn randv(rng: &mut SmallRng, n: usize) -> Vec<f32> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn constructor_enforces_invariants() {
        assert!(MinPhaseFilter::new1(&[0, 1], &[1.0, -0.5]).is_ok());
        // entry 0 must be zero-lag
        assert!(MinPhaseFilter::new1(&[1, 0], &[1.0, -0.5]).is_err());
        // zero-lag coefficient must not vanish
        assert!(MinPhaseFilter::new1(&[0, 1], &[0.0, -0.5]).is_err());
        // later entries must point into the past
        assert!(MinPhaseFilter::new1(&[0, -1], &[1.0, -0.5]).is_err());
        assert!(MinPhaseFilter::new2(&[0, -1], &[0, 0], &[1.0, 0.5]).is_err());
        // negative lag1 is fine once lag2 is positive
        assert!(MinPhaseFilter::new2(&[0, -1], &[0, 1], &[1.0, 0.5]).is_ok());
        // mismatched lengths
        assert!(MinPhaseFilter::new1(&[0, 1, 2], &[1.0, -0.5]).is_err());
        // NaN coefficients
        assert!(MinPhaseFilter::new1(&[0, 1], &[1.0, f32::NAN]).is_err());
        // 2D filter cannot be applied to 1D data
        let f = MinPhaseFilter::new2(&[0, 0], &[0, 1], &[1.0, 0.5]).unwrap();
        let x = [0.0f32; 4];
        let mut y = [0.0f32; 4];
        assert!(f.apply1(&x, &mut y).is_err());
    }

    #[test]
    fn impulse_and_inverse_1d() {
        let f = MinPhaseFilter::new1(&[0, 1], &[1.0, -0.5]).unwrap();
        let x = [1.0f32, 0.0, 0.0, 0.0];
        let mut y = [0.0f32; 4];
        f.apply1(&x, &mut y).unwrap();
        assert_eq!(y, [1.0, -0.5, 0.0, 0.0]);
        let mut back = [0.0f32; 4];
        f.apply_inverse1(&y, &mut back).unwrap();
        for (got, want) in back.iter().zip(x.iter()) {
            assert!((got - want).abs() <= 1e-6);
        }
    }

    #[test]
    fn inverse_round_trip_2d() {
        let f = MinPhaseFilter::new2(&[0, 1, -1, 0], &[0, 0, 1, 1],
            &[1.0, -0.4, 0.2, -0.3]).unwrap();
        let mut rng = SmallRng::seed_from_u64(55);
        let (n1, n2) = (13usize, 9usize);
        let x = randv(&mut rng, n1 * n2);
        let mut y = vec![0.0f32; n1 * n2];
        f.apply2(n1, n2, &x, &mut y).unwrap();
        let mut back = vec![0.0f32; n1 * n2];
        f.apply_inverse2(n1, n2, &y, &mut back).unwrap();
        let mut num = 0.0f64;
        let mut den = 0.0f64;
        for (got, want) in back.iter().zip(x.iter()) {
            num += f64::from(got - want).powi(2);
            den += f64::from(*want).powi(2);
        }
        assert!((num / den).sqrt() <= 1e-4);
    }

    #[test]
    fn transpose_is_adjoint() {
        let f = MinPhaseFilter::new2(&[0, 1, -2, 0], &[0, 0, 1, 2],
            &[1.0, -0.4, 0.2, -0.3]).unwrap();
        let mut rng = SmallRng::seed_from_u64(65);
        let (n1, n2) = (7usize, 11usize);
        let x = randv(&mut rng, n1 * n2);
        let z = randv(&mut rng, n1 * n2);
        let mut ax = vec![0.0f32; n1 * n2];
        let mut atz = vec![0.0f32; n1 * n2];
        f.apply2(n1, n2, &x, &mut ax).unwrap();
        f.apply_transpose2(n1, n2, &z, &mut atz).unwrap();
        let lhs = sdot(&ax, &z);
        let rhs = sdot(&x, &atz);
        assert!((lhs - rhs).abs() <= 1e-5 * lhs.abs().max(1.0));
    }

    #[test]
    fn inverse_transpose_is_adjoint_of_inverse() {
        let f = MinPhaseFilter::new1(&[0, 1, 2], &[1.0, -0.6, 0.08]).unwrap();
        let mut rng = SmallRng::seed_from_u64(75);
        let n = 64;
        let x = randv(&mut rng, n);
        let z = randv(&mut rng, n);
        let mut ix = vec![0.0f32; n];
        let mut itz = vec![0.0f32; n];
        f.apply_inverse1(&x, &mut ix).unwrap();
        f.apply_inverse_transpose1(&z, &mut itz).unwrap();
        let lhs = sdot(&ix, &z);
        let rhs = sdot(&x, &itz);
        assert!((lhs - rhs).abs() <= 1e-4 * lhs.abs().max(1.0));
    }

    #[test]
    fn boundary_regions_match_naive_filter_2d() {
        // Lags larger than half the array force every region to be hit.
        let f = MinPhaseFilter::new2(&[0, 2, -3, 1], &[0, 0, 2, 3],
            &[1.0, -0.4, 0.25, 0.1]).unwrap();
        let mut rng = SmallRng::seed_from_u64(85);
        for &(n1, n2) in &[(4usize, 5usize), (8, 3), (12, 12)] {
            let x = randv(&mut rng, n1 * n2);
            let mut y = vec![0.0f32; n1 * n2];
            f.apply2(n1, n2, &x, &mut y).unwrap();
            let lags = [(0i32, 0i32, 1.0f32), (2, 0, -0.4), (-3, 2, 0.25), (1, 3, 0.1)];
            for i2 in 0..n2 as i32 {
                for i1 in 0..n1 as i32 {
                    let mut want = 0.0f32;
                    for &(l1, l2, a) in lags.iter() {
                        let (k1, k2) = (i1 - l1, i2 - l2);
                        if 0 <= k1 && k1 < n1 as i32 && 0 <= k2 && k2 < n2 as i32 {
                            want += a * x[(k2 * n1 as i32 + k1) as usize];
                        }
                    }
                    let got = y[(i2 * n1 as i32 + i1) as usize];
                    assert!((got - want).abs() <= 1e-6,
                        "n1={} n2={} i1={} i2={}", n1, n2, i1, i2);
                }
            }
        }
    }

    #[test]
    fn helix_3d_round_trip_and_adjoint() {
        let f = MinPhaseFilter::new3(
            &[0, 1, 0, -1, 0],
            &[0, 0, 1, 1, 0],
            &[0, 0, 0, 0, 1],
            &[1.0, -0.3, -0.2, 0.1, -0.2],
        ).unwrap();
        let mut rng = SmallRng::seed_from_u64(95);
        let (n1, n2, n3) = (6usize, 5usize, 4usize);
        let x = randv(&mut rng, n1 * n2 * n3);
        let z = randv(&mut rng, n1 * n2 * n3);
        let mut ax = vec![0.0f32; x.len()];
        f.apply3(n1, n2, n3, &x, &mut ax).unwrap();
        let mut atz = vec![0.0f32; x.len()];
        f.apply_transpose3(n1, n2, n3, &z, &mut atz).unwrap();
        let lhs = sdot(&ax, &z);
        let rhs = sdot(&x, &atz);
        assert!((lhs - rhs).abs() <= 1e-5 * lhs.abs().max(1.0));
        let mut back = vec![0.0f32; x.len()];
        f.apply_inverse3(n1, n2, n3, &ax, &mut back).unwrap();
        for (got, want) in back.iter().zip(x.iter()) {
            assert!((got - want).abs() <= 1e-4);
        }
        // A'^-1 A' is also the identity
        let mut it = vec![0.0f32; x.len()];
        f.apply_inverse_transpose3(n1, n2, n3, &atz, &mut it).unwrap();
        for (got, want) in it.iter().zip(z.iter()) {
            assert!((got - want).abs() <= 1e-4);
        }
    }
}
