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

//! Valid lengths for the prime-factor transform

use crate::error::DspError;

/// The largest valid transform length (5*7*9*11*13*16).
pub const NFFT_MAX: usize = 720720;

/// All lengths that factor into mutually prime members of
/// {2,3,4,5,7,8,9,11,13,16} with each factor used at most once, in
/// increasing order.
pub(crate) const NTABLE: [usize; 240] = [
    1, 2, 3, 4, 5, 6, 7, 8,
    9, 10, 11, 12, 13, 14, 15, 16,
    18, 20, 21, 22, 24, 26, 28, 30,
    33, 35, 36, 39, 40, 42, 44, 45,
    48, 52, 55, 56, 60, 63, 65, 66,
    70, 72, 77, 78, 80, 84, 88, 90,
    91, 99, 104, 105, 110, 112, 117, 120,
    126, 130, 132, 140, 143, 144, 154, 156,
    165, 168, 176, 180, 182, 195, 198, 208,
    210, 220, 231, 234, 240, 252, 260, 264,
    273, 280, 286, 308, 312, 315, 330, 336,
    360, 364, 385, 390, 396, 420, 429, 440,
    455, 462, 468, 495, 504, 520, 528, 546,
    560, 572, 585, 616, 624, 630, 660, 693,
    715, 720, 728, 770, 780, 792, 819, 840,
    858, 880, 910, 924, 936, 990, 1001, 1008,
    1040, 1092, 1144, 1155, 1170, 1232, 1260, 1287,
    1320, 1365, 1386, 1430, 1456, 1540, 1560, 1584,
    1638, 1680, 1716, 1820, 1848, 1872, 1980, 2002,
    2145, 2184, 2288, 2310, 2340, 2520, 2574, 2640,
    2730, 2772, 2860, 3003, 3080, 3120, 3276, 3432,
    3465, 3640, 3696, 3960, 4004, 4095, 4290, 4368,
    4620, 4680, 5005, 5040, 5148, 5460, 5544, 5720,
    6006, 6160, 6435, 6552, 6864, 6930, 7280, 7920,
    8008, 8190, 8580, 9009, 9240, 9360, 10010, 10296,
    10920, 11088, 11440, 12012, 12870, 13104, 13860, 15015,
    16016, 16380, 17160, 18018, 18480, 20020, 20592, 21840,
    24024, 25740, 27720, 30030, 32760, 34320, 36036, 40040,
    45045, 48048, 51480, 55440, 60060, 65520, 72072, 80080,
    90090, 102960, 120120, 144144, 180180, 240240, 360360, 720720,
];

/// Returns the smallest valid transform length not less than `n`, found by
/// lower-bound search in the sorted length table.
pub fn nfft_small(n: usize) -> Result<usize, DspError> {
    if n > NFFT_MAX {
        return Err(DspError::InvalidLength(n));
    }
    let i = match NTABLE.binary_search(&n) {
        Ok(i) => i,
        Err(i) => i,
    };
    Ok(NTABLE[i])
}

/// Returns the smallest valid transform length not less than `n` that is
/// also fast. Currently identical to [nfft_small]; kept as a separate entry
/// point so callers can express intent.
pub fn nfft_fast(n: usize) -> Result<usize, DspError> {
    nfft_small(n)
}

/// True if `n` is a valid transform length.
pub(crate) fn is_valid(n: usize) -> bool {
    NTABLE.binary_search(&n).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_factors() {
        let mut prev = 0;
        for &n in NTABLE.iter() {
            assert!(n > prev);
            prev = n;
            // Every entry must be divisible down to 1 by mutually prime
            // factors drawn once each from the factor set.
            let mut nleft = n;
            for &f in &[16usize, 13, 11, 9, 8, 7, 5, 4, 3, 2] {
                if nleft % f == 0 {
                    nleft /= f;
                }
            }
            assert_eq!(nleft, 1, "length {} does not factor", n);
        }
        assert_eq!(NTABLE[NTABLE.len() - 1], NFFT_MAX);
    }

    #[test]
    fn small_is_lower_bound() {
        assert_eq!(nfft_small(1).unwrap(), 1);
        assert_eq!(nfft_small(17).unwrap(), 18);
        assert_eq!(nfft_small(100).unwrap(), 104);
        assert_eq!(nfft_small(720720).unwrap(), 720720);
        assert_eq!(nfft_small(720719).unwrap(), 720720);
        assert!(nfft_small(720721).is_err());
        // Exhaustive: result is valid, >= n, and no valid length lies between.
        for n in 1..=1000 {
            let m = nfft_small(n).unwrap();
            assert!(m >= n && is_valid(m));
            assert!(!(n..m).any(is_valid));
        }
    }

    #[test]
    fn fast_equals_small() {
        for n in (1..720720).step_by(7919) {
            assert_eq!(nfft_fast(n).unwrap(), nfft_small(n).unwrap());
        }
    }
}
