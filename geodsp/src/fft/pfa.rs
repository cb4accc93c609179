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

//! Self-sorting prime-factor complex-to-complex transform
//!
//! Computes `Z_k = sum_n z_n * exp(sign*2*pi*i*n*k/N)` in place on packed
//! complex data (interleaved re/im pairs of f32). N must factor into
//! mutually prime members of {2,3,4,5,7,8,9,11,13,16}, each used at most
//! once. One pass of Temperton butterflies per factor, largest factor first;
//! output emerges in natural order with no bit-reversal step.
//!
//! Within the stage for factor f, m = N/f elements are processed per
//! butterfly index. The rotation index mu is the smallest k with
//! (k*m) mod f = 1 (reflected to f-mu for inverse-sign transforms); the
//! initial butterfly pointers are spaced mm = mu*m complex elements apart
//! (wrapped modulo N), and after each butterfly the pointers shift by one
//! element with the head taking the old tail + 1. This is what makes the
//! stage self-sorting.
//!
//! The butterflies themselves are monomorphized straight-line programs over
//! the hard-coded rotation constants below; factor-f cosines and sines are
//! selected from half tables by reflection of the index (k*q*mu) mod f.

// Butterfly rotation constants: cosines and sines of multiples of 2*pi/f
// for the supported factors.
const P120: f32 = 0.120536680;
const P142: f32 = 0.142314838;
const P173: f32 = 0.173648178;
const P222: f32 = 0.222520934;
const P239: f32 = 0.239315664;
const P281: f32 = 0.281732557;
const P342: f32 = 0.342020143;
const P354: f32 = 0.354604887;
const P382: f32 = 0.382683432;
const P415: f32 = 0.415415013;
const P433: f32 = 0.433883739;
const P464: f32 = 0.464723172;
const P540: f32 = 0.540640817;
const P559: f32 = 0.559016994;
const P568: f32 = 0.568064747;
const P587: f32 = 0.587785252;
const P623: f32 = 0.623489802;
const P642: f32 = 0.642787610;
const P654: f32 = 0.654860734;
const P663: f32 = 0.663122658;
const P707: f32 = 0.707106781;
const P748: f32 = 0.748510748;
const P755: f32 = 0.755749574;
const P766: f32 = 0.766044443;
const P781: f32 = 0.781831482;
const P822: f32 = 0.822983866;
const P841: f32 = 0.841253533;
const P866: f32 = 0.866025404;
const P885: f32 = 0.885456026;
const P900: f32 = 0.900968868;
const P909: f32 = 0.909631995;
const P923: f32 = 0.923879533;
const P935: f32 = 0.935016243;
const P939: f32 = 0.939692621;
const P951: f32 = 0.951056516;
const P959: f32 = 0.959492974;
const P970: f32 = 0.970941817;
const P974: f32 = 0.974927912;
const P984: f32 = 0.984807753;
const P989: f32 = 0.989821442;
const P992: f32 = 0.992708874;
const PONE: f32 = 1.000000000;

// Half tables of cos(2*pi*j/f) and sin(2*pi*j/f) for j = 0..=f/2.
const C3: [f32; 2] = [PONE, -0.5];
const S3: [f32; 2] = [0.0, P866];
const C4: [f32; 3] = [PONE, 0.0, -PONE];
const S4: [f32; 3] = [0.0, PONE, 0.0];
const C5: [f32; 3] = [PONE, P559 - 0.25, -(P559 + 0.25)];
const S5: [f32; 3] = [0.0, P951, P587];
const C7: [f32; 4] = [PONE, P623, -P222, -P900];
const S7: [f32; 4] = [0.0, P781, P974, P433];
const C8: [f32; 5] = [PONE, P707, 0.0, -P707, -PONE];
const S8: [f32; 5] = [0.0, P707, PONE, P707, 0.0];
const C9: [f32; 5] = [PONE, P766, P173, -0.5, -P939];
const S9: [f32; 5] = [0.0, P642, P984, P866, P342];
const C11: [f32; 6] = [PONE, P841, P415, -P142, -P654, -P959];
const S11: [f32; 6] = [0.0, P540, P909, P989, P755, P281];
const C13: [f32; 7] = [PONE, P885, P568, P120, -P354, -P748, -P970];
const S13: [f32; 7] = [0.0, P464, P822, P992, P935, P663, P239];
const C16: [f32; 9] = [PONE, P923, P707, P382, 0.0, -P382, -P707, -P923, -PONE];
const S16: [f32; 9] = [0.0, P382, P707, P923, PONE, P923, P707, P382, 0.0];

/// Factors in the order their stages are applied.
const KFAX: [usize; 10] = [16, 13, 11, 9, 8, 7, 5, 4, 3, 2];

/// In-place transform of n packed complex elements (z has 2*n floats).
pub(crate) fn transform(sign: i32, n: usize, z: &mut [f32]) {
    stages(sign, n, 1, z);
}

/// Multi-transform variant: applies the length-n transform along dimension 2
/// of a flat `[n][2*n1]` array, processing all n1 packed columns of each row
/// simultaneously.
pub(crate) fn transform2a(sign: i32, n1: usize, n: usize, z: &mut [f32]) {
    stages(sign, n, n1, z);
}

/// Stage driver shared by the 1D and strided transforms. Butterfly indices
/// count complex elements in the 1D case and rows of n1 packed elements in
/// the strided case.
fn stages(sign: i32, n: usize, n1: usize, z: &mut [f32]) {
    debug_assert!(z.len() >= 2 * n * n1);
    let mut nleft = n;
    for &ifac in KFAX.iter() {
        if nleft % ifac != 0 {
            continue;
        }
        nleft /= ifac;
        let m = n / ifac;
        // Rotation index mu and pointer stride mm. The remaining factors are
        // mutually prime to ifac, so m is invertible modulo ifac and the
        // search always succeeds.
        let mut mu = 0;
        let mut mm = 0;
        for kfac in 1..=ifac {
            if (kfac * m) % ifac == 1 {
                mu = kfac;
                mm = kfac * m;
                break;
            }
        }
        if sign < 0 {
            mu = ifac - mu;
        }
        match ifac {
            16 => radix_even::<16, 7>(z, n1, &C16, &S16, mu, m, n, mm),
            13 => radix_odd::<13, 6>(z, n1, &C13, &S13, mu, m, n, mm),
            11 => radix_odd::<11, 5>(z, n1, &C11, &S11, mu, m, n, mm),
            9 => radix_odd::<9, 4>(z, n1, &C9, &S9, mu, m, n, mm),
            8 => radix_even::<8, 3>(z, n1, &C8, &S8, mu, m, n, mm),
            7 => radix_odd::<7, 3>(z, n1, &C7, &S7, mu, m, n, mm),
            5 => radix_odd::<5, 2>(z, n1, &C5, &S5, mu, m, n, mm),
            4 => radix_even::<4, 1>(z, n1, &C4, &S4, mu, m, n, mm),
            3 => radix_odd::<3, 1>(z, n1, &C3, &S3, mu, m, n, mm),
            2 => radix_even::<2, 0>(z, n1, &[PONE, -PONE], &[0.0, 0.0], mu, m, n, mm),
            _ => unreachable!(),
        }
    }
}

/// cos and sin of 2*pi*j/f, selected from the half tables by reflection.
#[inline(always)]
fn wcoeff(cs: &[f32], sn: &[f32], f: usize, j: usize) -> (f32, f32) {
    let j = j % f;
    if j <= f / 2 {
        (cs[j], sn[j])
    } else {
        (cs[f - j], -sn[f - j])
    }
}

/// Initial butterfly pointers: spaced jinc apart, wrapped modulo jmax.
#[inline(always)]
fn init_indices<const F: usize>(jinc: usize, jmax: usize) -> [usize; F] {
    let mut j = [0usize; F];
    for k in 1..F {
        j[k] = j[k - 1] + jinc;
        if j[k] >= jmax {
            j[k] -= jmax;
        }
    }
    j
}

/// Self-sorting pointer shift: every pointer advances by one element with
/// the head taking the old tail + 1.
#[inline(always)]
fn rotate_indices<const F: usize>(j: &mut [usize; F]) {
    let jt = j[F - 1] + 1;
    for k in (1..F).rev() {
        j[k] = j[k - 1] + 1;
    }
    j[0] = jt;
}

/// Butterfly for odd factors F = 2*H+1 (3, 5, 7, 9, 11, 13).
///
/// Uses the conjugate symmetry w^(F-k) = conj(w^k) to fold the F-point DFT
/// into H pair sums a_k = z_k + z_{F-k} and differences b_k = z_k - z_{F-k}:
///
///   Z_q     = z_0 + sum_k c_qk*a_k + i*sum_k s_qk*b_k
///   Z_{F-q} = z_0 + sum_k c_qk*a_k - i*sum_k s_qk*b_k
///
/// with c_qk = cos(2*pi*k*q*mu/F) and s_qk = sin(2*pi*k*q*mu/F).
fn radix_odd<const F: usize, const H: usize>(
    z: &mut [f32],
    n1: usize,
    cs: &[f32],
    sn: &[f32],
    mu: usize,
    m: usize,
    jmax: usize,
    mm: usize,
) {
    let mut c = [[0.0f32; H]; H];
    let mut s = [[0.0f32; H]; H];
    for q in 0..H {
        for k in 0..H {
            let (cc, ss) = wcoeff(cs, sn, F, (q + 1) * (k + 1) * mu);
            c[q][k] = cc;
            s[q][k] = ss;
        }
    }
    let w = 2 * n1;
    let mut j = init_indices::<F>(mm, jmax);
    for _ in 0..m {
        for i1 in 0..n1 {
            let o = 2 * i1;
            let j0 = j[0] * w + o;
            let z0r = z[j0];
            let z0i = z[j0 + 1];
            let mut ar = [0.0f32; H];
            let mut ai = [0.0f32; H];
            let mut br = [0.0f32; H];
            let mut bi = [0.0f32; H];
            for k in 0..H {
                let jk = j[k + 1] * w + o;
                let jf = j[F - 1 - k] * w + o;
                ar[k] = z[jk] + z[jf];
                ai[k] = z[jk + 1] + z[jf + 1];
                br[k] = z[jk] - z[jf];
                bi[k] = z[jk + 1] - z[jf + 1];
            }
            let mut t0r = z0r;
            let mut t0i = z0i;
            for k in 0..H {
                t0r += ar[k];
                t0i += ai[k];
            }
            z[j0] = t0r;
            z[j0 + 1] = t0i;
            for q in 0..H {
                let mut yr = z0r;
                let mut yi = z0i;
                let mut vr = 0.0f32;
                let mut vi = 0.0f32;
                for k in 0..H {
                    yr += c[q][k] * ar[k];
                    yi += c[q][k] * ai[k];
                    vr += s[q][k] * br[k];
                    vi += s[q][k] * bi[k];
                }
                let jq = j[q + 1] * w + o;
                let jp = j[F - 1 - q] * w + o;
                z[jq] = yr - vi;
                z[jq + 1] = yi + vr;
                z[jp] = yr + vi;
                z[jp + 1] = yi - vr;
            }
        }
        rotate_indices::<F>(&mut j);
    }
}

/// Butterfly for even factors F = 2*(H+1) (2, 4, 8, 16).
///
/// Same folding as the odd case, with the middle element z_{F/2}
/// contributing (-1)^q to Z_q (mu is odd for every even factor) and the
/// half-spectrum output Z_{F/2} built from alternating pair sums.
fn radix_even<const F: usize, const H: usize>(
    z: &mut [f32],
    n1: usize,
    cs: &[f32],
    sn: &[f32],
    mu: usize,
    m: usize,
    jmax: usize,
    mm: usize,
) {
    let mut c = [[0.0f32; H]; H];
    let mut s = [[0.0f32; H]; H];
    for q in 0..H {
        for k in 0..H {
            let (cc, ss) = wcoeff(cs, sn, F, (q + 1) * (k + 1) * mu);
            c[q][k] = cc;
            s[q][k] = ss;
        }
    }
    let half = F / 2;
    let sh = if half % 2 == 0 { 1.0f32 } else { -1.0f32 };
    let w = 2 * n1;
    let mut j = init_indices::<F>(mm, jmax);
    for _ in 0..m {
        for i1 in 0..n1 {
            let o = 2 * i1;
            let j0 = j[0] * w + o;
            let jh = j[half] * w + o;
            let z0r = z[j0];
            let z0i = z[j0 + 1];
            let zhr = z[jh];
            let zhi = z[jh + 1];
            let mut ar = [0.0f32; H];
            let mut ai = [0.0f32; H];
            let mut br = [0.0f32; H];
            let mut bi = [0.0f32; H];
            for k in 0..H {
                let jk = j[k + 1] * w + o;
                let jf = j[F - 1 - k] * w + o;
                ar[k] = z[jk] + z[jf];
                ai[k] = z[jk + 1] + z[jf + 1];
                br[k] = z[jk] - z[jf];
                bi[k] = z[jk + 1] - z[jf + 1];
            }
            let mut t0r = z0r + zhr;
            let mut t0i = z0i + zhi;
            let mut thr = z0r + sh * zhr;
            let mut thi = z0i + sh * zhi;
            for k in 0..H {
                t0r += ar[k];
                t0i += ai[k];
                if (k + 1) % 2 == 1 {
                    thr -= ar[k];
                    thi -= ai[k];
                } else {
                    thr += ar[k];
                    thi += ai[k];
                }
            }
            for q in 0..H {
                let mq = if (q + 1) % 2 == 1 { -1.0f32 } else { 1.0f32 };
                let mut yr = z0r + mq * zhr;
                let mut yi = z0i + mq * zhi;
                let mut vr = 0.0f32;
                let mut vi = 0.0f32;
                for k in 0..H {
                    yr += c[q][k] * ar[k];
                    yi += c[q][k] * ai[k];
                    vr += s[q][k] * br[k];
                    vi += s[q][k] * bi[k];
                }
                let jq = j[q + 1] * w + o;
                let jp = j[F - 1 - q] * w + o;
                z[jq] = yr - vi;
                z[jq + 1] = yi + vr;
                z[jp] = yr + vi;
                z[jp + 1] = yi - vr;
            }
            z[j0] = t0r;
            z[j0 + 1] = t0i;
            z[jh] = thr;
            z[jh + 1] = thi;
        }
        rotate_indices::<F>(&mut j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::nfft::NTABLE;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    /// Naive O(n^2) DFT in double precision.
    fn dft_naive(x: &[f32], sign: i32, y: &mut Vec<f32>) {
        let n = x.len() / 2;
        y.clear();
        for k in 0..n {
            let mut re = 0.0f64;
            let mut im = 0.0f64;
            for t in 0..n {
                let theta = f64::from(sign) * 2.0 * PI * (t as f64) * (k as f64) / (n as f64);
                let (sn, cs) = theta.sin_cos();
                let (xr, xi) = (f64::from(x[2 * t]), f64::from(x[2 * t + 1]));
                re += xr * cs - xi * sn;
                im += xr * sn + xi * cs;
            }
            y.push(re as f32);
            y.push(im as f32);
        }
    }

    fn max_abs(z: &[f32]) -> f32 {
        z.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }

    #[test]
    fn matches_naive_dft_for_all_small_lengths() {
        let mut rng = SmallRng::seed_from_u64(1234);
        let mut y = Vec::new();
        for &n in NTABLE.iter().filter(|&&n| n <= 208) {
            let x: Vec<f32> = (0..2 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
            for &sign in &[1, -1] {
                let mut z = x.clone();
                transform(sign, n, &mut z);
                dft_naive(&x, sign, &mut y);
                let scale = max_abs(&y).max(1.0);
                for (got, want) in z.iter().zip(y.iter()) {
                    assert!(
                        (got - want).abs() <= 2e-4 * scale,
                        "n={} sign={}: {} vs {}",
                        n,
                        sign,
                        got,
                        want
                    );
                }
            }
        }
    }

    #[test]
    fn impulse_response_is_complex_exponential() {
        // Covers every factor at least once, including large mixed products.
        for &n in &[12usize, 16, 720, 1008, 5005, 45045] {
            let p = 37 % n;
            let mut z = vec![0.0f32; 2 * n];
            z[2 * p] = 1.0;
            transform(1, n, &mut z);
            for k in (0..n).step_by(1 + n / 997) {
                let theta = 2.0 * PI * (p as f64) * (k as f64) / (n as f64);
                assert!((f64::from(z[2 * k]) - theta.cos()).abs() < 1e-5);
                assert!((f64::from(z[2 * k + 1]) - theta.sin()).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn forward_inverse_round_trip() {
        let mut rng = SmallRng::seed_from_u64(77);
        for &n in &[60usize, 520, 2520, 45045] {
            let x: Vec<f32> = (0..2 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut z = x.clone();
            transform(1, n, &mut z);
            transform(-1, n, &mut z);
            let tol = 10.0 * f32::EPSILON * (n as f32).log2();
            for (got, want) in z.iter().zip(x.iter()) {
                assert!((got / n as f32 - want).abs() <= tol, "n={}", n);
            }
        }
    }

    #[test]
    fn strided_matches_single_transforms() {
        let mut rng = SmallRng::seed_from_u64(5);
        let (n1, n) = (3usize, 30usize);
        let x: Vec<f32> = (0..2 * n1 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut z = x.clone();
        transform2a(1, n1, n, &mut z);
        // Reference: gather each column, transform, compare.
        for i1 in 0..n1 {
            let mut col = vec![0.0f32; 2 * n];
            for i2 in 0..n {
                col[2 * i2] = x[i2 * 2 * n1 + 2 * i1];
                col[2 * i2 + 1] = x[i2 * 2 * n1 + 2 * i1 + 1];
            }
            transform(1, n, &mut col);
            for i2 in 0..n {
                assert!((z[i2 * 2 * n1 + 2 * i1] - col[2 * i2]).abs() <= 1e-5);
                assert!((z[i2 * 2 * n1 + 2 * i1 + 1] - col[2 * i2 + 1]).abs() <= 1e-5);
            }
        }
    }
}
