// integrals.rs
//! Gaussian integrals by the McMurchie-Davidson scheme: products of primitives are expanded in
//! Hermite Gaussians (coefficients E) whose Coulomb integrals follow from the auxiliary
//! functions R, built on the Boys function.
use std::f64::consts::PI;

use ndarray::{Array2, Array4};
use rayon::prelude::*;

use crate::basis::{BasisFunction, BasisSet};
use crate::molecule::Molecule;

/// Boys function F_n(T) = \int_0^1 t^{2n} exp(-T t^2) dt.
/// # Arguments
///     `n`: usize, order.
///     `t`: f64, argument, T >= 0.
pub fn boys(n: usize, t: f64) -> f64 {
    let twon1 = (2 * n + 1) as f64;
    if t < 1e-12 {
        return 1.0 / twon1;
    }
    if t > 30.0 {
        // F_n(T) ~ (2n - 1)!! / 2^{n+1} sqrt(pi / T^{2n+1}).
        let mut df = 1.0;
        let mut k = 1;
        while k < 2 * n {
            df *= k as f64;
            k += 2;
        }
        return df / 2f64.powi(n as i32 + 1) * (PI / t.powi(2 * n as i32 + 1)).sqrt();
    }
    // F_n(T) = exp(-T) \sum_k (2T)^k / ((2n+1)(2n+3)...(2n+2k+1)).
    let mut term = 1.0 / twon1;
    let mut sum = term;
    let mut k = 0;
    loop {
        k += 1;
        term *= 2.0 * t / (twon1 + 2.0 * k as f64);
        sum += term;
        if term < 1e-17 * sum {
            break;
        }
    }
    sum * (-t).exp()
}

/// Hermite expansion coefficient E^{ij}_t for one Cartesian direction.
/// # Arguments
///     `i`, `j`: i32, powers on the two centres.
///     `t`: i32, Hermite index.
///     `qx`: f64, A_x - B_x.
///     `a`, `b`: f64, exponents.
pub fn hermite_e(i: i32, j: i32, t: i32, qx: f64, a: f64, b: f64) -> f64 {
    let p = a + b;
    let q = a * b / p;
    if t < 0 || t > i + j || i < 0 || j < 0 {
        0.0
    } else if i == 0 && j == 0 && t == 0 {
        (-q * qx * qx).exp()
    } else if j == 0 {
        (1.0 / (2.0 * p)) * hermite_e(i - 1, j, t - 1, qx, a, b) - (q * qx / a) * hermite_e(i - 1, j, t, qx, a, b)
            + (t + 1) as f64 * hermite_e(i - 1, j, t + 1, qx, a, b)
    } else {
        (1.0 / (2.0 * p)) * hermite_e(i, j - 1, t - 1, qx, a, b)
            + (q * qx / b) * hermite_e(i, j - 1, t, qx, a, b)
            + (t + 1) as f64 * hermite_e(i, j - 1, t + 1, qx, a, b)
    }
}

/// E^{ij}_t for t = 0..=i+j in each direction.
fn hermite_e_table(l1: [i32; 3], l2: [i32; 3], ra: [f64; 3], rb: [f64; 3], a: f64, b: f64) -> [Vec<f64>; 3] {
    std::array::from_fn(|d| (0..=l1[d] + l2[d]).map(|t| hermite_e(l1[d], l2[d], t, ra[d] - rb[d], a, b)).collect())
}

/// Hermite Coulomb integrals R^0_{tuv} for t + u + v <= `l`, flattened with stride `l + 1`.
/// # Arguments
///     `l`: usize, total angular momentum.
///     `p`: f64, exponent of the Hermite Gaussian.
///     `pc`: [f64; 3], vector from the interacting centre to the Hermite centre.
pub fn hermite_r_table(l: usize, p: f64, pc: [f64; 3]) -> Vec<f64> {
    let dim = l + 1;
    let idx = |t: usize, u: usize, v: usize| (t * dim + u) * dim + v;
    let arg = p * (pc[0] * pc[0] + pc[1] * pc[1] + pc[2] * pc[2]);

    let mut next = vec![0.0; dim * dim * dim];
    let mut cur = vec![0.0; dim * dim * dim];
    // Walk down from R^l to R^0, each level built from the one above.
    for n in (0..=l).rev() {
        cur.iter_mut().for_each(|x| *x = 0.0);
        cur[0] = (-2.0 * p).powi(n as i32) * boys(n, arg);
        let top = l - n;
        for t in 0..=top {
            for u in 0..=(top - t) {
                for v in 0..=(top - t - u) {
                    if t + u + v == 0 {
                        continue;
                    }
                    cur[idx(t, u, v)] = if t > 0 {
                        let lower = if t > 1 { (t - 1) as f64 * next[idx(t - 2, u, v)] } else { 0.0 };
                        lower + pc[0] * next[idx(t - 1, u, v)]
                    } else if u > 0 {
                        let lower = if u > 1 { (u - 1) as f64 * next[idx(t, u - 2, v)] } else { 0.0 };
                        lower + pc[1] * next[idx(t, u - 1, v)]
                    } else {
                        let lower = if v > 1 { (v - 1) as f64 * next[idx(t, u, v - 2)] } else { 0.0 };
                        lower + pc[2] * next[idx(t, u, v - 1)]
                    };
                }
            }
        }
        std::mem::swap(&mut cur, &mut next);
    }
    next
}

fn lmn(f: &BasisFunction) -> [i32; 3] {
    f.lmn.map(|k| k as i32)
}

fn centre(a: f64, ra: [f64; 3], b: f64, rb: [f64; 3]) -> [f64; 3] {
    std::array::from_fn(|d| (a * ra[d] + b * rb[d]) / (a + b))
}

/// Overlap of two unnormalized primitive Cartesian Gaussians.
pub fn primitive_overlap(a: f64, l1: [i32; 3], ra: [f64; 3], b: f64, l2: [i32; 3], rb: [f64; 3]) -> f64 {
    let p = a + b;
    (0..3).map(|d| hermite_e(l1[d], l2[d], 0, ra[d] - rb[d], a, b)).product::<f64>() * (PI / p).powf(1.5)
}

/// Kinetic energy integral <a| -1/2 \nabla^2 |b> of two primitives.
pub fn primitive_kinetic(a: f64, l1: [i32; 3], ra: [f64; 3], b: f64, l2: [i32; 3], rb: [f64; 3]) -> f64 {
    let l = (l2[0] + l2[1] + l2[2]) as f64;
    let mut t0 = b * (2.0 * l + 3.0) * primitive_overlap(a, l1, ra, b, l2, rb);
    let mut up = 0.0;
    let mut down = 0.0;
    for d in 0..3 {
        let mut raised = l2;
        raised[d] += 2;
        up += primitive_overlap(a, l1, ra, b, raised, rb);
        if l2[d] > 1 {
            let mut lowered = l2;
            lowered[d] -= 2;
            down += (l2[d] * (l2[d] - 1)) as f64 * primitive_overlap(a, l1, ra, b, lowered, rb);
        }
    }
    t0 -= 2.0 * b * b * up;
    t0 - 0.5 * down
}

/// Attraction of a primitive pair to a unit positive charge at `rc` (sign not included).
pub fn primitive_nuclear(a: f64, l1: [i32; 3], ra: [f64; 3], b: f64, l2: [i32; 3], rb: [f64; 3], rc: [f64; 3]) -> f64 {
    let p = a + b;
    let rp = centre(a, ra, b, rb);
    let pc = [rp[0] - rc[0], rp[1] - rc[1], rp[2] - rc[2]];
    let l = (0..3).map(|d| (l1[d] + l2[d]) as usize).sum::<usize>();
    let dim = l + 1;
    let r = hermite_r_table(l, p, pc);
    let e = hermite_e_table(l1, l2, ra, rb, a, b);

    let mut sum = 0.0;
    for (t, ex) in e[0].iter().enumerate() {
        for (u, ey) in e[1].iter().enumerate() {
            for (v, ez) in e[2].iter().enumerate() {
                sum += ex * ey * ez * r[(t * dim + u) * dim + v];
            }
        }
    }
    2.0 * PI / p * sum
}

/// Electron repulsion integral (ab|cd) of four primitives.
#[allow(clippy::too_many_arguments)]
pub fn primitive_eri(
    a: f64, l1: [i32; 3], ra: [f64; 3],
    b: f64, l2: [i32; 3], rb: [f64; 3],
    c: f64, l3: [i32; 3], rc: [f64; 3],
    d: f64, l4: [i32; 3], rd: [f64; 3],
) -> f64 {
    let p = a + b;
    let q = c + d;
    let alpha = p * q / (p + q);
    let rp = centre(a, ra, b, rb);
    let rq = centre(c, rc, d, rd);
    let pq = [rp[0] - rq[0], rp[1] - rq[1], rp[2] - rq[2]];
    let l = (0..3).map(|k| (l1[k] + l2[k] + l3[k] + l4[k]) as usize).sum::<usize>();
    let dim = l + 1;
    let r = hermite_r_table(l, alpha, pq);
    let e_ab = hermite_e_table(l1, l2, ra, rb, a, b);
    let e_cd = hermite_e_table(l3, l4, rc, rd, c, d);

    let mut sum = 0.0;
    for (t, ex) in e_ab[0].iter().enumerate() {
        for (u, ey) in e_ab[1].iter().enumerate() {
            for (v, ez) in e_ab[2].iter().enumerate() {
                let bra = ex * ey * ez;
                if bra == 0.0 {
                    continue;
                }
                for (tau, fx) in e_cd[0].iter().enumerate() {
                    for (nu, fy) in e_cd[1].iter().enumerate() {
                        for (phi, fz) in e_cd[2].iter().enumerate() {
                            let sign = if (tau + nu + phi) % 2 == 0 { 1.0 } else { -1.0 };
                            sum += bra * fx * fy * fz * sign * r[((t + tau) * dim + u + nu) * dim + v + phi];
                        }
                    }
                }
            }
        }
    }
    2.0 * PI.powf(2.5) / (p * q * (p + q).sqrt()) * sum
}

/// Contract a one electron primitive integral over two basis functions.
fn contract_pair<F>(f1: &BasisFunction, f2: &BasisFunction, integral: F) -> f64
where
    F: Fn(f64, [i32; 3], [f64; 3], f64, [i32; 3], [f64; 3]) -> f64,
{
    let (l1, l2) = (lmn(f1), lmn(f2));
    let mut sum = 0.0;
    for p1 in &f1.primitives {
        for p2 in &f2.primitives {
            sum += p1.coefficient * p2.coefficient * integral(p1.exponent, l1, f1.center, p2.exponent, l2, f2.center);
        }
    }
    sum
}

/// Build a symmetric one electron matrix, rows in parallel.
fn one_electron_matrix<F>(basis: &BasisSet, element: F) -> Array2<f64>
where
    F: Fn(&BasisFunction, &BasisFunction) -> f64 + Sync,
{
    let n = basis.nao();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (0..=i).map(|j| element(&basis.functions[i], &basis.functions[j])).collect())
        .collect();
    let mut m = Array2::<f64>::zeros((n, n));
    for (i, row) in rows.iter().enumerate() {
        for (j, &x) in row.iter().enumerate() {
            m[(i, j)] = x;
            m[(j, i)] = x;
        }
    }
    m
}

/// AO overlap matrix S_{\mu\nu} = <\mu|\nu>.
pub fn overlap_matrix(basis: &BasisSet) -> Array2<f64> {
    one_electron_matrix(basis, |f1, f2| contract_pair(f1, f2, primitive_overlap))
}

/// AO kinetic energy matrix T_{\mu\nu} = <\mu| -1/2 \nabla^2 |\nu>.
pub fn kinetic_matrix(basis: &BasisSet) -> Array2<f64> {
    one_electron_matrix(basis, |f1, f2| contract_pair(f1, f2, primitive_kinetic))
}

/// AO nuclear attraction matrix V_{\mu\nu} = -\sum_C Z_C <\mu| 1/|r - R_C| |\nu>.
pub fn nuclear_matrix(basis: &BasisSet, mol: &Molecule) -> Array2<f64> {
    one_electron_matrix(basis, |f1, f2| {
        mol.atoms
            .iter()
            .map(|atom| {
                -(atom.z as f64)
                    * contract_pair(f1, f2, |a, l1, ra, b, l2, rb| {
                        primitive_nuclear(a, l1, ra, b, l2, rb, atom.position)
                    })
            })
            .sum()
    })
}

fn contracted_eri(f1: &BasisFunction, f2: &BasisFunction, f3: &BasisFunction, f4: &BasisFunction) -> f64 {
    let (l1, l2, l3, l4) = (lmn(f1), lmn(f2), lmn(f3), lmn(f4));
    let mut sum = 0.0;
    for p1 in &f1.primitives {
        for p2 in &f2.primitives {
            for p3 in &f3.primitives {
                for p4 in &f4.primitives {
                    let c = p1.coefficient * p2.coefficient * p3.coefficient * p4.coefficient;
                    sum += c * primitive_eri(
                        p1.exponent, l1, f1.center,
                        p2.exponent, l2, f2.center,
                        p3.exponent, l3, f3.center,
                        p4.exponent, l4, f4.center,
                    );
                }
            }
        }
    }
    sum
}

/// Electron repulsion integrals (pq|rs) in chemists' notation. Only the unique quartets under the
/// 8-fold permutational symmetry are evaluated.
pub fn eri_tensor(basis: &BasisSet) -> Array4<f64> {
    let n = basis.nao();
    let pair = |i: usize, j: usize| i * (i + 1) / 2 + j;
    let mut quartets = Vec::new();
    for p in 0..n {
        for q in 0..=p {
            for r in 0..n {
                for s in 0..=r {
                    if pair(p, q) >= pair(r, s) {
                        quartets.push((p, q, r, s));
                    }
                }
            }
        }
    }

    let f = &basis.functions;
    let values: Vec<f64> =
        quartets.par_iter().map(|&(p, q, r, s)| contracted_eri(&f[p], &f[q], &f[r], &f[s])).collect();

    let mut eri = Array4::<f64>::zeros((n, n, n, n));
    for (&(p, q, r, s), &x) in quartets.iter().zip(&values) {
        let images = [
            (p, q, r, s),
            (q, p, r, s),
            (p, q, s, r),
            (q, p, s, r),
            (r, s, p, q),
            (s, r, p, q),
            (r, s, q, p),
            (s, r, q, p),
        ];
        for (a, b, c, d) in images {
            eri[(a, b, c, d)] = x;
        }
    }
    eri
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::sto3g;
    use crate::molecule::Atom;
    use approx::assert_abs_diff_eq;

    fn h2_at_1_4() -> BasisSet {
        let mol = Molecule::new(vec![Atom { z: 1, position: [0.0; 3] }, Atom { z: 1, position: [0.0, 0.0, 1.4] }]);
        sto3g(&mol).unwrap()
    }

    #[test]
    fn boys_limits() {
        assert_abs_diff_eq!(boys(0, 0.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(boys(2, 0.0), 0.2, epsilon = 1e-15);
        // F_0(1) = sqrt(pi) erf(1) / 2.
        assert_abs_diff_eq!(boys(0, 1.0), 0.746824132812427, epsilon = 1e-12);
        // Series and asymptotic branches agree at the switch.
        assert_abs_diff_eq!(boys(0, 29.999), 0.5 * (PI / 29.999f64).sqrt(), epsilon = 1e-10);
        assert_abs_diff_eq!(boys(1, 29.999), boys(1, 30.001), epsilon = 1e-6);
    }

    #[test]
    fn water_overlap_diagonal_is_unit() {
        let basis = sto3g(&Molecule::water()).unwrap();
        let s = overlap_matrix(&basis);
        for i in 0..basis.nao() {
            assert_abs_diff_eq!(s[(i, i)], 1.0, epsilon = 1e-10);
        }
        // 2px on oxygen is orthogonal to the oxygen s functions.
        assert_abs_diff_eq!(s[(0, 2)], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(s[(1, 2)], 0.0, epsilon = 1e-14);
    }

    // Minimal basis H2 at 1.4 bohr, tabulated by Szabo and Ostlund.
    #[test]
    fn h2_one_electron_integrals() {
        let basis = h2_at_1_4();
        let s = overlap_matrix(&basis);
        let t = kinetic_matrix(&basis);
        assert_abs_diff_eq!(s[(0, 1)], 0.6593, epsilon = 1e-4);
        assert_abs_diff_eq!(t[(0, 0)], 0.7600, epsilon = 1e-4);
        assert_abs_diff_eq!(t[(0, 1)], 0.2365, epsilon = 1e-4);

        let mol = Molecule::new(vec![Atom { z: 1, position: [0.0; 3] }, Atom { z: 1, position: [0.0, 0.0, 1.4] }]);
        let v = nuclear_matrix(&basis, &mol);
        assert_abs_diff_eq!(v[(0, 0)], -1.2266 - 0.6538, epsilon = 2e-4);
    }

    #[test]
    fn h2_two_electron_integrals() {
        let eri = eri_tensor(&h2_at_1_4());
        assert_abs_diff_eq!(eri[(0, 0, 0, 0)], 0.7746, epsilon = 1e-4);
        assert_abs_diff_eq!(eri[(0, 0, 1, 1)], 0.5697, epsilon = 1e-4);
        assert_abs_diff_eq!(eri[(1, 0, 1, 0)], 0.2970, epsilon = 1e-4);
        assert_abs_diff_eq!(eri[(1, 0, 0, 0)], 0.4441, epsilon = 1e-4);
        assert_eq!(eri[(1, 0, 0, 0)], eri[(0, 0, 0, 1)]);
        assert_eq!(eri[(0, 0, 1, 1)], eri[(1, 1, 0, 0)]);
    }
}
