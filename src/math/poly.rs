//! Polynomials over R_q = Z_q[X]/(X^n + 1) in RNS form.
//!
//! Coefficients are stored as residue rows, one per CRT modulus, always in
//! the coefficient domain; multiplication transforms through the NTT
//! internally. A single integer polynomial is represented consistently
//! across rows (sampling draws one integer per coefficient and reduces it
//! per modulus).

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::crt::compose_2;
use super::gaussian::GaussianSampler;
use super::modular::ModQ;
use super::ntt::NttTable;

/// Polynomial in R_q with per-modulus residue rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RnsPoly {
    res: Vec<Vec<u64>>,
    moduli: Vec<u64>,
}

impl RnsPoly {
    /// Zero polynomial of the given degree over the given basis.
    pub fn zero(degree: usize, moduli: &[u64]) -> Self {
        Self {
            res: moduli.iter().map(|_| vec![0u64; degree]).collect(),
            moduli: moduli.to_vec(),
        }
    }

    /// Build from signed integer coefficients, reduced per modulus.
    pub fn from_signed(coeffs: &[i64], moduli: &[u64]) -> Self {
        let res = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| ModQ::from_signed(c, q)).collect())
            .collect();
        Self {
            res,
            moduli: moduli.to_vec(),
        }
    }

    /// Build from unsigned coefficients already below every modulus.
    pub fn from_small_unsigned(coeffs: &[u64], moduli: &[u64]) -> Self {
        let res = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| c % q).collect())
            .collect();
        Self {
            res,
            moduli: moduli.to_vec(),
        }
    }

    /// Assemble from per-modulus residue rows.
    pub fn from_residue_rows(res: Vec<Vec<u64>>, moduli: &[u64]) -> Self {
        debug_assert_eq!(res.len(), moduli.len());
        debug_assert!(res.windows(2).all(|w| w[0].len() == w[1].len()));
        Self {
            res,
            moduli: moduli.to_vec(),
        }
    }

    /// Uniformly random polynomial mod q = Π moduli (at most two primes).
    pub fn uniform<R: Rng>(degree: usize, moduli: &[u64], rng: &mut R) -> Self {
        debug_assert!(moduli.len() <= 2, "uniform sampling is for the main basis");
        let q: u128 = moduli.iter().fold(1u128, |acc, &m| acc * m as u128);

        let mut poly = Self::zero(degree, moduli);
        for k in 0..degree {
            let x = rng.gen_range(0..q);
            for (row, &m) in poly.res.iter_mut().zip(moduli.iter()) {
                row[k] = (x % m as u128) as u64;
            }
        }
        poly
    }

    /// Uniform ternary polynomial with coefficients in {-1, 0, 1}.
    pub fn ternary<R: Rng>(degree: usize, moduli: &[u64], rng: &mut R) -> Self {
        let coeffs: Vec<i64> = (0..degree).map(|_| rng.gen_range(-1i64..=1)).collect();
        Self::from_signed(&coeffs, moduli)
    }

    /// Polynomial with discrete Gaussian coefficients.
    pub fn gaussian(degree: usize, moduli: &[u64], sampler: &mut GaussianSampler) -> Self {
        let coeffs = sampler.sample_vec(degree);
        Self::from_signed(&coeffs, moduli)
    }

    /// Ring degree.
    pub fn degree(&self) -> usize {
        self.res[0].len()
    }

    /// CRT moduli of this polynomial.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Residue row for modulus index `i`.
    pub fn residues(&self, i: usize) -> &[u64] {
        &self.res[i]
    }

    /// Keep only the first `count` residue rows (a modulus-basis prefix).
    pub fn restrict(&self, count: usize) -> Self {
        debug_assert!(count >= 1 && count <= self.moduli.len());
        Self {
            res: self.res[..count].to_vec(),
            moduli: self.moduli[..count].to_vec(),
        }
    }

    /// Lift coefficients to integers in [0, q) for a one- or two-prime basis.
    pub fn lift_u128(&self, q0_inv_mod_q1: u64) -> Vec<u128> {
        match self.moduli.len() {
            1 => self.res[0].iter().map(|&r| r as u128).collect(),
            2 => {
                let (q0, q1) = (self.moduli[0], self.moduli[1]);
                self.res[0]
                    .iter()
                    .zip(self.res[1].iter())
                    .map(|(&a0, &a1)| compose_2(a0, a1, q0, q1, q0_inv_mod_q1))
                    .collect()
            }
            _ => unreachable!("lift_u128 is only defined for the main basis"),
        }
    }

    /// Pointwise addition.
    pub fn add(&self, other: &Self) -> Self {
        debug_assert_eq!(self.moduli, other.moduli);
        let res = self
            .res
            .iter()
            .zip(other.res.iter())
            .zip(self.moduli.iter())
            .map(|((a, b), &q)| {
                a.iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| ModQ::add(x, y, q))
                    .collect()
            })
            .collect();
        Self {
            res,
            moduli: self.moduli.clone(),
        }
    }

    /// In-place pointwise addition.
    pub fn add_assign(&mut self, other: &Self) {
        debug_assert_eq!(self.moduli, other.moduli);
        for ((a, b), &q) in self
            .res
            .iter_mut()
            .zip(other.res.iter())
            .zip(self.moduli.iter())
        {
            for (x, &y) in a.iter_mut().zip(b.iter()) {
                *x = ModQ::add(*x, y, q);
            }
        }
    }

    /// Pointwise subtraction.
    pub fn sub(&self, other: &Self) -> Self {
        debug_assert_eq!(self.moduli, other.moduli);
        let res = self
            .res
            .iter()
            .zip(other.res.iter())
            .zip(self.moduli.iter())
            .map(|((a, b), &q)| {
                a.iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| ModQ::sub(x, y, q))
                    .collect()
            })
            .collect();
        Self {
            res,
            moduli: self.moduli.clone(),
        }
    }

    /// Negation.
    pub fn negate(&self) -> Self {
        let res = self
            .res
            .iter()
            .zip(self.moduli.iter())
            .map(|(a, &q)| a.iter().map(|&x| ModQ::negate(x, q)).collect())
            .collect();
        Self {
            res,
            moduli: self.moduli.clone(),
        }
    }

    /// Multiply by a per-modulus scalar (one residue of an integer scalar).
    pub fn scalar_mul(&self, scalars: &[u64]) -> Self {
        debug_assert_eq!(scalars.len(), self.moduli.len());
        let res = self
            .res
            .iter()
            .zip(self.moduli.iter())
            .zip(scalars.iter())
            .map(|((a, &q), &s)| a.iter().map(|&x| ModQ::mul(x, s, q)).collect())
            .collect();
        Self {
            res,
            moduli: self.moduli.clone(),
        }
    }

    /// Negacyclic product via the NTT tables of this polynomial's basis.
    pub fn mul(&self, other: &Self, tables: &[NttTable]) -> Self {
        debug_assert_eq!(self.moduli, other.moduli);
        debug_assert_eq!(tables.len(), self.moduli.len());

        let res = self
            .res
            .iter()
            .zip(other.res.iter())
            .zip(tables.iter())
            .map(|((a, b), table)| {
                let q = table.modulus();
                let mut fa = a.clone();
                let mut fb = b.clone();
                table.forward(&mut fa);
                table.forward(&mut fb);
                for (x, &y) in fa.iter_mut().zip(fb.iter()) {
                    *x = ModQ::mul(*x, y, q);
                }
                table.inverse(&mut fa);
                fa
            })
            .collect();
        Self {
            res,
            moduli: self.moduli.clone(),
        }
    }

    /// Apply the Galois automorphism X -> X^g.
    ///
    /// X^i maps to X^(g·i mod 2n), negated whenever the exponent lands in
    /// the upper half (X^n = -1).
    pub fn automorphism(&self, g: usize) -> Self {
        let n = self.degree();
        let two_n = 2 * n;
        debug_assert!(g % 2 == 1 && g < two_n, "invalid Galois element");

        let mut out = Self::zero(n, &self.moduli);
        for i in 0..n {
            let new_idx = (g * i) % two_n;
            let (target, negate) = if new_idx < n {
                (new_idx, false)
            } else {
                (new_idx - n, true)
            };
            for (row_out, (row_in, &q)) in out
                .res
                .iter_mut()
                .zip(self.res.iter().zip(self.moduli.iter()))
            {
                row_out[target] = if negate {
                    ModQ::negate(row_in[i], q)
                } else {
                    row_in[i]
                };
            }
        }
        out
    }
}
