//! Number-theoretic transforms for polynomial multiplication.
//!
//! A radix-2 iterative cyclic NTT plus a ψ-twist turns multiplication in
//! R_q = Z_q[X]/(X^n + 1) into pointwise products: twisting a polynomial by
//! powers of a primitive 2n-th root ψ and applying the cyclic transform with
//! ω = ψ² evaluates it at the odd powers ψ^(2j+1), which are exactly the
//! roots of X^n + 1.
//!
//! The same table type drives the batch encoder (over the plaintext
//! modulus), where the evaluation-domain values are the scheme's slots.

use super::modular::{primitive_root_2n, ModQ};

/// Precomputed transform table for one modulus.
///
/// Requires q ≡ 1 (mod 2n). Create once per (n, q) pair and reuse.
#[derive(Clone, Debug)]
pub struct NttTable {
    n: usize,
    q: u64,
    /// ψ^i for i in 0..n (ψ a primitive 2n-th root of unity).
    psi_pows: Vec<u64>,
    /// ψ^(-i) for i in 0..n.
    psi_inv_pows: Vec<u64>,
    /// ω^i for i in 0..n/2 with ω = ψ² (primitive n-th root).
    omega_pows: Vec<u64>,
    /// ω^(-i) for i in 0..n/2.
    omega_inv_pows: Vec<u64>,
    /// n^(-1) mod q for inverse scaling.
    n_inv: u64,
}

impl NttTable {
    /// Build the table for ring degree `n` and modulus `q`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a power of two or q is not ≡ 1 (mod 2n);
    /// parameter validation happens before any table is constructed.
    pub fn new(n: usize, q: u64) -> Self {
        assert!(n.is_power_of_two(), "n must be a power of two");
        assert!(q % (2 * n as u64) == 1, "q must be ≡ 1 (mod 2n)");

        let psi = primitive_root_2n(n, q);
        let psi_inv = ModQ::inv(psi, q);
        let omega = ModQ::mul(psi, psi, q);
        let omega_inv = ModQ::inv(omega, q);

        let mut psi_pows = Vec::with_capacity(n);
        let mut psi_inv_pows = Vec::with_capacity(n);
        let mut fwd = 1u64;
        let mut bwd = 1u64;
        for _ in 0..n {
            psi_pows.push(fwd);
            psi_inv_pows.push(bwd);
            fwd = ModQ::mul(fwd, psi, q);
            bwd = ModQ::mul(bwd, psi_inv, q);
        }

        let mut omega_pows = Vec::with_capacity(n / 2);
        let mut omega_inv_pows = Vec::with_capacity(n / 2);
        let mut fwd = 1u64;
        let mut bwd = 1u64;
        for _ in 0..n / 2 {
            omega_pows.push(fwd);
            omega_inv_pows.push(bwd);
            fwd = ModQ::mul(fwd, omega, q);
            bwd = ModQ::mul(bwd, omega_inv, q);
        }

        let n_inv = ModQ::inv(n as u64, q);

        Self {
            n,
            q,
            psi_pows,
            psi_inv_pows,
            omega_pows,
            omega_inv_pows,
            n_inv,
        }
    }

    /// Ring degree n.
    pub fn degree(&self) -> usize {
        self.n
    }

    /// Modulus q.
    pub fn modulus(&self) -> u64 {
        self.q
    }

    fn bit_reverse_permute(values: &mut [u64]) {
        let n = values.len();
        let mut j = 0usize;
        for i in 1..n {
            let mut bit = n >> 1;
            while j & bit != 0 {
                j ^= bit;
                bit >>= 1;
            }
            j |= bit;
            if i < j {
                values.swap(i, j);
            }
        }
    }

    /// In-place cyclic transform: out[j] = Σ_k in[k]·root^(jk), where
    /// `roots[i]` holds root^i for the chosen direction.
    fn cyclic_transform(&self, values: &mut [u64], roots: &[u64]) {
        debug_assert_eq!(values.len(), self.n);
        Self::bit_reverse_permute(values);

        let q = self.q;
        let mut len = 2;
        while len <= self.n {
            let stride = self.n / len;
            for start in (0..self.n).step_by(len) {
                for j in 0..len / 2 {
                    let w = roots[j * stride];
                    let u = values[start + j];
                    let v = ModQ::mul(values[start + j + len / 2], w, q);
                    values[start + j] = ModQ::add(u, v, q);
                    values[start + j + len / 2] = ModQ::sub(u, v, q);
                }
            }
            len <<= 1;
        }
    }

    /// Forward negacyclic transform: coefficients -> evaluations at
    /// ψ^(2j+1), natural order in j.
    pub fn forward(&self, values: &mut [u64]) {
        for (v, psi) in values.iter_mut().zip(self.psi_pows.iter()) {
            *v = ModQ::mul(*v, *psi, self.q);
        }
        self.cyclic_transform(values, &self.omega_pows);
    }

    /// Inverse negacyclic transform: evaluations -> coefficients.
    pub fn inverse(&self, values: &mut [u64]) {
        self.cyclic_transform(values, &self.omega_inv_pows);
        let q = self.q;
        for (v, psi_inv) in values.iter_mut().zip(self.psi_inv_pows.iter()) {
            *v = ModQ::mul(ModQ::mul(*v, self.n_inv, q), *psi_inv, q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: u64 = 1152921504606830593;

    #[test]
    fn forward_inverse_round_trip() {
        let table = NttTable::new(256, Q);
        let original: Vec<u64> = (0..256).map(|i| (i as u64 * 37 + 11) % Q).collect();
        let mut values = original.clone();
        table.forward(&mut values);
        table.inverse(&mut values);
        assert_eq!(values, original);
    }

    fn naive_negacyclic_mul(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = ModQ::mul(a[i], b[j], q);
                let k = i + j;
                if k < n {
                    out[k] = ModQ::add(out[k], prod, q);
                } else {
                    out[k - n] = ModQ::sub(out[k - n], prod, q);
                }
            }
        }
        out
    }

    #[test]
    fn pointwise_matches_naive_negacyclic() {
        let n = 64;
        let table = NttTable::new(n, Q);
        let a: Vec<u64> = (0..n).map(|i| (i as u64 * 71 + 3) % 1000).collect();
        let b: Vec<u64> = (0..n).map(|i| (i as u64 * 29 + 17) % 1000).collect();

        let expected = naive_negacyclic_mul(&a, &b, Q);

        let mut fa = a.clone();
        let mut fb = b.clone();
        table.forward(&mut fa);
        table.forward(&mut fb);
        let mut fc: Vec<u64> = fa
            .iter()
            .zip(fb.iter())
            .map(|(&x, &y)| ModQ::mul(x, y, Q))
            .collect();
        table.inverse(&mut fc);

        assert_eq!(fc, expected);
    }

    #[test]
    fn works_for_small_aux_primes() {
        for q in [998244353u64, 754974721, 469762049, 167772161, 1004535809] {
            let table = NttTable::new(128, q);
            let mut values: Vec<u64> = (0..128).map(|i| i as u64).collect();
            let original = values.clone();
            table.forward(&mut values);
            table.inverse(&mut values);
            assert_eq!(values, original, "round trip failed for q={q}");
        }
    }
}
