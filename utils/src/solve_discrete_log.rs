use ark_ec::{AffineRepr, CurveGroup};
use ark_serialize::CanonicalSerialize;
use ark_std::{collections::BTreeMap, vec::Vec};

/// Solve discrete log using brute force.
/// `max` is the maximum value of the discrete log and this returns `x` such that `0 <= x <= max` and `base * x = target`
/// if such `x` exists, else return None.
pub fn solve_discrete_log_brute_force<G: AffineRepr>(max: u64, base: &G, target: &G) -> Option<u64> {
    let target = target.into_group();
    let base = base.into_group();
    let mut cur = G::zero().into_group();
    for j in 0..=max {
        if cur == target {
            return Some(j);
        }
        cur += base;
    }
    None
}

/// Precomputed table of `base * i -> i` for `i` in `[0, 2^bit_size)`. Used when many small discrete
/// logs with the same base have to be solved, like when decrypting digits.
#[derive(Clone, Debug)]
pub struct DiscreteLogTable<G: AffineRepr> {
    base: G,
    bit_size: u8,
    table: BTreeMap<Vec<u8>, u64>,
}

impl<G: AffineRepr> DiscreteLogTable<G> {
    pub fn new(base: &G, bit_size: u8) -> Self {
        let size = 1u64 << bit_size;
        let mut elems = Vec::with_capacity(size as usize);
        let base_g = base.into_group();
        let mut cur = G::zero().into_group();
        for _ in 0..size {
            elems.push(cur);
            cur += base_g;
        }
        let table = G::Group::normalize_batch(&elems)
            .iter()
            .enumerate()
            .filter_map(|(i, g)| Self::key(g).map(|k| (k, i as u64)))
            .collect();
        Self {
            base: *base,
            bit_size,
            table,
        }
    }

    /// Returns `x` such that `base * x = target` if `x < 2^bit_size`
    pub fn solve(&self, target: &G) -> Option<u64> {
        Self::key(target).and_then(|k| self.table.get(&k).copied())
    }

    pub fn base(&self) -> &G {
        &self.base
    }

    pub fn bit_size(&self) -> u8 {
        self.bit_size
    }

    fn key(g: &G) -> Option<Vec<u8>> {
        let mut bytes = Vec::with_capacity(g.compressed_size());
        g.serialize_compressed(&mut bytes).ok()?;
        Some(bytes)
    }
}
