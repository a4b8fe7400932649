use crate::concat_slices;
use ark_ec::AffineRepr;
use ark_ff::PrimeField;
use ark_std::vec::Vec;
use digest::Digest;

/// Hash bytes to a field element by reducing the digest modulo the field order. The digest should
/// be at least twice as wide as the field (like Blake2b512 for 255-bit fields) for the result to be
/// close to uniform.
pub fn field_elem_from_hash<F: PrimeField, D: Digest>(bytes: &[u8]) -> F {
    F::from_le_bytes_mod_order(&D::digest(bytes))
}

/// Hash bytes to a field element with the given domain separation tag.
pub fn hash_to_field<F: PrimeField, D: Digest>(dst: &[u8], bytes: &[u8]) -> F {
    let mut hasher = D::new();
    hasher.update((dst.len() as u64).to_le_bytes());
    hasher.update(dst);
    hasher.update(bytes);
    F::from_le_bytes_mod_order(&hasher.finalize())
}

/// Hash to several field elements by appending a counter to `bytes`.
pub fn hash_to_field_many<F: PrimeField, D: Digest>(dst: &[u8], bytes: &[u8], count: u32) -> Vec<F> {
    (0..count)
        .map(|i| hash_to_field::<F, D>(dst, &concat_slices!(bytes, i.to_le_bytes())))
        .collect()
}

/// Hash bytes to a point on the curve. This is vulnerable to timing attack and is only used when input
/// is public anyway like when generating setup parameters. Never returns the identity.
pub fn affine_group_elem_from_try_and_incr<G: AffineRepr, D: Digest>(bytes: &[u8]) -> G {
    let mut hash = D::digest(bytes);
    let mut j = 1u64;
    loop {
        if let Some(g) = G::from_random_bytes(&hash) {
            let g = g.clear_cofactor();
            if !g.is_zero() {
                return g;
            }
        }
        hash = D::digest(concat_slices!(bytes, b"-attempt-", j.to_le_bytes()));
        j += 1;
    }
}
