use crate::{error::Result, HashDigest};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, PrimeField};
use ark_serialize::CanonicalSerialize;
use ark_std::rand::RngCore;
use incentive_utils::hashing_utils::hash_to_field;

/// Canonical compressed bytes of an object, used as input of hashes and the PRF
pub fn to_bytes<T: CanonicalSerialize>(obj: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(obj.compressed_size());
    obj.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

pub fn hash_bytes_to_field<F: PrimeField>(dst: &[u8], bytes: &[u8]) -> F {
    hash_to_field::<F, HashDigest>(dst, bytes)
}

/// A random non-zero field element
pub fn rand_non_zero<F: Field, R: RngCore>(rng: &mut R) -> F {
    loop {
        let f = F::rand(rng);
        if !f.is_zero() {
            return f;
        }
    }
}

/// Hex of the compressed group element. Used in logs and errors.
pub fn group_elem_to_hex<G: AffineRepr>(g: &G) -> String {
    let mut bytes = Vec::new();
    match g.serialize_compressed(&mut bytes) {
        Ok(_) => hex::encode(bytes),
        Err(_) => String::from("<unserializable>"),
    }
}

/// `bases[i] * -1`
pub fn negate_all<G: AffineRepr>(bases: &[G]) -> Vec<G> {
    G::Group::normalize_batch(&bases.iter().map(|b| -b.into_group()).collect::<Vec<_>>())
}
