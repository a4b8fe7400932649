//! Serde serialization for `arkworks-rs` objects which don't implement serde themselves. Objects
//! are written in their canonical compressed form, as a hex string for human readable formats
//! like JSON and as raw bytes otherwise.

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{string::String, vec::Vec};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

pub type ArkObjectBytes = AsCanonical;

pub struct AsCanonical;

impl AsCanonical {
    pub fn serialize<S, T>(x: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let mut bytes = Vec::with_capacity(x.compressed_size());
        x.serialize_compressed(&mut bytes)
            .map_err(serde::ser::Error::custom)?;
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(&bytes))
        } else {
            Serialize::serialize(&bytes, serializer)
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let s: String = Deserialize::deserialize(deserializer)?;
            hex::decode(s).map_err(serde::de::Error::custom)?
        } else {
            let b: Vec<u8> = Deserialize::deserialize(deserializer)?;
            b
        };
        T::deserialize_compressed(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

impl<T> SerializeAs<T> for AsCanonical
where
    T: CanonicalSerialize,
{
    fn serialize_as<S>(x: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Self::serialize(x, serializer)
    }
}

impl<'de, T> DeserializeAs<'de, T> for AsCanonical
where
    T: CanonicalDeserialize,
{
    fn deserialize_as<D>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::{Fr, G1Affine};
    use ark_ec::AffineRepr;
    use ark_std::{
        rand::{rngs::StdRng, SeedableRng},
        UniformRand,
    };
    use serde_with::serde_as;

    #[serde_as]
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde_as(as = "ArkObjectBytes")]
        scalar: Fr,
        #[serde_as(as = "Vec<ArkObjectBytes>")]
        points: Vec<G1Affine>,
    }

    #[test]
    fn json_uses_hex() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let holder = Holder {
            scalar: Fr::rand(&mut rng),
            points: vec![G1Affine::generator(), G1Affine::rand(&mut rng)],
        };
        let ser = serde_json::to_string(&holder).unwrap();
        let value: serde_json::Value = serde_json::from_str(&ser).unwrap();
        assert!(value["scalar"].is_string());
        assert_eq!(value["points"][0].as_str().unwrap().len(), 96);
        let deser = serde_json::from_str::<Holder>(&ser).unwrap();
        assert_eq!(holder, deser);

        let bad = ser.replacen("\"scalar\":\"", "\"scalar\":\"zz", 1);
        assert!(serde_json::from_str::<Holder>(&bad).is_err());
    }
}
