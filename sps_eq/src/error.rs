use ark_serialize::SerializationError;

#[derive(Debug)]
pub enum SpsEqError {
    NeedNonZeroSize,
    MessageCountIncompatibleWithKey(usize, usize),
    ZeroRandomizer,
    InvalidSignature,
    Serialization(SerializationError),
}

impl From<SerializationError> for SpsEqError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}
