use ark_serialize::SerializationError;

#[derive(Debug)]
pub enum SigmaError {
    ExpectedSameSizeSequences(usize, usize),
    /// Witness index used in an equation is not less than the number of witnesses of the relation
    IndexOutOfBounds(usize, usize),
    /// Number of leaf witnesses given for a composite statement differs from its number of leaves
    WitnessCountMismatch(usize, usize),
    /// The given witnesses do not satisfy the statement so no proof can be created
    UnsatisfiedStatement,
    /// Witness does not satisfy a relation built for a specific claim, like an affine update
    UnsatisfiedRelation,
    /// Value whose range is being proven is outside `[0, 2^bits)`
    ValueOutOfRange,
    InvalidRangeBits(u8),
    /// The structure of the proof does not match that of the statement
    ProofShapeMismatch,
    InvalidResponse,
    Serialization(SerializationError),
}

impl From<SerializationError> for SigmaError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}
