use digest::Digest;

/// Marks a type that implements `Digest + Default + Clone`.
pub trait FullDigest: Digest + Default + Clone {}
impl<T: Digest + Default + Clone> FullDigest for T {}
