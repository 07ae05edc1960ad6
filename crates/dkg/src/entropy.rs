use crate::round::Entropy;

/// Caller-visible failures of [`EntropyGenerator::generate_entropy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntropyError {
    /// The requested round is not signed yet, or an earlier round is still unconsumed.
    #[error("Entropy not ready")]
    NotReady,
    /// The requested round fell out of the retention window.
    #[error("Round {0} has been evicted")]
    Evicted(u64),
}

/// Randomness provider consumed by block production.
pub trait EntropyGenerator: Send + Sync {
    /// Entropy for the block at `block_number`. Rounds are consumed strictly in
    /// order; `block_digest` is carried for the caller's benefit only.
    fn generate_entropy(
        &self,
        block_digest: &[u8],
        block_number: u64,
    ) -> Result<Entropy, EntropyError>;
}
