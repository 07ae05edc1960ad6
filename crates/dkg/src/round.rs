//! Per-round share collection and group signature recovery.
//!
//! Round 0 signs [`GENESIS_PAYLOAD`]; round `N > 0` signs the entropy of
//! round `N - 1`, so every output can be checked against its predecessor.

use beacon_crypto::{
    entropy_from_signature, recover_group_signature, verify, CryptoError, MemberId, PublicKey,
    Signature, ENTROPY_LEN,
};
use std::collections::BTreeMap;

/// Payload signed by every member in round 0.
pub const GENESIS_PAYLOAD: &[u8] = b"beacon/genesis/v1";

pub type Entropy = [u8; ENTROPY_LEN];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundError {
    #[error("Round {0} is not signed yet")]
    NotSigned(u64),
    #[error("Round {0} has been evicted")]
    Evicted(u64),
    #[error("Share from {member} does not verify for round {round}")]
    InvalidShare { round: u64, member: MemberId },
    #[error("Recovered signature for round {0} does not verify against the shared key")]
    AggregateVerificationFailed(u64),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// One round of the beacon: `Collecting` until recovery succeeds, then `Signed`.
#[derive(Debug, Clone)]
pub struct Round {
    index: u64,
    payload: Vec<u8>,
    shares: BTreeMap<MemberId, Signature>,
    signed: Option<(Signature, Entropy)>,
}

impl Round {
    #[must_use]
    pub fn new(index: u64, payload: Vec<u8>) -> Self {
        Self {
            index,
            payload,
            shares: BTreeMap::new(),
            signed: None,
        }
    }

    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Verify `signature` against the submitter's declared share key and store
    /// it. A later share from the same member replaces the earlier one.
    ///
    /// Returns whether the member was not yet counted. Signed rounds are left
    /// untouched.
    pub fn add_share(
        &mut self,
        member: MemberId,
        share_public_key: &PublicKey,
        signature: Signature,
    ) -> Result<bool, RoundError> {
        if self.signed.is_some() {
            return Ok(false);
        }

        if !verify(&signature, share_public_key, &self.payload) {
            return Err(RoundError::InvalidShare {
                round: self.index,
                member,
            });
        }

        Ok(self.shares.insert(member, signature).is_none())
    }

    #[must_use]
    pub fn share_count(&self) -> usize {
        self.shares.len()
    }

    #[must_use]
    pub fn has_signature(&self) -> bool {
        self.signed.is_some()
    }

    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.signed.as_ref().map(|(signature, _)| signature)
    }

    pub fn entropy(&self) -> Result<Entropy, RoundError> {
        self.signed
            .as_ref()
            .map(|(_, entropy)| *entropy)
            .ok_or(RoundError::NotSigned(self.index))
    }

    /// Recover the group signature from the first `threshold` shares and check
    /// it against the shared key. On success the round becomes `Signed`.
    pub fn try_recover(
        &mut self,
        threshold: usize,
        shared_public_key: &PublicKey,
    ) -> Result<Entropy, RoundError> {
        if let Some((_, entropy)) = &self.signed {
            return Ok(*entropy);
        }

        let shares: Vec<(MemberId, Signature)> = self
            .shares
            .iter()
            .take(threshold)
            .map(|(id, signature)| (*id, *signature))
            .collect();
        let signature = recover_group_signature(&shares, threshold)?;

        if !verify(&signature, shared_public_key, &self.payload) {
            return Err(RoundError::AggregateVerificationFailed(self.index));
        }

        let entropy = entropy_from_signature(&signature)?;
        self.signed = Some((signature, entropy));
        Ok(entropy)
    }
}

/// Rounds keyed by index, created lazily and evicted once they fall more
/// than `retention_window` rounds behind the consumption pointer.
#[derive(Debug)]
pub struct RoundStore {
    rounds: BTreeMap<u64, Round>,
    retention_window: u64,
    next_to_consume: u64,
}

impl RoundStore {
    #[must_use]
    pub fn new(retention_window: u64) -> Self {
        Self {
            rounds: BTreeMap::new(),
            retention_window,
            next_to_consume: 0,
        }
    }

    /// Rounds below this index are gone for good.
    #[must_use]
    pub fn evicted_below(&self) -> u64 {
        self.next_to_consume.saturating_sub(self.retention_window)
    }

    #[must_use]
    pub fn next_to_consume(&self) -> u64 {
        self.next_to_consume
    }

    /// The payload members sign for round `index`.
    pub fn payload_for(&self, index: u64) -> Result<Vec<u8>, RoundError> {
        if index == 0 {
            return Ok(GENESIS_PAYLOAD.to_vec());
        }
        Ok(self.entropy(index - 1)?.to_vec())
    }

    #[must_use]
    pub fn get(&self, index: u64) -> Option<&Round> {
        self.rounds.get(&index)
    }

    /// The round at `index`, created on first reference. Creation needs the
    /// previous round's entropy.
    pub fn round_mut(&mut self, index: u64) -> Result<&mut Round, RoundError> {
        if index < self.evicted_below() {
            return Err(RoundError::Evicted(index));
        }

        if !self.rounds.contains_key(&index) {
            let payload = self.payload_for(index)?;
            self.rounds.insert(index, Round::new(index, payload));
        }

        self.rounds
            .get_mut(&index)
            .ok_or(RoundError::NotSigned(index))
    }

    pub fn entropy(&self, index: u64) -> Result<Entropy, RoundError> {
        if index < self.evicted_below() {
            return Err(RoundError::Evicted(index));
        }
        self.rounds
            .get(&index)
            .ok_or(RoundError::NotSigned(index))?
            .entropy()
    }

    /// Move the consumption pointer forward one round and drop whatever
    /// fell out of the retention window.
    pub fn advance_consumption(&mut self) {
        self.next_to_consume += 1;
        let keep_from = self.evicted_below();
        self.rounds = self.rounds.split_off(&keep_from);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
