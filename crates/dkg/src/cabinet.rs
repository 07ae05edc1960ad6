//! Cabinet membership and threshold identities.

use beacon_config::BeaconSettings;
use beacon_crypto::{hash_to_id, MemberId};
use beacon_networking::MemberAddress;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CabinetError {
    #[error("Cabinet is empty")]
    Empty,
    #[error("Invalid threshold {threshold} for a cabinet of {size}")]
    InvalidThreshold { threshold: usize, size: usize },
    #[error("Duplicate cabinet member: {0}")]
    DuplicateMember(MemberAddress),
    #[error("Member {0} derives an id already taken by another member")]
    IdCollision(MemberAddress),
    #[error("Member {0} derives the zero id")]
    ZeroId(MemberAddress),
    #[error("Dealer {0} is not a cabinet member")]
    UnknownDealer(MemberAddress),
    #[error("{0} is not a cabinet member")]
    UnknownMember(MemberAddress),
    #[error("Threshold {threshold} with dealer {dealer} needs a new dealt key")]
    KeyChange {
        threshold: usize,
        dealer: MemberAddress,
    },
}

/// Every member computes every other member's id from its address alone.
#[must_use]
pub fn derive_member_id(address: &MemberAddress) -> MemberId {
    hash_to_id(address.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinetMember {
    address: MemberAddress,
    id: MemberId,
}

impl CabinetMember {
    #[must_use]
    pub fn new(address: MemberAddress) -> Self {
        let id = derive_member_id(&address);
        Self { address, id }
    }

    #[must_use]
    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }
}

/// The fixed membership of one epoch, its signing threshold and its dealer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cabinet {
    members: BTreeMap<MemberAddress, MemberId>,
    ids: BTreeMap<MemberId, MemberAddress>,
    threshold: usize,
    dealer: MemberAddress,
}

impl Cabinet {
    pub fn new(
        addresses: impl IntoIterator<Item = MemberAddress>,
        threshold: usize,
        dealer: MemberAddress,
    ) -> Result<Self, CabinetError> {
        let mut members = BTreeMap::new();
        let mut ids = BTreeMap::new();

        for address in addresses {
            let member = CabinetMember::new(address);
            if member.id.is_zero() {
                return Err(CabinetError::ZeroId(member.address));
            }
            if members.contains_key(&member.address) {
                return Err(CabinetError::DuplicateMember(member.address));
            }
            if ids.contains_key(&member.id) {
                return Err(CabinetError::IdCollision(member.address));
            }
            ids.insert(member.id, member.address.clone());
            members.insert(member.address, member.id);
        }

        if members.is_empty() {
            return Err(CabinetError::Empty);
        }
        if threshold == 0 || threshold > members.len() {
            return Err(CabinetError::InvalidThreshold {
                threshold,
                size: members.len(),
            });
        }
        if !members.contains_key(&dealer) {
            return Err(CabinetError::UnknownDealer(dealer));
        }

        Ok(Self {
            members,
            ids,
            threshold,
            dealer,
        })
    }

    pub fn from_settings(settings: &BeaconSettings) -> Result<Self, CabinetError> {
        Self::new(
            settings.cabinet.iter().cloned(),
            settings.threshold,
            settings.dealer.clone(),
        )
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn dealer(&self) -> &MemberAddress {
        &self.dealer
    }

    #[must_use]
    pub fn is_dealer(&self, address: &MemberAddress) -> bool {
        self.dealer == *address
    }

    #[must_use]
    pub fn contains(&self, address: &MemberAddress) -> bool {
        self.members.contains_key(address)
    }

    #[must_use]
    pub fn contains_id(&self, id: &MemberId) -> bool {
        self.ids.contains_key(id)
    }

    #[must_use]
    pub fn id_of(&self, address: &MemberAddress) -> Option<MemberId> {
        self.members.get(address).copied()
    }

    #[must_use]
    pub fn address_of(&self, id: &MemberId) -> Option<&MemberAddress> {
        self.ids.get(id)
    }

    pub fn members(&self) -> impl Iterator<Item = CabinetMember> + '_ {
        self.members.iter().map(|(address, id)| CabinetMember {
            address: address.clone(),
            id: *id,
        })
    }

    #[must_use]
    pub fn addresses(&self) -> BTreeSet<MemberAddress> {
        self.members.keys().cloned().collect()
    }
}
