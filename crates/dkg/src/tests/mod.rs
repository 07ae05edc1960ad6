use beacon_config::BeaconSettings;
use beacon_crypto::{MasterKeyPolynomial, MemberId, PublicKey, SecretShare};
use beacon_networking::MemberAddress;
use rand::{rngs::StdRng, SeedableRng};

mod cabinet;

fn init_tracing() {
    beacon_logging::setup_log();
}

fn addr(s: &str) -> MemberAddress {
    MemberAddress::new(s)
}

fn settings(me: &str, cabinet: &[&str], threshold: usize, dealer: &str) -> BeaconSettings {
    BeaconSettings::new(me, cabinet.iter().copied(), threshold, dealer)
}

/// A dealt key for `members`: the shared key and every member's share.
fn deal(members: &[&str], threshold: usize) -> (PublicKey, Vec<(MemberId, SecretShare)>) {
    let mut rng = StdRng::seed_from_u64(42);
    let polynomial = MasterKeyPolynomial::generate(threshold, &mut rng).unwrap();
    let shares = members
        .iter()
        .map(|m| {
            let id = crate::derive_member_id(&addr(m));
            (id, polynomial.derive_share(&id).unwrap())
        })
        .collect();
    (polynomial.shared_public_key(), shares)
}

/// A share no dealer in these tests hands out.
fn rogue_share() -> SecretShare {
    let mut rng = StdRng::seed_from_u64(7);
    let polynomial = MasterKeyPolynomial::generate(1, &mut rng).unwrap();
    polynomial
        .derive_share(&crate::derive_member_id(&addr("rogue")))
        .unwrap()
}
