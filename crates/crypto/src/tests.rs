use super::*;
use rand::{rngs::StdRng, SeedableRng};

fn test_rng() -> StdRng {
    StdRng::seed_from_u64(0x5eed)
}

fn member_ids(n: usize) -> Vec<MemberId> {
    (0..n)
        .map(|i| hash_to_id(format!("tcp://127.0.0.1:{}", 9000 + i).as_bytes()))
        .collect()
}

/// All `k`-element subsets of `0..n`, in lexicographic order.
fn subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn go(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            go(i + 1, n, k, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    go(0, n, k, &mut Vec::new(), &mut out);
    out
}

#[test]
fn test_hash_to_id_is_deterministic() {
    let a = hash_to_id(b"tcp://10.0.0.1:8000");
    let b = hash_to_id(b"tcp://10.0.0.1:8000");
    let c = hash_to_id(b"tcp://10.0.0.2:8000");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(!a.is_zero());
}

#[test]
fn test_share_signing_and_verification() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(2, &mut rng).unwrap();
    let id = hash_to_id(b"node-a");
    let share = poly.derive_share(&id).unwrap();

    let signature = sign(&share, b"payload").unwrap();
    assert!(verify(&signature, &share.public_key(), b"payload"));
    assert!(!verify(&signature, &share.public_key(), b"other payload"));
    assert!(!verify(&signature, &poly.shared_public_key(), b"payload"));
}

#[test]
fn test_any_threshold_subset_recovers_same_signature() {
    const N: usize = 5;
    const T: usize = 3;
    let payload = b"beacon genesis";

    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(T, &mut rng).unwrap();
    let shared = poly.shared_public_key();
    let ids = member_ids(N);
    let shares: Vec<(MemberId, Signature)> = ids
        .iter()
        .map(|id| {
            let share = poly.derive_share(id).unwrap();
            (*id, sign(&share, payload).unwrap())
        })
        .collect();

    let mut recovered = None;
    for subset in subsets(N, T) {
        let chosen: Vec<_> = subset.iter().map(|&i| shares[i]).collect();
        let signature = recover_group_signature(&chosen, T).unwrap();
        assert!(verify(&signature, &shared, payload));

        match recovered {
            None => recovered = Some(signature),
            Some(previous) => assert_eq!(previous, signature),
        }
    }
}

#[test]
fn test_threshold_of_one_matches_master_signature() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(1, &mut rng).unwrap();
    let id = hash_to_id(b"solo");
    let share = poly.derive_share(&id).unwrap();
    let signature = sign(&share, b"m").unwrap();

    let recovered = recover_group_signature(&[(id, signature)], 1).unwrap();
    assert_eq!(recovered, signature);
    assert!(verify(&recovered, &poly.shared_public_key(), b"m"));
}

#[test]
fn test_recovery_below_threshold_fails() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(3, &mut rng).unwrap();
    let ids = member_ids(2);
    let shares: Vec<_> = ids
        .iter()
        .map(|id| (*id, sign(&poly.derive_share(id).unwrap(), b"m").unwrap()))
        .collect();

    assert_eq!(
        recover_group_signature(&shares, 3),
        Err(CryptoError::InsufficientShares {
            required: 3,
            got: 2
        })
    );
}

#[test]
fn test_recovery_rejects_duplicate_ids() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(2, &mut rng).unwrap();
    let id = hash_to_id(b"dup");
    let signature = sign(&poly.derive_share(&id).unwrap(), b"m").unwrap();

    assert_eq!(
        recover_group_signature(&[(id, signature), (id, signature)], 2),
        Err(CryptoError::DuplicateShareId)
    );
}

#[test]
fn test_fewer_shares_than_degree_do_not_verify() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(3, &mut rng).unwrap();
    let ids = member_ids(2);
    let shares: Vec<_> = ids
        .iter()
        .map(|id| (*id, sign(&poly.derive_share(id).unwrap(), b"m").unwrap()))
        .collect();

    // Interpolating through too few points yields a signature for the wrong key
    let forged = recover_group_signature(&shares, 2).unwrap();
    assert!(!verify(&forged, &poly.shared_public_key(), b"m"));
}

#[test]
fn test_zero_threshold_is_rejected() {
    let mut rng = test_rng();
    assert_eq!(
        MasterKeyPolynomial::generate(0, &mut rng).unwrap_err(),
        CryptoError::InvalidThreshold(0)
    );
}

#[test]
fn test_zero_member_id_is_rejected() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(2, &mut rng).unwrap();
    let zero = MemberId(ark_bn254::Fr::zero());
    assert_eq!(
        poly.derive_share(&zero).unwrap_err(),
        CryptoError::ZeroMemberId
    );
}

#[test]
fn test_entropy_is_stable_for_signature() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(1, &mut rng).unwrap();
    let share = poly.derive_share(&hash_to_id(b"x")).unwrap();
    let s1 = sign(&share, b"round 0").unwrap();
    let s2 = sign(&share, b"round 1").unwrap();

    assert_eq!(
        entropy_from_signature(&s1).unwrap(),
        entropy_from_signature(&s1).unwrap()
    );
    assert_ne!(
        entropy_from_signature(&s1).unwrap(),
        entropy_from_signature(&s2).unwrap()
    );
}

#[test]
fn test_serde_encoding() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(2, &mut rng).unwrap();
    let id = hash_to_id(b"serde");
    let share = poly.derive_share(&id).unwrap();
    let signature = sign(&share, b"m").unwrap();

    let bytes = bincode::serialize(&(id, share.public_key(), signature)).unwrap();
    let (id2, pk2, sig2): (MemberId, PublicKey, Signature) = bincode::deserialize(&bytes).unwrap();
    assert_eq!(id, id2);
    assert_eq!(share.public_key(), pk2);
    assert_eq!(signature, sig2);

    let json = serde_json::to_string(&share).unwrap();
    let share2: SecretShare = serde_json::from_str(&json).unwrap();
    assert_eq!(share, share2);

    // Garbage must not decode into a curve point
    let garbage = bincode::serialize(&vec![0xFFu8; 32]).unwrap();
    assert!(bincode::deserialize::<Signature>(&garbage).is_err());
}

#[test]
fn test_secret_share_debug_is_redacted() {
    let mut rng = test_rng();
    let poly = MasterKeyPolynomial::generate(1, &mut rng).unwrap();
    let share = poly.derive_share(&hash_to_id(b"y")).unwrap();
    assert_eq!(format!("{:?}", share), "SecretShare(<redacted>)");
}

#[test]
fn test_key_material_zeroizes() {
    use zeroize::Zeroize;

    let mut rng = test_rng();
    let mut poly = MasterKeyPolynomial::generate(3, &mut rng).unwrap();
    let mut share = poly.derive_share(&hash_to_id(b"z")).unwrap();
    assert!(!share.is_zero());

    share.zeroize();
    assert!(share.is_zero());

    poly.zeroize();
    assert!(poly.shared_public_key().is_identity());
}
