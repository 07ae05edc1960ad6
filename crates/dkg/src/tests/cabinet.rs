use super::addr;
use crate::cabinet::{derive_member_id, Cabinet, CabinetError};

fn cabinet(members: &[&str], threshold: usize, dealer: &str) -> Result<Cabinet, CabinetError> {
    Cabinet::new(members.iter().map(|m| addr(m)), threshold, addr(dealer))
}

#[test]
fn test_member_ids_are_deterministic_and_distinct() {
    assert_eq!(derive_member_id(&addr("a")), derive_member_id(&addr("a")));
    assert_ne!(derive_member_id(&addr("a")), derive_member_id(&addr("b")));
    assert!(!derive_member_id(&addr("a")).is_zero());
}

#[test]
fn test_lookups() {
    let cabinet = cabinet(&["a", "b", "c"], 2, "a").unwrap();
    assert_eq!(cabinet.len(), 3);
    assert_eq!(cabinet.threshold(), 2);
    assert!(cabinet.is_dealer(&addr("a")));
    assert!(!cabinet.is_dealer(&addr("b")));

    let b = derive_member_id(&addr("b"));
    assert_eq!(cabinet.id_of(&addr("b")), Some(b));
    assert_eq!(cabinet.address_of(&b), Some(&addr("b")));
    assert!(cabinet.contains_id(&b));
    assert!(!cabinet.contains_id(&derive_member_id(&addr("z"))));
    assert_eq!(cabinet.id_of(&addr("z")), None);

    let members: Vec<_> = cabinet.members().map(|m| m.address().clone()).collect();
    assert_eq!(members, vec![addr("a"), addr("b"), addr("c")]);
    assert_eq!(cabinet.addresses().len(), 3);
}

#[test]
fn test_threshold_bounds() {
    assert_eq!(
        cabinet(&["a", "b"], 0, "a"),
        Err(CabinetError::InvalidThreshold {
            threshold: 0,
            size: 2
        })
    );
    assert_eq!(
        cabinet(&["a", "b"], 3, "a"),
        Err(CabinetError::InvalidThreshold {
            threshold: 3,
            size: 2
        })
    );
    assert!(cabinet(&["a", "b"], 1, "a").is_ok());
    assert!(cabinet(&["a", "b"], 2, "a").is_ok());
}

#[test]
fn test_membership_errors() {
    assert_eq!(cabinet(&[], 1, "a"), Err(CabinetError::Empty));
    assert_eq!(
        cabinet(&["a", "b", "a"], 1, "a"),
        Err(CabinetError::DuplicateMember(addr("a")))
    );
    assert_eq!(
        cabinet(&["a", "b"], 1, "z"),
        Err(CabinetError::UnknownDealer(addr("z")))
    );
}

#[test]
fn test_from_settings() {
    let settings = super::settings("b", &["a", "b", "c"], 2, "c");
    let cabinet = Cabinet::from_settings(&settings).unwrap();
    assert_eq!(cabinet.dealer(), &addr("c"));
    assert!(cabinet.contains(&addr("b")));
}
