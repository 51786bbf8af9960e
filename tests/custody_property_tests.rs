//! Property-based tests for the custody state machine and the ledger behind it
//!
//! Random request sequences are thrown at a live service. Whatever gets accepted
//! must respect the stage order and custody rules, and the ledger must stay a
//! valid chain that agrees with the projection. Tampering with any single block
//! must be caught at that block's index.

use custody_ledger::{
    block::BlockData,
    error::{CustodyError, Forbidden},
    ledger::verify_blocks,
    product::{Role, Status, TimeStamp},
    rules,
    service::{CustodyService, NewProduct, TransitionRequest},
};
use proptest::prelude::*;
use std::sync::Arc;

const USERS: [(&str, Role); 5] = [
    ("alice", Role::Manufacturer),
    ("bob", Role::Distributor),
    ("carol", Role::Distributor),
    ("dan", Role::Retailer),
    ("root", Role::SuperAdmin),
];

fn service() -> CustodyService {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let service = CustodyService::new(Arc::new(db)).unwrap();
    for (username, role) in USERS {
        service.register_user(username, role).unwrap();
    }
    service
}

/// Strategy to generate a status
fn status_strategy() -> impl Strategy<Value = Status> {
    (0usize..Status::ALL.len()).prop_map(|i| Status::ALL[i])
}

/// Strategy to generate a transition attempt by one of the known users,
/// optionally handing over to another known user
fn attempt_strategy() -> impl Strategy<Value = (usize, Status, Option<usize>)> {
    (
        0usize..USERS.len(),
        status_strategy(),
        prop::option::of(0usize..USERS.len()),
    )
}

// PROPERTY TESTS
proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: accepted transitions strictly increase the stage, and rejected
    /// ones leave both the projection and the ledger untouched
    #[test]
    fn prop_accepted_transitions_are_monotonic(
        attempts in prop::collection::vec(attempt_strategy(), 1..=20)
    ) {
        let service = service();
        let product_id = service
            .create_product(NewProduct::new("Widget", "alice", Role::Manufacturer))
            .unwrap()
            .product
            .product_id;

        for (actor, status, target) in attempts {
            let (username, role) = USERS[actor];
            let mut request = TransitionRequest::new(&product_id, status, username, role);
            if let Some(target) = target {
                request = request.transfer_to(USERS[target].0);
            }

            let before = service.get_product(&product_id).unwrap();
            let chain_before = service.chain().len();

            match service.transition(request) {
                Ok(outcome) => {
                    prop_assert!(status.index() > before.current_status.index());
                    prop_assert!(before.custodian == username || role == Role::SuperAdmin);
                    prop_assert!(rules::can_set_status(role, status));
                    prop_assert_eq!(service.chain().len(), chain_before + 1);
                    let block = outcome.block.unwrap();
                    prop_assert_eq!(block.data.status(), Some(status));
                    prop_assert_eq!(block.data.custodian(), Some(outcome.product.custodian.as_str()));
                }
                Err(err) => {
                    if status.index() <= before.current_status.index()
                        && before.custodian == username
                        && rules::can_set_status(role, status)
                    {
                        let is_invalid_transition = matches!(err, CustodyError::InvalidTransition { .. });
                        prop_assert!(is_invalid_transition);
                    }
                    prop_assert_eq!(service.get_product(&product_id).unwrap(), before);
                    prop_assert_eq!(service.chain().len(), chain_before);
                }
            }
        }

        prop_assert!(service.verify_chain().valid);
    }

    /// Property: a non-custodian without admin rights is always turned away,
    /// no matter which status or target it asks for
    #[test]
    fn prop_custodian_gate_holds(
        status in status_strategy(),
        target in prop::option::of(0usize..USERS.len()),
    ) {
        let service = service();
        let product_id = service
            .create_product(NewProduct::new("Widget", "alice", Role::Manufacturer))
            .unwrap()
            .product
            .product_id;

        for (username, role) in USERS.into_iter().filter(|(name, role)| *name != "alice" && *role != Role::SuperAdmin) {
            let mut request = TransitionRequest::new(&product_id, status, username, role);
            if let Some(target) = target {
                request = request.transfer_to(USERS[target].0);
            }

            let err = service.transition(request).unwrap_err();
            let is_wrong_custodian = matches!(err, CustodyError::Forbidden(Forbidden::WrongCustodian { .. }));
            prop_assert!(is_wrong_custodian);
        }
        prop_assert_eq!(service.chain().len(), 2);
    }

    /// Property: the ledger's latest status and custodian for a product always
    /// match the projection
    #[test]
    fn prop_ledger_agrees_with_projection(
        attempts in prop::collection::vec(attempt_strategy(), 1..=20)
    ) {
        let service = service();
        let product_id = service
            .create_product(NewProduct::new("Widget", "alice", Role::Manufacturer))
            .unwrap()
            .product
            .product_id;

        for (actor, status, target) in attempts {
            let (username, role) = USERS[actor];
            let mut request = TransitionRequest::new(&product_id, status, username, role);
            if let Some(target) = target {
                request = request.transfer_to(USERS[target].0);
            }
            let _ = service.transition(request);
        }

        let product = service.get_product(&product_id).unwrap();
        let blocks = service.chain_for_product(&product_id);
        let last = &blocks.last().unwrap().data;
        prop_assert_eq!(last.status(), Some(product.current_status));
        prop_assert_eq!(last.custodian(), Some(product.custodian.as_str()));
        prop_assert_eq!(blocks.len(), service.product_history(&product_id).unwrap().len());
    }

    /// Property: mutating one field of any block, genesis included, is reported at that index
    #[test]
    fn prop_tampering_is_located(
        length in 2usize..=8,
        victim in any::<prop::sample::Index>(),
        field in 0u8..4,
    ) {
        let service = service();
        for n in 0..length {
            service
                .create_product(NewProduct::new(format!("Widget {n}"), "alice", Role::Manufacturer))
                .unwrap();
        }

        let mut blocks = service.chain();
        let position = victim.index(blocks.len());
        let block = &mut blocks[position];
        match field {
            0 => block.index += 100,
            1 => block.timestamp = TimeStamp::new_with(1999, 12, 31, 23, 59, 59),
            2 => {
                block.data = BlockData::DeleteProduct {
                    product_id: "prod_1forged".into(),
                    deleted_by: "mallory".into(),
                }
            }
            _ => block.previous_hash = "ee".repeat(32),
        }

        let verification = verify_blocks(&blocks);
        prop_assert!(!verification.valid);
        prop_assert_eq!(verification.message, format!("Hash mismatch at index {position}"));
    }
}
