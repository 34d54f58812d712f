//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Money conservation: supply == Σ(balances)
//! - Deterministic replay: same events → same state
//! - Reserve backing: a successful mint never leaves supply above reserves
//! - Clean rejection: failed operations change nothing
//! - Canonical hashing: key order never changes a travel-rule hash

use proptest::prelude::*;
use usdw_ledger::{
    state::LedgerState, AccountId, Amount, ComplianceReason, Error, EventKind, KycStatus, Ledger,
    TransferRequest, TravelRulePayload,
};

/// One randomly generated ledger call
#[derive(Debug, Clone)]
enum Op {
    Register(u8),
    SubmitKyc(u8),
    Verify(u8),
    Freeze(u8),
    Unfreeze(u8),
    Sanction(u8),
    Unsanction(u8),
    Reserve(Amount),
    Mint(u8, Amount),
    Transfer(u8, u8, Amount),
}

fn account(n: u8) -> String {
    format!("acct{}", n)
}

/// Strategy for generating ledger calls over a small account pool
fn op_strategy() -> impl Strategy<Value = Op> {
    let id = 0u8..4;
    prop_oneof![
        id.clone().prop_map(Op::Register),
        id.clone().prop_map(Op::SubmitKyc),
        id.clone().prop_map(Op::Verify),
        id.clone().prop_map(Op::Freeze),
        id.clone().prop_map(Op::Unfreeze),
        id.clone().prop_map(Op::Sanction),
        id.clone().prop_map(Op::Unsanction),
        (-10i64..2_000).prop_map(Op::Reserve),
        (id.clone(), -10i64..800).prop_map(|(to, amount)| Op::Mint(to, amount)),
        (id.clone(), id, -10i64..800).prop_map(|(f, t, amount)| Op::Transfer(f, t, amount)),
    ]
}

/// Apply an op, ignoring rejections
fn run(ledger: &mut Ledger, op: &Op) -> Result<(), Error> {
    match op {
        Op::Register(n) => ledger.register(account(*n)).map(|_| ()),
        Op::SubmitKyc(n) => ledger.submit_kyc(account(*n), format!("kyc-{}", n)),
        Op::Verify(n) => ledger.verify_kyc(account(*n)),
        Op::Freeze(n) => ledger.freeze_account(account(*n)),
        Op::Unfreeze(n) => ledger.unfreeze_account(account(*n)),
        Op::Sanction(n) => ledger.sanction_account(account(*n)),
        Op::Unsanction(n) => ledger.unsanction_account(account(*n)),
        Op::Reserve(amount) => ledger.set_reserve_report(*amount),
        Op::Mint(n, amount) => ledger.mint(account(*n), *amount),
        Op::Transfer(f, t, amount) => ledger
            .transfer(TransferRequest::new(account(*f), account(*t), *amount).with_attestation())
            .map(|_| ()),
    }
}

/// Ledger with two verified accounts, reserves 1000 and 500 minted to the first
fn funded_ledger() -> Ledger {
    let mut ledger = Ledger::with_generated_key();
    for id in ["alice", "bob"] {
        ledger.register(id).unwrap();
        ledger.verify_kyc(id).unwrap();
    }
    ledger.set_reserve_report(1000).unwrap();
    ledger.mint("alice", 500).unwrap();
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: supply == Σ balances and the log replays to the live state,
    /// after every call, whether it succeeded or not
    #[test]
    fn prop_conservation_and_replay(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ledger = Ledger::with_generated_key();

        for op in &ops {
            let events_before = ledger.events().len();
            let state_before = ledger.state().clone();

            match run(&mut ledger, op) {
                Ok(()) => {
                    if let Op::Mint(..) = op {
                        prop_assert!(ledger.supply() <= ledger.reserves());
                    }
                }
                Err(_) => {
                    prop_assert_eq!(ledger.events().len(), events_before);
                    prop_assert_eq!(ledger.state(), &state_before);
                }
            }

            prop_assert_eq!(ledger.supply(), ledger.state().total_balance());
            prop_assert!(ledger.balances().values().all(|b| *b >= 0));
        }

        let replayed = LedgerState::replay(ledger.events()).unwrap();
        prop_assert_eq!(&replayed, ledger.state());
        ledger.check_invariants().unwrap();
    }

    /// Property: minting past reserves is rejected and changes nothing
    #[test]
    fn prop_mint_over_reserves_rejected(reserves in 0i64..10_000, excess in 1i64..10_000) {
        let mut ledger = Ledger::with_generated_key();
        ledger.register("alice").unwrap();
        ledger.verify_kyc("alice").unwrap();
        ledger.set_reserve_report(reserves).unwrap();

        let events_before = ledger.events().len();
        let err = ledger.mint("alice", reserves + excess).unwrap_err();

        let is_reserve_exceeded = matches!(err, Error::ReserveExceeded { .. });
        prop_assert!(is_reserve_exceeded);
        prop_assert_eq!(ledger.supply(), 0);
        prop_assert_eq!(ledger.account("alice").unwrap().balance, 0);
        prop_assert_eq!(ledger.events().len(), events_before);
    }

    /// Property: restricted accounts are refused regardless of amount
    #[test]
    fn prop_compliance_gating(amount in -1_000i64..1_000, restriction in 0u8..3) {
        let mut ledger = funded_ledger();
        ledger.register("carol").unwrap();
        match restriction {
            0 => {}
            1 => {
                ledger.verify_kyc("carol").unwrap();
                ledger.freeze_account("carol").unwrap();
            }
            _ => {
                ledger.verify_kyc("carol").unwrap();
                ledger.sanction_account("carol").unwrap();
            }
        }

        let to_carol = ledger
            .transfer(TransferRequest::new("alice", "carol", amount))
            .unwrap_err();
        let is_compliance = matches!(to_carol, Error::ComplianceViolation { .. });
        prop_assert!(is_compliance);

        if amount > 0 {
            let mint = ledger.mint("carol", amount.min(500)).unwrap_err();
            let is_compliance = matches!(mint, Error::ComplianceViolation { .. });
            prop_assert!(is_compliance);
        }
        prop_assert_eq!(ledger.account("carol").unwrap().balance, 0);
    }

    /// Property: successful transfers move exactly `amount`
    #[test]
    fn prop_transfer_conservation(amount in 1i64..=500) {
        let mut ledger = funded_ledger();
        ledger.transfer(TransferRequest::new("alice", "bob", amount)).unwrap();

        let balances = ledger.balances();
        prop_assert_eq!(balances[&AccountId::new("alice")], 500 - amount);
        prop_assert_eq!(balances[&AccountId::new("bob")], amount);
        prop_assert_eq!(ledger.supply(), 500);
    }

    /// Property: travel-rule hash ignores key insertion order
    #[test]
    fn prop_travel_rule_hash_order_independent(
        fields in prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,12}", 1..8)
    ) {
        let forward: TravelRulePayload = fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let reverse: TravelRulePayload =
            fields.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();

        let hash = forward.hash().unwrap();
        prop_assert_eq!(&hash, &forward.hash().unwrap());
        prop_assert_eq!(&hash, &reverse.hash().unwrap());
        prop_assert_eq!(hash.len(), 64);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_register_twice_single_event() {
        let mut ledger = Ledger::with_generated_key();
        ledger.register("alice").unwrap();
        ledger.register("alice").unwrap();

        let registered = ledger
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::AccountRegistered { .. }))
            .count();
        assert_eq!(registered, 1);
        assert_eq!(ledger.list_accounts().len(), 1);
    }

    #[test]
    fn test_happy_path() {
        let mut ledger = Ledger::with_generated_key();
        ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();
        ledger.verify_kyc("alice").unwrap();
        ledger.verify_kyc("bob").unwrap();
        ledger.set_reserve_report(1000).unwrap();
        ledger.mint("alice", 500).unwrap();

        let payload = TravelRulePayload::new()
            .with("sender", "alice")
            .with("recipient", "bob")
            .with("amount", 120);
        let record = ledger
            .transfer(
                TransferRequest::new("alice", "bob", 120)
                    .with_travel_rule(payload)
                    .with_attestation(),
            )
            .unwrap();

        let balances = ledger.balances();
        assert_eq!(balances[&AccountId::new("alice")], 380);
        assert_eq!(balances[&AccountId::new("bob")], 120);
        assert_eq!(ledger.supply(), 500);

        let types: Vec<&str> = ledger.events().iter().map(|e| e.kind.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "AccountRegistered",
                "AccountRegistered",
                "KYCVerified",
                "KYCVerified",
                "ReserveUpdated",
                "Mint",
                "Transfer",
            ]
        );
        let sequences: Vec<u64> = ledger.events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..7).collect::<Vec<u64>>());

        match &ledger.events()[6].kind {
            EventKind::Transfer(logged) => {
                assert!(!logged.travel_rule_hash.is_empty());
                assert!(logged.signature.is_some());
                assert_eq!(logged, &record);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(ledger.verify_transfer_attestation(&record).unwrap());
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_freeze_flow() {
        let mut ledger = Ledger::with_generated_key();
        ledger.register("carol").unwrap();
        ledger.register("dave").unwrap();
        ledger.verify_kyc("carol").unwrap();
        ledger.verify_kyc("dave").unwrap();
        ledger.set_reserve_report(1000).unwrap();
        ledger.mint("carol", 400).unwrap();
        ledger.freeze_account("dave").unwrap();

        let events_before = ledger.events().len();
        let err = ledger
            .transfer(TransferRequest::new("carol", "dave", 50))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ComplianceViolation { reason: ComplianceReason::Frozen, .. }
        ));
        assert_eq!(ledger.events().len(), events_before);
        assert_eq!(ledger.balances()[&AccountId::new("carol")], 400);

        ledger.unfreeze_account("dave").unwrap();
        ledger
            .transfer(TransferRequest::new("carol", "dave", 50))
            .unwrap();

        let balances = ledger.balances();
        assert_eq!(balances[&AccountId::new("carol")], 350);
        assert_eq!(balances[&AccountId::new("dave")], 50);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_replay_restores_kyc_metadata() {
        let mut ledger = Ledger::with_generated_key();
        ledger.register("alice").unwrap();
        ledger.submit_kyc("alice", "hashA").unwrap();

        let replayed = LedgerState::replay(ledger.events()).unwrap();
        let account = replayed.account(&AccountId::new("alice")).unwrap();
        assert_eq!(account.kyc_status, KycStatus::Submitted);
        assert_eq!(account.metadata.kyc_hash.as_deref(), Some("hashA"));
    }

    #[test]
    fn test_event_log_json_export() {
        let mut ledger = funded_ledger();
        ledger
            .transfer(TransferRequest::new("alice", "bob", 1).with_attestation())
            .unwrap();

        let json = serde_json::to_value(ledger.events()).unwrap();
        let last = &json[6];
        assert_eq!(last["type"], "Transfer");
        assert_eq!(last["from"], "alice");
        assert_eq!(last["amount"], 1);
        assert_eq!(last["travelRuleHash"], "");
        assert!(last["signature"].is_string());
    }
}
