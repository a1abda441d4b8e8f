//! Integration tests for the admin and emergency paths.

use vault_ledger::{
    BlockHeight, InMemoryCustody, LedgerConfig, LedgerEvent, LedgerSnapshot, Principal, Role,
    VaultError, VaultLedger, VaultPhase,
};

fn p(id: &str) -> Principal {
    Principal::from(id)
}

fn setup() -> (VaultLedger<BlockHeight, InMemoryCustody>, BlockHeight) {
    let height = BlockHeight::new(1);
    let custody = InMemoryCustody::with_balances(vec![(p("owner"), 1_000)]);
    let ledger = VaultLedger::new(LedgerConfig::new("deployer"), height.clone(), custody).unwrap();
    (ledger, height)
}

#[test]
fn non_arbitrator_cannot_trigger_emergency() {
    let (mut ledger, _) = setup();
    let id = ledger
        .create_token_vault(&p("owner"), 100, 10, 0, vec![])
        .unwrap();

    assert_eq!(
        ledger.initiate_emergency_unlock(&p("owner"), id),
        Err(VaultError::NotArbitrator { caller: p("owner") })
    );
    assert!(!ledger.get_vault_details(id).unwrap().emergency_active);
    assert_eq!(ledger.vault_phase(id), Ok(VaultPhase::Locked));
}

#[test]
fn emergency_bypasses_height_but_not_quorum() {
    let (mut ledger, _) = setup();
    let id = ledger
        .create_token_vault(&p("owner"), 100, 10, 1, vec![p("a")])
        .unwrap();
    ledger.initiate_emergency_unlock(&p("deployer"), id).unwrap();
    assert_eq!(ledger.is_vault_unlocked(id), Ok(true));

    assert!(matches!(
        ledger.withdraw_from_vault(&p("owner"), id),
        Err(VaultError::InsufficientSignatures { .. })
    ));

    ledger.sign_vault_withdrawal(&p("a"), id).unwrap();
    ledger.withdraw_from_vault(&p("owner"), id).unwrap();
}

#[test]
fn arbitrator_handover() {
    let (mut ledger, _) = setup();
    let id = ledger
        .create_token_vault(&p("owner"), 100, 10, 0, vec![])
        .unwrap();

    // Only the contract owner may reassign.
    assert_eq!(
        ledger.set_arbitrator(&p("owner"), p("owner")),
        Err(VaultError::NotAuthorized {
            caller: p("owner"),
            required: Role::ContractOwner,
        })
    );

    ledger.set_arbitrator(&p("deployer"), p("judge")).unwrap();
    assert_eq!(ledger.get_arbitrator(), &p("judge"));
    assert_eq!(ledger.get_contract_owner(), &p("deployer"));

    // The deployer no longer holds the emergency power.
    assert!(matches!(
        ledger.initiate_emergency_unlock(&p("deployer"), id),
        Err(VaultError::NotArbitrator { .. })
    ));
    ledger.initiate_emergency_unlock(&p("judge"), id).unwrap();

    // Handing the role on does not revoke an override already in place.
    ledger.set_arbitrator(&p("deployer"), p("someone-else")).unwrap();
    assert_eq!(ledger.vault_phase(id), Ok(VaultPhase::EmergencyUnlocked));
}

#[test]
fn events_record_admin_actions() {
    let (mut ledger, height) = setup();
    let id = ledger.create_nft_vault(&p("owner"), 100, 3, 0, vec![]).unwrap();
    height.set(7);
    ledger.set_arbitrator(&p("deployer"), p("judge")).unwrap();
    ledger.initiate_emergency_unlock(&p("judge"), id).unwrap();

    let events = ledger.drain_events();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[1].event,
        LedgerEvent::ArbitratorChanged {
            previous: p("deployer"),
            current: p("judge"),
        }
    );
    assert_eq!(events[2].height, 7);
    assert_eq!(events[2].event.vault_id(), Some(id));
}

#[test]
fn snapshot_restore_keeps_admin_and_emergency_state() {
    let (mut ledger, height) = setup();
    let id = ledger
        .create_token_vault(&p("owner"), 100, 400, 1, vec![p("a")])
        .unwrap();
    ledger.sign_vault_withdrawal(&p("a"), id).unwrap();
    ledger.set_arbitrator(&p("deployer"), p("judge")).unwrap();
    ledger.initiate_emergency_unlock(&p("judge"), id).unwrap();

    let json = ledger.snapshot().to_json().unwrap();
    let snapshot = LedgerSnapshot::from_json(&json).unwrap();
    let mut restored =
        VaultLedger::restore(snapshot, height, ledger.custody().clone()).unwrap();

    assert_eq!(restored.get_arbitrator(), &p("judge"));
    assert_eq!(restored.next_vault_id(), 1);
    assert!(restored.has_signed(id, &p("a")));
    assert!(restored.events().is_empty());

    restored.withdraw_from_vault(&p("owner"), id).unwrap();
    assert_eq!(restored.custody().balance_of(&p("owner")), 1_000);
}
