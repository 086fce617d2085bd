use ethers::types::{H160, H256};
use tempfile::TempDir;
use zkbridge_core::domain::{DepositRecord, DepositState, SettleStatus, SettlementRecord};
use zkbridge_core::foundation::TaskId;
use zkbridge_core::infrastructure::storage::{MemoryStore, RocksStore, TrackingStore};

fn deposit_record(seed: u64, state: DepositState) -> DepositRecord {
    DepositRecord::new(
        H256::from_low_u64_be(seed),
        state,
        H160::from_low_u64_be(0x70),
        H160::from_low_u64_be(0xbe),
        1,
        2,
        10,
        1_700_000_000_000,
    )
}

fn settlement_record(task_id: &str) -> SettlementRecord {
    SettlementRecord::new(TaskId::from(task_id), H256::from_low_u64_be(0x11), vec![H256::from_low_u64_be(0x22)])
}

fn exercise_deposit_semantics(store: &dyn TrackingStore) {
    let record = deposit_record(1, DepositState::Pending);
    let key = record.tx_hash;

    assert!(store.insert_deposit_if_absent(&record).expect("insert"));
    assert!(!store.insert_deposit_if_absent(&record).expect("duplicate insert"));

    // insert_or_get hands back what is stored, not the argument.
    let mut other = deposit_record(1, DepositState::Completed);
    other.amount = 99;
    let stored = store.insert_or_get_deposit(&other).expect("insert_or_get");
    assert_eq!(stored.state, DepositState::Pending);
    assert_eq!(stored.amount, 10);

    // Conditional update only fires on the expected state.
    let applied = store
        .update_deposit_where(&key, DepositState::InProgress, &|r| r.state = DepositState::Failed)
        .expect("update");
    assert!(!applied);
    assert_eq!(store.find_deposit(&key).expect("find").expect("record").state, DepositState::Pending);

    let applied = store
        .update_deposit_where(&key, DepositState::Pending, &|r| {
            r.nonce = Some(7);
            r.state = DepositState::InProgress;
        })
        .expect("update");
    assert!(applied);
    let current = store.find_deposit(&key).expect("find").expect("record");
    assert_eq!(current.state, DepositState::InProgress);
    assert_eq!(current.nonce, Some(7));

    // Idempotent close.
    assert!(store.mark_deposit_completed(&key).expect("complete"));
    assert!(!store.mark_deposit_completed(&key).expect("second complete"));
    assert_eq!(store.find_deposit(&key).expect("find").expect("record").state, DepositState::Completed);

    // Completed is terminal: a mutation that walks backwards errors out.
    let result = store.update_deposit_where(&key, DepositState::Completed, &|r| r.state = DepositState::Pending);
    assert!(result.is_err());

    // Missing keys are a no-op, not an error.
    assert!(!store.mark_deposit_completed(&H256::from_low_u64_be(0xdead)).expect("absent"));
}

fn exercise_settlement_semantics(store: &dyn TrackingStore) {
    let record = settlement_record("task-1");
    let key = record.task_id.clone();

    assert!(store.insert_settlement_if_absent(&record).expect("insert"));
    assert!(!store.insert_settlement_if_absent(&record).expect("duplicate insert"));

    let applied = store
        .update_settlement_where(&key, SettleStatus::Unsubmitted, &|r| {
            r.status = SettleStatus::Submitted;
            r.settle_tx_hash = Some(H256::zero());
        })
        .expect("update");
    assert!(applied);

    let applied = store
        .update_settlement_where(&key, SettleStatus::Unsubmitted, &|r| r.status = SettleStatus::Failed)
        .expect("stale update");
    assert!(!applied);

    assert!(store.mark_settlement_confirmed(&key).expect("confirm"));
    assert!(!store.mark_settlement_confirmed(&key).expect("second confirm"));
    let current = store.find_settlement(&key).expect("find").expect("record");
    assert_eq!(current.status, SettleStatus::Confirmed);
    assert_eq!(current.withdraw_array, vec![H256::from_low_u64_be(0x22)]);
}

#[test]
fn memory_store_semantics() {
    let store = MemoryStore::new();
    exercise_deposit_semantics(&store);
    exercise_settlement_semantics(&store);
}

#[test]
fn rocks_store_semantics() {
    let dir = TempDir::new().expect("temp dir");
    let store = RocksStore::open(dir.path().join("store")).expect("open rocks");
    exercise_deposit_semantics(&store);
    exercise_settlement_semantics(&store);
    store.health_check().expect("health");
}

#[test]
fn rocks_store_survives_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("store");

    {
        let store = RocksStore::open(&path).expect("open rocks");
        let mut record = deposit_record(9, DepositState::InProgress);
        record.nonce = Some(3);
        record.retry_count = 2;
        assert!(store.insert_deposit_if_absent(&record).expect("insert"));
        assert!(store.insert_settlement_if_absent(&settlement_record("task-9")).expect("insert settlement"));
    }

    let store = RocksStore::open(&path).expect("reopen rocks");
    let record = store.find_deposit(&H256::from_low_u64_be(9)).expect("find").expect("record");
    assert_eq!(record.state, DepositState::InProgress);
    assert_eq!(record.nonce, Some(3));
    assert_eq!(record.retry_count, 2);
    let settlement = store.find_settlement(&TaskId::from("task-9")).expect("find").expect("record");
    assert_eq!(settlement.status, SettleStatus::Unsubmitted);
}
