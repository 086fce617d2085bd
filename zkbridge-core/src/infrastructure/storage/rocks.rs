use crate::domain::{deposit, settlement, DepositRecord, DepositState, SettleStatus, SettlementRecord};
use crate::foundation::{BridgeError, TaskId};
use crate::infrastructure::storage::traits::{Result, TrackingStore};
use ethers::types::H256;
use log::{debug, info, trace};
use rocksdb::{ColumnFamily, Options as DbOptions, DB};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const CF_METADATA: &str = "metadata";
const CF_DEPOSIT: &str = "deposit";
const CF_SETTLEMENT: &str = "settlement";

const SCHEMA_VERSION: u32 = 1;

// Keys carry a short record-kind prefix so a raw dump of a column
// family stays readable.
fn key_deposit(tx_hash: &H256) -> Vec<u8> {
    [b"dep:".as_slice(), tx_hash.as_bytes()].concat()
}

fn key_settlement(task_id: &TaskId) -> Vec<u8> {
    [b"set:".as_slice(), task_id.as_bytes()].concat()
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(BridgeError::from)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(BridgeError::from)
}

/// RocksDB engine behind `TrackingStore`. Conditional updates
/// serialize the read-check-mutate-write cycle behind `write_lock`,
/// which makes `update_*_where` atomic with respect to other writers
/// in this process; cross-process exclusion comes from RocksDB's own
/// single-writer lock on the directory.
pub struct RocksStore {
    db: Arc<DB>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("opening RocksStore path={}", path.display());

        let mut opts = DbOptions::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let db = DB::open_cf(&opts, path, [CF_METADATA, CF_DEPOSIT, CF_SETTLEMENT])
            .map_err(|err| BridgeError::storage("rocksdb open", err))?;

        let store = Self { db: Arc::new(db), write_lock: Mutex::new(()) };
        store.check_schema_version()?;
        info!("RocksStore opened path={}", path.display());
        Ok(store)
    }

    fn check_schema_version(&self) -> Result<()> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, b"schema_version")? {
            None => {
                info!("initializing fresh store schema_version={}", SCHEMA_VERSION);
                self.db.put_cf(cf, b"schema_version", SCHEMA_VERSION.to_be_bytes())?;
                Ok(())
            }
            Some(bytes) if bytes.len() == 4 => {
                let array: [u8; 4] =
                    bytes.as_slice().try_into().map_err(|_| BridgeError::storage("schema", "corrupt schema version"))?;
                let version = u32::from_be_bytes(array);
                if version == SCHEMA_VERSION {
                    Ok(())
                } else {
                    Err(BridgeError::storage(
                        "schema",
                        format!("store schema version {} is not the supported {}", version, SCHEMA_VERSION),
                    ))
                }
            }
            Some(_) => Err(BridgeError::storage("schema", "corrupt schema version")),
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| BridgeError::storage("cf_handle", format!("missing column family: {}", name)))
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| BridgeError::storage("write_lock", "rocks write lock poisoned"))
    }

    fn get_deposit(&self, tx_hash: &H256) -> Result<Option<DepositRecord>> {
        let cf = self.cf_handle(CF_DEPOSIT)?;
        match self.db.get_cf(cf, key_deposit(tx_hash))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_deposit(&self, record: &DepositRecord) -> Result<()> {
        let cf = self.cf_handle(CF_DEPOSIT)?;
        self.db.put_cf(cf, key_deposit(&record.tx_hash), encode(record)?)?;
        Ok(())
    }

    fn get_settlement(&self, task_id: &TaskId) -> Result<Option<SettlementRecord>> {
        let cf = self.cf_handle(CF_SETTLEMENT)?;
        match self.db.get_cf(cf, key_settlement(task_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_settlement(&self, record: &SettlementRecord) -> Result<()> {
        let cf = self.cf_handle(CF_SETTLEMENT)?;
        self.db.put_cf(cf, key_settlement(&record.task_id), encode(record)?)?;
        Ok(())
    }
}

impl TrackingStore for RocksStore {
    fn find_deposit(&self, tx_hash: &H256) -> Result<Option<DepositRecord>> {
        trace!("find_deposit tx_hash={:#x}", tx_hash);
        self.get_deposit(tx_hash)
    }

    fn insert_deposit_if_absent(&self, record: &DepositRecord) -> Result<bool> {
        let _guard = self.lock_writes()?;
        if self.get_deposit(&record.tx_hash)?.is_some() {
            return Ok(false);
        }
        self.put_deposit(record)?;
        debug!("deposit record inserted tx_hash={:#x} state={}", record.tx_hash, record.state);
        Ok(true)
    }

    fn insert_or_get_deposit(&self, record: &DepositRecord) -> Result<DepositRecord> {
        let _guard = self.lock_writes()?;
        if let Some(existing) = self.get_deposit(&record.tx_hash)? {
            return Ok(existing);
        }
        self.put_deposit(record)?;
        debug!("deposit record inserted tx_hash={:#x} state={}", record.tx_hash, record.state);
        Ok(record.clone())
    }

    fn update_deposit_where(&self, tx_hash: &H256, expected: DepositState, mutate: &dyn Fn(&mut DepositRecord)) -> Result<bool> {
        let _guard = self.lock_writes()?;
        let Some(mut record) = self.get_deposit(tx_hash)? else {
            return Ok(false);
        };
        if record.state != expected {
            trace!("update_deposit_where skipped tx_hash={:#x} expected={} actual={}", tx_hash, expected, record.state);
            return Ok(false);
        }
        mutate(&mut record);
        deposit::ensure_valid_transition(tx_hash, expected, record.state)?;
        self.put_deposit(&record)?;
        Ok(true)
    }

    fn mark_deposit_completed(&self, tx_hash: &H256) -> Result<bool> {
        let _guard = self.lock_writes()?;
        let Some(mut record) = self.get_deposit(tx_hash)? else {
            return Ok(false);
        };
        if record.state == DepositState::Completed {
            return Ok(false);
        }
        deposit::ensure_valid_transition(tx_hash, record.state, DepositState::Completed)?;
        record.state = DepositState::Completed;
        self.put_deposit(&record)?;
        Ok(true)
    }

    fn find_settlement(&self, task_id: &TaskId) -> Result<Option<SettlementRecord>> {
        trace!("find_settlement task_id={}", task_id);
        self.get_settlement(task_id)
    }

    fn insert_settlement_if_absent(&self, record: &SettlementRecord) -> Result<bool> {
        let _guard = self.lock_writes()?;
        if self.get_settlement(&record.task_id)?.is_some() {
            return Ok(false);
        }
        self.put_settlement(record)?;
        debug!("settlement record inserted task_id={} status={}", record.task_id, record.status);
        Ok(true)
    }

    fn update_settlement_where(&self, task_id: &TaskId, expected: SettleStatus, mutate: &dyn Fn(&mut SettlementRecord)) -> Result<bool> {
        let _guard = self.lock_writes()?;
        let Some(mut record) = self.get_settlement(task_id)? else {
            return Ok(false);
        };
        if record.status != expected {
            trace!("update_settlement_where skipped task_id={} expected={} actual={}", task_id, expected, record.status);
            return Ok(false);
        }
        mutate(&mut record);
        settlement::ensure_valid_transition(task_id, expected, record.status)?;
        self.put_settlement(&record)?;
        Ok(true)
    }

    fn mark_settlement_confirmed(&self, task_id: &TaskId) -> Result<bool> {
        let _guard = self.lock_writes()?;
        let Some(mut record) = self.get_settlement(task_id)? else {
            return Ok(false);
        };
        if record.status == SettleStatus::Confirmed {
            return Ok(false);
        }
        settlement::ensure_valid_transition(task_id, record.status, SettleStatus::Confirmed)?;
        record.status = SettleStatus::Confirmed;
        self.put_settlement(&record)?;
        Ok(true)
    }

    fn health_check(&self) -> Result<()> {
        self.db.property_value("rocksdb.stats").map_err(|err| BridgeError::storage("health_check", err))?;
        Ok(())
    }
}
