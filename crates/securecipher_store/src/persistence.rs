//! Append-only storage for co-signed transactions using fjall database

use crate::users::UserRegistry;
use crate::{unix_now, StoreError};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use securecipher_core::codec::decode_public_key;
use securecipher_core::{CoSignedTransaction, EcdsaP384Verifier};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Status recorded for every co-signed transaction
pub const STATUS_AUTHORIZED: &str = "authorized";

/// Persisted form of a co-signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: String,
    /// Username of the registered client that signed the payload
    pub sender: String,
    pub status: String,
    pub created_at: u64,
    pub transaction: CoSignedTransaction,
}

/// Keyspace holding the transaction and user partitions
pub struct Database {
    transactions: TransactionStore,
    users: UserRegistry,
}

impl Database {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let keyspace = Config::new(path).open()?;
        let transactions = TransactionStore::open(&keyspace)?;
        let users = UserRegistry::open(&keyspace)?;
        Ok(Self {
            transactions,
            users,
        })
    }

    pub fn transactions(&self) -> &TransactionStore {
        &self.transactions
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    /// Store a co-signed transaction on behalf of a registered user.
    ///
    /// The record's client key must be the key the user registered.
    pub fn record_transaction(
        &self,
        username: &str,
        transaction: &CoSignedTransaction,
    ) -> Result<StoredTransaction, StoreError> {
        let user = self
            .users
            .get_by_username(username)?
            .ok_or_else(|| StoreError::UnknownUser(username.to_string()))?;

        let registered = decode_public_key(&user.public_key);
        let presented = decode_public_key(transaction.client_key());
        match (registered, presented) {
            (Ok(registered), Ok(presented)) if registered == presented => {}
            _ => {
                tracing::debug!(username, "client key does not match the registered key");
                return Err(StoreError::KeyMismatch(username.to_string()));
            }
        }

        self.transactions.append(username, transaction)
    }
}

/// Co-signed transactions keyed by record id. Records are never updated or removed.
pub struct TransactionStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    append_lock: Mutex<()>,
}

impl TransactionStore {
    pub(crate) fn open(keyspace: &Keyspace) -> Result<Self, StoreError> {
        let partition =
            keyspace.open_partition("transactions", PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            partition,
            append_lock: Mutex::new(()),
        })
    }

    /// Persist a record after re-checking both signatures.
    ///
    /// An id that is already present is a replay.
    pub fn append(
        &self,
        sender: &str,
        transaction: &CoSignedTransaction,
    ) -> Result<StoredTransaction, StoreError> {
        let id = transaction.id();
        if !transaction.verify_signatures(&EcdsaP384Verifier) {
            tracing::warn!(id = %id, "refusing to store transaction with invalid signatures");
            return Err(StoreError::InvalidSignatures(id));
        }

        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.partition.contains_key(id.as_bytes())? {
            tracing::warn!(id = %id, "refusing to overwrite stored transaction");
            return Err(StoreError::Duplicate(id));
        }

        let stored = StoredTransaction {
            id: id.clone(),
            sender: sender.to_string(),
            status: STATUS_AUTHORIZED.to_string(),
            created_at: unix_now()?,
            transaction: transaction.clone(),
        };

        self.partition
            .insert(id.as_bytes(), serde_json::to_vec(&stored)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;

        tracing::info!(id = %id, "stored co-signed transaction");
        Ok(stored)
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredTransaction>, StoreError> {
        match self.partition.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// All records, oldest first
    pub fn list(&self) -> Result<Vec<StoredTransaction>, StoreError> {
        let mut records = Vec::new();
        for item in self.partition.iter() {
            let (_key, value) = item?;
            records.push(serde_json::from_slice::<StoredTransaction>(&value)?);
        }
        records.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(records)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.partition.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.partition.is_empty()?)
    }
}
