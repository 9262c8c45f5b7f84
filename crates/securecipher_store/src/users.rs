//! User registration and virtual account numbers

use crate::{unix_now, StoreError};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use securecipher_core::{EncodedPublicKey, KeyValidator, P384KeyValidator};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Prefix of every virtual account number
pub const ACCOUNT_PREFIX: &str = "VX-";

const MAX_PHONE_LEN: usize = 11;
const MAX_NAME_LEN: usize = 150;
/// BVN and NIN are both 11-digit identity numbers
const IDENTITY_NUMBER_LEN: usize = 11;

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub bvn: String,
    pub nin: String,
    pub public_key: EncodedPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub bvn: String,
    pub nin: String,
    pub public_key: EncodedPublicKey,
    pub virtual_account_id: String,
    pub registered_at: u64,
}

/// `VX-` followed by the phone number without its leading zeros
pub fn virtual_account_id(phone_number: &str) -> Result<String, StoreError> {
    if phone_number.is_empty()
        || phone_number.len() > MAX_PHONE_LEN
        || !phone_number.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(StoreError::InvalidPhone);
    }

    let significant = phone_number.trim_start_matches('0');
    if significant.is_empty() {
        return Err(StoreError::InvalidPhone);
    }

    Ok(format!("{ACCOUNT_PREFIX}{significant}"))
}

/// Registered users keyed by username.
///
/// `accounts` maps account numbers to usernames. `emails`, `bvns` and `nins`
/// only hold keys and enforce uniqueness.
pub struct UserRegistry {
    keyspace: Keyspace,
    users: PartitionHandle,
    accounts: PartitionHandle,
    emails: PartitionHandle,
    bvns: PartitionHandle,
    nins: PartitionHandle,
    register_lock: Mutex<()>,
}

impl UserRegistry {
    pub(crate) fn open(keyspace: &Keyspace) -> Result<Self, StoreError> {
        let users = keyspace.open_partition("users", PartitionCreateOptions::default())?;
        let accounts = keyspace.open_partition("accounts", PartitionCreateOptions::default())?;
        let emails = keyspace.open_partition("emails", PartitionCreateOptions::default())?;
        let bvns = keyspace.open_partition("bvns", PartitionCreateOptions::default())?;
        let nins = keyspace.open_partition("nins", PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            users,
            accounts,
            emails,
            bvns,
            nins,
            register_lock: Mutex::new(()),
        })
    }

    /// Register a user and assign the virtual account number.
    ///
    /// The registered key must be a valid P-384 key; it is the key later
    /// passed to the authorizer for this user's transactions.
    pub fn register(&self, user: NewUser) -> Result<RegisteredUser, StoreError> {
        validate_fields(&user)?;
        if !P384KeyValidator.validate(&user.public_key) {
            return Err(StoreError::InvalidPublicKey);
        }
        let account_id = virtual_account_id(&user.phone_number)?;
        let email_key = user.email.to_ascii_lowercase();

        let _guard = self
            .register_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let unique = [
            (&self.users, user.username.as_str(), "username"),
            (&self.accounts, account_id.as_str(), "account"),
            (&self.emails, email_key.as_str(), "email"),
            (&self.bvns, user.bvn.as_str(), "bvn"),
            (&self.nins, user.nin.as_str(), "nin"),
        ];
        for (partition, key, field) in unique {
            if partition.contains_key(key.as_bytes())? {
                return Err(StoreError::DuplicateUser(field));
            }
        }

        let registered = RegisteredUser {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            phone_number: user.phone_number,
            bvn: user.bvn,
            nin: user.nin,
            public_key: user.public_key,
            virtual_account_id: account_id,
            registered_at: unix_now()?,
        };

        let mut batch = self.keyspace.batch();
        batch.insert(
            &self.users,
            registered.username.as_bytes(),
            serde_json::to_vec(&registered)?,
        );
        batch.insert(
            &self.accounts,
            registered.virtual_account_id.as_bytes(),
            registered.username.as_bytes(),
        );
        batch.insert(&self.emails, email_key.as_bytes(), registered.username.as_bytes());
        batch.insert(&self.bvns, registered.bvn.as_bytes(), registered.username.as_bytes());
        batch.insert(&self.nins, registered.nin.as_bytes(), registered.username.as_bytes());
        batch.commit()?;

        tracing::info!(
            username = %registered.username,
            account = %registered.virtual_account_id,
            "registered user"
        );
        Ok(registered)
    }

    pub fn get_by_username(&self, username: &str) -> Result<Option<RegisteredUser>, StoreError> {
        match self.users.get(username.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_account(&self, account_id: &str) -> Result<Option<RegisteredUser>, StoreError> {
        match self.accounts.get(account_id.as_bytes())? {
            Some(username) => {
                let username = String::from_utf8_lossy(&username);
                self.get_by_username(&username)
            }
            None => Ok(None),
        }
    }
}

fn validate_fields(user: &NewUser) -> Result<(), StoreError> {
    if user.username.is_empty() || user.username.chars().count() > MAX_NAME_LEN {
        return Err(StoreError::InvalidField("username"));
    }
    if user.full_name.is_empty() || user.full_name.chars().count() > MAX_NAME_LEN {
        return Err(StoreError::InvalidField("full_name"));
    }
    match user.email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(StoreError::InvalidField("email")),
    }
    if !is_identity_number(&user.bvn) {
        return Err(StoreError::InvalidField("bvn"));
    }
    if !is_identity_number(&user.nin) {
        return Err(StoreError::InvalidField("nin"));
    }
    Ok(())
}

fn is_identity_number(value: &str) -> bool {
    value.len() == IDENTITY_NUMBER_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use securecipher_core::issue_keypair;
    use tempfile::TempDir;

    fn new_user(username: &str, phone: &str, id_seed: u64) -> NewUser {
        let (_, public_key) = issue_keypair().unwrap();
        NewUser {
            username: username.to_string(),
            full_name: "Paul Adeyemi".to_string(),
            email: format!("{username}@example.com"),
            phone_number: phone.to_string(),
            bvn: format!("{:011}", 22_000_000_000 + id_seed),
            nin: format!("{:011}", 33_000_000_000 + id_seed),
            public_key,
        }
    }

    #[test]
    fn test_virtual_account_id() {
        assert_eq!(virtual_account_id("08012345678").unwrap(), "VX-8012345678");
        assert_eq!(virtual_account_id("0008012").unwrap(), "VX-8012");
        assert_eq!(virtual_account_id("8012345678").unwrap(), "VX-8012345678");

        for bad in ["", "0000", "080-1234", "080123456789", "+2348012"] {
            assert!(virtual_account_id(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();

        let user = db.users().register(new_user("paul", "08012345678", 1)).unwrap();
        assert_eq!(user.virtual_account_id, "VX-8012345678");
        assert_eq!(user.bvn, "22000000001");
        assert_eq!(user.nin, "33000000001");

        let by_name = db.users().get_by_username("paul").unwrap().unwrap();
        assert_eq!(by_name, user);
        let by_account = db.users().get_by_account("VX-8012345678").unwrap().unwrap();
        assert_eq!(by_account, user);
        assert!(db.users().get_by_account("VX-1").unwrap().is_none());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        db.users().register(new_user("paul", "08012345678", 1)).unwrap();

        let same_name = db.users().register(new_user("paul", "08099999999", 2));
        assert!(matches!(same_name, Err(StoreError::DuplicateUser("username"))));

        // a leading zero does not make a different account
        let same_account = db.users().register(new_user("ada", "8012345678", 2));
        assert!(matches!(same_account, Err(StoreError::DuplicateUser("account"))));

        let mut same_email = new_user("ada", "08099999999", 2);
        same_email.email = "PAUL@example.com".to_string();
        assert!(matches!(
            db.users().register(same_email),
            Err(StoreError::DuplicateUser("email"))
        ));

        let mut same_bvn = new_user("ada", "08099999999", 2);
        same_bvn.bvn = "22000000001".to_string();
        assert!(matches!(
            db.users().register(same_bvn),
            Err(StoreError::DuplicateUser("bvn"))
        ));

        let mut same_nin = new_user("ada", "08099999999", 2);
        same_nin.nin = "33000000001".to_string();
        assert!(matches!(
            db.users().register(same_nin),
            Err(StoreError::DuplicateUser("nin"))
        ));

        // none of the refused attempts left index entries behind
        db.users().register(new_user("ada", "08099999999", 2)).unwrap();
    }

    #[test]
    fn test_register_rejects_invalid_identity_numbers() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();

        for bad in ["", "2200000000", "220000000011", "2200000000a"] {
            let mut user = new_user("paul", "08012345678", 1);
            user.bvn = bad.to_string();
            assert!(matches!(
                db.users().register(user),
                Err(StoreError::InvalidField("bvn"))
            ));

            let mut user = new_user("paul", "08012345678", 1);
            user.nin = bad.to_string();
            assert!(matches!(
                db.users().register(user),
                Err(StoreError::InvalidField("nin"))
            ));
        }
    }

    #[test]
    fn test_register_rejects_invalid_key() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let mut user = new_user("paul", "08012345678", 1);
        user.public_key.y = user.public_key.x.clone();

        assert!(matches!(
            db.users().register(user),
            Err(StoreError::InvalidPublicKey)
        ));
    }

    #[test]
    fn test_register_rejects_bad_email() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let mut user = new_user("paul", "08012345678", 1);
        user.email = "paul.example.com".to_string();

        assert!(matches!(
            db.users().register(user),
            Err(StoreError::InvalidField("email"))
        ));
    }
}
