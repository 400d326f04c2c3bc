#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use wallet_router::backend::{KeystoreBackend, WalletBackend};
use wallet_router::error::{Result, WalletError};
use wallet_router::model::{Address, KeyInfo, KeyType, MsgMeta, SigType, Signature};

/// Shared call log, so tests can assert the order in which backends were consulted.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Entries for one operation only, eg. `"has"`.
    pub fn calls(&self, op: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.split(['.', '(']).nth(1) == Some(op))
            .collect()
    }
}

#[derive(Default)]
struct Faults {
    has: bool,
    list: bool,
    delete: bool,
    ignored_deletes: u32,
    export_unsupported: bool,
}

/// In-memory backend recording every call into a [`Journal`].
pub struct MockWallet {
    name: &'static str,
    journal: Journal,
    keys: Mutex<Vec<Address>>,
    faults: Mutex<Faults>,
    passphrase: Mutex<String>,
    locked: Mutex<bool>,
    created: Mutex<u32>,
}

impl MockWallet {
    pub fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name,
            journal: journal.clone(),
            keys: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            passphrase: Mutex::new(String::new()),
            locked: Mutex::new(false),
            created: Mutex::new(0),
        })
    }

    pub fn with_keys(name: &'static str, journal: &Journal, keys: &[&str]) -> Arc<Self> {
        let wallet = Self::new(name, journal);
        for key in keys {
            wallet.insert(key);
        }
        wallet
    }

    pub fn insert(&self, address: &str) {
        self.keys.lock().unwrap().push(Address::from(address));
    }

    pub fn holds(&self, address: &str) -> bool {
        self.keys.lock().unwrap().contains(&Address::from(address))
    }

    pub fn fail_has(&self) {
        self.faults.lock().unwrap().has = true;
    }

    pub fn fail_list(&self) {
        self.faults.lock().unwrap().list = true;
    }

    pub fn fail_delete(&self) {
        self.faults.lock().unwrap().delete = true;
    }

    /// Delete always reports success but keeps the key.
    pub fn sticky_delete(&self) {
        self.lagging_delete(u32::MAX);
    }

    /// The first `count` deletes report success but keep the key.
    pub fn lagging_delete(&self, count: u32) {
        self.faults.lock().unwrap().ignored_deletes = count;
    }

    pub fn refuse_export(&self) {
        self.faults.lock().unwrap().export_unsupported = true;
    }

    fn log(&self, op: &str, arg: impl std::fmt::Display) {
        self.journal.record(format!("{}.{}({})", self.name, op, arg));
    }

    fn failure(&self, op: &str) -> WalletError {
        WalletError::backend(format!("{} {} failed", self.name, op))
    }
}

impl WalletBackend for MockWallet {
    fn create(&self, key_type: KeyType) -> Result<Address> {
        self.log("create", key_type);
        let mut created = self.created.lock().unwrap();
        *created += 1;
        let address = Address::new(format!("{}-{}", self.name, *created));
        self.keys.lock().unwrap().push(address.clone());
        Ok(address)
    }

    fn has(&self, address: &Address) -> Result<bool> {
        self.log("has", address);
        if self.faults.lock().unwrap().has {
            return Err(self.failure("has"));
        }
        Ok(self.keys.lock().unwrap().contains(address))
    }

    fn list(&self) -> Result<Vec<Address>> {
        self.log("list", "");
        if self.faults.lock().unwrap().list {
            return Err(self.failure("list"));
        }
        Ok(self.keys.lock().unwrap().clone())
    }

    fn sign(&self, address: &Address, message: &[u8], _meta: &MsgMeta) -> Result<Signature> {
        self.log("sign", address);
        if !self.keys.lock().unwrap().contains(address) {
            return Err(WalletError::KeyNotFound(address.clone()));
        }
        Ok(Signature {
            sig_type: SigType::Secp256k1,
            data: [self.name.as_bytes(), message].concat(),
        })
    }

    fn export(&self, address: &Address, _passphrase: &str) -> Result<KeyInfo> {
        self.log("export", address);
        if self.faults.lock().unwrap().export_unsupported {
            return Err(WalletError::Unsupported(format!(
                "{} does not export keys",
                self.name
            )));
        }
        Ok(KeyInfo::new(KeyType::Secp256k1, self.name.as_bytes()))
    }

    fn import(&self, info: &KeyInfo) -> Result<Address> {
        self.log("import", info.key_type);
        let address = Address::new(format!("{}-{}", self.name, hex::encode(&info.private_key)));
        self.keys.lock().unwrap().push(address.clone());
        Ok(address)
    }

    fn delete(&self, address: &Address, _passphrase: &str) -> Result<()> {
        self.log("delete", address);
        let mut faults = self.faults.lock().unwrap();
        if faults.delete {
            return Err(self.failure("delete"));
        }
        if faults.ignored_deletes > 0 {
            faults.ignored_deletes -= 1;
        } else {
            self.keys.lock().unwrap().retain(|key| key != address);
        }
        Ok(())
    }
}

impl KeystoreBackend for MockWallet {
    fn change_passphrase(&self, new_passphrase: &str) -> Result<bool> {
        self.log("change_passphrase", "");
        *self.passphrase.lock().unwrap() = new_passphrase.to_string();
        Ok(true)
    }

    fn clear_passphrase(&self) -> Result<bool> {
        self.log("clear_passphrase", "");
        let mut passphrase = self.passphrase.lock().unwrap();
        let had = !passphrase.is_empty();
        passphrase.clear();
        Ok(had)
    }

    fn is_locked(&self) -> Result<bool> {
        self.log("is_locked", "");
        Ok(*self.locked.lock().unwrap())
    }

    fn lock(&self) -> Result<()> {
        self.log("lock", "");
        *self.locked.lock().unwrap() = true;
        Ok(())
    }

    fn unlock(&self, passphrase: &str) -> Result<()> {
        self.log("unlock", "");
        if *self.passphrase.lock().unwrap() != passphrase {
            return Err(WalletError::backend("invalid passphrase"));
        }
        *self.locked.lock().unwrap() = false;
        Ok(())
    }

    fn sign_with_passphrase(
        &self,
        address: &Address,
        message: &[u8],
        _passphrase: &str,
    ) -> Result<Signature> {
        self.log("sign_with_passphrase", address);
        Ok(Signature {
            sig_type: SigType::Secp256k1,
            data: message.to_vec(),
        })
    }

    fn remove_key(&self, address: &Address) -> Result<bool> {
        self.log("remove_key", address);
        let mut keys = self.keys.lock().unwrap();
        let before = keys.len();
        keys.retain(|key| key != address);
        Ok(keys.len() != before)
    }
}
