use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Failures raised by the document store. `Backend` covers the key-value
/// engine itself; `Codec` means a document exists but no longer parses.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key-value backend: {0}")]
    Backend(String),
    #[error("corrupt document at {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Object-safe surface of the document store: whole-document reads and
/// writes keyed by string. Every entity lives in its own document, so
/// concurrent handlers only contend on read-modify-write of single keys.
pub trait DocumentStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// JSON codec layered over the raw byte interface.
pub trait DocumentStoreExt: DocumentStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Codec {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Codec {
            key: key.to_string(),
            source,
        })?;
        self.set(key, &bytes)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// In-memory backend used by the native binary and the test suite.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("poisoned store lock".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains_key(key))
    }
}

/// Spin key-value backend, available inside the component sandbox.
#[cfg(target_arch = "wasm32")]
pub struct SpinStore(spin_sdk::key_value::Store);

#[cfg(target_arch = "wasm32")]
impl SpinStore {
    pub fn open_default() -> Result<Self, StoreError> {
        spin_sdk::key_value::Store::open_default()
            .map(Self)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
impl DocumentStore for SpinStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.0.get(key).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.0
            .set(key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.0
            .delete(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.0
            .exists(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_and_delete() {
        let store = MemoryStore::new();
        store.set_json("k", &vec!["a".to_string()]).unwrap();
        let got: Option<Vec<String>> = store.get_json("k").unwrap();
        assert_eq!(got, Some(vec!["a".to_string()]));
        assert!(store.exists("k").unwrap());

        store.delete("k").unwrap();
        assert!(!store.exists("k").unwrap());
        let gone: Option<Vec<String>> = store.get_json("k").unwrap();
        assert!(gone.is_none());
    }

    #[test]
    fn corrupt_document_reports_key() {
        let store = MemoryStore::new();
        store.set("bad", b"{not json").unwrap();
        let err = store.get_json::<Vec<String>>("bad").unwrap_err();
        assert!(err.to_string().contains("bad"));
    }
}
