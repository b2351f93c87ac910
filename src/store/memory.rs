use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ObjectStore, PutOptions, StoreError};

/// In-memory bucket with optional per-key put failures and a failing listing.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, PutOptions)>>,
    fail_puts: HashSet<String>,
    fail_list: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, body: &str) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), (body.as_bytes().to_vec(), PutOptions::JSON));
        self
    }

    pub fn failing_put(mut self, key: &str) -> Self {
        self.fail_puts.insert(key.to_string());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(b, _)| String::from_utf8_lossy(b).into_owned())
    }

    pub fn options(&self, key: &str) -> Option<PutOptions> {
        self.objects.lock().unwrap().get(key).map(|(_, o)| *o)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if self.fail_list {
            return Err(StoreError::List { bucket: "memory".into(), prefix: prefix.into(), reason: "access denied".into() });
        }
        Ok(self.keys().into_iter().filter(|k| k.starts_with(prefix)).collect())
    }

    async fn put(&self, key: &str, body: Vec<u8>, opts: PutOptions) -> Result<(), StoreError> {
        if self.fail_puts.contains(key) {
            return Err(StoreError::Put { bucket: "memory".into(), key: key.into(), reason: "service unavailable".into() });
        }
        self.objects.lock().unwrap().insert(key.to_string(), (body, opts));
        Ok(())
    }

    fn bucket(&self) -> &str {
        "memory"
    }
}
