// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `CacheClient` trait default implementations.

use std::collections::HashMap;
use std::time::Duration;

use cachegate_client::{CacheClient, Error, ErrorKind, Expiry, KeyIter, Lock, LockOptions, Result, Ttl, Version};
use parking_lot::Mutex;

/// Minimal client that only provides required methods and keeps integers.
struct CounterClient {
    data: Mutex<HashMap<String, i64>>,
}

impl CounterClient {
    fn with(key: &str, value: i64) -> Self {
        Self {
            data: Mutex::new(HashMap::from([(key.to_string(), value)])),
        }
    }
}

impl CacheClient<i64> for CounterClient {
    fn add(&self, key: &str, value: i64, _expiry: Expiry, _version: Option<Version>) -> Result<bool> {
        let mut data = self.data.lock();
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), value);
        Ok(true)
    }

    fn set(&self, key: &str, value: i64, _expiry: Expiry, _version: Option<Version>) -> Result<bool> {
        self.data.lock().insert(key.to_string(), value);
        Ok(true)
    }

    fn set_many(&self, entries: HashMap<String, i64>, _expiry: Expiry, _version: Option<Version>) -> Result<()> {
        self.data.lock().extend(entries);
        Ok(())
    }

    fn get(&self, key: &str, _version: Option<Version>) -> Result<Option<i64>> {
        Ok(self.data.lock().get(key).copied())
    }

    fn get_many(&self, keys: &[&str], _version: Option<Version>) -> Result<HashMap<String, i64>> {
        let data = self.data.lock();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| ((*key).to_string(), *value)))
            .collect())
    }

    fn delete(&self, key: &str, _version: Option<Version>) -> Result<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn delete_pattern(&self, _pattern: &str, _version: Option<Version>) -> Result<u64> {
        Err(Error::unsupported("delete_pattern"))
    }

    fn delete_many(&self, keys: &[&str], version: Option<Version>) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key, version)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        self.data.lock().clear();
        Ok(())
    }

    fn keys(&self, _pattern: &str, _version: Option<Version>) -> Result<Vec<String>> {
        Ok(self.data.lock().keys().cloned().collect())
    }

    fn iter_keys(&self, pattern: &str, version: Option<Version>) -> Result<KeyIter> {
        Ok(KeyIter::from_keys(self.keys(pattern, version)?))
    }

    fn has_key(&self, key: &str, _version: Option<Version>) -> Result<bool> {
        Ok(self.data.lock().contains_key(key))
    }

    fn lock(&self, _key: &str, _options: LockOptions) -> Result<Lock> {
        Err(Error::unsupported("lock"))
    }

    fn incr(&self, key: &str, delta: i64, _version: Option<Version>) -> Result<i64> {
        let mut data = self.data.lock();
        let value = data
            .get_mut(key)
            .ok_or_else(|| Error::invalid_usage(format!("key '{key}' not found")))?;
        *value += delta;
        Ok(*value)
    }

    fn incr_version(&self, _key: &str, _delta: i32, _version: Option<Version>) -> Result<Version> {
        Err(Error::unsupported("incr_version"))
    }

    fn ttl(&self, key: &str, version: Option<Version>) -> Result<Ttl> {
        Ok(if self.has_key(key, version)? { Ttl::Persistent } else { Ttl::Missing })
    }

    fn persist(&self, key: &str, version: Option<Version>) -> Result<bool> {
        self.has_key(key, version)
    }

    fn expire(&self, key: &str, _timeout: Duration, version: Option<Version>) -> Result<bool> {
        self.has_key(key, version)
    }
}

#[test]
fn decr_subtracts_through_incr() {
    let client = CounterClient::with("hits", 10);
    assert_eq!(client.decr("hits", 3, None).unwrap(), 7);
    assert_eq!(client.get("hits", None).unwrap(), Some(7));
}

#[test]
fn decr_rejects_unnegatable_delta() {
    let client = CounterClient::with("hits", 10);
    let error = client.decr("hits", i64::MIN, None).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidUsage);
    assert_eq!(client.get("hits", None).unwrap(), Some(10));
}

#[test]
fn decr_propagates_missing_key() {
    let client = CounterClient::with("hits", 10);
    assert_eq!(client.decr("misses", 1, None).unwrap_err().kind(), ErrorKind::InvalidUsage);
}

#[test]
fn raw_connection_is_unsupported_by_default() {
    let client = CounterClient::with("hits", 1);
    assert!(client.raw_connection_provider().is_none());
}

#[test]
fn client_is_usable_as_trait_object() {
    let client: Box<dyn CacheClient<i64>> = Box::new(CounterClient::with("a", 1));
    assert!(client.add("b", 2, Expiry::Never, None).unwrap());
    assert!(!client.add("b", 3, Expiry::Never, None).unwrap());
    assert_eq!(client.get_many(&["a", "b", "c"], None).unwrap().len(), 2);
    assert_eq!(client.delete_many(&["a", "c"], None).unwrap(), 1);
    assert_eq!(client.ttl("a", None).unwrap(), Ttl::Missing);
    assert_eq!(client.lock("job", LockOptions::new()).unwrap_err().kind(), ErrorKind::Unsupported);
}
