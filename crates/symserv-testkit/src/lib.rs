//! In-memory fakes shared by the other crates' integration test suites.
//!
//! [`FakeOrigin`] stands in for the origin fetch and download stages: a map
//! of pre-loaded `.sym` bodies keyed the way the real fetcher keys them,
//! with a call counter so tests can assert "no fetch happened" when a
//! negative-cached module should mask a repeat lookup.

use std::collections::HashMap;
use std::sync::Mutex;

use symserv_core::DownloadKey;

pub struct FakeOrigin {
    bodies: Mutex<HashMap<DownloadKey, String>>,
    calls: Mutex<Vec<DownloadKey>>,
}

impl FakeOrigin {
    pub fn new() -> Self {
        FakeOrigin {
            bodies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_symbol_file(self, key: DownloadKey, body: impl Into<String>) -> Self {
        self.bodies.lock().unwrap().insert(key, body.into());
        self
    }

    /// Looks up `key`, recording the call whether or not it hits.
    pub fn fetch(&self, key: &DownloadKey) -> Option<String> {
        self.calls.lock().unwrap().push(key.clone());
        self.bodies.lock().unwrap().get(key).cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<DownloadKey> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeOrigin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debugid::DebugId;
    use std::str::FromStr;

    fn key() -> DownloadKey {
        DownloadKey::new(
            "firefox.pdb",
            DebugId::from_str("abcd1234-abcd-1234-abcd-abcd12345678-a").unwrap(),
            "firefox.sym",
        )
    }

    #[test]
    fn returns_preloaded_body_and_counts_the_call() {
        let origin = FakeOrigin::new().with_symbol_file(key(), "PUBLIC 1000 0 f\n");
        assert_eq!(origin.fetch(&key()), Some("PUBLIC 1000 0 f\n".to_string()));
        assert_eq!(origin.call_count(), 1);
    }

    #[test]
    fn missing_key_returns_none_but_still_counts() {
        let origin = FakeOrigin::new();
        assert_eq!(origin.fetch(&key()), None);
        assert_eq!(origin.call_count(), 1);
    }
}
