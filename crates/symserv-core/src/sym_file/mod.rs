//! Component E's output type and (de)serialization, plus the streaming
//! parser itself in [`parser`].

pub mod parser;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `offset -> name`, paired with the sorted ascending offset list needed for
/// floor lookups. An empty table is the negative sentinel: "we tried, there
/// was nothing (or nothing usable) here".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    by_offset: HashMap<u64, String>,
    sorted_offsets: Vec<u64>,
}

impl OffsetTable {
    pub fn empty() -> Self {
        OffsetTable::default()
    }

    pub fn from_map(by_offset: HashMap<u64, String>) -> Self {
        let mut sorted_offsets: Vec<u64> = by_offset.keys().copied().collect();
        sorted_offsets.sort_unstable();
        OffsetTable {
            by_offset,
            sorted_offsets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// Exact hit, if any.
    pub fn get(&self, offset: u64) -> Option<&str> {
        self.by_offset.get(&offset).map(String::as_str)
    }

    /// The name for `offset`, by exact match if present, else by floor
    /// lookup (the greatest known offset `<= offset`). `None` if the table
    /// is empty or `offset` is smaller than every known offset.
    pub fn resolve(&self, offset: u64) -> Option<&str> {
        if let Some(name) = self.get(offset) {
            return Some(name);
        }
        if self.sorted_offsets.is_empty() {
            return None;
        }
        match self.sorted_offsets.partition_point(|&o| o <= offset) {
            0 => None,
            n => self.get(self.sorted_offsets[n - 1]),
        }
    }

    pub fn sorted_offsets(&self) -> &[u64] {
        &self.sorted_offsets
    }

    /// Compact binary encoding used to store the table in component D.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut pairs: Vec<(u64, &str)> = self
            .by_offset
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        pairs.sort_unstable_by_key(|(k, _)| *k);
        bincode::serialize(&pairs)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        let pairs: Vec<(u64, String)> = bincode::deserialize(bytes)?;
        Ok(OffsetTable::from_map(pairs.into_iter().collect()))
    }
}

/// Serde support for the offset table itself (used by integration tests that
/// round-trip a table through JSON fixtures).
impl Serialize for OffsetTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.by_offset.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OffsetTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let by_offset = HashMap::<u64, String>::deserialize(deserializer)?;
        Ok(OffsetTable::from_map(by_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OffsetTable {
        let mut m = HashMap::new();
        m.insert(0x1000, "a".to_string());
        m.insert(0x2000, "b".to_string());
        m.insert(0x3000, "c".to_string());
        OffsetTable::from_map(m)
    }

    #[test]
    fn exact_hit_beats_floor() {
        let t = sample();
        assert_eq!(t.resolve(0x2000), Some("b"));
    }

    #[test]
    fn floor_lookup_finds_predecessor() {
        let t = sample();
        assert_eq!(t.resolve(0x2500), Some("b"));
    }

    #[test]
    fn below_minimum_offset_is_none() {
        let t = sample();
        assert_eq!(t.resolve(0x500), None);
    }

    #[test]
    fn empty_table_resolves_nothing() {
        assert_eq!(OffsetTable::empty().resolve(0x1000), None);
    }

    #[test]
    fn bytes_round_trip() {
        let t = sample();
        let bytes = t.to_bytes().unwrap();
        let back = OffsetTable::from_bytes(&bytes).unwrap();
        assert_eq!(t, back);
    }
}
