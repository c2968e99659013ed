//! JSON request/response shapes for the symbolication HTTP boundary.
//!
//! The wire format uses tuples of primitives for frames and module
//! descriptors; this module tags them into typed variants at the boundary
//! (`Frame::Unmapped` / `Frame::Mapped`) instead of threading untyped tuples
//! through the engine.

use std::str::FromStr;

use debugid::DebugId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolicationRequest {
    pub version: u32,
    #[serde(rename = "memoryMap")]
    pub memory_map: Vec<(String, String)>,
    pub stacks: Vec<Vec<(i64, Value)>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub debug_file: String,
    pub debug_id: DebugId,
}

/// A decoded stack frame: a reference into `memoryMap`, or a bare offset
/// with no known owning module.
#[derive(Debug, Clone)]
pub enum Frame {
    Mapped { module_index: usize, offset: u64 },
    Unmapped(Value),
}

#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("version must be 4, got {0}")]
    UnsupportedVersion(u32),
    #[error("memoryMap entry {0} has a malformed debug id {1:?}")]
    MalformedDebugId(usize, String),
    #[error("stack {0} frame {1} references module_index {2}, but memoryMap has {3} entries")]
    ModuleIndexOutOfRange(usize, usize, i64, usize),
    #[error("stack {0} frame {1} has module_index >= 0 but a non-integer offset")]
    NonIntegerMappedOffset(usize, usize),
}

/// A request decoded and validated at the boundary, ready for the engine.
pub struct DecodedRequest {
    pub modules: Vec<ModuleDescriptor>,
    pub stacks: Vec<Vec<Frame>>,
}

pub fn decode(raw: SymbolicationRequest) -> Result<DecodedRequest, RequestError> {
    if raw.version != 4 {
        return Err(RequestError::UnsupportedVersion(raw.version));
    }

    let modules = raw
        .memory_map
        .into_iter()
        .enumerate()
        .map(|(index, (debug_file, debug_id_raw))| {
            DebugId::from_str(&debug_id_raw)
                .or_else(|_| DebugId::from_breakpad(&debug_id_raw))
                .map(|debug_id| ModuleDescriptor { debug_file, debug_id })
                .map_err(|_| RequestError::MalformedDebugId(index, debug_id_raw))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stacks = raw
        .stacks
        .into_iter()
        .enumerate()
        .map(|(stack_index, frames)| {
            frames
                .into_iter()
                .enumerate()
                .map(|(frame_index, (module_index, offset))| {
                    if module_index < 0 {
                        return Ok(Frame::Unmapped(offset));
                    }
                    let module_index = module_index as usize;
                    if module_index >= modules.len() {
                        return Err(RequestError::ModuleIndexOutOfRange(
                            stack_index,
                            frame_index,
                            module_index as i64,
                            modules.len(),
                        ));
                    }
                    let offset = offset.as_u64().ok_or(RequestError::NonIntegerMappedOffset(
                        stack_index,
                        frame_index,
                    ))?;
                    Ok(Frame::Mapped { module_index, offset })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedRequest { modules, stacks })
}

/// Renders an unmapped frame's raw offset: hex if it parses as a
/// non-negative integer, otherwise its own string form.
pub fn render_raw_offset(value: &Value) -> String {
    match value.as_u64() {
        Some(n) => format!("0x{n:x}"),
        None => match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolicationResponse {
    #[serde(rename = "symbolicatedStacks")]
    pub symbolicated_stacks: Vec<Vec<String>>,
    #[serde(rename = "knownModules")]
    pub known_modules: Vec<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugInfo {
    pub total_time: f64,
    pub cache_lookup_time: f64,
    pub downloads: DownloadStats,
    pub modules: Vec<ModuleDebugInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadStats {
    pub count: usize,
    pub bytes: u64,
    pub time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleDebugInfo {
    pub debug_file: String,
    pub debug_id: String,
    pub stack_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SymbolicationRequest {
        SymbolicationRequest {
            version: 4,
            memory_map: vec![(
                "firefox.pdb".to_string(),
                "C617B8AF472444AD952D19A0CFD7C8F72".to_string(),
            )],
            stacks: vec![vec![(0, Value::from(154348)), (-1, Value::from(99))]],
        }
    }

    #[test]
    fn decodes_mapped_and_unmapped_frames() {
        let decoded = decode(sample()).unwrap();
        assert_eq!(decoded.modules.len(), 1);
        match &decoded.stacks[0][0] {
            Frame::Mapped { module_index, offset } => {
                assert_eq!(*module_index, 0);
                assert_eq!(*offset, 154348);
            }
            other => panic!("expected Mapped, got {other:?}"),
        }
        assert!(matches!(decoded.stacks[0][1], Frame::Unmapped(_)));
    }

    #[test]
    fn rejects_non_version_4() {
        let mut raw = sample();
        raw.version = 3;
        assert!(matches!(
            decode(raw),
            Err(RequestError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn rejects_out_of_range_module_index() {
        let mut raw = sample();
        raw.stacks = vec![vec![(5, Value::from(1))]];
        assert!(matches!(
            decode(raw),
            Err(RequestError::ModuleIndexOutOfRange(0, 0, 5, 1))
        ));
    }

    #[test]
    fn render_raw_offset_formats_integers_as_hex() {
        assert_eq!(render_raw_offset(&Value::from(255)), "0xff");
    }

    #[test]
    fn render_raw_offset_falls_back_to_string_form() {
        assert_eq!(render_raw_offset(&Value::from("weird")), "weird");
    }
}
