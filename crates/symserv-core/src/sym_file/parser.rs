//! Streaming parser for Breakpad-style `.sym` text files.
//!
//! Only `PUBLIC` and `FUNC` records are recognised -- this service only
//! needs offset-to-name resolution, not the full CFI/line-table grammar a
//! stack-walking implementation would also need.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::error::SymbolError;
use crate::sym_file::OffsetTable;

/// Result of parsing one symbol file.
pub struct ParseOutcome {
    pub table: OffsetTable,
    /// Approximate input size: sum of line lengths plus one newline byte each.
    pub bytes_read: u64,
    pub elapsed: Duration,
    pub warnings: u64,
}

/// Parses a line-oriented byte stream into an [`OffsetTable`].
///
/// `PUBLIC` and `FUNC` lines share the offset space; when both describe the
/// same offset, `PUBLIC` wins, matching a `func_symbols.update(public_symbols)`
/// merge order -- the rationale is lost to history but the behaviour is kept.
pub async fn parse_stream<S>(stream: S) -> Result<ParseOutcome, SymbolError>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let started = Instant::now();
    let mut reader = StreamReader::new(stream).lines();

    let mut func: HashMap<u64, String> = HashMap::new();
    let mut public: HashMap<u64, String> = HashMap::new();
    let mut bytes_read: u64 = 0;
    let mut warnings: u64 = 0;
    let mut line_number: u64 = 0;

    while let Some(line) = reader.next_line().await? {
        line_number += 1;
        bytes_read += line.len() as u64 + 1;

        if let Some(rest) = line.strip_prefix("PUBLIC ") {
            match parse_public(rest) {
                Some((addr, name)) => {
                    public.insert(addr, name);
                }
                None => {
                    warnings += 1;
                    warn!(line_number, "PUBLIC line has too few fields");
                }
            }
        } else if let Some(rest) = line.strip_prefix("FUNC ") {
            match parse_func(rest) {
                Some((addr, name)) => {
                    func.insert(addr, name);
                }
                None => {
                    warnings += 1;
                    warn!(line_number, "FUNC line has too few fields");
                }
            }
        }
        // All other record kinds (MODULE, FILE, STACK, INFO, ...) are ignored.
    }

    func.extend(public);
    let table = OffsetTable::from_map(func);

    Ok(ParseOutcome {
        table,
        bytes_read,
        elapsed: started.elapsed(),
        warnings,
    })
}

/// `<addr-hex> <param-size-hex> <name>` after the `PUBLIC ` keyword.
fn parse_public(rest: &str) -> Option<(u64, String)> {
    let fields = split_whitespace_fields(rest, 3)?;
    if fields.len() < 3 {
        return None;
    }
    let addr = u64::from_str_radix(fields[0], 16).ok()?;
    Some((addr, fields[2].to_string()))
}

/// `<addr-hex> <size-hex> <param-size-hex> <name>` after the `FUNC ` keyword.
///
/// A looser reading of this record only requires 4 fields total before
/// indexing a 5th for the name -- an off-by-one that would panic in Rust.
/// This requires all 4 fields and uses the fourth as the name, rather than
/// reproduce that bug.
fn parse_func(rest: &str) -> Option<(u64, String)> {
    let fields = split_whitespace_fields(rest, 4)?;
    if fields.len() < 4 {
        return None;
    }
    let addr = u64::from_str_radix(fields[0], 16).ok()?;
    Some((addr, fields[3].to_string()))
}

/// Like Python's `line.split(None, max_fields - 1)`: splits on runs of
/// whitespace, collapsing consecutive whitespace, and keeps the final
/// field's internal spaces intact (function names can contain them).
fn split_whitespace_fields(line: &str, max_fields: usize) -> Option<Vec<&str>> {
    if max_fields == 0 {
        return Some(Vec::new());
    }
    let mut fields = Vec::with_capacity(max_fields);
    let mut rest = line;
    for _ in 0..max_fields - 1 {
        let trimmed = rest.trim_start();
        match trimmed.find(char::is_whitespace) {
            Some(idx) => {
                fields.push(&trimmed[..idx]);
                rest = &trimmed[idx..];
            }
            None => {
                if !trimmed.is_empty() {
                    fields.push(trimmed);
                }
                return Some(fields);
            }
        }
    }
    let last = rest.trim_start();
    if !last.is_empty() {
        fields.push(last);
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn byte_stream(text: &'static str) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
        stream::iter(vec![Ok(Bytes::from_static(text.as_bytes()))])
    }

    #[tokio::test]
    async fn parses_public_and_func() {
        let outcome = parse_stream(byte_stream(
            "MODULE Linux x86 ABCD1234 foo\n\
             FUNC 1000 30 10 some func\n\
             PUBLIC 2000 0 other func\n",
        ))
        .await
        .unwrap();
        assert_eq!(outcome.table.get(0x1000), Some("some func"));
        assert_eq!(outcome.table.get(0x2000), Some("other func"));
        assert_eq!(outcome.warnings, 0);
    }

    #[tokio::test]
    async fn public_supersedes_func_on_tie() {
        let outcome = parse_stream(byte_stream(
            "FUNC 1000 30 10 func name\n\
             PUBLIC 1000 0 public name\n",
        ))
        .await
        .unwrap();
        assert_eq!(outcome.table.get(0x1000), Some("public name"));
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_and_counted() {
        let outcome = parse_stream(byte_stream(
            "PUBLIC 1000\n\
             FUNC 2000 30 10\n\
             PUBLIC 3000 0 ok\n",
        ))
        .await
        .unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.warnings, 2);
    }

    #[tokio::test]
    async fn empty_body_yields_empty_table() {
        let outcome = parse_stream(byte_stream("")).await.unwrap();
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.bytes_read, 0);
    }

    #[tokio::test]
    async fn ignores_unrecognized_lines() {
        let outcome = parse_stream(byte_stream(
            "MODULE Linux x86 ABCD1234 foo\nSTACK WIN 4 1000 30 0 0 0 0 0 0 1\nFILE 1 foo.c\n",
        ))
        .await
        .unwrap();
        assert!(outcome.table.is_empty());
    }
}
