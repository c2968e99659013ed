//! Component F: orchestrates one symbolication request end-to-end.
//!
//! `Collect -> BulkGet -> Partition -> Fetch* -> Resolve -> Respond`. Every
//! fetch branch is joined before frame resolution begins; a branch's
//! failure becomes a negative or empty table locally, never a request
//! failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use symserv_core::{LookupResult, ModuleKey, OffsetTable, SymbolError, SymbolMapStore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::request::{
    render_raw_offset, DebugInfo, DownloadStats, Frame, ModuleDebugInfo, ModuleDescriptor,
    SymbolicationResponse,
};

/// Fetches and parses one module's symbol file. Implemented by
/// [`crate::resolver::FetchResolver`] in production and by fakes in tests.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve_module(&self, key: &ModuleKey) -> Result<ResolvedModule, SymbolError>;
}

pub struct ResolvedModule {
    pub table: OffsetTable,
    pub bytes_read: u64,
    pub elapsed: Duration,
}

pub struct SymbolicationEngine<R> {
    store: Arc<SymbolMapStore>,
    resolver: Arc<R>,
    concurrency_limit: usize,
}

impl<R: ModuleResolver + 'static> SymbolicationEngine<R> {
    pub fn new(store: Arc<SymbolMapStore>, resolver: Arc<R>, concurrency_limit: usize) -> Self {
        SymbolicationEngine {
            store,
            resolver,
            concurrency_limit,
        }
    }

    pub async fn symbolicate(
        &self,
        modules: Vec<ModuleDescriptor>,
        stacks: Vec<Vec<Frame>>,
        debug: bool,
    ) -> SymbolicationResponse {
        let total_started = Instant::now();

        let module_keys: Vec<ModuleKey> = modules
            .iter()
            .map(|m| ModuleKey::new(m.debug_file.clone(), m.debug_id))
            .collect();

        let unique_keys: Vec<ModuleKey> = {
            let mut seen = HashSet::new();
            module_keys
                .iter()
                .filter(|k| seen.insert((*k).clone()))
                .cloned()
                .collect()
        };

        let cache_lookup_started = Instant::now();
        let bulk_results = self.store.bulk_get(&unique_keys);
        let cache_lookup_time = cache_lookup_started.elapsed();

        let mut tables: HashMap<ModuleKey, OffsetTable> = HashMap::new();
        let mut known: HashMap<ModuleKey, bool> = HashMap::new();
        let mut missing: Vec<ModuleKey> = Vec::new();

        for key in &unique_keys {
            match bulk_results.get(key) {
                Some(LookupResult::Positive(table)) => {
                    tables.insert(key.clone(), table.clone());
                    known.insert(key.clone(), true);
                }
                Some(LookupResult::Negative) => {
                    tables.insert(key.clone(), OffsetTable::empty());
                    known.insert(key.clone(), false);
                }
                Some(LookupResult::Missing) | None => missing.push(key.clone()),
            }
        }

        let (fetched, downloads) = self.fetch_missing(missing).await;
        for (key, table, was_known) in fetched {
            tables.insert(key.clone(), table);
            known.insert(key, was_known);
        }

        let symbolicated_stacks = stacks
            .iter()
            .map(|frames| {
                frames
                    .iter()
                    .map(|frame| self.render_frame(frame, &modules, &module_keys, &tables))
                    .collect()
            })
            .collect();

        let known_modules = module_keys.iter().map(|k| known.get(k).copied().unwrap_or(false)).collect();

        let debug_info = debug.then(|| {
            let mut stack_counts: HashMap<usize, usize> = HashMap::new();
            for frames in &stacks {
                for frame in frames {
                    if let Frame::Mapped { module_index, .. } = frame {
                        *stack_counts.entry(*module_index).or_insert(0) += 1;
                    }
                }
            }
            DebugInfo {
                total_time: total_started.elapsed().as_secs_f64(),
                cache_lookup_time: cache_lookup_time.as_secs_f64(),
                downloads,
                modules: modules
                    .iter()
                    .enumerate()
                    .map(|(index, m)| ModuleDebugInfo {
                        debug_file: m.debug_file.clone(),
                        debug_id: m.debug_id.breakpad().to_string(),
                        stack_count: stack_counts.get(&index).copied().unwrap_or(0),
                    })
                    .collect(),
            }
        });

        SymbolicationResponse {
            symbolicated_stacks,
            known_modules,
            debug: debug_info,
        }
    }

    /// Fetches each missing module with concurrency bounded by
    /// `concurrency_limit`, joining every branch before returning. Returns,
    /// for each key, its resolved table and whether it counts as "known",
    /// plus aggregate download stats for the debug response.
    async fn fetch_missing(
        &self,
        missing: Vec<ModuleKey>,
    ) -> (Vec<(ModuleKey, OffsetTable, bool)>, DownloadStats) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit.max(1)));
        let mut joins = JoinSet::new();

        for key in missing {
            let semaphore = Arc::clone(&semaphore);
            let resolver = Arc::clone(&self.resolver);
            joins.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let outcome = resolver.resolve_module(&key).await;
                (key, outcome)
            });
        }

        let mut resolved = Vec::new();
        let mut downloads = DownloadStats::default();

        while let Some(joined) = joins.join_next().await {
            let (key, outcome) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "module fetch task panicked");
                    continue;
                }
            };
            match outcome {
                Ok(resolved_module) => {
                    downloads.count += 1;
                    downloads.bytes += resolved_module.bytes_read;
                    downloads.time += resolved_module.elapsed.as_secs_f64();
                    self.store_result(&key, &resolved_module.table);
                    resolved.push((key, resolved_module.table, true));
                }
                Err(SymbolError::NotFound) | Err(SymbolError::Empty) => {
                    self.store_negative(&key);
                    resolved.push((key, OffsetTable::empty(), false));
                }
                Err(err) => {
                    warn!(module = %key, %err, "transient error fetching module, not negative-caching");
                    resolved.push((key, OffsetTable::empty(), false));
                }
            }
        }

        (resolved, downloads)
    }

    fn store_result(&self, key: &ModuleKey, table: &OffsetTable) {
        if let Err(err) = self.store.put_positive(key.clone(), table) {
            warn!(module = %key, %err, "failed to write positive entry back to symbol-map store");
        }
    }

    fn store_negative(&self, key: &ModuleKey) {
        self.store.put_negative(key.clone());
    }

    fn render_frame(
        &self,
        frame: &Frame,
        modules: &[ModuleDescriptor],
        module_keys: &[ModuleKey],
        tables: &HashMap<ModuleKey, OffsetTable>,
    ) -> String {
        match frame {
            Frame::Unmapped(value) => render_raw_offset(value),
            Frame::Mapped { module_index, offset } => {
                let debug_file = &modules[*module_index].debug_file;
                let key = &module_keys[*module_index];
                let name = tables.get(key).and_then(|table| table.resolve(*offset));
                match name {
                    Some(name) => format!("{name} (in {debug_file})"),
                    None => format!("0x{offset:x} (in {debug_file})"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debugid::DebugId;
    use serde_json::Value;
    use std::collections::HashMap as StdHashMap;
    use std::str::FromStr;
    use std::sync::Mutex;

    fn debug_id() -> DebugId {
        DebugId::from_str("c617b8af-4724-44ad-952d-19a0cfd7c8f7-2").unwrap()
    }

    fn module(name: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            debug_file: name.to_string(),
            debug_id: debug_id(),
        }
    }

    struct FakeResolver {
        tables: Mutex<StdHashMap<String, Result<OffsetTable, SymbolError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeResolver {
        fn new(entries: Vec<(&str, Result<OffsetTable, SymbolError>)>) -> Self {
            FakeResolver {
                tables: Mutex::new(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModuleResolver for FakeResolver {
        async fn resolve_module(&self, key: &ModuleKey) -> Result<ResolvedModule, SymbolError> {
            self.calls.lock().unwrap().push(key.debug_file.clone());
            match self.tables.lock().unwrap().remove(&key.debug_file) {
                Some(Ok(table)) => Ok(ResolvedModule {
                    table,
                    bytes_read: 128,
                    elapsed: Duration::from_millis(1),
                }),
                Some(Err(err)) => Err(err),
                None => Err(SymbolError::NotFound),
            }
        }
    }

    fn table_with(offset: u64, name: &str) -> OffsetTable {
        let mut m = StdHashMap::new();
        m.insert(offset, name.to_string());
        OffsetTable::from_map(m)
    }

    #[tokio::test]
    async fn cold_cache_happy_path_resolves_known_module() {
        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let resolver = Arc::new(FakeResolver::new(vec![(
            "firefox.pdb",
            Ok(table_with(154348, "sandbox::TargetProcess::~TargetProcess()")),
        )]));
        let engine = SymbolicationEngine::new(store, resolver, 8);

        let modules = vec![module("firefox.pdb")];
        let stacks = vec![vec![Frame::Mapped {
            module_index: 0,
            offset: 154348,
        }]];

        let response = engine.symbolicate(modules, stacks, false).await;
        assert_eq!(response.known_modules, vec![true]);
        assert_eq!(
            response.symbolicated_stacks[0][0],
            "sandbox::TargetProcess::~TargetProcess() (in firefox.pdb)"
        );
    }

    #[tokio::test]
    async fn warm_cache_does_not_refetch() {
        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let key = ModuleKey::new("firefox.pdb", debug_id());
        store
            .put_positive(key, &table_with(154348, "known_fn"))
            .unwrap();
        let resolver = Arc::new(FakeResolver::new(vec![]));
        let engine = SymbolicationEngine::new(store, resolver, 8);

        let modules = vec![module("firefox.pdb")];
        let stacks = vec![vec![Frame::Mapped {
            module_index: 0,
            offset: 154348,
        }]];
        let response = engine.symbolicate(modules, stacks, true).await;
        assert_eq!(response.debug.unwrap().downloads.count, 0);
    }

    #[tokio::test]
    async fn unknown_module_renders_hex_offset() {
        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let resolver = Arc::new(FakeResolver::new(vec![(
            "unknown.pdb",
            Err(SymbolError::NotFound),
        )]));
        let engine = SymbolicationEngine::new(store, resolver, 8);

        let modules = vec![module("unknown.pdb")];
        let stacks = vec![vec![Frame::Mapped {
            module_index: 0,
            offset: 0x100,
        }]];
        let response = engine.symbolicate(modules, stacks, false).await;
        assert_eq!(response.known_modules, vec![false]);
        assert_eq!(response.symbolicated_stacks[0][0], "0x100 (in unknown.pdb)");
    }

    #[tokio::test]
    async fn negative_sentinel_prevents_refetch_within_ttl() {
        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let resolver = Arc::new(FakeResolver::new(vec![(
            "missing.pdb",
            Err(SymbolError::NotFound),
        )]));
        let engine = SymbolicationEngine::new(store, Arc::clone(&resolver), 8);

        let modules = vec![module("missing.pdb")];
        let stacks = vec![vec![Frame::Mapped {
            module_index: 0,
            offset: 1,
        }]];
        engine.symbolicate(modules.clone(), stacks.clone(), false).await;
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);

        engine.symbolicate(modules, stacks, false).await;
        assert_eq!(resolver.calls.lock().unwrap().len(), 1, "second request should not refetch");
    }

    #[tokio::test]
    async fn unmapped_frame_bypasses_lookup() {
        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let resolver = Arc::new(FakeResolver::new(vec![]));
        let engine = SymbolicationEngine::new(store, resolver, 8);

        let modules = vec![];
        let stacks = vec![vec![Frame::Unmapped(Value::from(255))]];
        let response = engine.symbolicate(modules, stacks, false).await;
        assert_eq!(response.symbolicated_stacks[0][0], "0xff");
        assert!(response.known_modules.is_empty());
    }

    #[tokio::test]
    async fn empty_stacks_yield_empty_response_with_aligned_known_modules() {
        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let resolver = Arc::new(FakeResolver::new(vec![(
            "firefox.pdb",
            Ok(table_with(1, "f")),
        )]));
        let engine = SymbolicationEngine::new(store, resolver, 8);

        let modules = vec![module("firefox.pdb")];
        let response = engine.symbolicate(modules, vec![], false).await;
        assert_eq!(response.symbolicated_stacks.len(), 0);
        assert_eq!(response.known_modules, vec![true]);
    }

    /// A resolver backed by [`symserv_testkit::FakeOrigin`] plus the real
    /// streaming parser, exercising fetch-then-parse the way `FetchResolver`
    /// composes component C and E in production.
    struct FakeOriginResolver {
        origin: symserv_testkit::FakeOrigin,
    }

    #[async_trait]
    impl ModuleResolver for FakeOriginResolver {
        async fn resolve_module(&self, key: &ModuleKey) -> Result<ResolvedModule, SymbolError> {
            let download_key = key.download_key();
            let body = self
                .origin
                .fetch(&download_key)
                .ok_or(SymbolError::NotFound)?;
            let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
                bytes::Bytes::from(body.into_bytes()),
            )]);
            let outcome = symserv_core::parser::parse_stream(stream).await?;
            if outcome.table.is_empty() {
                return Err(SymbolError::Empty);
            }
            Ok(ResolvedModule {
                table: outcome.table,
                bytes_read: outcome.bytes_read,
                elapsed: Duration::from_millis(1),
            })
        }
    }

    #[tokio::test]
    async fn end_to_end_through_fake_origin_and_real_parser() {
        let key = ModuleKey::new("firefox.pdb", debug_id()).download_key();
        let origin = symserv_testkit::FakeOrigin::new()
            .with_symbol_file(key, "FUNC 25aec 10 0 sandbox::TargetProcess::~TargetProcess()\n");

        let store = Arc::new(SymbolMapStore::new(100, Duration::from_secs(3600)));
        let resolver = Arc::new(FakeOriginResolver { origin });
        let engine = SymbolicationEngine::new(store, Arc::clone(&resolver), 8);

        let modules = vec![module("firefox.pdb")];
        let stacks = vec![vec![Frame::Mapped {
            module_index: 0,
            offset: 154348,
        }]];

        let response = engine.symbolicate(modules, stacks, false).await;
        assert_eq!(
            response.symbolicated_stacks[0][0],
            "sandbox::TargetProcess::~TargetProcess() (in firefox.pdb)"
        );
        assert_eq!(resolver.origin.call_count(), 1);
    }
}
