//! The production [`ModuleResolver`]: fetch via component C, parse via
//! component E.

use async_trait::async_trait;
use symserv_core::{ModuleKey, SymbolError, SymbolFetcher};

use crate::engine::{ModuleResolver, ResolvedModule};

pub struct FetchResolver {
    fetcher: SymbolFetcher,
}

impl FetchResolver {
    pub fn new(fetcher: SymbolFetcher) -> Self {
        FetchResolver { fetcher }
    }
}

#[async_trait]
impl ModuleResolver for FetchResolver {
    async fn resolve_module(&self, key: &ModuleKey) -> Result<ResolvedModule, SymbolError> {
        let download_key = key.download_key();
        let (_, stream, probe_elapsed) = self.fetcher.stream(&download_key).await?;
        let outcome = symserv_core::parser::parse_stream(stream).await?;
        if outcome.table.is_empty() {
            return Err(SymbolError::Empty);
        }
        Ok(ResolvedModule {
            table: outcome.table,
            bytes_read: outcome.bytes_read,
            elapsed: probe_elapsed + outcome.elapsed,
        })
    }
}
