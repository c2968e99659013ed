//! Component F: the symbolication engine. Decodes a batched stack-walking
//! request, deduplicates modules against the symbol-map store, fetches and
//! parses whatever is missing with bounded concurrency, and resolves every
//! frame.

pub mod engine;
pub mod request;
pub mod resolver;

pub use engine::{ModuleResolver, ResolvedModule, SymbolicationEngine};
pub use request::{
    decode, render_raw_offset, DebugInfo, DecodedRequest, DownloadStats, Frame, ModuleDebugInfo,
    ModuleDescriptor, RequestError, SymbolicationRequest, SymbolicationResponse,
};
pub use resolver::FetchResolver;
