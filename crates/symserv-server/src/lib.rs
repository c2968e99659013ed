//! Component H: the HTTP facade binary's modules, exposed as a library so
//! integration tests can build a router without going through `main`.

pub mod config;
pub mod http;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use state::AppState;
