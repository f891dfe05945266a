/*
[INPUT]:  Public API exports for the bybit-scalp-strategy crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod book;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod price;
pub mod stats;

// Re-export main types for convenience
pub use config::ScalpConfig;
pub use engine::{EngineCommand, EngineSnapshot, EngineState, ScalpEngine};
pub use exchange::{Exchange, LiveExchange};
