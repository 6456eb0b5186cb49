//! Price history synchronisation
//!
//! ```text
//! SymbolRegistry ──> for each symbol:
//!     WatermarkResolver ──> PriceFetcher ──> UpsertStore ──> RunSummary
//!     (pace, next symbol)
//! ```

pub mod fetcher;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod summary;
pub mod watermark;

pub use fetcher::PriceFetcher;
pub use orchestrator::{
    Clock, Pacer, RunMode, RunState, SyncOptions, SyncOrchestrator, SystemClock, TokioPacer,
};
pub use registry::{MappingSource, SymbolRegistry};
pub use store::{PriceSink, UpsertStore};
pub use summary::{RunSummary, SymbolFailure, SymbolStatus, SymbolSuccess};
pub use watermark::{FetchWindow, WatermarkResolver, WatermarkSource, WindowDecision};
