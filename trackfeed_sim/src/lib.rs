//! trackfeed Deterministic Simulation Harness
//!
//! Runs feeds against a virtual clock so that whole tracking sessions
//! replay bit-for-bit from a single seed.
//!
//! # Core Principle
//!
//! Every source of non-determinism goes through [`SimContext`]:
//! - **Time**: the virtual clock moves only when a session steps it
//! - **Randomness**: each feed draws from its own ChaCha8 stream derived from the seed
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                TrackingSession                │
//! │  ┌─────────────────────────────────────────┐  │
//! │  │ SimContext (virtual clock + RNG streams)│  │
//! │  └─────────────────────────────────────────┘  │
//! │       │                      │                │
//! │  ┌────▼────┐            ┌────▼────┐           │
//! │  │ Emitter │    ...     │ Emitter │           │
//! │  └────┬────┘            └────┬────┘           │
//! │       └──────────┬───────────┘                │
//! │             ┌────▼─────┐                      │
//! │             │ MapScene │                      │
//! │             └──────────┘                      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trackfeed_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_duration(30.0)
//!     .run(ScenarioId::Combined);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod runner;
pub mod scenarios;
mod session;

pub use context::SimContext;
pub use error::{duration_from_secs, SimError};
pub use exporter::{ExportFormat, FeedExport, SimExport};
pub use runner::{FeedSummary, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use session::{SessionConfig, SimEmitter, TrackingSession};
