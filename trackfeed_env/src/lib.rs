//! trackfeed Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing trackfeed emitters
//! to run in both **Production** (tokio) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept
//!
//! A simulated feed only ever touches the outside world through:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Randomness (`rng()`)
//!
//! By deriving every random stream from a single 64-bit seed, any simulated
//! trajectory becomes reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use trackfeed_env::FeedContext;
//!
//! async fn feed_loop<Ctx: FeedContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(1000)).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod types;
mod tokio_impl;

pub use context::{FeedContext, FeedRng};
pub use types::FeedId;
pub use tokio_impl::TokioContext;
