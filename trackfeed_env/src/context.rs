//! Core environment context trait for trackfeed emitters.

use async_trait::async_trait;
use rand::RngCore;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Boxed random stream handed out by a context.
pub type FeedRng = Box<dyn RngCore + Send>;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the same emitter code
/// runs against the tokio clock in production and against a manually
/// advanced virtual clock in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, entropy-seeded RNG
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism
/// (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait FeedContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Tick deadlines and trajectory timestamps are expressed on this clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns a random stream for the given stream number.
    ///
    /// Simulation combines the master seed with `stream` so every feed
    /// gets an independent but reproducible sequence. Production ignores
    /// `stream` and seeds from OS entropy.
    fn rng(&self, stream: u64) -> FeedRng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
