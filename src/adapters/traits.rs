use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Startable - device adapter lifecycle
// =============================================================================

/// Adapters that the server starts at boot and stops on shutdown.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Short adapter name used in logs (e.g. "brama")
    fn name(&self) -> &'static str;

    /// Start the adapter. No-op if already running.
    ///
    /// An error means the device could not be set up and nothing was spawned.
    async fn start(&self) -> Result<()>;

    /// Stop background work. Safe to call when not running.
    async fn stop(&self);
}

/// Implement [`Startable`] on top of inherent `start_internal` / `stop_internal`.
///
/// ```ignore
/// impl_startable!(BramaAdapter, "brama");
/// ```
#[macro_export]
macro_rules! impl_startable {
    ($adapter:ty, $name:literal) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $adapter {
            fn name(&self) -> &'static str {
                $name
            }

            async fn start(&self) -> anyhow::Result<()> {
                self.start_internal().await
            }

            async fn stop(&self) {
                self.stop_internal().await
            }
        }
    };
}
