/// Platform adapter boundary.
///
/// The radio, the action primitives, the cancel input and the clock all
/// belong to the host platform (ESP-IDF firmware, a test double, ...). The
/// tracker only sees this trait.
///
/// Advertisements flow the other way: once `start_scan` succeeds the adapter
/// feeds every report into `Tracker::on_advertisement`, from whatever thread
/// or callback context its radio driver uses.

use core::fmt;

/// A platform primitive could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    /// The named primitive is not provided by this platform/firmware
    Unavailable(&'static str),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(primitive) => write!(f, "{primitive} not available"),
        }
    }
}

/// Services the tracker needs from the platform.
#[allow(async_fn_in_trait)]
pub trait Platform {
    /// Begin delivering advertisements to `Tracker::on_advertisement`.
    fn start_scan(&self) -> Result<(), PlatformError>;

    /// Stop delivering advertisements.
    fn stop_scan(&self) -> Result<(), PlatformError>;

    /// Run the protocol action against `address`. `Ok(false)` means the
    /// primitive ran and reported failure.
    async fn trigger_action(&self, address: &str) -> Result<bool, PlatformError>;

    /// Play `path` on the device at `address`.
    async fn play_file(&self, address: &str, path: &str) -> Result<bool, PlatformError>;

    /// Operator escape/cancel input, polled while waiting for a device.
    fn cancel_requested(&self) -> bool;

    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;

    /// Cooperative pause of roughly `ms` milliseconds.
    async fn pause(&self, ms: u32);
}
