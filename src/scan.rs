/// Scan lifecycle controller.
///
/// `Tracker` owns the registry, the scan state and the selected target, and
/// is the single place advertisements enter. State lives behind a
/// critical-section mutex so the platform's scan callback may run on another
/// thread (or in interrupt context) while the operator reads or dispatches.
/// No lock is ever held across an `.await`.
///
/// State machine:
///
/// ```text
///   Idle ──start──▶ Scanning ──stop / first device / cancel──▶ Stopped
///                      ▲                                          │
///                      └───────────────start (clears registry)────┘
/// ```

use core::cell::RefCell;

use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::Vec;

use crate::defaults::{MAX_TRACKED_DEVICES, WAIT_POLL_MS};
use crate::dispatch::ActionPolicy;
use crate::error::TrackerError;
use crate::filter::{self, FilterConfig, Rejection};
use crate::platform::{Platform, PlatformError};
use crate::protocol::MacString;
use crate::registry::{normalize_address, Device, DeviceRegistry, RegistryError, Upsert};

/// Discovery state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No scan has run yet
    Idle,
    /// Discovery active; the registry accepts updates
    Scanning,
    /// Discovery halted; the registry keeps its contents
    Stopped,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Stopped => "stopped",
        }
    }
}

/// Why `wait_for_first_device` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one device is tracked
    Found,
    /// The operator cancelled
    Cancelled,
    /// The scan was stopped elsewhere
    Interrupted,
}

/// What happened to one advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Not scanning; dropped
    Ignored,
    /// Failed a registry precondition (empty or oversized address)
    Invalid(RegistryError),
    /// Failed the filter pipeline
    Rejected(Rejection),
    /// Accepted into the registry
    Tracked(Upsert),
}

/// Per-scan counters, reset at scan start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub accepted: u32,
    pub rejected: u32,
    pub evicted: u32,
}

pub(crate) struct Inner<const N: usize> {
    pub(crate) state: ScanState,
    pub(crate) registry: DeviceRegistry<N>,
    pub(crate) target: Option<MacString>,
    pub(crate) stats: ScanStats,
}

/// Discovery and tracking engine.
pub struct Tracker<P, const N: usize = MAX_TRACKED_DEVICES> {
    pub(crate) platform: P,
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<N>>>,
    filter: Mutex<CriticalSectionRawMutex, RefCell<FilterConfig>>,
    pub(crate) policy: ActionPolicy,
    /// Raised on every tracked observation and on stop
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl<P: Platform, const N: usize> Tracker<P, N> {
    pub fn new(platform: P, filter: FilterConfig, policy: ActionPolicy) -> Self {
        Self {
            platform,
            inner: Mutex::new(RefCell::new(Inner {
                state: ScanState::Idle,
                registry: DeviceRegistry::new(),
                target: None,
                stats: ScanStats::default(),
            })),
            filter: Mutex::new(RefCell::new(filter)),
            policy,
            wake: Signal::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run `f` inside the critical section.
    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn state(&self) -> ScanState {
        self.with_inner(|inner| inner.state)
    }

    /// Begin discovery with an empty registry and no target.
    ///
    /// A no-op while already scanning. If the platform has no scan primitive
    /// the tracker still enters `Scanning` (nothing will arrive) and the
    /// caller gets `AdapterUnavailable`.
    pub fn start_scan(&self) -> Result<(), TrackerError> {
        if self.state() == ScanState::Scanning {
            log::debug!("start_scan: already scanning");
            return Ok(());
        }

        self.wake.reset();
        self.with_inner(|inner| {
            inner.registry.clear();
            inner.target = None;
            inner.stats = ScanStats::default();
            inner.state = ScanState::Scanning;
        });

        match self.platform.start_scan() {
            Ok(()) => {
                log::info!("Scan started");
                Ok(())
            }
            Err(PlatformError::Unavailable(primitive)) => {
                log::warn!("{} not available; scanning is a no-op", primitive);
                Err(TrackerError::AdapterUnavailable(primitive))
            }
        }
    }

    /// Halt discovery. Idempotent.
    pub fn stop_scan(&self) {
        if let Err(e) = self.platform.stop_scan() {
            log::warn!("stop_scan: {}", e);
        }

        let (previous, count) = self.with_inner(|inner| {
            let previous = core::mem::replace(&mut inner.state, ScanState::Stopped);
            (previous, inner.registry.count())
        });
        if previous == ScanState::Scanning {
            log::info!("Scan stopped, {} device(s) tracked", count);
        }
        self.wake.signal(());
    }

    /// Wait until a device is tracked, the operator cancels, or the scan is
    /// stopped elsewhere. Always stops the scan before returning.
    ///
    /// Suspends on the wake signal raced against a `WAIT_POLL_MS` platform
    /// pause: a new device resumes it at once, the cancel query is re-read at
    /// least every poll interval.
    pub async fn wait_for_first_device(&self) -> WaitOutcome {
        let outcome = loop {
            if self.device_count() > 0 {
                break WaitOutcome::Found;
            }
            if self.platform.cancel_requested() {
                break WaitOutcome::Cancelled;
            }
            if self.state() != ScanState::Scanning {
                break WaitOutcome::Interrupted;
            }
            select(self.wake.wait(), self.platform.pause(WAIT_POLL_MS)).await;
        };

        self.stop_scan();
        log::info!("Wait for first device ended: {:?}", outcome);
        outcome
    }

    /// Feed one advertisement from the platform's scan callback.
    pub fn on_advertisement(&self, address: &str, name: &str, rssi: i8) -> Observation {
        if self.state() != ScanState::Scanning {
            return Observation::Ignored;
        }

        // The filter and the registry see the same normalized address.
        let address = match normalize_address(address) {
            Ok(address) => address,
            Err(RegistryError::EmptyAddress) => {
                log::debug!("Dropped advertisement without address");
                return Observation::Invalid(RegistryError::EmptyAddress);
            }
            Err(e) => {
                log::warn!("Dropped advertisement from '{}': {}", address, e);
                return Observation::Invalid(e);
            }
        };
        let address = address.as_str();

        let verdict = self
            .filter
            .lock(|config| filter::evaluate(address, name, rssi, &config.borrow()));
        let now = self.platform.now_ms();

        let observation = self.with_inner(|inner| {
            if inner.state != ScanState::Scanning {
                return Observation::Ignored;
            }
            if let Err(rejection) = verdict {
                inner.stats.rejected = inner.stats.rejected.saturating_add(1);
                return Observation::Rejected(rejection);
            }

            let was_empty = inner.registry.is_empty();
            let upsert = match inner.registry.upsert(address, name, rssi, now) {
                Ok(upsert) => upsert,
                Err(e) => return Observation::Invalid(e),
            };

            inner.stats.accepted = inner.stats.accepted.saturating_add(1);
            if let Upsert::Replaced { evicted } = &upsert {
                inner.stats.evicted = inner.stats.evicted.saturating_add(1);
                if inner.target.as_ref() == Some(&evicted.address) {
                    inner.target = None;
                }
            }
            // First hit of a scan becomes the target.
            if was_empty && inner.target.is_none() {
                inner.target = inner.registry.get(1).map(|d| d.address.clone());
            }
            Observation::Tracked(upsert)
        });

        match &observation {
            Observation::Rejected(reason) => {
                log::debug!("Filtered {} '{}' {} dBm: {}", address, name, rssi, reason.as_str());
            }
            Observation::Invalid(e) => log::warn!("Dropped advertisement from '{}': {}", address, e),
            Observation::Tracked(Upsert::Inserted) => {
                log::info!("Matched {} '{}' {} dBm", address, name, rssi);
            }
            Observation::Tracked(Upsert::Replaced { evicted }) => {
                log::info!(
                    "Matched {} '{}' {} dBm, evicted {} ({} dBm)",
                    address, name, rssi, evicted.address, evicted.rssi
                );
            }
            Observation::Tracked(Upsert::Updated) | Observation::Ignored => {}
        }

        if matches!(observation, Observation::Tracked(_)) {
            self.wake.signal(());
        }
        observation
    }

    pub fn device_count(&self) -> usize {
        self.with_inner(|inner| inner.registry.count())
    }

    /// Snapshot of the registry in ordinal order.
    pub fn list_devices(&self) -> Vec<Device, N> {
        self.with_inner(|inner| inner.registry.iter().cloned().collect())
    }

    /// The selected target, if it is still tracked.
    pub fn target(&self) -> Option<Device> {
        self.with_inner(|inner| {
            inner
                .target
                .as_ref()
                .and_then(|address| inner.registry.find(address))
                .cloned()
        })
    }

    pub fn stats(&self) -> ScanStats {
        self.with_inner(|inner| inner.stats)
    }

    pub fn filter_config(&self) -> FilterConfig {
        self.filter.lock(|config| config.borrow().clone())
    }

    /// Swap in a new filter config as one step.
    pub fn set_filter_config(&self, config: FilterConfig) {
        log::info!(
            "Filter config: min_rssi {} dBm, {} name pattern(s), {} prefix(es)",
            config.min_rssi,
            config.name_patterns.len(),
            config.address_prefixes.len()
        );
        self.filter.lock(|current| *current.borrow_mut() = config);
    }
}
