/// Target selection and action dispatch.
///
/// Ordinals are 1-based and validated against the registry at call time.
/// Actions make a single attempt through the platform and never touch the
/// registry. The returned futures complete when the platform reports back;
/// the scan lifecycle is not blocked meanwhile.

use crate::defaults::SUPPORTED_AUDIO_EXTENSIONS;
use crate::error::{InvalidInput, TrackerError};
use crate::platform::{Platform, PlatformError};
use crate::registry::Device;
use crate::scan::Tracker;

/// How to treat action primitives the platform does not provide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionPolicy {
    /// Report success instead of `AdapterUnavailable`. Meant for demo
    /// builds without the native primitives; always logged.
    pub optimistic_when_unavailable: bool,
}

/// True if `path` ends in a supported audio extension (case-insensitive).
pub fn is_supported_audio(path: &str) -> bool {
    let path = path.as_bytes();
    SUPPORTED_AUDIO_EXTENSIONS.iter().any(|ext| {
        let ext = ext.as_bytes();
        path.len() > ext.len() && path[path.len() - ext.len()..].eq_ignore_ascii_case(ext)
    })
}

/// Check an operator-supplied audio path before any device is involved.
pub fn validate_path(path: &str) -> Result<(), InvalidInput> {
    if path.trim().is_empty() {
        return Err(InvalidInput::MissingPath);
    }
    if !is_supported_audio(path) {
        return Err(InvalidInput::UnsupportedFileType);
    }
    Ok(())
}

impl<P: Platform, const N: usize> Tracker<P, N> {
    /// Make device `ordinal` (1-based) the target.
    pub fn select_target(&self, ordinal: usize) -> Result<Device, TrackerError> {
        let selected = self.with_inner(|inner| {
            let count = inner.registry.count();
            if count == 0 {
                return Err(TrackerError::EmptyRegistry);
            }
            let device = inner
                .registry
                .get(ordinal)
                .cloned()
                .ok_or(TrackerError::OutOfRange { ordinal, count })?;
            inner.target = Some(device.address.clone());
            Ok(device)
        });

        match &selected {
            Ok(d) => log::info!("Target: {} [{}], {} dBm", d.name, d.address, d.rssi),
            Err(e) => log::warn!("select_target({}): {}", ordinal, e),
        }
        selected
    }

    /// Run the protocol action against `device`.
    pub async fn trigger(&self, device: &Device) -> Result<(), TrackerError> {
        log::info!("Triggering action for: {} [{}]", device.name, device.address);
        let result = self.platform.trigger_action(&device.address).await;
        self.settle("trigger", device, result)
    }

    /// Play `path` on `device`, which must still be tracked.
    pub async fn play(&self, device: &Device, path: &str) -> Result<(), TrackerError> {
        if let Err(e) = validate_path(path) {
            return Err(self.refuse("play", e));
        }
        let tracked = self.with_inner(|inner| inner.registry.find(&device.address).is_some());
        if !tracked {
            return Err(self.refuse("play", InvalidInput::UnknownDevice));
        }

        log::info!("Playing {} on: {} [{}]", path, device.name, device.address);
        let result = self.platform.play_file(&device.address, path).await;
        self.settle("play", device, result)
    }

    /// Select device `ordinal` and trigger the action on it.
    pub async fn select_and_trigger(&self, ordinal: usize) -> Result<Device, TrackerError> {
        let device = self.select_target(ordinal)?;
        self.trigger(&device).await?;
        Ok(device)
    }

    /// Select device `ordinal` and play `path` on it. The path is checked
    /// first so a bad file leaves the selection alone.
    pub async fn select_and_play(&self, ordinal: usize, path: &str) -> Result<Device, TrackerError> {
        if let Err(e) = validate_path(path) {
            return Err(self.refuse("play", e));
        }
        let device = self.select_target(ordinal)?;
        self.play(&device, path).await?;
        Ok(device)
    }

    /// Play `path` on the current target.
    pub async fn play_on_target(&self, path: &str) -> Result<Device, TrackerError> {
        let Some(device) = self.target() else {
            return Err(self.refuse("play", InvalidInput::NoTarget));
        };
        self.play(&device, path).await?;
        Ok(device)
    }

    fn refuse(&self, op: &str, reason: InvalidInput) -> TrackerError {
        let e = TrackerError::from(reason);
        log::warn!("{}: {}", op, e);
        e
    }

    /// Map a platform completion onto the operator-facing result.
    fn settle(&self, op: &str, device: &Device, result: Result<bool, PlatformError>) -> Result<(), TrackerError> {
        match result {
            Ok(true) => {
                log::info!("{} OK for {}", op, device.address);
                Ok(())
            }
            Ok(false) => {
                log::warn!("{} FAILED for {}", op, device.address);
                Err(TrackerError::ActionFailed {
                    address: device.address.clone(),
                })
            }
            Err(PlatformError::Unavailable(primitive)) if self.policy.optimistic_when_unavailable => {
                log::warn!("{} not available, reporting optimistic success for {}", primitive, device.address);
                Ok(())
            }
            Err(PlatformError::Unavailable(primitive)) => {
                log::warn!("{} not available, {} for {} not performed", primitive, op, device.address);
                Err(TrackerError::AdapterUnavailable(primitive))
            }
        }
    }
}
