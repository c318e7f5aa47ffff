/// Operator-facing error taxonomy.
///
/// Every variant is recoverable: the console reports it and keeps running.

use core::fmt;

use crate::protocol::MacString;

/// Why a play request was refused before reaching the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInput {
    /// No file path given
    MissingPath,
    /// File extension is not a supported audio container
    UnsupportedFileType,
    /// No target is selected
    NoTarget,
    /// Device is no longer in the registry
    UnknownDevice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Platform primitive missing
    AdapterUnavailable(&'static str),
    /// Nothing tracked yet
    EmptyRegistry,
    /// Ordinal outside `1..=count`
    OutOfRange { ordinal: usize, count: usize },
    InvalidInput(InvalidInput),
    /// The platform primitive ran and reported failure
    ActionFailed { address: MacString },
}

impl TrackerError {
    /// Stable short code for the console protocol
    pub fn code(&self) -> &'static str {
        match self {
            Self::AdapterUnavailable(_) => "adapter_unavailable",
            Self::EmptyRegistry => "empty_registry",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InvalidInput(InvalidInput::MissingPath) => "missing_path",
            Self::InvalidInput(InvalidInput::UnsupportedFileType) => "unsupported_file_type",
            Self::InvalidInput(InvalidInput::NoTarget) => "no_target",
            Self::InvalidInput(InvalidInput::UnknownDevice) => "unknown_device",
            Self::ActionFailed { .. } => "action_failed",
        }
    }
}

impl From<InvalidInput> for TrackerError {
    fn from(e: InvalidInput) -> Self {
        Self::InvalidInput(e)
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterUnavailable(primitive) => write!(f, "{primitive} not available on this platform"),
            Self::EmptyRegistry => write!(f, "no devices tracked, scan first"),
            Self::OutOfRange { ordinal, count } => {
                write!(f, "invalid device index {ordinal} (have {count})")
            }
            Self::InvalidInput(InvalidInput::MissingPath) => write!(f, "no file selected"),
            Self::InvalidInput(InvalidInput::UnsupportedFileType) => write!(f, "please select an .mp3 file"),
            Self::InvalidInput(InvalidInput::NoTarget) => write!(f, "no target device, scan first"),
            Self::InvalidInput(InvalidInput::UnknownDevice) => write!(f, "device is no longer tracked"),
            Self::ActionFailed { address } => write!(f, "action failed for {address}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            TrackerError::AdapterUnavailable("x"),
            TrackerError::EmptyRegistry,
            TrackerError::OutOfRange { ordinal: 3, count: 2 },
            InvalidInput::MissingPath.into(),
            InvalidInput::UnsupportedFileType.into(),
            InvalidInput::NoTarget.into(),
            InvalidInput::UnknownDevice.into(),
            TrackerError::ActionFailed { address: MacString::new() },
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in &errors[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn display_names_index_and_count() {
        let msg = std::format!("{}", TrackerError::OutOfRange { ordinal: 7, count: 2 });
        assert_eq!(msg, "invalid device index 7 (have 2)");
    }
}
