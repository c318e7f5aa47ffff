/// Default target signatures and tuning constants.
///
/// Name patterns and address prefixes cover Fast Pair capable earbuds
/// (Pixel Buds, Galaxy Buds, generic "Fast Pair" accessories). Runtime
/// config starts from these via `FilterConfig::from_defaults()`.

/// Minimum RSSI (dBm) an advertisement must reach to be considered.
pub const MIN_RSSI_DBM: i8 = -80;

/// Registry capacity. The weakest entry is evicted past this.
pub const MAX_TRACKED_DEVICES: usize = 10;

/// Sentinel RSSI for reports that carry no signal strength.
pub const RSSI_UNKNOWN: i8 = -127;

/// Interval (ms) at which `wait_for_first_device` re-checks the cancel query.
pub const WAIT_POLL_MS: u32 = 100;

/// Length of one platform scan round (ms). Rounds repeat while scanning.
pub const SCAN_ROUND_MS: u32 = 3000;

/// Advertised name patterns (case-insensitive substring; a space matches
/// any run of whitespace, including none).
pub static NAME_PATTERNS: &[&str] = &["Fast Pair", "Pixel", "Galaxy Buds"];

/// Address prefixes (OUI) allowed through the filter.
pub static ADDRESS_PREFIXES: &[&str] = &["3C:5A:B4", "D4:3B:04"];

/// File extensions accepted for playback (compared case-insensitively).
pub static SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[".mp3"];
