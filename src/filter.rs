/// Filter pipeline for BLE advertisements.
///
/// Decides whether one advertisement is relevant. Pure: the same
/// `(address, name, rssi, config)` always gives the same answer. Rules run in
/// order and stop at the first failure: signal floor, name pattern, address
/// prefix. Absent criteria never reject.

use heapless::{String, Vec};

use crate::defaults::{ADDRESS_PREFIXES, MIN_RSSI_DBM, NAME_PATTERNS};
use crate::protocol::MacString;

/// Maximum number of name pattern alternatives in a config
pub const MAX_NAME_PATTERNS: usize = 4;

/// Maximum number of address prefixes in a config
pub const MAX_ADDRESS_PREFIXES: usize = 8;

/// Storage for a single name pattern alternative
pub type PatternString = String<33>;

/// Runtime filter configuration.
///
/// Replaced only as a whole (see `Tracker::set_filter_config`), so readers
/// never observe a half-updated config.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Minimum RSSI threshold (dBm). Signals weaker than this are ignored.
    pub min_rssi: i8,
    /// Name alternatives; the name must match at least one. Empty = any name.
    pub name_patterns: Vec<PatternString, MAX_NAME_PATTERNS>,
    /// Address prefixes; the address must start with one. Empty = any address.
    pub address_prefixes: Vec<MacString, MAX_ADDRESS_PREFIXES>,
}

/// Error returned when a config list is full or an entry does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigFull;

impl FilterConfig {
    /// Permissive config: no signal floor, no name or prefix constraint.
    pub const fn new() -> Self {
        Self {
            min_rssi: i8::MIN,
            name_patterns: Vec::new(),
            address_prefixes: Vec::new(),
        }
    }

    /// Stock config built from `defaults.rs`.
    pub fn from_defaults() -> Self {
        let mut config = Self::new().with_min_rssi(MIN_RSSI_DBM);
        for &pattern in NAME_PATTERNS {
            let _ = config.add_name_pattern(pattern);
        }
        for &prefix in ADDRESS_PREFIXES {
            let _ = config.add_address_prefix(prefix);
        }
        config
    }

    pub fn with_min_rssi(mut self, min_rssi: i8) -> Self {
        self.min_rssi = min_rssi;
        self
    }

    /// Add a name alternative. Blank patterns are ignored.
    pub fn add_name_pattern(&mut self, pattern: &str) -> Result<(), ConfigFull> {
        if pattern.trim().is_empty() {
            return Ok(());
        }
        let mut p = PatternString::new();
        p.push_str(pattern).map_err(|_| ConfigFull)?;
        self.name_patterns.push(p).map_err(|_| ConfigFull)
    }

    /// Add an address prefix. Stored upper case; blank prefixes are ignored.
    pub fn add_address_prefix(&mut self, prefix: &str) -> Result<(), ConfigFull> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(());
        }
        let mut p = MacString::new();
        for c in prefix.chars() {
            p.push(c.to_ascii_uppercase()).map_err(|_| ConfigFull)?;
        }
        self.address_prefixes.push(p).map_err(|_| ConfigFull)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why an advertisement was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// RSSI below `min_rssi`
    WeakSignal,
    /// Name patterns configured, none matched
    NameMismatch,
    /// Prefix allow-list configured, no prefix matched
    PrefixMismatch,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::WeakSignal => "weak_signal",
            Rejection::NameMismatch => "name_mismatch",
            Rejection::PrefixMismatch => "prefix_mismatch",
        }
    }
}

/// Evaluate one advertisement, reporting the first failing rule.
pub fn evaluate(address: &str, name: &str, rssi: i8, config: &FilterConfig) -> Result<(), Rejection> {
    if rssi < config.min_rssi {
        return Err(Rejection::WeakSignal);
    }

    if !config.name_patterns.is_empty()
        && !config.name_patterns.iter().any(|p| name_matches(name, p))
    {
        return Err(Rejection::NameMismatch);
    }

    if !config.address_prefixes.is_empty()
        && !config.address_prefixes.iter().any(|p| has_prefix(address, p))
    {
        return Err(Rejection::PrefixMismatch);
    }

    Ok(())
}

/// True if the advertisement passes every configured rule.
pub fn accepts(address: &str, name: &str, rssi: i8, config: &FilterConfig) -> bool {
    evaluate(address, name, rssi, config).is_ok()
}

/// Case-insensitive substring match where a space in `pattern` matches any
/// run of whitespace in `name`, including an empty one.
pub fn name_matches(name: &str, pattern: &str) -> bool {
    let name = name.as_bytes();
    let pattern = pattern.as_bytes();
    if pattern.is_empty() {
        return true;
    }
    (0..name.len()).any(|start| matches_at(&name[start..], pattern))
}

/// Does `pattern` match a prefix of `text`?
fn matches_at(text: &[u8], pattern: &[u8]) -> bool {
    let (mut i, mut j) = (0, 0);
    while j < pattern.len() {
        if pattern[j] == b' ' {
            // Greedy is safe: the next pattern byte is never whitespace.
            while i < text.len() && text[i].is_ascii_whitespace() {
                i += 1;
            }
            while j < pattern.len() && pattern[j] == b' ' {
                j += 1;
            }
            continue;
        }
        if i >= text.len() || !text[i].eq_ignore_ascii_case(&pattern[j]) {
            return false;
        }
        i += 1;
        j += 1;
    }
    true
}

/// ASCII case-insensitive `starts_with`.
pub fn has_prefix(address: &str, prefix: &str) -> bool {
    let (a, p) = (address.as_bytes(), prefix.as_bytes());
    a.len() >= p.len() && a[..p.len()].eq_ignore_ascii_case(p)
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    buf.clear();
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix_only(min_rssi: i8, prefixes: &[&str]) -> FilterConfig {
        let mut config = FilterConfig::new().with_min_rssi(min_rssi);
        for p in prefixes {
            config.add_address_prefix(p).unwrap();
        }
        config
    }

    // ── Rule order ──────────────────────────────────────────────────

    #[test]
    fn weak_signal_rejected_first() {
        let config = FilterConfig::from_defaults();
        // Name and prefix both fail too, but the signal rule runs first.
        assert_eq!(
            evaluate("00:00:00:00:00:00", "nothing", -90, &config),
            Err(Rejection::WeakSignal)
        );
    }

    #[test]
    fn signal_at_floor_passes() {
        let config = FilterConfig::new().with_min_rssi(-80);
        assert!(accepts("AA:BB:CC:DD:EE:FF", "", -80, &config));
        assert!(!accepts("AA:BB:CC:DD:EE:FF", "", -81, &config));
    }

    #[test]
    fn name_checked_before_prefix() {
        let config = FilterConfig::from_defaults();
        assert_eq!(
            evaluate("00:00:00:00:00:00", "Speaker", -50, &config),
            Err(Rejection::NameMismatch)
        );
        assert_eq!(
            evaluate("00:00:00:00:00:00", "Pixel Buds", -50, &config),
            Err(Rejection::PrefixMismatch)
        );
        assert_eq!(evaluate("3c:5a:b4:01:02:03", "Pixel Buds", -50, &config), Ok(()));
    }

    // ── Empty criteria ──────────────────────────────────────────────

    #[test]
    fn permissive_config_accepts_everything() {
        let config = FilterConfig::new();
        assert!(accepts("11:22:33:44:55:66", "", i8::MIN, &config));
        assert!(accepts("11:22:33:44:55:66", "anything", 0, &config));
    }

    #[test]
    fn blank_entries_are_not_constraints() {
        let mut config = FilterConfig::new();
        config.add_name_pattern("   ").unwrap();
        config.add_address_prefix("").unwrap();
        assert!(config.name_patterns.is_empty());
        assert!(config.address_prefixes.is_empty());
        assert!(accepts("11:22:33:44:55:66", "x", -20, &config));
    }

    #[test]
    fn empty_name_fails_when_patterns_configured() {
        let mut config = FilterConfig::new();
        config.add_name_pattern("Pixel").unwrap();
        assert_eq!(
            evaluate("11:22:33:44:55:66", "", -20, &config),
            Err(Rejection::NameMismatch)
        );
    }

    // ── Address prefixes ────────────────────────────────────────────

    #[test]
    fn prefix_scenario() {
        let config = prefix_only(-80, &["AA:BB:CC"]);
        assert!(accepts("AA:BB:CC:11:22:33", "X", -70, &config));
        assert_eq!(
            evaluate("11:22:33:AA:BB:CC", "X", -70, &config),
            Err(Rejection::PrefixMismatch)
        );
    }

    #[test]
    fn prefix_compare_ignores_case() {
        let config = prefix_only(-80, &["aa:bb:cc"]);
        assert_eq!(config.address_prefixes[0].as_str(), "AA:BB:CC");
        assert!(accepts("aa:Bb:cC:00:00:01", "", -10, &config));
    }

    #[test]
    fn any_listed_prefix_matches() {
        let config = prefix_only(-80, &["3C:5A:B4", "D4:3B:04"]);
        assert!(accepts("D4:3B:04:00:00:01", "", -10, &config));
        assert!(!accepts("D4:3B:05:00:00:01", "", -10, &config));
    }

    #[test]
    fn address_shorter_than_prefix_rejected() {
        assert!(!has_prefix("AA:B", "AA:BB:CC"));
        assert!(has_prefix("AA:BB:CC", "AA:BB:CC"));
    }

    #[test]
    fn prefix_list_capacity() {
        let mut config = FilterConfig::new();
        for _ in 0..MAX_ADDRESS_PREFIXES {
            config.add_address_prefix("AA").unwrap();
        }
        assert_eq!(config.add_address_prefix("BB"), Err(ConfigFull));
    }

    // ── Name patterns ───────────────────────────────────────────────

    #[test]
    fn name_match_is_case_insensitive_substring() {
        assert!(name_matches("My PIXEL buds", "Pixel"));
        assert!(name_matches("pixel", "Pixel"));
        assert!(!name_matches("Pix", "Pixel"));
    }

    #[test]
    fn space_in_pattern_matches_whitespace_runs() {
        assert!(name_matches("Fast Pair", "Fast Pair"));
        assert!(name_matches("FastPair", "Fast Pair"));
        assert!(name_matches("fast \t pair", "Fast Pair"));
        assert!(!name_matches("Fast-Pair", "Fast Pair"));
    }

    #[test]
    fn match_found_after_false_start() {
        assert!(name_matches("Galaxy Galaxy Buds2", "Galaxy Buds"));
    }

    #[test]
    fn empty_pattern_matches_anything() {
        assert!(name_matches("", ""));
        assert!(name_matches("abc", ""));
    }

    #[test]
    fn non_empty_pattern_never_matches_empty_name() {
        assert!(!name_matches("", "Pixel"));
    }

    #[test]
    fn oversized_pattern_rejected() {
        let mut config = FilterConfig::new();
        let long = "x".repeat(40);
        assert_eq!(config.add_name_pattern(&long), Err(ConfigFull));
    }

    // ── Purity ──────────────────────────────────────────────────────

    #[test]
    fn evaluation_is_repeatable() {
        let config = FilterConfig::from_defaults();
        let inputs = [
            ("3C:5A:B4:00:00:01", "Pixel Buds Pro", -60),
            ("3C:5A:B4:00:00:01", "Pixel Buds Pro", -81),
            ("D4:3B:04:00:00:01", "Galaxy  Buds", -10),
            ("00:11:22:33:44:55", "Fast Pair", -10),
        ];
        for (addr, name, rssi) in inputs {
            let first = evaluate(addr, name, rssi, &config);
            for _ in 0..3 {
                assert_eq!(evaluate(addr, name, rssi, &config), first);
            }
        }
    }

    #[test]
    fn defaults_loaded() {
        let config = FilterConfig::from_defaults();
        assert_eq!(config.min_rssi, MIN_RSSI_DBM);
        assert_eq!(config.name_patterns.len(), NAME_PATTERNS.len());
        assert_eq!(config.address_prefixes.len(), ADDRESS_PREFIXES.len());
    }

    // ── MAC formatting ──────────────────────────────────────────────

    #[test]
    fn format_mac_upper_hex() {
        let mut buf = MacString::new();
        format_mac(&[0x3c, 0x5a, 0xb4, 0x01, 0x0a, 0xff], &mut buf);
        assert_eq!(buf.as_str(), "3C:5A:B4:01:0A:FF");
    }
}
