/// JSON message protocol for the operator console.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Maximum length for advertised device names
pub type NameString = String<33>;

/// Maximum length for operator-supplied file paths
pub type PathString = String<64>;

/// Messages sent from the device to the operator console
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// One row of the device listing
    #[serde(rename = "device")]
    Device {
        /// 1-based ordinal used by `trigger` / `play`
        idx: u8,
        mac: &'a MacString,
        name: &'a NameString,
        rssi: i8,
        /// Number of matching observations
        seen: u32,
        /// Whether this device is the current target
        target: bool,
        /// Uptime in milliseconds when last seen
        ts: u32,
    },
    /// Tracker status report
    #[serde(rename = "status")]
    Status {
        /// "idle", "scanning" or "stopped"
        state: &'static str,
        devices: u8,
        capacity: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<&'a MacString>,
        accepted: u32,
        rejected: u32,
        evicted: u32,
        /// Uptime in seconds
        uptime: u32,
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
    },
    /// Completion of an operator command
    #[serde(rename = "result")]
    Result {
        /// Command name the result belongs to
        op: &'static str,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        mac: Option<&'a MacString>,
        /// Stable error code (`TrackerError::code`)
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'static str>,
    },
}

/// Commands sent from the operator console to the device.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, PartialEq)]
pub enum HostCommand {
    /// Start a scan and wait for the first matching device
    Scan,
    /// Stop scanning
    Stop,
    /// List tracked devices
    List,
    /// Request current status
    GetStatus,
    /// Select device `index` and trigger the action on it
    Trigger { index: u8 },
    /// Select device `index` and play `path` on it
    Play { index: u8, path: PathString },
    /// Remember `path` for `PlayTarget`
    Pick { path: PathString },
    /// Play the remembered file on the current target
    PlayTarget,
    /// Update minimum RSSI threshold
    SetRssi {
        /// Minimum RSSI (negative dBm value)
        min_rssi: i8,
    },
}

/// Wire format for host commands: a flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: heapless::String<16>,
    #[serde(default)]
    pub min_rssi: Option<i8>,
    #[serde(default)]
    pub index: Option<u8>,
    #[serde(default)]
    pub path: Option<PathString>,
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 512;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json<'b>(msg: &DeviceMessage, buf: &'b mut [u8]) -> &'b str {
        let len = serde_json_core::to_slice(msg, buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap()
    }

    #[test]
    fn host_command_equality() {
        assert_eq!(HostCommand::Scan, HostCommand::Scan);
        assert_eq!(
            HostCommand::SetRssi { min_rssi: -75 },
            HostCommand::SetRssi { min_rssi: -75 }
        );
        assert_ne!(HostCommand::Scan, HostCommand::Stop);
        assert_ne!(
            HostCommand::Trigger { index: 1 },
            HostCommand::Trigger { index: 2 }
        );
    }

    // ── DeviceMessage serialization ─────────────────────────────────

    #[test]
    fn serialize_device_row() {
        let mac = MacString::try_from("3C:5A:B4:11:22:33").unwrap();
        let name = NameString::try_from("Pixel Buds").unwrap();
        let msg = DeviceMessage::Device {
            idx: 2,
            mac: &mac,
            name: &name,
            rssi: -61,
            seen: 4,
            target: true,
            ts: 1500,
        };
        let mut buf = [0u8; 256];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"device""#));
        assert!(json.contains(r#""idx":2"#));
        assert!(json.contains(r#""mac":"3C:5A:B4:11:22:33""#));
        assert!(json.contains(r#""name":"Pixel Buds""#));
        assert!(json.contains(r#""rssi":-61"#));
        assert!(json.contains(r#""seen":4"#));
        assert!(json.contains(r#""target":true"#));
    }

    #[test]
    fn serialize_status_without_target() {
        let msg = DeviceMessage::Status {
            state: "scanning",
            devices: 0,
            capacity: 10,
            target: None,
            accepted: 0,
            rejected: 12,
            evicted: 0,
            uptime: 120,
            board: "test_board",
            version: "0.1.0",
        };
        let mut buf = [0u8; 256];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""state":"scanning""#));
        assert!(json.contains(r#""rejected":12"#));
        assert!(json.contains(r#""board":"test_board""#));
        assert!(!json.contains("target"));
    }

    #[test]
    fn serialize_status_with_target() {
        let mac = MacString::try_from("D4:3B:04:00:00:01").unwrap();
        let msg = DeviceMessage::Status {
            state: "stopped",
            devices: 1,
            capacity: 10,
            target: Some(&mac),
            accepted: 1,
            rejected: 0,
            evicted: 0,
            uptime: 3,
            board: "test_board",
            version: "0.1.0",
        };
        let mut buf = [0u8; 256];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""target":"D4:3B:04:00:00:01""#));
    }

    #[test]
    fn serialize_failed_result() {
        let msg = DeviceMessage::Result {
            op: "trigger",
            ok: false,
            mac: None,
            error: Some("empty_registry"),
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"result""#));
        assert!(json.contains(r#""op":"trigger""#));
        assert!(json.contains(r#""ok":false"#));
        assert!(json.contains(r#""error":"empty_registry""#));
        assert!(!json.contains("mac"));
    }

    #[test]
    fn serialize_ok_result_omits_error() {
        let mac = MacString::try_from("AA:BB:CC:DD:EE:FF").unwrap();
        let msg = DeviceMessage::Result {
            op: "play",
            ok: true,
            mac: Some(&mac),
            error: None,
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains(r#""mac":"AA:BB:CC:DD:EE:FF""#));
        assert!(!json.contains("error"));
    }

    // ── Version constant ────────────────────────────────────────────

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
