/// Serial NDJSON transport for the operator console.
///
/// The device streams device rows, status and command results as
/// newline-delimited JSON. Commands arrive the same way; a bare ESC byte
/// is the cancel key and never reaches the line buffer.

use crate::protocol::{DeviceMessage, HostCommand, RawCommand, MAX_MSG_LEN};

/// Serial baud rate
pub const SERIAL_BAUD: u32 = 115200;

/// Console cancel key
pub const ESC: u8 = 0x1B;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Deserialize a HostCommand from a JSON byte slice.
/// Every rejected non-blank line is logged at `warn`.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let raw = match serde_json_core::from_slice::<RawCommand>(trimmed) {
        Ok((raw, _)) => raw,
        Err(e) => {
            log::warn!("Malformed command ({}): {}", e, core::str::from_utf8(trimmed).unwrap_or("<binary>"));
            return None;
        }
    };

    let cmd = match raw.cmd.as_str() {
        "scan" => HostCommand::Scan,
        "stop" => HostCommand::Stop,
        "list" => HostCommand::List,
        "status" => HostCommand::GetStatus,
        "trigger" => HostCommand::Trigger {
            index: required(raw.index, "trigger", "index")?,
        },
        "play" => HostCommand::Play {
            index: required(raw.index, "play", "index")?,
            path: required(raw.path, "play", "path")?,
        },
        "pick" => HostCommand::Pick {
            path: required(raw.path, "pick", "path")?,
        },
        "play_target" => HostCommand::PlayTarget,
        "set_rssi" => HostCommand::SetRssi {
            min_rssi: required(raw.min_rssi, "set_rssi", "min_rssi")?,
        },
        other => {
            log::warn!("Unknown command '{}'", other);
            return None;
        }
    };
    Some(cmd)
}

fn required<T>(field: Option<T>, cmd: &str, name: &str) -> Option<T> {
    if field.is_none() {
        log::warn!("'{}' needs '{}'", cmd, name);
    }
    field
}

// ── Serial NDJSON reader ───────────────────────────────────────────────

/// What one input byte produced
#[derive(Debug, PartialEq)]
pub enum Input<'a> {
    /// Nothing yet
    Pending,
    /// Operator pressed ESC
    Cancel,
    /// A complete line (without newline)
    Line(&'a [u8]),
}

/// Serial NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
        }
    }

    /// Feed a byte into the reader.
    pub fn feed(&mut self, byte: u8) -> Input<'_> {
        if byte == ESC {
            Input::Cancel
        } else if byte == b'\n' || byte == b'\r' {
            if self.pos > 0 {
                let line = &self.buf[..self.pos];
                self.pos = 0;
                Input::Line(line)
            } else {
                Input::Pending
            }
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            Input::Pending
        } else {
            // Overflow, discard and reset
            self.pos = 0;
            Input::Pending
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && data[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &data[..end]
}
