/// Bounded registry of observed devices.
///
/// Holds at most `N` devices keyed by upper-cased address. When full, a new
/// address replaces the entry with the weakest RSSI. Storage is a fixed
/// `heapless::Vec`; no allocation.

use core::fmt;

use heapless::Vec;

use crate::protocol::{MacString, NameString};

/// One tracked advertiser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Upper-cased hardware address, unique within the registry
    pub address: MacString,
    /// Advertised name, may be empty
    pub name: NameString,
    /// Most recent signal strength (dBm)
    pub rssi: i8,
    /// Monotonic timestamp (ms) of the last matching observation
    pub last_seen_ms: u64,
    /// Matching observations so far; saturates at `u32::MAX`
    pub seen_count: u32,
}

/// What an `upsert` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// Address already tracked; entry refreshed
    Updated,
    /// New entry added to free space
    Inserted,
    /// Registry was full; `evicted` made room for the new entry
    Replaced { evicted: Device },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    EmptyAddress,
    AddressTooLong,
    NoCapacity,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAddress => write!(f, "advertisement has no address"),
            Self::AddressTooLong => write!(f, "address does not fit a MAC string"),
            Self::NoCapacity => write!(f, "registry has zero capacity"),
        }
    }
}

/// Fixed-capacity device registry
#[derive(Debug, Clone)]
pub struct DeviceRegistry<const N: usize> {
    devices: Vec<Device, N>,
}

impl<const N: usize> DeviceRegistry<N> {
    pub const fn new() -> Self {
        Self { devices: Vec::new() }
    }

    /// Record one accepted observation.
    pub fn upsert(&mut self, address: &str, name: &str, rssi: i8, now_ms: u64) -> Result<Upsert, RegistryError> {
        let address = normalize_address(address)?;

        if let Some(device) = self.devices.iter_mut().find(|d| d.address == address) {
            device.rssi = rssi;
            device.last_seen_ms = now_ms;
            device.seen_count = device.seen_count.saturating_add(1);
            if !name.is_empty() {
                device.name = truncate_name(name);
            }
            return Ok(Upsert::Updated);
        }

        let device = Device {
            address,
            name: truncate_name(name),
            rssi,
            last_seen_ms: now_ms,
            seen_count: 1,
        };

        if !self.devices.is_full() {
            let _ = self.devices.push(device);
            return Ok(Upsert::Inserted);
        }

        let weakest = self.weakest_index().ok_or(RegistryError::NoCapacity)?;
        // Keep the survivors' relative order so operator ordinals stay put.
        let evicted = self.devices.remove(weakest);
        let _ = self.devices.push(device);
        Ok(Upsert::Replaced { evicted })
    }

    /// Index of the lowest-RSSI entry; the first one wins on ties.
    fn weakest_index(&self) -> Option<usize> {
        let mut weakest: Option<(usize, i8)> = None;
        for (i, d) in self.devices.iter().enumerate() {
            match weakest {
                Some((_, rssi)) if d.rssi >= rssi => {}
                _ => weakest = Some((i, d.rssi)),
            }
        }
        weakest.map(|(i, _)| i)
    }

    pub fn count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// 1-based ordinal access over the current contents.
    pub fn get(&self, ordinal: usize) -> Option<&Device> {
        ordinal.checked_sub(1).and_then(|i| self.devices.get(i))
    }

    /// Look up by address, ignoring case.
    pub fn find(&self, address: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.address.as_str().eq_ignore_ascii_case(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

impl<const N: usize> Default for DeviceRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Upper-case `address` into a `MacString`.
pub fn normalize_address(address: &str) -> Result<MacString, RegistryError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(RegistryError::EmptyAddress);
    }
    let mut out = MacString::new();
    for c in address.chars() {
        out.push(c.to_ascii_uppercase())
            .map_err(|_| RegistryError::AddressTooLong)?;
    }
    Ok(out)
}

/// Copy `name`, dropping whole chars that do not fit.
fn truncate_name(name: &str) -> NameString {
    let mut out = NameString::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
