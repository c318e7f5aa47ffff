//! PairScout library: portable Bluetooth LE proximity tracker.
//!
//! Scans for nearby devices, keeps a bounded registry of the ones that pass
//! the signal and identity filters, and dispatches operator actions (a pairing
//! protocol trigger or an audio playback) against a chosen device. Everything
//! here is `no_std` with no allocator and testable on any host with
//! `cargo test`. Platform binaries provide the radio, the action primitives
//! and the operator console through the [`platform::Platform`] trait.
//!
//! - `defaults`, `filter`, `registry`: signal policy and device bookkeeping
//! - `scan`: the [`Tracker`] lifecycle (start, wait, stop, advertisements)
//! - `dispatch`: target selection and action dispatch
//! - `advert`: raw advertisement payload parsing
//! - `protocol`, `comm`, `board`: operator console wire format and hardware
//!   constants

#![cfg_attr(not(test), no_std)]

pub mod advert;
pub mod board;
pub mod comm;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod platform;
pub mod protocol;
pub mod registry;
pub mod scan;

pub use dispatch::ActionPolicy;
pub use error::{InvalidInput, TrackerError};
pub use filter::FilterConfig;
pub use platform::{Platform, PlatformError};
pub use registry::{Device, DeviceRegistry};
pub use scan::{Observation, ScanState, ScanStats, Tracker, WaitOutcome};
