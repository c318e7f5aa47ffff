//! PairScout: ESP-IDF std firmware
//!
//! Thread-based platform adapter: NimBLE scanning via esp32-nimble, an NDJSON
//! operator console on the USB serial port, and a cancel button. The tracker
//! itself lives in the portable `pairscout` crate.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Condvar, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use pairscout::{advert, board, comm, defaults, dispatch, filter, protocol};
use pairscout::{
    ActionPolicy, Device, FilterConfig, Observation, Platform, PlatformError, ScanState, Tracker,
    TrackerError, WaitOutcome,
};

use comm::{Input, LineReader};
use esp_idf_svc::hal::gpio::{Input as GpioInput, InputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::task::block_on;
use protocol::{DeviceMessage, HostCommand, MacString, MsgBuffer, PathString, MAX_MSG_LEN, VERSION};

use esp32_nimble::{BLEDevice, BLEScan};

// ── Shared state ─────────────────────────────────────────────────────

static SCANNING: AtomicBool = AtomicBool::new(false);
static CANCEL: AtomicBool = AtomicBool::new(false);
static TRACKER: OnceLock<Scout> = OnceLock::new();
/// File remembered by the `pick` command
static PICKED: Mutex<Option<PathString>> = Mutex::new(None);

/// Controller-reported "RSSI not available"
const RSSI_NOT_AVAILABLE: i8 = 127;

const BUTTON_POLL_MS: u64 = 50;

// ── Platform adapter ─────────────────────────────────────────────────

/// NimBLE-backed platform. Scanning is gated by `SCANNING`, which the scan
/// thread watches between and during rounds. This firmware carries no Fast
/// Pair or audio stack, so both action primitives report unavailable.
///
/// `pause` parks on a condvar that is nudged by new devices, stop and
/// cancel, so a waiting thread resumes without sitting out the poll period.
struct NimbleRadio {
    boot: Instant,
    nudged: Mutex<bool>,
    nudge: Condvar,
}

impl NimbleRadio {
    fn new() -> Self {
        Self {
            boot: Instant::now(),
            nudged: Mutex::new(false),
            nudge: Condvar::new(),
        }
    }

    /// End the current `pause` early.
    fn nudge(&self) {
        if let Ok(mut nudged) = self.nudged.lock() {
            *nudged = true;
            self.nudge.notify_all();
        }
    }

    fn cancel(&self) {
        CANCEL.store(true, Ordering::Relaxed);
        self.nudge();
    }
}

impl Platform for NimbleRadio {
    fn start_scan(&self) -> Result<(), PlatformError> {
        CANCEL.store(false, Ordering::Relaxed);
        SCANNING.store(true, Ordering::Release);
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), PlatformError> {
        SCANNING.store(false, Ordering::Release);
        self.nudge();
        Ok(())
    }

    async fn trigger_action(&self, _address: &str) -> Result<bool, PlatformError> {
        Err(PlatformError::Unavailable("fast_pair_action"))
    }

    async fn play_file(&self, _address: &str, _path: &str) -> Result<bool, PlatformError> {
        Err(PlatformError::Unavailable("audio_playback"))
    }

    fn cancel_requested(&self) -> bool {
        CANCEL.load(Ordering::Relaxed)
    }

    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    // Waits run on their own thread, so blocking here only parks that thread.
    async fn pause(&self, ms: u32) {
        let Ok(guard) = self.nudged.lock() else {
            thread::sleep(Duration::from_millis(ms.into()));
            return;
        };
        let timeout = Duration::from_millis(ms.into());
        if let Ok((mut nudged, _)) = self.nudge.wait_timeout_while(guard, timeout, |n| !*n) {
            *nudged = false;
        }
    }
}

type Scout = Tracker<NimbleRadio>;

fn uptime_secs(tracker: &Scout) -> u32 {
    (tracker.platform().now_ms() / 1000) as u32
}

fn main() -> anyhow::Result<()> {
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("PairScout v{} starting on {} (std)", VERSION, board::BOARD_NAME);

    let mut filter = FilterConfig::from_defaults();
    if let Ok(level) = option_env!("PAIRSCOUT_MIN_RSSI").unwrap_or("").parse::<i8>() {
        filter = filter.with_min_rssi(level);
    }
    log::info!(
        "Filter loaded: min {} dBm, {} name patterns, {} address prefixes",
        filter.min_rssi,
        filter.name_patterns.len(),
        filter.address_prefixes.len(),
    );

    let policy = ActionPolicy {
        optimistic_when_unavailable: option_env!("PAIRSCOUT_OPTIMISTIC").is_some(),
    };
    if policy.optimistic_when_unavailable {
        log::warn!("Optimistic action policy: missing primitives report success");
    }

    TRACKER
        .set(Tracker::new(NimbleRadio::new(), filter, policy))
        .map_err(|_| anyhow::anyhow!("tracker already initialised"))?;
    let tracker = TRACKER
        .get()
        .ok_or_else(|| anyhow::anyhow!("tracker missing"))?;

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;

    // Hold power on (M5StickC Plus2)
    #[cfg(feature = "m5stickc")]
    let _power_hold = {
        let mut p = PinDriver::output(peripherals.pins.gpio4)?;
        p.set_high()?;
        p
    };

    // ── Cancel button ────────────────────────────────────────────────

    #[cfg(feature = "xiao")]
    {
        let mut button = PinDriver::input(peripherals.pins.gpio0)?;
        button.set_pull(esp_idf_svc::hal::gpio::Pull::Up)?;
        spawn_button_thread(tracker, button)?;
    }

    // GPIO37 is input-only with an external pull-up
    #[cfg(all(feature = "m5stickc", not(feature = "xiao")))]
    spawn_button_thread(tracker, PinDriver::input(peripherals.pins.gpio37)?)?;

    if let Some(pin) = board::CANCEL_BUTTON_PIN {
        log::info!("Cancel button on GPIO{}", pin);
    }

    // ── Channels ─────────────────────────────────────────────────────

    let (output_tx, output_rx) = mpsc::sync_channel::<MsgBuffer>(16);
    let (cmd_tx, cmd_rx) = mpsc::sync_channel::<HostCommand>(4);

    // ── Output thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("output".into())
        .stack_size(4096)
        .spawn(move || {
            output_thread(output_rx);
        })?;
    log::info!("Output thread spawned");

    // ── Command thread ───────────────────────────────────────────────

    let cmd_output_tx = output_tx.clone();
    let console_output_tx = output_tx.clone();
    thread::Builder::new()
        .name("command".into())
        .stack_size(6144)
        .spawn(move || {
            command_thread(tracker, cmd_rx, cmd_output_tx);
        })?;
    log::info!("Command thread spawned");

    // ── BLE scan thread ──────────────────────────────────────────────

    thread::Builder::new()
        .name("blescan".into())
        .stack_size(4096)
        .spawn(move || ble_scan_thread(tracker))?;
    log::info!("BLE scan thread spawned");

    // ── Console reader (main thread) ─────────────────────────────────

    console_loop(tracker, cmd_tx, console_output_tx);
}

// ── Cancel button ────────────────────────────────────────────────────

fn spawn_button_thread<T>(
    tracker: &'static Scout,
    button: PinDriver<'static, T, GpioInput>,
) -> anyhow::Result<()>
where
    T: InputPin + Send + 'static,
{
    thread::Builder::new()
        .name("button".into())
        .stack_size(2048)
        .spawn(move || {
            let mut was_pressed = false;
            loop {
                // Active low
                let pressed = button.is_low();
                if pressed && !was_pressed {
                    log::info!("Cancel button pressed");
                    tracker.platform().cancel();
                }
                was_pressed = pressed;
                thread::sleep(Duration::from_millis(BUTTON_POLL_MS));
            }
        })?;
    Ok(())
}

// ── Console reader ───────────────────────────────────────────────────

fn console_loop(
    tracker: &'static Scout,
    cmd_tx: SyncSender<HostCommand>,
    output_tx: SyncSender<MsgBuffer>,
) -> ! {
    let mut reader = LineReader::new();
    let mut stdin = std::io::stdin();
    let mut byte = [0u8; 1];

    log::info!("Console ready at {} baud", comm::SERIAL_BAUD);

    loop {
        match stdin.read(&mut byte) {
            Ok(1) => match reader.feed(byte[0]) {
                Input::Cancel => {
                    log::info!("ESC received, cancelling");
                    tracker.platform().cancel();
                }
                Input::Line(line) => match comm::parse_command(line) {
                    Some(cmd) => {
                        if cmd_tx.try_send(cmd).is_err() {
                            log::warn!("Command queue full, dropping command");
                            send_error(&output_tx, "command", "busy");
                        }
                    }
                    None => send_error(&output_tx, "parse", "bad_command"),
                },
                Input::Pending => {}
            },
            // Nothing buffered on the UART yet
            _ => thread::sleep(Duration::from_millis(10)),
        }
    }
}

// ── Output thread ────────────────────────────────────────────────────

fn output_thread(output_rx: mpsc::Receiver<MsgBuffer>) {
    log::info!("Output thread started");

    let mut stdout = std::io::stdout();
    while let Ok(msg) = output_rx.recv() {
        let written = stdout.write_all(&msg).and_then(|_| stdout.flush());
        if let Err(e) = written {
            log::warn!("Console write failed: {}", e);
        }
    }
}

fn send(output_tx: &SyncSender<MsgBuffer>, msg: &DeviceMessage) {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok();
    if let Some(len) = comm::serialize_message(msg, &mut buf) {
        buf.truncate(len);
        let _ = output_tx.try_send(buf);
    }
}

fn send_result(output_tx: &SyncSender<MsgBuffer>, op: &'static str, outcome: Result<Option<&MacString>, &TrackerError>) {
    let msg = match outcome {
        Ok(mac) => DeviceMessage::Result {
            op,
            ok: true,
            mac,
            error: None,
        },
        Err(e) => DeviceMessage::Result {
            op,
            ok: false,
            mac: None,
            error: Some(e.code()),
        },
    };
    send(output_tx, &msg);
}

fn send_error(output_tx: &SyncSender<MsgBuffer>, op: &'static str, code: &'static str) {
    let msg = DeviceMessage::Result {
        op,
        ok: false,
        mac: None,
        error: Some(code),
    };
    send(output_tx, &msg);
}

fn send_status(tracker: &Scout, output_tx: &SyncSender<MsgBuffer>) {
    let stats = tracker.stats();
    let target = tracker.target();
    let msg = DeviceMessage::Status {
        state: tracker.state().as_str(),
        devices: tracker.device_count() as u8,
        capacity: defaults::MAX_TRACKED_DEVICES as u8,
        target: target.as_ref().map(|d| &d.address),
        accepted: stats.accepted,
        rejected: stats.rejected,
        evicted: stats.evicted,
        uptime: uptime_secs(tracker),
        board: board::BOARD_NAME,
        version: VERSION,
    };
    send(output_tx, &msg);
}

fn send_listing(tracker: &Scout, output_tx: &SyncSender<MsgBuffer>) {
    let target = tracker.target().map(|d| d.address);
    for (i, device) in tracker.list_devices().iter().enumerate() {
        let msg = DeviceMessage::Device {
            idx: (i + 1) as u8,
            mac: &device.address,
            name: &device.name,
            rssi: device.rssi,
            seen: device.seen_count,
            target: target.as_ref() == Some(&device.address),
            ts: (device.last_seen_ms & 0xFFFF_FFFF) as u32,
        };
        send(output_tx, &msg);
    }
}

// ── Command thread ───────────────────────────────────────────────────

fn command_thread(
    tracker: &'static Scout,
    cmd_rx: mpsc::Receiver<HostCommand>,
    output_tx: SyncSender<MsgBuffer>,
) {
    while let Ok(cmd) = cmd_rx.recv() {
        log::debug!("Command: {:?}", cmd);

        match cmd {
            // One waiter per scan
            HostCommand::Scan if tracker.state() == ScanState::Scanning => {
                log::info!("Scan already running");
                send_status(tracker, &output_tx);
            }
            HostCommand::Scan => match tracker.start_scan() {
                Ok(()) => {
                    let tx = output_tx.clone();
                    spawn_action("wait", move || wait_and_report(tracker, &tx));
                }
                Err(e) => send_result(&output_tx, "scan", Err(&e)),
            },
            HostCommand::Stop => {
                tracker.stop_scan();
                send_result(&output_tx, "stop", Ok(None));
            }
            HostCommand::List => send_listing(tracker, &output_tx),
            HostCommand::GetStatus => send_status(tracker, &output_tx),
            HostCommand::Trigger { index } => {
                let tx = output_tx.clone();
                spawn_action("trigger", move || {
                    let outcome = block_on(tracker.select_and_trigger(index.into()));
                    report_action(&tx, "trigger", outcome);
                });
            }
            HostCommand::Play { index, path } => {
                let tx = output_tx.clone();
                spawn_action("play", move || {
                    let outcome = block_on(tracker.select_and_play(index.into(), &path));
                    report_action(&tx, "play", outcome);
                });
            }
            HostCommand::Pick { path } => match dispatch::validate_path(&path) {
                Ok(()) => {
                    log::info!("Picked {}", path);
                    if let Ok(mut picked) = PICKED.lock() {
                        *picked = Some(path);
                    }
                    send_result(&output_tx, "pick", Ok(None));
                }
                Err(e) => send_result(&output_tx, "pick", Err(&TrackerError::from(e))),
            },
            HostCommand::PlayTarget => {
                let picked = PICKED.lock().ok().and_then(|p| p.clone());
                let tx = output_tx.clone();
                spawn_action("play_target", move || {
                    let path = picked.as_deref().unwrap_or("");
                    let outcome = block_on(tracker.play_on_target(path));
                    report_action(&tx, "play_target", outcome);
                });
            }
            HostCommand::SetRssi { min_rssi } => {
                let config = tracker.filter_config().with_min_rssi(min_rssi);
                tracker.set_filter_config(config);
                log::info!("Minimum RSSI set to {} dBm", min_rssi);
                send_result(&output_tx, "set_rssi", Ok(None));
            }
        }
    }
}

/// Run an action on its own thread so the console stays responsive.
fn spawn_action(name: &str, f: impl FnOnce() + Send + 'static) {
    let spawned = thread::Builder::new()
        .name(name.into())
        .stack_size(6144)
        .spawn(f);
    if let Err(e) = spawned {
        log::error!("Failed to spawn {} thread: {}", name, e);
    }
}

fn report_action(output_tx: &SyncSender<MsgBuffer>, op: &'static str, outcome: Result<Device, TrackerError>) {
    match outcome {
        Ok(device) => send_result(output_tx, op, Ok(Some(&device.address))),
        Err(e) => send_result(output_tx, op, Err(&e)),
    }
}

fn wait_and_report(tracker: &Scout, output_tx: &SyncSender<MsgBuffer>) {
    let error = match block_on(tracker.wait_for_first_device()) {
        WaitOutcome::Found => None,
        WaitOutcome::Cancelled => Some("cancelled"),
        WaitOutcome::Interrupted => Some("interrupted"),
    };
    let target = tracker.target();
    let msg = DeviceMessage::Result {
        op: "scan",
        ok: error.is_none(),
        mac: target.as_ref().map(|d| &d.address),
        error,
    };
    send(output_tx, &msg);
    if error.is_none() {
        send_listing(tracker, output_tx);
    }
}

// ── BLE scan thread ──────────────────────────────────────────────────

fn ble_scan_thread(tracker: &'static Scout) {
    log::info!("BLE scan thread started");

    let ble_device = BLEDevice::take();
    let mut scan = BLEScan::new();
    scan.active_scan(true).interval(100).window(99);

    loop {
        if !SCANNING.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(defaults::WAIT_POLL_MS.into()));
            continue;
        }

        let round = block_on(scan.start(
            ble_device,
            defaults::SCAN_ROUND_MS as i32,
            |device, data| {
                // End the round early once the tracker stops scanning
                if !SCANNING.load(Ordering::Acquire) {
                    return Some(());
                }

                let mut mac = MacString::new();
                filter::format_mac(&device.addr().as_be_bytes(), &mut mac);
                let name = advert::local_name(data.payload()).unwrap_or("");
                let rssi = match device.rssi() {
                    RSSI_NOT_AVAILABLE => defaults::RSSI_UNKNOWN,
                    rssi => rssi,
                };

                if let Observation::Tracked(_) = tracker.on_advertisement(&mac, name, rssi) {
                    tracker.platform().nudge();
                }
                None::<()> // Continue scanning
            },
        ));

        if let Err(e) = round {
            log::warn!("BLE scan round failed: {:?}", e);
            thread::sleep(Duration::from_millis(defaults::SCAN_ROUND_MS.into()));
        }
    }
}
