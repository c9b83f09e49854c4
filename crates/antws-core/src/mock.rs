//! Simulated sticks and sensors.
//!
//! These stand in for real ANT+ hardware in tests, in the `simulated_bridge`
//! example and behind the service's `--simulate` switch.
//!
//! # Features
//!
//! - **Presence and open failures**: a stick can be absent or refuse to open
//! - **Duplicate signals**: ready and attach signals can fire repeatedly
//! - **Latency**: ready and attach can be delayed
//! - **Telemetry**: attached sensors can emit plausible frames on a timer
//!
//! Every simulated object counts what was asked of it, and a shared
//! [`Journal`] records the order of driver calls across sensors.
//!
//! ```
//! use std::sync::Arc;
//! use antws_core::{SensorScanner, SensorCategory, SharedTransport};
//! use antws_core::mock::{SimulatedAntPlus, SimulatedStick};
//! use antws_types::profile::HEART_RATE;
//!
//! #[tokio::main]
//! async fn main() {
//!     let sim = SimulatedAntPlus::new();
//!     let category = SensorCategory::from_profile(&HEART_RATE, sim.factory_for(&HEART_RATE)).unwrap();
//!     let stick: SharedTransport = Arc::new(SimulatedStick::new("GarminStick3"));
//!
//!     let instance = SensorScanner::default().scan(&category, &stick).await.unwrap();
//!     assert_eq!(instance.category(), "hr");
//!     assert_eq!(sim.sensors("hr")[0].scan_calls(), 1);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use antws_types::{SensorProfile, TelemetryFrame};
use rand::Rng;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::DriverFactory;
use crate::sensor::{DriverError, SensorDriver, TelemetryHandler};
use crate::signal::OneShot;
use crate::transport::{SharedTransport, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered record of driver calls, shared by every sensor of a backend.
///
/// Entries look like `create:hr`, `begin_scan:hr`, `attached:hr` and
/// `subscribe:hr:hbData`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: String) {
        lock(&self.0).push(entry);
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }
}

/// A simulated USB stick.
///
/// Presence, the result of `open()` and how the ready signal behaves are all
/// fixed at construction.
pub struct SimulatedStick {
    model: String,
    present: bool,
    open_result: bool,
    ready_firings: u32,
    ready_delay: Duration,
    presence_checks: AtomicU32,
    open_calls: AtomicU32,
    ready: Arc<ReadySlot>,
}

/// The registered ready listener, dropped once it has fired.
#[derive(Debug, Default)]
struct ReadySlot {
    listener: Mutex<Option<OneShot<()>>>,
    fired: AtomicU32,
    accepted: AtomicU32,
}

impl ReadySlot {
    fn fire(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
        let listener = lock(&self.listener).take();
        if listener.is_some_and(|ready| ready.fire(())) {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl SimulatedStick {
    /// A present stick that opens and becomes ready immediately.
    pub fn new(model: &str) -> Self {
        Self::builder(model).build()
    }

    /// Start configuring a stick.
    pub fn builder(model: &str) -> SimulatedStickBuilder {
        SimulatedStickBuilder::new(model)
    }

    /// How many times `is_present` was called.
    pub fn presence_checks(&self) -> u32 {
        self.presence_checks.load(Ordering::Relaxed)
    }

    /// How many times `open` was called.
    pub fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::Relaxed)
    }

    /// How many times the ready signal was fired.
    pub fn ready_fired(&self) -> u32 {
        self.ready.fired.load(Ordering::Relaxed)
    }

    /// How many ready firings were accepted (at most one).
    pub fn ready_accepted(&self) -> u32 {
        self.ready.accepted.load(Ordering::Relaxed)
    }

    /// Whether a ready listener is registered and has not fired yet.
    pub fn has_ready_listener(&self) -> bool {
        lock(&self.ready.listener).is_some()
    }
}

impl fmt::Debug for SimulatedStick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedStick")
            .field("model", &self.model)
            .field("present", &self.present)
            .field("open_calls", &self.open_calls())
            .finish()
    }
}

impl Transport for SimulatedStick {
    fn model(&self) -> &str {
        &self.model
    }

    fn is_present(&self) -> bool {
        self.presence_checks.fetch_add(1, Ordering::Relaxed);
        self.present
    }

    fn open(&self) -> bool {
        self.open_calls.fetch_add(1, Ordering::Relaxed);
        if !self.open_result {
            return false;
        }

        if !self.has_ready_listener() {
            return true;
        }
        let firings = self.ready_firings;
        let ready = Arc::clone(&self.ready);

        match Handle::try_current() {
            Ok(handle) if !self.ready_delay.is_zero() => {
                let delay = self.ready_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    for _ in 0..firings {
                        ready.fire();
                    }
                });
            }
            _ => {
                for _ in 0..firings {
                    ready.fire();
                }
            }
        }
        true
    }

    fn on_ready(&self, ready: OneShot<()>) {
        *lock(&self.ready.listener) = Some(ready);
    }
}

/// Builder for [`SimulatedStick`].
#[derive(Debug, Clone)]
pub struct SimulatedStickBuilder {
    model: String,
    present: bool,
    open_result: bool,
    ready_firings: u32,
    ready_delay: Duration,
}

impl SimulatedStickBuilder {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            present: true,
            open_result: true,
            ready_firings: 1,
            ready_delay: Duration::ZERO,
        }
    }

    /// Whether the stick reports presence.
    #[must_use]
    pub fn present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }

    /// What `open()` returns.
    #[must_use]
    pub fn open_result(mut self, result: bool) -> Self {
        self.open_result = result;
        self
    }

    /// Fire the ready signal this many times after a successful open.
    #[must_use]
    pub fn ready_firings(mut self, firings: u32) -> Self {
        self.ready_firings = firings;
        self
    }

    /// Delay the ready signal.
    #[must_use]
    pub fn ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Build the stick.
    pub fn build(self) -> SimulatedStick {
        SimulatedStick {
            model: self.model,
            present: self.present,
            open_result: self.open_result,
            ready_firings: self.ready_firings,
            ready_delay: self.ready_delay,
            presence_checks: AtomicU32::new(0),
            open_calls: AtomicU32::new(0),
            ready: Arc::new(ReadySlot::default()),
        }
    }
}

/// How a simulated sensor reacts to a scan.
#[derive(Debug, Clone)]
struct SensorBehavior {
    present: bool,
    fail_scan: bool,
    attach_firings: u32,
    attach_delay: Duration,
    frame_interval: Option<Duration>,
}

struct SensorInner {
    category: String,
    stick_model: String,
    event_names: Vec<String>,
    behavior: SensorBehavior,
    attached: Mutex<Option<OneShot<()>>>,
    handlers: Mutex<HashMap<String, Vec<Arc<TelemetryHandler>>>>,
    scan_calls: AtomicU32,
    attach_fired: AtomicU32,
    attach_accepted: AtomicU32,
    frames_emitted: AtomicU64,
    journal: Journal,
    cancel: CancellationToken,
}

impl Drop for SensorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A simulated sensor driver.
///
/// Cheap to clone; clones share state, so a test can keep one while the
/// registry owns another.
#[derive(Clone)]
pub struct SimulatedSensor {
    inner: Arc<SensorInner>,
}

impl SimulatedSensor {
    fn new(
        category: &str,
        stick_model: &str,
        event_names: Vec<String>,
        behavior: SensorBehavior,
        journal: Journal,
    ) -> Self {
        Self {
            inner: Arc::new(SensorInner {
                category: category.to_string(),
                stick_model: stick_model.to_string(),
                event_names,
                behavior,
                attached: Mutex::new(None),
                handlers: Mutex::new(HashMap::new()),
                scan_calls: AtomicU32::new(0),
                attach_fired: AtomicU32::new(0),
                attach_accepted: AtomicU32::new(0),
                frames_emitted: AtomicU64::new(0),
                journal,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Category this sensor was created for.
    pub fn category(&self) -> &str {
        &self.inner.category
    }

    /// Model of the stick the driver was bound to.
    pub fn stick_model(&self) -> &str {
        &self.inner.stick_model
    }

    /// How many times `begin_scan` was called.
    pub fn scan_calls(&self) -> u32 {
        self.inner.scan_calls.load(Ordering::Relaxed)
    }

    /// How many times the attach signal was fired.
    pub fn attach_fired(&self) -> u32 {
        self.inner.attach_fired.load(Ordering::Relaxed)
    }

    /// How many attach firings were accepted (at most one).
    pub fn attach_accepted(&self) -> u32 {
        self.inner.attach_accepted.load(Ordering::Relaxed)
    }

    /// Whether an attach listener is registered and has not fired yet.
    pub fn has_attach_listener(&self) -> bool {
        lock(&self.inner.attached).is_some()
    }

    /// Frames delivered to at least one handler.
    pub fn frames_emitted(&self) -> u64 {
        self.inner.frames_emitted.load(Ordering::Relaxed)
    }

    /// Handlers registered for `event_name`.
    pub fn handler_count(&self, event_name: &str) -> usize {
        lock(&self.inner.handlers)
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Fire the attach signal as the radio would.
    ///
    /// Returns `true` only for the firing that settled the signal. Once
    /// settled the listener is dropped, so further firings are counted but
    /// have no effect.
    pub fn fire_attached(&self) -> bool {
        self.inner.attach_fired.fetch_add(1, Ordering::Relaxed);
        let signal = lock(&self.inner.attached).take();
        let accepted = signal.is_some_and(|s| s.fire(()));
        if accepted {
            self.inner.attach_accepted.fetch_add(1, Ordering::Relaxed);
            self.inner
                .journal
                .record(format!("attached:{}", self.inner.category));
            self.start_frames();
        }
        accepted
    }

    /// Deliver `frame` to every handler of `event_name`.
    ///
    /// Returns the number of handlers invoked; frames on streams nobody
    /// subscribed to are dropped, as on the air.
    pub fn emit(&self, event_name: &str, frame: TelemetryFrame) -> usize {
        let handlers: Vec<Arc<TelemetryHandler>> = lock(&self.inner.handlers)
            .get(event_name)
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler(frame.clone());
        }
        if !handlers.is_empty() {
            self.inner.frames_emitted.fetch_add(1, Ordering::Relaxed);
        }
        handlers.len()
    }

    /// Stop the periodic telemetry task, if one is running.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    fn fire_attach_burst(&self) {
        for _ in 0..self.inner.behavior.attach_firings {
            self.fire_attached();
        }
    }

    fn start_frames(&self) {
        let Some(interval) = self.inner.behavior.frame_interval else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            return;
        };

        let weak: Weak<SensorInner> = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        handle.spawn(async move {
            let mut tick = 0u64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                tick += 1;
                let sensor = SimulatedSensor { inner };
                for event_name in &sensor.inner.event_names {
                    sensor.emit(event_name, sample_frame(event_name, tick));
                }
            }
        });
    }
}

impl fmt::Debug for SimulatedSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedSensor")
            .field("category", &self.inner.category)
            .field("stick", &self.inner.stick_model)
            .field("scan_calls", &self.scan_calls())
            .field("attach_accepted", &self.attach_accepted())
            .finish()
    }
}

impl SensorDriver for SimulatedSensor {
    fn begin_scan(&self) -> Result<(), DriverError> {
        self.inner.scan_calls.fetch_add(1, Ordering::Relaxed);
        self.inner
            .journal
            .record(format!("begin_scan:{}", self.inner.category));

        let behavior = &self.inner.behavior;
        if behavior.fail_scan {
            return Err(DriverError::new(format!(
                "{} channel could not be opened",
                self.inner.category
            )));
        }
        if !behavior.present {
            debug!("No simulated {} device in range", self.inner.category);
            return Ok(());
        }

        match Handle::try_current() {
            Ok(handle) if !behavior.attach_delay.is_zero() => {
                let delay = behavior.attach_delay;
                let sensor = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    sensor.fire_attach_burst();
                });
            }
            _ => self.fire_attach_burst(),
        }
        Ok(())
    }

    fn on_attached(&self, attached: OneShot<()>) {
        *lock(&self.inner.attached) = Some(attached);
    }

    fn subscribe(&self, event_name: &str, handler: TelemetryHandler) {
        self.inner.journal.record(format!(
            "subscribe:{}:{}",
            self.inner.category, event_name
        ));
        lock(&self.inner.handlers)
            .entry(event_name.to_string())
            .or_default()
            .push(Arc::new(handler));
    }
}

/// A plausible telemetry frame for one of the ANT+ event streams.
///
/// `tick` counts up from 1 and drives the cumulative fields.
pub fn sample_frame(event_name: &str, tick: u64) -> TelemetryFrame {
    let mut rng = rand::rng();
    let frame = TelemetryFrame::new().with("deviceId", 12345);
    match event_name {
        "hbData" => {
            let heart_rate: u32 = rng.random_range(60..=180);
            frame
                .with("heartRate", heart_rate)
                .with("beatCount", tick % 256)
                .with("beatTime", (tick * 1024) % 65536)
        }
        "powerData" => frame
            .with("power", rng.random_range(80u32..=400))
            .with("cadence", rng.random_range(60u32..=110)),
        "cadenceData" => frame.with("cadence", rng.random_range(60u32..=110)),
        "speedData" => {
            let speed: f64 = rng.random_range(15.0..45.0);
            frame
                .with("speed", (speed * 10.0).round() / 10.0)
                .with("distance", tick * 8)
        }
        "fitnessData" => frame
            .with("state", "IN_USE")
            .with("power", rng.random_range(80u32..=300))
            .with("elapsedTime", tick)
            .with("distance", tick * 6),
        "ssdData" => frame
            .with("speed", rng.random_range(2.0f64..5.0))
            .with("cadence", rng.random_range(75u32..=95))
            .with("distance", tick * 3)
            .with("strides", tick * 2),
        _ => frame.with("tick", tick),
    }
}

/// A simulated ANT+ radio environment.
///
/// Hands out driver factories for each profile and remembers every sensor it
/// built. All sensors attach on scan unless marked absent or failing.
#[derive(Clone)]
pub struct SimulatedAntPlus {
    attach_firings: u32,
    attach_delay: Duration,
    attach_delays: HashMap<String, Duration>,
    frame_interval: Option<Duration>,
    absent: HashSet<String>,
    failing: HashSet<String>,
    sensors: Arc<Mutex<HashMap<String, Vec<SimulatedSensor>>>>,
    journal: Journal,
}

impl Default for SimulatedAntPlus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimulatedAntPlus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedAntPlus")
            .field("attach_firings", &self.attach_firings)
            .field("absent", &self.absent)
            .field("failing", &self.failing)
            .finish_non_exhaustive()
    }
}

impl SimulatedAntPlus {
    /// Every sensor in range, attaching once and immediately.
    pub fn new() -> Self {
        Self {
            attach_firings: 1,
            attach_delay: Duration::ZERO,
            attach_delays: HashMap::new(),
            frame_interval: None,
            absent: HashSet::new(),
            failing: HashSet::new(),
            sensors: Arc::new(Mutex::new(HashMap::new())),
            journal: Journal::default(),
        }
    }

    /// Fire each attach signal this many times.
    #[must_use]
    pub fn attach_firings(mut self, firings: u32) -> Self {
        self.attach_firings = firings;
        self
    }

    /// Delay every attach.
    #[must_use]
    pub fn attach_delay(mut self, delay: Duration) -> Self {
        self.attach_delay = delay;
        self
    }

    /// Delay attach for one category, overriding [`Self::attach_delay`].
    #[must_use]
    pub fn attach_delay_for(mut self, category: &str, delay: Duration) -> Self {
        self.attach_delays.insert(category.to_string(), delay);
        self
    }

    /// Emit sample telemetry on every stream at this interval once attached.
    #[must_use]
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// No device of `category` is in range; its scans never attach.
    #[must_use]
    pub fn absent(mut self, category: &str) -> Self {
        self.absent.insert(category.to_string());
        self
    }

    /// `begin_scan` fails for `category`.
    #[must_use]
    pub fn failing_scan(mut self, category: &str) -> Self {
        self.failing.insert(category.to_string());
        self
    }

    /// Driver factory for `profile`.
    pub fn factory_for(&self, profile: &SensorProfile) -> DriverFactory {
        let category = profile.name.to_string();
        let event_names: Vec<String> = profile.event_names.iter().map(|e| e.to_string()).collect();
        let behavior = SensorBehavior {
            present: !self.absent.contains(&category),
            fail_scan: self.failing.contains(&category),
            attach_firings: self.attach_firings,
            attach_delay: self
                .attach_delays
                .get(&category)
                .copied()
                .unwrap_or(self.attach_delay),
            frame_interval: self.frame_interval,
        };
        let sensors = Arc::clone(&self.sensors);
        let journal = self.journal.clone();

        Arc::new(move |transport: SharedTransport| {
            journal.record(format!("create:{category}"));
            let sensor = SimulatedSensor::new(
                &category,
                transport.model(),
                event_names.clone(),
                behavior.clone(),
                journal.clone(),
            );
            lock(&sensors)
                .entry(category.clone())
                .or_default()
                .push(sensor.clone());
            Box::new(sensor) as Box<dyn SensorDriver>
        })
    }

    /// Sensors built for `category`, oldest first.
    pub fn sensors(&self, category: &str) -> Vec<SimulatedSensor> {
        lock(&self.sensors)
            .get(category)
            .cloned()
            .unwrap_or_default()
    }

    /// The shared call journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}
