//! USB ANT+ sticks.
//!
//! Sticks are found on the USB bus by vendor and product id through `nusb`.
//! Opening a stick claims its ANT interface and the stick counts as ready
//! once the claim succeeds. This build carries no ANT radio protocol driver,
//! so sensor scans on a real stick fail; use `--simulate` to run the full
//! pipeline without hardware.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use antws_core::{
    DriverError, DriverFactory, OneShot, SensorDriver, SharedTransport, TelemetryHandler, Transport,
};
use tracing::{debug, info, warn};

/// Garmin/Dynastream USB vendor id.
pub const GARMIN_VENDOR_ID: u16 = 0x0fcf;

/// Interface carrying the ANT bulk endpoints.
const ANT_INTERFACE: u8 = 0;

/// Supported stick models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickModel {
    /// ANTUSB-m stick.
    GarminStick3,
    /// ANTUSB2 stick.
    GarminStick2,
}

impl StickModel {
    /// Probe order: the newer stick first.
    pub const ALL: [StickModel; 2] = [StickModel::GarminStick3, StickModel::GarminStick2];

    /// USB product id.
    pub fn product_id(self) -> u16 {
        match self {
            Self::GarminStick3 => 0x1009,
            Self::GarminStick2 => 0x1008,
        }
    }

    /// Model name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::GarminStick3 => "GarminStick3",
            Self::GarminStick2 => "GarminStick2",
        }
    }
}

/// Access to the USB bus.
pub trait UsbBus: Send + Sync + 'static {
    /// Held for as long as the stick stays open.
    type Handle: Send + 'static;

    /// Whether a device with `vendor:product` is attached.
    fn is_attached(&self, vendor: u16, product: u16) -> bool;

    /// Open the first matching device and claim its ANT interface.
    fn claim(&self, vendor: u16, product: u16) -> io::Result<Self::Handle>;
}

/// The system USB bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NusbBus;

impl NusbBus {
    fn find(vendor: u16, product: u16) -> io::Result<Option<nusb::DeviceInfo>> {
        Ok(nusb::list_devices()?
            .find(|device| device.vendor_id() == vendor && device.product_id() == product))
    }
}

impl UsbBus for NusbBus {
    type Handle = nusb::Interface;

    fn is_attached(&self, vendor: u16, product: u16) -> bool {
        match Self::find(vendor, product) {
            Ok(found) => found.is_some(),
            Err(e) => {
                debug!("Cannot list USB devices: {}", e);
                false
            }
        }
    }

    fn claim(&self, vendor: u16, product: u16) -> io::Result<nusb::Interface> {
        let info = Self::find(vendor, product)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {vendor:04x}:{product:04x} device attached"),
            )
        })?;
        debug!(
            "Opening {:04x}:{:04x} on bus {} address {}",
            vendor,
            product,
            info.bus_number(),
            info.device_address()
        );
        info.open()?.claim_interface(ANT_INTERFACE)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A USB stick of one model.
pub struct UsbStick<B: UsbBus = NusbBus> {
    model: StickModel,
    bus: B,
    claimed: Mutex<Option<B::Handle>>,
    ready: Mutex<Option<OneShot<()>>>,
}

impl UsbStick {
    /// A stick on the system USB bus.
    pub fn new(model: StickModel) -> Self {
        Self::with_bus(model, NusbBus)
    }

    /// Candidates for every supported model, in probe order.
    pub fn candidates() -> Vec<SharedTransport> {
        StickModel::ALL
            .into_iter()
            .map(|model| Arc::new(Self::new(model)) as SharedTransport)
            .collect()
    }
}

impl<B: UsbBus> UsbStick<B> {
    /// A stick on `bus`.
    pub fn with_bus(model: StickModel, bus: B) -> Self {
        Self {
            model,
            bus,
            claimed: Mutex::new(None),
            ready: Mutex::new(None),
        }
    }

    /// Whether the stick's interface is currently claimed.
    pub fn is_open(&self) -> bool {
        lock(&self.claimed).is_some()
    }
}

impl<B: UsbBus> fmt::Debug for UsbStick<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbStick")
            .field("model", &self.model)
            .field("open", &self.is_open())
            .finish()
    }
}

impl<B: UsbBus> Transport for UsbStick<B> {
    fn model(&self) -> &str {
        self.model.name()
    }

    fn is_present(&self) -> bool {
        self.bus.is_attached(GARMIN_VENDOR_ID, self.model.product_id())
    }

    fn open(&self) -> bool {
        match self.bus.claim(GARMIN_VENDOR_ID, self.model.product_id()) {
            Ok(handle) => {
                *lock(&self.claimed) = Some(handle);
                info!("Claimed {} interface {}", self.model.name(), ANT_INTERFACE);
                if let Some(ready) = lock(&self.ready).take() {
                    ready.fire(());
                }
                true
            }
            Err(e) => {
                warn!("Unable to claim {}: {}", self.model.name(), e);
                false
            }
        }
    }

    fn on_ready(&self, ready: OneShot<()>) {
        *lock(&self.ready) = Some(ready);
    }
}

/// Sensor driver for USB sticks. Scanning needs the ANT radio protocol, which
/// this build does not carry, so every scan fails.
#[derive(Debug)]
pub struct UnsupportedDriver {
    model: String,
}

impl UnsupportedDriver {
    /// Factory building an [`UnsupportedDriver`] per scan.
    pub fn factory() -> DriverFactory {
        Arc::new(|transport: SharedTransport| {
            Box::new(UnsupportedDriver {
                model: transport.model().to_string(),
            }) as Box<dyn SensorDriver>
        })
    }
}

impl SensorDriver for UnsupportedDriver {
    fn begin_scan(&self) -> Result<(), DriverError> {
        Err(DriverError::new(format!(
            "no ANT radio driver for {}",
            self.model
        )))
    }

    fn on_attached(&self, _attached: OneShot<()>) {}

    fn subscribe(&self, _event_name: &str, _handler: TelemetryHandler) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use antws_core::{Discovery, DiscoveryOutcome, SensorRegistry, TelemetryPublisher};
    use antws_types::ANT_PLUS_PROFILES;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A bus with a fixed device list.
    #[derive(Default)]
    struct FakeBus {
        devices: Vec<(u16, u16)>,
        claim_error: Option<io::ErrorKind>,
        claims: Arc<AtomicU32>,
    }

    impl FakeBus {
        fn with(product: u16) -> Self {
            Self {
                devices: vec![(0x046d, 0xc52b), (GARMIN_VENDOR_ID, product)],
                ..Default::default()
            }
        }
    }

    impl UsbBus for FakeBus {
        type Handle = (u16, u16);

        fn is_attached(&self, vendor: u16, product: u16) -> bool {
            self.devices.contains(&(vendor, product))
        }

        fn claim(&self, vendor: u16, product: u16) -> io::Result<(u16, u16)> {
            self.claims.fetch_add(1, Ordering::Relaxed);
            if let Some(kind) = self.claim_error {
                return Err(io::Error::new(kind, "interface busy"));
            }
            if !self.is_attached(vendor, product) {
                return Err(io::ErrorKind::NotFound.into());
            }
            Ok((vendor, product))
        }
    }

    #[test]
    fn test_detects_matching_stick() {
        let stick3 = UsbStick::with_bus(StickModel::GarminStick3, FakeBus::with(0x1009));
        let stick2 = UsbStick::with_bus(StickModel::GarminStick2, FakeBus::with(0x1009));
        assert!(stick3.is_present());
        assert!(!stick2.is_present());
        assert_eq!(stick3.model(), "GarminStick3");
    }

    #[test]
    fn test_open_claims_and_fires_ready_once() {
        let stick = UsbStick::with_bus(StickModel::GarminStick3, FakeBus::with(0x1009));
        let (ready, _settled) = OneShot::channel("ready");
        stick.on_ready(ready.clone());

        assert!(stick.open());
        assert!(stick.is_open());
        assert!(ready.is_settled());
        assert!(lock(&stick.ready).is_none());
    }

    #[test]
    fn test_open_fails_when_claim_fails() {
        let bus = FakeBus {
            claim_error: Some(io::ErrorKind::ResourceBusy),
            ..FakeBus::with(0x1008)
        };
        let claims = Arc::clone(&bus.claims);
        let stick = UsbStick::with_bus(StickModel::GarminStick2, bus);
        let (ready, _settled) = OneShot::channel("ready");
        stick.on_ready(ready.clone());

        assert!(stick.is_present());
        assert!(!stick.open());
        assert!(!stick.is_open());
        assert!(!ready.is_settled());
        assert_eq!(claims.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_open_fails_when_absent() {
        let stick = UsbStick::with_bus(StickModel::GarminStick3, FakeBus::default());
        assert!(!stick.is_present());
        assert!(!stick.open());
    }

    #[test]
    fn test_unsupported_driver_refuses_scans() {
        let factory = UnsupportedDriver::factory();
        let transport: SharedTransport = Arc::new(UsbStick::new(StickModel::GarminStick2));
        let driver = factory(transport);
        let err = driver.begin_scan().unwrap_err();
        assert!(err.message.contains("GarminStick2"));
    }

    #[test]
    fn test_candidates_newest_first() {
        let models: Vec<String> = UsbStick::candidates()
            .iter()
            .map(|c| c.model().to_string())
            .collect();
        assert_eq!(models, vec!["GarminStick3", "GarminStick2"]);
    }

    #[tokio::test]
    async fn test_attached_stick_reaches_listening() {
        let sticks: Vec<SharedTransport> = vec![
            Arc::new(UsbStick::with_bus(StickModel::GarminStick3, FakeBus::with(0x1009))),
            Arc::new(UsbStick::with_bus(StickModel::GarminStick2, FakeBus::with(0x1009))),
        ];
        let registry =
            SensorRegistry::from_profiles(&ANT_PLUS_PROFILES, |_| UnsupportedDriver::factory())
                .unwrap();
        let category_count = registry.categories().len();
        let discovery = Discovery::new(
            sticks,
            Arc::new(registry),
            TelemetryPublisher::new(Arc::new(Hub::new(4))),
        );

        match discovery.run().await {
            DiscoveryOutcome::Listening {
                model,
                attached,
                failed,
            } => {
                assert_eq!(model, "GarminStick3");
                assert!(attached.is_empty());
                assert_eq!(failed.len(), category_count);
            }
            other => panic!("unexpected outcome: {other}"),
        }
    }
}
