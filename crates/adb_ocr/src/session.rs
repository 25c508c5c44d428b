//! Device session: one ADB connection plus an OCR engine

use image::GrayImage;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adb::{
    self, AdbCliConnector, AdbConnector, AdbDevice, HandshakeProber, NetstatSocketSource,
    PortProber, SocketSource,
};
use crate::config::{
    DEFAULT_CONFIDENCE, DEFAULT_HOST, DEFAULT_LANGUAGE, GESTURE_DURATION_MS, HANDSHAKE_TIMEOUT,
};
use crate::error::{AdbOcrError, Result};
use crate::geometry::{BoundingBox, OcrResult, ScreenSize};
use crate::observer::{SessionObserver, TracingObserver};
use crate::ocr::{filter_detections, OcrEngine, OcrEngineLoader, PaddleOcrLoader};
use crate::screenshot_saver::ScreenshotSaver;

/// Options for `DeviceSession::load`
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub host: String,
    /// Scan local ports when connecting to `localhost` fails
    pub scan_if_fail: bool,
    pub language: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            scan_if_fail: true,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_scan_if_fail(mut self, scan_if_fail: bool) -> Self {
        self.scan_if_fail = scan_if_fail;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// The collaborators a session connects, scans and reads text through
#[derive(Clone)]
struct Backends {
    connector: Arc<dyn AdbConnector>,
    sockets: Arc<dyn SocketSource>,
    prober: Arc<dyn PortProber>,
    ocr_loader: Arc<dyn OcrEngineLoader>,
    observer: Arc<dyn SessionObserver>,
}

/// A single device session.
///
/// Created empty and populated by [`DeviceSession::load`]. Once a device is
/// connected the handle is kept for the life of the session. Device calls
/// must be issued one at a time.
pub struct DeviceSession {
    device: Option<Arc<dyn AdbDevice>>,
    ocr_engine: Option<Arc<dyn OcrEngine>>,
    rng: Mutex<StdRng>,
    backends: Backends,
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSession {
    /// Session using the adb client, `netstat2`, handshake probes, PaddleOCR
    /// and `tracing`
    pub fn new() -> Self {
        Self {
            device: None,
            ocr_engine: None,
            rng: Mutex::new(StdRng::from_entropy()),
            backends: Backends {
                connector: Arc::new(AdbCliConnector::new()),
                sockets: Arc::new(NetstatSocketSource),
                prober: Arc::new(HandshakeProber::new()),
                ocr_loader: Arc::new(PaddleOcrLoader::new()),
                observer: Arc::new(TracingObserver),
            },
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn AdbConnector>) -> Self {
        self.backends.connector = connector;
        self
    }

    pub fn with_socket_source(mut self, sockets: Arc<dyn SocketSource>) -> Self {
        self.backends.sockets = sockets;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn PortProber>) -> Self {
        self.backends.prober = prober;
        self
    }

    pub fn with_ocr_loader(mut self, loader: Arc<dyn OcrEngineLoader>) -> Self {
        self.backends.ocr_loader = loader;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.backends.observer = observer;
        self
    }

    /// Seed the gesture-duration jitter, for reproducible runs
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    /// Initialize the OCR engine and connect the device concurrently.
    ///
    /// Nothing is returned; check [`DeviceSession::is_connected`] afterwards.
    /// The connection half is skipped when a device is already connected;
    /// the OCR engine is always reloaded.
    pub async fn load(&mut self, port: u16, options: LoadOptions) {
        let backends = self.backends.clone();
        let already_connected = self.device.is_some();

        let ocr = init_ocr_engine(&backends, &options.language);
        let device = async {
            if already_connected {
                None
            } else {
                connect_device(&backends, &options.host, port, options.scan_if_fail).await
            }
        };

        let (engine, device) = futures::join!(ocr, device);

        self.ocr_engine = engine;
        if self.device.is_none() {
            self.device = device;
        }
    }

    /// Device handle present and transport still available
    pub fn is_connected(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.available())
    }

    /// Serial of the connected device, e.g. `localhost:5555`
    pub fn device_serial(&self) -> Option<&str> {
        self.device.as_deref().map(|d| d.serial())
    }

    pub fn has_ocr_engine(&self) -> bool {
        self.ocr_engine.is_some()
    }

    fn connected_device(&self) -> Result<&Arc<dyn AdbDevice>> {
        match &self.device {
            Some(device) if device.available() => Ok(device),
            _ => Err(AdbOcrError::NotConnected),
        }
    }

    /// Shell read used by the query operations: `None` when not connected or
    /// on transport failure
    async fn query(&self, command: &str) -> Option<String> {
        let device = self.connected_device().ok()?;
        match device.shell(command).await {
            Ok(output) => Some(output),
            Err(e) => {
                self.backends
                    .observer
                    .on_error(&format!("'{}' failed: {}", command, e));
                None
            }
        }
    }

    async fn run(&self, command: &str) -> Result<()> {
        self.connected_device()?.shell(command).await?;
        Ok(())
    }

    fn gesture_duration(&self) -> u32 {
        self.rng.lock().gen_range(GESTURE_DURATION_MS)
    }

    pub async fn get_screen_size(&self) -> Option<ScreenSize> {
        let output = self.query(adb::SCREEN_SIZE_COMMAND).await?;
        adb::parse_screen_size(&output)
    }

    /// Screen density in dpi
    pub async fn get_screen_density(&self) -> Option<u32> {
        let output = self.query(adb::SCREEN_DENSITY_COMMAND).await?;
        adb::parse_trailing_number(&output).and_then(|d| u32::try_from(d).ok())
    }

    /// Total memory in megabytes
    pub async fn get_memory(&self) -> Option<u64> {
        let output = self.query(adb::MEMORY_COMMAND).await?;
        adb::parse_memory_mb(&output)
    }

    pub async fn set_screen_size(&self, width: u32, height: u32) -> Result<()> {
        self.run(&adb::set_screen_size_command(width, height)).await
    }

    pub async fn set_screen_density(&self, density: u32) -> Result<()> {
        self.run(&adb::set_screen_density_command(density)).await
    }

    pub async fn reset_screen_size(&self) -> Result<()> {
        self.run(adb::RESET_SCREEN_SIZE_COMMAND).await
    }

    pub async fn reset_screen_density(&self) -> Result<()> {
        self.run(adb::RESET_SCREEN_DENSITY_COMMAND).await
    }

    /// Tap at `(x, y)`: a zero-length swipe held for 60-120 ms
    pub async fn click(&self, x: i32, y: i32) -> Result<()> {
        self.swipe(x, y, x, y, None).await
    }

    /// Swipe from `(x1, y1)` to `(x2, y2)`. Without a duration one is drawn
    /// from 60-120 ms.
    pub async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: Option<u32>,
    ) -> Result<()> {
        let device = self.connected_device()?;
        let duration_ms = duration_ms.unwrap_or_else(|| self.gesture_duration());
        device
            .shell(&adb::swipe_command(x1, y1, x2, y2, duration_ms))
            .await?;
        Ok(())
    }

    pub async fn go_back(&self) -> Result<()> {
        self.run(adb::BACK_COMMAND).await
    }

    /// Capture the screen as grayscale. `None` when not connected or when
    /// capture or decoding fails.
    pub async fn get_screen(&self) -> Option<GrayImage> {
        let device = self.connected_device().ok()?;
        let observer = &self.backends.observer;

        let bytes = match device.exec_out(adb::SCREENCAP_COMMAND).await {
            Ok(bytes) => bytes,
            Err(e) => {
                observer.on_error(&format!("Screen capture failed: {}", e));
                return None;
            }
        };

        match adb::decode_screen(&bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                observer.on_error(&format!("Could not decode screen capture: {}", e));
                None
            }
        }
    }

    /// Locate text on screen.
    ///
    /// `detect_area` restricts recognition to a rectangle; returned boxes are
    /// relative to that rectangle. Only detections with a confidence strictly
    /// above `confidence` are kept, and `None` is returned when there are
    /// none.
    pub async fn get_screen_text(
        &self,
        detect_area: Option<BoundingBox>,
        confidence: f32,
    ) -> Option<Vec<OcrResult>> {
        let observer = &self.backends.observer;

        if !self.is_connected() {
            observer.on_error("Cannot read screen text: no device connected.");
            return None;
        }

        let Some(engine) = self.ocr_engine.clone() else {
            observer.on_error("Cannot read screen text: OCR engine is not loaded.");
            return None;
        };

        let screen = self.get_screen().await?;
        let image = match detect_area {
            Some(area) => adb::crop_to_area(&screen, &area),
            None => screen,
        };

        let recognized = tokio::task::spawn_blocking(move || engine.recognize(&image, false)).await;
        let detections = match recognized {
            Ok(Ok(detections)) => detections,
            Ok(Err(e)) => {
                observer.on_error(&format!("OCR failed: {}", e));
                return None;
            }
            Err(e) => {
                observer.on_error(&format!("OCR task failed: {}", e));
                return None;
            }
        };

        observer.on_debug(&format!("OCR reported {} text regions", detections.len()));
        filter_detections(&detections, confidence)
    }

    /// `get_screen_text` with the default 0.85 threshold over the whole screen
    pub async fn get_all_screen_text(&self) -> Option<Vec<OcrResult>> {
        self.get_screen_text(None, DEFAULT_CONFIDENCE).await
    }

    /// First on-screen text containing `needle`
    pub async fn find_text(
        &self,
        needle: &str,
        detect_area: Option<BoundingBox>,
        confidence: f32,
    ) -> Option<OcrResult> {
        self.get_screen_text(detect_area, confidence)
            .await?
            .into_iter()
            .find(|r| r.text.contains(needle))
    }

    /// Tap the middle of the first on-screen text containing `needle`.
    /// Returns `Ok(false)` when the text is not on screen.
    pub async fn click_text(
        &self,
        needle: &str,
        detect_area: Option<BoundingBox>,
        confidence: f32,
    ) -> Result<bool> {
        self.connected_device()?;

        let Some(found) = self.find_text(needle, detect_area, confidence).await else {
            self.backends
                .observer
                .on_info(&format!("Text '{}' not found on screen.", needle));
            return Ok(false);
        };

        let (dx, dy) = detect_area.map_or((0, 0), |a| {
            let clipped = adb::clip_area(&a);
            (clipped.x, clipped.y)
        });
        let (x, y) = found.bounding_box.offset(dx, dy).get_middle_coordinate();
        self.click(x, y).await?;
        Ok(true)
    }

    /// Capture the screen and write it to `saver`'s session directory
    pub async fn save_screen(&self, saver: &mut ScreenshotSaver) -> Result<Option<PathBuf>> {
        self.connected_device()?;
        match self.get_screen().await {
            Some(image) => Ok(Some(saver.save(&image).await?)),
            None => Ok(None),
        }
    }
}

async fn init_ocr_engine(backends: &Backends, language: &str) -> Option<Arc<dyn OcrEngine>> {
    match backends.ocr_loader.load(language).await {
        Ok(engine) => Some(engine),
        Err(e) => {
            backends
                .observer
                .on_error(&format!("Failed to initialize OCR engine for '{}': {}", language, e));
            None
        }
    }
}

async fn try_connect(backends: &Backends, host: &str, port: u16) -> Option<Arc<dyn AdbDevice>> {
    let observer = &backends.observer;
    observer.on_debug(&format!("Connecting to Device[{}:{}]...", host, port));

    match backends.connector.connect(host, port, HANDSHAKE_TIMEOUT).await {
        Ok(device) => {
            observer.on_info(&format!("Connected to Device[{}:{}].", host, port));
            Some(device)
        }
        Err(e) => {
            observer.on_warn(&format!("[X]Failed to connect to Device[{}:{}]: {}", host, port, e));
            None
        }
    }
}

/// Connect to `host:port`; if that fails on localhost, scan local ports
/// once and retry against the port found, without scanning again.
async fn connect_device(
    backends: &Backends,
    host: &str,
    port: u16,
    scan_if_fail: bool,
) -> Option<Arc<dyn AdbDevice>> {
    if let Some(device) = try_connect(backends, host, port).await {
        return Some(device);
    }

    if host == DEFAULT_HOST && scan_if_fail {
        let scan_backends = backends.clone();
        let found = tokio::task::spawn_blocking(move || {
            adb::scan_local_devices(
                scan_backends.sockets.as_ref(),
                scan_backends.prober.as_ref(),
                scan_backends.observer.as_ref(),
            )
        })
        .await
        .unwrap_or_else(|e| {
            backends.observer.on_error(&format!("Port scan task failed: {}", e));
            None
        });

        if let Some(found) = found {
            if let Some(device) = try_connect(backends, host, found).await {
                return Some(device);
            }
        }
    }

    backends.observer.on_warn(
        "Failed to connect to emulator, please make sure the ADB is enabled on your emulator.",
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::{LocalSocket, ProbeOutcome};
    use crate::ocr::TextDetection;
    use async_trait::async_trait;
    use image::{ImageFormat, Luma};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records every command; answers shell calls from a canned reply
    struct FakeDevice {
        serial: String,
        available: AtomicBool,
        shell_reply: String,
        screen: Vec<u8>,
        commands: Mutex<Vec<String>>,
    }

    impl FakeDevice {
        fn new(serial: &str) -> Self {
            Self {
                serial: serial.to_string(),
                available: AtomicBool::new(true),
                shell_reply: String::new(),
                screen: Vec::new(),
                commands: Mutex::new(Vec::new()),
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().clone()
        }
    }

    #[async_trait]
    impl AdbDevice for FakeDevice {
        fn serial(&self) -> &str {
            &self.serial
        }

        fn available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }

        async fn shell(&self, command: &str) -> Result<String> {
            self.commands.lock().push(command.to_string());
            Ok(self.shell_reply.clone())
        }

        async fn exec_out(&self, command: &str) -> Result<Vec<u8>> {
            self.commands.lock().push(command.to_string());
            Ok(self.screen.clone())
        }
    }

    /// Succeeds only for `live_port`, handing out `device`
    struct FakeConnector {
        live_port: Option<u16>,
        device: Arc<FakeDevice>,
        attempts: Mutex<Vec<(String, u16)>>,
    }

    impl FakeConnector {
        fn new(live_port: Option<u16>, device: Arc<FakeDevice>) -> Self {
            Self {
                live_port,
                device,
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AdbConnector for FakeConnector {
        async fn connect(
            &self,
            host: &str,
            port: u16,
            _timeout: std::time::Duration,
        ) -> Result<Arc<dyn AdbDevice>> {
            self.attempts.lock().push((host.to_string(), port));
            if Some(port) == self.live_port {
                Ok(self.device.clone())
            } else {
                Err(AdbOcrError::ConnectFailed {
                    address: format!("{}:{}", host, port),
                    reason: "Connection refused".to_string(),
                })
            }
        }
    }

    struct FixedSockets(Vec<u16>);

    impl SocketSource for FixedSockets {
        fn tcp4_sockets(&self) -> Result<Vec<LocalSocket>> {
            Ok(self
                .0
                .iter()
                .map(|&local_port| LocalSocket {
                    local_port,
                    listening: true,
                })
                .collect())
        }
    }

    struct FakeProber {
        live: Option<u16>,
        calls: AtomicUsize,
    }

    impl PortProber for FakeProber {
        fn probe(&self, port: u16) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(port) == self.live {
                ProbeOutcome::Success(port)
            } else {
                ProbeOutcome::Failure("refused".to_string())
            }
        }
    }

    struct FakeEngine(Vec<TextDetection>);

    impl OcrEngine for FakeEngine {
        fn recognize(&self, _image: &GrayImage, use_angle_cls: bool) -> Result<Vec<TextDetection>> {
            assert!(!use_angle_cls);
            Ok(self.0.clone())
        }
    }

    struct FakeLoader {
        detections: Vec<TextDetection>,
        fail: bool,
        loads: AtomicUsize,
    }

    impl FakeLoader {
        fn new(detections: Vec<TextDetection>) -> Self {
            Self {
                detections,
                fail: false,
                loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OcrEngineLoader for FakeLoader {
        async fn load(&self, language: &str) -> Result<Arc<dyn OcrEngine>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AdbOcrError::UnsupportedLanguage(language.to_string()));
            }
            Ok(Arc::new(FakeEngine(self.detections.clone())))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        errors: Mutex<Vec<String>>,
    }

    impl SessionObserver for RecordingObserver {
        fn on_info(&self, _message: &str) {}
        fn on_warn(&self, _message: &str) {}
        fn on_error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }
    }

    fn png_screen(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_pixel(width, height, Luma([128]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn detection(text: &str, confidence: f32) -> TextDetection {
        TextDetection {
            quad: [(10.0, 20.0), (50.0, 20.0), (50.0, 80.0), (10.0, 80.0)],
            text: text.to_string(),
            confidence,
        }
    }

    struct Harness {
        session: DeviceSession,
        device: Arc<FakeDevice>,
        connector: Arc<FakeConnector>,
        prober: Arc<FakeProber>,
        loader: Arc<FakeLoader>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(
        device: FakeDevice,
        live_port: Option<u16>,
        listening: Vec<u16>,
        probe_live: Option<u16>,
        loader: FakeLoader,
    ) -> Harness {
        let device = Arc::new(device);
        let connector = Arc::new(FakeConnector::new(live_port, device.clone()));
        let prober = Arc::new(FakeProber {
            live: probe_live,
            calls: AtomicUsize::new(0),
        });
        let loader = Arc::new(loader);
        let observer = Arc::new(RecordingObserver::default());
        let session = DeviceSession::new()
            .with_connector(connector.clone())
            .with_socket_source(Arc::new(FixedSockets(listening)))
            .with_prober(prober.clone())
            .with_ocr_loader(loader.clone())
            .with_observer(observer.clone())
            .with_seed(7);
        Harness {
            session,
            device,
            connector,
            prober,
            loader,
            observer,
        }
    }

    async fn connected(device: FakeDevice, detections: Vec<TextDetection>) -> Harness {
        let mut h = harness(device, Some(5555), vec![], None, FakeLoader::new(detections));
        h.session.load(5555, LoadOptions::default()).await;
        assert!(h.session.is_connected());
        h
    }

    #[tokio::test]
    async fn test_load_connects_directly() {
        let mut h = harness(
            FakeDevice::new("localhost:5555"),
            Some(5555),
            vec![],
            None,
            FakeLoader::new(vec![]),
        );
        assert!(!h.session.is_connected());

        h.session.load(5555, LoadOptions::default()).await;

        assert!(h.session.is_connected());
        assert!(h.session.has_ocr_engine());
        assert_eq!(h.session.device_serial(), Some("localhost:5555"));
        assert_eq!(h.prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_load_keeps_connection_but_reloads_engine() {
        let mut h = harness(
            FakeDevice::new("localhost:5555"),
            Some(5555),
            vec![],
            None,
            FakeLoader::new(vec![]),
        );
        h.session.load(5555, LoadOptions::default()).await;
        h.session.load(6000, LoadOptions::default()).await;

        assert_eq!(h.connector.attempts.lock().len(), 1);
        assert_eq!(h.session.device_serial(), Some("localhost:5555"));
        assert_eq!(h.loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_load_scans_and_retries_once() {
        let mut h = harness(
            FakeDevice::new("localhost:62001"),
            Some(62001),
            vec![5037, 7555, 62001],
            Some(62001),
            FakeLoader::new(vec![]),
        );
        h.session.load(5555, LoadOptions::default()).await;

        assert!(h.session.is_connected());
        assert_eq!(
            *h.connector.attempts.lock(),
            vec![
                ("localhost".to_string(), 5555),
                ("localhost".to_string(), 62001)
            ]
        );
        // 5037 sits below the adb floor
        assert_eq!(h.prober.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_retry_does_not_scan_again() {
        // the probe finds 7555 but the handshake there still fails
        let mut h = harness(
            FakeDevice::new("localhost:7555"),
            None,
            vec![7555],
            Some(7555),
            FakeLoader::new(vec![]),
        );
        h.session.load(5555, LoadOptions::default()).await;

        assert!(!h.session.is_connected());
        assert_eq!(h.connector.attempts.lock().len(), 2);
        assert_eq!(h.prober.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_scan_for_remote_host_or_when_disabled() {
        let mut h = harness(
            FakeDevice::new("x"),
            None,
            vec![5555, 5556],
            Some(5556),
            FakeLoader::new(vec![]),
        );
        h.session
            .load(5555, LoadOptions::new().with_host("192.168.1.20"))
            .await;
        h.session
            .load(5555, LoadOptions::new().with_scan_if_fail(false))
            .await;

        assert!(!h.session.is_connected());
        assert_eq!(h.prober.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.connector.attempts.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_ocr_failure_does_not_block_connection() {
        let mut loader = FakeLoader::new(vec![]);
        loader.fail = true;
        let mut h = harness(FakeDevice::new("localhost:5555"), Some(5555), vec![], None, loader);
        h.session.load(5555, LoadOptions::default()).await;

        assert!(h.session.is_connected());
        assert!(!h.session.has_ocr_engine());
        assert!(h
            .observer
            .errors
            .lock()
            .iter()
            .any(|e| e.contains("Failed to initialize OCR engine")));
    }

    #[tokio::test]
    async fn test_is_connected_follows_transport() {
        let h = connected(FakeDevice::new("localhost:5555"), vec![]).await;
        h.device.available.store(false, Ordering::SeqCst);
        assert!(!h.session.is_connected());
        assert!(matches!(
            h.session.go_back().await,
            Err(AdbOcrError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_operations_without_device() {
        let session = harness(
            FakeDevice::new("x"),
            None,
            vec![],
            None,
            FakeLoader::new(vec![]),
        )
        .session;

        assert_eq!(session.get_screen_size().await, None);
        assert_eq!(session.get_memory().await, None);
        assert!(session.get_screen().await.is_none());
        assert_eq!(session.get_screen_text(None, 0.85).await, None);
        assert!(matches!(
            session.click(1, 2).await,
            Err(AdbOcrError::NotConnected)
        ));
        assert!(matches!(
            session.set_screen_density(320).await,
            Err(AdbOcrError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_get_memory() {
        let mut device = FakeDevice::new("localhost:5555");
        device.shell_reply = "MemTotal:        16384 kB\n".to_string();
        let h = connected(device, vec![]).await;

        assert_eq!(h.session.get_memory().await, Some(16));
        assert_eq!(h.device.commands(), vec![adb::MEMORY_COMMAND.to_string()]);
    }

    #[tokio::test]
    async fn test_get_screen_size() {
        let mut device = FakeDevice::new("localhost:5555");
        device.shell_reply = "1080x1920\n".to_string();
        let h = connected(device, vec![]).await;

        assert_eq!(
            h.session.get_screen_size().await,
            Some(ScreenSize {
                width: 1080,
                height: 1920
            })
        );
    }

    #[tokio::test]
    async fn test_get_screen_density() {
        let mut device = FakeDevice::new("localhost:5555");
        device.shell_reply = "480\n".to_string();
        let h = connected(device, vec![]).await;

        assert_eq!(h.session.get_screen_density().await, Some(480));
        assert_eq!(h.device.commands(), vec![adb::SCREEN_DENSITY_COMMAND.to_string()]);
    }

    #[tokio::test]
    async fn test_setters_issue_commands() {
        let h = connected(FakeDevice::new("localhost:5555"), vec![]).await;
        h.session.set_screen_size(720, 1280).await.unwrap();
        h.session.set_screen_density(240).await.unwrap();
        h.session.reset_screen_size().await.unwrap();
        h.session.reset_screen_density().await.unwrap();
        h.session.go_back().await.unwrap();

        assert_eq!(
            h.device.commands(),
            vec![
                "wm size 720x1280",
                "wm density 240",
                "wm size reset",
                "wm density reset",
                "input keyevent 4",
            ]
        );
    }

    #[tokio::test]
    async fn test_click_is_jittered_zero_length_swipe() {
        let h = connected(FakeDevice::new("localhost:5555"), vec![]).await;
        for _ in 0..50 {
            h.session.click(300, 400).await.unwrap();
        }

        for command in h.device.commands() {
            let parts: Vec<&str> = command.split_whitespace().collect();
            assert_eq!(&parts[..6], &["input", "swipe", "300", "400", "300", "400"]);
            let duration: u32 = parts[6].parse().unwrap();
            assert!(GESTURE_DURATION_MS.contains(&duration));
        }
    }

    #[tokio::test]
    async fn test_swipe_uses_given_duration() {
        let h = connected(FakeDevice::new("localhost:5555"), vec![]).await;
        h.session.swipe(1, 2, 3, 4, Some(500)).await.unwrap();
        h.session.swipe(1, 2, 3, 4, None).await.unwrap();

        let commands = h.device.commands();
        assert_eq!(commands[0], "input swipe 1 2 3 4 500");
        let jittered: u32 = commands[1].rsplit(' ').next().unwrap().parse().unwrap();
        assert!(GESTURE_DURATION_MS.contains(&jittered));
    }

    #[tokio::test]
    async fn test_get_screen_decodes_capture() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(6, 4);
        let h = connected(device, vec![]).await;

        let screen = h.session.get_screen().await.unwrap();
        assert_eq!(screen.dimensions(), (6, 4));
        assert_eq!(h.device.commands(), vec![adb::SCREENCAP_COMMAND.to_string()]);
    }

    #[tokio::test]
    async fn test_get_screen_with_bad_capture_is_none() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = b"garbage".to_vec();
        let h = connected(device, vec![]).await;
        assert!(h.session.get_screen().await.is_none());
    }

    #[tokio::test]
    async fn test_get_screen_text_filters_by_confidence() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(100, 100);
        let h = connected(
            device,
            vec![detection("exactly", 0.85), detection("above", 0.86)],
        )
        .await;

        let results = h.session.get_screen_text(None, 0.85).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "above");
        assert_eq!(results[0].bounding_box, BoundingBox::new(10, 20, 40, 60));
    }

    #[tokio::test]
    async fn test_get_screen_text_none_when_nothing_found() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(100, 100);
        let h = connected(device, vec![]).await;
        assert_eq!(h.session.get_all_screen_text().await, None);

        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(100, 100);
        let h = connected(device, vec![detection("low", 0.2)]).await;
        assert_eq!(h.session.get_all_screen_text().await, None);
    }

    #[tokio::test]
    async fn test_get_screen_text_without_engine() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(10, 10);
        let mut loader = FakeLoader::new(vec![]);
        loader.fail = true;
        let mut h = harness(device, Some(5555), vec![], None, loader);
        h.session.load(5555, LoadOptions::default()).await;

        assert_eq!(h.session.get_screen_text(None, 0.5).await, None);
        assert!(h
            .observer
            .errors
            .lock()
            .iter()
            .any(|e| e.contains("OCR engine is not loaded")));
    }

    #[tokio::test]
    async fn test_click_text_offsets_by_detect_area() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(300, 300);
        let h = connected(device, vec![detection("Start Game", 0.99)]).await;

        let area = BoundingBox::new(100, 200, 150, 100);
        assert!(h.session.click_text("Start", Some(area), 0.85).await.unwrap());
        assert!(!h.session.click_text("Quit", None, 0.85).await.unwrap());

        let taps: Vec<String> = h
            .device
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("input swipe"))
            .collect();
        assert_eq!(taps.len(), 1);
        assert!(taps[0].starts_with("input swipe 130 250 130 250 "));
    }

    #[tokio::test]
    async fn test_click_text_with_area_hanging_off_screen() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(300, 300);
        let h = connected(device, vec![detection("Start Game", 0.99)]).await;

        let area = BoundingBox::new(-50, -10, 150, 100);
        assert!(h.session.click_text("Start", Some(area), 0.85).await.unwrap());

        let taps: Vec<String> = h
            .device
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("input swipe"))
            .collect();
        assert_eq!(taps.len(), 1);
        assert!(taps[0].starts_with("input swipe 30 50 30 50 "));
    }

    #[tokio::test]
    async fn test_save_screen() {
        let mut device = FakeDevice::new("localhost:5555");
        device.screen = png_screen(8, 8);
        let h = connected(device, vec![]).await;

        let dir = tempfile::tempdir().unwrap();
        let mut saver = ScreenshotSaver::new(dir.path()).await.unwrap();
        let path = h.session.save_screen(&mut saver).await.unwrap().unwrap();
        assert!(path.exists());
        assert_eq!(saver.step_count(), 1);
    }
}
