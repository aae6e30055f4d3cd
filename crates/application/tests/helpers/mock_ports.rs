#![allow(dead_code)]

use async_trait::async_trait;
use ferrous_doh_application::ports::{
    DohClient, DohClientFactory, DohResolver, PinStore, SessionListener, TrustChecker,
    TunnelDevice, TunnelEstablisher,
};
use ferrous_doh_application::services::CertificateStatusTracker;
use ferrous_doh_domain::{
    CertificateStatus, DomainError, InterfaceConfig, ResolverConfig, SessionEvent, SessionState,
};
use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ── Tunnel device ──────────────────────────────────────────────────────────

/// In-memory tunnel. Writes are copied a few bytes at a time with yields in
/// between, and any overlapping write is counted as a violation.
pub struct MockTunnelDevice {
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    written: Mutex<Vec<Vec<u8>>>,
    writing: AtomicBool,
    overlapping_writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    closed: CancellationToken,
}

impl MockTunnelDevice {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            written: Mutex::new(Vec::new()),
            writing: AtomicBool::new(false),
            overlapping_writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            closed: CancellationToken::new(),
        })
    }

    pub fn inject(&self, packet: Vec<u8>) {
        self.inbound_tx.send(packet).unwrap();
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn overlapping_writes(&self) -> usize {
        self.overlapping_writes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The next read returns an I/O error.
    pub fn fail_next_read(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
        self.inject(Vec::new());
    }

    /// Waits until at least `count` packets were written.
    pub async fn wait_for_writes(&self, count: usize, timeout: Duration) -> Vec<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let written = self.written();
            if written.len() >= count || tokio::time::Instant::now() >= deadline {
                return written;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl TunnelDevice for MockTunnelDevice {
    async fn read_packet(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = self.inbound_rx.lock().await;
        let packet = tokio::select! {
            _ = self.closed.cancelled() => {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device closed"));
            }
            packet = rx.recv() => packet,
        };

        if self.fail_reads.swap(false, Ordering::SeqCst) {
            return Err(io::Error::other("injected read failure"));
        }

        let packet = packet.ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }

    async fn write_packet(&self, packet: &[u8]) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device closed"));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure"));
        }
        if self.writing.swap(true, Ordering::SeqCst) {
            self.overlapping_writes.fetch_add(1, Ordering::SeqCst);
        }

        let mut copy = Vec::with_capacity(packet.len());
        for chunk in packet.chunks(8) {
            copy.extend_from_slice(chunk);
            tokio::task::yield_now().await;
        }

        self.written.lock().unwrap().push(copy);
        self.writing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

pub struct MockEstablisher {
    device: Arc<MockTunnelDevice>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockEstablisher {
    pub fn new(device: Arc<MockTunnelDevice>) -> Arc<Self> {
        Arc::new(Self {
            device,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelEstablisher for MockEstablisher {
    async fn establish(
        &self,
        _config: &InterfaceConfig,
    ) -> Result<Arc<dyn TunnelDevice>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::TunnelEstablish(
                "permission denied".to_string(),
            ));
        }
        Ok(self.device.clone())
    }
}

/// Hands out a fresh device per establish call, for restart tests.
pub struct FreshDeviceEstablisher {
    devices: Mutex<Vec<Arc<MockTunnelDevice>>>,
}

impl FreshDeviceEstablisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: Mutex::new(Vec::new()),
        })
    }

    pub fn devices(&self) -> Vec<Arc<MockTunnelDevice>> {
        self.devices.lock().unwrap().clone()
    }
}

#[async_trait]
impl TunnelEstablisher for FreshDeviceEstablisher {
    async fn establish(
        &self,
        _config: &InterfaceConfig,
    ) -> Result<Arc<dyn TunnelDevice>, DomainError> {
        let device = MockTunnelDevice::new();
        self.devices.lock().unwrap().push(device.clone());
        Ok(device)
    }
}

// ── DoH resolver ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum MockAnswer {
    Addresses(Vec<Ipv4Addr>),
    Delayed(Duration, Vec<Ipv4Addr>),
    Fail(DomainError),
    /// Sleeps, then fails the way the forwarder's timeout does.
    TimeOut(Duration),
}

pub struct MockDohResolver {
    answers: Mutex<HashMap<String, MockAnswer>>,
    calls: Mutex<Vec<String>>,
}

impl MockDohResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_answer(&self, domain: &str, answer: MockAnswer) {
        self.answers
            .lock()
            .unwrap()
            .insert(domain.to_string(), answer);
    }

    pub fn set_addresses(&self, domain: &str, addresses: &[&str]) {
        let addresses = addresses.iter().map(|a| a.parse().unwrap()).collect();
        self.set_answer(domain, MockAnswer::Addresses(addresses));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DohResolver for MockDohResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DomainError> {
        self.calls.lock().unwrap().push(domain.to_string());
        let answer = self.answers.lock().unwrap().get(domain).cloned();

        match answer {
            None => Ok(Vec::new()),
            Some(MockAnswer::Addresses(addresses)) => Ok(addresses),
            Some(MockAnswer::Delayed(delay, addresses)) => {
                tokio::time::sleep(delay).await;
                Ok(addresses)
            }
            Some(MockAnswer::Fail(error)) => Err(error),
            Some(MockAnswer::TimeOut(delay)) => {
                tokio::time::sleep(delay).await;
                Err(DomainError::TransportTimeout {
                    server: "mock".to_string(),
                })
            }
        }
    }
}

pub struct MockTrustChecker {
    result: Mutex<Result<CertificateStatus, DomainError>>,
    calls: AtomicUsize,
}

impl MockTrustChecker {
    pub fn new(result: Result<CertificateStatus, DomainError>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_result(&self, result: Result<CertificateStatus, DomainError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrustChecker for MockTrustChecker {
    async fn check(&self) -> Result<CertificateStatus, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

pub struct MockClientFactory {
    pub resolver: Arc<MockDohResolver>,
    pub checker: Arc<MockTrustChecker>,
    fail: AtomicBool,
    created: AtomicUsize,
}

impl MockClientFactory {
    pub fn new(resolver: Arc<MockDohResolver>, checker: Arc<MockTrustChecker>) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            checker,
            fail: AtomicBool::new(false),
            created: AtomicUsize::new(0),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DohClientFactory for MockClientFactory {
    async fn create(
        &self,
        config: &ResolverConfig,
        _certificates: Arc<CertificateStatusTracker>,
    ) -> Result<DohClient, DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::InvalidEndpoint(config.endpoint.to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(DohClient {
            resolver: self.resolver.clone(),
            trust_checker: self.checker.clone(),
        })
    }
}

// ── Pin store ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPinStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPinStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

impl PinStore for MemoryPinStore {
    fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.values.lock().unwrap().remove(key).is_some())
    }
}

// ── Listener ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged {
                    state: SessionState::Error,
                    message,
                } => message,
                _ => None,
            })
            .collect()
    }

    pub fn certificate_statuses(&self) -> Vec<CertificateStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::CertificateStatus { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Polls until the listener has seen `state`.
    pub async fn wait_for_state(&self, state: SessionState, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.states().contains(&state) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.states().contains(&state)
    }
}

impl SessionListener for RecordingListener {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
