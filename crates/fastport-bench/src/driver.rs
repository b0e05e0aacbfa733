use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fastport_network::{
    CompletionReactor, Connector, ConnectorCallbacks, ErrorKind, Session, SessionCallbacks,
    SessionError,
};
use fastport_ring::Packet;
use tracing::{info, warn};

use crate::cli::Mode;
use crate::protocol::{BenchmarkRequest, BenchmarkResponse, PACKET_ID_REQUEST, PACKET_ID_RESPONSE};
use crate::rio_seam::RioStaging;
use crate::stats::{BenchmarkStats, LatencyCollector};
use crate::waiter::Waiter;

const RECV_SEND_RING_CAPACITY: usize = 64 * 1024;

pub struct BenchmarkConfig {
    pub test_name: String,
    pub server_addr: SocketAddr,
    pub mode: Mode,
    pub iterations: u64,
    pub warmup_iterations: u64,
    pub payload_size: usize,
    pub timeout: Duration,
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to connect to {0}: {1}")]
    ConnectFailed(SocketAddr, String),
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
}

/// Shared slot the connector callback drops its resolved session into; the
/// driver thread reads it back out once `connected` has fired.
#[derive(Default)]
struct SessionSlot {
    session: Mutex<Option<Arc<Session>>>,
}

struct DriverSessionCallbacks {
    waiter: Arc<Waiter>,
    connected: Arc<Waiter>,
    last_sequence: Arc<AtomicU32>,
    last_client_ts: Arc<AtomicU64>,
}

impl SessionCallbacks for DriverSessionCallbacks {
    fn on_packet(&self, _session: &Session, packet: Packet) {
        if packet.id != PACKET_ID_RESPONSE {
            return;
        }
        let Some(response) = BenchmarkResponse::decode(&packet.payload) else {
            warn!("malformed benchmark response, dropping");
            return;
        };
        self.last_sequence
            .store(response.sequence, Ordering::Release);
        self.last_client_ts
            .store(response.client_timestamp_ns, Ordering::Release);
        self.waiter.signal();
    }

    fn on_disconnected(&self, _session: &Session) {
        self.connected.signal();
        self.waiter.signal();
    }

    fn on_error(&self, _session: &Session, err: &SessionError) {
        warn!(kind = ?err.kind, detail = %err.detail, "benchmark session error");
    }
}

struct DriverConnectorCallbacks {
    slot: Arc<SessionSlot>,
    connected: Arc<Waiter>,
}

impl ConnectorCallbacks for DriverConnectorCallbacks {
    fn on_connected(&self, session: &Arc<Session>) {
        *self.slot.session.lock().expect("session slot poisoned") = Some(Arc::clone(session));
        self.connected.signal();
    }

    fn on_error(&self, kind: ErrorKind, detail: String) {
        warn!(?kind, %detail, "benchmark connect failed");
        self.connected.signal();
    }
}

/// Sequential request/response driver: one `Session`, one [`Waiter`], a
/// strict send-then-wait-then-send loop with warmup, matching the
/// original's `LatencyBenchmarkRunner::RunBenchmark`.
pub struct BenchmarkDriver {
    reactor: Arc<CompletionReactor>,
}

impl BenchmarkDriver {
    pub fn new() -> std::io::Result<Self> {
        let reactor = Arc::new(CompletionReactor::new()?);
        reactor
            .start(2)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        Ok(Self { reactor })
    }

    pub fn run(&self, config: &BenchmarkConfig) -> Result<BenchmarkStats, DriverError> {
        let waiter = Arc::new(Waiter::new());
        let connected = Arc::new(Waiter::new());
        let last_sequence = Arc::new(AtomicU32::new(0));
        let last_client_ts = Arc::new(AtomicU64::new(0));
        let slot = Arc::new(SessionSlot::default());

        let session_callbacks = DriverSessionCallbacks {
            waiter: Arc::clone(&waiter),
            connected: Arc::clone(&connected),
            last_sequence: Arc::clone(&last_sequence),
            last_client_ts: Arc::clone(&last_client_ts),
        };
        let connector_callbacks = DriverConnectorCallbacks {
            slot: Arc::clone(&slot),
            connected: Arc::clone(&connected),
        };

        let connector = Connector::connect(
            config.server_addr,
            Arc::clone(&self.reactor),
            1,
            RECV_SEND_RING_CAPACITY,
            Box::new(session_callbacks),
            Box::new(connector_callbacks),
        )
        .map_err(|err| DriverError::ConnectFailed(config.server_addr, err.to_string()))?;

        if !connected.wait(config.timeout) {
            return Err(DriverError::ConnectTimeout(config.timeout));
        }
        let session = slot
            .session
            .lock()
            .expect("session slot poisoned")
            .clone()
            .ok_or_else(|| {
                DriverError::ConnectFailed(config.server_addr, "connect failed".into())
            })?;
        drop(connector);

        let rio_staging =
            matches!(config.mode, Mode::Rio).then(|| RioStaging::new(config.payload_size));

        if config.warmup_iterations > 0 {
            info!(count = config.warmup_iterations, "warming up");
            for i in 0..config.warmup_iterations {
                send_and_wait(
                    &session,
                    &waiter,
                    i as u32,
                    config.payload_size,
                    config.timeout,
                    rio_staging.as_ref(),
                );
            }
        }

        info!(
            iterations = config.iterations,
            payload = config.payload_size,
            "running"
        );
        let mut collector = LatencyCollector::with_capacity(config.iterations as usize);
        let mut timeouts = 0u64;
        for i in 0..config.iterations {
            let send_ts = fastport_timing::Nanos::now();
            let ok = send_and_wait(
                &session,
                &waiter,
                i as u32,
                config.payload_size,
                config.timeout,
                rio_staging.as_ref(),
            );
            if !ok {
                timeouts += 1;
                continue;
            }
            let recv_ts = fastport_timing::Nanos::now();
            collector.add_sample(recv_ts.saturating_sub(send_ts).0);

            if config.verbose && (i % 100 == 0 || i == config.iterations - 1) {
                info!(
                    progress = i + 1,
                    total = config.iterations,
                    "benchmark progress"
                );
            }
        }
        if timeouts > 0 {
            warn!(timeouts, "requests timed out and contributed no sample");
        }

        session.request_disconnect();
        Ok(collector.calculate(config.test_name.clone(), config.payload_size))
    }

    pub fn stop(&self) {
        self.reactor.stop();
        self.reactor.wait_until_stopped();
    }
}

fn send_and_wait(
    session: &Arc<Session>,
    waiter: &Waiter,
    sequence: u32,
    payload_size: usize,
    timeout: Duration,
    rio_staging: Option<&RioStaging>,
) -> bool {
    waiter.reset();
    let client_ts = fastport_timing::Nanos::now().0;

    let payload = match rio_staging {
        Some(staging) => staging.fill(b'X'),
        None => vec![b'X'; payload_size],
    };
    let request = BenchmarkRequest {
        sequence,
        client_timestamp_ns: client_ts,
        payload,
    };
    session.send_packet(PACKET_ID_REQUEST, &request.encode());

    waiter.wait(timeout)
}
