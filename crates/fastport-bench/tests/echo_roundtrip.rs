use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

use fastport_network::{
    Acceptor, AcceptorCallbacks, CompletionReactor, Connector, ConnectorCallbacks, ErrorKind,
    Session, SessionCallbacks, SessionError,
};

use fastport_bench::protocol::{EchoRequest, EchoResponse, PACKET_ID_ECHO};

/// Replies to every echo request with the same string and result code 0.
struct EchoServer;

impl SessionCallbacks for EchoServer {
    fn on_packet(&self, session: &Session, packet: fastport_ring::Packet) {
        if packet.id != PACKET_ID_ECHO {
            return;
        }
        let Some(request) = EchoRequest::decode(&packet.payload) else {
            return;
        };
        let response = EchoResponse {
            message: request.message,
            result_code: 0,
        };
        session.send_packet(PACKET_ID_ECHO, &response.encode());
    }
}

struct AcceptIgnore;
impl AcceptorCallbacks for AcceptIgnore {
    fn on_accepted(&self, _session: &Arc<Session>) {}
    fn on_error(&self, _kind: ErrorKind, _detail: String) {}
}

struct RecordingClient {
    tx: Sender<EchoResponse>,
}

impl SessionCallbacks for RecordingClient {
    fn on_packet(&self, _session: &Session, packet: fastport_ring::Packet) {
        if packet.id != PACKET_ID_ECHO {
            return;
        }
        if let Some(response) = EchoResponse::decode(&packet.payload) {
            let _ = self.tx.send(response);
        }
    }

    fn on_error(&self, _session: &Session, _err: &SessionError) {}
}

struct ConnectCapture {
    slot: Arc<std::sync::Mutex<Option<Arc<Session>>>>,
    connected: Arc<std::sync::Condvar>,
}

impl ConnectorCallbacks for ConnectCapture {
    fn on_connected(&self, session: &Arc<Session>) {
        *self.slot.lock().unwrap() = Some(Arc::clone(session));
        self.connected.notify_all();
    }

    fn on_error(&self, _kind: ErrorKind, _detail: String) {
        self.connected.notify_all();
    }
}

fn start_echo_server() -> (Arc<CompletionReactor>, Arc<Acceptor>, SocketAddr) {
    let reactor = Arc::new(CompletionReactor::new().unwrap());
    reactor.start(2).unwrap();

    let factory = move || -> Box<dyn SessionCallbacks> { Box::new(EchoServer) };
    let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0));
    let acceptor = Acceptor::bind(
        addr,
        Arc::clone(&reactor),
        16,
        4096,
        Box::new(factory),
        Box::new(AcceptIgnore),
    )
    .unwrap();
    let bound = acceptor.local_addr().unwrap();
    (reactor, acceptor, bound)
}

/// The echo packet (spec.md §6's "distinct value" id) round-trips a string
/// and a result code over a live session, independent of the benchmark's
/// request/response contract.
#[test]
fn echo_round_trip_carries_the_message_back_unchanged() {
    let (server_reactor, acceptor, addr) = start_echo_server();

    let client_reactor = Arc::new(CompletionReactor::new().unwrap());
    client_reactor.start(2).unwrap();

    let (tx, rx): (Sender<EchoResponse>, Receiver<EchoResponse>) = channel();
    let slot = Arc::new(std::sync::Mutex::new(None));
    let connected = Arc::new(std::sync::Condvar::new());

    let connector = Connector::connect(
        addr,
        Arc::clone(&client_reactor),
        1,
        4096,
        Box::new(RecordingClient { tx }),
        Box::new(ConnectCapture {
            slot: Arc::clone(&slot),
            connected: Arc::clone(&connected),
        }),
    )
    .unwrap();

    let session = {
        let guard = slot.lock().unwrap();
        let (mut guard, result) = connected
            .wait_timeout_while(guard, Duration::from_secs(2), |s| s.is_none())
            .unwrap();
        assert!(!result.timed_out(), "connect did not complete in time");
        guard.take().expect("connect resolved without a session")
    };
    std::mem::forget(connector);

    let request = EchoRequest {
        message: "hello fastport".to_string(),
    };
    session.send_packet(PACKET_ID_ECHO, &request.encode());

    let response = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("expected an echo response");
    assert_eq!(response.message, "hello fastport");
    assert_eq!(response.result_code, 0);

    session.request_disconnect();
    client_reactor.stop();
    client_reactor.wait_until_stopped();

    acceptor.close();
    server_reactor.stop();
    server_reactor.wait_until_stopped();
}
