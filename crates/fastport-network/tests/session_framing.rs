use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

use fastport_network::{
    Acceptor, AcceptorCallbacks, CompletionReactor, ErrorKind, Session, SessionCallbacks,
};

#[derive(Debug)]
enum Event {
    Packet { id: u16, payload: Vec<u8> },
    Disconnected,
    Error(ErrorKind),
}

struct RecordingCallbacks {
    tx: Sender<Event>,
}

impl SessionCallbacks for RecordingCallbacks {
    fn on_packet(&self, _session: &Session, packet: fastport_ring::Packet) {
        let _ = self.tx.send(Event::Packet {
            id: packet.id,
            payload: packet.payload,
        });
    }

    fn on_disconnected(&self, _session: &Session) {
        let _ = self.tx.send(Event::Disconnected);
    }

    fn on_error(&self, _session: &Session, err: &fastport_network::SessionError) {
        let _ = self.tx.send(Event::Error(err.kind));
    }
}

struct AcceptRecorder {
    tx: Sender<Event>,
}

impl AcceptorCallbacks for AcceptRecorder {
    fn on_accepted(&self, _session: &Arc<Session>) {}
    fn on_error(&self, kind: ErrorKind, _detail: String) {
        let _ = self.tx.send(Event::Error(kind));
    }
}

fn start_acceptor(
    ring_capacity: usize,
) -> (Arc<CompletionReactor>, Arc<Acceptor>, Receiver<Event>) {
    let (tx, rx) = channel();
    let reactor = Arc::new(CompletionReactor::new().unwrap());
    reactor.start(2).unwrap();

    let session_tx = tx.clone();
    let factory = move || -> Box<dyn SessionCallbacks> {
        Box::new(RecordingCallbacks {
            tx: session_tx.clone(),
        })
    };

    let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0));
    let acceptor = Acceptor::bind(
        addr,
        Arc::clone(&reactor),
        16,
        ring_capacity,
        Box::new(factory),
        Box::new(AcceptRecorder { tx }),
    )
    .unwrap();
    (reactor, acceptor, rx)
}

fn recv_packet(rx: &Receiver<Event>, timeout: Duration) -> (u16, Vec<u8>) {
    match rx.recv_timeout(timeout).expect("expected a packet event") {
        Event::Packet { id, payload } => (id, payload),
        Event::Disconnected => panic!("expected packet, got disconnect"),
        Event::Error(kind) => panic!("expected packet, got error {kind:?}"),
    }
}

/// Disconnect is always preceded by exactly one `on_error` call.
fn recv_disconnect(rx: &Receiver<Event>, timeout: Duration) {
    match rx
        .recv_timeout(timeout)
        .expect("expected an error event before disconnect")
    {
        Event::Error(_) => {}
        Event::Packet { .. } => panic!("expected error, got packet"),
        Event::Disconnected => panic!("expected error before disconnect, got disconnect directly"),
    }
    match rx.recv_timeout(timeout).expect("expected disconnect event") {
        Event::Disconnected => {}
        Event::Packet { .. } => panic!("expected disconnect, got packet"),
        Event::Error(kind) => panic!("expected disconnect, got a second error {kind:?}"),
    }
}

/// Scenario 1: echo single frame.
#[test]
fn echoes_a_single_frame() {
    let (reactor, acceptor, rx) = start_acceptor(4096);
    let addr = acceptor.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(&[0x00, 0x09, 0x00, 0x64, b'H', b'e', b'l', b'l', b'o'])
        .unwrap();

    let (id, payload) = recv_packet(&rx, Duration::from_secs(2));
    assert_eq!(id, 100);
    assert_eq!(payload, b"Hello");

    drop(client);
    recv_disconnect(&rx, Duration::from_secs(2));

    acceptor.close();
    reactor.stop();
    reactor.wait_until_stopped();
}

/// Scenario 2: two frames delivered in one write land as two ordered packets.
#[test]
fn delivers_two_frames_from_one_segment_in_order() {
    let (reactor, acceptor, rx) = start_acceptor(4096);
    let addr = acceptor.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0x00, 0x05, 0x00, 0x0A, b'A']);
    bytes.extend_from_slice(&[0x00, 0x06, 0x00, 0x14, b'B', b'B']);
    client.write_all(&bytes).unwrap();

    let first = recv_packet(&rx, Duration::from_secs(2));
    let second = recv_packet(&rx, Duration::from_secs(2));
    assert_eq!(first, (10, b"A".to_vec()));
    assert_eq!(second, (20, b"BB".to_vec()));

    acceptor.close();
    reactor.stop();
    reactor.wait_until_stopped();
}

/// Scenario 3: header split across two recv completions still yields exactly
/// one packet with no intermediate deliveries.
#[test]
fn resumes_a_frame_whose_header_was_split_across_writes() {
    let (reactor, acceptor, rx) = start_acceptor(4096);
    let addr = acceptor.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(&[0x00]).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    client
        .write_all(&[0x09, 0x00, 0x64, b'H', b'e', b'l', b'l', b'o'])
        .unwrap();

    let (id, payload) = recv_packet(&rx, Duration::from_secs(2));
    assert_eq!(id, 100);
    assert_eq!(payload, b"Hello");
    assert!(
        rx.recv_timeout(Duration::from_millis(200)).is_err(),
        "no intermediate delivery expected"
    );

    acceptor.close();
    reactor.stop();
    reactor.wait_until_stopped();
}

/// Scenario 5: a frame too large for the send ring disconnects with
/// `BufferOverflow`, then fires `on_disconnected`.
#[test]
fn send_overflow_disconnects_with_buffer_overflow() {
    let (reactor, acceptor, _server_rx) = start_acceptor(4096);
    let addr = acceptor.local_addr().unwrap();

    let (tx, client_rx) = channel();
    let factory =
        move || -> Box<dyn SessionCallbacks> { Box::new(RecordingCallbacks { tx: tx.clone() }) };
    let connector = fastport_network::Connector::connect(
        addr,
        Arc::clone(&reactor),
        99,
        8,
        factory(),
        Box::new(ClientConnRecorder),
    )
    .unwrap();
    std::mem::forget(connector);

    match client_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("expected an error event")
    {
        Event::Error(ErrorKind::BufferOverflow) => {}
        Event::Error(other) => panic!("expected BufferOverflow, got {other:?}"),
        _ => panic!("expected an error event first"),
    }
    match client_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("expected disconnect event")
    {
        Event::Disconnected => {}
        other => panic!("expected disconnect, got {other:?}"),
    }

    acceptor.close();
    reactor.stop();
    reactor.wait_until_stopped();
}

struct ClientConnRecorder;
impl fastport_network::ConnectorCallbacks for ClientConnRecorder {
    fn on_connected(&self, session: &Arc<Session>) {
        // A send ring of capacity 8 cannot hold a 12-byte frame (4-byte
        // header + 8-byte payload): this must disconnect with BufferOverflow.
        session.send_packet(1, &[0u8; 8]);
    }
    fn on_error(&self, _kind: ErrorKind, _detail: String) {}
}
