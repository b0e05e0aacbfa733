use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use fastport_ring::{FrameOutcome, Packet, PacketFramer, RingBuffer, RingError};
use tracing::{debug, warn};

use crate::error::{ErrorKind, SessionError};
use crate::reactor::{Completable, CompletionReactor, Interest, OpContext, Token};
use crate::socket;

const STATE_IDLE: u8 = 0;
const STATE_ESTABLISHED: u8 = 1;
const STATE_DISCONNECTING: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// User-supplied reactions to session lifecycle events. All methods are
/// called synchronously from whichever reactor worker thread observed the
/// event, so implementations must be cheap or hand off work themselves.
pub trait SessionCallbacks: Send + Sync {
    fn on_established(&self, _session: &Session) {}
    fn on_packet(&self, _session: &Session, _packet: Packet) {}
    fn on_sent(&self, _session: &Session, _n: usize) {}
    fn on_disconnected(&self, _session: &Session) {}
    fn on_error(&self, _session: &Session, _err: &SessionError) {}
}

/// Per-connection state machine: one socket, two rings, at most one
/// outstanding recv and one outstanding send at any instant.
pub struct Session {
    id: u64,
    token: Token,
    stream: std::net::TcpStream,
    peer_addr: SocketAddr,
    recv_ring: Mutex<RingBuffer>,
    send_ring: Mutex<RingBuffer>,
    recv_in_flight: AtomicBool,
    send_in_flight: AtomicBool,
    disconnect_requested: AtomicBool,
    finalized: AtomicBool,
    writable_armed: AtomicBool,
    state: AtomicU8,
    reactor: Arc<CompletionReactor>,
    callbacks: Box<dyn SessionCallbacks>,
}

impl Session {
    pub fn new(
        id: u64,
        token: Token,
        stream: std::net::TcpStream,
        peer_addr: SocketAddr,
        ring_capacity: usize,
        reactor: Arc<CompletionReactor>,
        callbacks: Box<dyn SessionCallbacks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            token,
            stream,
            peer_addr,
            recv_ring: Mutex::new(RingBuffer::new(ring_capacity)),
            send_ring: Mutex::new(RingBuffer::new(ring_capacity)),
            recv_in_flight: AtomicBool::new(false),
            send_in_flight: AtomicBool::new(false),
            disconnect_requested: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            writable_armed: AtomicBool::new(false),
            state: AtomicU8::new(STATE_IDLE),
            reactor,
            callbacks,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_established(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_ESTABLISHED
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }

    fn fd(&self) -> std::os::fd::RawFd {
        self.stream.as_raw_fd()
    }

    /// Registers with the reactor for readable events and fires
    /// `on_established`. Called once, immediately after accept or connect
    /// completes. The first recv is implicit: level-triggered `EPOLLIN`
    /// fires as soon as the socket has bytes, or immediately if it already
    /// does by the time registration lands.
    pub fn start(self: &Arc<Self>) -> Result<(), crate::error::ReactorError> {
        let consumer: Arc<dyn Completable> = self.clone();
        self.reactor
            .register(self.fd(), self.token, Interest::Readable, consumer)?;
        self.state.store(STATE_ESTABLISHED, Ordering::Release);
        self.callbacks.on_established(self);
        Ok(())
    }

    /// Serializes `[len:u16 BE][id:u16 BE][payload]` into the send ring and
    /// attempts to post it. Disconnects with `BufferOverflow` if the ring
    /// cannot hold the frame.
    pub fn send_packet(&self, id: u16, payload: &[u8]) {
        {
            let mut ring = self.send_ring.lock().expect("send ring poisoned");
            if let Err(RingError::Overflow {
                requested,
                available,
            }) = PacketFramer::write_frame(&mut ring, id, payload)
            {
                drop(ring);
                self.begin_disconnect(
                    ErrorKind::BufferOverflow,
                    format!("frame of {requested} bytes exceeds {available} free in send ring"),
                );
                self.maybe_finalize_disconnect();
                return;
            }
        }
        self.try_post_send();
    }

    fn try_post_send(&self) {
        if self.send_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }
        loop {
            let mut ring = self.send_ring.lock().expect("send ring poisoned");
            if ring.occupancy() == 0 {
                drop(ring);
                self.send_in_flight.store(false, Ordering::Release);
                self.disarm_writable();
                // A concurrent send_packet may have enqueued bytes between
                // our emptiness check and clearing the flag; recheck so we
                // never strand data with nobody owning the in-flight send.
                if self
                    .send_ring
                    .lock()
                    .expect("send ring poisoned")
                    .occupancy()
                    == 0
                {
                    self.maybe_finalize_disconnect();
                    return;
                }
                if self.send_in_flight.swap(true, Ordering::AcqRel) {
                    return;
                }
                continue;
            }

            let (first, second) = ring.readable_spans();
            match writev(self.fd(), first, second) {
                Ok(0) => {
                    drop(ring);
                    self.send_in_flight.store(false, Ordering::Release);
                    self.begin_disconnect(ErrorKind::SendFailed, "writev returned 0");
                    self.maybe_finalize_disconnect();
                    return;
                }
                Ok(n) => {
                    if let Err(err) = ring.consume(n) {
                        fastport_utils::safe_panic!(
                            "send ring consume({n}) past readable_spans bound: {err}"
                        );
                    }
                    drop(ring);
                    self.callbacks.on_sent(self, n);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    drop(ring);
                    self.arm_writable();
                    self.send_in_flight.store(false, Ordering::Release);
                    self.maybe_finalize_disconnect();
                    return;
                }
                Err(err) => {
                    drop(ring);
                    self.send_in_flight.store(false, Ordering::Release);
                    self.begin_disconnect(ErrorKind::SendFailed, err.to_string());
                    self.maybe_finalize_disconnect();
                    return;
                }
            }
        }
    }

    fn arm_writable(&self) {
        if !self.writable_armed.swap(true, Ordering::AcqRel) {
            let _ = self
                .reactor
                .reregister(self.fd(), self.token, Interest::ReadWrite);
        }
    }

    fn disarm_writable(&self) {
        if self.writable_armed.swap(false, Ordering::AcqRel) {
            let _ = self
                .reactor
                .reregister(self.fd(), self.token, Interest::Readable);
        }
    }

    fn do_recv(&self) {
        loop {
            let mut ring = self.recv_ring.lock().expect("recv ring poisoned");
            if ring.writable_len() == 0 {
                drop(ring);
                self.begin_disconnect(ErrorKind::BufferFull, "recv ring is full");
                return;
            }
            let (first, second) = ring.writable_spans();
            match readv(self.fd(), first, second) {
                Ok(0) => {
                    drop(ring);
                    self.begin_disconnect(ErrorKind::ConnectionLost, "peer closed (FIN)");
                    return;
                }
                Ok(n) => {
                    if let Err(err) = ring.commit_write(n) {
                        fastport_utils::safe_panic!(
                            "recv ring commit_write({n}) past writable_spans bound: {err}"
                        );
                    }
                    if let Err(err) = self.drain_frames(&mut ring) {
                        drop(ring);
                        self.begin_disconnect(ErrorKind::InvalidFrame, err.to_string());
                        return;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(err) => {
                    drop(ring);
                    self.begin_disconnect(ErrorKind::RecvFailed, err.to_string());
                    return;
                }
            }
        }
    }

    fn drain_frames(&self, ring: &mut RingBuffer) -> Result<(), fastport_ring::FramerError> {
        loop {
            match PacketFramer::try_frame(ring)? {
                FrameOutcome::Ok(packet) => self.callbacks.on_packet(self, packet),
                FrameOutcome::NeedMore => return Ok(()),
            }
        }
    }

    fn begin_disconnect(&self, kind: ErrorKind, detail: impl Into<String>) {
        if self.disconnect_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.store(STATE_DISCONNECTING, Ordering::Release);
        unsafe {
            libc::shutdown(self.fd(), libc::SHUT_RDWR);
        }
        self.reactor.deregister(self.fd(), self.token);
        self.callbacks
            .on_error(self, &SessionError::new(kind, detail.into()));
    }

    fn maybe_finalize_disconnect(&self) {
        if !self.disconnect_requested.load(Ordering::Acquire) {
            return;
        }
        if self.recv_in_flight.load(Ordering::Acquire)
            || self.send_in_flight.load(Ordering::Acquire)
        {
            return;
        }
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        self.recv_ring.lock().expect("recv ring poisoned").clear();
        self.send_ring.lock().expect("send ring poisoned").clear();
        self.state.store(STATE_CLOSED, Ordering::Release);
        self.callbacks.on_disconnected(self);
    }

    /// Idempotent: shuts down both directions, closes outstanding ops, and
    /// fires `on_disconnected` exactly once, however many times this is
    /// called.
    pub fn request_disconnect(&self) {
        self.begin_disconnect(ErrorKind::ShutdownRequested, "disconnect requested");
        self.maybe_finalize_disconnect();
    }
}

impl Completable for Session {
    fn on_readable(&self) {
        if self.recv_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }
        self.do_recv();
        self.recv_in_flight.store(false, Ordering::Release);
        self.maybe_finalize_disconnect();
    }

    fn on_writable(&self) {
        self.try_post_send();
    }

    fn on_hup(&self) {
        self.begin_disconnect(ErrorKind::ConnectionLost, "EPOLLHUP/EPOLLERR");
        self.maybe_finalize_disconnect();
    }

    fn on_post(&self, _ctx: OpContext) {
        warn!(session = self.id, "session received unexpected user post");
        debug!("ignoring");
    }
}

fn readv(fd: std::os::fd::RawFd, first: &mut [u8], second: &mut [u8]) -> std::io::Result<usize> {
    let mut iov = [
        libc::iovec {
            iov_base: first.as_mut_ptr().cast(),
            iov_len: first.len(),
        },
        libc::iovec {
            iov_base: second.as_mut_ptr().cast(),
            iov_len: second.len(),
        },
    ];
    let iovcnt = if second.is_empty() { 1 } else { 2 };
    let n = unsafe { libc::readv(fd, iov.as_mut_ptr(), iovcnt) };
    if n < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn writev(fd: std::os::fd::RawFd, first: &[u8], second: &[u8]) -> std::io::Result<usize> {
    let iov = [
        libc::iovec {
            iov_base: first.as_ptr() as *mut _,
            iov_len: first.len(),
        },
        libc::iovec {
            iov_base: second.as_ptr() as *mut _,
            iov_len: second.len(),
        },
    ];
    let iovcnt = if second.is_empty() { 1 } else { 2 };
    let n = unsafe { libc::writev(fd, iov.as_ptr(), iovcnt) };
    if n < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Applies `TCP_NODELAY` and keepalive options; called once right after a
/// socket becomes a session (accept or connect completion).
pub fn finalize_session_socket(fd: std::os::fd::RawFd) -> std::io::Result<()> {
    socket::apply_session_options(fd)
}
