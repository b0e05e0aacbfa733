use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::reactor::{Completable, CompletionReactor, Interest, OpContext, Token};
use crate::session::{self, Session, SessionCallbacks};

/// Reactions to the outcome of a single outbound connect attempt.
pub trait ConnectorCallbacks: Send + Sync {
    fn on_connected(&self, session: &Arc<Session>);
    fn on_error(&self, kind: ErrorKind, detail: String);
}

/// Issues one non-blocking `connect()`, registers for `EPOLLOUT`, and
/// resolves the outcome via `SO_ERROR` once the socket becomes writable —
/// the Linux analogue of `ConnectEx` completion. Retries are not provided at
/// this layer.
pub struct Connector {
    stream: std::net::TcpStream,
    token: Token,
    reactor: Arc<CompletionReactor>,
    session_id: u64,
    ring_capacity: usize,
    resolved: AtomicBool,
    session_callbacks: std::sync::Mutex<Option<Box<dyn SessionCallbacks>>>,
    callbacks: std::sync::Mutex<Box<dyn ConnectorCallbacks>>,
}

impl Connector {
    pub fn connect(
        addr: SocketAddr,
        reactor: Arc<CompletionReactor>,
        session_id: u64,
        ring_capacity: usize,
        session_callbacks: Box<dyn SessionCallbacks>,
        callbacks: Box<dyn ConnectorCallbacks>,
    ) -> std::io::Result<Arc<Self>> {
        let stream = crate::socket::connect_nonblocking(addr)?;
        let token = reactor.next_token();
        let connector = Arc::new(Self {
            stream,
            token,
            reactor,
            session_id,
            ring_capacity,
            resolved: AtomicBool::new(false),
            session_callbacks: std::sync::Mutex::new(Some(session_callbacks)),
            callbacks: std::sync::Mutex::new(callbacks),
        });
        let consumer: Arc<dyn Completable> = connector.clone();
        connector
            .reactor
            .register(
                connector.stream.as_raw_fd(),
                token,
                Interest::Writable,
                consumer,
            )
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        Ok(connector)
    }

    fn resolve(&self) {
        if self.resolved.swap(true, Ordering::AcqRel) {
            return;
        }
        let fd = self.stream.as_raw_fd();
        self.reactor.deregister(fd, self.token);

        match crate::socket::take_socket_error(fd) {
            Ok(None) => {
                let peer_addr = match self.stream.peer_addr() {
                    Ok(addr) => addr,
                    Err(err) => {
                        self.callbacks
                            .lock()
                            .expect("connector callbacks poisoned")
                            .on_error(ErrorKind::ConnectTimeout, err.to_string());
                        return;
                    }
                };
                if let Err(err) = session::finalize_session_socket(fd) {
                    self.callbacks
                        .lock()
                        .expect("connector callbacks poisoned")
                        .on_error(ErrorKind::ConnectTimeout, err.to_string());
                    return;
                }
                // SAFETY: the fd is fully owned by `self.stream`; duplicating
                // it lets Session take its own owned TcpStream without two
                // owners racing to close the same fd.
                let dup = match self.stream.try_clone() {
                    Ok(dup) => dup,
                    Err(err) => {
                        self.callbacks
                            .lock()
                            .expect("connector callbacks poisoned")
                            .on_error(ErrorKind::ConnectTimeout, err.to_string());
                        return;
                    }
                };
                let session_token = self.reactor.next_token();
                let callbacks = self
                    .session_callbacks
                    .lock()
                    .expect("session callbacks poisoned")
                    .take()
                    .expect("resolve runs at most once");
                let session = Session::new(
                    self.session_id,
                    session_token,
                    dup,
                    peer_addr,
                    self.ring_capacity,
                    Arc::clone(&self.reactor),
                    callbacks,
                );
                match session.start() {
                    Ok(()) => {
                        debug!(peer = %peer_addr, "connected");
                        self.callbacks
                            .lock()
                            .expect("connector callbacks poisoned")
                            .on_connected(&session);
                    }
                    Err(err) => {
                        warn!(?err, "failed to register outbound session");
                        self.callbacks
                            .lock()
                            .expect("connector callbacks poisoned")
                            .on_error(ErrorKind::ConnectTimeout, err.to_string());
                    }
                }
            }
            Ok(Some(err)) => {
                self.callbacks
                    .lock()
                    .expect("connector callbacks poisoned")
                    .on_error(ErrorKind::ConnectTimeout, err.to_string());
            }
            Err(err) => {
                self.callbacks
                    .lock()
                    .expect("connector callbacks poisoned")
                    .on_error(ErrorKind::ConnectTimeout, err.to_string());
            }
        }
    }
}

impl Completable for Connector {
    fn on_writable(&self) {
        self.resolve();
    }

    fn on_hup(&self) {
        self.resolve();
    }

    fn on_post(&self, _ctx: OpContext) {}
}
