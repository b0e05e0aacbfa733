use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use fastport_timing::{Nanos, Repeater};
use tracing::{debug, error, info, warn};

use crate::error::ErrorKind;
use crate::reactor::{Completable, CompletionReactor, Interest, OpContext, Token};
use crate::session::{Session, SessionCallbacks};
use crate::socket;

/// Reactions to accept-path events, fired once per accepted connection.
pub trait AcceptorCallbacks: Send + Sync {
    fn on_accepted(&self, session: &Arc<Session>);
    fn on_error(&self, kind: ErrorKind, detail: String);
}

/// Builds the per-connection [`SessionCallbacks`] for a freshly accepted
/// socket. Called once per accept, from whichever reactor worker observed it.
pub type SessionFactory = dyn Fn() -> Box<dyn SessionCallbacks> + Send + Sync;

/// Minimum gap between logged `accept4` failures: a listener wedged under
/// sustained failure would otherwise flood the log once per readable wakeup.
const ACCEPT_FAILURE_LOG_INTERVAL_MS: u64 = 1_000;

/// Owns a listening socket and keeps at least one accept outstanding while
/// running. Linux has no `AcceptEx`-style pre-posted accept, so "posting
/// `initial_post_count` accepts" is realized as draining up to
/// `initial_post_count` connections with `accept4` on every readable wakeup;
/// the acceptor still guarantees a session is created and `on_accepted`
/// fires for every completed connection.
pub struct Acceptor {
    listener: std::net::TcpListener,
    token: Token,
    reactor: Arc<CompletionReactor>,
    initial_post_count: usize,
    ring_capacity: usize,
    next_session_id: AtomicU64,
    session_factory: Box<SessionFactory>,
    callbacks: Mutex<Box<dyn AcceptorCallbacks>>,
    accept_failure_log_pace: Mutex<Repeater>,
}

impl Acceptor {
    pub fn bind(
        addr: SocketAddr,
        reactor: Arc<CompletionReactor>,
        initial_post_count: usize,
        ring_capacity: usize,
        session_factory: Box<SessionFactory>,
        callbacks: Box<dyn AcceptorCallbacks>,
    ) -> std::io::Result<Arc<Self>> {
        let listener = socket::bind_listener(addr)?;
        let token = reactor.next_token();
        let acceptor = Arc::new(Self {
            listener,
            token,
            reactor,
            initial_post_count,
            ring_capacity,
            next_session_id: AtomicU64::new(1),
            session_factory,
            callbacks: Mutex::new(callbacks),
            accept_failure_log_pace: Mutex::new(Repeater::every(Nanos::from_millis(
                ACCEPT_FAILURE_LOG_INTERVAL_MS,
            ))),
        });
        let consumer: Arc<dyn Completable> = acceptor.clone();
        acceptor
            .reactor
            .register(
                acceptor.listener.as_raw_fd(),
                token,
                Interest::Readable,
                consumer,
            )
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        info!(addr = %addr, "acceptor listening");
        Ok(acceptor)
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Deregisters and closes the listening socket, failing all outstanding
    /// accepts. Idempotent via the reactor's own deregister-by-token.
    pub fn close(&self) {
        self.reactor
            .deregister(self.listener.as_raw_fd(), self.token);
    }

    fn accept_round(&self) {
        let accepted = match socket::accept_batch(&self.listener, self.initial_post_count) {
            Ok(accepted) => accepted,
            Err(err) => {
                if self
                    .accept_failure_log_pace
                    .lock()
                    .expect("accept failure pace poisoned")
                    .fired()
                {
                    error!(?err, "accept4 failed");
                }
                self.callbacks
                    .lock()
                    .expect("acceptor callbacks poisoned")
                    .on_error(ErrorKind::PostAcceptFailed, err.to_string());
                return;
            }
        };
        for (stream, peer_addr) in accepted {
            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
            let session_token = self.reactor.next_token();
            let session_callbacks = (self.session_factory)();
            let session = Session::new(
                id,
                session_token,
                stream,
                peer_addr,
                self.ring_capacity,
                Arc::clone(&self.reactor),
                session_callbacks,
            );
            match session.start() {
                Ok(()) => {
                    debug!(session = id, peer = %peer_addr, "accepted");
                    self.callbacks
                        .lock()
                        .expect("acceptor callbacks poisoned")
                        .on_accepted(&session);
                }
                Err(err) => {
                    warn!(?err, "failed to register accepted session, dropping");
                }
            }
        }
    }
}

impl Completable for Acceptor {
    fn on_readable(&self) {
        self.accept_round();
    }

    fn on_hup(&self) {
        warn!("listening socket reported HUP/ERR");
    }

    fn on_post(&self, _ctx: OpContext) {}
}
