use std::collections::{HashMap, VecDeque};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use fastport_utils::{ThreadPriority, core_count, thread_boot};
use tracing::{debug, error, warn};

use crate::error::ReactorError;

/// Opaque identifier the reactor uses to route a completion to its
/// registered consumer. Callers obtain one from [`CompletionReactor::next_token`]
/// and register it alongside their fd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub u64);

const TOKEN_SHUTDOWN: u64 = 0;
const TOKEN_POST: u64 = 1;
const TOKEN_FIRST_USER: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
    ReadWrite,
}

impl Interest {
    fn bits(self) -> u32 {
        match self {
            Interest::Readable => libc::EPOLLIN as u32,
            Interest::Writable => libc::EPOLLOUT as u32,
            Interest::ReadWrite => (libc::EPOLLIN | libc::EPOLLOUT) as u32,
        }
    }
}

/// A user-injected completion context, delivered via [`CompletionReactor::post`]
/// to the target consumer's [`Completable::on_post`].
pub enum OpContext {
    UserPost(Box<dyn std::any::Any + Send>),
}

/// A consumer registered against a token. The reactor's worker pool calls
/// these from whichever worker thread happened to dequeue the event; a
/// consumer implementation must be safe to call from any thread.
pub trait Completable: Send + Sync {
    fn on_readable(&self) {}
    fn on_writable(&self) {}
    fn on_hup(&self) {}
    fn on_post(&self, _ctx: OpContext) {}
}

/// Thread pool blocked on a single shared `epoll` instance, the Linux
/// realization of an IOCP-style completion port: every fd is registered
/// `EPOLLEXCLUSIVE` so exactly one worker wakes per readiness event,
/// matching `GetQueuedCompletionStatus` round-robin dispatch across threads
/// sharing one completion queue.
pub struct CompletionReactor {
    epoll_fd: RawFd,
    shutdown_efd: RawFd,
    post_efd: RawFd,
    post_queue: Mutex<VecDeque<(Token, OpContext)>>,
    registry: RwLock<HashMap<u64, Arc<dyn Completable>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_token: AtomicU64,
    running: AtomicBool,
}

fn eventfd(initval: u32, flags: libc::c_int) -> std::io::Result<RawFd> {
    let fd = unsafe { libc::eventfd(initval, flags) };
    if fd < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

fn epoll_add(
    epoll_fd: RawFd,
    fd: RawFd,
    token: u64,
    bits: u32,
    exclusive: bool,
) -> std::io::Result<()> {
    let mut flags = bits;
    if exclusive {
        flags |= libc::EPOLLEXCLUSIVE as u32;
    }
    let mut ev = libc::epoll_event {
        events: flags,
        u64: token,
    };
    let rc = unsafe { libc::epoll_ctl(epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut ev) };
    if rc != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl CompletionReactor {
    pub fn new() -> std::io::Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let shutdown_efd = eventfd(0, libc::EFD_SEMAPHORE | libc::EFD_CLOEXEC)?;
        let post_efd = eventfd(0, libc::EFD_CLOEXEC)?;

        epoll_add(
            epoll_fd,
            shutdown_efd,
            TOKEN_SHUTDOWN,
            libc::EPOLLIN as u32,
            true,
        )?;
        epoll_add(epoll_fd, post_efd, TOKEN_POST, libc::EPOLLIN as u32, true)?;

        Ok(Self {
            epoll_fd,
            shutdown_efd,
            post_efd,
            post_queue: Mutex::new(VecDeque::new()),
            registry: RwLock::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(TOKEN_FIRST_USER),
            running: AtomicBool::new(false),
        })
    }

    pub fn next_token(&self) -> Token {
        Token(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register(
        &self,
        fd: RawFd,
        token: Token,
        interest: Interest,
        consumer: Arc<dyn Completable>,
    ) -> Result<(), ReactorError> {
        self.registry
            .write()
            .expect("registry lock poisoned")
            .insert(token.0, consumer);
        epoll_add(self.epoll_fd, fd, token.0, interest.bits(), true)?;
        Ok(())
    }

    pub fn reregister(
        &self,
        fd: RawFd,
        token: Token,
        interest: Interest,
    ) -> Result<(), ReactorError> {
        let mut ev = libc::epoll_event {
            events: interest.bits() | libc::EPOLLEXCLUSIVE as u32,
            u64: token.0,
        };
        let rc = unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_MOD, fd, &mut ev) };
        if rc != 0 {
            return Err(ReactorError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    pub fn deregister(&self, fd: RawFd, token: Token) {
        self.registry
            .write()
            .expect("registry lock poisoned")
            .remove(&token.0);
        unsafe {
            libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut());
        }
    }

    /// Queues a user completion for `token`, coalescing with any other
    /// pending posts behind one `post_efd` wakeup.
    pub fn post(&self, token: Token, ctx: OpContext) {
        self.post_queue
            .lock()
            .expect("post queue poisoned")
            .push_back((token, ctx));
        let one: u64 = 1;
        unsafe {
            libc::write(self.post_efd, &one as *const _ as *const libc::c_void, 8);
        }
    }

    pub fn start(self: &Arc<Self>, n_workers: usize) -> Result<(), ReactorError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ReactorError::AlreadyRunning);
        }
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        let cores = core_count();
        for idx in 0..n_workers {
            let reactor = Arc::clone(self);
            let core = idx % cores;
            workers.push(
                std::thread::Builder::new()
                    .name(format!("fastport-reactor-{idx}"))
                    .spawn(move || reactor.worker_loop(core))
                    .expect("failed to spawn reactor worker"),
            );
        }
        Ok(())
    }

    fn worker_loop(&self, core: usize) {
        thread_boot(Some(core), ThreadPriority::OSDefault);
        let mut events: [libc::epoll_event; 32] = unsafe { std::mem::zeroed() };
        loop {
            let n = unsafe {
                libc::epoll_wait(self.epoll_fd, events.as_mut_ptr(), events.len() as i32, -1)
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                error!(?err, "epoll_wait failed, worker exiting");
                return;
            }
            for ev in &events[..n as usize] {
                match ev.u64 {
                    TOKEN_SHUTDOWN => {
                        let mut val: u64 = 0;
                        unsafe {
                            libc::read(
                                self.shutdown_efd,
                                &mut val as *mut _ as *mut libc::c_void,
                                8,
                            );
                        }
                        debug!("reactor worker observed shutdown sentinel, exiting");
                        return;
                    }
                    TOKEN_POST => {
                        let mut val: u64 = 0;
                        unsafe {
                            libc::read(self.post_efd, &mut val as *mut _ as *mut libc::c_void, 8);
                        }
                        self.drain_posts();
                    }
                    token => self.dispatch(token, ev.events),
                }
            }
        }
    }

    fn drain_posts(&self) {
        loop {
            let next = self
                .post_queue
                .lock()
                .expect("post queue poisoned")
                .pop_front();
            let Some((token, ctx)) = next else { break };
            if let Some(consumer) = self
                .registry
                .read()
                .expect("registry lock poisoned")
                .get(&token.0)
            {
                consumer.on_post(ctx);
            } else {
                warn!(
                    token = token.0,
                    "post for unknown/disconnected token dropped"
                );
            }
        }
    }

    fn dispatch(&self, token: u64, events: u32) {
        let consumer = self
            .registry
            .read()
            .expect("registry lock poisoned")
            .get(&token)
            .cloned();
        let Some(consumer) = consumer else {
            debug!(token, "event for unknown token, session already gone");
            return;
        };
        if events & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0 {
            consumer.on_hup();
            return;
        }
        if events & libc::EPOLLIN as u32 != 0 {
            consumer.on_readable();
        }
        if events & libc::EPOLLOUT as u32 != 0 {
            consumer.on_writable();
        }
    }

    /// Enqueues `n_workers` shutdown sentinels (one `EFD_SEMAPHORE` unit
    /// each) so each worker's next wakeup consumes exactly one and exits.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let n = self.workers.lock().expect("workers lock poisoned").len() as u64;
        unsafe {
            libc::write(self.shutdown_efd, &n as *const _ as *const libc::c_void, 8);
        }
    }

    pub fn wait_until_stopped(&self) {
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for CompletionReactor {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll_fd);
            libc::close(self.shutdown_efd);
            libc::close(self.post_efd);
        }
    }
}
