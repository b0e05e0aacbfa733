use thiserror::Error;

/// Taxonomy of failures a session or the reactor can escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectTimeout,
    ConnectionLost,
    BufferFull,
    BufferOverflow,
    InvalidFrame,
    SendFailed,
    RecvFailed,
    PostAcceptFailed,
    ShutdownRequested,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ConnectTimeout => "connect timed out",
            ErrorKind::ConnectionLost => "connection lost",
            ErrorKind::BufferFull => "recv ring is full",
            ErrorKind::BufferOverflow => "send ring cannot hold the frame",
            ErrorKind::InvalidFrame => "framer rejected the byte stream",
            ErrorKind::SendFailed => "send syscall failed",
            ErrorKind::RecvFailed => "recv syscall failed",
            ErrorKind::PostAcceptFailed => "failed to post a replacement accept",
            ErrorKind::ShutdownRequested => "shutdown requested",
        };
        f.write_str(s)
    }
}

/// A session-level failure, always carrying the kind the caller should act
/// on plus a human-readable detail for logging.
#[derive(Error, Debug)]
#[error("{kind}: {detail}")]
pub struct SessionError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("reactor is not running")]
    NotRunning,
    #[error("reactor is already running")]
    AlreadyRunning,
}
