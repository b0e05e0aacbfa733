mod acceptor;
mod connector;
pub mod error;
mod reactor;
pub mod rio;
mod session;
mod socket;

pub use acceptor::{Acceptor, AcceptorCallbacks, SessionFactory};
pub use connector::{Connector, ConnectorCallbacks};
pub use error::{ErrorKind, ReactorError, SessionError};
pub use reactor::{Completable, CompletionReactor, Interest, OpContext, Token};
pub use session::{Session, SessionCallbacks};
pub use socket::{bind_listener, connect_nonblocking};
