mod framer;
mod ring;

pub use framer::{FrameOutcome, FramerError, Packet, PacketFramer};
pub use ring::{RingBuffer, RingError};
