use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("commit_write({requested}) exceeds writable capacity {available}")]
    Overflow { requested: usize, available: usize },
    #[error("consume({requested}) exceeds readable occupancy {available}")]
    Underflow { requested: usize, available: usize },
}

/// Bounded single-producer/single-consumer byte ring.
///
/// Not internally synchronized: callers (the `Session`'s atomic recv/send
/// guards) are responsible for serializing access per direction.
pub struct RingBuffer {
    data: Vec<u8>,
    capacity: usize,
    head: usize,
    tail: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            capacity,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn occupancy(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn writable_len(&self) -> usize {
        self.capacity - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Free region in physical order, as up to two spans. The first span
    /// starts at `head`; the second (if present) wraps to index 0.
    pub fn writable_spans(&mut self) -> (&mut [u8], &mut [u8]) {
        let free = self.writable_len();
        if free == 0 {
            return (&mut [], &mut []);
        }
        let first_len = free.min(self.capacity - self.head);
        let (before, after) = self.data.split_at_mut(self.head);
        let (first, _) = after.split_at_mut(first_len);
        let second_len = free - first_len;
        let second = &mut before[..second_len];
        (first, second)
    }

    /// Advances `head` by `n`, marking `n` freshly written bytes as readable.
    pub fn commit_write(&mut self, n: usize) -> Result<(), RingError> {
        let available = self.writable_len();
        if n > available {
            return Err(RingError::Overflow {
                requested: n,
                available,
            });
        }
        self.head = (self.head + n) % self.capacity.max(1);
        self.len += n;
        Ok(())
    }

    /// Occupied region in physical order, as up to two spans. The first span
    /// starts at `tail`; the second (if present) wraps to index 0.
    pub fn readable_spans(&self) -> (&[u8], &[u8]) {
        if self.len == 0 {
            return (&[], &[]);
        }
        let first_len = self.len.min(self.capacity - self.tail);
        let first = &self.data[self.tail..self.tail + first_len];
        let second_len = self.len - first_len;
        let second = &self.data[..second_len];
        (first, second)
    }

    /// Advances `tail` by `n`, releasing `n` bytes back to the writable
    /// region.
    pub fn consume(&mut self, n: usize) -> Result<(), RingError> {
        if n > self.len {
            return Err(RingError::Underflow {
                requested: n,
                available: self.len,
            });
        }
        self.tail = (self.tail + n) % self.capacity.max(1);
        self.len -= n;
        Ok(())
    }

    /// Writes `bytes` into the writable spans, failing atomically (no bytes
    /// written) if there isn't room for all of them.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), RingError> {
        let available = self.writable_len();
        if bytes.len() > available {
            return Err(RingError::Overflow {
                requested: bytes.len(),
                available,
            });
        }
        let (first, second) = self.writable_spans();
        let split = bytes.len().min(first.len());
        first[..split].copy_from_slice(&bytes[..split]);
        if split < bytes.len() {
            second[..bytes.len() - split].copy_from_slice(&bytes[split..]);
        }
        self.commit_write(bytes.len())
    }

    /// Copies the occupied bytes into a single owned buffer, in stream order.
    pub fn peek_to_vec(&self, n: usize) -> Vec<u8> {
        let (first, second) = self.readable_spans();
        let mut out = Vec::with_capacity(n);
        let first_take = n.min(first.len());
        out.extend_from_slice(&first[..first_take]);
        if first_take < n {
            out.extend_from_slice(&second[..n - first_take]);
        }
        out
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_reports_full_capacity_writable() {
        let mut r = RingBuffer::new(16);
        assert_eq!(r.writable_len(), 16);
        assert_eq!(r.occupancy(), 0);
        let (a, b) = r.writable_spans();
        assert_eq!(a.len() + b.len(), 16);
    }

    #[test]
    fn accepts_exactly_capacity_rejects_one_more() {
        let mut r = RingBuffer::new(8);
        let data = [1u8; 8];
        r.write(&data).unwrap();
        assert!(r.is_full());
        assert_eq!(
            r.write(&[1]),
            Err(RingError::Overflow {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn write_then_read_round_trips_in_order() {
        let mut r = RingBuffer::new(32);
        r.write(b"hello world").unwrap();
        assert_eq!(r.peek_to_vec(11), b"hello world");
        r.consume(11).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn wrap_around_write_and_read_two_span_view() {
        let mut r = RingBuffer::new(16);
        // push head/tail past the midpoint
        r.write(&[0u8; 12]).unwrap();
        r.consume(12).unwrap();
        assert_eq!(r.writable_len(), 16);

        // write 10 bytes: this must wrap across the capacity boundary
        let payload: Vec<u8> = (0..10).collect();
        r.write(&payload).unwrap();
        assert_eq!(r.occupancy(), 10);

        let (first, second) = r.readable_spans();
        assert_eq!(first.len() + second.len(), 10);
        assert_eq!(r.peek_to_vec(10), payload);
    }

    #[test]
    fn consume_past_occupancy_is_underflow() {
        let mut r = RingBuffer::new(8);
        r.write(&[1, 2, 3]).unwrap();
        assert_eq!(
            r.consume(4),
            Err(RingError::Underflow {
                requested: 4,
                available: 3
            })
        );
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut r = RingBuffer::new(8);
        r.write(&[1, 2, 3]).unwrap();
        r.clear();
        assert!(r.is_empty());
        assert_eq!(r.writable_len(), 8);
    }

    #[test]
    fn writable_plus_occupancy_always_equals_capacity() {
        let mut r = RingBuffer::new(20);
        for _ in 0..50 {
            r.write(&[0u8; 5]).unwrap();
            assert_eq!(r.writable_len() + r.occupancy(), r.capacity());
            r.consume(5).unwrap();
            assert_eq!(r.writable_len() + r.occupancy(), r.capacity());
        }
    }
}
