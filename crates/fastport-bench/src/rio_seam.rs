use fastport_network::rio::RioBufferPool;

/// Demonstrates staging benchmark payloads through the Registered-I/O seam
/// instead of a bare `Vec<u8>`. A fresh bump-allocated pool backs each fill
/// since `RioBufferPool` never frees a carved slice individually.
pub struct RioStaging {
    payload_size: usize,
}

impl RioStaging {
    pub fn new(payload_size: usize) -> Self {
        Self { payload_size }
    }

    pub fn fill(&self, byte: u8) -> Vec<u8> {
        let pool = RioBufferPool::new(self.payload_size);
        let mut slice = pool
            .allocate_slice(self.payload_size)
            .expect("freshly sized pool fits one fill");
        slice.as_mut_slice().fill(byte);
        slice.as_mut_slice().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_returns_a_buffer_of_the_requested_size_carved_from_the_pool() {
        let staging = RioStaging::new(32);
        let buf = staging.fill(0x42);
        assert_eq!(buf.len(), 32);
        assert!(buf.iter().all(|&b| b == 0x42));
    }
}
