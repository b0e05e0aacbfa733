/// Benchmark request: client timestamp plus sequence plus an opaque
/// payload of the configured size. Protobuf message definitions themselves
/// are out of scope here; the payload is a flat binary encoding instead.
pub const PACKET_ID_REQUEST: u16 = 0x1001;
/// Benchmark response: echoes sequence and client timestamp, adds the
/// server's recv/send timestamps.
pub const PACKET_ID_RESPONSE: u16 = 0x1002;
/// Echo test: request carries a string, response carries it back plus a
/// result code. Distinct from the request/response pair per the wire
/// contract's "a distinct value" requirement.
pub const PACKET_ID_ECHO: u16 = 0x2001;

pub struct BenchmarkRequest {
    pub sequence: u32,
    pub client_timestamp_ns: u64,
    pub payload: Vec<u8>,
}

impl BenchmarkRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.payload.len());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.client_timestamp_ns.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        let sequence = u32::from_be_bytes(bytes[0..4].try_into().ok()?);
        let client_timestamp_ns = u64::from_be_bytes(bytes[4..12].try_into().ok()?);
        Some(Self {
            sequence,
            client_timestamp_ns,
            payload: bytes[12..].to_vec(),
        })
    }
}

/// Echo request: an opaque UTF-8 string to be bounced back unchanged.
pub struct EchoRequest {
    pub message: String,
}

impl EchoRequest {
    pub fn encode(&self) -> Vec<u8> {
        self.message.as_bytes().to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            message: String::from_utf8(bytes.to_vec()).ok()?,
        })
    }
}

/// Echo response: the same string, plus a result code (0 = ok).
pub struct EchoResponse {
    pub message: String,
    pub result_code: u32,
}

impl EchoResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.message.len());
        out.extend_from_slice(&self.result_code.to_be_bytes());
        out.extend_from_slice(self.message.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let result_code = u32::from_be_bytes(bytes[0..4].try_into().ok()?);
        let message = String::from_utf8(bytes[4..].to_vec()).ok()?;
        Some(Self {
            message,
            result_code,
        })
    }
}

pub struct BenchmarkResponse {
    pub sequence: u32,
    pub client_timestamp_ns: u64,
    pub server_recv_timestamp_ns: u64,
    pub server_send_timestamp_ns: u64,
}

impl BenchmarkResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(28);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.client_timestamp_ns.to_be_bytes());
        out.extend_from_slice(&self.server_recv_timestamp_ns.to_be_bytes());
        out.extend_from_slice(&self.server_send_timestamp_ns.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 28 {
            return None;
        }
        Some(Self {
            sequence: u32::from_be_bytes(bytes[0..4].try_into().ok()?),
            client_timestamp_ns: u64::from_be_bytes(bytes[4..12].try_into().ok()?),
            server_recv_timestamp_ns: u64::from_be_bytes(bytes[12..20].try_into().ok()?),
            server_send_timestamp_ns: u64::from_be_bytes(bytes[20..28].try_into().ok()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let req = BenchmarkRequest {
            sequence: 7,
            client_timestamp_ns: 123_456,
            payload: vec![1, 2, 3],
        };
        let decoded = BenchmarkRequest::decode(&req.encode()).unwrap();
        assert_eq!(decoded.sequence, 7);
        assert_eq!(decoded.client_timestamp_ns, 123_456);
        assert_eq!(decoded.payload, vec![1, 2, 3]);
    }

    #[test]
    fn echo_request_round_trips() {
        let req = EchoRequest {
            message: "hello fastport".to_string(),
        };
        let decoded = EchoRequest::decode(&req.encode()).unwrap();
        assert_eq!(decoded.message, "hello fastport");
    }

    #[test]
    fn echo_response_round_trips() {
        let resp = EchoResponse {
            message: "hello fastport".to_string(),
            result_code: 0,
        };
        let decoded = EchoResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded.message, "hello fastport");
        assert_eq!(decoded.result_code, 0);
    }

    #[test]
    fn response_round_trips() {
        let resp = BenchmarkResponse {
            sequence: 9,
            client_timestamp_ns: 1,
            server_recv_timestamp_ns: 2,
            server_send_timestamp_ns: 3,
        };
        let decoded = BenchmarkResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded.sequence, 9);
        assert_eq!(decoded.server_recv_timestamp_ns, 2);
        assert_eq!(decoded.server_send_timestamp_ns, 3);
    }
}
