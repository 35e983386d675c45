//! Incremental codec for the `<decimal-length>:<json-bytes>` packet framing.

use crate::error::TransportError;

/// Upper bound on the decimal length header. Ten digits already covers any
/// frame the protocol can produce; anything longer is a framing error, not a
/// large packet.
const MAX_HEADER_DIGITS: usize = 10;

/// Frame one outgoing packet payload. The length prefix counts bytes, not
/// characters.
pub fn encode_frame(payload: &str) -> String {
    format!("{}:{}", payload.len(), payload)
}

/// Buffers raw bytes from the stream and yields complete packet payloads in
/// arrival order.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// True when buffered bytes form a partial frame. Used to tell a clean
    /// end-of-stream apart from one that cut a packet short.
    pub fn is_mid_frame(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Try to extract the next complete frame. `Ok(None)` means more bytes
    /// are needed.
    pub fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        let colon = match self.buf.iter().position(|&b| b == b':') {
            Some(index) => index,
            None => {
                if let Some(&bad) = self.buf.iter().find(|b| !b.is_ascii_digit()) {
                    return Err(TransportError::Decode(format!(
                        "unexpected byte 0x{bad:02x} in length header"
                    )));
                }
                if self.buf.len() > MAX_HEADER_DIGITS {
                    return Err(TransportError::Decode("length header too long".into()));
                }
                return Ok(None);
            },
        };

        let header = &self.buf[..colon];
        if header.is_empty()
            || header.len() > MAX_HEADER_DIGITS
            || header.iter().any(|b| !b.is_ascii_digit())
        {
            return Err(TransportError::Decode(format!(
                "bad length header {:?}",
                String::from_utf8_lossy(header)
            )));
        }

        let length: usize = std::str::from_utf8(header)
            .map_err(|e| TransportError::Decode(e.to_string()))?
            .parse()
            .map_err(|e| TransportError::Decode(format!("length header: {e}")))?;

        let start = colon + 1;
        if self.buf.len() < start + length {
            return Ok(None);
        }

        let payload = String::from_utf8(self.buf[start..start + length].to_vec())
            .map_err(|e| TransportError::Decode(format!("packet is not UTF-8: {e}")))?;
        self.buf.drain(..start + length);
        Ok(Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_byte_length() {
        assert_eq!(encode_frame("{}"), "2:{}");
        // length counts bytes of the UTF-8 encoding
        assert_eq!(encode_frame("é"), "2:é");
    }

    #[test]
    fn decodes_a_frame_split_across_reads() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"24:{\"from\":\"root\",");
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.push(b"\"a\":true}");
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some("{\"from\":\"root\",\"a\":true}")
        );
        assert!(!decoder.is_mid_frame());
    }

    #[test]
    fn decodes_multiple_frames_from_one_read() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"2:{}3:[1]");
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some("{}"));
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some("[1]"));
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn rejects_non_decimal_header() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"{\"from\":\"root\"}");
        assert!(matches!(
            decoder.next_frame(),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn rejects_oversized_header() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"999999999999999");
        assert!(matches!(
            decoder.next_frame(),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn partial_header_is_not_an_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"123");
        assert!(decoder.next_frame().unwrap().is_none());
        assert!(decoder.is_mid_frame());
    }
}
