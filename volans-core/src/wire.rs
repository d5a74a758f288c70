//! Datagram codec: bincode body, one datagram per UDP packet.

use bincode::Options;

use crate::protocol::Datagram;

/// Largest encoded datagram accepted in either direction. Matches the
/// transport's receive buffer.
pub const MAX_DATAGRAM_LEN: usize = 4096;

/// Fixed-width ints keep header fields at stable offsets; the byte limit
/// stops a forged payload length from allocating past the receive buffer.
fn codec() -> impl Options {
    bincode::options()
        .with_fixint_encoding()
        .with_limit(MAX_DATAGRAM_LEN as u64)
}

/// Encode one datagram into a packet body.
pub fn encode_datagram(dgram: &Datagram) -> Result<Vec<u8>, DatagramEncodeError> {
    codec().serialize(dgram).map_err(|e| {
        if matches!(*e, bincode::ErrorKind::SizeLimit) {
            DatagramEncodeError::TooLarge
        } else {
            DatagramEncodeError::Encode(e)
        }
    })
}

/// Error encoding a datagram (bincode or size limit).
#[derive(Debug, thiserror::Error)]
pub enum DatagramEncodeError {
    #[error("encode error: {0}")]
    Encode(#[source] bincode::Error),
    #[error("datagram too large")]
    TooLarge,
}

/// Decode one received packet into a datagram. Returns `Err` on any
/// malformed input; never panics and never yields a partial datagram.
pub fn decode_datagram(bytes: &[u8]) -> Result<Datagram, DatagramDecodeError> {
    if bytes.len() > MAX_DATAGRAM_LEN {
        return Err(DatagramDecodeError::TooLarge);
    }
    codec()
        .deserialize(bytes)
        .map_err(DatagramDecodeError::Decode)
}

/// Error decoding a packet (too large or bincode failure).
#[derive(Debug, thiserror::Error)]
pub enum DatagramDecodeError {
    #[error("datagram too large")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
}
