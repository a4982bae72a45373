//! Fixed-size queue envelopes for frames crossing the I/O ↔ consumer boundary

use crate::protocol::MAX_PAYLOAD_SIZE_BUFFER;
use crate::types::ConnectionId;

/// A frame received from a session's socket, queued for the consumer.
///
/// Trivially copyable so it can travel through the SPSC ring by value.
/// Frames larger than `MAX_PAYLOAD_SIZE_BUFFER` never take this path.
#[derive(Debug, Clone, Copy)]
pub struct InboundMessage {
    /// Session the frame arrived on.
    pub connection_id: ConnectionId,
    /// Wire type byte.
    pub message_type: u8,
    /// Valid prefix length of `payload`.
    pub payload_size: u16,
    /// Inline payload bytes.
    pub payload: [u8; MAX_PAYLOAD_SIZE_BUFFER],
}

impl InboundMessage {
    /// Build an envelope, copying `payload` inline.
    ///
    /// # Panics
    /// If `payload` exceeds `MAX_PAYLOAD_SIZE_BUFFER`.
    #[must_use]
    pub fn new(connection_id: ConnectionId, message_type: u8, payload: &[u8]) -> Self {
        assert!(payload.len() <= MAX_PAYLOAD_SIZE_BUFFER);
        let mut inline = [0u8; MAX_PAYLOAD_SIZE_BUFFER];
        inline[..payload.len()].copy_from_slice(payload);
        #[allow(clippy::cast_possible_truncation)]
        let payload_size = payload.len() as u16;
        Self {
            connection_id,
            message_type,
            payload_size,
            payload: inline,
        }
    }

    /// The valid payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..usize::from(self.payload_size)]
    }
}

/// A frame produced by the engine, queued for a session's write task.
#[derive(Debug, Clone, Copy)]
pub struct OutboundMessage {
    /// Destination session.
    pub connection_id: ConnectionId,
    /// Wire type byte.
    pub message_type: u8,
    /// Valid prefix length of `payload`.
    pub payload_size: u16,
    /// Inline payload bytes.
    pub payload: [u8; MAX_PAYLOAD_SIZE_BUFFER],
}

impl OutboundMessage {
    /// Build an envelope, copying `payload` inline.
    ///
    /// # Panics
    /// If `payload` exceeds `MAX_PAYLOAD_SIZE_BUFFER`.
    #[must_use]
    pub fn new(connection_id: ConnectionId, message_type: u8, payload: &[u8]) -> Self {
        assert!(payload.len() <= MAX_PAYLOAD_SIZE_BUFFER);
        let mut inline = [0u8; MAX_PAYLOAD_SIZE_BUFFER];
        inline[..payload.len()].copy_from_slice(payload);
        #[allow(clippy::cast_possible_truncation)]
        let payload_size = payload.len() as u16;
        Self {
            connection_id,
            message_type,
            payload_size,
            payload: inline,
        }
    }

    /// The valid payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..usize::from(self.payload_size)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_payload_prefix() {
        let msg = InboundMessage::new(3, 4, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(msg.connection_id, 3);
        assert_eq!(msg.message_type, 4);
        assert_eq!(msg.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_outbound_empty_payload() {
        let msg = OutboundMessage::new(1, 2, &[]);
        assert!(msg.payload().is_empty());
    }
}
