//! Per-transfer counters

/// Statistics for one logical transfer
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArqStats {
    /// Data frames transmitted for the first time
    pub frames_sent: u64,
    /// Data frames delivered in order
    pub frames_delivered: u64,
    /// Payload bytes handed to the sender
    pub bytes_sent: u64,
    /// Payload bytes delivered in order
    pub bytes_received: u64,
    /// Acknowledgments emitted by the receiver
    pub acks_sent: u64,
    /// Valid acknowledgments seen by the sender
    pub acks_received: u64,
    /// Acknowledgments equal to `base - 1`
    pub duplicate_acks: u64,
    /// Frames resent for any reason
    pub retransmissions: u64,
    /// Frames resent after the duplicate-ACK threshold
    pub fast_retransmissions: u64,
    /// Retransmission timer expirations
    pub timeouts: u64,
    /// Frames dropped by checksum or kind
    pub corrupt_dropped: u64,
    /// Out-of-order frames answered with a duplicate ACK
    pub out_of_order: u64,
}
