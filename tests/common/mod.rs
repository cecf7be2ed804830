//! Shared test helpers for ARQ integration tests

#![allow(dead_code)]

use arq_tokio::{Frame, MemoryAddr, MemoryTransport, Transport};
use bytes::Bytes;
use std::io;
use std::sync::Mutex;

/// Install a fmt subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// `Message 0` .. `Message {count-1}` followed by the end-of-stream marker.
pub fn messages(count: usize) -> Vec<Bytes> {
    let mut out: Vec<Bytes> = (0..count)
        .map(|i| Bytes::from(format!("Message {i}")))
        .collect();
    out.push(Bytes::from_static(b"END"));
    out
}

/// What a [`ScriptedTransport`] does with one outbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Drop,
    Corrupt,
}

type Rule = Box<dyn FnMut(&Frame) -> Verdict + Send>;

/// Memory transport that logs every outbound frame and applies a scripted
/// drop/corrupt rule to it.
pub struct ScriptedTransport {
    inner: MemoryTransport,
    rule: Mutex<Rule>,
    log: Mutex<Vec<Frame>>,
}

impl ScriptedTransport {
    pub fn new(inner: MemoryTransport) -> Self {
        Self {
            inner,
            rule: Mutex::new(Box::new(|_| Verdict::Pass)),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rule(inner: MemoryTransport, rule: impl FnMut(&Frame) -> Verdict + Send + 'static) -> Self {
        Self {
            inner,
            rule: Mutex::new(Box::new(rule)),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Connected pair: `(a, b)` with rules for the frames each side sends.
    pub fn pair(
        rule_a: impl FnMut(&Frame) -> Verdict + Send + 'static,
        rule_b: impl FnMut(&Frame) -> Verdict + Send + 'static,
    ) -> (Self, Self) {
        let (a, b) = MemoryTransport::pair();
        (Self::with_rule(a, rule_a), Self::with_rule(b, rule_b))
    }

    pub fn close(&self) {
        self.inner.close();
    }

    /// Every frame offered to the transport, including dropped ones
    pub fn sent(&self) -> Vec<Frame> {
        self.log.lock().unwrap().clone()
    }

    /// Sequence numbers of data frames, in transmission order
    pub fn data_seqs(&self) -> Vec<u32> {
        self.sent()
            .iter()
            .filter(|f| !f.is_ack())
            .map(|f| f.seq)
            .collect()
    }

    /// Acknowledgment numbers of pure ACKs, in transmission order
    pub fn acks(&self) -> Vec<u32> {
        self.sent()
            .iter()
            .filter(|f| f.is_ack())
            .map(|f| f.ack)
            .collect()
    }
}

impl Transport for ScriptedTransport {
    type Addr = MemoryAddr;

    async fn send_to(&self, buf: &[u8], target: &MemoryAddr) -> io::Result<usize> {
        let Ok(frame) = Frame::decode(Bytes::copy_from_slice(buf)) else {
            return self.inner.send_to(buf, target).await;
        };

        self.log.lock().unwrap().push(frame.clone());
        let verdict = {
            let mut rule = self.rule.lock().unwrap();
            rule(&frame)
        };

        match verdict {
            Verdict::Pass => self.inner.send_to(buf, target).await,
            Verdict::Drop => Ok(buf.len()),
            Verdict::Corrupt => {
                let damaged = Frame::error(frame.seq, frame.ack).to_bytes();
                self.inner.send_to(&damaged, target).await?;
                Ok(buf.len())
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, MemoryAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<MemoryAddr> {
        self.inner.local_addr()
    }
}

/// Drop the first transmission of the data frame with sequence number `seq`.
pub fn drop_data_once(seq: u32) -> impl FnMut(&Frame) -> Verdict + Send + 'static {
    let mut done = false;
    move |frame| {
        if !done && !frame.is_ack() && frame.seq == seq {
            done = true;
            Verdict::Drop
        } else {
            Verdict::Pass
        }
    }
}

/// Drop the first ACK carrying acknowledgment number `ack`.
pub fn drop_ack_once(ack: u32) -> impl FnMut(&Frame) -> Verdict + Send + 'static {
    let mut done = false;
    move |frame| {
        if !done && frame.is_ack() && frame.ack == ack {
            done = true;
            Verdict::Drop
        } else {
            Verdict::Pass
        }
    }
}

/// Corrupt the first transmission of the data frame with sequence number `seq`.
pub fn corrupt_data_once(seq: u32) -> impl FnMut(&Frame) -> Verdict + Send + 'static {
    let mut done = false;
    move |frame| {
        if !done && !frame.is_ack() && frame.seq == seq {
            done = true;
            Verdict::Corrupt
        } else {
            Verdict::Pass
        }
    }
}

pub fn pass_all(_: &Frame) -> Verdict {
    Verdict::Pass
}
