//! Core-only transfer scenarios: no runtime, frames pass through the codec

use arq_core::{
    AckOutcome, ArqCoreConfig, ArqReceiver, ArqSender, CongestionState, Frame, SeqNum, TimerAction,
};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Data,
    Ack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fault {
    Pass,
    Drop,
    Corrupt,
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Sent(SeqNum),
    Acked(SeqNum),
    Duplicate(u32),
    FastRetransmit(SeqNum, CongestionState),
    Timeout(Vec<SeqNum>),
}

struct Transfer {
    sender: ArqSender,
    receiver: ArqReceiver,
    events: Vec<Event>,
    timer_armed: bool,
}

/// Put a frame on the simulated wire: optionally damage, encode, decode.
fn wire(frame: &Frame, fault: Fault) -> Option<Frame> {
    let mut frame = frame.clone();
    match fault {
        Fault::Drop => return None,
        Fault::Corrupt if frame.payload.is_empty() => frame.checksum ^= 0xFF,
        Fault::Corrupt => {
            let mut payload = frame.payload.to_vec();
            payload[0] ^= 0xFF;
            frame.payload = Bytes::from(payload);
        }
        Fault::Pass => {}
    }
    Some(Frame::decode(frame.to_bytes()).expect("codec output must decode"))
}

fn messages(count: usize) -> Vec<Bytes> {
    let mut out: Vec<Bytes> = (0..count)
        .map(|i| Bytes::from(format!("Message {i}")))
        .collect();
    out.push(Bytes::from_static(b"END"));
    out
}

/// Drive a full transfer in rounds. Each round admits what the window
/// allows, delivers every frame on the wire, then returns the ACKs. A round
/// with nothing on the wire while frames are unacknowledged is a timeout.
fn run(
    config: ArqCoreConfig,
    input: &[Bytes],
    mut fault: impl FnMut(Direction, &Frame) -> Fault,
) -> Transfer {
    let window_size = config.window_size;
    let mut t = Transfer {
        sender: ArqSender::new(config.clone()),
        receiver: ArqReceiver::new(&config),
        events: Vec::new(),
        timer_armed: false,
    };
    let mut pending: VecDeque<Bytes> = input.iter().cloned().collect();
    let mut outbound: VecDeque<Frame> = VecDeque::new();

    for _round in 0..10_000 {
        while t.sender.can_admit() {
            let Some(payload) = pending.pop_front() else {
                break;
            };
            let (frame, timer) = t.sender.admit(payload).unwrap();
            if timer == TimerAction::Start {
                t.timer_armed = true;
            }
            t.events.push(Event::Sent(frame.seq));
            outbound.push_back(frame);
            assert!(t.sender.in_flight() <= window_size);
        }

        if pending.is_empty() && t.sender.is_idle() {
            return t;
        }

        if outbound.is_empty() {
            assert!(t.timer_armed, "unacknowledged frames without a timer");
            let frames = t.sender.on_timeout();
            t.events
                .push(Event::Timeout(frames.iter().map(|f| f.seq).collect()));
            outbound.extend(frames);
            continue;
        }

        let mut acks = Vec::new();
        for frame in outbound.drain(..) {
            let Some(frame) = wire(&frame, fault(Direction::Data, &frame)) else {
                continue;
            };
            if let Some(ack) = t.receiver.on_frame(&frame).ack() {
                acks.push(Frame::ack(ack));
            }
        }

        for ack in acks {
            let Some(ack) = wire(&ack, fault(Direction::Ack, &ack)) else {
                continue;
            };
            assert!(ack.is_ack());
            if ack.is_corrupt() {
                continue;
            }
            match t.sender.on_ack(ack.ack).unwrap() {
                AckOutcome::Advanced { timer, .. } => {
                    t.events.push(Event::Acked(ack.ack));
                    t.timer_armed = timer != TimerAction::Cancel;
                }
                AckOutcome::Duplicate { count } => t.events.push(Event::Duplicate(count)),
                AckOutcome::FastRetransmit { frame } => {
                    t.events
                        .push(Event::FastRetransmit(frame.seq, t.sender.congestion()));
                    outbound.push_back(frame);
                }
                AckOutcome::Ignored => {}
            }
            assert!(t.sender.congestion().cwnd >= 1.0);
        }
    }

    panic!("transfer did not complete");
}

#[test]
fn test_lossless_window_of_five() {
    let input = messages(5);
    let t = run(ArqCoreConfig::default(), &input, |_, _| Fault::Pass);

    let sent: Vec<SeqNum> = t
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Sent(seq) => Some(*seq),
            _ => None,
        })
        .collect();
    let acked: Vec<SeqNum> = t
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Acked(ack) => Some(*ack),
            _ => None,
        })
        .collect();

    assert_eq!(sent, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(acked, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(t.sender.base(), 6);
    assert!(t.sender.is_idle());
    assert!(!t.timer_armed);
    assert_eq!(t.sender.stats().retransmissions, 0);
    assert_eq!(t.receiver.received(), &input[..]);
    assert!(t.receiver.is_finished());
}

#[test]
fn test_lost_frame_fast_retransmit() {
    let input = messages(12);
    let mut dropped = false;
    let t = run(ArqCoreConfig::default(), &input, |dir, frame| {
        if dir == Direction::Data && frame.seq == 4 && !dropped {
            dropped = true;
            Fault::Drop
        } else {
            Fault::Pass
        }
    });

    let ack_events: Vec<Event> = t
        .events
        .iter()
        .filter(|e| !matches!(e, Event::Sent(_)))
        .cloned()
        .collect();
    let fast = ack_events
        .iter()
        .position(|e| matches!(e, Event::FastRetransmit(..)))
        .expect("fast retransmit must fire");

    assert_eq!(
        &ack_events[..fast],
        &[
            Event::Acked(0),
            Event::Acked(1),
            Event::Acked(2),
            Event::Acked(3),
            Event::Duplicate(1),
            Event::Duplicate(2)
        ]
    );
    match &ack_events[fast] {
        Event::FastRetransmit(seq, state) => {
            assert_eq!(*seq, 4);
            assert_eq!(state.ssthresh, 2.5);
            assert_eq!(state.cwnd, 5.5);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(ack_events[fast + 1], Event::Duplicate(4));
    assert_eq!(t.sender.stats().fast_retransmissions, 1);
    assert_eq!(t.receiver.received(), &input[..]);
}

#[test]
fn test_early_loss_has_too_few_duplicates_and_times_out() {
    // Lose seq 2 of [M0..M4, END]. cwnd is 3 when the gap opens, so only
    // seq 3 and 4 follow it: two duplicates, below the threshold.
    let input = messages(5);
    let mut dropped = false;
    let t = run(ArqCoreConfig::default(), &input, |dir, frame| {
        if dir == Direction::Data && frame.seq == 2 && !dropped {
            dropped = true;
            Fault::Drop
        } else {
            Fault::Pass
        }
    });

    let ack_events: Vec<Event> = t
        .events
        .iter()
        .filter(|e| !matches!(e, Event::Sent(_)))
        .cloned()
        .collect();
    assert_eq!(
        &ack_events[..5],
        &[
            Event::Acked(0),
            Event::Acked(1),
            Event::Duplicate(1),
            Event::Duplicate(2),
            Event::Timeout(vec![2, 3, 4]),
        ]
    );
    assert_eq!(ack_events[5], Event::Acked(2));

    let stats = t.sender.stats();
    assert_eq!(stats.fast_retransmissions, 0);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(t.receiver.received(), &input[..]);
}

#[test]
fn test_single_corrupted_frame_recovers() {
    let input = messages(8);
    let mut corrupted = false;
    let t = run(ArqCoreConfig::default(), &input, |dir, frame| {
        if dir == Direction::Data && frame.seq == 2 && !corrupted {
            corrupted = true;
            Fault::Corrupt
        } else {
            Fault::Pass
        }
    });

    assert_eq!(t.receiver.stats().corrupt_dropped, 1);
    assert!(t.sender.stats().retransmissions >= 1);
    assert_eq!(t.receiver.received(), &input[..]);
    assert!(t.sender.is_idle());
}

#[test]
fn test_lost_final_ack_is_recovered_by_reack() {
    let input = messages(3);
    let mut dropped = false;
    let t = run(ArqCoreConfig::default(), &input, |dir, frame| {
        if dir == Direction::Ack && frame.ack == 3 && !dropped {
            dropped = true;
            Fault::Drop
        } else {
            Fault::Pass
        }
    });

    assert!(t
        .events
        .iter()
        .any(|e| matches!(e, Event::Timeout(seqs) if seqs == &[3])));
    assert_eq!(t.receiver.received(), &input[..]);
    assert_eq!(t.receiver.stats().frames_delivered, 4);
}

#[test]
fn test_seeded_random_faults() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let input = messages(40);
        let config = ArqCoreConfig::new().window_size(8);
        let t = run(config, &input, |_, _| {
            let roll: f64 = rng.gen();
            if roll < 0.15 {
                Fault::Drop
            } else if roll < 0.25 {
                Fault::Corrupt
            } else {
                Fault::Pass
            }
        });

        assert_eq!(t.receiver.received(), &input[..], "seed {seed}");
        assert_eq!(t.sender.base() as usize, input.len());
    }
}
