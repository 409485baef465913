//! # Log Sink
//!
//! Ordered hand-off of log lines from the supervisor's worker to the
//! display context. The worker pushes, the display drains on a timer.
//!
//! Backed by an unbounded `crossbeam_channel`; `drain()` never blocks.
//! A run ends with a single `LogEvent::Finished` carrying its terminal
//! state, so the display knows when to restore its controls.

use crate::supervisor::RunState;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex};

/// One line of text and its position in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub seq: u64,
    pub text: String,
}

/// What the display context receives on each drain
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Line(LogLine),
    Finished(RunState),
}

/// FIFO between producer and display contexts. Clones share the same queue.
#[derive(Clone)]
pub struct LogSink {
    tx: Sender<LogEvent>,
    rx: Receiver<LogEvent>,
    // Held across the send so sequence order matches queue order.
    next_seq: Arc<Mutex<u64>>,
}

impl LogSink {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            next_seq: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue a line; returns its sequence number
    pub fn push(&self, text: impl Into<String>) -> u64 {
        let mut next = self.next_seq.lock().unwrap_or_else(|e| e.into_inner());
        let seq = *next;
        *next += 1;
        // The sink owns its receiver, so the channel is never disconnected.
        let _ = self.tx.send(LogEvent::Line(LogLine {
            seq,
            text: text.into(),
        }));
        seq
    }

    /// Queue the terminal signal of a run
    pub fn finish(&self, state: RunState) {
        let _guard = self.next_seq.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self.tx.send(LogEvent::Finished(state));
    }

    /// Take everything queued so far, in push order
    pub fn drain(&self) -> Vec<LogEvent> {
        self.rx.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn texts(events: &[LogEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                LogEvent::Line(line) => Some(line.text.clone()),
                LogEvent::Finished(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_push_from_other_thread_then_drain() {
        let sink = LogSink::new();
        let producer = sink.clone();

        thread::spawn(move || {
            for text in ["a", "b", "c"] {
                producer.push(text);
            }
        })
        .join()
        .unwrap();

        assert_eq!(texts(&sink.drain()), vec!["a", "b", "c"]);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_drain_empty_does_not_block() {
        let sink = LogSink::new();
        assert!(sink.is_empty());
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let sink = LogSink::new();
        let first = sink.push("one");
        let second = sink.push("two");
        assert!(second > first);

        let seqs: Vec<u64> = sink
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Line(line) => Some(line.seq),
                LogEvent::Finished(_) => None,
            })
            .collect();
        assert_eq!(seqs, vec![first, second]);
    }

    #[test]
    fn test_concurrent_producers_keep_seq_in_fifo_order() {
        let sink = LogSink::new();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let producer = sink.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        producer.push(format!("{}-{}", worker, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seqs: Vec<u64> = sink
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Line(line) => Some(line.seq),
                LogEvent::Finished(_) => None,
            })
            .collect();
        assert_eq!(seqs.len(), 400);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_finish_is_delivered_after_lines() {
        let sink = LogSink::new();
        sink.push("last line");
        sink.finish(RunState::Completed {
            code: 0,
            cancelled: false,
        });

        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LogEvent::Line(_)));
        assert!(matches!(
            events[1],
            LogEvent::Finished(RunState::Completed { code: 0, .. })
        ));
    }
}
