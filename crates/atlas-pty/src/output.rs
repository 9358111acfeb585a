//! The single multiplexed output stream shared by every session.
//!
//! Each session's relay publishes tagged [`TerminalEvent`]s through an
//! [`OutputSink`]; at most one subscriber receives them. With no subscriber
//! attached, events are dropped rather than buffered.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::session::SessionId;

/// Events delivered to the UI over the output subscription.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalEvent {
    /// A chunk of shell output, in the order the PTY produced it.
    Data { terminal_id: SessionId, data: String },
    /// The shell exited on its own.
    Exited {
        terminal_id: SessionId,
        code: Option<u32>,
    },
}

impl TerminalEvent {
    #[cfg(test)]
    pub(crate) fn terminal_id(&self) -> SessionId {
        match self {
            TerminalEvent::Data { terminal_id, .. } | TerminalEvent::Exited { terminal_id, .. } => {
                *terminal_id
            }
        }
    }
}

type Subscriber = Arc<Mutex<Option<mpsc::UnboundedSender<TerminalEvent>>>>;

/// Owner of the outbound stream's single subscriber slot.
#[derive(Clone, Default)]
pub struct OutputHub {
    subscriber: Subscriber,
}

impl OutputHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the subscriber, replacing (and disconnecting) any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TerminalEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.subscriber) = Some(tx);
        rx
    }

    #[cfg(test)]
    fn has_subscriber(&self) -> bool {
        lock(&self.subscriber)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// A publishing handle for one session's relay.
    pub fn sink(&self) -> OutputSink {
        OutputSink {
            subscriber: Arc::clone(&self.subscriber),
        }
    }
}

/// Publishing side of the hub, held by a session until it is stopped.
pub struct OutputSink {
    subscriber: Subscriber,
}

impl OutputSink {
    pub fn data(&self, terminal_id: SessionId, data: String) {
        self.publish(TerminalEvent::Data { terminal_id, data });
    }

    pub fn exited(&self, terminal_id: SessionId, code: Option<u32>) {
        self.publish(TerminalEvent::Exited { terminal_id, code });
    }

    fn publish(&self, event: TerminalEvent) {
        let mut slot = lock(&self.subscriber);
        if let Some(tx) = slot.as_ref() {
            if tx.send(event).is_err() {
                // Receiver went away; drop until someone subscribes again.
                *slot = None;
            }
        }
    }
}

/// Incremental UTF-8 decoder for PTY chunks.
///
/// A multi-byte character split across two reads is held back until the
/// rest arrives; genuinely invalid bytes become U+FFFD.
#[derive(Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        // Incomplete sequence at the end: keep it for next time.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush whatever is left when the stream ends.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
