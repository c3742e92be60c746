//! Echo suppression and reply matching.
//!
//! The correlator runs on its own thread and is the only owner of the
//! pending-request table. Callers and the receiver thread talk to it through
//! one event channel, so the order in which a caller announces a request and
//! the order in which its echo arrives are the same order the correlator
//! sees them.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

use stsbus_frame::{Frame, Instruction, Status};
use tracing::{debug, trace, warn};

use crate::register::Register;

/// What a pending request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// A register read; the reply carries a value of the register's width.
    Read(Register),
    /// Any other instruction; only the reply status matters.
    Status(Instruction),
}

/// A device reply matched to the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub id: u8,
    pub status: Status,
    /// Register value for reads, `None` for status-only replies.
    pub value: Option<u16>,
}

/// The outstanding request for one device id.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub ticket: u64,
    pub request: Request,
    pub echo_seen: bool,
    /// `None` for fire-and-forget commands whose reply is only logged.
    pub reply_tx: Option<SyncSender<Reply>>,
}

/// Messages into the correlator thread.
#[derive(Debug)]
pub(crate) enum Event {
    /// A frame is about to be written. Sent before the bytes hit the wire.
    Outgoing {
        frame: Frame,
        pending: Option<PendingRequest>,
    },
    /// A validated frame came off the wire.
    Received(Frame),
    /// The caller stopped waiting or the write failed.
    Expired { id: u8, ticket: u64 },
    Shutdown,
}

/// How a received frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Reflection of our own frame.
    Echo,
    /// Matched and delivered (or logged, for fire-and-forget).
    Resolved(Reply),
    /// Left over from an earlier exchange: arrived before the pending
    /// request's echo, or does not fit the pending read.
    Stale,
    /// No request is outstanding for this id.
    Unsolicited,
}

#[derive(Debug)]
pub(crate) struct Correlator {
    pending: HashMap<u8, PendingRequest>,
    last_sent: HashMap<u8, Frame>,
    expect_echo: bool,
}

impl Correlator {
    pub(crate) fn new(expect_echo: bool) -> Self {
        Self {
            pending: HashMap::new(),
            last_sent: HashMap::new(),
            expect_echo,
        }
    }

    /// Drain events until shutdown or until every sender is gone.
    pub(crate) fn run(mut self, events: Receiver<Event>) {
        while let Ok(event) = events.recv() {
            match event {
                Event::Outgoing { frame, pending } => self.on_outgoing(frame, pending),
                Event::Received(frame) => {
                    self.on_frame(&frame);
                }
                Event::Expired { id, ticket } => self.on_expired(id, ticket),
                Event::Shutdown => break,
            }
        }
        debug!(pending = self.pending.len(), "correlator stopped");
    }

    pub(crate) fn on_outgoing(&mut self, frame: Frame, pending: Option<PendingRequest>) {
        let id = frame.id();
        if let Some(mut pending) = pending {
            pending.echo_seen = !self.expect_echo;
            if let Some(previous) = self.pending.insert(id, pending) {
                debug!(id, ticket = previous.ticket, "replacing pending request");
            }
        }
        self.last_sent.insert(id, frame);
    }

    pub(crate) fn on_frame(&mut self, frame: &Frame) -> Disposition {
        let id = frame.id();

        // The line reflects each frame once; a later identical frame is a
        // reply (a ping answered with status 0x01 matches its request).
        if self.expect_echo && self.last_sent.get(&id) == Some(frame) {
            self.last_sent.remove(&id);
            trace!(id, "echo suppressed");
            if let Some(pending) = self.pending.get_mut(&id) {
                pending.echo_seen = true;
            }
            return Disposition::Echo;
        }

        let Some(pending) = self.pending.get(&id) else {
            debug!(id, status = frame.code(), "unsolicited reply discarded");
            return Disposition::Unsolicited;
        };
        if !pending.echo_seen {
            debug!(id, ticket = pending.ticket, "reply before echo discarded");
            return Disposition::Stale;
        }
        if let Request::Read(register) = pending.request {
            if frame.params().len() != usize::from(register.width()) {
                debug!(
                    id,
                    register = register.name(),
                    len = frame.params().len(),
                    "reply does not fit pending read, discarded"
                );
                return Disposition::Stale;
            }
        }
        let Some(pending) = self.pending.remove(&id) else {
            return Disposition::Unsolicited;
        };

        let status = frame.status();
        if !status.is_ok() {
            warn!(id, status = %status, "device reported fault");
        }

        let value = match pending.request {
            Request::Read(register) => register.decode_value(frame.params()),
            Request::Status(instruction) => {
                trace!(id, instruction = instruction.name(), status = %status, "status reply");
                None
            }
        };

        let reply = Reply { id, status, value };
        if let Some(tx) = pending.reply_tx {
            if let Err(TrySendError::Disconnected(_)) = tx.try_send(reply) {
                debug!(id, ticket = pending.ticket, "caller no longer waiting");
            }
        }
        Disposition::Resolved(reply)
    }

    pub(crate) fn on_expired(&mut self, id: u8, ticket: u64) {
        if self.pending.get(&id).is_some_and(|p| p.ticket == ticket) {
            self.pending.remove(&id);
            debug!(id, ticket, "request expired");
        }
    }

    #[cfg(test)]
    fn is_pending(&self, id: u8) -> bool {
        self.pending.contains_key(&id)
    }
}
