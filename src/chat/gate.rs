//! Request gate: at most one outstanding question at a time

use tracing::{debug, warn};

use super::sink::RenderSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Sending,
}

/// Proof that the gate was opened for one request.
///
/// Not `Clone`: the only way back to `Idle` is to hand the ticket to
/// [`RequestGate::settle`].
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Two-state machine guarding the outbound call.
///
/// The input surface is disabled for the whole `Sending` period and
/// re-enabled on every settlement, successful or not.
#[derive(Debug)]
pub struct RequestGate {
    state: GateState,
    issued: u64,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            issued: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GateState::Idle
    }

    /// Number of requests issued so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// `Idle -> Sending`. Returns `None` while a request is outstanding.
    pub fn try_begin(&mut self, sink: &mut dyn RenderSink) -> Option<Ticket> {
        if self.state == GateState::Sending {
            debug!("Request gate busy, submission ignored");
            return None;
        }
        self.issued += 1;
        self.state = GateState::Sending;
        sink.set_input_enabled(false);
        debug!(seq = self.issued, "Request gate: idle -> sending");
        Some(Ticket { seq: self.issued })
    }

    /// `Sending -> Idle`. Re-enables input unconditionally.
    pub fn settle(&mut self, ticket: Ticket, sink: &mut dyn RenderSink) {
        if ticket.seq != self.issued || self.state != GateState::Sending {
            warn!(
                seq = ticket.seq,
                current = self.issued,
                "Settling a ticket the gate did not expect"
            );
        }
        self.state = GateState::Idle;
        sink.set_input_enabled(true);
        debug!(seq = ticket.seq, "Request gate: sending -> idle");
    }
}
