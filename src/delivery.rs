//! Reliable delivery over a connection.
//!
//! [`ReliableDelivery`] stamps outbound frames with a per-connection sequence
//! number and keeps a copy of every data frame until the peer acknowledges
//! it. A periodic [`sweep_timeouts`](ReliableDelivery::sweep_timeouts) re-sends
//! frames whose acknowledgment is overdue at a fixed interval and abandons
//! them once the retry budget is spent. Abandonment is logged and counted but
//! not reported to the sender.
//!
//! All state is owned by the reactor; nothing here is shared across threads.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use tokio::time::Instant;

use crate::{connection::ConnectionId, frame::Frame, metrics};

/// Retransmission policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Re-sends attempted before a frame is abandoned.
    pub max_retries: u32,
    /// Age after which an unacknowledged frame is re-sent.
    pub retransmit_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retransmit_interval: Duration::from_secs(2),
        }
    }
}

/// Lifecycle of an in-flight frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingStatus {
    /// Sent once and waiting for an acknowledgment.
    AwaitingAck,
    /// Acknowledged by the peer.
    Acked,
    /// Being re-sent by a sweep; returns to `AwaitingAck` once written.
    Retransmitted,
    /// Retry budget exhausted; delivery abandoned.
    TimedOut,
}

impl PendingStatus {
    /// Returns `true` while the frame may still be retransmitted.
    #[must_use]
    pub fn is_in_flight(self) -> bool { matches!(self, Self::AwaitingAck | Self::Retransmitted) }
}

/// A sent frame awaiting acknowledgment.
#[derive(Clone, Debug)]
pub struct PendingMessage {
    /// Sequence number stamped on the frame.
    pub sequence: u32,
    /// Copy of the frame as sent.
    pub frame: Frame,
    /// Current status.
    pub status: PendingStatus,
    /// Number of retransmissions so far.
    pub retry_count: u32,
    /// When the frame was last written.
    pub last_sent: Instant,
}

/// Re-sends frames whose acknowledgment is overdue.
pub trait Retransmit {
    /// Write `frame` to `connection` again.
    fn retransmit(&mut self, connection: ConnectionId, frame: &Frame);
}

impl<F> Retransmit for F
where
    F: FnMut(ConnectionId, &Frame),
{
    fn retransmit(&mut self, connection: ConnectionId, frame: &Frame) { self(connection, frame); }
}

/// Summary of one timeout sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Frames re-sent during the sweep.
    pub retransmitted: usize,
    /// Frames dropped because their retry budget was spent.
    pub abandoned: Vec<(ConnectionId, PendingMessage)>,
}

#[derive(Debug, Default)]
struct ConnectionDelivery {
    next_sequence: u32,
    pending: BTreeMap<u32, PendingMessage>,
}

/// Per-connection sequence counters and in-flight frames.
#[derive(Debug, Default)]
pub struct ReliableDelivery {
    config: DeliveryConfig,
    connections: HashMap<ConnectionId, ConnectionDelivery>,
}

impl ReliableDelivery {
    /// Create an empty tracker using `config`.
    #[must_use]
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
        }
    }

    /// Active retransmission policy.
    #[must_use]
    pub fn config(&self) -> DeliveryConfig { self.config }

    /// Return the next sequence number for `connection` and advance it.
    ///
    /// Counters start at `0`. The counter wraps after `u32::MAX`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ackwire::{connection::ConnectionId, delivery::ReliableDelivery};
    ///
    /// let mut delivery = ReliableDelivery::default();
    /// let id = ConnectionId::new(1);
    /// assert_eq!(delivery.next_sequence(id), 0);
    /// assert_eq!(delivery.next_sequence(id), 1);
    /// ```
    pub fn next_sequence(&mut self, connection: ConnectionId) -> u32 {
        let state = self.connections.entry(connection).or_default();
        let sequence = state.next_sequence;
        state.next_sequence = sequence.wrapping_add(1);
        sequence
    }

    /// Track `frame` as sent on `connection` now.
    pub fn record_sent(&mut self, connection: ConnectionId, frame: Frame) {
        self.record_sent_at(connection, frame, Instant::now());
    }

    /// Track `frame` as sent on `connection` at `now`.
    ///
    /// A frame already pending under the same sequence is replaced.
    pub fn record_sent_at(&mut self, connection: ConnectionId, frame: Frame, now: Instant) {
        let sequence = frame.sequence;
        self.connections
            .entry(connection)
            .or_default()
            .pending
            .insert(
                sequence,
                PendingMessage {
                    sequence,
                    frame,
                    status: PendingStatus::AwaitingAck,
                    retry_count: 0,
                    last_sent: now,
                },
            );
    }

    /// Settle the pending frame acknowledged by the peer.
    ///
    /// Returns the settled entry, or `None` when nothing was pending under
    /// `sequence`. Late and duplicate acknowledgments are expected under
    /// retransmission and are ignored.
    pub fn confirm(&mut self, connection: ConnectionId, sequence: u32) -> Option<PendingMessage> {
        let mut settled = self
            .connections
            .get_mut(&connection)?
            .pending
            .remove(&sequence)?;
        settled.status = PendingStatus::Acked;
        tracing::debug!(
            connection = %connection,
            sequence,
            retries = settled.retry_count,
            "delivery acknowledged"
        );
        Some(settled)
    }

    /// Retransmit or abandon overdue frames as of now.
    pub fn sweep_timeouts<R: Retransmit + ?Sized>(&mut self, retransmit: &mut R) -> SweepReport {
        self.sweep_timeouts_at(Instant::now(), retransmit)
    }

    /// Retransmit or abandon frames unacknowledged for longer than the
    /// retransmit interval as of `now`.
    ///
    /// An overdue frame with retries left is handed to `retransmit`, its
    /// retry count incremented and its send time reset; it stays
    /// [`PendingStatus::AwaitingAck`]. Otherwise it is
    /// marked [`PendingStatus::TimedOut`] and dropped.
    pub fn sweep_timeouts_at<R: Retransmit + ?Sized>(
        &mut self,
        now: Instant,
        retransmit: &mut R,
    ) -> SweepReport {
        let DeliveryConfig {
            max_retries,
            retransmit_interval,
        } = self.config;
        let mut report = SweepReport::default();

        for (&connection, state) in &mut self.connections {
            let mut expired = Vec::new();
            for (&sequence, message) in &mut state.pending {
                if !message.status.is_in_flight()
                    || now.saturating_duration_since(message.last_sent) <= retransmit_interval
                {
                    continue;
                }
                if message.retry_count < max_retries {
                    message.status = PendingStatus::Retransmitted;
                    retransmit.retransmit(connection, &message.frame);
                    message.retry_count += 1;
                    message.last_sent = now;
                    message.status = PendingStatus::AwaitingAck;
                    report.retransmitted += 1;
                    metrics::inc_retransmits();
                    tracing::debug!(
                        connection = %connection,
                        sequence,
                        attempt = message.retry_count,
                        "retransmitted unacknowledged frame"
                    );
                } else {
                    expired.push(sequence);
                }
            }
            for sequence in expired {
                if let Some(mut message) = state.pending.remove(&sequence) {
                    message.status = PendingStatus::TimedOut;
                    metrics::inc_abandoned();
                    tracing::warn!(
                        connection = %connection,
                        sequence,
                        service_id = message.frame.service_id,
                        retries = message.retry_count,
                        "delivery abandoned after exhausting retries"
                    );
                    report.abandoned.push((connection, message));
                }
            }
        }
        report
    }

    /// Drop all state for a closed connection.
    ///
    /// Returns the number of frames that were still pending.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> usize {
        self.connections
            .remove(&connection)
            .map_or(0, |state| state.pending.len())
    }

    /// Look up a pending frame.
    #[must_use]
    pub fn pending(&self, connection: ConnectionId, sequence: u32) -> Option<&PendingMessage> {
        self.connections.get(&connection)?.pending.get(&sequence)
    }

    /// Number of frames awaiting acknowledgment on `connection`.
    #[must_use]
    pub fn pending_count(&self, connection: ConnectionId) -> usize {
        self.connections
            .get(&connection)
            .map_or(0, |state| state.pending.len())
    }

    /// Number of frames awaiting acknowledgment across all connections.
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.connections.values().map(|state| state.pending.len()).sum()
    }
}
