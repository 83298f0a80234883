//! Connection lifecycle states.

/// Lifecycle of a connection as seen by the reactor.
///
/// Transitions only move forward:
/// `Connecting → Established → Closing → Closed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Accepted but not yet registered with the reactor.
    #[default]
    Connecting,
    /// Registered; frames flow in both directions.
    Established,
    /// Teardown has started; no further frames are dispatched.
    Closing,
    /// Socket tasks cancelled and all state released.
    Closed,
}

impl ConnectionState {
    /// Returns `true` while frames may be exchanged.
    #[must_use]
    pub fn is_established(self) -> bool { matches!(self, Self::Established) }

    /// Returns `true` once teardown has started.
    #[must_use]
    pub fn is_closing_or_closed(self) -> bool { matches!(self, Self::Closing | Self::Closed) }

    /// Move to [`Established`](Self::Established) if still connecting.
    pub fn establish(&mut self) {
        if matches!(self, Self::Connecting) {
            *self = Self::Established;
        }
    }

    /// Move to [`Closing`](Self::Closing) unless already closed.
    pub fn begin_close(&mut self) {
        if !matches!(self, Self::Closed) {
            *self = Self::Closing;
        }
    }

    /// Move to [`Closed`](Self::Closed).
    pub fn finish_close(&mut self) { *self = Self::Closed; }
}
