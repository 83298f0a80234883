//! The reactor: connection table, frame dispatch and timers.

use std::{collections::HashMap, net::SocketAddr};

use bytes::Bytes;
use tokio::{
    net::TcpStream,
    select,
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{
    CloseReason,
    Command,
    ConnectionId,
    ConnectionState,
    ReactorEvent,
    io,
    record::ConnectionRecord,
};
use crate::{
    config::ServerConfig,
    delivery::{ReliableDelivery, Retransmit, SweepReport},
    frame::{Frame, FrameType},
    metrics::{self, Direction},
    router::Router,
};

/// Owns all connections and drives them from a single task.
///
/// Socket reads, heartbeat ticks, accepted streams and external
/// [`Command`]s all arrive as messages and are handled one at a time, so the
/// manager never needs a lock.
pub struct ConnectionManager<R> {
    config: ServerConfig,
    router: R,
    delivery: ReliableDelivery,
    connections: HashMap<ConnectionId, ConnectionRecord>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<ReactorEvent>,
    events_rx: mpsc::UnboundedReceiver<ReactorEvent>,
    tracker: TaskTracker,
}

impl<R: Router> ConnectionManager<R> {
    /// Create a manager with no connections.
    #[must_use]
    pub fn new(config: ServerConfig, router: R) -> Self {
        let config = config.normalized();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            delivery: ReliableDelivery::new(config.delivery()),
            config,
            router,
            connections: HashMap::new(),
            next_id: 1,
            events_tx,
            events_rx,
            tracker: TaskTracker::new(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Reliable delivery state, for inspection.
    #[must_use]
    pub fn delivery(&self) -> &ReliableDelivery { &self.delivery }

    /// Number of established connections.
    #[must_use]
    pub fn connection_count(&self) -> usize { self.connections.len() }

    /// Ids of all established connections in ascending order.
    #[must_use]
    pub fn active_connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self
            .connections
            .values()
            .filter(|record| record.state.is_established())
            .map(|record| record.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Lifecycle state of `id`, or `None` once it has been removed.
    #[must_use]
    pub fn connection_state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&id).map(|record| record.state)
    }

    pub(crate) fn events(&self) -> mpsc::UnboundedSender<ReactorEvent> { self.events_tx.clone() }

    pub(crate) fn tracker(&self) -> &TaskTracker { &self.tracker }

    /// Take ownership of an accepted stream and start its socket tasks.
    pub(crate) fn accept(&mut self, stream: TcpStream, peer: SocketAddr) -> ConnectionId {
        if let Err(error) = stream.set_nodelay(true) {
            tracing::debug!(%peer, %error, "failed to set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (id, token) = self.register(peer, outbound_tx);
        self.tracker
            .spawn(io::read_loop(id, reader, self.events(), token.clone()));
        self.tracker
            .spawn(io::write_loop(id, writer, outbound_rx, token));
        id
    }

    /// Add a connection whose encoded output is delivered to `outbound`.
    ///
    /// Starts the heartbeat timers and marks the connection established.
    pub(crate) fn register(
        &mut self,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Bytes>,
    ) -> (ConnectionId, CancellationToken) {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        let token = CancellationToken::new();

        let mut record = ConnectionRecord::new(
            id,
            peer,
            outbound,
            token.clone(),
            self.config.max_frame_length,
        );
        record.state.establish();
        self.connections.insert(id, record);

        self.tracker.spawn(io::heartbeat_timers(
            id,
            self.config.heartbeat_interval,
            self.config.heartbeat_timeout,
            self.events(),
            token.clone(),
        ));

        metrics::inc_connections();
        tracing::info!(connection = %id, %peer, "connection established");
        (id, token)
    }

    /// Apply one event produced by a socket, timer or accept task.
    pub(crate) fn handle_event(&mut self, event: ReactorEvent) {
        match event {
            ReactorEvent::Accepted { stream, peer } => {
                self.accept(stream, peer);
            }
            ReactorEvent::Readable { id, chunk } => self.on_readable(id, &chunk),
            ReactorEvent::Disconnected { id, error } => {
                let reason = error.map_or(CloseReason::PeerClosed, CloseReason::ReadFailed);
                self.close(id, reason);
            }
            ReactorEvent::HeartbeatDue(id) => self.send_heartbeat(id),
            ReactorEvent::HeartbeatCheck(id) => {
                self.check_heartbeat(id, Instant::now());
            }
        }
    }

    /// Apply a request from outside the reactor.
    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::Broadcast(frame) => {
                let reached = self.broadcast(&frame);
                tracing::debug!(reached, service_id = frame.service_id, "broadcast sent");
            }
            Command::Send { connection, frame } => {
                self.send(connection, frame);
            }
            Command::Close(id) => {
                self.close(id, CloseReason::Requested);
            }
            Command::ActiveConnections(reply) => {
                let _ = reply.send(self.active_connections());
            }
        }
    }

    fn on_readable(&mut self, id: ConnectionId, chunk: &[u8]) {
        let Some(record) = self.connections.get_mut(&id) else {
            return;
        };
        if !record.state.is_established() {
            return;
        }
        let fed = record.reassembler.feed(chunk);
        let frames: Vec<Frame> = record.reassembler.drain_frames().collect();

        for frame in frames {
            metrics::inc_frames(Direction::Inbound);
            self.dispatch(id, frame);
        }

        if let Err(error) = fed {
            self.close(id, CloseReason::ProtocolViolation(error));
        }
    }

    fn dispatch(&mut self, id: ConnectionId, frame: Frame) {
        let Some(record) = self.connections.get_mut(&id) else {
            return;
        };
        tracing::debug!(
            connection = %id,
            sequence = frame.sequence,
            service_id = frame.service_id,
            frame_type = ?frame.frame_type,
            "frame received"
        );

        match frame.frame_type {
            FrameType::Heartbeat => {
                record.touch(Instant::now());
                record.write_frame(&Frame::heartbeat_ack(&frame));
            }
            FrameType::HeartbeatAck => record.touch(Instant::now()),
            FrameType::Ack => {
                if self.delivery.confirm(id, frame.sequence).is_none() {
                    tracing::trace!(
                        connection = %id,
                        sequence = frame.sequence,
                        "ignoring unmatched ack"
                    );
                }
            }
            FrameType::Data => {
                record.write_frame(&Frame::ack(&frame));
                if let Some(response) = self.router.handle(id, &frame) {
                    self.send(id, response);
                }
            }
        }
    }

    /// Send `frame` reliably: stamp the next sequence, write it and track it
    /// until acknowledged.
    ///
    /// Returns the assigned sequence, or `None` if the connection is gone.
    pub fn send(&mut self, id: ConnectionId, frame: Frame) -> Option<u32> {
        let record = self
            .connections
            .get(&id)
            .filter(|record| record.state.is_established())?;
        let sequence = self.delivery.next_sequence(id);
        let frame = frame.with_sequence(sequence);
        if !record.write_frame(&frame) {
            return None;
        }
        self.delivery.record_sent(id, frame);
        Some(sequence)
    }

    /// Send `frame` to every established connection.
    ///
    /// Returns the number of connections the frame was queued for.
    pub fn broadcast(&mut self, frame: &Frame) -> usize {
        self.active_connections()
            .into_iter()
            .filter_map(|id| self.send(id, frame.clone()))
            .count()
    }

    fn send_heartbeat(&mut self, id: ConnectionId) {
        let Some(record) = self.connections.get(&id) else {
            return;
        };
        let sequence = self.delivery.next_sequence(id);
        record.write_frame(&Frame::heartbeat().with_sequence(sequence));
    }

    /// Close `id` if nothing has refreshed its liveness within the heartbeat
    /// timeout as of `now`.
    ///
    /// Returns `true` if the connection was closed.
    pub(crate) fn check_heartbeat(&mut self, id: ConnectionId, now: Instant) -> bool {
        let Some(record) = self.connections.get(&id) else {
            return false;
        };
        let idle = now.saturating_duration_since(record.last_heartbeat);
        if idle <= self.config.heartbeat_timeout {
            return false;
        }
        self.close(id, CloseReason::HeartbeatTimeout { idle })
    }

    /// Retransmit or abandon overdue deliveries as of `now`.
    pub(crate) fn sweep_retransmits(&mut self, now: Instant) -> SweepReport {
        let Self {
            delivery,
            connections,
            ..
        } = self;
        delivery.sweep_timeouts_at(now, &mut LiveSockets { connections })
    }

    /// Close `id`, cancelling its tasks and dropping its delivery state.
    ///
    /// Returns `false` if the connection was already gone.
    pub fn close(&mut self, id: ConnectionId, reason: CloseReason) -> bool {
        let Some(mut record) = self.connections.remove(&id) else {
            return false;
        };
        record.state.begin_close();
        record.cancel_tasks();
        let purged = self.delivery.remove_connection(id);
        record.state.finish_close();
        metrics::dec_connections();

        let peer = record.peer;
        match &reason {
            CloseReason::ProtocolViolation(_) => {
                metrics::inc_protocol_errors();
                tracing::warn!(connection = %id, %peer, %reason, purged, "connection closed");
            }
            CloseReason::HeartbeatTimeout { .. } | CloseReason::ReadFailed(_) => {
                tracing::warn!(connection = %id, %peer, %reason, purged, "connection closed");
            }
            _ => tracing::info!(connection = %id, %peer, %reason, purged, "connection closed"),
        }
        true
    }

    /// Close every connection for shutdown.
    pub fn close_all(&mut self) {
        let ids: Vec<_> = self.connections.keys().copied().collect();
        for id in ids {
            self.close(id, CloseReason::Shutdown);
        }
    }

    /// Drive the reactor until `shutdown` is cancelled.
    ///
    /// On shutdown every connection is closed and the call waits for all
    /// socket, timer and accept tasks to finish.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        let period = self.config.retransmit_interval;
        let mut sweep = time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;

                () = shutdown.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                Some(command) = commands.recv() => self.handle_command(command),
                _ = sweep.tick() => {
                    self.sweep_retransmits(Instant::now());
                }
            }
        }

        self.close_all();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("reactor stopped");
    }
}

/// Retransmits through the writer queues of live connections.
struct LiveSockets<'a> {
    connections: &'a HashMap<ConnectionId, ConnectionRecord>,
}

impl Retransmit for LiveSockets<'_> {
    fn retransmit(&mut self, connection: ConnectionId, frame: &Frame) {
        match self.connections.get(&connection) {
            Some(record) if record.state.is_established() => {
                record.write_frame(frame);
            }
            _ => tracing::debug!(connection = %connection, "skipping retransmit to closed connection"),
        }
    }
}
