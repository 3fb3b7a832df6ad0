//! Session relay
//!
//! Per-connection protocol handler. Each inbound [`ClientEvent`] becomes a
//! room store operation; every resulting unicast or broadcast is issued while
//! the room's lock is still held, so members of one room observe its events in
//! the order they were applied. Failures are reported to the requester as a
//! `roomError` and never touch the room.

use std::sync::Arc;

use tracing::{debug, info, warn};

use gambit_core::{
    ClientEvent, ConnectionId, GambitError, GambitResult, Move, MoveError, MoveValidation,
    Position, RelayConfig, RoomId, RoomStore, Seat, ServerEvent,
};

use crate::transport::Transport;

// ----------------------------------------------------------------------------
// Connection Session State
// ----------------------------------------------------------------------------

/// Room binding of one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unbound,
    Bound { room_id: RoomId, seat: Seat },
}

/// Protocol state owned by one connection's task
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    connection: ConnectionId,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            state: SessionState::Unbound,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Room this connection believes it is in
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.state {
            SessionState::Bound { room_id, .. } => Some(room_id),
            SessionState::Unbound => None,
        }
    }

    /// Seat held in `room_id`, if bound to it
    pub fn seat_in(&self, room_id: &RoomId) -> Option<Seat> {
        match &self.state {
            SessionState::Bound { room_id: bound, seat } if bound == room_id => Some(*seat),
            _ => None,
        }
    }

    fn bind(&mut self, room_id: RoomId, seat: Seat) {
        self.state = SessionState::Bound { room_id, seat };
    }

    fn unbind(&mut self) -> Option<RoomId> {
        match std::mem::take(&mut self.state) {
            SessionState::Bound { room_id, .. } => Some(room_id),
            SessionState::Unbound => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Relay
// ----------------------------------------------------------------------------

/// Turns client events into room operations and transport effects
pub struct SessionRelay {
    store: Arc<RoomStore>,
    transport: Arc<dyn Transport>,
    config: RelayConfig,
}

impl SessionRelay {
    pub fn new(store: Arc<RoomStore>, transport: Arc<dyn Transport>, config: RelayConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Decode and handle one inbound text frame
    pub async fn handle_text(&self, session: &mut ConnectionSession, text: &str) {
        match ClientEvent::from_json(text) {
            Ok(event) => self.handle(session, event).await,
            Err(err) => {
                debug!(connection = %session.connection, error = %err, "Undecodable client frame");
                self.reject(session, &GambitError::malformed_event(err.to_string()));
            }
        }
    }

    /// Handle one client event, replying with `roomError` on failure
    pub async fn handle(&self, session: &mut ConnectionSession, event: ClientEvent) {
        let name = event.name();
        let result = match event {
            ClientEvent::CreateRoom => self.create_room(session).await,
            ClientEvent::JoinRoom { room_id } => self.join_room(session, room_id).await,
            ClientEvent::SubmitMove {
                room_id,
                mv,
                resulting_position,
            } => self.submit_move(session, room_id, mv, resulting_position).await,
            ClientEvent::ResetRoom { room_id } => self.reset_room(session, room_id).await,
            ClientEvent::LeaveRoom { room_id } => self.leave_room(session, room_id).await,
        };

        if let Err(err) = result {
            debug!(
                connection = %session.connection,
                event = name,
                error = %err,
                "Request rejected"
            );
            self.reject(session, &err);
        }
    }

    /// Report a failed request to the requesting connection only
    pub fn reject(&self, session: &ConnectionSession, err: &GambitError) {
        let connection = session.connection;
        if let Err(send_err) = self.transport.unicast(connection, ServerEvent::error(err)) {
            warn!(connection = %connection, error = %send_err, "Failed to deliver error reply");
        }
    }

    /// The room a bound session is still a live member of
    ///
    /// A binding whose room was reset or reaped, or that lost its membership,
    /// is cleared here.
    async fn live_binding(&self, session: &mut ConnectionSession) -> Option<RoomId> {
        let room_id = session.room_id()?.clone();
        let still_member = match self.store.get(&room_id).await {
            Ok(snapshot) => snapshot.seat_of(session.connection).is_some(),
            Err(_) => false,
        };
        if still_member {
            Some(room_id)
        } else {
            debug!(connection = %session.connection, room_id = %room_id, "Dropping stale room binding");
            session.unbind();
            None
        }
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Create a room and seat the requester first
    pub async fn create_room(&self, session: &mut ConnectionSession) -> GambitResult<()> {
        if let Some(current) = self.live_binding(session).await {
            return Err(GambitError::already_in_room(&current));
        }

        let connection = session.connection;
        let room_id = self.store.create();
        let mut guard = self.store.lock(&room_id).await?;
        let seat = guard.admit(connection)?.admission.seat();

        self.transport.join_group(&room_id, connection);
        session.bind(room_id.clone(), seat);
        info!(connection = %connection, room_id = %room_id, seat = %seat, "Room opened");

        self.transport
            .unicast(connection, ServerEvent::RoomCreated { room_id, seat })?;
        Ok(())
    }

    /// Join or rejoin a room
    pub async fn join_room(&self, session: &mut ConnectionSession, room_id: RoomId) -> GambitResult<()> {
        if let Some(current) = self.live_binding(session).await {
            if current != room_id {
                return Err(GambitError::already_in_room(&current));
            }
        }

        let connection = session.connection;
        let mut guard = self.store.lock(&room_id).await?;
        let joined = guard.admit(connection)?;
        let seat = joined.admission.seat();

        self.transport.join_group(&room_id, connection);
        session.bind(room_id.clone(), seat);

        if joined.admission.is_rejoin() {
            info!(connection = %connection, room_id = %room_id, seat = %seat, "Participant rejoined");
        } else {
            info!(connection = %connection, room_id = %room_id, seat = %seat, "Participant joined");
        }

        self.transport.unicast(
            connection,
            ServerEvent::RoomJoined {
                room_id: room_id.clone(),
                seat,
                position: joined.position,
                last_move: joined.last_move,
            },
        )?;

        if !joined.admission.is_rejoin() {
            self.transport.broadcast(
                &room_id,
                &ServerEvent::PeerJoined {
                    room_id: room_id.clone(),
                },
                Some(connection),
            );
        }
        Ok(())
    }

    /// Validate and apply a move, echoing the result to the whole room
    pub async fn submit_move(
        &self,
        session: &mut ConnectionSession,
        room_id: RoomId,
        mv: Move,
        resulting_position: Option<Position>,
    ) -> GambitResult<()> {
        let connection = session.connection;
        let seat = session
            .seat_in(&room_id)
            .ok_or_else(|| GambitError::not_in_room(&room_id))?;

        let mut guard = self.store.lock(&room_id).await?;
        if guard.room().seat_of(connection) != Some(seat) {
            return Err(GambitError::not_in_room(&room_id));
        }

        let rules = self.store.rules();
        let current = guard.room().position().clone();
        if !rules.outcome(&current)?.is_ongoing() {
            return Err(MoveError::GameOver {
                room_id: room_id.clone(),
            }
            .into());
        }
        if rules.side_to_move(&current)? != seat.side() {
            return Err(MoveError::NotYourTurn { seat }.into());
        }

        let next = match self.config.moves.validation {
            MoveValidation::Authoritative => {
                let next = rules.apply_move(&current, &mv).map_err(MoveError::from)?;
                if let Some(claimed) = &resulting_position {
                    if !rules.positions_match(claimed, &next) {
                        return Err(MoveError::StalePosition.into());
                    }
                }
                next
            }
            MoveValidation::TrustClient => resulting_position.ok_or(MoveError::MissingPosition)?,
        };
        let outcome = rules.outcome(&next).map_err(MoveError::from)?;

        let last_move = mv.last_move();
        guard.record_move(last_move.clone(), next.clone());
        debug!(room_id = %room_id, mv = %mv, outcome = ?outcome, "Move applied");

        self.transport.broadcast(
            &room_id,
            &ServerEvent::MoveApplied {
                position: next,
                last_move,
                outcome,
            },
            None,
        );
        Ok(())
    }

    /// Notify the room, then discard it
    pub async fn reset_room(&self, session: &mut ConnectionSession, room_id: RoomId) -> GambitResult<()> {
        let connection = session.connection;
        if session.seat_in(&room_id).is_none() {
            return Err(GambitError::not_in_room(&room_id));
        }

        let mut guard = self.store.lock(&room_id).await?;
        if guard.room().seat_of(connection).is_none() {
            return Err(GambitError::not_in_room(&room_id));
        }

        self.transport.broadcast(
            &room_id,
            &ServerEvent::RoomReset {
                room_id: room_id.clone(),
            },
            None,
        );
        guard.delete();
        self.transport.drop_group(&room_id);
        info!(connection = %connection, room_id = %room_id, "Room reset");
        Ok(())
    }

    /// Leave a room while keeping the connection open
    pub async fn leave_room(&self, session: &mut ConnectionSession, room_id: RoomId) -> GambitResult<()> {
        if session.seat_in(&room_id).is_none() {
            return Err(GambitError::not_in_room(&room_id));
        }

        session.unbind();
        self.depart(session.connection, &room_id).await?;
        self.transport
            .unicast(session.connection, ServerEvent::RoomLeft { room_id })?;
        Ok(())
    }

    /// Run the departure path for a closed connection
    pub async fn disconnect(&self, session: &mut ConnectionSession) {
        let Some(room_id) = session.unbind() else {
            return;
        };
        // A reset or reaped room has nothing left to notify.
        if let Err(err) = self.depart(session.connection, &room_id).await {
            debug!(connection = %session.connection, room_id = %room_id, error = %err, "Departure skipped");
        }
    }

    /// Remove a member and notify whoever is left
    async fn depart(&self, connection: ConnectionId, room_id: &RoomId) -> GambitResult<usize> {
        let mut guard = self.store.lock(room_id).await?;
        if guard.room().seat_of(connection).is_none() {
            return Err(GambitError::not_in_room(room_id));
        }

        let remaining = guard.remove_participant(connection);
        self.transport.leave_group(room_id, connection);
        if remaining > 0 {
            self.transport
                .broadcast(room_id, &ServerEvent::PeerDisconnected {}, None);
            info!(connection = %connection, room_id = %room_id, remaining, "Participant left");
        } else {
            self.transport.drop_group(room_id);
            info!(connection = %connection, room_id = %room_id, "Last participant left, room closed");
        }
        Ok(remaining)
    }
}
