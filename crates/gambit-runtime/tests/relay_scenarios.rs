//! End-to-end relay scenarios over the in-process connection hub

use std::sync::Arc;

use gambit_chess::ChessRules;
use gambit_core::testing::AlternatingRules;
use gambit_core::{
    ClientEvent, ErrorCode, LastMove, Move, MoveValidation, Outcome, Position, RelayConfig,
    RoomId, RulesEngine, Seat, ServerEvent, Side,
};
use gambit_runtime::{
    ConnectionSession, EventReceiver, RelayBuilder, RelayHandle, SessionRelay, SessionState,
};

// ----------------------------------------------------------------------------
// Test Harness
// ----------------------------------------------------------------------------

struct Client {
    session: ConnectionSession,
    events: EventReceiver,
}

impl Client {
    fn connect(handle: &RelayHandle) -> Self {
        let (connection, events) = handle.hub().register();
        Self {
            session: ConnectionSession::new(connection),
            events,
        }
    }

    async fn send(&mut self, relay: &SessionRelay, event: ClientEvent) {
        relay.handle(&mut self.session, event).await;
    }

    fn next(&mut self) -> ServerEvent {
        self.events.try_recv().expect("expected a pending event")
    }

    fn next_error(&mut self) -> (ErrorCode, String) {
        match self.next() {
            ServerEvent::RoomError { code, message } => (code, message),
            other => panic!("expected roomError, got {other:?}"),
        }
    }

    fn assert_idle(&mut self) {
        if let Ok(event) = self.events.try_recv() {
            panic!("unexpected event {event:?}");
        }
    }
}

fn start(rules: Arc<dyn RulesEngine>, config: RelayConfig) -> RelayHandle {
    RelayBuilder::new(rules)
        .with_config(config)
        .reaper(false)
        .start()
        .expect("relay should start")
}

fn alternating() -> RelayHandle {
    start(Arc::new(AlternatingRules::default()), RelayConfig::default())
}

async fn create(relay: &SessionRelay, client: &mut Client) -> RoomId {
    client.send(relay, ClientEvent::CreateRoom).await;
    match client.next() {
        ServerEvent::RoomCreated { room_id, seat } => {
            assert_eq!(seat, Seat::First);
            room_id
        }
        other => panic!("expected roomCreated, got {other:?}"),
    }
}

/// Create a room with `a` and seat `b`, draining the join notifications
async fn paired(relay: &SessionRelay, a: &mut Client, b: &mut Client) -> RoomId {
    let room_id = create(relay, a).await;
    b.send(relay, ClientEvent::JoinRoom { room_id: room_id.clone() })
        .await;
    assert!(matches!(b.next(), ServerEvent::RoomJoined { .. }));
    assert!(matches!(a.next(), ServerEvent::PeerJoined { .. }));
    room_id
}

fn submit(room_id: &RoomId, from: &str, to: &str, resulting: Option<Position>) -> ClientEvent {
    ClientEvent::SubmitMove {
        room_id: room_id.clone(),
        mv: Move::new(from, to),
        resulting_position: resulting,
    }
}

// ----------------------------------------------------------------------------
// Joining
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_second_participant_joins_and_first_is_notified() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));

    let room_id = create(&relay, &mut a).await;
    b.send(&relay, ClientEvent::JoinRoom { room_id: room_id.clone() })
        .await;

    assert_eq!(
        b.next(),
        ServerEvent::RoomJoined {
            room_id: room_id.clone(),
            seat: Seat::Second,
            position: AlternatingRules::default().initial_position(),
            last_move: None,
        }
    );
    assert_eq!(a.next(), ServerEvent::PeerJoined { room_id: room_id.clone() });
    a.assert_idle();
    b.assert_idle();
    assert_eq!(
        b.session.state(),
        &SessionState::Bound {
            room_id,
            seat: Seat::Second
        }
    );
}

#[tokio::test]
async fn test_join_unknown_room_reports_game_not_found() {
    let handle = alternating();
    let relay = handle.relay();
    let mut a = Client::connect(&handle);

    a.send(&relay, ClientEvent::JoinRoom { room_id: RoomId::new("nope0000") })
        .await;

    assert_eq!(a.next_error(), (ErrorCode::RoomNotFound, "Game not found".to_string()));
    assert_eq!(a.session.state(), &SessionState::Unbound);
    assert!(handle.store().is_empty());
}

#[tokio::test]
async fn test_third_connection_gets_game_is_full() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b, mut c) = (
        Client::connect(&handle),
        Client::connect(&handle),
        Client::connect(&handle),
    );
    let room_id = paired(&relay, &mut a, &mut b).await;

    c.send(&relay, ClientEvent::JoinRoom { room_id: room_id.clone() })
        .await;

    assert_eq!(c.next_error(), (ErrorCode::RoomFull, "Game is full".to_string()));
    a.assert_idle();
    b.assert_idle();
    assert_eq!(handle.store().get(&room_id).await.unwrap().participants.len(), 2);
}

#[tokio::test]
async fn test_rejoin_restores_state_without_broadcast() {
    let handle = alternating();
    let relay = handle.relay();
    let rules = AlternatingRules::default();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, submit(&room_id, "e2", "e4", None)).await;
    a.next();
    b.next();

    b.send(&relay, ClientEvent::JoinRoom { room_id: room_id.clone() })
        .await;
    assert_eq!(
        b.next(),
        ServerEvent::RoomJoined {
            room_id,
            seat: Seat::Second,
            position: rules.position_after(1),
            last_move: Some(LastMove {
                from: "e2".into(),
                to: "e4".into()
            }),
        }
    );
    a.assert_idle();
}

#[tokio::test]
async fn test_bound_connection_cannot_open_another_room() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = create(&relay, &mut a).await;
    let other = create(&relay, &mut b).await;

    a.send(&relay, ClientEvent::CreateRoom).await;
    assert_eq!(a.next_error().0, ErrorCode::AlreadyInRoom);

    a.send(&relay, ClientEvent::JoinRoom { room_id: other }).await;
    assert_eq!(a.next_error().0, ErrorCode::AlreadyInRoom);

    assert_eq!(a.session.room_id(), Some(&room_id));
    assert_eq!(handle.store().len(), 2);
}

// ----------------------------------------------------------------------------
// Moves
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_move_is_echoed_to_both_members() {
    let handle = alternating();
    let relay = handle.relay();
    let rules = AlternatingRules::default();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, submit(&room_id, "e2", "e4", Some(rules.position_after(1))))
        .await;

    let expected = ServerEvent::MoveApplied {
        position: rules.position_after(1),
        last_move: LastMove {
            from: "e2".into(),
            to: "e4".into(),
        },
        outcome: Outcome::Ongoing,
    };
    assert_eq!(a.next(), expected);
    assert_eq!(b.next(), expected);
}

#[tokio::test]
async fn test_turn_order_is_enforced() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    b.send(&relay, submit(&room_id, "e7", "e5", None)).await;
    assert_eq!(b.next_error().0, ErrorCode::NotYourTurn);
    a.assert_idle();

    a.send(&relay, submit(&room_id, "e2", "e4", None)).await;
    a.next();
    b.next();

    a.send(&relay, submit(&room_id, "d2", "d4", None)).await;
    assert_eq!(a.next_error().0, ErrorCode::NotYourTurn);
    b.assert_idle();
}

#[tokio::test]
async fn test_racing_moves_against_one_predecessor_apply_once() {
    let handle = alternating();
    let relay = handle.relay();
    let rules = AlternatingRules::default();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    let predicted = rules.position_after(1);
    tokio::join!(
        a.send(&relay, submit(&room_id, "e2", "e4", Some(predicted.clone()))),
        b.send(&relay, submit(&room_id, "e7", "e5", Some(predicted.clone()))),
    );

    let mut applied = 0;
    let mut rejected = Vec::new();
    for client in [&mut a, &mut b] {
        while let Ok(event) = client.events.try_recv() {
            match event {
                ServerEvent::MoveApplied { .. } => applied += 1,
                ServerEvent::RoomError { code, .. } => rejected.push(code),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    // One echo per member for the single applied move.
    assert_eq!(applied, 2);
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        rejected[0],
        ErrorCode::NotYourTurn | ErrorCode::StalePosition
    ));
    assert_eq!(handle.store().get(&room_id).await.unwrap().move_count, 1);
}

#[tokio::test]
async fn test_stale_client_position_is_rejected() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, submit(&room_id, "e2", "e4", Some(Position::new("white 7"))))
        .await;

    assert_eq!(a.next_error().0, ErrorCode::StalePosition);
    b.assert_idle();
    let snapshot = handle.store().get(&room_id).await.unwrap();
    assert_eq!(snapshot.move_count, 0);
    assert_eq!(snapshot.last_move, None);
}

#[tokio::test]
async fn test_illegal_move_reports_invalid_move() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, submit(&room_id, "e2", "e2", None)).await;

    assert_eq!(a.next_error(), (ErrorCode::IllegalMove, "Invalid move".to_string()));
    b.assert_idle();
}

#[tokio::test]
async fn test_finished_game_rejects_further_moves() {
    let handle = start(
        Arc::new(AlternatingRules::with_game_length(1)),
        RelayConfig::default(),
    );
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, submit(&room_id, "e2", "e4", None)).await;
    match b.next() {
        ServerEvent::MoveApplied { outcome, .. } => {
            assert_eq!(outcome, Outcome::Checkmate { winner: Side::White })
        }
        other => panic!("expected moveApplied, got {other:?}"),
    }
    a.next();

    b.send(&relay, submit(&room_id, "e7", "e5", None)).await;
    assert_eq!(b.next_error().0, ErrorCode::GameOver);
}

#[tokio::test]
async fn test_move_outside_bound_room_is_rejected() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = create(&relay, &mut a).await;

    b.send(&relay, submit(&room_id, "e2", "e4", None)).await;
    assert_eq!(b.next_error().0, ErrorCode::NotInRoom);

    b.send(&relay, ClientEvent::ResetRoom { room_id: room_id.clone() })
        .await;
    assert_eq!(b.next_error().0, ErrorCode::NotInRoom);
    assert!(handle.store().contains(&room_id));
    a.assert_idle();
}

#[tokio::test]
async fn test_trusted_client_position_is_stored() {
    let mut config = RelayConfig::default();
    config.moves.validation = MoveValidation::TrustClient;
    let handle = start(Arc::new(AlternatingRules::default()), config);
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, submit(&room_id, "e2", "e4", None)).await;
    assert_eq!(a.next_error().0, ErrorCode::IllegalMove);

    let claimed = Position::new("black 5");
    a.send(&relay, submit(&room_id, "e2", "e4", Some(claimed.clone())))
        .await;
    assert!(matches!(a.next(), ServerEvent::MoveApplied { .. }));
    b.next();
    assert_eq!(handle.store().get(&room_id).await.unwrap().position, claimed);
}

#[tokio::test]
async fn test_chess_game_through_the_relay() {
    let handle = start(Arc::new(ChessRules::new()), RelayConfig::default());
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    let after_e4 =
        Position::new("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1");
    a.send(&relay, submit(&room_id, "e2", "e4", Some(after_e4.clone())))
        .await;
    match b.next() {
        ServerEvent::MoveApplied { position, outcome, .. } => {
            assert_eq!(position, after_e4);
            assert!(outcome.is_ongoing());
        }
        other => panic!("expected moveApplied, got {other:?}"),
    }
    a.next();

    b.send(&relay, submit(&room_id, "e7", "e4", None)).await;
    assert_eq!(b.next_error(), (ErrorCode::IllegalMove, "Invalid move".to_string()));
}

// ----------------------------------------------------------------------------
// Departures and Reset
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_disconnect_leaves_degraded_room() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    relay.disconnect(&mut a.session).await;
    handle.hub().unregister(a.session.connection());

    assert_eq!(b.next(), ServerEvent::PeerDisconnected {});
    let snapshot = handle.store().get(&room_id).await.unwrap();
    assert_eq!(snapshot.participants.len(), 1);
    assert_eq!(snapshot.seat_of(b.session.connection()), Some(Seat::Second));
    assert_eq!(handle.hub().members(&room_id), vec![b.session.connection()]);
}

#[tokio::test]
async fn test_newcomer_takes_the_vacant_seat() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b, mut c) = (
        Client::connect(&handle),
        Client::connect(&handle),
        Client::connect(&handle),
    );
    let room_id = paired(&relay, &mut a, &mut b).await;
    relay.disconnect(&mut a.session).await;
    b.next();

    c.send(&relay, ClientEvent::JoinRoom { room_id: room_id.clone() })
        .await;
    match c.next() {
        ServerEvent::RoomJoined { seat, .. } => assert_eq!(seat, Seat::First),
        other => panic!("expected roomJoined, got {other:?}"),
    }
    assert_eq!(b.next(), ServerEvent::PeerJoined { room_id });
}

#[tokio::test]
async fn test_last_disconnect_removes_room() {
    let handle = alternating();
    let relay = handle.relay();
    let mut a = Client::connect(&handle);
    let room_id = create(&relay, &mut a).await;

    relay.disconnect(&mut a.session).await;

    assert!(!handle.store().contains(&room_id));
    assert_eq!(handle.hub().group_count(), 0);
}

#[tokio::test]
async fn test_reset_notifies_everyone_then_discards_room() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    a.send(&relay, ClientEvent::ResetRoom { room_id: room_id.clone() })
        .await;

    let expected = ServerEvent::RoomReset {
        room_id: room_id.clone(),
    };
    assert_eq!(a.next(), expected);
    assert_eq!(b.next(), expected);
    assert!(handle.store().get(&room_id).await.unwrap_err().is_room_not_found());

    // Stale bindings are dropped lazily on the next create.
    assert!(matches!(a.session.state(), SessionState::Bound { .. }));
    let fresh = create(&relay, &mut a).await;
    assert_ne!(fresh, room_id);

    relay.disconnect(&mut b.session).await;
    a.assert_idle();
}

#[tokio::test]
async fn test_leave_keeps_connection_usable() {
    let handle = alternating();
    let relay = handle.relay();
    let (mut a, mut b) = (Client::connect(&handle), Client::connect(&handle));
    let room_id = paired(&relay, &mut a, &mut b).await;

    b.send(&relay, ClientEvent::LeaveRoom { room_id: room_id.clone() })
        .await;

    assert_eq!(b.next(), ServerEvent::RoomLeft { room_id: room_id.clone() });
    assert_eq!(a.next(), ServerEvent::PeerDisconnected {});
    assert_eq!(b.session.state(), &SessionState::Unbound);

    let other = create(&relay, &mut b).await;
    assert_ne!(other, room_id);
    assert_eq!(handle.store().len(), 2);
}

#[tokio::test]
async fn test_malformed_frame_gets_error_reply() {
    let handle = alternating();
    let relay = handle.relay();
    let mut a = Client::connect(&handle);

    relay.handle_text(&mut a.session, "{not json").await;
    assert_eq!(a.next_error().0, ErrorCode::MalformedEvent);

    relay
        .handle_text(&mut a.session, r#"{"event":"createRoom"}"#)
        .await;
    assert!(matches!(a.next(), ServerEvent::RoomCreated { .. }));
}
