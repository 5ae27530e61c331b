//! Unit tests for the event log.

use rusqlite::Connection;
use trustledger_types::Address;

use crate::event::{EventPayload, Registry};
use crate::store::{emit_event, query_events, EventFilter};

fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    trustledger_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn registered(agent_id: u64) -> EventPayload {
    EventPayload::AgentRegistered {
        agent_id,
        name: format!("agent-{agent_id}"),
        domain: format!("agent-{agent_id}.example"),
        owner: Address::new("0xowner"),
    }
}

// ── emit_event ───────────────────────────────────────────────────────

#[test]
fn emit_event_inserts_row() {
    let conn = test_db();

    let event = emit_event(&conn, &registered(1)).expect("emit should succeed");
    assert_eq!(event.seq, 1);
    assert_eq!(event.registry, "IDENTITY");
    assert_eq!(event.event_type, "AGENT_REGISTERED");
    assert_eq!(event.entity_id, "1");

    let (registry, event_type, entity_id): (String, String, String) = conn
        .query_row(
            "SELECT registry, event_type, entity_id FROM ledger_events WHERE seq = ?1",
            [event.seq],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("should query inserted row");

    assert_eq!(registry, "IDENTITY");
    assert_eq!(event_type, "AGENT_REGISTERED");
    assert_eq!(entity_id, "1");
}

#[test]
fn payload_round_trips_through_json() {
    let conn = test_db();

    let payload = EventPayload::FeedbackSubmitted {
        agent_id: 7,
        reviewer: Address::new("0xclient"),
        score: 90,
        feedback_index: 3,
    };
    let event = emit_event(&conn, &payload).expect("emit should succeed");

    assert!(event.payload_json.contains("\"event\":\"FEEDBACK_SUBMITTED\""));
    assert_eq!(event.payload().expect("payload should decode"), payload);
}

#[test]
fn sequence_is_strictly_increasing() {
    let conn = test_db();

    let seqs: Vec<i64> = (1..=4)
        .map(|id| emit_event(&conn, &registered(id)).unwrap().seq)
        .collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
}

#[test]
fn validation_events_are_filed_under_request_id() {
    let payload = EventPayload::ValidationResponseSubmitted {
        request_id: 12,
        agent_id: 1,
        validator_id: 2,
        score: 96,
    };
    assert_eq!(payload.entity_id(), "12");
    assert_eq!(payload.registry(), Registry::Validation);
    assert_eq!(payload.event_type(), "VALIDATION_RESPONSE_SUBMITTED");
}

#[test]
fn emitted_event_is_discarded_with_its_transaction() {
    let mut conn = test_db();
    {
        let tx = conn.transaction().unwrap();
        emit_event(&tx, &registered(1)).unwrap();
    }
    let events = query_events(&conn, &EventFilter::default()).unwrap();
    assert!(events.is_empty());
}

// ── query_events ─────────────────────────────────────────────────────

fn seed_mixed(conn: &Connection) {
    emit_event(conn, &registered(1)).unwrap();
    emit_event(
        conn,
        &EventPayload::FeedbackAuthorized {
            agent_id: 1,
            client: Address::new("0xc"),
            authorized_by: Address::new("0xowner"),
        },
    )
    .unwrap();
    emit_event(conn, &registered(2)).unwrap();
    emit_event(
        conn,
        &EventPayload::ValidationRequested {
            request_id: 0,
            agent_id: 1,
            validator_id: 2,
            requester: Address::new("0xowner"),
            request_uri: "ipfs://req".to_string(),
        },
    )
    .unwrap();
}

#[test]
fn query_without_filter_returns_everything_in_order() {
    let conn = test_db();
    seed_mixed(&conn);

    let events = query_events(&conn, &EventFilter::default()).unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "AGENT_REGISTERED",
            "FEEDBACK_AUTHORIZED",
            "AGENT_REGISTERED",
            "VALIDATION_REQUESTED"
        ]
    );
}

#[test]
fn query_filters_by_registry_and_entity() {
    let conn = test_db();
    seed_mixed(&conn);

    let identity = query_events(
        &conn,
        &EventFilter {
            registry: Some(Registry::Identity),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(identity.len(), 2);

    let agent_one = query_events(
        &conn,
        &EventFilter {
            entity_id: Some("1".to_string()),
            registry: Some(Registry::Reputation),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(agent_one.len(), 1);
    assert_eq!(agent_one[0].event_type, "FEEDBACK_AUTHORIZED");
}

#[test]
fn query_pages_with_cursor_and_limit() {
    let conn = test_db();
    seed_mixed(&conn);

    let first = query_events(
        &conn,
        &EventFilter {
            limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(first.len(), 2);

    let rest = query_events(
        &conn,
        &EventFilter {
            after_seq: Some(first[1].seq),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].seq, first[1].seq + 1);
}

#[test]
fn registry_parses_from_label() {
    assert_eq!("REPUTATION".parse::<Registry>().unwrap(), Registry::Reputation);
    assert!("PRESENCE".parse::<Registry>().is_err());
}
