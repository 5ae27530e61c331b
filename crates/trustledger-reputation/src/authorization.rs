//! The `(agent, client)` feedback authorization relation.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use trustledger_db::write_transaction;
use trustledger_events::{emit_event, EventPayload};
use trustledger_types::{storage_key, Address, AgentId};

use crate::ReputationError;

/// Current authorization state of one `(agent, client)` pair.
///
/// Rows are never deleted; only the latest flag is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAuthorization {
    pub agent_id: AgentId,
    pub client: Address,
    pub authorized: bool,
    /// When the pair was last authorized.
    pub authorized_at: String,
}

/// Fetches the stored authorization for a pair, if one was ever issued.
///
/// # Errors
///
/// Returns [`ReputationError::Database`] on SQL failure.
pub fn get_authorization(
    conn: &Connection,
    agent_id: AgentId,
    client: &Address,
) -> Result<Option<FeedbackAuthorization>, ReputationError> {
    let Some(key) = storage_key(agent_id) else {
        return Ok(None);
    };
    let row = conn
        .query_row(
            "SELECT authorized, authorized_at FROM feedback_authorizations
             WHERE agent_id = ?1 AND client = ?2",
            params![key, client.as_str()],
            |row| Ok((row.get::<_, bool>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    Ok(row.map(|(authorized, authorized_at)| FeedbackAuthorization {
        agent_id,
        client: client.clone(),
        authorized,
        authorized_at,
    }))
}

/// Returns `true` if `client` may currently submit feedback for the agent.
pub fn is_authorized(
    conn: &Connection,
    agent_id: AgentId,
    client: &Address,
) -> Result<bool, ReputationError> {
    Ok(get_authorization(conn, agent_id, client)?.is_some_and(|a| a.authorized))
}

/// Authorizes `client` to review the agent.
///
/// Any caller may issue an authorization for any agent; the caller is only
/// recorded on the emitted event. Re-authorizing after a revocation flips
/// the flag back and refreshes `authorized_at`.
///
/// # Errors
///
/// Returns [`ReputationError::NullClient`] for the null identity and
/// [`ReputationError::AlreadyAuthorized`] if the pair is already authorized.
pub fn authorize_feedback(
    conn: &mut Connection,
    agent_id: AgentId,
    client: &Address,
    caller: &Address,
) -> Result<(), ReputationError> {
    if client.is_null() {
        return Err(ReputationError::NullClient);
    }
    if storage_key(agent_id).is_none() {
        return Err(ReputationError::AgentIdTooLarge(agent_id));
    }

    let tx = write_transaction(conn)?;

    if is_authorized(&tx, agent_id, client)? {
        return Err(ReputationError::AlreadyAuthorized {
            agent_id,
            client: client.clone(),
        });
    }

    tx.execute(
        "INSERT INTO feedback_authorizations (agent_id, client, authorized, authorized_at)
         VALUES (?1, ?2, 1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT (agent_id, client) DO UPDATE SET
            authorized = 1,
            authorized_at = excluded.authorized_at",
        params![agent_id, client.as_str()],
    )?;

    emit_event(
        &tx,
        &EventPayload::FeedbackAuthorized {
            agent_id,
            client: client.clone(),
            authorized_by: caller.clone(),
        },
    )?;

    tx.commit()?;

    tracing::info!(agent_id, client = %client, caller = %caller, "feedback authorized");
    Ok(())
}

/// Withdraws a client's authorization. Feedback already submitted stays.
///
/// # Errors
///
/// Returns [`ReputationError::NotCurrentlyAuthorized`] if the pair was never
/// authorized or has already been revoked.
pub fn revoke_feedback_authorization(
    conn: &mut Connection,
    agent_id: AgentId,
    client: &Address,
    caller: &Address,
) -> Result<(), ReputationError> {
    let tx = write_transaction(conn)?;

    if !is_authorized(&tx, agent_id, client)? {
        return Err(ReputationError::NotCurrentlyAuthorized {
            agent_id,
            client: client.clone(),
        });
    }

    tx.execute(
        "UPDATE feedback_authorizations SET authorized = 0
         WHERE agent_id = ?1 AND client = ?2",
        params![agent_id, client.as_str()],
    )?;

    emit_event(
        &tx,
        &EventPayload::FeedbackRevoked {
            agent_id,
            client: client.clone(),
            revoked_by: caller.clone(),
        },
    )?;

    tx.commit()?;

    tracing::info!(agent_id, client = %client, caller = %caller, "feedback authorization revoked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustledger_db::run_migrations;
    use trustledger_types::ErrorKind;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    fn client() -> Address {
        Address::new("0xc1")
    }

    fn anyone() -> Address {
        Address::new("0xanyone")
    }

    #[test]
    fn authorize_then_check() {
        let mut conn = test_db();
        assert!(!is_authorized(&conn, 1, &client()).unwrap());

        authorize_feedback(&mut conn, 1, &client(), &anyone()).unwrap();
        assert!(is_authorized(&conn, 1, &client()).unwrap());
        // Scoped to the agent.
        assert!(!is_authorized(&conn, 2, &client()).unwrap());
    }

    #[test]
    fn null_client_is_rejected() {
        let mut conn = test_db();
        let err = authorize_feedback(
            &mut conn,
            1,
            &Address::new("0x0000000000000000000000000000000000000000"),
            &anyone(),
        )
        .unwrap_err();
        assert!(matches!(err, ReputationError::NullClient));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn unstorable_agent_id_is_rejected() {
        let mut conn = test_db();
        let huge = u64::MAX;

        let err = authorize_feedback(&mut conn, huge, &client(), &anyone()).unwrap_err();
        assert!(matches!(err, ReputationError::AgentIdTooLarge(id) if id == huge));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert!(!is_authorized(&conn, huge, &client()).unwrap());
        let err = revoke_feedback_authorization(&mut conn, huge, &client(), &anyone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn double_authorization_is_rejected() {
        let mut conn = test_db();
        authorize_feedback(&mut conn, 1, &client(), &anyone()).unwrap();

        let err = authorize_feedback(&mut conn, 1, &client(), &anyone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn revoke_requires_current_authorization() {
        let mut conn = test_db();

        let err = revoke_feedback_authorization(&mut conn, 1, &client(), &anyone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        authorize_feedback(&mut conn, 1, &client(), &anyone()).unwrap();
        revoke_feedback_authorization(&mut conn, 1, &client(), &anyone()).unwrap();
        assert!(!is_authorized(&conn, 1, &client()).unwrap());

        let err = revoke_feedback_authorization(&mut conn, 1, &client(), &anyone()).unwrap_err();
        assert!(matches!(err, ReputationError::NotCurrentlyAuthorized { .. }));
    }

    #[test]
    fn reauthorization_after_revoke_keeps_single_row() {
        let mut conn = test_db();
        authorize_feedback(&mut conn, 1, &client(), &anyone()).unwrap();
        revoke_feedback_authorization(&mut conn, 1, &client(), &anyone()).unwrap();
        authorize_feedback(&mut conn, 1, &client(), &anyone()).unwrap();

        assert!(is_authorized(&conn, 1, &client()).unwrap());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM feedback_authorizations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn authorization_event_records_issuer() {
        let mut conn = test_db();
        authorize_feedback(&mut conn, 3, &client(), &anyone()).unwrap();

        let payload: String = conn
            .query_row(
                "SELECT payload_json FROM ledger_events WHERE event_type = 'FEEDBACK_AUTHORIZED'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["authorized_by"], "0xanyone");
        assert_eq!(value["agent_id"], 3);
    }

    #[test]
    fn client_addresses_are_case_insensitive() {
        let mut conn = test_db();
        authorize_feedback(&mut conn, 1, &Address::new("0xABC"), &anyone()).unwrap();
        assert!(is_authorized(&conn, 1, &Address::new("0xabc")).unwrap());
    }
}
