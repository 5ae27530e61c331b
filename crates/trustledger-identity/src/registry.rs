//! Agent records and their lifecycle.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use trustledger_db::{allocate, issued, write_transaction, Sequence};
use trustledger_events::{emit_event, EventPayload};
use trustledger_types::{storage_key, Address, AgentId};

use crate::IdentityError;

/// A registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Sequential id, starting at 1.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Globally unique domain.
    pub domain: String,
    /// Identity that registered the agent.
    pub owner: Address,
    /// ISO 8601 registration timestamp.
    pub registered_at: String,
    /// `false` once the agent has been deactivated.
    pub active: bool,
    /// Opaque pointer to the agent's registration document.
    pub metadata_uri: String,
}

const AGENT_COLUMNS: &str = "id, name, domain, owner, registered_at, active, metadata_uri";

fn map_row_to_agent(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        domain: row.get(2)?,
        owner: Address::new(row.get::<_, String>(3)?),
        registered_at: row.get(4)?,
        active: row.get(5)?,
        metadata_uri: row.get(6)?,
    })
}

fn load_agent(conn: &Connection, agent_id: AgentId) -> Result<Agent, IdentityError> {
    let key = storage_key(agent_id).ok_or(IdentityError::AgentNotFound(agent_id))?;
    conn.query_row(
        &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
        [key],
        map_row_to_agent,
    )
    .optional()?
    .ok_or(IdentityError::AgentNotFound(agent_id))
}

/// Loads an agent the caller is about to modify, checking ownership and
/// activity in that order.
fn load_owned_active(
    conn: &Connection,
    agent_id: AgentId,
    caller: &Address,
) -> Result<Agent, IdentityError> {
    let agent = load_agent(conn, agent_id)?;
    if &agent.owner != caller {
        return Err(IdentityError::NotOwner {
            agent_id,
            caller: caller.clone(),
        });
    }
    if !agent.active {
        return Err(IdentityError::AgentInactive(agent_id));
    }
    Ok(agent)
}

/// Registers a new agent and returns its id.
///
/// 1. Rejects empty names and domains.
/// 2. Rejects a domain that is already mapped.
/// 3. Allocates the next agent id from the shared sequence.
/// 4. Stores the agent and the `domain -> id` index entry.
/// 5. Appends `AGENT_REGISTERED`.
///
/// All steps run in one write transaction.
///
/// # Errors
///
/// Returns [`IdentityError::EmptyName`] / [`IdentityError::EmptyDomain`] for
/// empty input, [`IdentityError::DomainTaken`] for a duplicate domain, and
/// [`IdentityError::Database`] / [`IdentityError::Event`] if storage fails.
pub fn register_agent(
    conn: &mut Connection,
    name: &str,
    domain: &str,
    metadata_uri: &str,
    owner: &Address,
) -> Result<AgentId, IdentityError> {
    if name.is_empty() {
        return Err(IdentityError::EmptyName);
    }
    if domain.is_empty() {
        return Err(IdentityError::EmptyDomain);
    }

    let tx = write_transaction(conn)?;

    let existing: Option<AgentId> = tx
        .query_row(
            "SELECT agent_id FROM agent_domains WHERE domain = ?1",
            [domain],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(IdentityError::DomainTaken(domain.to_string()));
    }

    let agent_id = allocate(&tx, Sequence::AgentId)?;

    tx.execute(
        "INSERT INTO agents (id, name, domain, owner, metadata_uri, active)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        params![agent_id, name, domain, owner.as_str(), metadata_uri],
    )?;
    tx.execute(
        "INSERT INTO agent_domains (domain, agent_id) VALUES (?1, ?2)",
        params![domain, agent_id],
    )?;

    emit_event(
        &tx,
        &EventPayload::AgentRegistered {
            agent_id,
            name: name.to_string(),
            domain: domain.to_string(),
            owner: owner.clone(),
        },
    )?;

    tx.commit()?;

    tracing::info!(agent_id, domain, owner = %owner, "agent registered");
    Ok(agent_id)
}

/// Replaces an active agent's metadata URI. Only the owner may do this.
///
/// # Errors
///
/// Returns [`IdentityError::AgentNotFound`] if the id was never issued,
/// [`IdentityError::NotOwner`] if `caller` is not the owner, and
/// [`IdentityError::AgentInactive`] if the agent has been deactivated.
pub fn update_agent_uri(
    conn: &mut Connection,
    agent_id: AgentId,
    new_uri: &str,
    caller: &Address,
) -> Result<(), IdentityError> {
    let tx = write_transaction(conn)?;
    load_owned_active(&tx, agent_id, caller)?;

    tx.execute(
        "UPDATE agents SET metadata_uri = ?1 WHERE id = ?2",
        params![new_uri, agent_id],
    )?;

    emit_event(
        &tx,
        &EventPayload::AgentUpdated {
            agent_id,
            metadata_uri: new_uri.to_string(),
        },
    )?;

    tx.commit()?;

    tracing::info!(agent_id, "agent metadata uri updated");
    Ok(())
}

/// Permanently deactivates an agent. Only the owner may do this, and only
/// once: there is no way back to active.
///
/// # Errors
///
/// Returns [`IdentityError::AgentNotFound`] if the id was never issued,
/// [`IdentityError::NotOwner`] if `caller` is not the owner, and
/// [`IdentityError::AgentInactive`] on a second deactivation.
pub fn deactivate_agent(
    conn: &mut Connection,
    agent_id: AgentId,
    caller: &Address,
) -> Result<(), IdentityError> {
    let tx = write_transaction(conn)?;
    load_owned_active(&tx, agent_id, caller)?;

    tx.execute("UPDATE agents SET active = 0 WHERE id = ?1", [agent_id])?;
    emit_event(&tx, &EventPayload::AgentDeactivated { agent_id })?;

    tx.commit()?;

    tracing::info!(agent_id, "agent deactivated");
    Ok(())
}

/// Fetches an agent by id.
///
/// # Errors
///
/// Returns [`IdentityError::AgentNotFound`] if the id was never issued.
pub fn get_agent(conn: &Connection, agent_id: AgentId) -> Result<Agent, IdentityError> {
    load_agent(conn, agent_id)
}

/// Looks up the agent holding `domain`. Returns `0` when the domain is free.
pub fn get_agent_by_domain(conn: &Connection, domain: &str) -> Result<AgentId, IdentityError> {
    let agent_id: Option<AgentId> = conn
        .query_row(
            "SELECT agent_id FROM agent_domains WHERE domain = ?1",
            [domain],
            |row| row.get(0),
        )
        .optional()?;
    Ok(agent_id.unwrap_or(0))
}

/// Number of agent ids issued so far. Deactivated agents still count.
pub fn total_agents(conn: &Connection) -> Result<u64, IdentityError> {
    Ok(issued(conn, Sequence::AgentId)?)
}
