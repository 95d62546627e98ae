//! Generation lifecycle and bookkeeping.
//!
//! A generation moves `installing -> installed -> active` and is removed when
//! a newer generation activates. Every transition goes through
//! [`GenerationState::advance`] so illegal orderings are rejected in one place.

use super::connection::CacheDb;
use super::entries::StoredEntry;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Lifecycle state of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    /// Row exists; manifest population has not committed yet.
    Installing,
    /// Every manifest entry is stored; waiting for activation.
    Installed,
    /// Authoritative generation serving fetches.
    Active,
}

/// Events that move a generation between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationEvent {
    BeginInstall,
    CompleteInstall,
    Activate,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Installing => "installing",
            GenerationState::Installed => "installed",
            GenerationState::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "installing" => Ok(GenerationState::Installing),
            "installed" => Ok(GenerationState::Installed),
            "active" => Ok(GenerationState::Active),
            other => Err(Error::CorruptEntry(format!("unknown generation state: {other}"))),
        }
    }

    /// Compute the next state for `event`, starting from `current` (`None` when
    /// the generation does not exist yet).
    ///
    /// Re-installing an installed or active generation keeps its state: the
    /// entries are replaced atomically, so it never stops being usable.
    pub fn advance(current: Option<Self>, event: GenerationEvent) -> Result<Self, Error> {
        use GenerationEvent::{Activate, BeginInstall, CompleteInstall};
        use GenerationState::{Active, Installed, Installing};

        match (current, event) {
            (None | Some(Installing), BeginInstall) => Ok(Installing),
            (Some(Installed), BeginInstall) => Ok(Installed),
            (Some(Active), BeginInstall) => Ok(Active),
            (Some(Installing | Installed), CompleteInstall) => Ok(Installed),
            (Some(Active), CompleteInstall) => Ok(Active),
            (Some(Installed | Active), Activate) => Ok(Active),
            (None, CompleteInstall | Activate) => Err(Error::InvalidState(format!("{event:?} on missing generation"))),
            (Some(Installing), Activate) => {
                Err(Error::InvalidState("cannot activate a generation that has not finished installing".into()))
            }
        }
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation as reported by [`CacheDb::generations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub state: GenerationState,
    pub created_at: String,
    pub activated_at: Option<String>,
    pub entry_count: u64,
}

fn read_state(conn: &rusqlite::Connection, name: &str) -> Result<Option<GenerationState>, Error> {
    let state: Option<String> = conn
        .query_row("SELECT state FROM generations WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    state.as_deref().map(GenerationState::parse).transpose()
}

impl CacheDb {
    /// Open the generation `name` for installation, creating it if absent.
    ///
    /// Returns the state the generation was in before this call (`None` when
    /// it was just created), which callers hand back to
    /// [`CacheDb::abandon_install`] if population fails.
    pub async fn open_generation(&self, name: &str) -> Result<Option<GenerationState>, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Option<GenerationState>, Error> {
                let previous = read_state(conn, &name)?;
                let next = GenerationState::advance(previous, GenerationEvent::BeginInstall)?;
                if previous.is_none() {
                    conn.execute(
                        "INSERT INTO generations (name, state, created_at) VALUES (?1, ?2, ?3)",
                        params![name, next.as_str(), now],
                    )?;
                }
                Ok(previous)
            })
            .await
            .map_err(Error::from)
    }

    /// Store every manifest entry and mark the generation installed, in one
    /// transaction. Existing entries with the same key are replaced.
    pub async fn complete_install(&self, name: &str, entries: Vec<StoredEntry>) -> Result<GenerationState, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<GenerationState, Error> {
                let tx = conn.transaction()?;
                let current = read_state(&tx, &name)?;
                let next = GenerationState::advance(current, GenerationEvent::CompleteInstall)?;

                for entry in &entries {
                    entry.upsert(&tx, &name)?;
                }
                tx.execute("UPDATE generations SET state = ?1 WHERE name = ?2", params![next.as_str(), name])?;
                tx.commit()?;
                Ok(next)
            })
            .await
            .map_err(Error::from)
    }

    /// Undo [`CacheDb::open_generation`] after a failed install.
    ///
    /// A generation created by the failed attempt is deleted; a generation
    /// that existed before keeps its previous entries and state.
    pub async fn abandon_install(&self, name: &str, previous: Option<GenerationState>) -> Result<(), Error> {
        if previous.is_some() {
            return Ok(());
        }
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM generations WHERE name = ?1 AND state = 'installing'", params![name])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Make `name` the only generation: delete every other generation (and
    /// its entries) and mark `name` active, atomically.
    ///
    /// Returns the names of the deleted generations.
    pub async fn activate_generation(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let current = read_state(&tx, &name)?;
                if current.is_none() {
                    return Err(Error::UnknownGeneration(name));
                }
                let next = GenerationState::advance(current, GenerationEvent::Activate)?;

                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT name FROM generations WHERE name != ?1 ORDER BY created_at")?;
                    let rows = stmt.query_map(params![name], |row| row.get(0))?;
                    rows.collect::<Result<_, _>>()?
                };
                tx.execute("DELETE FROM generations WHERE name != ?1", params![name])?;
                tx.execute(
                    "UPDATE generations SET state = ?1, activated_at = COALESCE(activated_at, ?2) WHERE name = ?3",
                    params![next.as_str(), now, name],
                )?;
                tx.commit()?;
                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }

    /// Current state of `name`, or `None` if it does not exist.
    pub async fn generation_state(&self, name: &str) -> Result<Option<GenerationState>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<GenerationState>, Error> { read_state(conn, &name) })
            .await
            .map_err(Error::from)
    }

    /// The generation currently serving fetches, if any.
    ///
    /// Activation deletes every other generation, so at most one row is
    /// `active`; a newer generation that is still installing does not replace
    /// it here.
    pub async fn active_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let name = conn
                    .query_row(
                        "SELECT name FROM generations WHERE state = 'active' ORDER BY activated_at DESC LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(name)
            })
            .await
            .map_err(Error::from)
    }

    /// All generations with their state and entry count, oldest first.
    pub async fn generations(&self) -> Result<Vec<Generation>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<Generation>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.state, g.created_at, g.activated_at,
                        (SELECT COUNT(*) FROM entries e WHERE e.generation = g.name)
                    FROM generations g ORDER BY g.created_at, g.name",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?;

                let mut generations = Vec::new();
                for row in rows {
                    let (name, state, created_at, activated_at, count) = row?;
                    generations.push(Generation {
                        name,
                        state: GenerationState::parse(&state)?,
                        created_at,
                        activated_at,
                        entry_count: count as u64,
                    });
                }
                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }
}
