//! Durable session record, so a host restart mid-exam resumes monitoring.
//!
//! SQLite runs on a dedicated worker thread; callers hand closures over a
//! channel and await the result through a oneshot. The termination path
//! uses a detached submit instead so clearing the record never blocks the
//! host event thread.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use crate::session::SessionSnapshot;
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("examguard-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Queue a task without waiting for its outcome.
    fn submit<F>(&self, task: F)
    where
        F: FnOnce(&mut Connection) -> Result<()> + Send + 'static,
    {
        let command = DbCommand::Execute(Box::new(move |conn| {
            if let Err(err) = task(conn) {
                error!("Detached database task failed: {err:#}");
            }
        }));

        if self.inner.sender.send(command).is_err() {
            error!("Database thread is gone; detached task dropped");
        }
    }

    pub async fn save_record(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let record = snapshot.clone();
        self.execute(move |conn| {
            let session_id = record
                .session_id
                .as_deref()
                .ok_or_else(|| anyhow!("refusing to persist a record without a session id"))?;
            let started_at = record.started_at.unwrap_or_else(Utc::now);
            conn.execute(
                "INSERT INTO session_record (id, session_id, client_name, roll_number, expires_at, started_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     session_id = excluded.session_id,
                     client_name = excluded.client_name,
                     roll_number = excluded.roll_number,
                     expires_at = excluded.expires_at,
                     started_at = excluded.started_at",
                params![
                    session_id,
                    record.client_name.as_deref().unwrap_or_default(),
                    record.roll_number.as_deref().unwrap_or_default(),
                    record.expires_at.as_ref().map(|dt| dt.to_rfc3339()),
                    started_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to save session record")?;
            Ok(())
        })
        .await
    }

    pub async fn load_record(&self) -> Result<Option<SessionSnapshot>> {
        self.execute(|conn| {
            conn.query_row(
                "SELECT session_id, client_name, roll_number, expires_at, started_at
                 FROM session_record WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .with_context(|| "failed to load session record")?
            .map(|(session_id, client_name, roll_number, expires_at, started_at)| {
                Ok(SessionSnapshot {
                    session_id: Some(session_id),
                    client_name: Some(client_name),
                    roll_number: Some(roll_number),
                    expires_at: expires_at.as_deref().map(parse_datetime).transpose()?,
                    started_at: Some(parse_datetime(&started_at)?),
                })
            })
            .transpose()
        })
        .await
    }

    pub async fn clear_record(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM session_record WHERE id = 1", [])
                .with_context(|| "failed to clear session record")?;
            Ok(())
        })
        .await
    }

    /// Fire-and-forget clear, used from the synchronous termination path.
    pub fn clear_record_detached(&self) {
        self.submit(|conn| {
            conn.execute("DELETE FROM session_record WHERE id = 1", [])
                .with_context(|| "failed to clear session record")?;
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> Database {
        let path = std::env::temp_dir()
            .join(format!("examguard-db-{}", uuid::Uuid::new_v4()))
            .join("examguard.sqlite3");
        Database::new(path).unwrap()
    }

    fn snapshot(id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(id.into()),
            client_name: Some("Alice".into()),
            roll_number: Some("R001".into()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(2)),
            started_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let db = temp_db();
        db.save_record(&snapshot("42")).await.unwrap();

        let loaded = db.load_record().await.unwrap().unwrap();
        assert_eq!(loaded.session_id.as_deref(), Some("42"));
        assert_eq!(loaded.client_name.as_deref(), Some("Alice"));
        assert_eq!(loaded.roll_number.as_deref(), Some("R001"));
        assert!(loaded.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_record() {
        let db = temp_db();
        db.save_record(&snapshot("42")).await.unwrap();
        db.save_record(&snapshot("43")).await.unwrap();

        let loaded = db.load_record().await.unwrap().unwrap();
        assert_eq!(loaded.session_id.as_deref(), Some("43"));
    }

    #[tokio::test]
    async fn test_clear_removes_record() {
        let db = temp_db();
        db.save_record(&snapshot("42")).await.unwrap();
        db.clear_record().await.unwrap();
        assert!(db.load_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_on_empty_database() {
        let db = temp_db();
        assert!(db.load_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_without_session_id_is_rejected() {
        let db = temp_db();
        let err = db.save_record(&SessionSnapshot::default()).await;
        assert!(err.is_err());
    }
}
