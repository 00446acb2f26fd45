//! 跑步记录 DAO - running_session 表

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::entities::RunningSession;

pub const TABLE: &str = "running_session";

pub struct RunningSessionDao<'a> {
    conn: &'a Connection,
}

impl<'a> RunningSessionDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, s: &RunningSession) -> Result<()> {
        let sql = r#"
            INSERT INTO running_session (id, user_id, pet_id, distance_m, duration_s, route, coins_earned, started_at, ended_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                pet_id = excluded.pet_id,
                distance_m = excluded.distance_m,
                duration_s = excluded.duration_s,
                route = excluded.route,
                coins_earned = excluded.coins_earned,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                synced = excluded.synced
        "#;
        self.conn.execute(
            sql,
            params![
                s.id,
                s.user_id,
                s.pet_id,
                s.distance_m,
                s.duration_s,
                s.route,
                s.coins_earned,
                s.started_at,
                s.ended_at,
                s.synced as i32,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<RunningSession>> {
        let sql = "SELECT id, user_id, pet_id, distance_m, duration_s, route, coins_earned, started_at, ended_at, synced FROM running_session WHERE id = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![id], |row| row_to_session(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<RunningSession>> {
        let sql = "SELECT id, user_id, pet_id, distance_m, duration_s, route, coins_earned, started_at, ended_at, synced FROM running_session WHERE user_id = ?1 ORDER BY started_at DESC";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| row_to_session(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn list_unsynced(&self) -> Result<Vec<RunningSession>> {
        let sql = "SELECT id, user_id, pet_id, distance_m, duration_s, route, coins_earned, started_at, ended_at, synced FROM running_session WHERE synced = 0 ORDER BY id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_session(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_synced(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE running_session SET synced = 1 WHERE id IN ({})", placeholders);
        self.conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<RunningSession> {
    Ok(RunningSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        pet_id: row.get(2)?,
        distance_m: row.get(3)?,
        duration_s: row.get(4)?,
        route: row.get(5)?,
        coins_earned: row.get(6)?,
        started_at: row.get(7)?,
        ended_at: row.get(8)?,
        synced: row.get::<_, i32>(9)? != 0,
    })
}
