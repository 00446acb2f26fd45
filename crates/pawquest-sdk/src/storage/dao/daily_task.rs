//! 每日任务 DAO - daily_task 表

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::entities::DailyTask;

pub const TABLE: &str = "daily_task";

pub struct DailyTaskDao<'a> {
    conn: &'a Connection,
}

impl<'a> DailyTaskDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, t: &DailyTask) -> Result<()> {
        let sql = r#"
            INSERT INTO daily_task (id, user_id, pet_id, title, task_kind, coin_reward, task_date, completed, completed_at, created_at, updated_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                pet_id = excluded.pet_id,
                title = excluded.title,
                task_kind = excluded.task_kind,
                coin_reward = excluded.coin_reward,
                task_date = excluded.task_date,
                completed = excluded.completed,
                completed_at = excluded.completed_at,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                synced = excluded.synced
        "#;
        self.conn.execute(
            sql,
            params![
                t.id,
                t.user_id,
                t.pet_id,
                t.title,
                t.task_kind,
                t.coin_reward,
                t.task_date,
                t.completed as i32,
                t.completed_at,
                t.created_at,
                t.updated_at,
                t.synced as i32,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<DailyTask>> {
        let sql = "SELECT id, user_id, pet_id, title, task_kind, coin_reward, task_date, completed, completed_at, created_at, updated_at, synced FROM daily_task WHERE id = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![id], |row| row_to_task(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_for_date(&self, user_id: &str, task_date: &str) -> Result<Vec<DailyTask>> {
        let sql = "SELECT id, user_id, pet_id, title, task_kind, coin_reward, task_date, completed, completed_at, created_at, updated_at, synced FROM daily_task WHERE user_id = ?1 AND task_date = ?2 ORDER BY created_at";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id, task_date], |row| row_to_task(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// 某 (user, pet, date) 是否已生成过任务（任务生成的幂等检查）
    pub fn count_for_pet_date(&self, user_id: &str, pet_id: &str, task_date: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_task WHERE user_id = ?1 AND pet_id = ?2 AND task_date = ?3",
            params![user_id, pet_id, task_date],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 完成任务：置 completed 与 completed_at，并把该行重新标脏
    pub fn complete(&self, id: &str, now_ms: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE daily_task SET completed = 1, completed_at = ?2, updated_at = ?2, synced = 0 WHERE id = ?1",
            params![id, now_ms],
        )?;
        Ok(())
    }

    pub fn list_unsynced(&self) -> Result<Vec<DailyTask>> {
        let sql = "SELECT id, user_id, pet_id, title, task_kind, coin_reward, task_date, completed, completed_at, created_at, updated_at, synced FROM daily_task WHERE synced = 0 ORDER BY id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_task(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_synced(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE daily_task SET synced = 1 WHERE id IN ({})", placeholders);
        self.conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<DailyTask> {
    Ok(DailyTask {
        id: row.get(0)?,
        user_id: row.get(1)?,
        pet_id: row.get(2)?,
        title: row.get(3)?,
        task_kind: row.get(4)?,
        coin_reward: row.get(5)?,
        task_date: row.get(6)?,
        completed: row.get::<_, i32>(7)? != 0,
        completed_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        synced: row.get::<_, i32>(11)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrate;
    use chrono::Utc;
    use uuid::Uuid;

    fn create_test_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate::init_db(&mut conn).unwrap();
        conn
    }

    fn sample_task(user_id: &str, date: &str) -> DailyTask {
        let now = Utc::now().timestamp_millis();
        DailyTask {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            pet_id: None,
            title: "喂食".to_string(),
            task_kind: crate::storage::entities::task_kind::FEED.to_string(),
            coin_reward: 10,
            task_date: date.to_string(),
            completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
            synced: false,
        }
    }

    #[test]
    fn complete_marks_row_dirty_again() {
        let conn = create_test_db();
        let dao = DailyTaskDao::new(&conn);

        let task = sample_task("u1", "2026-08-05");
        dao.upsert(&task).unwrap();
        dao.mark_synced(&[task.id.clone()]).unwrap();
        assert!(dao.list_unsynced().unwrap().is_empty());

        dao.complete(&task.id, 1_700_000_000_000).unwrap();
        let reloaded = dao.get_by_id(&task.id).unwrap().unwrap();
        assert!(reloaded.completed);
        assert_eq!(reloaded.completed_at, Some(1_700_000_000_000));
        // 新的本地变更重新进入待推送集合
        assert_eq!(dao.list_unsynced().unwrap().len(), 1);
    }
}
