//! 疫苗记录 DAO - vaccine_record 表

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::entities::VaccineRecord;

pub const TABLE: &str = "vaccine_record";

pub struct VaccineDao<'a> {
    conn: &'a Connection,
}

impl<'a> VaccineDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, v: &VaccineRecord) -> Result<()> {
        let sql = r#"
            INSERT INTO vaccine_record (id, pet_id, name, administered_at, next_due_at, notes, created_at, updated_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                pet_id = excluded.pet_id,
                name = excluded.name,
                administered_at = excluded.administered_at,
                next_due_at = excluded.next_due_at,
                notes = excluded.notes,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                synced = excluded.synced
        "#;
        self.conn.execute(
            sql,
            params![
                v.id,
                v.pet_id,
                v.name,
                v.administered_at,
                v.next_due_at,
                v.notes,
                v.created_at,
                v.updated_at,
                v.synced as i32,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<VaccineRecord>> {
        let sql = "SELECT id, pet_id, name, administered_at, next_due_at, notes, created_at, updated_at, synced FROM vaccine_record WHERE id = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![id], |row| row_to_vaccine(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_by_pet(&self, pet_id: &str) -> Result<Vec<VaccineRecord>> {
        let sql = "SELECT id, pet_id, name, administered_at, next_due_at, notes, created_at, updated_at, synced FROM vaccine_record WHERE pet_id = ?1 ORDER BY administered_at DESC";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![pet_id], |row| row_to_vaccine(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn list_unsynced(&self) -> Result<Vec<VaccineRecord>> {
        let sql = "SELECT id, pet_id, name, administered_at, next_due_at, notes, created_at, updated_at, synced FROM vaccine_record WHERE synced = 0 ORDER BY id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_vaccine(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_synced(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE vaccine_record SET synced = 1 WHERE id IN ({})", placeholders);
        self.conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }

    /// 本地删除；远端不做删除传播（见 DESIGN.md）。
    pub fn delete(&self, id: &str) -> Result<()> {
        self.conn.execute("DELETE FROM vaccine_record WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn row_to_vaccine(row: &rusqlite::Row) -> rusqlite::Result<VaccineRecord> {
    Ok(VaccineRecord {
        id: row.get(0)?,
        pet_id: row.get(1)?,
        name: row.get(2)?,
        administered_at: row.get(3)?,
        next_due_at: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        synced: row.get::<_, i32>(8)? != 0,
    })
}
