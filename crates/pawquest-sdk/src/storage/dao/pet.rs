//! 宠物 DAO - pet 表
//!
//! 用户的主实体：pullIfNeeded 用本表行数作为「本地是否已有数据」的廉价信号。

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::entities::Pet;

/// 表名（StoreEvent 使用）
pub const TABLE: &str = "pet";

pub struct PetDao<'a> {
    conn: &'a Connection,
}

impl<'a> PetDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, p: &Pet) -> Result<()> {
        let sql = r#"
            INSERT INTO pet (id, user_id, name, species, breed, birth_date, photo_path, level, exp, created_at, updated_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                species = excluded.species,
                breed = excluded.breed,
                birth_date = excluded.birth_date,
                photo_path = excluded.photo_path,
                level = excluded.level,
                exp = excluded.exp,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                synced = excluded.synced
        "#;
        self.conn.execute(
            sql,
            params![
                p.id,
                p.user_id,
                p.name,
                p.species,
                p.breed,
                p.birth_date,
                p.photo_path,
                p.level,
                p.exp,
                p.created_at,
                p.updated_at,
                p.synced as i32,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Pet>> {
        let sql = "SELECT id, user_id, name, species, breed, birth_date, photo_path, level, exp, created_at, updated_at, synced FROM pet WHERE id = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![id], |row| row_to_pet(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<Pet>> {
        let sql = "SELECT id, user_id, name, species, breed, birth_date, photo_path, level, exp, created_at, updated_at, synced FROM pet WHERE user_id = ?1 ORDER BY created_at";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| row_to_pet(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// 用户名下宠物 id 列表（Vaccine pull 的过滤集合）
    pub fn list_ids_by_user(&self, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM pet WHERE user_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM pet WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 快照所有脏行，按 id 排序（推送按 entity-id 顺序逐行 upsert）
    pub fn list_unsynced(&self) -> Result<Vec<Pet>> {
        let sql = "SELECT id, user_id, name, species, breed, birth_date, photo_path, level, exp, created_at, updated_at, synced FROM pet WHERE synced = 0 ORDER BY id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_pet(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// 远端确认后按 id 列表批量置 synced=1
    pub fn mark_synced(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE pet SET synced = 1 WHERE id IN ({})", placeholders);
        self.conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }

    /// 删除宠物；疫苗记录由外键级联删除。远端不做删除传播（见 DESIGN.md）。
    pub fn delete(&self, id: &str) -> Result<()> {
        self.conn.execute("DELETE FROM pet WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn row_to_pet(row: &rusqlite::Row) -> rusqlite::Result<Pet> {
    Ok(Pet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        species: row.get(3)?,
        breed: row.get(4)?,
        birth_date: row.get(5)?,
        photo_path: row.get(6)?,
        level: row.get(7)?,
        exp: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        synced: row.get::<_, i32>(11)? != 0,
    })
}
