//! 兑换码 DAO - redeem_code 表
//!
//! UNIQUE(user_id, code) 保证同一用户同一 code 只能兑换一次；
//! 业务层在插入前用 `find_by_code` 预检查，给出友好错误而非约束冲突。

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::entities::RedeemCode;

pub const TABLE: &str = "redeem_code";

pub struct RedeemCodeDao<'a> {
    conn: &'a Connection,
}

impl<'a> RedeemCodeDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, r: &RedeemCode) -> Result<()> {
        let sql = r#"
            INSERT INTO redeem_code (id, user_id, code, coin_value, redeemed_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                code = excluded.code,
                coin_value = excluded.coin_value,
                redeemed_at = excluded.redeemed_at,
                synced = excluded.synced
        "#;
        self.conn.execute(
            sql,
            params![
                r.id,
                r.user_id,
                r.code,
                r.coin_value,
                r.redeemed_at,
                r.synced as i32,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_code(&self, user_id: &str, code: &str) -> Result<Option<RedeemCode>> {
        let sql = "SELECT id, user_id, code, coin_value, redeemed_at, synced FROM redeem_code WHERE user_id = ?1 AND code = ?2";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![user_id, code], |row| row_to_redeem(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<RedeemCode>> {
        let sql = "SELECT id, user_id, code, coin_value, redeemed_at, synced FROM redeem_code WHERE user_id = ?1 ORDER BY redeemed_at DESC";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| row_to_redeem(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn list_unsynced(&self) -> Result<Vec<RedeemCode>> {
        let sql = "SELECT id, user_id, code, coin_value, redeemed_at, synced FROM redeem_code WHERE synced = 0 ORDER BY id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_redeem(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_synced(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE redeem_code SET synced = 1 WHERE id IN ({})", placeholders);
        self.conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }
}

fn row_to_redeem(row: &rusqlite::Row) -> rusqlite::Result<RedeemCode> {
    Ok(RedeemCode {
        id: row.get(0)?,
        user_id: row.get(1)?,
        code: row.get(2)?,
        coin_value: row.get(3)?,
        redeemed_at: row.get(4)?,
        synced: row.get::<_, i32>(5)? != 0,
    })
}
