//! 金币流水 DAO - coin_transaction 表
//!
//! 流水是 append-only 的：正常路径只 insert，不 update；
//! upsert 语义仅用于 pull 重放时的幂等覆盖。

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::entities::CoinTransaction;

pub const TABLE: &str = "coin_transaction";

pub struct CoinTransactionDao<'a> {
    conn: &'a Connection,
}

impl<'a> CoinTransactionDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, t: &CoinTransaction) -> Result<()> {
        let sql = r#"
            INSERT INTO coin_transaction (id, user_id, amount, reason, created_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                amount = excluded.amount,
                reason = excluded.reason,
                created_at = excluded.created_at,
                synced = excluded.synced
        "#;
        self.conn.execute(
            sql,
            params![
                t.id,
                t.user_id,
                t.amount,
                t.reason,
                t.created_at,
                t.synced as i32,
            ],
        )?;
        Ok(())
    }

    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<CoinTransaction>> {
        let sql = "SELECT id, user_id, amount, reason, created_at, synced FROM coin_transaction WHERE user_id = ?1 ORDER BY created_at DESC";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| row_to_transaction(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// 余额 = SUM(amount)
    pub fn balance(&self, user_id: &str) -> Result<i64> {
        let balance = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM coin_transaction WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    pub fn list_unsynced(&self) -> Result<Vec<CoinTransaction>> {
        let sql = "SELECT id, user_id, amount, reason, created_at, synced FROM coin_transaction WHERE synced = 0 ORDER BY id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_transaction(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_synced(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE coin_transaction SET synced = 1 WHERE id IN ({})", placeholders);
        self.conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<CoinTransaction> {
    Ok(CoinTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        reason: row.get(3)?,
        created_at: row.get(4)?,
        synced: row.get::<_, i32>(5)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrate;

    #[test]
    fn balance_sums_signed_amounts() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate::init_db(&mut conn).unwrap();
        let dao = CoinTransactionDao::new(&conn);

        dao.upsert(&CoinTransaction::new("u1", 100, "redeem")).unwrap();
        dao.upsert(&CoinTransaction::new("u1", 20, "task:feed")).unwrap();
        dao.upsert(&CoinTransaction::new("u1", -50, "shop")).unwrap();
        dao.upsert(&CoinTransaction::new("u2", 999, "redeem")).unwrap();

        assert_eq!(dao.balance("u1").unwrap(), 70);
        assert_eq!(dao.balance("nobody").unwrap(), 0);
    }
}
