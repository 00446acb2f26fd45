//! 线下门店目录 DAO - store 表（只读目录数据，整表替换刷新）

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::dao::TransactionManager;
use crate::storage::entities::Store;

pub const TABLE: &str = "store";

pub struct StoreDao<'a> {
    conn: &'a Connection,
}

impl<'a> StoreDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 整表替换：clear + insert 在一个事务内完成
    pub fn replace_all(&self, stores: &[Store]) -> Result<()> {
        TransactionManager::new(self.conn).execute(|conn| {
            conn.execute("DELETE FROM store", [])?;
            for s in stores {
                conn.execute(
                    "INSERT INTO store (id, name, address, latitude, longitude)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![s.id, s.name, s.address, s.latitude, s.longitude],
                )?;
            }
            Ok(())
        })
    }

    pub fn list_all(&self) -> Result<Vec<Store>> {
        let sql = "SELECT id, name, address, latitude, longitude FROM store ORDER BY name";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_store(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

fn row_to_store(row: &rusqlite::Row) -> rusqlite::Result<Store> {
    Ok(Store {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
    })
}
