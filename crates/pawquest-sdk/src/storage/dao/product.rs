//! 商品目录 DAO - product 表（只读目录数据，整表替换刷新）

use rusqlite::{Connection, params};
use crate::error::Result;
use crate::storage::dao::TransactionManager;
use crate::storage::entities::Product;

pub const TABLE: &str = "product";

pub struct ProductDao<'a> {
    conn: &'a Connection,
}

impl<'a> ProductDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 整表替换：clear + insert 在一个事务内完成，避免出现可见的空表窗口
    pub fn replace_all(&self, products: &[Product]) -> Result<()> {
        TransactionManager::new(self.conn).execute(|conn| {
            conn.execute("DELETE FROM product", [])?;
            for p in products {
                conn.execute(
                    "INSERT INTO product (id, name, description, price_coins, image_url, category)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![p.id, p.name, p.description, p.price_coins, p.image_url, p.category],
                )?;
            }
            Ok(())
        })
    }

    pub fn list_all(&self) -> Result<Vec<Product>> {
        let sql = "SELECT id, name, description, price_coins, image_url, category FROM product ORDER BY category, name";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row_to_product(row))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Product>> {
        let sql = "SELECT id, name, description, price_coins, image_url, category FROM product WHERE id = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![id], |row| row_to_product(row))?;
        Ok(rows.next().transpose()?)
    }
}

fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_coins: row.get(3)?,
        image_url: row.get(4)?,
        category: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrate;

    #[test]
    fn replace_all_swaps_catalog_atomically() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate::init_db(&mut conn).unwrap();
        let dao = ProductDao::new(&conn);

        let first = vec![Product {
            id: "p1".into(),
            name: "狗粮".into(),
            description: None,
            price_coins: 100,
            image_url: None,
            category: "food".into(),
        }];
        dao.replace_all(&first).unwrap();
        assert_eq!(dao.list_all().unwrap().len(), 1);

        let second = vec![
            Product { id: "p2".into(), name: "玩具球".into(), description: None, price_coins: 30, image_url: None, category: "toy".into() },
            Product { id: "p3".into(), name: "猫砂".into(), description: None, price_coins: 60, image_url: None, category: "supply".into() },
        ];
        dao.replace_all(&second).unwrap();

        let all = dao.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(dao.get_by_id("p1").unwrap().is_none());
    }
}
