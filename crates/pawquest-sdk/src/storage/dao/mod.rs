//! 数据访问层 (DAO) - 每张表一个专门的操作模块
//!
//! 这里封装了所有数据库操作，确保：
//! - 数据操作的一致性和封装性
//! - 复杂业务逻辑的统一管理
//! - 未来 schema 升级的兼容性
//!
//! 可同步表的三个同步相关查询是 Push Reconciler 的唯一依赖：
//! - `upsert`：按 id insert-or-replace（本地与远端同一套幂等语义）
//! - `list_unsynced`：快照所有 synced=0 的行，按 id 排序
//! - `mark_synced`：远端确认成功后按 id 列表批量置 synced=1

pub mod pet;
pub mod daily_task;
pub mod coin_transaction;
pub mod running_session;
pub mod redeem_code;
pub mod vaccine;
pub mod product;
pub mod store;

// 重新导出核心 DAO 类型
pub use pet::PetDao;
pub use daily_task::DailyTaskDao;
pub use coin_transaction::CoinTransactionDao;
pub use running_session::RunningSessionDao;
pub use redeem_code::RedeemCodeDao;
pub use vaccine::VaccineDao;
pub use product::ProductDao;
pub use store::StoreDao;

use rusqlite::Connection;
use crate::error::Result;

/// DAO 工厂 - 统一创建各种 DAO 实例
pub struct DaoFactory;

impl DaoFactory {
    pub fn pet_dao(conn: &Connection) -> PetDao<'_> {
        PetDao::new(conn)
    }

    pub fn daily_task_dao(conn: &Connection) -> DailyTaskDao<'_> {
        DailyTaskDao::new(conn)
    }

    pub fn coin_transaction_dao(conn: &Connection) -> CoinTransactionDao<'_> {
        CoinTransactionDao::new(conn)
    }

    pub fn running_session_dao(conn: &Connection) -> RunningSessionDao<'_> {
        RunningSessionDao::new(conn)
    }

    pub fn redeem_code_dao(conn: &Connection) -> RedeemCodeDao<'_> {
        RedeemCodeDao::new(conn)
    }

    pub fn vaccine_dao(conn: &Connection) -> VaccineDao<'_> {
        VaccineDao::new(conn)
    }

    pub fn product_dao(conn: &Connection) -> ProductDao<'_> {
        ProductDao::new(conn)
    }

    pub fn store_dao(conn: &Connection) -> StoreDao<'_> {
        StoreDao::new(conn)
    }
}

/// 事务管理器 - 统一管理跨表操作的事务
///
/// 用于「完成任务 + 记金币流水」这类必须一起落库的写入，
/// 以及目录表的 clear/insert 整表替换（避免出现可见的空表窗口）。
pub struct TransactionManager<'a> {
    conn: &'a Connection,
}

impl<'a> TransactionManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 执行事务操作
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let tx = self.conn.unchecked_transaction()
            .map_err(|e| crate::error::PawquestSDKError::Database(format!("开始事务失败: {}", e)))?;

        let result = f(self.conn)?;

        tx.commit()
            .map_err(|e| crate::error::PawquestSDKError::Database(format!("提交事务失败: {}", e)))?;

        Ok(result)
    }
}
