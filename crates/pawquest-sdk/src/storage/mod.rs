//! 存储模块 - 离线优先的数据持久化层
//!
//! 采用分层架构设计：
//! - StorageManager: 统一的存储管理器，提供领域 API（UI 写路径全部走这里）
//! - DAO Layer: 数据访问层，每张表一个专门的操作模块
//! - Entities: 数据实体定义，类型安全的数据传输
//!
//! Local Store 是 UI 唯一的读源（永远不直接读远端）。所有本地变更把受影响
//! 行的 `synced` 置回 false，并广播 [`StoreEvent`] 让 live query 重新读库；
//! 远端失败永远不会出现在这条读路径上。
//!
//! 存储引擎错误（磁盘满、损坏）对本层是致命的：直接向调用方传播，不做静默重试。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::{broadcast, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::error::{PawquestSDKError, Result};
use crate::events::StoreEvent;

pub mod dao;
pub mod entities;
pub mod media;
pub mod migrate;

// 重新导出核心类型
pub use dao::{DaoFactory, TransactionManager};
pub use entities::*;
pub use media::PhotoCache;

/// 数据库文件名
const DB_FILE: &str = "pawquest.db";

/// 每日默认任务模板：(标题, 种类, 金币奖励)。
/// 按 (user, pet, date) 幂等生成一次。
const DEFAULT_DAILY_TASKS: &[(&str, &str, i64)] = &[
    ("喂食", task_kind::FEED, 10),
    ("遛弯", task_kind::WALK, 20),
    ("玩耍", task_kind::PLAY, 10),
    ("梳毛", task_kind::GROOM, 15),
];

/// 存储管理器 - 统一的数据访问接口
///
/// 连接放在 tokio Mutex 后面：写路径串行化，读路径拿到的是已提交状态，
/// reconcile / pull 在网络 IO 期间不持锁。
#[derive(Debug)]
pub struct StorageManager {
    conn: Arc<Mutex<Connection>>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl StorageManager {
    /// 打开（或创建）本地库：建目录 → 开连接 → pragmas + migrations + 版本校验
    pub async fn open(base_path: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base_path)
            .await
            .map_err(|e| PawquestSDKError::IO(format!("创建数据目录失败: {}", e)))?;

        let db_path: PathBuf = base_path.join(DB_FILE);
        let mut conn = Connection::open(&db_path)
            .map_err(|e| PawquestSDKError::Database(format!("打开数据库失败: {}", e)))?;
        migrate::init_db(&mut conn)?;

        info!("💾 本地库就绪: {}", db_path.display());
        Ok(Self::from_connection(conn))
    }

    /// 内存库（测试与演示用；schema 与磁盘库一致）
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| PawquestSDKError::Database(format!("打开内存数据库失败: {}", e)))?;
        migrate::init_db(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            event_tx,
        }
    }

    /// 订阅表变更事件（UI live query 的驱动源）
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        // 没有订阅者时发送失败是正常情况
        let _ = self.event_tx.send(event);
    }

    // =========================================================================
    // 领域写路径：全部把受影响行标脏（synced=false）并广播事件
    // =========================================================================

    /// 保存宠物（新建或编辑）
    pub async fn save_pet(&self, mut pet: Pet) -> Result<Pet> {
        pet.updated_at = Utc::now().timestamp_millis();
        pet.synced = false;

        let conn = self.conn.lock().await;
        DaoFactory::pet_dao(&conn).upsert(&pet)?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::pet::TABLE, id: pet.id.clone() });
        Ok(pet)
    }

    /// 删除宠物（本地级联删除疫苗记录；远端不做删除传播）
    pub async fn delete_pet(&self, pet_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        DaoFactory::pet_dao(&conn).delete(pet_id)?;
        drop(conn);

        self.emit(StoreEvent::RowDeleted { table: dao::pet::TABLE, id: pet_id.to_string() });
        self.emit(StoreEvent::TableReplaced { table: dao::vaccine::TABLE });
        Ok(())
    }

    /// 为某宠物生成当日默认任务；该 (user, pet, date) 已生成过则什么都不做
    pub async fn generate_daily_tasks(
        &self,
        user_id: &str,
        pet_id: &str,
        task_date: &str,
    ) -> Result<Vec<DailyTask>> {
        let conn = self.conn.lock().await;
        let task_dao = DaoFactory::daily_task_dao(&conn);
        if task_dao.count_for_pet_date(user_id, pet_id, task_date)? > 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now().timestamp_millis();
        let tasks: Vec<DailyTask> = DEFAULT_DAILY_TASKS
            .iter()
            .map(|(title, kind, reward)| DailyTask {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                pet_id: Some(pet_id.to_string()),
                title: title.to_string(),
                task_kind: kind.to_string(),
                coin_reward: *reward,
                task_date: task_date.to_string(),
                completed: false,
                completed_at: None,
                created_at: now,
                updated_at: now,
                synced: false,
            })
            .collect();

        TransactionManager::new(&conn).execute(|conn| {
            let task_dao = DaoFactory::daily_task_dao(conn);
            for t in &tasks {
                task_dao.upsert(t)?;
            }
            Ok(())
        })?;
        drop(conn);

        self.emit(StoreEvent::TableReplaced { table: dao::daily_task::TABLE });
        Ok(tasks)
    }

    /// 完成任务并记入金币奖励（同一事务）。已完成的任务是幂等 no-op，不会重复发币。
    pub async fn complete_task(&self, task_id: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        let conn = self.conn.lock().await;
        let task = DaoFactory::daily_task_dao(&conn)
            .get_by_id(task_id)?
            .ok_or_else(|| PawquestSDKError::NotFound(format!("任务不存在: {}", task_id)))?;
        if task.completed {
            return Ok(());
        }

        let reward = CoinTransaction::new(
            &task.user_id,
            task.coin_reward,
            format!("task:{}", task.task_kind),
        );
        TransactionManager::new(&conn).execute(|conn| {
            DaoFactory::daily_task_dao(conn).complete(task_id, now)?;
            DaoFactory::coin_transaction_dao(conn).upsert(&reward)?;
            Ok(())
        })?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::daily_task::TABLE, id: task_id.to_string() });
        self.emit(StoreEvent::RowUpserted { table: dao::coin_transaction::TABLE, id: reward.id });
        Ok(())
    }

    /// 记一笔收入流水
    pub async fn add_coins(&self, user_id: &str, amount: i64, reason: &str) -> Result<CoinTransaction> {
        if amount <= 0 {
            return Err(PawquestSDKError::InvalidInput("收入金额必须为正".to_string()));
        }
        self.insert_transaction(CoinTransaction::new(user_id, amount, reason)).await
    }

    /// 记一笔支出流水；余额不足则拒绝
    pub async fn spend_coins(&self, user_id: &str, amount: i64, reason: &str) -> Result<CoinTransaction> {
        if amount <= 0 {
            return Err(PawquestSDKError::InvalidInput("支出金额必须为正".to_string()));
        }

        let conn = self.conn.lock().await;
        let tx_dao = DaoFactory::coin_transaction_dao(&conn);
        let balance = tx_dao.balance(user_id)?;
        if balance < amount {
            return Err(PawquestSDKError::InvalidOperation(format!(
                "余额不足: 余额 {}, 需要 {}", balance, amount
            )));
        }
        let tx = CoinTransaction::new(user_id, -amount, reason);
        tx_dao.upsert(&tx)?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::coin_transaction::TABLE, id: tx.id.clone() });
        Ok(tx)
    }

    async fn insert_transaction(&self, tx: CoinTransaction) -> Result<CoinTransaction> {
        let conn = self.conn.lock().await;
        DaoFactory::coin_transaction_dao(&conn).upsert(&tx)?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::coin_transaction::TABLE, id: tx.id.clone() });
        Ok(tx)
    }

    /// 记录一次跑步；coins_earned > 0 时同一事务内写入奖励流水
    pub async fn log_running_session(&self, mut session: RunningSession) -> Result<RunningSession> {
        session.synced = false;

        let reward = (session.coins_earned > 0).then(|| {
            CoinTransaction::new(&session.user_id, session.coins_earned, "run")
        });

        let conn = self.conn.lock().await;
        TransactionManager::new(&conn).execute(|conn| {
            DaoFactory::running_session_dao(conn).upsert(&session)?;
            if let Some(ref tx) = reward {
                DaoFactory::coin_transaction_dao(conn).upsert(tx)?;
            }
            Ok(())
        })?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::running_session::TABLE, id: session.id.clone() });
        if let Some(tx) = reward {
            self.emit(StoreEvent::RowUpserted { table: dao::coin_transaction::TABLE, id: tx.id });
        }
        Ok(session)
    }

    /// 兑换一个 code：同一用户重复兑换被拒绝；成功则同时记入金币流水
    pub async fn redeem_code(&self, user_id: &str, code: &str, coin_value: i64) -> Result<RedeemCode> {
        let now = Utc::now().timestamp_millis();
        let record = RedeemCode {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            code: code.to_string(),
            coin_value,
            redeemed_at: now,
            synced: false,
        };
        let reward = CoinTransaction::new(user_id, coin_value, format!("redeem:{}", code));

        let conn = self.conn.lock().await;
        if DaoFactory::redeem_code_dao(&conn).find_by_code(user_id, code)?.is_some() {
            return Err(PawquestSDKError::AlreadyExists(format!("兑换码已使用: {}", code)));
        }
        TransactionManager::new(&conn).execute(|conn| {
            DaoFactory::redeem_code_dao(conn).upsert(&record)?;
            DaoFactory::coin_transaction_dao(conn).upsert(&reward)?;
            Ok(())
        })?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::redeem_code::TABLE, id: record.id.clone() });
        self.emit(StoreEvent::RowUpserted { table: dao::coin_transaction::TABLE, id: reward.id });
        Ok(record)
    }

    /// 新增疫苗记录；宠物必须已存在
    pub async fn add_vaccine(&self, mut record: VaccineRecord) -> Result<VaccineRecord> {
        record.updated_at = Utc::now().timestamp_millis();
        record.synced = false;

        let conn = self.conn.lock().await;
        if DaoFactory::pet_dao(&conn).get_by_id(&record.pet_id)?.is_none() {
            return Err(PawquestSDKError::NotFound(format!("宠物不存在: {}", record.pet_id)));
        }
        DaoFactory::vaccine_dao(&conn).upsert(&record)?;
        drop(conn);

        self.emit(StoreEvent::RowUpserted { table: dao::vaccine::TABLE, id: record.id.clone() });
        Ok(record)
    }

    /// 删除疫苗记录（远端不做删除传播）
    pub async fn delete_vaccine(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        DaoFactory::vaccine_dao(&conn).delete(id)?;
        drop(conn);

        self.emit(StoreEvent::RowDeleted { table: dao::vaccine::TABLE, id: id.to_string() });
        Ok(())
    }

    // =========================================================================
    // 领域读路径（UI 只从这里读；与同步互不阻塞）
    // =========================================================================

    pub async fn list_pets(&self, user_id: &str) -> Result<Vec<Pet>> {
        let conn = self.conn.lock().await;
        DaoFactory::pet_dao(&conn).list_by_user(user_id)
    }

    pub async fn get_pet(&self, pet_id: &str) -> Result<Option<Pet>> {
        let conn = self.conn.lock().await;
        DaoFactory::pet_dao(&conn).get_by_id(pet_id)
    }

    /// 用户名下宠物数量：pullIfNeeded 的廉价本地信号
    pub async fn pet_count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        DaoFactory::pet_dao(&conn).count_by_user(user_id)
    }

    pub async fn tasks_for_date(&self, user_id: &str, task_date: &str) -> Result<Vec<DailyTask>> {
        let conn = self.conn.lock().await;
        DaoFactory::daily_task_dao(&conn).list_for_date(user_id, task_date)
    }

    pub async fn coin_balance(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        DaoFactory::coin_transaction_dao(&conn).balance(user_id)
    }

    pub async fn coin_transactions(&self, user_id: &str) -> Result<Vec<CoinTransaction>> {
        let conn = self.conn.lock().await;
        DaoFactory::coin_transaction_dao(&conn).list_by_user(user_id)
    }

    pub async fn running_sessions(&self, user_id: &str) -> Result<Vec<RunningSession>> {
        let conn = self.conn.lock().await;
        DaoFactory::running_session_dao(&conn).list_by_user(user_id)
    }

    pub async fn redeemed_codes(&self, user_id: &str) -> Result<Vec<RedeemCode>> {
        let conn = self.conn.lock().await;
        DaoFactory::redeem_code_dao(&conn).list_by_user(user_id)
    }

    pub async fn vaccines_for_pet(&self, pet_id: &str) -> Result<Vec<VaccineRecord>> {
        let conn = self.conn.lock().await;
        DaoFactory::vaccine_dao(&conn).list_by_pet(pet_id)
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        let conn = self.conn.lock().await;
        DaoFactory::product_dao(&conn).list_all()
    }

    pub async fn stores(&self) -> Result<Vec<Store>> {
        let conn = self.conn.lock().await;
        DaoFactory::store_dao(&conn).list_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_mutation_resets_synced_flag() {
        let storage = StorageManager::open_in_memory().unwrap();

        let pet = storage.save_pet(Pet::new("u1", "Rex", "dog")).await.unwrap();
        assert!(!pet.synced);

        // 模拟同步成功后再次编辑：行重新标脏
        {
            let conn_arc = storage.conn();
            let conn = conn_arc.lock().await;
            DaoFactory::pet_dao(&conn).mark_synced(&[pet.id.clone()]).unwrap();
        }
        let edited = storage.save_pet(pet).await.unwrap();
        assert!(!edited.synced);

        let stored = storage.get_pet(&edited.id).await.unwrap().unwrap();
        assert!(!stored.synced);
    }

    #[tokio::test]
    async fn complete_task_awards_coins_once() {
        let storage = StorageManager::open_in_memory().unwrap();
        let tasks = storage.generate_daily_tasks("u1", "p1", "2026-08-05").await.unwrap();
        assert_eq!(tasks.len(), DEFAULT_DAILY_TASKS.len());

        // 重复生成是 no-op
        assert!(storage.generate_daily_tasks("u1", "p1", "2026-08-05").await.unwrap().is_empty());

        let feed = tasks.iter().find(|t| t.task_kind == task_kind::FEED).unwrap();
        storage.complete_task(&feed.id).await.unwrap();
        assert_eq!(storage.coin_balance("u1").await.unwrap(), feed.coin_reward);

        // 再点一次不重复发币
        storage.complete_task(&feed.id).await.unwrap();
        assert_eq!(storage.coin_balance("u1").await.unwrap(), feed.coin_reward);
    }

    #[tokio::test]
    async fn spend_coins_rejects_overdraft() {
        let storage = StorageManager::open_in_memory().unwrap();
        storage.add_coins("u1", 50, "redeem").await.unwrap();

        let err = storage.spend_coins("u1", 100, "shop").await.unwrap_err();
        assert!(matches!(err, PawquestSDKError::InvalidOperation(_)));
        assert_eq!(storage.coin_balance("u1").await.unwrap(), 50);

        storage.spend_coins("u1", 30, "shop").await.unwrap();
        assert_eq!(storage.coin_balance("u1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn redeem_code_is_single_use_per_user() {
        let storage = StorageManager::open_in_memory().unwrap();
        storage.redeem_code("u1", "WELCOME", 100).await.unwrap();

        let err = storage.redeem_code("u1", "WELCOME", 100).await.unwrap_err();
        assert!(matches!(err, PawquestSDKError::AlreadyExists(_)));
        // 失败的兑换不产生流水
        assert_eq!(storage.coin_balance("u1").await.unwrap(), 100);

        // 另一个用户可以用同一 code
        storage.redeem_code("u2", "WELCOME", 100).await.unwrap();
    }

    #[tokio::test]
    async fn store_events_fire_on_mutation() {
        let storage = StorageManager::open_in_memory().unwrap();
        let mut rx = storage.subscribe();

        storage.save_pet(Pet::new("u1", "Rex", "dog")).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.table(), dao::pet::TABLE);
    }
}
