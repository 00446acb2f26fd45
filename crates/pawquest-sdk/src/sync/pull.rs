//! Pull Bootstrapper - 从远端整量填充 Local Store
//!
//! 两个入口：
//! - `pull_if_needed`：用「该用户本地 Pet 行数」作为廉价信号——非零直接跳过
//!   （零远端调用，本地数据视为权威）；为零才整量拉取
//! - `force_pull`：无条件整量拉取（用户手动刷新）
//!
//! 两者都是 fire-and-forget：任何远端失败只进报告与日志，调用方继续用
//! 现有本地数据（可能为空）——离线优先意味着拿不到远端数据绝不影响可用性。
//!
//! 拉取顺序固定：Pet 最先（Vaccine 依赖已落库的 pet_id 集合），目录表最后。
//! pull 落库的行一律 synced=true；宠物照片指针经 PhotoCache 解析为本地路径。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::StoreEvent;
use crate::remote::{wire, RemoteStore};
use crate::storage::dao;
use crate::storage::{DaoFactory, PhotoCache, StorageManager};
use super::{EntityOutcome, PullReport, SyncSession};

pub struct PullBootstrapper {
    storage: Arc<StorageManager>,
    remote: Arc<dyn RemoteStore>,
    photos: PhotoCache,
}

impl PullBootstrapper {
    pub fn new(storage: Arc<StorageManager>, remote: Arc<dyn RemoteStore>, photos: PhotoCache) -> Self {
        Self { storage, remote, photos }
    }

    /// 本地已有该用户数据则跳过；否则整量拉取
    pub async fn pull_if_needed(&self, session: &SyncSession) -> PullReport {
        match self.storage.pet_count(&session.user_id).await {
            Ok(0) => {}
            Ok(n) => {
                debug!("本地已有 {} 只宠物，跳过 pull (user={})", n, session.user_id);
                return PullReport::skipped();
            }
            Err(e) => {
                // 本地读失败是存储层问题，不应触发网络请求
                warn!("pull 前置检查失败，跳过: {}", e);
                return PullReport::skipped();
            }
        }
        self.full_pull(session).await
    }

    /// 无条件整量拉取（用户手动刷新）
    pub async fn force_pull(&self, session: &SyncSession) -> PullReport {
        self.full_pull(session).await
    }

    async fn full_pull(&self, session: &SyncSession) -> PullReport {
        let user_id = &session.user_id;
        let mut report = PullReport::default();

        // Pet 必须最先：后面的 Vaccine 过滤依赖本地 pet_id 集合
        report.record(dao::pet::TABLE, self.outcome(self.pull_pets(user_id).await, dao::pet::TABLE));
        report.record(
            dao::daily_task::TABLE,
            self.outcome(self.pull_daily_tasks(user_id).await, dao::daily_task::TABLE),
        );
        report.record(
            dao::coin_transaction::TABLE,
            self.outcome(self.pull_coin_transactions(user_id).await, dao::coin_transaction::TABLE),
        );
        report.record(
            dao::running_session::TABLE,
            self.outcome(self.pull_running_sessions(user_id).await, dao::running_session::TABLE),
        );
        report.record(
            dao::redeem_code::TABLE,
            self.outcome(self.pull_redeem_codes(user_id).await, dao::redeem_code::TABLE),
        );
        report.record(
            dao::vaccine::TABLE,
            self.outcome(self.pull_vaccines(user_id).await, dao::vaccine::TABLE),
        );
        // 只读目录表：整表替换
        report.record(dao::product::TABLE, self.outcome(self.refresh_products().await, dao::product::TABLE));
        report.record(dao::store::TABLE, self.outcome(self.refresh_stores().await, dao::store::TABLE));

        info!(
            "⬇️ pull 结束 (user={}): 落库 {} 行, 成功={}",
            user_id,
            report.pulled_total(),
            report.is_success()
        );
        report
    }

    fn outcome(&self, result: Result<usize>, target: &'static str) -> EntityOutcome {
        match result {
            Ok(n) => EntityOutcome::Pulled(n),
            Err(e) => {
                warn!("⬇️ {} 拉取失败，保留现有本地数据: {}", target, e);
                EntityOutcome::Failed(e.to_string())
            }
        }
    }

    async fn pull_pets(&self, user_id: &str) -> Result<usize> {
        let rows = self.remote.list_pets(user_id).await?;
        let count = rows.len();

        // 先解析照片（网络 IO，不持库锁），再统一落库
        let mut pets = Vec::with_capacity(count);
        for w in &rows {
            let mut pet = wire::pet_from_wire(w);
            pet.photo_path = self.photos.resolve(&pet.id, w.photo_url.as_deref()).await;
            pets.push(pet);
        }

        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        let pet_dao = DaoFactory::pet_dao(&conn);
        for pet in &pets {
            pet_dao.upsert(pet)?;
        }
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::pet::TABLE });
        Ok(count)
    }

    async fn pull_daily_tasks(&self, user_id: &str) -> Result<usize> {
        let rows = self.remote.list_daily_tasks(user_id).await?;
        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        let task_dao = DaoFactory::daily_task_dao(&conn);
        for w in &rows {
            task_dao.upsert(&wire::daily_task_from_wire(w))?;
        }
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::daily_task::TABLE });
        Ok(rows.len())
    }

    async fn pull_coin_transactions(&self, user_id: &str) -> Result<usize> {
        let rows = self.remote.list_coin_transactions(user_id).await?;
        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        let tx_dao = DaoFactory::coin_transaction_dao(&conn);
        for w in &rows {
            tx_dao.upsert(&wire::coin_transaction_from_wire(w))?;
        }
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::coin_transaction::TABLE });
        Ok(rows.len())
    }

    async fn pull_running_sessions(&self, user_id: &str) -> Result<usize> {
        let rows = self.remote.list_running_sessions(user_id).await?;
        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        let run_dao = DaoFactory::running_session_dao(&conn);
        for w in &rows {
            run_dao.upsert(&wire::running_session_from_wire(w))?;
        }
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::running_session::TABLE });
        Ok(rows.len())
    }

    async fn pull_redeem_codes(&self, user_id: &str) -> Result<usize> {
        let rows = self.remote.list_redeem_codes(user_id).await?;
        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        let redeem_dao = DaoFactory::redeem_code_dao(&conn);
        for w in &rows {
            redeem_dao.upsert(&wire::redeem_code_from_wire(w))?;
        }
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::redeem_code::TABLE });
        Ok(rows.len())
    }

    /// 疫苗按用户拥有的 pet_id 集合过滤（疫苗挂在 pet 下，不直接挂 user）。
    /// 用本地 pet_id：Pet 阶段刚落库的数据 + 既有本地宠物都覆盖到。
    async fn pull_vaccines(&self, user_id: &str) -> Result<usize> {
        let conn_arc = self.storage.conn();
        let pet_ids = {
            let conn = conn_arc.lock().await;
            DaoFactory::pet_dao(&conn).list_ids_by_user(user_id)?
        };
        let rows = self.remote.list_vaccines(&pet_ids).await?;

        let conn = conn_arc.lock().await;
        let vaccine_dao = DaoFactory::vaccine_dao(&conn);
        for w in &rows {
            vaccine_dao.upsert(&wire::vaccine_from_wire(w))?;
        }
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::vaccine::TABLE });
        Ok(rows.len())
    }

    async fn refresh_products(&self) -> Result<usize> {
        let rows = self.remote.list_products().await?;
        let products: Vec<_> = rows.iter().map(wire::product_from_wire).collect();

        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        DaoFactory::product_dao(&conn).replace_all(&products)?;
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::product::TABLE });
        Ok(products.len())
    }

    async fn refresh_stores(&self) -> Result<usize> {
        let rows = self.remote.list_stores().await?;
        let stores: Vec<_> = rows.iter().map(wire::store_from_wire).collect();

        let conn_arc = self.storage.conn();
        let conn = conn_arc.lock().await;
        DaoFactory::store_dao(&conn).replace_all(&stores)?;
        drop(conn);

        self.storage.emit(StoreEvent::TableReplaced { table: dao::store::TABLE });
        Ok(stores.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{collections, MemoryRemoteStore};
    use crate::remote::wire::*;
    use crate::storage::entities::{Pet, VaccineRecord};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<StorageManager>, Arc<MemoryRemoteStore>, PullBootstrapper) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemoteStore::new());
        let photos = PhotoCache::new(dir.path().join("photos"));
        let bootstrapper = PullBootstrapper::new(storage.clone(), remote.clone(), photos);
        (dir, storage, remote, bootstrapper)
    }

    async fn seed_remote_pet(remote: &MemoryRemoteStore, id: &str, owner: &str, name: &str) {
        let mut pet = Pet::new(owner, name, "dog");
        pet.id = id.to_string();
        pet.synced = true;
        remote.upsert_pet(&pet_to_wire(&pet)).await.unwrap();
    }

    #[tokio::test]
    async fn pull_is_skipped_when_local_data_exists() {
        let (_dir, storage, remote, bootstrapper) = setup();
        storage.save_pet(Pet::new("u1", "Rex", "dog")).await.unwrap();

        let report = bootstrapper.pull_if_needed(&SyncSession::new("u1")).await;
        assert!(report.skipped);
        // 本地非空 → 零远端调用
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn pull_seeds_every_row_as_synced() {
        let (_dir, storage, remote, bootstrapper) = setup();
        seed_remote_pet(&remote, "p1", "u1", "Rex").await;

        // 本地行的 synced 不上 wire；pull 落库必须强制 synced=true
        let task = crate::storage::entities::DailyTask {
            id: "t1".into(),
            user_id: "u1".into(),
            pet_id: Some("p1".into()),
            title: "遛弯".into(),
            task_kind: "walk".into(),
            coin_reward: 20,
            task_date: "2026-08-05".into(),
            completed: false,
            completed_at: None,
            created_at: 1,
            updated_at: 1,
            synced: false,
        };
        remote.upsert_daily_task(&daily_task_to_wire(&task)).await.unwrap();

        let report = bootstrapper.pull_if_needed(&SyncSession::new("u1")).await;
        assert!(!report.skipped);
        assert!(report.is_success());

        let pet = storage.get_pet("p1").await.unwrap().unwrap();
        assert!(pet.synced);
        let tasks = storage.tasks_for_date("u1", "2026-08-05").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].synced);
    }

    #[tokio::test]
    async fn unreachable_photo_url_yields_null_photo() {
        let (_dir, storage, remote, bootstrapper) = setup();
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        pet.photo_path = Some("http://127.0.0.1:1/rex.jpg".to_string());
        pet.synced = true;
        remote.upsert_pet(&pet_to_wire(&pet)).await.unwrap();

        let report = bootstrapper.pull_if_needed(&SyncSession::new("u1")).await;
        // 照片失败不影响宠物行本身
        assert_eq!(report.outcome_for("pet"), Some(&EntityOutcome::Pulled(1)));

        let stored = storage.get_pet("p1").await.unwrap().unwrap();
        assert_eq!(stored.photo_path, None);
        assert_eq!(stored.name, "Rex");
        assert!(stored.synced);
    }

    #[tokio::test]
    async fn vaccines_are_filtered_by_owned_pet_ids() {
        let (_dir, storage, remote, bootstrapper) = setup();
        seed_remote_pet(&remote, "p1", "u1", "Rex").await;
        seed_remote_pet(&remote, "px", "other-user", "Stray").await;

        let mut mine = VaccineRecord::new("p1", "rabies", 1_690_000_000_000);
        mine.synced = true;
        let mut theirs = VaccineRecord::new("px", "rabies", 1_690_000_000_000);
        theirs.synced = true;
        remote.upsert_vaccine(&vaccine_to_wire(&mine)).await.unwrap();
        remote.upsert_vaccine(&vaccine_to_wire(&theirs)).await.unwrap();

        bootstrapper.pull_if_needed(&SyncSession::new("u1")).await;

        // 只拉取自己宠物的疫苗
        let vaccines = storage.vaccines_for_pet("p1").await.unwrap();
        assert_eq!(vaccines.len(), 1);
        assert_eq!(vaccines[0].id, mine.id);
        assert_eq!(storage.pet_count("other-user").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_kind_does_not_abort_the_rest_of_the_pull() {
        let (_dir, storage, remote, bootstrapper) = setup();
        seed_remote_pet(&remote, "p1", "u1", "Rex").await;
        remote.fail_collection(collections::DAILY_TASKS);

        let report = bootstrapper.pull_if_needed(&SyncSession::new("u1")).await;
        assert!(!report.is_success());
        assert!(matches!(report.outcome_for("daily_task"), Some(EntityOutcome::Failed(_))));
        // Pet 照常落库
        assert_eq!(report.outcome_for("pet"), Some(&EntityOutcome::Pulled(1)));
        assert!(storage.get_pet("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn force_pull_overwrites_local_rows_last_write_wins() {
        let (_dir, storage, remote, bootstrapper) = setup();

        // 本地有一条未推送的编辑；远端同 id 行内容不同
        let mut local = Pet::new("u1", "Local Edit", "dog");
        local.id = "p1".to_string();
        storage.save_pet(local).await.unwrap();
        seed_remote_pet(&remote, "p1", "u1", "Remote Truth").await;

        // pullIfNeeded 会跳过；forcePull 物理覆盖本地行（LWW，本地编辑丢失）
        let report = bootstrapper.force_pull(&SyncSession::new("u1")).await;
        assert!(!report.skipped);

        let stored = storage.get_pet("p1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Remote Truth");
        assert!(stored.synced);
    }

    #[tokio::test]
    async fn catalog_tables_are_replaced_wholesale() {
        let (_dir, storage, remote, bootstrapper) = setup();
        remote.seed(
            collections::PRODUCTS,
            "prod1",
            &ProductWire {
                id: "prod1".into(),
                name: "狗粮".into(),
                description: None,
                price_coins: 100,
                image_url: None,
                category: "food".into(),
            },
        );
        remote.seed(
            collections::STORES,
            "s1",
            &StoreWire {
                id: "s1".into(),
                name: "宠物之家".into(),
                address: "中山路 1 号".into(),
                latitude: 31.23,
                longitude: 121.47,
            },
        );

        bootstrapper.force_pull(&SyncSession::new("u1")).await;

        assert_eq!(storage.products().await.unwrap().len(), 1);
        assert_eq!(storage.stores().await.unwrap().len(), 1);
    }
}
