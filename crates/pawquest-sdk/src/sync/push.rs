//! Push Reconciler - 本地脏行排空
//!
//! 每轮按 [`EntityKind::ALL`] 的固定顺序处理，每个实体类型独立：
//! 1. 快照 `list_unsynced`（为空则零远端调用，直接跳过）
//! 2. 逐行映射为 wire 表示，按 entity-id 顺序一行一请求 upsert（远端按 id
//!    幂等，重放安全）
//! 3. 整批全部成功才对快照里的 id 批量 `mark_synced`；任何一行失败则本类型
//!    整批保持脏状态，留待下轮（批内不做行级部分确认）
//! 4. 单个类型失败记入报告并继续处理后续类型
//!
//! ## NOTE: Reconciler 不做重试
//!
//! PushReconciler does not retry. All retry / backoff / lifecycle policies
//! live in SyncScheduler. 快照期间之后发生的本地变更可能不在本轮快照里，
//! 下轮自然覆盖。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::remote::{wire, RemoteStore};
use crate::storage::{DaoFactory, StorageManager};
use super::{EntityKind, EntityOutcome, ReconcileReport, SyncSession};

pub struct PushReconciler {
    storage: Arc<StorageManager>,
    remote: Arc<dyn RemoteStore>,
}

impl PushReconciler {
    pub fn new(storage: Arc<StorageManager>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { storage, remote }
    }

    /// 跑一轮完整 reconcile，返回每个实体类型的结果汇总。
    /// 远端失败不会让本函数返回错误——失败进报告，由调度器决定重试。
    pub async fn run_pass(&self, session: &SyncSession) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for &kind in EntityKind::ALL {
            let outcome = match self.push_kind(kind).await {
                Ok(0) => EntityOutcome::Clean,
                Ok(n) => {
                    info!("⬆️ {} 推送完成: {} 行", kind, n);
                    EntityOutcome::Pushed(n)
                }
                Err(e) => {
                    warn!("⬆️ {} 推送失败，整批保持脏状态: {}", kind, e);
                    EntityOutcome::Failed(e.to_string())
                }
            };
            report.record(kind, outcome);
        }
        debug!(
            "reconcile 一轮结束 (user={}): 推送 {} 行, 成功={}",
            session.user_id,
            report.pushed_total(),
            report.is_success()
        );
        report
    }

    async fn push_kind(&self, kind: EntityKind) -> crate::error::Result<usize> {
        match kind {
            EntityKind::Pet => self.push_pets().await,
            EntityKind::DailyTask => self.push_daily_tasks().await,
            EntityKind::CoinTransaction => self.push_coin_transactions().await,
            EntityKind::RunningSession => self.push_running_sessions().await,
            EntityKind::RedeemCode => self.push_redeem_codes().await,
            EntityKind::Vaccine => self.push_vaccines().await,
        }
    }

    // 每个实体类型一个推送函数：快照（持锁）→ 逐行 upsert（不持锁）→
    // 批量 mark_synced（持锁）。字段映射见 remote::wire。

    async fn push_pets(&self) -> crate::error::Result<usize> {
        let conn_arc = self.storage.conn();
        let rows = {
            let conn = conn_arc.lock().await;
            DaoFactory::pet_dao(&conn).list_unsynced()?
        };
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.remote.upsert_pet(&wire::pet_to_wire(row)).await?;
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let conn = conn_arc.lock().await;
        DaoFactory::pet_dao(&conn).mark_synced(&ids)?;
        Ok(rows.len())
    }

    async fn push_daily_tasks(&self) -> crate::error::Result<usize> {
        let conn_arc = self.storage.conn();
        let rows = {
            let conn = conn_arc.lock().await;
            DaoFactory::daily_task_dao(&conn).list_unsynced()?
        };
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.remote.upsert_daily_task(&wire::daily_task_to_wire(row)).await?;
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let conn = conn_arc.lock().await;
        DaoFactory::daily_task_dao(&conn).mark_synced(&ids)?;
        Ok(rows.len())
    }

    async fn push_coin_transactions(&self) -> crate::error::Result<usize> {
        let conn_arc = self.storage.conn();
        let rows = {
            let conn = conn_arc.lock().await;
            DaoFactory::coin_transaction_dao(&conn).list_unsynced()?
        };
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.remote
                .upsert_coin_transaction(&wire::coin_transaction_to_wire(row))
                .await?;
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let conn = conn_arc.lock().await;
        DaoFactory::coin_transaction_dao(&conn).mark_synced(&ids)?;
        Ok(rows.len())
    }

    async fn push_running_sessions(&self) -> crate::error::Result<usize> {
        let conn_arc = self.storage.conn();
        let rows = {
            let conn = conn_arc.lock().await;
            DaoFactory::running_session_dao(&conn).list_unsynced()?
        };
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.remote
                .upsert_running_session(&wire::running_session_to_wire(row))
                .await?;
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let conn = conn_arc.lock().await;
        DaoFactory::running_session_dao(&conn).mark_synced(&ids)?;
        Ok(rows.len())
    }

    async fn push_redeem_codes(&self) -> crate::error::Result<usize> {
        let conn_arc = self.storage.conn();
        let rows = {
            let conn = conn_arc.lock().await;
            DaoFactory::redeem_code_dao(&conn).list_unsynced()?
        };
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.remote.upsert_redeem_code(&wire::redeem_code_to_wire(row)).await?;
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let conn = conn_arc.lock().await;
        DaoFactory::redeem_code_dao(&conn).mark_synced(&ids)?;
        Ok(rows.len())
    }

    async fn push_vaccines(&self) -> crate::error::Result<usize> {
        let conn_arc = self.storage.conn();
        let rows = {
            let conn = conn_arc.lock().await;
            DaoFactory::vaccine_dao(&conn).list_unsynced()?
        };
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            self.remote.upsert_vaccine(&wire::vaccine_to_wire(row)).await?;
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let conn = conn_arc.lock().await;
        DaoFactory::vaccine_dao(&conn).mark_synced(&ids)?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{collections, MemoryRemoteStore};
    use crate::storage::entities::Pet;

    fn setup() -> (Arc<StorageManager>, Arc<MemoryRemoteStore>, PushReconciler) {
        let storage = Arc::new(StorageManager::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemoteStore::new());
        let reconciler = PushReconciler::new(storage.clone(), remote.clone());
        (storage, remote, reconciler)
    }

    #[tokio::test]
    async fn no_remote_calls_when_everything_is_clean() {
        let (_storage, remote, reconciler) = setup();
        let report = reconciler.run_pass(&SyncSession::new("u1")).await;

        assert!(report.is_success());
        assert_eq!(report.pushed_total(), 0);
        // 六个实体类型全是 Clean，远端一个请求都不该发
        assert_eq!(remote.call_count(), 0);
        for (_, outcome) in &report.outcomes {
            assert_eq!(*outcome, EntityOutcome::Clean);
        }
    }

    #[tokio::test]
    async fn dirty_pet_becomes_clean_and_lands_on_remote() {
        let (storage, remote, reconciler) = setup();

        // 本地行 {id: p1, name: Rex, synced: false}
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        let pet = storage.save_pet(pet).await.unwrap();
        assert!(!pet.synced);

        let report = reconciler.run_pass(&SyncSession::new("u1")).await;
        assert_eq!(report.outcome_for(EntityKind::Pet), Some(&EntityOutcome::Pushed(1)));

        // 本地翻成 synced=true
        assert!(storage.get_pet("p1").await.unwrap().unwrap().synced);
        // 远端恰好一行，键为 p1，name 为 Rex
        assert_eq!(remote.rows_in(collections::PETS), 1);
        let row = remote.get_row(collections::PETS, "p1").unwrap();
        assert_eq!(row.get("name").unwrap(), "Rex");
        assert_eq!(row.get("owner_id").unwrap(), "u1");
    }

    #[tokio::test]
    async fn replayed_push_does_not_duplicate_remote_rows() {
        let (storage, remote, reconciler) = setup();
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        storage.save_pet(pet).await.unwrap();

        reconciler.run_pass(&SyncSession::new("u1")).await;

        // 模拟 ack 丢失：远端已有行，但本地标记被回滚，整批重推
        {
            let conn_arc = storage.conn();
            let conn = conn_arc.lock().await;
            conn.execute("UPDATE pet SET synced = 0 WHERE id = 'p1'", []).unwrap();
        }
        let report = reconciler.run_pass(&SyncSession::new("u1")).await;

        assert_eq!(report.outcome_for(EntityKind::Pet), Some(&EntityOutcome::Pushed(1)));
        // upsert-by-id：N 次重放后远端仍是一行
        assert_eq!(remote.rows_in(collections::PETS), 1);
    }

    #[tokio::test]
    async fn one_failing_kind_does_not_block_the_others() {
        let (storage, remote, reconciler) = setup();

        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        storage.save_pet(pet).await.unwrap();
        storage.generate_daily_tasks("u1", "p1", "2026-08-05").await.unwrap();

        remote.fail_collection(collections::PETS);
        let report = reconciler.run_pass(&SyncSession::new("u1")).await;

        // Pet 失败、DailyTask 成功，互不影响
        assert!(matches!(
            report.outcome_for(EntityKind::Pet),
            Some(EntityOutcome::Failed(_))
        ));
        assert!(matches!(
            report.outcome_for(EntityKind::DailyTask),
            Some(EntityOutcome::Pushed(_))
        ));
        assert!(!report.is_success());

        // Pet 仍是脏行，DailyTask 全部翻成 synced=true
        assert!(!storage.get_pet("p1").await.unwrap().unwrap().synced);
        let tasks = storage.tasks_for_date("u1", "2026-08-05").await.unwrap();
        assert!(tasks.iter().all(|t| t.synced));

        // 故障恢复后，下一轮把遗留的脏行补上
        remote.clear_failure(collections::PETS);
        let report = reconciler.run_pass(&SyncSession::new("u1")).await;
        assert_eq!(report.outcome_for(EntityKind::Pet), Some(&EntityOutcome::Pushed(1)));
        assert!(storage.get_pet("p1").await.unwrap().unwrap().synced);
    }

    #[tokio::test]
    async fn partial_row_failure_gives_no_partial_credit() {
        let (storage, remote, reconciler) = setup();

        // 两行脏数据，第二行（按 id 序）注入失败
        let mut a = Pet::new("u1", "Aka", "dog");
        a.id = "pa".to_string();
        let mut b = Pet::new("u1", "Buck", "dog");
        b.id = "pb".to_string();
        storage.save_pet(a).await.unwrap();
        storage.save_pet(b).await.unwrap();
        remote.fail_row(collections::PETS, "pb");

        let report = reconciler.run_pass(&SyncSession::new("u1")).await;
        assert!(matches!(
            report.outcome_for(EntityKind::Pet),
            Some(EntityOutcome::Failed(_))
        ));

        // pa 已经落到远端（请求顺序在前），但 mark_synced 整批跳过：两行都还是脏的
        assert_eq!(remote.rows_in(collections::PETS), 1);
        assert!(!storage.get_pet("pa").await.unwrap().unwrap().synced);
        assert!(!storage.get_pet("pb").await.unwrap().unwrap().synced);

        // 下一轮整批重推（pa 重放幂等）
        remote.clear_row_failure(collections::PETS, "pb");
        let report = reconciler.run_pass(&SyncSession::new("u1")).await;
        assert_eq!(report.outcome_for(EntityKind::Pet), Some(&EntityOutcome::Pushed(2)));
        assert_eq!(remote.rows_in(collections::PETS), 2);
    }

    #[tokio::test]
    async fn mutation_during_pass_is_picked_up_next_pass() {
        let (storage, remote, reconciler) = setup();
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        let pet = storage.save_pet(pet).await.unwrap();

        reconciler.run_pass(&SyncSession::new("u1")).await;

        // 两轮之间的本地编辑重新标脏，下一轮覆盖远端
        let mut edited = pet;
        edited.name = "Rexy".to_string();
        storage.save_pet(edited).await.unwrap();

        reconciler.run_pass(&SyncSession::new("u1")).await;
        let row = remote.get_row(collections::PETS, "p1").unwrap();
        assert_eq!(row.get("name").unwrap(), "Rexy");
    }
}
