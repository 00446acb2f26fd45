//! PawQuest SDK 门面 - 宿主 App 的统一入口
//!
//! 职责：
//! - 初始化并持有三个核心组件：Local Store、远端实现、同步调度器
//! - 会话生命周期：login（设会话 + pullIfNeeded + 即时同步）/ logout
//! - 领域写操作：落 Local Store 并标脏，然后请求一轮即时 reconcile
//! - 读操作直通 Local Store（UI 永远不读远端）
//!
//! 同步失败不会从任何领域方法冒出来；关心同步健康度的宿主订阅
//! `subscribe_sync_events()`。

use std::path::PathBuf;
use std::sync::Arc;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use crate::error::{PawquestSDKError, Result};
use crate::events::{StoreEvent, SyncEvent};
use crate::network::NetworkMonitor;
use crate::remote::{HttpRemoteStore, RemoteStore};
use crate::storage::{
    CoinTransaction, DailyTask, Pet, PhotoCache, Product, RedeemCode, RunningSession, StorageManager,
    Store, VaccineRecord,
};
use crate::sync::{
    PullBootstrapper, PushReconciler, SchedulerConfig, SyncHandle, SyncScheduler, SyncSession,
};

/// SDK 配置
#[derive(Debug, Clone)]
pub struct PawquestConfig {
    /// 本地数据目录（数据库 + 照片缓存）
    pub data_dir: PathBuf,
    /// 远端 REST base URL；用 `initialize_with_remote` 注入自定义远端时可空
    pub remote_url: Option<String>,
    /// 远端 API key（可选）
    pub api_key: Option<String>,
    /// 调度配置（间隔/重试/退避）
    pub scheduler: SchedulerConfig,
}

impl PawquestConfig {
    pub fn builder() -> PawquestConfigBuilder {
        PawquestConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct PawquestConfigBuilder {
    data_dir: Option<PathBuf>,
    remote_url: Option<String>,
    api_key: Option<String>,
    scheduler: Option<SchedulerConfig>,
}

impl PawquestConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = Some(config);
        self
    }

    pub fn build(self) -> PawquestConfig {
        PawquestConfig {
            data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from("./pawquest-data")),
            remote_url: self.remote_url,
            api_key: self.api_key,
            scheduler: self.scheduler.unwrap_or_default(),
        }
    }
}

/// PawQuest SDK
pub struct PawquestSDK {
    storage: Arc<StorageManager>,
    network: Arc<NetworkMonitor>,
    sync: SyncHandle,
}

impl std::fmt::Debug for PawquestSDK {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PawquestSDK").finish_non_exhaustive()
    }
}

impl PawquestSDK {
    /// 初始化：HTTP 远端（生产路径）。`remote_url` 必填。
    pub async fn initialize(config: PawquestConfig) -> Result<Self> {
        let url = config.remote_url.clone().ok_or_else(|| {
            PawquestSDKError::NotInitialized("缺少 remote_url；或改用 initialize_with_remote".to_string())
        })?;
        let remote = Arc::new(HttpRemoteStore::new(url, config.api_key.clone()));
        Self::initialize_with_remote(config, remote).await
    }

    /// 初始化：注入自定义远端实现（测试 / 演示 / 自建后端）
    pub async fn initialize_with_remote(
        config: PawquestConfig,
        remote: Arc<dyn RemoteStore>,
    ) -> Result<Self> {
        let storage = Arc::new(StorageManager::open(&config.data_dir).await?);
        let network = Arc::new(NetworkMonitor::new());
        let photos = PhotoCache::new(config.data_dir.join("photos"));

        let scheduler = SyncScheduler::new(
            PushReconciler::new(storage.clone(), remote.clone()),
            PullBootstrapper::new(storage.clone(), remote, photos),
            network.clone(),
            config.scheduler.clone(),
        );
        let sync = scheduler.start();
        // 启动即请求一轮（无会话时是 no-op，登录后自然补上）
        sync.request_sync();

        info!("🐾 PawQuest SDK 初始化完成，数据目录: {}", config.data_dir.display());
        Ok(Self { storage, network, sync })
    }

    // =========================================================================
    // 会话生命周期
    // =========================================================================

    /// 登录成功后调用：设置同步会话，本地为空则从远端拉取，并请求一轮即时同步
    pub async fn login(&self, user_id: &str) -> Result<()> {
        self.sync.set_session(SyncSession::new(user_id)).await;
        self.sync.request_pull(false);
        self.sync.request_sync();
        info!("👤 会话开始: {}", user_id);
        Ok(())
    }

    /// 登出：丢弃会话；本地数据保留
    pub async fn logout(&self) {
        self.sync.clear_session().await;
        info!("👤 会话结束");
    }

    /// 用户手动刷新：无条件整量拉取
    pub fn force_refresh(&self) {
        self.sync.request_pull(true);
    }

    /// 关闭 SDK（停调度器）
    pub async fn shutdown(self) {
        self.sync.shutdown().await;
        info!("🐾 PawQuest SDK 已关闭");
    }

    // =========================================================================
    // 领域写操作：落库标脏 + 请求即时同步
    // =========================================================================

    pub async fn save_pet(&self, pet: Pet) -> Result<Pet> {
        let pet = self.storage.save_pet(pet).await?;
        self.sync.request_sync();
        Ok(pet)
    }

    pub async fn delete_pet(&self, pet_id: &str) -> Result<()> {
        self.storage.delete_pet(pet_id).await?;
        self.sync.request_sync();
        Ok(())
    }

    pub async fn generate_daily_tasks(&self, user_id: &str, pet_id: &str, task_date: &str) -> Result<Vec<DailyTask>> {
        let tasks = self.storage.generate_daily_tasks(user_id, pet_id, task_date).await?;
        if !tasks.is_empty() {
            self.sync.request_sync();
        }
        Ok(tasks)
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<()> {
        self.storage.complete_task(task_id).await?;
        self.sync.request_sync();
        Ok(())
    }

    pub async fn add_coins(&self, user_id: &str, amount: i64, reason: &str) -> Result<CoinTransaction> {
        let tx = self.storage.add_coins(user_id, amount, reason).await?;
        self.sync.request_sync();
        Ok(tx)
    }

    pub async fn spend_coins(&self, user_id: &str, amount: i64, reason: &str) -> Result<CoinTransaction> {
        let tx = self.storage.spend_coins(user_id, amount, reason).await?;
        self.sync.request_sync();
        Ok(tx)
    }

    pub async fn log_running_session(&self, session: RunningSession) -> Result<RunningSession> {
        let session = self.storage.log_running_session(session).await?;
        self.sync.request_sync();
        Ok(session)
    }

    pub async fn redeem_code(&self, user_id: &str, code: &str, coin_value: i64) -> Result<RedeemCode> {
        let record = self.storage.redeem_code(user_id, code, coin_value).await?;
        self.sync.request_sync();
        Ok(record)
    }

    pub async fn add_vaccine(&self, record: VaccineRecord) -> Result<VaccineRecord> {
        let record = self.storage.add_vaccine(record).await?;
        self.sync.request_sync();
        Ok(record)
    }

    pub async fn delete_vaccine(&self, id: &str) -> Result<()> {
        self.storage.delete_vaccine(id).await?;
        self.sync.request_sync();
        Ok(())
    }

    // =========================================================================
    // 读路径（直通 Local Store）与订阅
    // =========================================================================

    pub async fn pets(&self, user_id: &str) -> Result<Vec<Pet>> {
        self.storage.list_pets(user_id).await
    }

    pub async fn pet(&self, pet_id: &str) -> Result<Option<Pet>> {
        self.storage.get_pet(pet_id).await
    }

    pub async fn tasks_for_date(&self, user_id: &str, task_date: &str) -> Result<Vec<DailyTask>> {
        self.storage.tasks_for_date(user_id, task_date).await
    }

    pub async fn coin_balance(&self, user_id: &str) -> Result<i64> {
        self.storage.coin_balance(user_id).await
    }

    pub async fn coin_transactions(&self, user_id: &str) -> Result<Vec<CoinTransaction>> {
        self.storage.coin_transactions(user_id).await
    }

    pub async fn running_sessions(&self, user_id: &str) -> Result<Vec<RunningSession>> {
        self.storage.running_sessions(user_id).await
    }

    pub async fn redeemed_codes(&self, user_id: &str) -> Result<Vec<RedeemCode>> {
        self.storage.redeemed_codes(user_id).await
    }

    pub async fn vaccines_for_pet(&self, pet_id: &str) -> Result<Vec<VaccineRecord>> {
        self.storage.vaccines_for_pet(pet_id).await
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        self.storage.products().await
    }

    pub async fn stores(&self) -> Result<Vec<Store>> {
        self.storage.stores().await
    }

    /// 订阅表变更事件（UI live query 驱动源）
    pub fn subscribe_store_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.storage.subscribe()
    }

    /// 订阅同步结果事件
    pub fn subscribe_sync_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.subscribe()
    }

    /// 网络监控器：宿主在平台网络回调里 `set_status` 推状态
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }
}

/// 今天的任务日期（UTC，"YYYY-MM-DD"）
pub fn today_date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{collections, MemoryRemoteStore};
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_config(dir: &TempDir) -> PawquestConfig {
        PawquestConfig::builder()
            .data_dir(dir.path())
            .scheduler(SchedulerConfig {
                interval: Duration::from_secs(3600),
                max_attempts: 3,
                base_backoff: Duration::from_millis(10),
                jitter_factor: 0.0,
            })
            .build()
    }

    /// 等到一轮真正推送了 min_pushed 行的 reconcile
    /// （login 也会触发一轮，可能在写入前完成、推送 0 行——跳过它）
    async fn wait_push(rx: &mut broadcast::Receiver<SyncEvent>, min_pushed: usize) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("等待同步事件超时")
                .expect("事件通道关闭");
            match event {
                SyncEvent::ReconcileCompleted(report) if report.pushed_total() >= min_pushed => return,
                SyncEvent::ReconcileFailed(report) => panic!("reconcile 失败: {:?}", report),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn end_to_end_mutation_reaches_remote() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let sdk = PawquestSDK::initialize_with_remote(fast_config(&dir), remote.clone())
            .await
            .unwrap();
        let mut events = sdk.subscribe_sync_events();

        sdk.login("u1").await.unwrap();
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        sdk.save_pet(pet).await.unwrap();

        wait_push(&mut events, 1).await;
        assert_eq!(remote.rows_in(collections::PETS), 1);
        assert!(sdk.pet("p1").await.unwrap().unwrap().synced);

        sdk.shutdown().await;
    }

    #[tokio::test]
    async fn login_pulls_remote_data_into_empty_store() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        pet.synced = true;
        remote.seed(collections::PETS, "p1", &crate::remote::wire::pet_to_wire(&pet));

        let sdk = PawquestSDK::initialize_with_remote(fast_config(&dir), remote.clone())
            .await
            .unwrap();
        let mut events = sdk.subscribe_sync_events();
        sdk.login("u1").await.unwrap();

        // login 的 pull 先于 reconcile 入队
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("等待同步事件超时")
                .expect("事件通道关闭");
            if let SyncEvent::PullCompleted(report) = event {
                assert!(!report.skipped);
                break;
            }
        }
        assert_eq!(sdk.pets("u1").await.unwrap().len(), 1);

        sdk.shutdown().await;
    }

    #[tokio::test]
    async fn initialize_without_remote_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = PawquestConfig::builder().data_dir(dir.path()).build();
        let err = PawquestSDK::initialize(config).await.unwrap_err();
        assert!(matches!(err, PawquestSDKError::NotInitialized(_)));
    }
}
