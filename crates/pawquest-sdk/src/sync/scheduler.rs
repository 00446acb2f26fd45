//! SyncScheduler - 同步的编排层
//!
//! Reconciler / Bootstrapper 自己不做任何重试；所有 retry / backoff /
//! lifecycle 策略都集中在这里：
//! - **周期触发**：默认每 30 分钟一轮 reconcile（要求在线）
//! - **即时触发**：每个本地写操作都会 `request_sync()` 请求一轮
//! - **机会触发**：网络 Offline → Online 边沿补一轮
//! - **pull 触发**：登录走 `pullIfNeeded`，手动刷新走 `forcePull`（单次尝试，
//!   不重试，失败只进报告）
//!
//! 一轮 reconcile 若有实体类型失败，整轮重试，最多 3 次（指数退避，起步
//! 1 分钟，带抖动），之后以 [`SyncEvent::ReconcileFailed`] 上报并放弃——
//! 脏行留在本地，等下一个触发点。
//!
//! 会话是显式对象：登录 `set_session`、登出 `clear_session`；无会话时
//! 所有触发都是 no-op。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::SyncEvent;
use crate::network::NetworkMonitor;
use super::{PullBootstrapper, PushReconciler, SyncSession};

/// 调度配置（测试时把间隔/退避调小）
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 周期 reconcile 间隔
    pub interval: Duration,
    /// 一次触发内的最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 退避起步时长；第 n 次重试前等 base * 2^(n-1)
    pub base_backoff: Duration,
    /// 随机抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            max_attempts: 3,
            base_backoff: Duration::from_secs(60),
            jitter_factor: 0.1,
        }
    }
}

/// 调度器内部命令
#[derive(Debug)]
enum SyncCommand {
    Reconcile,
    Pull { force: bool },
    Shutdown,
}

pub struct SyncScheduler {
    push: PushReconciler,
    pull: PullBootstrapper,
    network: Arc<NetworkMonitor>,
    config: SchedulerConfig,
    session: Arc<RwLock<Option<SyncSession>>>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncScheduler {
    pub fn new(
        push: PushReconciler,
        pull: PullBootstrapper,
        network: Arc<NetworkMonitor>,
        config: SchedulerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(32);
        Self {
            push,
            pull,
            network,
            config,
            session: Arc::new(RwLock::new(None)),
            event_tx,
        }
    }

    /// 启动调度循环，返回控制句柄
    pub fn start(self) -> SyncHandle {
        let (tx, rx) = mpsc::channel(32);
        let session = self.session.clone();
        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(self.run(rx));
        SyncHandle { tx, session, event_tx, task }
    }

    async fn run(self, mut rx: mpsc::Receiver<SyncCommand>) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的首个 tick 立即到期；启动时的即时同步由外层显式请求，这里吃掉
        interval.tick().await;

        let mut net_rx = self.network.subscribe();
        info!("⏱️ 同步调度器启动，周期 {:?}", self.config.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reconcile_if_possible("periodic").await;
                }
                cmd = rx.recv() => match cmd {
                    Some(SyncCommand::Reconcile) => self.reconcile_if_possible("request").await,
                    Some(SyncCommand::Pull { force }) => self.pull_now(force).await,
                    Some(SyncCommand::Shutdown) | None => break,
                },
                event = net_rx.recv() => {
                    if let Ok(ev) = event {
                        if ev.is_regain() {
                            self.reconcile_if_possible("network-regain").await;
                        }
                    }
                }
            }
        }
        info!("⏱️ 同步调度器退出");
    }

    /// 有会话且在线才跑；失败整轮重试，重试耗尽则上报后放弃
    async fn reconcile_if_possible(&self, trigger: &str) {
        let Some(session) = self.session.read().await.clone() else {
            debug!("无活跃会话，忽略 reconcile 触发 ({})", trigger);
            return;
        };
        if !self.network.is_online().await {
            debug!("离线状态，跳过 reconcile ({})；等待网络恢复边沿", trigger);
            return;
        }

        for attempt in 1..=self.config.max_attempts {
            let report = self.push.run_pass(&session).await;
            if report.is_success() {
                let _ = self.event_tx.send(SyncEvent::ReconcileCompleted(report));
                return;
            }
            if attempt == self.config.max_attempts {
                warn!("❌ reconcile 连续 {} 次失败 ({})，放弃本次触发", attempt, trigger);
                let _ = self.event_tx.send(SyncEvent::ReconcileFailed(report));
                return;
            }
            let delay = self.backoff_for(attempt);
            info!("🔁 reconcile 有失败，{:?} 后第 {} 次尝试", delay, attempt + 1);
            tokio::time::sleep(delay).await;
        }
    }

    /// pull 单次尝试、不重试；失败只进报告
    async fn pull_now(&self, force: bool) {
        let Some(session) = self.session.read().await.clone() else {
            debug!("无活跃会话，忽略 pull 触发");
            return;
        };
        let report = if force {
            self.pull.force_pull(&session).await
        } else {
            self.pull.pull_if_needed(&session).await
        };
        let _ = self.event_tx.send(SyncEvent::PullCompleted(report));
    }

    /// 指数退避 + 抖动：base * 2^(attempt-1) * (1 ± jitter/2)
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.config.base_backoff.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
        let jitter = 1.0 + self.config.jitter_factor * (rand::random::<f64>() - 0.5);
        Duration::from_secs_f64((base * jitter).max(0.0))
    }
}

/// 调度器控制句柄
///
/// 持有方（SDK facade）通过它管理会话生命周期、请求同步、订阅结果。
pub struct SyncHandle {
    tx: mpsc::Sender<SyncCommand>,
    session: Arc<RwLock<Option<SyncSession>>>,
    event_tx: broadcast::Sender<SyncEvent>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// 登录：设置活跃会话
    pub async fn set_session(&self, session: SyncSession) {
        *self.session.write().await = Some(session);
    }

    /// 登出：丢弃会话，后续触发全部 no-op
    pub async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    /// 请求一轮即时 reconcile（队列满则丢弃——反正已有待处理的触发）
    pub fn request_sync(&self) {
        let _ = self.tx.try_send(SyncCommand::Reconcile);
    }

    /// 请求一次 pull：`force=false` 走 pullIfNeeded，`force=true` 走 forcePull
    pub fn request_pull(&self, force: bool) {
        let _ = self.tx.try_send(SyncCommand::Pull { force });
    }

    /// 订阅同步结果事件
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// 停止调度循环并等待退出
    pub async fn shutdown(self) {
        let _ = self.tx.send(SyncCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkStatus;
    use crate::remote::{collections, MemoryRemoteStore};
    use crate::storage::entities::Pet;
    use crate::storage::{PhotoCache, StorageManager};
    use crate::sync::EntityKind;
    use tempfile::TempDir;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(3600), // 周期触发不参与测试
            max_attempts: 3,
            base_backoff: Duration::from_millis(10),
            jitter_factor: 0.0,
        }
    }

    fn setup() -> (TempDir, Arc<StorageManager>, Arc<MemoryRemoteStore>, Arc<NetworkMonitor>, SyncHandle) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemoteStore::new());
        let network = Arc::new(NetworkMonitor::new());
        let scheduler = SyncScheduler::new(
            PushReconciler::new(storage.clone(), remote.clone()),
            PullBootstrapper::new(storage.clone(), remote.clone(), PhotoCache::new(dir.path().join("photos"))),
            network.clone(),
            test_config(),
        );
        let handle = scheduler.start();
        (dir, storage, remote, network, handle)
    }

    async fn next_event(rx: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("等待同步事件超时")
            .expect("事件通道关闭")
    }

    #[tokio::test]
    async fn immediate_request_runs_a_pass() {
        let (_dir, storage, remote, _network, handle) = setup();
        let mut events = handle.subscribe();

        handle.set_session(SyncSession::new("u1")).await;
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        storage.save_pet(pet).await.unwrap();

        handle.request_sync();
        match next_event(&mut events).await {
            SyncEvent::ReconcileCompleted(report) => {
                assert_eq!(report.pushed_total(), 1);
            }
            other => panic!("预期 ReconcileCompleted，得到 {:?}", other),
        }
        assert_eq!(remote.rows_in(collections::PETS), 1);
        assert!(storage.get_pet("p1").await.unwrap().unwrap().synced);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn without_session_triggers_are_noops() {
        let (_dir, storage, remote, _network, handle) = setup();
        storage.save_pet(Pet::new("u1", "Rex", "dog")).await.unwrap();

        handle.request_sync();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.call_count(), 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn failing_pass_is_retried_then_reported() {
        let (_dir, storage, remote, _network, handle) = setup();
        let mut events = handle.subscribe();

        handle.set_session(SyncSession::new("u1")).await;
        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        storage.save_pet(pet).await.unwrap();
        remote.fail_collection(collections::PETS);

        handle.request_sync();
        match next_event(&mut events).await {
            SyncEvent::ReconcileFailed(report) => {
                assert!(matches!(
                    report.outcome_for(EntityKind::Pet),
                    Some(crate::sync::EntityOutcome::Failed(_))
                ));
            }
            other => panic!("预期 ReconcileFailed，得到 {:?}", other),
        }
        // 只有 pet 有脏行：每次尝试 1 个远端调用 × 3 次尝试
        assert_eq!(remote.call_count(), 3);
        assert!(!storage.get_pet("p1").await.unwrap().unwrap().synced);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn offline_skips_and_regain_catches_up() {
        let (_dir, storage, remote, network, handle) = setup();
        let mut events = handle.subscribe();

        handle.set_session(SyncSession::new("u1")).await;
        network.set_status(NetworkStatus::Offline).await;

        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        storage.save_pet(pet).await.unwrap();

        // 离线时的即时触发被跳过
        handle.request_sync();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.call_count(), 0);

        // 恢复联网：边沿触发机会性同步
        network.set_status(NetworkStatus::Online).await;
        match next_event(&mut events).await {
            SyncEvent::ReconcileCompleted(report) => assert_eq!(report.pushed_total(), 1),
            other => panic!("预期 ReconcileCompleted，得到 {:?}", other),
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn pull_request_routes_through_the_loop() {
        let (_dir, storage, remote, _network, handle) = setup();
        let mut events = handle.subscribe();

        let mut pet = Pet::new("u1", "Rex", "dog");
        pet.id = "p1".to_string();
        pet.synced = true;
        remote.seed(collections::PETS, "p1", &crate::remote::wire::pet_to_wire(&pet));

        handle.set_session(SyncSession::new("u1")).await;
        handle.request_pull(false);
        match next_event(&mut events).await {
            SyncEvent::PullCompleted(report) => {
                assert!(!report.skipped);
                assert!(report.is_success());
            }
            other => panic!("预期 PullCompleted，得到 {:?}", other),
        }
        assert!(storage.get_pet("p1").await.unwrap().is_some());

        handle.shutdown().await;
    }
}
