//! PawQuest SDK - 宠物养成 App 的离线优先数据与同步核心
//!
//! 本 SDK 提供宠物养成 App 的本地优先数据层，包括：
//! - 💾 Local Store：SQLite 本地库，UI 唯一读源，行内 synced 脏标记
//! - ⬆️ Push Reconciler：按实体类型独立排空脏行到远端（按 id 幂等 upsert）
//! - ⬇️ Pull Bootstrapper：首次使用 / 手动刷新时从远端整量拉取
//! - ⏱️ SyncScheduler：周期 / 即时 / 网络恢复三类触发 + 重试退避
//! - 📡 事件系统：表变更广播（live query）与同步结果广播
//!
//! 冲突策略是行级 last-write-wins，不做合并；远端失败永远不影响本地可用性。
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use pawquest_sdk::{PawquestSDK, PawquestConfig, Pet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = PawquestConfig::builder()
//!         .data_dir("/path/to/data")
//!         .remote_url("https://api.pawquest.app/rest/v1")
//!         .api_key("anon-key")
//!         .build();
//!
//!     // 初始化并登录（本地为空时自动从远端拉取）
//!     let sdk = PawquestSDK::initialize(config).await?;
//!     sdk.login("user-123").await?;
//!
//!     // 本地写入立即可读，后台自动同步
//!     let pet = sdk.save_pet(Pet::new("user-123", "Rex", "dog")).await?;
//!     sdk.generate_daily_tasks("user-123", &pet.id, &pawquest_sdk::today_date()).await?;
//!
//!     // UI 订阅表变更做 live query
//!     let mut store_events = sdk.subscribe_store_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = store_events.recv().await {
//!             println!("表变更: {}", event.table());
//!         }
//!     });
//!
//!     sdk.shutdown().await;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod error;
pub mod events;
pub mod network;
pub mod remote;
pub mod sdk;
pub mod storage;
pub mod sync;
pub mod version;

// 重新导出核心类型，方便使用
pub use error::{PawquestSDKError, Result};
pub use events::{StoreEvent, SyncEvent};
pub use network::{NetworkMonitor, NetworkStatus, NetworkStatusEvent};
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
pub use sdk::{today_date, PawquestConfig, PawquestConfigBuilder, PawquestSDK};
pub use storage::{
    CoinTransaction, DailyTask, Pet, PhotoCache, Product, RedeemCode, RunningSession,
    StorageManager, Store, VaccineRecord,
};
pub use sync::{
    EntityKind, EntityOutcome, PullBootstrapper, PullReport, PushReconciler, ReconcileReport,
    SchedulerConfig, SyncHandle, SyncScheduler, SyncSession,
};
pub use version::{BUILD_TIME, GIT_SHA, SDK_VERSION};
