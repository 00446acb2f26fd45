//! 远端存储抽象 - REST 风格的按集合 upsert/select
//!
//! 远端契约（每个实体类型一个命名集合）：
//! - upsert 以实体 id 为键，重放幂等（同一行 upsert 1 次和 N 次结果一致）
//! - select 按 owning-user 过滤；Vaccine 例外，按用户拥有的 pet_id 集合过滤
//! - 字段映射是 local ↔ wire 的扁平改名（见 [`wire`]），id 两侧原样保留
//!
//! 生产实现为 [`HttpRemoteStore`]；[`MemoryRemoteStore`] 供测试与演示。

pub mod http;
pub mod memory;
pub mod wire;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;
pub use wire::*;

use async_trait::async_trait;

use crate::error::Result;

/// 远端集合名（与远端 schema 一致）
pub mod collections {
    pub const PETS: &str = "pets";
    pub const DAILY_TASKS: &str = "daily_tasks";
    pub const COIN_TRANSACTIONS: &str = "coin_transactions";
    pub const RUNNING_SESSIONS: &str = "running_sessions";
    pub const REDEEM_CODES: &str = "redeem_codes";
    pub const VACCINE_RECORDS: &str = "vaccine_records";
    pub const PRODUCTS: &str = "products";
    pub const STORES: &str = "stores";
}

/// 远端存储接口（由调用方注入；SDK 不关心具体后端）
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upsert_pet(&self, row: &PetWire) -> Result<()>;
    async fn list_pets(&self, user_id: &str) -> Result<Vec<PetWire>>;

    async fn upsert_daily_task(&self, row: &DailyTaskWire) -> Result<()>;
    async fn list_daily_tasks(&self, user_id: &str) -> Result<Vec<DailyTaskWire>>;

    async fn upsert_coin_transaction(&self, row: &CoinTransactionWire) -> Result<()>;
    async fn list_coin_transactions(&self, user_id: &str) -> Result<Vec<CoinTransactionWire>>;

    async fn upsert_running_session(&self, row: &RunningSessionWire) -> Result<()>;
    async fn list_running_sessions(&self, user_id: &str) -> Result<Vec<RunningSessionWire>>;

    async fn upsert_redeem_code(&self, row: &RedeemCodeWire) -> Result<()>;
    async fn list_redeem_codes(&self, user_id: &str) -> Result<Vec<RedeemCodeWire>>;

    async fn upsert_vaccine(&self, row: &VaccineRecordWire) -> Result<()>;
    /// 疫苗挂在 pet 下：按 pet_id 集合查询；空集合必须直接返回空（不发请求）
    async fn list_vaccines(&self, pet_ids: &[String]) -> Result<Vec<VaccineRecordWire>>;

    async fn list_products(&self) -> Result<Vec<ProductWire>>;
    async fn list_stores(&self) -> Result<Vec<StoreWire>>;
}
