//! 数据实体定义 - 对应数据库表结构
//!
//! 这里定义了所有数据库表对应的 Rust 结构体，用于：
//! - 类型安全的数据传输
//! - 统一的数据表示
//! - 序列化/反序列化支持
//!
//! 可同步实体（Pet / DailyTask / CoinTransaction / RunningSession /
//! RedeemCode / VaccineRecord）的 `id` 由客户端生成（UUID v4），跨本地/远端
//! 稳定，是 upsert 与幂等重放的唯一键；`synced=false` 表示本地有未确认的
//! 变更。Product / Store 是只读目录数据，不参与同步。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 宠物实体 - 对应 pet 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    /// 出生日期，毫秒时间戳
    pub birth_date: Option<i64>,
    /// 本地照片路径；pull 时由远端 URL 解析为本地缓存文件
    pub photo_path: Option<String>,
    pub level: i32,
    pub exp: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced: bool,
}

impl Pet {
    /// 新建本地宠物（id 客户端生成，synced=false 等待推送）
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, species: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            species: species.into(),
            breed: None,
            birth_date: None,
            photo_path: None,
            level: 1,
            exp: 0,
            created_at: now,
            updated_at: now,
            synced: false,
        }
    }
}

/// 每日任务实体 - 对应 daily_task 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTask {
    pub id: String,
    pub user_id: String,
    pub pet_id: Option<String>,
    pub title: String,
    /// 任务种类，业务层使用 string（见 [`task_kind`]），DB 存 TEXT
    pub task_kind: String,
    pub coin_reward: i64,
    /// 所属日期，"YYYY-MM-DD"
    pub task_date: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced: bool,
}

/// 任务种类常量（与远端约定一致，不做枚举以便服务端扩展）
pub mod task_kind {
    pub const FEED: &str = "feed";
    pub const WALK: &str = "walk";
    pub const PLAY: &str = "play";
    pub const GROOM: &str = "groom";
}

/// 金币流水实体 - 对应 coin_transaction 表（append-only，余额 = SUM(amount)）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinTransaction {
    pub id: String,
    pub user_id: String,
    /// 有符号金额：收入为正、支出为负
    pub amount: i64,
    pub reason: String,
    pub created_at: i64,
    pub synced: bool,
}

impl CoinTransaction {
    pub fn new(user_id: impl Into<String>, amount: i64, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            amount,
            reason: reason.into(),
            created_at: Utc::now().timestamp_millis(),
            synced: false,
        }
    }
}

/// 跑步记录实体 - 对应 running_session 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningSession {
    pub id: String,
    pub user_id: String,
    pub pet_id: Option<String>,
    pub distance_m: f64,
    pub duration_s: i64,
    /// 轨迹（encoded polyline），可空
    pub route: Option<String>,
    pub coins_earned: i64,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub synced: bool,
}

impl RunningSession {
    pub fn new(user_id: impl Into<String>, started_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            pet_id: None,
            distance_m: 0.0,
            duration_s: 0,
            route: None,
            coins_earned: 0,
            started_at,
            ended_at: None,
            synced: false,
        }
    }
}

/// 兑换码记录实体 - 对应 redeem_code 表
///
/// 同一用户同一 code 只能兑换一次（表级 UNIQUE(user_id, code)）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemCode {
    pub id: String,
    pub user_id: String,
    pub code: String,
    pub coin_value: i64,
    pub redeemed_at: i64,
    pub synced: bool,
}

/// 疫苗记录实体 - 对应 vaccine_record 表
///
/// 挂在 pet 下（非 user）：pull 时按用户拥有的 pet_id 集合过滤。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccineRecord {
    pub id: String,
    pub pet_id: String,
    pub name: String,
    pub administered_at: i64,
    pub next_due_at: Option<i64>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced: bool,
}

impl VaccineRecord {
    pub fn new(pet_id: impl Into<String>, name: impl Into<String>, administered_at: i64) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            pet_id: pet_id.into(),
            name: name.into(),
            administered_at,
            next_due_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
            synced: false,
        }
    }
}

/// 商品实体 - 对应 product 表（只读目录数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_coins: i64,
    pub image_url: Option<String>,
    pub category: String,
}

/// 线下门店实体 - 对应 store 表（只读目录数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}
