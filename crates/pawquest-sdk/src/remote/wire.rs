//! Wire 层 DTO 与映射 - local ↔ remote 的显式双向转换
//!
//! 每个实体类型一对映射函数，字段清单写全（不走反射/动态映射），由
//! round-trip 测试保证 local → wire → local 得到等价行。
//!
//! 映射规则：
//! - 扁平改名：`user_id` ↔ `owner_id`、`photo_path` ↔ `photo_url`、
//!   `distance_m` ↔ `distance_meters`、`duration_s` ↔ `duration_seconds`
//! - id 原样保留（幂等与对账的唯一键）
//! - 不做数值变换；synced 是纯本地状态，不上 wire——pull 落库一律强制
//!   synced=true（远端对它自己而言定义上就是已同步的）

use serde::{Deserialize, Serialize};

use crate::storage::entities::{
    CoinTransaction, DailyTask, Pet, Product, RedeemCode, RunningSession, Store, VaccineRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetWire {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub birth_date: Option<i64>,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub level: i32,
    pub exp: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn pet_to_wire(p: &Pet) -> PetWire {
    PetWire {
        id: p.id.clone(),
        owner_id: p.user_id.clone(),
        name: p.name.clone(),
        species: p.species.clone(),
        breed: p.breed.clone(),
        birth_date: p.birth_date,
        photo_url: p.photo_path.clone(),
        level: p.level,
        exp: p.exp,
        created_at: p.created_at,
        updated_at: p.updated_at,
    }
}

/// photo_url 原样带回 photo_path；pull 落库前由 PhotoCache 解析成本地路径
pub fn pet_from_wire(w: &PetWire) -> Pet {
    Pet {
        id: w.id.clone(),
        user_id: w.owner_id.clone(),
        name: w.name.clone(),
        species: w.species.clone(),
        breed: w.breed.clone(),
        birth_date: w.birth_date,
        photo_path: w.photo_url.clone(),
        level: w.level,
        exp: w.exp,
        created_at: w.created_at,
        updated_at: w.updated_at,
        synced: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTaskWire {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub pet_id: Option<String>,
    pub title: String,
    pub task_kind: String,
    pub coin_reward: i64,
    pub task_date: String,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn daily_task_to_wire(t: &DailyTask) -> DailyTaskWire {
    DailyTaskWire {
        id: t.id.clone(),
        owner_id: t.user_id.clone(),
        pet_id: t.pet_id.clone(),
        title: t.title.clone(),
        task_kind: t.task_kind.clone(),
        coin_reward: t.coin_reward,
        task_date: t.task_date.clone(),
        completed: t.completed,
        completed_at: t.completed_at,
        created_at: t.created_at,
        updated_at: t.updated_at,
    }
}

pub fn daily_task_from_wire(w: &DailyTaskWire) -> DailyTask {
    DailyTask {
        id: w.id.clone(),
        user_id: w.owner_id.clone(),
        pet_id: w.pet_id.clone(),
        title: w.title.clone(),
        task_kind: w.task_kind.clone(),
        coin_reward: w.coin_reward,
        task_date: w.task_date.clone(),
        completed: w.completed,
        completed_at: w.completed_at,
        created_at: w.created_at,
        updated_at: w.updated_at,
        synced: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinTransactionWire {
    pub id: String,
    pub owner_id: String,
    pub amount: i64,
    pub reason: String,
    pub created_at: i64,
}

pub fn coin_transaction_to_wire(t: &CoinTransaction) -> CoinTransactionWire {
    CoinTransactionWire {
        id: t.id.clone(),
        owner_id: t.user_id.clone(),
        amount: t.amount,
        reason: t.reason.clone(),
        created_at: t.created_at,
    }
}

pub fn coin_transaction_from_wire(w: &CoinTransactionWire) -> CoinTransaction {
    CoinTransaction {
        id: w.id.clone(),
        user_id: w.owner_id.clone(),
        amount: w.amount,
        reason: w.reason.clone(),
        created_at: w.created_at,
        synced: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningSessionWire {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub pet_id: Option<String>,
    pub distance_meters: f64,
    pub duration_seconds: i64,
    #[serde(default)]
    pub route: Option<String>,
    pub coins_earned: i64,
    pub started_at: i64,
    #[serde(default)]
    pub ended_at: Option<i64>,
}

pub fn running_session_to_wire(s: &RunningSession) -> RunningSessionWire {
    RunningSessionWire {
        id: s.id.clone(),
        owner_id: s.user_id.clone(),
        pet_id: s.pet_id.clone(),
        distance_meters: s.distance_m,
        duration_seconds: s.duration_s,
        route: s.route.clone(),
        coins_earned: s.coins_earned,
        started_at: s.started_at,
        ended_at: s.ended_at,
    }
}

pub fn running_session_from_wire(w: &RunningSessionWire) -> RunningSession {
    RunningSession {
        id: w.id.clone(),
        user_id: w.owner_id.clone(),
        pet_id: w.pet_id.clone(),
        distance_m: w.distance_meters,
        duration_s: w.duration_seconds,
        route: w.route.clone(),
        coins_earned: w.coins_earned,
        started_at: w.started_at,
        ended_at: w.ended_at,
        synced: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemCodeWire {
    pub id: String,
    pub owner_id: String,
    pub code: String,
    pub coin_value: i64,
    pub redeemed_at: i64,
}

pub fn redeem_code_to_wire(r: &RedeemCode) -> RedeemCodeWire {
    RedeemCodeWire {
        id: r.id.clone(),
        owner_id: r.user_id.clone(),
        code: r.code.clone(),
        coin_value: r.coin_value,
        redeemed_at: r.redeemed_at,
    }
}

pub fn redeem_code_from_wire(w: &RedeemCodeWire) -> RedeemCode {
    RedeemCode {
        id: w.id.clone(),
        user_id: w.owner_id.clone(),
        code: w.code.clone(),
        coin_value: w.coin_value,
        redeemed_at: w.redeemed_at,
        synced: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccineRecordWire {
    pub id: String,
    pub pet_id: String,
    pub name: String,
    pub administered_at: i64,
    #[serde(default)]
    pub next_due_at: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn vaccine_to_wire(v: &VaccineRecord) -> VaccineRecordWire {
    VaccineRecordWire {
        id: v.id.clone(),
        pet_id: v.pet_id.clone(),
        name: v.name.clone(),
        administered_at: v.administered_at,
        next_due_at: v.next_due_at,
        notes: v.notes.clone(),
        created_at: v.created_at,
        updated_at: v.updated_at,
    }
}

pub fn vaccine_from_wire(w: &VaccineRecordWire) -> VaccineRecord {
    VaccineRecord {
        id: w.id.clone(),
        pet_id: w.pet_id.clone(),
        name: w.name.clone(),
        administered_at: w.administered_at,
        next_due_at: w.next_due_at,
        notes: w.notes.clone(),
        created_at: w.created_at,
        updated_at: w.updated_at,
        synced: true,
    }
}

/// 目录数据只有 wire → local 单向映射（不参与推送）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductWire {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_coins: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: String,
}

pub fn product_from_wire(w: &ProductWire) -> Product {
    Product {
        id: w.id.clone(),
        name: w.name.clone(),
        description: w.description.clone(),
        price_coins: w.price_coins,
        image_url: w.image_url.clone(),
        category: w.category.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWire {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub fn store_from_wire(w: &StoreWire) -> Store {
    Store {
        id: w.id.clone(),
        name: w.name.clone(),
        address: w.address.clone(),
        latitude: w.latitude,
        longitude: w.longitude,
    }
}
