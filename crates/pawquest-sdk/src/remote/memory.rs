//! 内存远端实现 - 测试与演示用的 fake
//!
//! 行为与真实远端一致：按集合分桶、按 id upsert（last-write-wins）、
//! 按 owner_id / pet_id 过滤查询。额外提供：
//! - 按集合注入失败（模拟网络不可达 / 5xx）
//! - 远端调用计数（验证「无脏行时零请求」「pull 命中本地时零请求」）

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PawquestSDKError, Result};
use super::{collections, RemoteStore};
use super::wire::*;

#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    /// collection -> (id -> row)，BTreeMap 保证遍历顺序稳定
    rows: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    /// 注入失败的集合名
    failing: Mutex<HashSet<String>>,
    /// 注入失败的单行 (collection, id)：模拟批内个别行的远端失败
    failing_rows: Mutex<HashSet<(String, String)>>,
    /// 远端调用计数（含失败的调用）
    calls: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让某个集合的所有调用失败（模拟该实体类型的远端故障）
    pub fn fail_collection(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_string());
    }

    pub fn clear_failure(&self, collection: &str) {
        self.failing.lock().unwrap().remove(collection);
    }

    /// 让某集合中特定 id 的 upsert 失败（同集合其余行正常）
    pub fn fail_row(&self, collection: &str, id: &str) {
        self.failing_rows
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()));
    }

    pub fn clear_row_failure(&self, collection: &str, id: &str) {
        self.failing_rows
            .lock()
            .unwrap()
            .remove(&(collection.to_string(), id.to_string()));
    }

    /// 累计远端调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    /// 某集合当前行数
    pub fn rows_in(&self, collection: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .get(collection)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// 直接塞一行进某集合（种子数据；不走调用计数与失败注入）
    pub fn seed<T: Serialize>(&self, collection: &str, id: &str, row: &T) {
        let value = serde_json::to_value(row).expect("seed 数据必须可序列化");
        self.rows
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
    }

    /// 按 id 取某集合的一行（断言远端状态用）
    pub fn get_row(&self, collection: &str, id: &str) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|m| m.get(id))
            .cloned()
    }

    fn record_call(&self, collection: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(collection) {
            return Err(PawquestSDKError::Transport(format!(
                "injected failure: {}", collection
            )));
        }
        Ok(())
    }

    fn upsert_value<T: Serialize>(&self, collection: &str, id: &str, row: &T) -> Result<()> {
        self.record_call(collection)?;
        if self
            .failing_rows
            .lock()
            .unwrap()
            .contains(&(collection.to_string(), id.to_string()))
        {
            return Err(PawquestSDKError::Transport(format!(
                "injected failure: {}/{}", collection, id
            )));
        }
        let value = serde_json::to_value(row)?;
        self.rows
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    fn list_values<T, F>(&self, collection: &str, pred: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&Value) -> bool,
    {
        self.record_call(collection)?;
        let rows = self.rows.lock().unwrap();
        let mut out = Vec::new();
        if let Some(bucket) = rows.get(collection) {
            for value in bucket.values() {
                if pred(value) {
                    out.push(serde_json::from_value(value.clone())?);
                }
            }
        }
        Ok(out)
    }
}

fn owner_is(value: &Value, user_id: &str) -> bool {
    value.get("owner_id").and_then(Value::as_str) == Some(user_id)
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert_pet(&self, row: &PetWire) -> Result<()> {
        self.upsert_value(collections::PETS, &row.id, row)
    }

    async fn list_pets(&self, user_id: &str) -> Result<Vec<PetWire>> {
        self.list_values(collections::PETS, |v| owner_is(v, user_id))
    }

    async fn upsert_daily_task(&self, row: &DailyTaskWire) -> Result<()> {
        self.upsert_value(collections::DAILY_TASKS, &row.id, row)
    }

    async fn list_daily_tasks(&self, user_id: &str) -> Result<Vec<DailyTaskWire>> {
        self.list_values(collections::DAILY_TASKS, |v| owner_is(v, user_id))
    }

    async fn upsert_coin_transaction(&self, row: &CoinTransactionWire) -> Result<()> {
        self.upsert_value(collections::COIN_TRANSACTIONS, &row.id, row)
    }

    async fn list_coin_transactions(&self, user_id: &str) -> Result<Vec<CoinTransactionWire>> {
        self.list_values(collections::COIN_TRANSACTIONS, |v| owner_is(v, user_id))
    }

    async fn upsert_running_session(&self, row: &RunningSessionWire) -> Result<()> {
        self.upsert_value(collections::RUNNING_SESSIONS, &row.id, row)
    }

    async fn list_running_sessions(&self, user_id: &str) -> Result<Vec<RunningSessionWire>> {
        self.list_values(collections::RUNNING_SESSIONS, |v| owner_is(v, user_id))
    }

    async fn upsert_redeem_code(&self, row: &RedeemCodeWire) -> Result<()> {
        self.upsert_value(collections::REDEEM_CODES, &row.id, row)
    }

    async fn list_redeem_codes(&self, user_id: &str) -> Result<Vec<RedeemCodeWire>> {
        self.list_values(collections::REDEEM_CODES, |v| owner_is(v, user_id))
    }

    async fn upsert_vaccine(&self, row: &VaccineRecordWire) -> Result<()> {
        self.upsert_value(collections::VACCINE_RECORDS, &row.id, row)
    }

    async fn list_vaccines(&self, pet_ids: &[String]) -> Result<Vec<VaccineRecordWire>> {
        if pet_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.list_values(collections::VACCINE_RECORDS, |v| {
            v.get("pet_id")
                .and_then(Value::as_str)
                .map(|p| pet_ids.iter().any(|id| id == p))
                .unwrap_or(false)
        })
    }

    async fn list_products(&self) -> Result<Vec<ProductWire>> {
        self.list_values(collections::PRODUCTS, |_| true)
    }

    async fn list_stores(&self) -> Result<Vec<StoreWire>> {
        self.list_values(collections::STORES, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::entities::Pet;

    #[tokio::test]
    async fn upsert_by_id_is_last_write_wins() {
        let remote = MemoryRemoteStore::new();

        // 两个「设备」无协调地写同一个 id：后写者物理覆盖
        let mut device_a = pet_to_wire(&Pet::new("u1", "Rex", "dog"));
        device_a.id = "p1".to_string();
        let mut device_b = device_a.clone();
        device_b.name = "Rexy".to_string();

        remote.upsert_pet(&device_a).await.unwrap();
        remote.upsert_pet(&device_b).await.unwrap();

        assert_eq!(remote.rows_in(collections::PETS), 1);
        let row = remote.get_row(collections::PETS, "p1").unwrap();
        assert_eq!(row.get("name").unwrap(), "Rexy");
    }

    #[tokio::test]
    async fn injected_failure_counts_the_call() {
        let remote = MemoryRemoteStore::new();
        remote.fail_collection(collections::PETS);

        let wire = pet_to_wire(&Pet::new("u1", "Rex", "dog"));
        assert!(remote.upsert_pet(&wire).await.is_err());
        assert_eq!(remote.call_count(), 1);
        assert_eq!(remote.rows_in(collections::PETS), 0);
    }

    #[tokio::test]
    async fn empty_pet_id_set_makes_no_call() {
        let remote = MemoryRemoteStore::new();
        let rows = remote.list_vaccines(&[]).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(remote.call_count(), 0);
    }
}
