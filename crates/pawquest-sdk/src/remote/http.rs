//! HTTP 远端实现 - PostgREST 风格的按集合 upsert/select
//!
//! - upsert: `POST {base}/{collection}?on_conflict=id` + `Prefer: resolution=merge-duplicates`
//!   （以 id 为键的 insert-or-replace，重放幂等）
//! - select: `GET {base}/{collection}?{filter}`（如 `owner_id=eq.{user}`）
//! - 超时沿用 reqwest 客户端的环境默认值，不做单独配置
//!
//! 本层只负责传输与状态码判定；重试/退避全部在 SyncScheduler。

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{PawquestSDKError, Result};
use super::{collections, RemoteStore};
use super::wire::*;

pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key).bearer_auth(key),
            None => req,
        }
    }

    async fn upsert<T: Serialize + Sync>(&self, collection: &str, row: &T) -> Result<()> {
        let url = format!("{}/{}?on_conflict=id", self.base_url, collection);
        let response = self
            .apply_auth(self.client.post(&url))
            .header("Prefer", "resolution=merge-duplicates")
            .json(row)
            .send()
            .await
            .map_err(|e| PawquestSDKError::Transport(format!("{} upsert 请求失败: {}", collection, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PawquestSDKError::Transport(format!(
                "{} upsert 失败，HTTP 状态码: {} ({})", collection, status, body
            )));
        }
        debug!("☁️ {} upsert 成功", collection);
        Ok(())
    }

    async fn select<T: DeserializeOwned>(&self, collection: &str, filter: &str) -> Result<Vec<T>> {
        let url = if filter.is_empty() {
            format!("{}/{}", self.base_url, collection)
        } else {
            format!("{}/{}?{}", self.base_url, collection, filter)
        };
        let response = self
            .apply_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|e| PawquestSDKError::Transport(format!("{} select 请求失败: {}", collection, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PawquestSDKError::Transport(format!(
                "{} select 失败，HTTP 状态码: {}", collection, status
            )));
        }
        let rows = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| PawquestSDKError::Transport(format!("{} 响应解析失败: {}", collection, e)))?;
        Ok(rows)
    }

    fn owner_filter(user_id: &str) -> String {
        format!("owner_id=eq.{}", user_id)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upsert_pet(&self, row: &PetWire) -> Result<()> {
        self.upsert(collections::PETS, row).await
    }

    async fn list_pets(&self, user_id: &str) -> Result<Vec<PetWire>> {
        self.select(collections::PETS, &Self::owner_filter(user_id)).await
    }

    async fn upsert_daily_task(&self, row: &DailyTaskWire) -> Result<()> {
        self.upsert(collections::DAILY_TASKS, row).await
    }

    async fn list_daily_tasks(&self, user_id: &str) -> Result<Vec<DailyTaskWire>> {
        self.select(collections::DAILY_TASKS, &Self::owner_filter(user_id)).await
    }

    async fn upsert_coin_transaction(&self, row: &CoinTransactionWire) -> Result<()> {
        self.upsert(collections::COIN_TRANSACTIONS, row).await
    }

    async fn list_coin_transactions(&self, user_id: &str) -> Result<Vec<CoinTransactionWire>> {
        self.select(collections::COIN_TRANSACTIONS, &Self::owner_filter(user_id)).await
    }

    async fn upsert_running_session(&self, row: &RunningSessionWire) -> Result<()> {
        self.upsert(collections::RUNNING_SESSIONS, row).await
    }

    async fn list_running_sessions(&self, user_id: &str) -> Result<Vec<RunningSessionWire>> {
        self.select(collections::RUNNING_SESSIONS, &Self::owner_filter(user_id)).await
    }

    async fn upsert_redeem_code(&self, row: &RedeemCodeWire) -> Result<()> {
        self.upsert(collections::REDEEM_CODES, row).await
    }

    async fn list_redeem_codes(&self, user_id: &str) -> Result<Vec<RedeemCodeWire>> {
        self.select(collections::REDEEM_CODES, &Self::owner_filter(user_id)).await
    }

    async fn upsert_vaccine(&self, row: &VaccineRecordWire) -> Result<()> {
        self.upsert(collections::VACCINE_RECORDS, row).await
    }

    async fn list_vaccines(&self, pet_ids: &[String]) -> Result<Vec<VaccineRecordWire>> {
        if pet_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = format!("pet_id=in.({})", pet_ids.join(","));
        self.select(collections::VACCINE_RECORDS, &filter).await
    }

    async fn list_products(&self) -> Result<Vec<ProductWire>> {
        self.select(collections::PRODUCTS, "").await
    }

    async fn list_stores(&self) -> Result<Vec<StoreWire>> {
        self.select(collections::STORES, "").await
    }
}
