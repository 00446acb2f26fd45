//! 网络状态模块
//!
//! 网络探测由平台层（Android / iOS 宿主）负责，宿主通过 `set_status` 把状态
//! 推进来；SDK 内部只消费：调度器订阅状态变化，在 Offline → Online 的边沿
//! 触发一次机会性 reconcile。

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// 网络状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    /// 在线
    Online,
    /// 离线
    Offline,
    /// 网络受限（可达但质量差，视为在线）
    Limited,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        matches!(self, NetworkStatus::Online | NetworkStatus::Limited)
    }
}

/// 网络状态变化事件
#[derive(Debug, Clone)]
pub struct NetworkStatusEvent {
    pub old_status: NetworkStatus,
    pub new_status: NetworkStatus,
    pub timestamp: u64,
}

impl NetworkStatusEvent {
    /// 是否是「恢复联网」边沿（调度器据此触发机会性同步）
    pub fn is_regain(&self) -> bool {
        !self.old_status.is_online() && self.new_status.is_online()
    }
}

/// 网络监控管理器
///
/// 未收到宿主任何状态前默认 Online：离线优先设计下，宁可发起一次失败的
/// 同步（失败会留待重试），也不能让未接线的宿主把同步永远卡死。
#[derive(Debug)]
pub struct NetworkMonitor {
    status_sender: broadcast::Sender<NetworkStatusEvent>,
    current_status: Arc<RwLock<NetworkStatus>>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        let (status_sender, _) = broadcast::channel(16);
        Self {
            status_sender,
            current_status: Arc::new(RwLock::new(NetworkStatus::Online)),
        }
    }

    /// 宿主推入新的网络状态
    pub async fn set_status(&self, new_status: NetworkStatus) {
        let old_status = {
            let mut status = self.current_status.write().await;
            let old = *status;
            *status = new_status;
            old
        };

        if old_status == new_status {
            return;
        }

        let event = NetworkStatusEvent {
            old_status,
            new_status,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        let _ = self.status_sender.send(event);
    }

    /// 获取当前网络状态
    pub async fn get_status(&self) -> NetworkStatus {
        *self.current_status.read().await
    }

    /// 检查当前是否在线
    pub async fn is_online(&self) -> bool {
        self.get_status().await.is_online()
    }

    /// 订阅网络状态变化
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkStatusEvent> {
        self.status_sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn regain_edge_is_only_offline_to_online() {
        let monitor = NetworkMonitor::new();
        let mut rx = monitor.subscribe();

        monitor.set_status(NetworkStatus::Offline).await;
        let ev = rx.recv().await.unwrap();
        assert!(!ev.is_regain());

        monitor.set_status(NetworkStatus::Online).await;
        let ev = rx.recv().await.unwrap();
        assert!(ev.is_regain());

        // 同状态重复推入不广播
        monitor.set_status(NetworkStatus::Online).await;
        assert!(rx.try_recv().is_err());
    }
}
