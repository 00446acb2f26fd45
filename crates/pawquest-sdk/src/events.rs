//! 事件系统模块 - Local Store 变更广播与同步结果广播
//!
//! 功能包括：
//! - 表变更事件：UI 的 live query 订阅后在对应表变化时重新读库（无轮询）
//! - 同步结果事件：调度器把每轮 reconcile / pull 的汇总结果广播出来
//!
//! UI 永远只读 Local Store；同步失败只会出现在 `SyncEvent` 里，
//! 不会以错误形式冒泡到任何读路径。

use serde::Serialize;

use crate::sync::{PullReport, ReconcileReport};

/// Local Store 变更事件
///
/// `table` 取值见各 DAO 的 `TABLE` 常量（如 `"pet"`、`"daily_task"`）。
#[derive(Debug, Clone, Serialize)]
pub enum StoreEvent {
    /// 单行 upsert（本地变更或拉取写入）
    RowUpserted { table: &'static str, id: String },
    /// 单行删除
    RowDeleted { table: &'static str, id: String },
    /// 整表内容发生批量变化（pull 落库、目录表 replace_all、级联删除）
    TableReplaced { table: &'static str },
}

impl StoreEvent {
    pub fn table(&self) -> &'static str {
        match self {
            StoreEvent::RowUpserted { table, .. } => table,
            StoreEvent::RowDeleted { table, .. } => table,
            StoreEvent::TableReplaced { table } => table,
        }
    }
}

/// 同步结果事件（调度器广播，供宿主 App 观察同步健康度）
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// 一轮 reconcile 全部实体类型成功（含无事可做）
    ReconcileCompleted(ReconcileReport),
    /// 重试耗尽后仍有实体类型失败；脏行保留，等待下个触发点
    ReconcileFailed(ReconcileReport),
    /// 一次 pull（pullIfNeeded / forcePull）结束
    PullCompleted(PullReport),
}
