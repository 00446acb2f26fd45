//! 同步模块 - 离线优先的双向同步核心
//!
//! 职责：
//! - Push Reconciler：按实体类型独立排空本地脏行（synced=0）到远端
//! - Pull Bootstrapper：本地为空或强制刷新时从远端整量拉取
//! - SyncScheduler：周期 / 即时 / 网络恢复三类触发 + 重试退避（策略只在这一层）
//!
//! 冲突策略是行级 last-write-wins：谁后写谁覆盖，不做合并。
//! 同步层的错误以汇总报告（[`ReconcileReport`] / [`PullReport`]）的形式
//! 交给调度器检查，绝不冒泡到 UI 读路径。

pub mod entity_kind;
pub mod push;
pub mod pull;
pub mod scheduler;

pub use entity_kind::EntityKind;
pub use push::PushReconciler;
pub use pull::PullBootstrapper;
pub use scheduler::{SchedulerConfig, SyncHandle, SyncScheduler};

use chrono::Utc;

/// 同步会话 - 显式的上下文对象
///
/// 登录时创建、登出时丢弃，注入 reconcile / pull 入口；
/// 不使用进程级全局状态。
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub user_id: String,
    pub started_at: i64,
}

impl SyncSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            started_at: Utc::now().timestamp_millis(),
        }
    }
}

/// 单个实体类型在一轮同步中的结果
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOutcome {
    /// 无脏行（push）/ 无需处理，零远端调用
    Clean,
    /// 成功推送 n 行并已 mark_synced
    Pushed(usize),
    /// 成功拉取并落库 n 行（synced=true）
    Pulled(usize),
    /// 本类型失败；脏行保留，留待下轮。错误只进报告与日志
    Failed(String),
}

impl EntityOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, EntityOutcome::Failed(_))
    }
}

/// 一轮 reconcile 的汇总报告（每个实体类型一个条目，按固定顺序）
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<(EntityKind, EntityOutcome)>,
}

impl ReconcileReport {
    pub fn record(&mut self, kind: EntityKind, outcome: EntityOutcome) {
        self.outcomes.push((kind, outcome));
    }

    /// 所有实体类型都没失败（Clean 也算成功）
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|(_, o)| o.is_failed())
    }

    pub fn pushed_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                EntityOutcome::Pushed(n) => *n,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, kind: EntityKind) -> Option<&EntityOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }
}

/// 一次 pull 的汇总报告
///
/// 条目键为目标名：六个实体类型的 `as_str()`，外加目录表 `"product"` / `"store"`。
#[derive(Debug, Clone, Default)]
pub struct PullReport {
    /// 本地已有数据，pullIfNeeded 直接跳过（零远端调用）
    pub skipped: bool,
    pub outcomes: Vec<(&'static str, EntityOutcome)>,
}

impl PullReport {
    pub fn skipped() -> Self {
        Self { skipped: true, outcomes: Vec::new() }
    }

    pub fn record(&mut self, target: &'static str, outcome: EntityOutcome) {
        self.outcomes.push((target, outcome));
    }

    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|(_, o)| o.is_failed())
    }

    pub fn pulled_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                EntityOutcome::Pulled(n) => *n,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, target: &str) -> Option<&EntityOutcome> {
        self.outcomes.iter().find(|(t, _)| *t == target).map(|(_, o)| o)
    }
}
