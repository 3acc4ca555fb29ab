//! MRP 運算紀錄與結果模型

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{display_as_str, MrpError, Result};

/// 建議動作類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// 採購（BOM 葉節點）
    Purchase,
    /// 生產（本身有子件）
    Produce,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Produce => "PRODUCE",
        }
    }
}

/// MRP 運算狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MrpRunStatus {
    Running,
    Completed,
    Failed,
    Applied,
}

impl MrpRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Applied => "APPLIED",
        }
    }
}

display_as_str!(ActionType, MrpRunStatus);

/// 警告嚴重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningSeverity {
    Info,
    Warning,
    Error,
}

/// MRP 診斷訊息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrpWarning {
    pub component_id: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl MrpWarning {
    pub fn new(component_id: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            component_id,
            message,
            severity,
        }
    }

    pub fn info(component_id: String, message: String) -> Self {
        Self::new(component_id, message, WarningSeverity::Info)
    }

    pub fn warning(component_id: String, message: String) -> Self {
        Self::new(component_id, message, WarningSeverity::Warning)
    }

    pub fn error(component_id: String, message: String) -> Self {
        Self::new(component_id, message, WarningSeverity::Error)
    }
}

/// MRP 運算紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrpRun {
    pub id: Uuid,

    /// 運算單號
    pub code: String,

    pub status: MrpRunStatus,

    /// 限定的產品（None 表示全部有效產品）
    pub product_id: Option<String>,

    /// 計劃時界（天）
    pub horizon_days: u32,

    /// 結果筆數
    pub total_items: usize,

    /// 已產生的請購單數
    pub prs_generated: usize,

    /// 已產生的工單數
    pub wos_generated: usize,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,

    /// 失敗原因
    pub error_message: Option<String>,

    /// 運算診斷（例如供應查詢失敗被視為零）
    pub diagnostics: Vec<MrpWarning>,
}

impl MrpRun {
    /// 創建執行中的運算紀錄
    pub fn start(
        code: String,
        product_id: Option<String>,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            status: MrpRunStatus::Running,
            product_id,
            horizon_days,
            total_items: 0,
            prs_generated: 0,
            wos_generated: 0,
            started_at: now,
            completed_at: None,
            applied_at: None,
            error_message: None,
            diagnostics: Vec::new(),
        }
    }

    fn expect_status(&self, expected: MrpRunStatus, action: &'static str) -> Result<()> {
        if self.status != expected {
            return Err(MrpError::invalid_transition(
                "MRP 運算",
                &self.code,
                self.status,
                action,
            ));
        }
        Ok(())
    }

    /// Running → Completed
    pub fn complete(
        &mut self,
        total_items: usize,
        diagnostics: Vec<MrpWarning>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.expect_status(MrpRunStatus::Running, "complete")?;
        self.status = MrpRunStatus::Completed;
        self.total_items = total_items;
        self.diagnostics = diagnostics;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running → Failed
    pub fn fail(&mut self, message: String, now: DateTime<Utc>) -> Result<()> {
        self.expect_status(MrpRunStatus::Running, "fail")?;
        self.status = MrpRunStatus::Failed;
        self.error_message = Some(message);
        self.completed_at = Some(now);
        Ok(())
    }

    /// 檢查是否可套用
    pub fn ensure_applicable(&self) -> Result<()> {
        self.expect_status(MrpRunStatus::Completed, "apply")
    }

    /// Completed → Applied
    pub fn mark_applied(
        &mut self,
        prs_generated: usize,
        wos_generated: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_applicable()?;
        self.status = MrpRunStatus::Applied;
        self.prs_generated += prs_generated;
        self.wos_generated += wos_generated;
        self.applied_at = Some(now);
        Ok(())
    }
}

/// MRP 運算結果（每個物料一筆）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrpResult {
    pub id: Uuid,
    pub run_id: Uuid,

    /// 物料ID
    pub material_id: String,

    /// 總需求（BOM 展開 + 安全庫存）
    pub gross_requirement: Decimal,

    pub on_hand: Decimal,
    pub in_transit: Decimal,
    pub in_production: Decimal,
    pub safety_stock: Decimal,

    /// 淨需求
    pub net_requirement: Decimal,

    /// 計劃訂購量
    pub planned_order_qty: Decimal,

    pub action_type: ActionType,

    /// 需求日期（完成日期）
    pub required_date: NaiveDate,

    /// 提前期（天）
    pub lead_time_days: u32,

    /// 下單日期（開始日期）
    pub order_date: NaiveDate,

    /// 是否已轉為請購單/工單
    pub applied: bool,
}

impl MrpResult {
    /// 是否仍待套用
    pub fn needs_action(&self) -> bool {
        self.net_requirement > Decimal::ZERO && !self.applied
    }

    /// 標記為已套用（每筆只能一次）
    pub fn mark_applied(&mut self) -> Result<()> {
        if self.applied {
            return Err(MrpError::invalid_transition(
                "MRP 結果",
                self.id,
                "APPLIED",
                "apply",
            ));
        }
        self.applied = true;
        Ok(())
    }

    /// 計算提前期（天數）
    pub fn lead_time_span(&self) -> i64 {
        (self.required_date - self.order_date).num_days()
    }
}

/// 分頁結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T: Clone> Page<T> {
    /// 從完整列表切出指定頁（頁碼從 1 開始）
    pub fn slice(all: &[T], page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size);
        let items = all.iter().skip(start).take(page_size).cloned().collect();
        Self {
            items,
            total: all.len(),
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut run = MrpRun::start("MRP-1".to_string(), None, 30, Utc::now());
        assert_eq!(run.status, MrpRunStatus::Running);

        // 尚未完成不可套用
        assert!(run.ensure_applicable().is_err());

        run.complete(3, Vec::new(), Utc::now()).unwrap();
        assert_eq!(run.total_items, 3);

        run.mark_applied(2, 0, Utc::now()).unwrap();
        assert_eq!(run.status, MrpRunStatus::Applied);
        assert_eq!(run.prs_generated, 2);

        // 重複套用應被拒絕
        let err = run.mark_applied(1, 0, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
        assert_eq!(run.prs_generated, 2);
    }

    #[test]
    fn test_failed_run_is_terminal() {
        let mut run = MrpRun::start("MRP-2".to_string(), None, 30, Utc::now());
        run.fail("BOM 循環".to_string(), Utc::now()).unwrap();
        assert_eq!(run.status, MrpRunStatus::Failed);
        assert!(run.complete(1, Vec::new(), Utc::now()).is_err());
        assert!(run.ensure_applicable().is_err());
    }

    #[test]
    fn test_page_slice() {
        let all: Vec<u32> = (1..=25).collect();
        let page = Page::slice(&all, 3, 10);
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);

        let page = Page::slice(&all, 0, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 10);
    }
}
