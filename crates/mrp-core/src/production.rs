//! 生產工單狀態機

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{display_as_str, MrpError, Result};

/// 工單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Created,
    Planned,
    Released,
    InProgress,
    Completed,
    Closed,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Planned => "PLANNED",
            Self::Released => "RELEASED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Closed => "CLOSED",
        }
    }

    /// 此狀態的未完工數量是否計入生產中供應
    pub fn counts_as_in_production(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Planned | Self::Released | Self::InProgress
        )
    }
}

display_as_str!(WorkOrderStatus);

/// 工單用料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderMaterial {
    pub material_id: String,

    /// 領料倉庫
    pub warehouse_id: String,

    /// 需求數量
    pub required_qty: Decimal,

    /// 已發料數量
    pub issued_qty: Decimal,
}

impl WorkOrderMaterial {
    pub fn new(
        material_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        required_qty: Decimal,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            warehouse_id: warehouse_id.into(),
            required_qty,
            issued_qty: Decimal::ZERO,
        }
    }

    /// 尚未發料數量
    pub fn outstanding_qty(&self) -> Decimal {
        (self.required_qty - self.issued_qty).max(Decimal::ZERO)
    }
}

/// 報工紀錄（不可修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderReport {
    pub id: Uuid,

    /// 良品數量
    pub quantity: Decimal,

    /// 報廢數量
    pub scrap_qty: Decimal,

    pub operator: String,
    pub reported_at: DateTime<Utc>,
}

/// 生產工單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub code: String,

    /// 產出物料（成品或半成品）
    pub product_id: String,

    /// 完工入庫倉庫
    pub warehouse_id: String,

    pub planned_qty: Decimal,
    pub completed_qty: Decimal,
    pub scrap_qty: Decimal,

    pub status: WorkOrderStatus,

    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,

    pub materials: Vec<WorkOrderMaterial>,
    pub reports: Vec<WorkOrderReport>,

    pub created_at: DateTime<Utc>,
}

impl WorkOrder {
    /// 建立工單
    pub fn new(
        code: String,
        product_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        planned_qty: Decimal,
        materials: Vec<WorkOrderMaterial>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if planned_qty <= Decimal::ZERO {
            return Err(MrpError::validation(format!(
                "工單計劃數量必須大於 0，目前為 {planned_qty}"
            )));
        }
        if let Some(bad) = materials
            .iter()
            .find(|m| m.required_qty < Decimal::ZERO)
        {
            return Err(MrpError::validation(format!(
                "用料 {} 的需求數量不可為負",
                bad.material_id
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            code,
            product_id: product_id.into(),
            warehouse_id: warehouse_id.into(),
            planned_qty,
            completed_qty: Decimal::ZERO,
            scrap_qty: Decimal::ZERO,
            status: WorkOrderStatus::Created,
            planned_start: None,
            planned_end: None,
            actual_start: None,
            actual_end: None,
            materials,
            reports: Vec::new(),
            created_at: now,
        })
    }

    /// 建構器模式：設置計劃日期
    pub fn with_schedule(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.planned_start = Some(start);
        self.planned_end = Some(end);
        self
    }

    fn reject_transition(&self, action: &'static str) -> MrpError {
        MrpError::invalid_transition("工單", &self.code, self.status, action)
    }

    fn expect_any(&self, allowed: &[WorkOrderStatus], action: &'static str) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(self.reject_transition(action));
        }
        Ok(())
    }

    /// Created → Planned
    pub fn plan(&mut self) -> Result<()> {
        self.expect_any(&[WorkOrderStatus::Created], "plan")?;
        self.status = WorkOrderStatus::Planned;
        Ok(())
    }

    /// Created/Planned → Released
    pub fn release(&mut self) -> Result<()> {
        self.expect_any(
            &[WorkOrderStatus::Created, WorkOrderStatus::Planned],
            "release",
        )?;
        self.status = WorkOrderStatus::Released;
        Ok(())
    }

    /// 檢查是否可領料（Released/InProgress）
    pub fn ensure_pickable(&self) -> Result<()> {
        self.expect_any(
            &[WorkOrderStatus::Released, WorkOrderStatus::InProgress],
            "pick",
        )
    }

    /// 尚有未發料的用料
    pub fn outstanding_materials(&self) -> impl Iterator<Item = &WorkOrderMaterial> {
        self.materials
            .iter()
            .filter(|m| m.outstanding_qty() > Decimal::ZERO)
    }

    /// 登記領料完成：全部用料發足，首次領料轉為 InProgress
    pub fn record_pick(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pickable()?;
        for material in &mut self.materials {
            material.issued_qty = material.issued_qty.max(material.required_qty);
        }
        if self.status == WorkOrderStatus::Released {
            self.status = WorkOrderStatus::InProgress;
            self.actual_start = Some(now);
        }
        Ok(())
    }

    /// 報工（可重複）
    pub fn report(
        &mut self,
        quantity: Decimal,
        scrap_qty: Decimal,
        operator: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<&WorkOrderReport> {
        self.expect_any(&[WorkOrderStatus::InProgress], "report")?;
        if quantity < Decimal::ZERO || scrap_qty < Decimal::ZERO {
            return Err(MrpError::validation("報工數量不可為負"));
        }
        if quantity.is_zero() && scrap_qty.is_zero() {
            return Err(MrpError::validation("報工數量與報廢數量不可同時為 0"));
        }
        let overflow = || MrpError::validation(format!("工單 {} 報工數量溢位", self.code));
        let completed = self.completed_qty.checked_add(quantity).ok_or_else(overflow)?;
        let scrapped = self.scrap_qty.checked_add(scrap_qty).ok_or_else(overflow)?;
        self.completed_qty = completed;
        self.scrap_qty = scrapped;
        self.reports.push(WorkOrderReport {
            id: Uuid::new_v4(),
            quantity,
            scrap_qty,
            operator: operator.into(),
            reported_at: now,
        });
        Ok(&self.reports[self.reports.len() - 1])
    }

    /// 檢查是否可完工（InProgress 且已有良品）
    pub fn ensure_completable(&self) -> Result<()> {
        self.expect_any(&[WorkOrderStatus::InProgress], "complete")?;
        if self.completed_qty <= Decimal::ZERO {
            return Err(MrpError::validation(format!(
                "工單 {} 尚未報工，無法完工",
                self.code
            )));
        }
        Ok(())
    }

    /// InProgress → Completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_completable()?;
        self.status = WorkOrderStatus::Completed;
        self.actual_end = Some(now);
        Ok(())
    }

    /// Completed → Closed
    pub fn close(&mut self) -> Result<()> {
        self.expect_any(&[WorkOrderStatus::Completed], "close")?;
        self.status = WorkOrderStatus::Closed;
        Ok(())
    }

    /// 尚未完工的數量（計入生產中供應）
    pub fn remaining_qty(&self) -> Decimal {
        (self.planned_qty - self.completed_qty).max(Decimal::ZERO)
    }
}
