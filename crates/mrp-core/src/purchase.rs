//! 請購單與採購訂單狀態機

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{display_as_str, MrpError, Result};

/// 請購單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequisitionStatus {
    Draft,
    Pending,
    Approved,
    Ordered,
    Closed,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Ordered => "ORDERED",
            Self::Closed => "CLOSED",
        }
    }
}

/// 請購來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionSource {
    /// 人工建立
    Manual,
    /// 由 MRP 運算結果產生
    Mrp { run_id: Uuid, result_id: Uuid },
}

/// 建立請購單的請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequisition {
    pub material_id: String,
    pub quantity: Decimal,
    pub required_date: Option<NaiveDate>,
    pub source: RequisitionSource,
    pub remark: Option<String>,
}

impl NewRequisition {
    pub fn manual(material_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            material_id: material_id.into(),
            quantity,
            required_date: None,
            source: RequisitionSource::Manual,
            remark: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.material_id.trim().is_empty() {
            return Err(MrpError::validation("請購物料不可為空"));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(MrpError::validation(format!(
                "請購數量必須大於 0，目前為 {}",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// 請購單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequisition {
    pub id: Uuid,
    pub code: String,
    pub material_id: String,
    pub quantity: Decimal,
    pub required_date: Option<NaiveDate>,
    pub source: RequisitionSource,
    pub status: RequisitionStatus,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl PurchaseRequisition {
    /// 由請求建立草稿請購單
    pub fn from_request(code: String, request: NewRequisition, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            material_id: request.material_id,
            quantity: request.quantity,
            required_date: request.required_date,
            source: request.source,
            status: RequisitionStatus::Draft,
            remark: request.remark,
            created_at: now,
            approved_at: None,
        }
    }

    fn reject_transition(&self, action: &'static str) -> MrpError {
        MrpError::invalid_transition("請購單", &self.code, self.status, action)
    }

    /// Draft → Pending
    pub fn submit(&mut self) -> Result<()> {
        if self.status != RequisitionStatus::Draft {
            return Err(self.reject_transition("submit"));
        }
        self.status = RequisitionStatus::Pending;
        Ok(())
    }

    /// Draft/Pending → Approved
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !matches!(
            self.status,
            RequisitionStatus::Draft | RequisitionStatus::Pending
        ) {
            return Err(self.reject_transition("approve"));
        }
        self.status = RequisitionStatus::Approved;
        self.approved_at = Some(now);
        Ok(())
    }

    /// Approved → Ordered（被採購訂單引用）
    pub fn mark_ordered(&mut self) -> Result<()> {
        if self.status != RequisitionStatus::Approved {
            return Err(self.reject_transition("order"));
        }
        self.status = RequisitionStatus::Ordered;
        Ok(())
    }

    /// Ordered → Closed
    pub fn close(&mut self) -> Result<()> {
        if self.status != RequisitionStatus::Ordered {
            return Err(self.reject_transition("close"));
        }
        self.status = RequisitionStatus::Closed;
        Ok(())
    }

    pub fn is_from_mrp(&self) -> bool {
        matches!(self.source, RequisitionSource::Mrp { .. })
    }
}

/// 採購訂單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Pending,
    Approved,
    Sent,
    Partial,
    Received,
    Closed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Sent => "SENT",
            Self::Partial => "PARTIAL",
            Self::Received => "RECEIVED",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// 此狀態的未收數量是否計入採購在途
    pub fn counts_as_in_transit(&self) -> bool {
        matches!(self, Self::Approved | Self::Sent | Self::Partial)
    }
}

/// 採購明細狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoItemStatus {
    Open,
    Partial,
    Received,
    Closed,
}

impl PoItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Partial => "PARTIAL",
            Self::Received => "RECEIVED",
            Self::Closed => "CLOSED",
        }
    }
}

display_as_str!(RequisitionStatus, PurchaseOrderStatus, PoItemStatus);

/// 採購訂單明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub material_id: String,

    /// 訂購數量
    pub quantity: Decimal,

    /// 已收數量
    pub received_qty: Decimal,

    pub unit_price: Decimal,

    /// 來源請購單
    pub requisition_id: Option<Uuid>,

    pub status: PoItemStatus,
}

impl PurchaseOrderItem {
    pub fn new(material_id: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            material_id: material_id.into(),
            quantity,
            received_qty: Decimal::ZERO,
            unit_price,
            requisition_id: None,
            status: PoItemStatus::Open,
        }
    }

    /// 建構器模式：設置來源請購單
    pub fn with_requisition(mut self, requisition_id: Uuid) -> Self {
        self.requisition_id = Some(requisition_id);
        self
    }

    /// 未收數量
    pub fn open_qty(&self) -> Decimal {
        (self.quantity - self.received_qty).max(Decimal::ZERO)
    }

    /// 登記收貨，並依已收/訂購數量更新明細狀態
    pub fn receive(&mut self, quantity: Decimal, allow_over_receipt: bool) -> Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(MrpError::validation(format!(
                "收貨數量必須大於 0，目前為 {quantity}"
            )));
        }
        if self.status == PoItemStatus::Closed {
            return Err(MrpError::invalid_transition(
                "採購明細",
                self.id,
                self.status,
                "receive",
            ));
        }
        let received = self.received_qty.checked_add(quantity).ok_or_else(|| {
            MrpError::validation(format!("物料 {} 收貨數量溢位", self.material_id))
        })?;
        if !allow_over_receipt && received > self.quantity {
            return Err(MrpError::validation(format!(
                "物料 {} 收貨 {} 超過未收數量 {}",
                self.material_id,
                quantity,
                self.open_qty()
            )));
        }
        self.received_qty = received;
        self.status = if self.received_qty >= self.quantity {
            PoItemStatus::Received
        } else {
            PoItemStatus::Partial
        };
        Ok(())
    }
}

/// 採購訂單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub code: String,
    pub supplier_id: String,
    pub status: PurchaseOrderStatus,
    pub items: Vec<PurchaseOrderItem>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PurchaseOrder {
    /// 建立草稿採購訂單
    pub fn new(
        code: String,
        supplier_id: impl Into<String>,
        items: Vec<PurchaseOrderItem>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(MrpError::validation("採購訂單至少需要一筆明細"));
        }
        if let Some(bad) = items.iter().find(|item| item.quantity <= Decimal::ZERO) {
            return Err(MrpError::validation(format!(
                "物料 {} 的訂購數量必須大於 0",
                bad.material_id
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            code,
            supplier_id: supplier_id.into(),
            status: PurchaseOrderStatus::Draft,
            items,
            created_at: now,
            approved_at: None,
            sent_at: None,
            closed_at: None,
        })
    }

    fn transition(
        &mut self,
        allowed: &[PurchaseOrderStatus],
        next: PurchaseOrderStatus,
        action: &'static str,
    ) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(MrpError::invalid_transition(
                "採購訂單",
                &self.code,
                self.status,
                action,
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Draft → Pending
    pub fn submit(&mut self) -> Result<()> {
        self.transition(
            &[PurchaseOrderStatus::Draft],
            PurchaseOrderStatus::Pending,
            "submit",
        )
    }

    /// Pending → Approved
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[PurchaseOrderStatus::Pending],
            PurchaseOrderStatus::Approved,
            "approve",
        )?;
        self.approved_at = Some(now);
        Ok(())
    }

    /// Pending → Draft
    pub fn reject(&mut self) -> Result<()> {
        self.transition(
            &[PurchaseOrderStatus::Pending],
            PurchaseOrderStatus::Draft,
            "reject",
        )
    }

    /// Approved → Sent
    pub fn send(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[PurchaseOrderStatus::Approved],
            PurchaseOrderStatus::Sent,
            "send",
        )?;
        self.sent_at = Some(now);
        Ok(())
    }

    /// 檢查是否可收貨（Sent/Partial）
    pub fn ensure_receivable(&self) -> Result<()> {
        if !matches!(
            self.status,
            PurchaseOrderStatus::Sent | PurchaseOrderStatus::Partial
        ) {
            return Err(MrpError::invalid_transition(
                "採購訂單",
                &self.code,
                self.status,
                "receive",
            ));
        }
        Ok(())
    }

    /// 取得明細（可變）
    pub fn item_mut(&mut self, item_id: Uuid) -> Result<&mut PurchaseOrderItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| MrpError::not_found("採購明細", item_id))
    }

    /// 收貨後重新計算表頭狀態：全部明細已收才為 Received
    pub fn refresh_receipt_status(&mut self) {
        let all_received = self
            .items
            .iter()
            .all(|item| item.status == PoItemStatus::Received);
        self.status = if all_received {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::Partial
        };
    }

    /// Partial/Received → Closed（未結明細一併關閉）
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[PurchaseOrderStatus::Partial, PurchaseOrderStatus::Received],
            PurchaseOrderStatus::Closed,
            "close",
        )?;
        for item in &mut self.items {
            item.status = PoItemStatus::Closed;
        }
        self.closed_at = Some(now);
        Ok(())
    }

    /// 尚未收貨前可取消
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.items.iter().any(|item| item.received_qty > Decimal::ZERO) {
            return Err(MrpError::invalid_transition(
                "採購訂單",
                &self.code,
                self.status,
                "cancel",
            ));
        }
        self.transition(
            &[
                PurchaseOrderStatus::Draft,
                PurchaseOrderStatus::Pending,
                PurchaseOrderStatus::Approved,
                PurchaseOrderStatus::Sent,
            ],
            PurchaseOrderStatus::Cancelled,
            "cancel",
        )?;
        for item in &mut self.items {
            item.status = PoItemStatus::Closed;
        }
        self.closed_at = Some(now);
        Ok(())
    }
}
