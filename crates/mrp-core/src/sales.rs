//! 銷售訂單狀態機

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{display_as_str, MrpError, Result};

/// 銷售訂單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    Picking,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Picking => "PICKING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// 此狀態的未出貨數量是否構成 MRP 需求
    pub fn is_open_demand(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Picking)
    }
}

/// 銷售明細狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoItemStatus {
    Open,
    Closed,
}

impl SoItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

display_as_str!(SalesOrderStatus, SoItemStatus);

/// 銷售訂單明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderItem {
    pub id: Uuid,
    pub product_id: String,
    pub quantity: Decimal,
    pub shipped_qty: Decimal,
    pub unit_price: Decimal,
    pub status: SoItemStatus,
}

impl SalesOrderItem {
    pub fn new(product_id: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: product_id.into(),
            quantity,
            shipped_qty: Decimal::ZERO,
            unit_price,
            status: SoItemStatus::Open,
        }
    }

    /// 未出貨數量
    pub fn open_qty(&self) -> Decimal {
        self.quantity - self.shipped_qty
    }
}

/// 銷售訂單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    pub code: String,
    pub customer_id: String,
    pub status: SalesOrderStatus,
    pub items: Vec<SalesOrderItem>,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub shipped_at: Option<DateTime<Utc>>,
}

impl SalesOrder {
    /// 建立待確認的銷售訂單
    pub fn new(
        code: String,
        customer_id: impl Into<String>,
        items: Vec<SalesOrderItem>,
        order_date: NaiveDate,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(MrpError::validation("銷售訂單至少需要一筆明細"));
        }
        if let Some(bad) = items.iter().find(|item| item.quantity <= Decimal::ZERO) {
            return Err(MrpError::validation(format!(
                "產品 {} 的訂購數量必須大於 0",
                bad.product_id
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            code,
            customer_id: customer_id.into(),
            status: SalesOrderStatus::Pending,
            items,
            order_date,
            delivery_date: None,
            shipped_at: None,
        })
    }

    /// 建構器模式：設置交期
    pub fn with_delivery_date(mut self, date: NaiveDate) -> Self {
        self.delivery_date = Some(date);
        self
    }

    fn transition(
        &mut self,
        allowed: &[SalesOrderStatus],
        next: SalesOrderStatus,
        action: &'static str,
    ) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(MrpError::invalid_transition(
                "銷售訂單",
                &self.code,
                self.status,
                action,
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Pending → Confirmed
    pub fn confirm(&mut self) -> Result<()> {
        self.transition(
            &[SalesOrderStatus::Pending],
            SalesOrderStatus::Confirmed,
            "confirm",
        )
    }

    /// Confirmed → Picking
    pub fn start_picking(&mut self) -> Result<()> {
        self.transition(
            &[SalesOrderStatus::Confirmed],
            SalesOrderStatus::Picking,
            "start_picking",
        )
    }

    /// Confirmed/Picking → Shipped，所有明細視為全數出貨
    pub fn ship(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[SalesOrderStatus::Confirmed, SalesOrderStatus::Picking],
            SalesOrderStatus::Shipped,
            "ship",
        )?;
        for item in &mut self.items {
            item.shipped_qty = item.quantity;
            item.status = SoItemStatus::Closed;
        }
        self.shipped_at = Some(now);
        Ok(())
    }

    /// Shipped → Delivered
    pub fn deliver(&mut self) -> Result<()> {
        self.transition(
            &[SalesOrderStatus::Shipped],
            SalesOrderStatus::Delivered,
            "deliver",
        )
    }

    /// Delivered → Completed
    pub fn complete(&mut self) -> Result<()> {
        self.transition(
            &[SalesOrderStatus::Delivered],
            SalesOrderStatus::Completed,
            "complete",
        )
    }

    /// 出貨前可取消
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(
            &[
                SalesOrderStatus::Pending,
                SalesOrderStatus::Confirmed,
                SalesOrderStatus::Picking,
            ],
            SalesOrderStatus::Cancelled,
            "cancel",
        )?;
        for item in &mut self.items {
            item.status = SoItemStatus::Closed;
        }
        Ok(())
    }
}
