//! 庫存模型：庫存記錄與異動日記帳

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{display_as_str, MrpError, Result};

/// 庫存鎖定鍵（物料 + 倉庫）
///
/// 同一鍵下的所有批次共用同一把鎖。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub material_id: String,
    pub warehouse_id: String,
}

impl StockKey {
    pub fn new(material_id: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            warehouse_id: warehouse_id.into(),
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.material_id, self.warehouse_id)
    }
}

/// 庫存記錄（物料 + 倉庫 + 批次）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,

    /// 物料ID
    pub material_id: String,

    /// 倉庫
    pub warehouse_id: String,

    /// 批號
    pub batch_no: Option<String>,

    /// 現有庫存
    pub quantity: Decimal,

    /// 已預留數量（鎖定）
    pub reserved_qty: Decimal,

    /// 可用庫存（現有 - 已預留）
    pub available_qty: Decimal,

    /// 單位成本（移動加權平均）
    pub unit_cost: Decimal,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 最高庫存
    pub max_stock: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// 創建空的庫存記錄
    pub fn new(
        material_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        batch_no: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            material_id: material_id.into(),
            warehouse_id: warehouse_id.into(),
            batch_no,
            quantity: Decimal::ZERO,
            reserved_qty: Decimal::ZERO,
            available_qty: Decimal::ZERO,
            unit_cost: Decimal::ZERO,
            safety_stock: Decimal::ZERO,
            max_stock: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.material_id.clone(), self.warehouse_id.clone())
    }

    /// 計算可用庫存
    fn calculate_available(&mut self) {
        self.available_qty = self.quantity - self.reserved_qty;
    }

    /// 入庫：增加數量並以移動加權平均更新單位成本
    ///
    /// 數量或金額溢位時回傳驗證錯誤，記錄不變
    pub fn receive(
        &mut self,
        quantity: Decimal,
        unit_cost: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let overflow = || self.overflow("入庫");
        let new_qty = self.quantity.checked_add(quantity).ok_or_else(overflow)?;
        let new_cost = if new_qty > Decimal::ZERO {
            self.quantity
                .checked_mul(self.unit_cost)
                .and_then(|held| quantity.checked_mul(unit_cost)?.checked_add(held))
                .and_then(|value| value.checked_div(new_qty))
                .ok_or_else(overflow)?
        } else {
            self.unit_cost
        };
        self.unit_cost = new_cost;
        self.quantity = new_qty;
        self.calculate_available();
        self.updated_at = now;
        Ok(())
    }

    fn overflow(&self, action: &str) -> MrpError {
        MrpError::validation(format!(
            "{action}數量或金額溢位：{}@{}",
            self.material_id, self.warehouse_id
        ))
    }

    /// 出庫：只能扣減可用庫存
    pub fn issue(&mut self, quantity: Decimal, now: DateTime<Utc>) -> Result<()> {
        if quantity > self.available_qty {
            return Err(MrpError::InsufficientStock {
                material_id: self.material_id.clone(),
                warehouse_id: self.warehouse_id.clone(),
                requested: quantity,
                available: self.available_qty,
            });
        }
        self.quantity -= quantity;
        self.calculate_available();
        self.updated_at = now;
        Ok(())
    }

    /// 盤點調整（正數增加、負數減少）
    pub fn adjust(&mut self, delta: Decimal, now: DateTime<Utc>) -> Result<()> {
        let new_qty = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| self.overflow("盤點調整"))?;
        if new_qty < Decimal::ZERO || new_qty - self.reserved_qty < Decimal::ZERO {
            return Err(MrpError::NegativeStock {
                material_id: self.material_id.clone(),
                warehouse_id: self.warehouse_id.clone(),
                current: self.available_qty,
                delta,
            });
        }
        self.quantity = new_qty;
        self.calculate_available();
        self.updated_at = now;
        Ok(())
    }

    /// 預留庫存
    pub fn reserve(&mut self, quantity: Decimal, now: DateTime<Utc>) -> Result<()> {
        if quantity > self.available_qty {
            return Err(MrpError::InsufficientStock {
                material_id: self.material_id.clone(),
                warehouse_id: self.warehouse_id.clone(),
                requested: quantity,
                available: self.available_qty,
            });
        }
        self.reserved_qty += quantity;
        self.calculate_available();
        self.updated_at = now;
        Ok(())
    }

    /// 釋放已預留的庫存
    pub fn release(&mut self, quantity: Decimal, now: DateTime<Utc>) -> Result<()> {
        if quantity > self.reserved_qty {
            return Err(MrpError::validation(format!(
                "釋放數量超過已預留數量：釋放 {}, 已預留 {}",
                quantity, self.reserved_qty
            )));
        }
        self.reserved_qty -= quantity;
        self.calculate_available();
        self.updated_at = now;
        Ok(())
    }

    /// 檢查庫存是否低於安全庫存
    pub fn is_below_safety_stock(&self) -> bool {
        self.available_qty < self.safety_stock
    }

    /// 檢查庫存是否超過最高庫存
    pub fn is_overstocked(&self) -> bool {
        self.max_stock.is_some_and(|max| self.quantity > max)
    }

    /// 獲取需要補充的數量
    pub fn replenishment_needed(&self) -> Decimal {
        if self.is_below_safety_stock() {
            self.safety_stock - self.available_qty
        } else {
            Decimal::ZERO
        }
    }

    /// 數量欄位是否一致
    pub fn is_consistent(&self) -> bool {
        self.available_qty == self.quantity - self.reserved_qty
            && self.available_qty >= Decimal::ZERO
            && self.reserved_qty >= Decimal::ZERO
    }
}

/// 單據來源類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// 採購訂單
    PurchaseOrder,
    /// 生產工單
    WorkOrder,
    /// 退貨
    Return,
    /// 銷售訂單
    SalesOrder,
    /// 報廢
    Scrap,
    /// 盤點調整
    Adjustment,
    /// 調撥
    Transfer,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurchaseOrder => "PO",
            Self::WorkOrder => "WO",
            Self::Return => "RETURN",
            Self::SalesOrder => "SO",
            Self::Scrap => "SCRAP",
            Self::Adjustment => "ADJUST",
            Self::Transfer => "TRANSFER",
        }
    }
}

/// 庫存異動類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    PurchaseIn,
    ProductionIn,
    ReturnIn,
    ProductionOut,
    SalesOut,
    ScrapOut,
    Adjust,
    Transfer,
}

impl TransactionType {
    /// 由入庫來源推導異動類型
    pub fn for_inbound(reference: ReferenceType) -> Result<Self> {
        match reference {
            ReferenceType::PurchaseOrder => Ok(Self::PurchaseIn),
            ReferenceType::WorkOrder => Ok(Self::ProductionIn),
            ReferenceType::Return => Ok(Self::ReturnIn),
            other => Err(MrpError::validation(format!(
                "入庫來源類型不可為 {}",
                other.as_str()
            ))),
        }
    }

    /// 由出庫來源推導異動類型
    pub fn for_outbound(reference: ReferenceType) -> Result<Self> {
        match reference {
            ReferenceType::WorkOrder => Ok(Self::ProductionOut),
            ReferenceType::SalesOrder => Ok(Self::SalesOut),
            ReferenceType::Scrap => Ok(Self::ScrapOut),
            other => Err(MrpError::validation(format!(
                "出庫來源類型不可為 {}",
                other.as_str()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurchaseIn => "purchase-in",
            Self::ProductionIn => "production-in",
            Self::ReturnIn => "return-in",
            Self::ProductionOut => "production-out",
            Self::SalesOut => "sales-out",
            Self::ScrapOut => "scrap-out",
            Self::Adjust => "adjust",
            Self::Transfer => "transfer",
        }
    }
}

display_as_str!(ReferenceType, TransactionType);

/// 庫存異動日記帳（僅可附加，不可修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: Uuid,

    /// 日記帳序號（全域遞增）
    pub sequence: u64,

    pub material_id: String,
    pub warehouse_id: String,
    pub batch_no: Option<String>,

    pub transaction_type: TransactionType,

    /// 帶正負號的數量（正數入庫、負數出庫）
    pub quantity: Decimal,

    pub unit_cost: Decimal,

    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub reference_code: Option<String>,

    /// 操作人員
    pub operator: String,

    pub remark: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.material_id.clone(), self.warehouse_id.clone())
    }

    pub fn is_inbound(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quantity: i64) -> InventoryRecord {
        let mut record = InventoryRecord::new("FRAME-001", "WH-01", None, Utc::now());
        record
            .receive(Decimal::from(quantity), Decimal::from(10), Utc::now())
            .unwrap();
        record
    }

    #[test]
    fn test_create_inventory_record() {
        let record = record(100);
        assert_eq!(record.quantity, Decimal::from(100));
        assert_eq!(record.available_qty, Decimal::from(100));
        assert_eq!(record.unit_cost, Decimal::from(10));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_weighted_average_cost() {
        let mut record = record(100);
        record
            .receive(Decimal::from(100), Decimal::from(20), Utc::now())
            .unwrap();
        assert_eq!(record.unit_cost, Decimal::from(15));
    }

    #[test]
    fn test_receive_overflow_leaves_record_unchanged() {
        let mut record = record(100);
        let huge = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);

        let err = record
            .receive(huge, Decimal::from(10_000_000_000u64), Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(record.quantity, Decimal::from(100));
        assert_eq!(record.unit_cost, Decimal::from(10));

        let err = record.adjust(Decimal::MAX, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(record.is_consistent());
    }

    #[test]
    fn test_inventory_reservation() {
        let mut record = record(100);

        // 預留庫存
        assert!(record.reserve(Decimal::from(50), Utc::now()).is_ok());
        assert_eq!(record.reserved_qty, Decimal::from(50));
        assert_eq!(record.available_qty, Decimal::from(50));

        // 超量預留應該失敗
        assert!(record.reserve(Decimal::from(60), Utc::now()).is_err());

        // 釋放庫存
        assert!(record.release(Decimal::from(30), Utc::now()).is_ok());
        assert_eq!(record.reserved_qty, Decimal::from(20));
        assert_eq!(record.available_qty, Decimal::from(80));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_issue_respects_reservation() {
        let mut record = record(60);
        record.reserve(Decimal::from(20), Utc::now()).unwrap();

        let err = record.issue(Decimal::from(50), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(record.quantity, Decimal::from(60));

        record.issue(Decimal::from(40), Utc::now()).unwrap();
        assert_eq!(record.quantity, Decimal::from(20));
        assert_eq!(record.available_qty, Decimal::ZERO);
    }

    #[test]
    fn test_adjust_cannot_go_negative() {
        let mut record = record(10);
        let err = record.adjust(Decimal::from(-11), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "NEGATIVE_STOCK");
        assert_eq!(record.quantity, Decimal::from(10));

        record.adjust(Decimal::from(-10), Utc::now()).unwrap();
        assert_eq!(record.quantity, Decimal::ZERO);
    }

    #[test]
    fn test_replenishment_needed() {
        let mut record = record(5);
        record.safety_stock = Decimal::from(20);
        record.max_stock = Some(Decimal::from(4));

        assert!(record.is_below_safety_stock());
        assert!(record.is_overstocked());
        assert_eq!(record.replenishment_needed(), Decimal::from(15));
    }

    #[test]
    fn test_transaction_type_mapping() {
        assert_eq!(
            TransactionType::for_inbound(ReferenceType::PurchaseOrder).unwrap(),
            TransactionType::PurchaseIn
        );
        assert_eq!(
            TransactionType::for_outbound(ReferenceType::Scrap).unwrap(),
            TransactionType::ScrapOut
        );
        assert!(TransactionType::for_inbound(ReferenceType::SalesOrder).is_err());
        assert!(TransactionType::for_outbound(ReferenceType::Return).is_err());
        assert_eq!(TransactionType::PurchaseIn.to_string(), "purchase-in");
    }
}
