//! 帳本查詢條件與報表

use mrp_core::{InventoryRecord, InventoryTransaction, ReferenceType, StockKey, TransactionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 庫存記錄篩選
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryFilter {
    pub material_id: Option<String>,
    pub warehouse_id: Option<String>,
    /// 只列出低於安全庫存者
    pub below_safety_stock: bool,
}

impl InventoryFilter {
    pub fn material(material_id: impl Into<String>) -> Self {
        Self {
            material_id: Some(material_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &InventoryRecord) -> bool {
        self.material_id
            .as_ref()
            .map_or(true, |m| *m == record.material_id)
            && self
                .warehouse_id
                .as_ref()
                .map_or(true, |w| *w == record.warehouse_id)
            && (!self.below_safety_stock || record.is_below_safety_stock())
    }
}

/// 異動日記帳篩選
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub material_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
}

impl TransactionFilter {
    pub fn material(material_id: impl Into<String>) -> Self {
        Self {
            material_id: Some(material_id.into()),
            ..Self::default()
        }
    }

    pub fn reference(reference_type: ReferenceType, reference_id: Uuid) -> Self {
        Self {
            reference_type: Some(reference_type),
            reference_id: Some(reference_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &InventoryTransaction) -> bool {
        self.material_id.as_ref().map_or(true, |m| *m == tx.material_id)
            && self
                .warehouse_id
                .as_ref()
                .map_or(true, |w| *w == tx.warehouse_id)
            && self
                .transaction_type
                .map_or(true, |t| t == tx.transaction_type)
            && self.reference_type.map_or(true, |r| r == tx.reference_type)
            && self
                .reference_id
                .map_or(true, |id| tx.reference_id == Some(id))
    }
}

/// 庫存警示類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    /// 可用量低於安全庫存
    LowStock,
    /// 現有量超過最高庫存
    Overstock,
}

/// 庫存警示（以物料 + 倉庫彙總）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub key: StockKey,
    pub kind: AlertKind,
    /// LowStock 為可用量，Overstock 為現有量
    pub current: Decimal,
    pub threshold: Decimal,
}

impl StockAlert {
    /// 與門檻的差距（恆為正）
    pub fn gap(&self) -> Decimal {
        (self.threshold - self.current).abs()
    }
}

/// 帳實核對結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub key: StockKey,
    /// 庫存記錄現有量合計
    pub record_quantity: Decimal,
    /// 日記帳數量合計
    pub journal_quantity: Decimal,
    /// 各記錄欄位是否一致（可用 = 現有 - 預留，且不為負）
    pub records_consistent: bool,
}

impl ReconcileReport {
    pub fn is_balanced(&self) -> bool {
        self.record_quantity == self.journal_quantity && self.records_consistent
    }
}
