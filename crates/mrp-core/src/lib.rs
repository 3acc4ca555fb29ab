//! # MRP Core
//!
//! 核心資料模型與類型定義：物料主檔、BOM、庫存帳、MRP 運算紀錄與各類訂單狀態機。

pub mod bom;
pub mod catalog;
pub mod config;
pub mod demand;
pub mod inventory;
pub mod material;
pub mod plan;
pub mod production;
pub mod purchase;
pub mod sales;
pub mod sequence;
pub mod source;
pub mod supply;

// Re-export 主要類型
pub use bom::{Bom, BomHeader, BomItem, BomStatus};
pub use catalog::InMemoryMasterData;
pub use config::MrpSettings;
pub use demand::Demand;
pub use inventory::{
    InventoryRecord, InventoryTransaction, ReferenceType, StockKey, TransactionType,
};
pub use material::{Material, Product, ProductStatus};
pub use plan::{
    ActionType, MrpResult, MrpRun, MrpRunStatus, MrpWarning, Page, WarningSeverity,
};
pub use production::{WorkOrder, WorkOrderMaterial, WorkOrderReport, WorkOrderStatus};
pub use purchase::{
    NewRequisition, PoItemStatus, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus,
    PurchaseRequisition, RequisitionSource, RequisitionStatus,
};
pub use sales::{SalesOrder, SalesOrderItem, SalesOrderStatus, SoItemStatus};
pub use sequence::DocumentSequence;
pub use source::{MasterData, OpenOrders, RequisitionSink, StockView};
pub use supply::{SupplyPosition, SupplyType};

use rust_decimal::Decimal;
use serde::Serialize;

/// MRP 錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MrpError {
    #[error("找不到{entity}: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} 目前狀態為 {from}，不允許執行 {action}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        from: String,
        action: &'static str,
    },

    #[error(
        "庫存不足：物料 {material_id} 倉庫 {warehouse_id} 需要 {requested}, 可用 {available}"
    )]
    InsufficientStock {
        material_id: String,
        warehouse_id: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("庫存不可為負：物料 {material_id} 倉庫 {warehouse_id} 現有 {current}, 調整 {delta}")]
    NegativeStock {
        material_id: String,
        warehouse_id: String,
        current: Decimal,
        delta: Decimal,
    },

    #[error("驗證錯誤: {0}")]
    Validation(String),

    #[error("上游資料錯誤: {0}")]
    UpstreamDependency(String),

    #[error("儲存層錯誤: {0}")]
    Storage(String),
}

impl MrpError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl ToString,
        from: impl ToString,
        action: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            id: id.to_string(),
            from: from.to_string(),
            action,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamDependency(msg.into())
    }

    /// 鎖中毒等儲存層異常
    pub fn poisoned(what: &str) -> Self {
        Self::Storage(format!("{what} 鎖已中毒"))
    }

    /// 穩定錯誤碼（供外部 API 層回傳）
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::NegativeStock { .. } => "NEGATIVE_STOCK",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UpstreamDependency(_) => "UPSTREAM_DEPENDENCY_FAILURE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// 轉為結構化錯誤負載
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// 結構化錯誤負載
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, MrpError>;

/// 以 `as_str` 實作 `Display`（狀態列舉共用）
macro_rules! display_as_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

pub(crate) use display_as_str;
