//! 庫存異動請求
//!
//! 每種操作一個請求結構；`into_movement` 先做欄位驗證，
//! 通過後才會進入帳本過帳。

use mrp_core::{MrpError, ReferenceType, Result, StockKey, TransactionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 單據參照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub reference_code: Option<String>,
}

impl DocumentRef {
    pub fn new(reference_type: ReferenceType) -> Self {
        Self {
            reference_type,
            reference_id: None,
            reference_code: None,
        }
    }

    /// 參照到具體單據
    pub fn document(reference_type: ReferenceType, id: Uuid, code: impl Into<String>) -> Self {
        Self {
            reference_type,
            reference_id: Some(id),
            reference_code: Some(code.into()),
        }
    }
}

/// 入庫請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub material_id: String,
    pub warehouse_id: String,
    pub batch_no: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub reference: DocumentRef,
    pub operator: String,
    pub remark: Option<String>,
}

impl InboundRequest {
    pub fn new(
        material_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        quantity: Decimal,
        reference: DocumentRef,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            warehouse_id: warehouse_id.into(),
            batch_no: None,
            quantity,
            unit_cost: Decimal::ZERO,
            reference,
            operator: "system".to_string(),
            remark: None,
        }
    }

    pub fn with_batch(mut self, batch_no: impl Into<String>) -> Self {
        self.batch_no = Some(batch_no.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    /// 驗證並轉為過帳異動
    pub fn into_movement(self) -> Result<StockMovement> {
        require_positive(self.quantity, "入庫數量")?;
        if self.unit_cost < Decimal::ZERO {
            return Err(MrpError::validation("單位成本不可為負"));
        }
        let transaction_type = TransactionType::for_inbound(self.reference.reference_type)?;

        Ok(StockMovement {
            key: StockKey::new(self.material_id, self.warehouse_id),
            batch_no: self.batch_no,
            action: MovementAction::Receive {
                unit_cost: Some(self.unit_cost),
            },
            quantity: self.quantity,
            transaction_type,
            reference: self.reference,
            operator: self.operator,
            remark: self.remark,
        })
    }
}

/// 出庫請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub material_id: String,
    pub warehouse_id: String,
    /// 未指定時依先進先出扣減各批次
    pub batch_no: Option<String>,
    pub quantity: Decimal,
    pub reference: DocumentRef,
    pub operator: String,
    pub remark: Option<String>,
}

impl OutboundRequest {
    pub fn new(
        material_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        quantity: Decimal,
        reference: DocumentRef,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            warehouse_id: warehouse_id.into(),
            batch_no: None,
            quantity,
            reference,
            operator: "system".to_string(),
            remark: None,
        }
    }

    pub fn with_batch(mut self, batch_no: impl Into<String>) -> Self {
        self.batch_no = Some(batch_no.into());
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn into_movement(self) -> Result<StockMovement> {
        require_positive(self.quantity, "出庫數量")?;
        let transaction_type = TransactionType::for_outbound(self.reference.reference_type)?;

        Ok(StockMovement {
            key: StockKey::new(self.material_id, self.warehouse_id),
            batch_no: self.batch_no,
            action: MovementAction::Issue,
            quantity: self.quantity,
            transaction_type,
            reference: self.reference,
            operator: self.operator,
            remark: self.remark,
        })
    }
}

/// 盤點調整請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub material_id: String,
    pub warehouse_id: String,
    pub batch_no: Option<String>,
    /// 帶正負號的調整量
    pub quantity: Decimal,
    pub reason: String,
    pub operator: String,
}

impl AdjustRequest {
    pub fn new(
        material_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        quantity: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            warehouse_id: warehouse_id.into(),
            batch_no: None,
            quantity,
            reason: reason.into(),
            operator: "system".to_string(),
        }
    }

    pub fn with_batch(mut self, batch_no: impl Into<String>) -> Self {
        self.batch_no = Some(batch_no.into());
        self
    }

    pub fn into_movement(self) -> Result<StockMovement> {
        if self.quantity.is_zero() {
            return Err(MrpError::validation("調整數量不可為 0"));
        }
        if self.reason.trim().is_empty() {
            return Err(MrpError::validation("盤點調整必須填寫原因"));
        }

        Ok(StockMovement {
            key: StockKey::new(self.material_id, self.warehouse_id),
            batch_no: self.batch_no,
            action: MovementAction::Adjust,
            quantity: self.quantity,
            transaction_type: TransactionType::Adjust,
            reference: DocumentRef::new(ReferenceType::Adjustment),
            operator: self.operator,
            remark: Some(self.reason),
        })
    }
}

/// 倉庫調撥請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub material_id: String,
    pub from_warehouse: String,
    pub to_warehouse: String,
    pub batch_no: Option<String>,
    pub quantity: Decimal,
    pub operator: String,
    pub remark: Option<String>,
}

impl TransferRequest {
    pub fn new(
        material_id: impl Into<String>,
        from_warehouse: impl Into<String>,
        to_warehouse: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            from_warehouse: from_warehouse.into(),
            to_warehouse: to_warehouse.into(),
            batch_no: None,
            quantity,
            operator: "system".to_string(),
            remark: None,
        }
    }

    /// 轉為「調出 + 調入」兩筆異動，調入沿用調出的成本
    pub fn into_movements(self) -> Result<Vec<StockMovement>> {
        require_positive(self.quantity, "調撥數量")?;
        if self.from_warehouse == self.to_warehouse {
            return Err(MrpError::validation("調出與調入倉庫不可相同"));
        }

        let reference = DocumentRef::new(ReferenceType::Transfer);
        let out = StockMovement {
            key: StockKey::new(self.material_id.clone(), self.from_warehouse),
            batch_no: self.batch_no.clone(),
            action: MovementAction::Issue,
            quantity: self.quantity,
            transaction_type: TransactionType::Transfer,
            reference: reference.clone(),
            operator: self.operator.clone(),
            remark: self.remark.clone(),
        };
        let into = StockMovement {
            key: StockKey::new(self.material_id, self.to_warehouse),
            batch_no: self.batch_no,
            action: MovementAction::Receive { unit_cost: None },
            quantity: self.quantity,
            transaction_type: TransactionType::Transfer,
            reference,
            operator: self.operator,
            remark: self.remark,
        };
        Ok(vec![out, into])
    }
}

/// 過帳動作
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementAction {
    /// 入庫；`None` 表示沿用同一批過帳中最近一次出庫的成本
    Receive { unit_cost: Option<Decimal> },
    /// 出庫（只扣可用量）
    Issue,
    /// 調整（帶正負號）
    Adjust,
}

/// 已驗證的單筆庫存異動，`InventoryLedger::post` 的輸入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub key: StockKey,
    pub batch_no: Option<String>,
    pub action: MovementAction,
    pub quantity: Decimal,
    pub transaction_type: TransactionType,
    pub reference: DocumentRef,
    pub operator: String,
    pub remark: Option<String>,
}

pub(crate) fn require_positive(quantity: Decimal, what: &str) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(MrpError::validation(format!("{what}必須大於 0，實際為 {quantity}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ReferenceType::PurchaseOrder, TransactionType::PurchaseIn)]
    #[case(ReferenceType::WorkOrder, TransactionType::ProductionIn)]
    #[case(ReferenceType::Return, TransactionType::ReturnIn)]
    fn test_inbound_transaction_type(
        #[case] reference: ReferenceType,
        #[case] expected: TransactionType,
    ) {
        let movement = InboundRequest::new("M", "WH", Decimal::TEN, DocumentRef::new(reference))
            .into_movement()
            .unwrap();
        assert_eq!(movement.transaction_type, expected);
    }

    #[rstest]
    #[case(ReferenceType::SalesOrder)]
    #[case(ReferenceType::Scrap)]
    #[case(ReferenceType::Adjustment)]
    fn test_inbound_rejects_reference(#[case] reference: ReferenceType) {
        let err = InboundRequest::new("M", "WH", Decimal::TEN, DocumentRef::new(reference))
            .into_movement()
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[rstest]
    #[case(Decimal::ZERO)]
    #[case(Decimal::NEGATIVE_ONE)]
    fn test_outbound_requires_positive(#[case] quantity: Decimal) {
        let err = OutboundRequest::new(
            "M",
            "WH",
            quantity,
            DocumentRef::new(ReferenceType::SalesOrder),
        )
        .into_movement()
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_adjust_requires_reason() {
        assert!(AdjustRequest::new("M", "WH", Decimal::ONE, "  ")
            .into_movement()
            .is_err());
        assert!(AdjustRequest::new("M", "WH", Decimal::ZERO, "盤盈")
            .into_movement()
            .is_err());

        let movement = AdjustRequest::new("M", "WH", Decimal::NEGATIVE_ONE, "盤虧")
            .into_movement()
            .unwrap();
        assert_eq!(movement.remark.as_deref(), Some("盤虧"));
        assert_eq!(movement.reference.reference_type, ReferenceType::Adjustment);
    }

    #[test]
    fn test_transfer_same_warehouse_rejected() {
        let err = TransferRequest::new("M", "WH", "WH", Decimal::ONE)
            .into_movements()
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
