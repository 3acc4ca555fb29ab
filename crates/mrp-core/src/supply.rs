//! 供應模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::display_as_str;

/// 供應類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyType {
    /// 現有庫存
    OnHand,
    /// 採購在途
    PurchaseOrder,
    /// 生產中工單
    WorkOrder,
}

impl SupplyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnHand => "on-hand",
            Self::PurchaseOrder => "in-transit",
            Self::WorkOrder => "in-production",
        }
    }
}

display_as_str!(SupplyType);

/// 單一物料的供應狀況
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyPosition {
    /// 物料ID
    pub material_id: String,

    /// 可用庫存（全部倉庫）
    pub on_hand: Decimal,

    /// 採購在途
    pub in_transit: Decimal,

    /// 生產中
    pub in_production: Decimal,
}

impl SupplyPosition {
    /// 創建空的供應狀況
    pub fn empty(material_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            on_hand: Decimal::ZERO,
            in_transit: Decimal::ZERO,
            in_production: Decimal::ZERO,
        }
    }

    /// 設置指定類型的供應數量
    pub fn set(&mut self, supply_type: SupplyType, quantity: Decimal) {
        match supply_type {
            SupplyType::OnHand => self.on_hand = quantity,
            SupplyType::PurchaseOrder => self.in_transit = quantity,
            SupplyType::WorkOrder => self.in_production = quantity,
        }
    }

    /// 總供應
    pub fn total(&self) -> Decimal {
        self.on_hand + self.in_transit + self.in_production
    }
}
