//! 物料與產品主檔（唯讀）

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 物料主檔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// 物料ID
    pub id: String,

    /// 物料名稱
    pub name: String,

    /// 計量單位
    pub unit: String,

    /// 提前期（天）
    pub lead_time_days: u32,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 標準成本
    pub standard_cost: Decimal,
}

impl Material {
    /// 創建新的物料
    pub fn new(id: impl Into<String>, unit: impl Into<String>, lead_time_days: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            unit: unit.into(),
            lead_time_days,
            safety_stock: Decimal::ZERO,
            standard_cost: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 建構器模式：設置安全庫存
    pub fn with_safety_stock(mut self, stock: Decimal) -> Self {
        self.safety_stock = stock;
        self
    }

    /// 建構器模式：設置標準成本
    pub fn with_standard_cost(mut self, cost: Decimal) -> Self {
        self.standard_cost = cost;
        self
    }
}

/// 產品狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    Inactive,
}

/// 產品主檔（成品，需求的來源）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub status: ProductStatus,
}

impl Product {
    pub fn active(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            status: ProductStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}
