//! 需求模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MrpError, Result};

/// 獨立需求（彙總自未出貨的銷售訂單）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    /// 產品ID
    pub product_id: String,

    /// 需求數量
    pub quantity: Decimal,

    /// 來源單據（銷售訂單號）
    pub source_refs: Vec<String>,
}

impl Demand {
    /// 創建新的需求
    pub fn new(product_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            source_refs: Vec::new(),
        }
    }

    /// 累加需求並記錄來源
    pub fn accumulate(&mut self, quantity: Decimal, source_ref: impl Into<String>) -> Result<()> {
        self.quantity = self.quantity.checked_add(quantity).ok_or_else(|| {
            MrpError::validation(format!("產品 {} 需求數量溢位", self.product_id))
        })?;
        self.add_source_ref(source_ref);
        Ok(())
    }

    fn add_source_ref(&mut self, source_ref: impl Into<String>) {
        let source_ref = source_ref.into();
        if !self.source_refs.contains(&source_ref) {
            self.source_refs.push(source_ref);
        }
    }

    /// 是否有實際需求
    pub fn is_positive(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_accumulates_sources() {
        let mut demand = Demand::new("BIKE-001", Decimal::ZERO);
        demand.accumulate(Decimal::from(10), "SO-001").unwrap();
        demand.accumulate(Decimal::from(5), "SO-002").unwrap();
        demand.accumulate(Decimal::from(5), "SO-001").unwrap();

        assert_eq!(demand.quantity, Decimal::from(20));
        assert_eq!(demand.source_refs, vec!["SO-001".to_string(), "SO-002".to_string()]);
        assert!(demand.is_positive());
    }

    #[test]
    fn test_accumulate_overflow_keeps_quantity() {
        let mut demand = Demand::new("BIKE-001", Decimal::MAX);
        let err = demand.accumulate(Decimal::ONE, "SO-009").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(demand.quantity, Decimal::MAX);
        assert!(demand.source_refs.is_empty());
    }
}
