//! 供應狀況查詢
//!
//! 三項查詢彼此獨立；任一查詢失敗時以 0 計算並留下診斷，
//! 不中斷整個 MRP 運算。

use mrp_core::source::{checked_sum, total_available};
use mrp_core::{
    MrpWarning, OpenOrders, PoItemStatus, Result, StockView, SupplyPosition, SupplyType,
};
use rust_decimal::Decimal;

/// 供應狀況解析器
pub struct SupplyResolver<'a> {
    stock: &'a dyn StockView,
    orders: &'a dyn OpenOrders,
}

impl<'a> SupplyResolver<'a> {
    pub fn new(stock: &'a dyn StockView, orders: &'a dyn OpenOrders) -> Self {
        Self { stock, orders }
    }

    /// 可用庫存：全部倉庫的 available_qty（排除已預留）
    pub fn on_hand(&self, material_id: &str) -> Result<Decimal> {
        let records = self.stock.stock_records(material_id)?;
        total_available(&records)
    }

    /// 採購在途：已核准/已發送/部分收貨訂單中未結明細的未收數量
    pub fn in_transit(&self, material_id: &str) -> Result<Decimal> {
        let lines = self.orders.purchase_lines(material_id)?;
        let open = lines
            .iter()
            .filter(|(status, item)| {
                status.counts_as_in_transit()
                    && item.status != PoItemStatus::Closed
                    && item.material_id == material_id
            })
            .map(|(_, item)| item.quantity - item.received_qty)
            .filter(|qty| *qty > Decimal::ZERO);
        checked_sum(open, "採購在途")
    }

    /// 生產中：未完工工單的「計劃 - 已完工」
    pub fn in_production(&self, material_id: &str) -> Result<Decimal> {
        let work_orders = self.orders.work_orders_for(material_id)?;
        let remaining = work_orders
            .iter()
            .filter(|wo| wo.status.counts_as_in_production() && wo.product_id == material_id)
            .map(|wo| wo.remaining_qty());
        checked_sum(remaining, "生產中")
    }

    /// 查詢完整供應狀況，失敗的項目以 0 計算並回傳診斷
    pub fn resolve(&self, material_id: &str) -> (SupplyPosition, Vec<MrpWarning>) {
        let mut position = SupplyPosition::empty(material_id);
        let mut warnings = Vec::new();

        for supply_type in [
            SupplyType::OnHand,
            SupplyType::PurchaseOrder,
            SupplyType::WorkOrder,
        ] {
            let result = match supply_type {
                SupplyType::OnHand => self.on_hand(material_id),
                SupplyType::PurchaseOrder => self.in_transit(material_id),
                SupplyType::WorkOrder => self.in_production(material_id),
            };

            match result {
                Ok(quantity) => position.set(supply_type, quantity),
                Err(error) => {
                    tracing::warn!(
                        material_id,
                        query = supply_type.as_str(),
                        %error,
                        "供應查詢失敗，以 0 計算"
                    );
                    warnings.push(MrpWarning::warning(
                        material_id.to_string(),
                        format!("{supply_type} 查詢失敗，以 0 計算: {error}"),
                    ));
                }
            }
        }

        (position, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use mrp_core::{
        InventoryRecord, MrpError, PurchaseOrderItem, PurchaseOrderStatus, SalesOrder, WorkOrder,
        WorkOrderStatus,
    };

    struct FakeStock {
        records: Vec<InventoryRecord>,
    }

    impl StockView for FakeStock {
        fn stock_records(&self, material_id: &str) -> Result<Vec<InventoryRecord>> {
            Ok(self
                .records
                .iter()
                .filter(|r| r.material_id == material_id)
                .cloned()
                .collect())
        }
    }

    struct FakeOrders {
        lines: Vec<(PurchaseOrderStatus, PurchaseOrderItem)>,
        work_orders: Vec<WorkOrder>,
        fail_purchase: bool,
    }

    impl OpenOrders for FakeOrders {
        fn sales_orders(&self) -> Result<Vec<SalesOrder>> {
            Ok(Vec::new())
        }

        fn purchase_lines(
            &self,
            material_id: &str,
        ) -> Result<Vec<(PurchaseOrderStatus, PurchaseOrderItem)>> {
            if self.fail_purchase {
                return Err(MrpError::Storage("連線逾時".to_string()));
            }
            Ok(self
                .lines
                .iter()
                .filter(|(_, item)| item.material_id == material_id)
                .cloned()
                .collect())
        }

        fn work_orders_for(&self, material_id: &str) -> Result<Vec<WorkOrder>> {
            Ok(self
                .work_orders
                .iter()
                .filter(|wo| wo.product_id == material_id)
                .cloned()
                .collect())
        }
    }

    fn record(warehouse: &str, quantity: i64, reserved: i64) -> InventoryRecord {
        let mut record = InventoryRecord::new("M", warehouse, None, Utc::now());
        record
            .receive(Decimal::from(quantity), Decimal::ONE, Utc::now())
            .unwrap();
        record.reserve(Decimal::from(reserved), Utc::now()).unwrap();
        record
    }

    fn line(status: PurchaseOrderStatus, ordered: i64, received: i64) -> (PurchaseOrderStatus, PurchaseOrderItem) {
        let mut item = PurchaseOrderItem::new("M", Decimal::from(ordered), Decimal::ONE);
        item.received_qty = Decimal::from(received);
        (status, item)
    }

    fn work_order(status: WorkOrderStatus, planned: i64, completed: i64) -> WorkOrder {
        let mut wo = WorkOrder::new(
            "WO".to_string(),
            "M",
            "WH",
            Decimal::from(planned),
            Vec::new(),
            Utc::now(),
        )
        .unwrap()
        .with_schedule(
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 11, 5).unwrap(),
        );
        wo.status = status;
        wo.completed_qty = Decimal::from(completed);
        wo
    }

    fn orders(fail_purchase: bool) -> FakeOrders {
        FakeOrders {
            lines: vec![
                line(PurchaseOrderStatus::Approved, 50, 0),
                line(PurchaseOrderStatus::Partial, 50, 30),
                line(PurchaseOrderStatus::Draft, 100, 0),
                line(PurchaseOrderStatus::Received, 10, 10),
            ],
            work_orders: vec![
                work_order(WorkOrderStatus::Released, 40, 0),
                work_order(WorkOrderStatus::InProgress, 40, 25),
                work_order(WorkOrderStatus::Completed, 40, 40),
            ],
            fail_purchase,
        }
    }

    #[test]
    fn test_resolve_all_sources() {
        let stock = FakeStock {
            records: vec![record("WH-1", 30, 10), record("WH-2", 5, 0)],
        };
        let orders = orders(false);
        let resolver = SupplyResolver::new(&stock, &orders);

        let (position, warnings) = resolver.resolve("M");
        assert!(warnings.is_empty());
        assert_eq!(position.on_hand, Decimal::from(25));
        assert_eq!(position.in_transit, Decimal::from(70));
        assert_eq!(position.in_production, Decimal::from(55));
    }

    #[test]
    fn test_closed_line_not_in_transit() {
        let stock = FakeStock { records: Vec::new() };
        let mut orders = orders(false);
        orders.lines[0].1.status = PoItemStatus::Closed;
        let resolver = SupplyResolver::new(&stock, &orders);

        assert_eq!(resolver.in_transit("M").unwrap(), Decimal::from(20));
    }

    #[test]
    fn test_query_failure_degrades_to_zero() {
        let stock = FakeStock {
            records: vec![record("WH-1", 30, 0)],
        };
        let orders = orders(true);
        let resolver = SupplyResolver::new(&stock, &orders);

        let (position, warnings) = resolver.resolve("M");
        assert_eq!(position.on_hand, Decimal::from(30));
        assert_eq!(position.in_transit, Decimal::ZERO);
        assert_eq!(position.in_production, Decimal::from(55));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("in-transit"));
    }

    #[test]
    fn test_on_hand_overflow_degrades_to_zero() {
        let mut huge = InventoryRecord::new("M", "WH-1", None, Utc::now());
        huge.receive(Decimal::MAX, Decimal::ZERO, Utc::now()).unwrap();
        let stock = FakeStock {
            records: vec![huge, record("WH-2", 5, 0)],
        };
        let orders = orders(false);
        let resolver = SupplyResolver::new(&stock, &orders);

        let (position, warnings) = resolver.resolve("M");
        assert_eq!(position.on_hand, Decimal::ZERO);
        assert_eq!(position.in_transit, Decimal::from(70));
        assert_eq!(warnings.len(), 1);
    }
}
