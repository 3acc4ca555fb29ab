//! 需求彙總

use std::collections::BTreeMap;

use mrp_core::{Demand, Result, SalesOrder, SoItemStatus};
use rust_decimal::Decimal;

/// 需求彙總器
///
/// 只看狀態為 Pending/Confirmed/Picking 的訂單、且明細未結案者，
/// 以「訂購 - 已出貨」累加到產品。
pub struct DemandAggregator;

impl DemandAggregator {
    /// 各產品的未滿足需求
    pub fn pending_demand(orders: &[SalesOrder]) -> Result<BTreeMap<String, Decimal>> {
        Ok(Self::demands(orders)?
            .into_iter()
            .map(|d| (d.product_id, d.quantity))
            .collect())
    }

    /// 各產品的未滿足需求（含來源訂單）
    pub fn demands(orders: &[SalesOrder]) -> Result<Vec<Demand>> {
        let mut grouped: BTreeMap<String, Demand> = BTreeMap::new();

        for order in orders.iter().filter(|o| o.status.is_open_demand()) {
            for item in order
                .items
                .iter()
                .filter(|item| item.status != SoItemStatus::Closed)
            {
                let open_qty = item.open_qty();
                if open_qty <= Decimal::ZERO {
                    continue;
                }
                grouped
                    .entry(item.product_id.clone())
                    .or_insert_with(|| Demand::new(item.product_id.clone(), Decimal::ZERO))
                    .accumulate(open_qty, order.code.clone())?;
            }
        }

        Ok(grouped.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use mrp_core::SalesOrderItem;

    fn order(code: &str, items: Vec<SalesOrderItem>) -> SalesOrder {
        SalesOrder::new(
            code.to_string(),
            "CUST-01",
            items,
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_demand() {
        assert!(DemandAggregator::pending_demand(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_sums_open_quantities() {
        let mut partially_shipped = SalesOrderItem::new("BIKE", Decimal::from(10), Decimal::ONE);
        partially_shipped.shipped_qty = Decimal::from(4);

        let mut confirmed = order("SO-002", vec![partially_shipped]);
        confirmed.confirm().unwrap();

        let orders = vec![
            order(
                "SO-001",
                vec![
                    SalesOrderItem::new("BIKE", Decimal::from(20), Decimal::ONE),
                    SalesOrderItem::new("TRIKE", Decimal::from(5), Decimal::ONE),
                ],
            ),
            confirmed,
        ];

        let demand = DemandAggregator::pending_demand(&orders).unwrap();
        assert_eq!(demand["BIKE"], Decimal::from(26));
        assert_eq!(demand["TRIKE"], Decimal::from(5));

        let demands = DemandAggregator::demands(&orders).unwrap();
        assert_eq!(demands[0].source_refs, vec!["SO-001", "SO-002"]);
    }

    #[test]
    fn test_ignores_closed_and_shipped() {
        let mut shipped = order(
            "SO-010",
            vec![SalesOrderItem::new("BIKE", Decimal::from(10), Decimal::ONE)],
        );
        shipped.confirm().unwrap();
        shipped.ship(Utc::now()).unwrap();

        let mut closed_item = SalesOrderItem::new("BIKE", Decimal::from(7), Decimal::ONE);
        closed_item.status = SoItemStatus::Closed;
        let pending = order("SO-011", vec![closed_item]);

        let mut cancelled = order(
            "SO-012",
            vec![SalesOrderItem::new("BIKE", Decimal::from(3), Decimal::ONE)],
        );
        cancelled.cancel().unwrap();

        let demand = DemandAggregator::pending_demand(&[shipped, pending, cancelled]).unwrap();
        assert!(demand.is_empty());
    }
}
