//! 銷售訂單作業
//!
//! 出貨只更新訂單狀態，不扣庫存。

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use mrp_core::{MrpError, Result, SalesOrder, SalesOrderItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::book::{update, write_table, OrderBook};

/// 建立銷售訂單請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSalesOrder {
    pub customer_id: String,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    /// (產品, 數量, 單價)
    pub lines: Vec<(String, Decimal, Decimal)>,
}

/// 銷售訂單服務
pub struct SalesService {
    book: Arc<OrderBook>,
}

impl SalesService {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }

    pub fn create(&self, request: NewSalesOrder) -> Result<SalesOrder> {
        if request.customer_id.trim().is_empty() {
            return Err(MrpError::validation("客戶不可為空"));
        }
        let items = request
            .lines
            .into_iter()
            .map(|(product_id, quantity, unit_price)| {
                SalesOrderItem::new(product_id, quantity, unit_price)
            })
            .collect();

        let mut order = SalesOrder::new(
            self.book.next_so_code(),
            request.customer_id,
            items,
            request.order_date,
        )?;
        if let Some(delivery) = request.delivery_date {
            if delivery < request.order_date {
                return Err(MrpError::validation("交期不可早於訂單日期"));
            }
            order = order.with_delivery_date(delivery);
        }

        write_table(&self.book.sales_orders, "銷售訂單")?.insert(order.id, order.clone());
        tracing::info!("建立銷售訂單 {}，明細 {} 筆", order.code, order.items.len());
        Ok(order)
    }

    pub fn confirm(&self, id: Uuid) -> Result<SalesOrder> {
        update(&self.book.sales_orders, "銷售訂單", id, |so| so.confirm())
    }

    pub fn start_picking(&self, id: Uuid) -> Result<SalesOrder> {
        update(&self.book.sales_orders, "銷售訂單", id, |so| so.start_picking())
    }

    pub fn ship(&self, id: Uuid) -> Result<SalesOrder> {
        update(&self.book.sales_orders, "銷售訂單", id, |so| so.ship(Utc::now()))
    }

    pub fn deliver(&self, id: Uuid) -> Result<SalesOrder> {
        update(&self.book.sales_orders, "銷售訂單", id, |so| so.deliver())
    }

    pub fn complete(&self, id: Uuid) -> Result<SalesOrder> {
        update(&self.book.sales_orders, "銷售訂單", id, |so| so.complete())
    }

    pub fn cancel(&self, id: Uuid) -> Result<SalesOrder> {
        update(&self.book.sales_orders, "銷售訂單", id, |so| so.cancel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_core::{SalesOrderStatus, SoItemStatus};
    use rstest::rstest;

    fn service() -> SalesService {
        SalesService::new(Arc::new(OrderBook::new()))
    }

    fn order(service: &SalesService) -> SalesOrder {
        service
            .create(NewSalesOrder {
                customer_id: "CUST-01".to_string(),
                order_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
                delivery_date: NaiveDate::from_ymd_opt(2025, 11, 20),
                lines: vec![("BIKE".to_string(), Decimal::from(40), Decimal::from(300))],
            })
            .unwrap()
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let service = service();
        let so = order(&service);
        assert!(so.code.starts_with("SO-"));
        assert_eq!(so.status, SalesOrderStatus::Pending);

        service.confirm(so.id).unwrap();
        service.start_picking(so.id).unwrap();
        let shipped = service.ship(so.id).unwrap();
        assert_eq!(shipped.status, SalesOrderStatus::Shipped);
        assert!(shipped.shipped_at.is_some());
        assert!(shipped
            .items
            .iter()
            .all(|item| item.status == SoItemStatus::Closed && item.shipped_qty == item.quantity));

        service.deliver(so.id).unwrap();
        assert_eq!(service.complete(so.id).unwrap().status, SalesOrderStatus::Completed);
    }

    #[rstest]
    #[case::from_pending(false)]
    #[case::from_confirmed(true)]
    fn test_cancel_before_shipping(#[case] confirm_first: bool) {
        let service = service();
        let so = order(&service);
        if confirm_first {
            service.confirm(so.id).unwrap();
        }
        assert_eq!(service.cancel(so.id).unwrap().status, SalesOrderStatus::Cancelled);
    }

    #[test]
    fn test_ship_requires_confirmation() {
        let service = service();
        let so = order(&service);

        let err = service.ship(so.id).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
        assert_eq!(service.book.sales_order(so.id).unwrap(), so);
    }

    #[test]
    fn test_delivery_before_order_date_rejected() {
        let service = service();
        let err = service
            .create(NewSalesOrder {
                customer_id: "CUST-01".to_string(),
                order_date: NaiveDate::from_ymd_opt(2025, 11, 10).unwrap(),
                delivery_date: NaiveDate::from_ymd_opt(2025, 11, 1),
                lines: vec![("BIKE".to_string(), Decimal::ONE, Decimal::ONE)],
            })
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
