//! 請購與採購作業

use std::sync::Arc;

use chrono::Utc;
use mrp_core::{
    MrpError, MrpSettings, NewRequisition, PurchaseOrder, PurchaseOrderItem, PurchaseRequisition,
    ReferenceType, RequisitionSink, Result,
};
use mrp_ledger::{DocumentRef, InboundRequest, InventoryLedger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::book::{update, write_table, OrderBook};

/// 採購訂單明細請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseLine {
    pub material_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// 來源請購單（必須已核准）
    pub requisition_id: Option<Uuid>,
}

impl NewPurchaseLine {
    pub fn new(material_id: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            material_id: material_id.into(),
            quantity,
            unit_price,
            requisition_id: None,
        }
    }

    pub fn from_requisition(requisition: &PurchaseRequisition, unit_price: Decimal) -> Self {
        Self {
            material_id: requisition.material_id.clone(),
            quantity: requisition.quantity,
            unit_price,
            requisition_id: Some(requisition.id),
        }
    }
}

/// 建立採購訂單請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub lines: Vec<NewPurchaseLine>,
}

/// 收貨明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub warehouse_id: String,
    pub batch_no: Option<String>,
}

impl ReceiveLine {
    pub fn new(item_id: Uuid, quantity: Decimal, warehouse_id: impl Into<String>) -> Self {
        Self {
            item_id,
            quantity,
            warehouse_id: warehouse_id.into(),
            batch_no: None,
        }
    }

    pub fn with_batch(mut self, batch_no: impl Into<String>) -> Self {
        self.batch_no = Some(batch_no.into());
        self
    }
}

/// 請購與採購服務
pub struct PurchaseService {
    book: Arc<OrderBook>,
    ledger: Arc<InventoryLedger>,
    settings: Arc<MrpSettings>,
}

impl PurchaseService {
    pub fn new(book: Arc<OrderBook>, ledger: Arc<InventoryLedger>, settings: Arc<MrpSettings>) -> Self {
        Self {
            book,
            ledger,
            settings,
        }
    }

    // ---- 請購單 ----

    pub fn create_requisition(&self, request: NewRequisition) -> Result<PurchaseRequisition> {
        self.book.create_requisition(request)
    }

    pub fn submit_requisition(&self, id: Uuid) -> Result<PurchaseRequisition> {
        update(&self.book.requisitions, "請購單", id, |pr| pr.submit())
    }

    pub fn approve_requisition(&self, id: Uuid) -> Result<PurchaseRequisition> {
        update(&self.book.requisitions, "請購單", id, |pr| pr.approve(Utc::now()))
    }

    pub fn close_requisition(&self, id: Uuid) -> Result<PurchaseRequisition> {
        update(&self.book.requisitions, "請購單", id, |pr| pr.close())
    }

    // ---- 採購訂單 ----

    /// 建立草稿採購訂單；引用的請購單一併轉為 Ordered
    pub fn create_order(&self, request: NewPurchaseOrder) -> Result<PurchaseOrder> {
        if request.supplier_id.trim().is_empty() {
            return Err(MrpError::validation("供應商不可為空"));
        }

        // 先鎖請購單再鎖採購單
        let mut requisitions = write_table(&self.book.requisitions, "請購單")?;
        let mut ordered = Vec::new();
        let mut items = Vec::with_capacity(request.lines.len());

        for line in request.lines {
            let mut item = PurchaseOrderItem::new(line.material_id, line.quantity, line.unit_price);
            if let Some(pr_id) = line.requisition_id {
                if ordered.iter().any(|pr: &PurchaseRequisition| pr.id == pr_id) {
                    return Err(MrpError::validation(format!(
                        "請購單 {pr_id} 在同一張採購訂單中重複引用"
                    )));
                }
                let mut requisition = requisitions
                    .get(&pr_id)
                    .cloned()
                    .ok_or_else(|| MrpError::not_found("請購單", pr_id))?;
                if requisition.material_id != item.material_id {
                    return Err(MrpError::validation(format!(
                        "請購單 {} 的物料為 {}，與採購明細 {} 不符",
                        requisition.code, requisition.material_id, item.material_id
                    )));
                }
                requisition.mark_ordered()?;
                ordered.push(requisition);
                item = item.with_requisition(pr_id);
            }
            items.push(item);
        }

        let order = PurchaseOrder::new(
            self.book.next_po_code(),
            request.supplier_id,
            items,
            Utc::now(),
        )?;

        let mut orders = write_table(&self.book.purchase_orders, "採購訂單")?;
        orders.insert(order.id, order.clone());
        for requisition in ordered {
            requisitions.insert(requisition.id, requisition);
        }

        tracing::info!("建立採購訂單 {}，明細 {} 筆", order.code, order.items.len());
        Ok(order)
    }

    pub fn submit_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        update(&self.book.purchase_orders, "採購訂單", id, |po| po.submit())
    }

    pub fn approve_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        update(&self.book.purchase_orders, "採購訂單", id, |po| po.approve(Utc::now()))
    }

    pub fn reject_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        update(&self.book.purchase_orders, "採購訂單", id, |po| po.reject())
    }

    pub fn send_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        update(&self.book.purchase_orders, "採購訂單", id, |po| po.send(Utc::now()))
    }

    pub fn close_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        update(&self.book.purchase_orders, "採購訂單", id, |po| po.close(Utc::now()))
    }

    pub fn cancel_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        update(&self.book.purchase_orders, "採購訂單", id, |po| po.cancel(Utc::now()))
    }

    /// 收貨
    ///
    /// 採購訂單的寫鎖涵蓋整個入庫過帳：任何一行失敗時，
    /// 訂單與庫存都不變。
    pub fn receive(&self, id: Uuid, lines: Vec<ReceiveLine>) -> Result<PurchaseOrder> {
        if lines.is_empty() {
            return Err(MrpError::validation("收貨明細不可為空"));
        }

        let mut orders = write_table(&self.book.purchase_orders, "採購訂單")?;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| MrpError::not_found("採購訂單", id))?;
        order.ensure_receivable()?;

        let reference = DocumentRef::document(ReferenceType::PurchaseOrder, order.id, order.code.clone());
        let mut staged = order.clone();
        let mut movements = Vec::with_capacity(lines.len());

        for line in lines {
            let item = staged.item_mut(line.item_id)?;
            item.receive(line.quantity, self.settings.allow_over_receipt)?;

            let mut inbound = InboundRequest::new(
                item.material_id.clone(),
                line.warehouse_id,
                line.quantity,
                reference.clone(),
            )
            .with_unit_cost(item.unit_price);
            if let Some(batch_no) = line.batch_no {
                inbound = inbound.with_batch(batch_no);
            }
            movements.push(inbound.into_movement()?);
        }
        staged.refresh_receipt_status();

        self.ledger.post(movements)?;
        *order = staged;

        tracing::info!("採購訂單 {} 收貨完成，狀態 {}", order.code, order.status);
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_core::{PoItemStatus, PurchaseOrderStatus, RequisitionStatus, TransactionType};
    use mrp_ledger::TransactionFilter;

    struct Fixture {
        book: Arc<OrderBook>,
        ledger: Arc<InventoryLedger>,
        service: PurchaseService,
    }

    fn fixture(settings: MrpSettings) -> Fixture {
        let book = Arc::new(OrderBook::new());
        let ledger = Arc::new(InventoryLedger::new());
        let service = PurchaseService::new(Arc::clone(&book), Arc::clone(&ledger), Arc::new(settings));
        Fixture {
            book,
            ledger,
            service,
        }
    }

    fn sent_order(service: &PurchaseService, lines: Vec<NewPurchaseLine>) -> PurchaseOrder {
        let po = service
            .create_order(NewPurchaseOrder {
                supplier_id: "SUP-01".to_string(),
                lines,
            })
            .unwrap();
        service.submit_order(po.id).unwrap();
        service.approve_order(po.id).unwrap();
        service.send_order(po.id).unwrap()
    }

    #[test]
    fn test_partial_receipt() {
        let fx = fixture(MrpSettings::default());
        let po = sent_order(
            &fx.service,
            vec![NewPurchaseLine::new("SEAT", Decimal::from(50), Decimal::from(12))],
        );
        let item_id = po.items[0].id;

        let po = fx
            .service
            .receive(po.id, vec![ReceiveLine::new(item_id, Decimal::from(30), "WH-RM")])
            .unwrap();

        assert_eq!(po.status, PurchaseOrderStatus::Partial);
        assert_eq!(po.items[0].status, PoItemStatus::Partial);
        assert_eq!(po.items[0].received_qty, Decimal::from(30));

        let rows = fx
            .ledger
            .transactions(&TransactionFilter::reference(ReferenceType::PurchaseOrder, po.id))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_type, TransactionType::PurchaseIn);
        assert_eq!(rows[0].quantity, Decimal::from(30));
        assert_eq!(rows[0].reference_code.as_deref(), Some(po.code.as_str()));

        // 收足剩餘數量後整張訂單為 Received
        let po = fx
            .service
            .receive(po.id, vec![ReceiveLine::new(item_id, Decimal::from(20), "WH-RM")])
            .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Received);
        assert_eq!(fx.ledger.available("SEAT").unwrap(), Decimal::from(50));

        let po = fx.service.close_order(po.id).unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Closed);
    }

    #[test]
    fn test_approve_guard_leaves_order_unchanged() {
        let fx = fixture(MrpSettings::default());
        let po = fx
            .service
            .create_order(NewPurchaseOrder {
                supplier_id: "SUP-01".to_string(),
                lines: vec![NewPurchaseLine::new("SEAT", Decimal::from(5), Decimal::ONE)],
            })
            .unwrap();

        let err = fx.service.approve_order(po.id).unwrap_err();
        match err {
            MrpError::InvalidStateTransition { from, action, .. } => {
                assert_eq!(from, "DRAFT");
                assert_eq!(action, "approve");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fx.book.purchase_order(po.id).unwrap(), po);
    }

    #[test]
    fn test_receive_is_all_or_nothing() {
        let fx = fixture(MrpSettings::default());
        let po = sent_order(
            &fx.service,
            vec![
                NewPurchaseLine::new("SEAT", Decimal::from(10), Decimal::ONE),
                NewPurchaseLine::new("WHEEL", Decimal::from(10), Decimal::ONE),
            ],
        );

        // 第二行超收
        let err = fx
            .service
            .receive(
                po.id,
                vec![
                    ReceiveLine::new(po.items[0].id, Decimal::from(10), "WH-RM"),
                    ReceiveLine::new(po.items[1].id, Decimal::from(11), "WH-RM"),
                ],
            )
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        assert_eq!(fx.book.purchase_order(po.id).unwrap(), po);
        assert!(fx
            .ledger
            .transactions(&TransactionFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_over_receipt_allowed_by_settings() {
        let fx = fixture(MrpSettings::default().with_allow_over_receipt(true));
        let po = sent_order(
            &fx.service,
            vec![NewPurchaseLine::new("SEAT", Decimal::from(10), Decimal::ONE)],
        );

        let po = fx
            .service
            .receive(po.id, vec![ReceiveLine::new(po.items[0].id, Decimal::from(12), "WH-RM")])
            .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Received);
        assert_eq!(fx.ledger.available("SEAT").unwrap(), Decimal::from(12));
    }

    #[test]
    fn test_receive_requires_sent_order() {
        let fx = fixture(MrpSettings::default());
        let po = fx
            .service
            .create_order(NewPurchaseOrder {
                supplier_id: "SUP-01".to_string(),
                lines: vec![NewPurchaseLine::new("SEAT", Decimal::from(5), Decimal::ONE)],
            })
            .unwrap();

        let err = fx
            .service
            .receive(po.id, vec![ReceiveLine::new(po.items[0].id, Decimal::ONE, "WH-RM")])
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
    }

    #[test]
    fn test_order_from_requisition() {
        let fx = fixture(MrpSettings::default());
        let pr = fx
            .service
            .create_requisition(NewRequisition::manual("SEAT", Decimal::from(45)))
            .unwrap();

        // 未核准的請購單不可轉採購
        let err = fx
            .service
            .create_order(NewPurchaseOrder {
                supplier_id: "SUP-01".to_string(),
                lines: vec![NewPurchaseLine::from_requisition(&pr, Decimal::ONE)],
            })
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
        assert!(fx.book.list_purchase_orders().unwrap().is_empty());

        let pr = fx.service.approve_requisition(pr.id).unwrap();
        let po = fx
            .service
            .create_order(NewPurchaseOrder {
                supplier_id: "SUP-01".to_string(),
                lines: vec![NewPurchaseLine::from_requisition(&pr, Decimal::ONE)],
            })
            .unwrap();

        assert_eq!(po.items[0].requisition_id, Some(pr.id));
        assert_eq!(
            fx.book.requisition(pr.id).unwrap().status,
            RequisitionStatus::Ordered
        );
        assert_eq!(
            fx.service.close_requisition(pr.id).unwrap().status,
            RequisitionStatus::Closed
        );
    }

    #[test]
    fn test_cancel_after_receipt_rejected() {
        let fx = fixture(MrpSettings::default());
        let po = sent_order(
            &fx.service,
            vec![NewPurchaseLine::new("SEAT", Decimal::from(10), Decimal::ONE)],
        );
        fx.service
            .receive(po.id, vec![ReceiveLine::new(po.items[0].id, Decimal::from(3), "WH-RM")])
            .unwrap();

        assert!(fx.service.cancel_order(po.id).is_err());
        assert_eq!(
            fx.book.purchase_order(po.id).unwrap().status,
            PurchaseOrderStatus::Partial
        );
    }
}
