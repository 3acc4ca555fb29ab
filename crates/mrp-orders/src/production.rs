//! 生產工單作業

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use mrp_core::{
    MasterData, MrpError, ReferenceType, Result, WorkOrder, WorkOrderMaterial, WorkOrderReport,
};
use mrp_ledger::{DocumentRef, InboundRequest, InventoryLedger, OutboundRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::book::{update, write_table, OrderBook};

/// 建立工單請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkOrder {
    pub product_id: String,
    pub warehouse_id: String,
    pub planned_qty: Decimal,
    pub materials: Vec<WorkOrderMaterial>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
}

/// 報工請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub quantity: Decimal,
    pub scrap_qty: Decimal,
    pub operator: String,
}

/// 生產工單服務
pub struct ProductionService {
    master: Arc<dyn MasterData>,
    book: Arc<OrderBook>,
    ledger: Arc<InventoryLedger>,
}

impl ProductionService {
    pub fn new(
        master: Arc<dyn MasterData>,
        book: Arc<OrderBook>,
        ledger: Arc<InventoryLedger>,
    ) -> Self {
        Self {
            master,
            book,
            ledger,
        }
    }

    pub fn create(&self, request: NewWorkOrder) -> Result<WorkOrder> {
        let mut order = WorkOrder::new(
            self.book.next_wo_code(),
            request.product_id,
            request.warehouse_id,
            request.planned_qty,
            request.materials,
            Utc::now(),
        )?;
        if let (Some(start), Some(end)) = (request.planned_start, request.planned_end) {
            if end < start {
                return Err(MrpError::validation("計劃完工日不可早於開工日"));
            }
            order = order.with_schedule(start, end);
        }

        write_table(&self.book.work_orders, "工單")?.insert(order.id, order.clone());
        tracing::info!("建立工單 {}：{} x {}", order.code, order.product_id, order.planned_qty);
        Ok(order)
    }

    /// 依已發行 BOM 的第一階建立工單，同物料用量合併
    pub fn create_from_bom(
        &self,
        product_id: &str,
        planned_qty: Decimal,
        warehouse_id: &str,
        material_warehouse_id: &str,
    ) -> Result<WorkOrder> {
        let bom = self
            .master
            .released_bom(product_id)?
            .ok_or_else(|| MrpError::validation(format!("產品 {product_id} 沒有已發行的 BOM")))?;

        let mut required: BTreeMap<&str, Decimal> = BTreeMap::new();
        for item in bom.top_level_items() {
            let entry = required.entry(item.material_id.as_str()).or_default();
            *entry = item
                .quantity
                .checked_mul(planned_qty)
                .and_then(|qty| qty.checked_add(*entry))
                .ok_or_else(|| {
                    MrpError::validation(format!("產品 {product_id} 用料 {} 數量溢位", item.material_id))
                })?;
        }

        let materials = required
            .into_iter()
            .map(|(material_id, qty)| WorkOrderMaterial::new(material_id, material_warehouse_id, qty))
            .collect();

        self.create(NewWorkOrder {
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            planned_qty,
            materials,
            planned_start: None,
            planned_end: None,
        })
    }

    pub fn plan(&self, id: Uuid) -> Result<WorkOrder> {
        update(&self.book.work_orders, "工單", id, |wo| wo.plan())
    }

    pub fn release(&self, id: Uuid) -> Result<WorkOrder> {
        update(&self.book.work_orders, "工單", id, |wo| wo.release())
    }

    /// 領料：全部未發用料一次過帳，任一短缺則全部不發
    pub fn pick(&self, id: Uuid) -> Result<WorkOrder> {
        let mut orders = write_table(&self.book.work_orders, "工單")?;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| MrpError::not_found("工單", id))?;
        order.ensure_pickable()?;

        let reference = DocumentRef::document(ReferenceType::WorkOrder, order.id, order.code.clone());
        let movements = order
            .outstanding_materials()
            .map(|material| {
                OutboundRequest::new(
                    material.material_id.clone(),
                    material.warehouse_id.clone(),
                    material.outstanding_qty(),
                    reference.clone(),
                )
                .into_movement()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut staged = order.clone();
        staged.record_pick(Utc::now())?;

        self.ledger.post(movements)?;
        *order = staged;

        tracing::info!("工單 {} 領料完成", order.code);
        Ok(order.clone())
    }

    /// 報工（可重複）
    pub fn report(&self, id: Uuid, request: ReportRequest) -> Result<WorkOrderReport> {
        let mut report = None;
        update(&self.book.work_orders, "工單", id, |wo| {
            let created = wo.report(
                request.quantity,
                request.scrap_qty,
                request.operator,
                Utc::now(),
            )?;
            report = Some(created.clone());
            Ok(())
        })?;
        report.ok_or_else(|| MrpError::Storage("報工紀錄未產生".to_string()))
    }

    /// 完工：良品入庫後轉為 Completed
    pub fn complete(&self, id: Uuid) -> Result<WorkOrder> {
        let mut orders = write_table(&self.book.work_orders, "工單")?;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| MrpError::not_found("工單", id))?;

        let mut staged = order.clone();
        staged.complete(Utc::now())?;

        // 成品以標準成本入庫；主檔沒有此物料時以 0 計
        let unit_cost = match self.master.material(&order.product_id) {
            Ok(material) => material.standard_cost,
            Err(MrpError::NotFound { .. }) => Decimal::ZERO,
            Err(e) => {
                return Err(MrpError::upstream(format!(
                    "工單 {} 成品 {} 主檔查詢失敗: {e}",
                    order.code, order.product_id
                )));
            }
        };

        self.ledger.inbound(
            InboundRequest::new(
                order.product_id.clone(),
                order.warehouse_id.clone(),
                order.completed_qty,
                DocumentRef::document(ReferenceType::WorkOrder, order.id, order.code.clone()),
            )
            .with_unit_cost(unit_cost),
        )?;
        *order = staged;

        tracing::info!("工單 {} 完工入庫 {}", order.code, order.completed_qty);
        Ok(order.clone())
    }

    pub fn close(&self, id: Uuid) -> Result<WorkOrder> {
        update(&self.book.work_orders, "工單", id, |wo| wo.close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_core::{
        Bom, InMemoryMasterData, Material, TransactionType, WorkOrderStatus,
    };
    use mrp_ledger::TransactionFilter;

    struct Fixture {
        book: Arc<OrderBook>,
        ledger: Arc<InventoryLedger>,
        service: ProductionService,
    }

    fn fixture() -> Fixture {
        let master = InMemoryMasterData::new();
        master
            .upsert_material(Material::new("FRAME", "PCS", 5).with_standard_cost(Decimal::from(80)))
            .unwrap();
        let mut bom = Bom::released("FRAME");
        let tube = bom.add_item("TUBE", Decimal::from(3));
        bom.add_child(&tube, "STEEL", Decimal::from(2));
        bom.add_item("WELD", Decimal::ONE);
        bom.add_item("TUBE", Decimal::ONE);
        master.add_bom(bom).unwrap();

        let book = Arc::new(OrderBook::new());
        let ledger = Arc::new(InventoryLedger::new());
        let service = ProductionService::new(Arc::new(master), Arc::clone(&book), Arc::clone(&ledger));
        Fixture {
            book,
            ledger,
            service,
        }
    }

    fn stock(ledger: &InventoryLedger, material: &str, qty: i64) {
        ledger
            .inbound(InboundRequest::new(
                material,
                "WH-RM",
                Decimal::from(qty),
                DocumentRef::new(ReferenceType::PurchaseOrder),
            ))
            .unwrap();
    }

    #[test]
    fn test_create_from_bom_first_level() {
        let fx = fixture();
        let wo = fx
            .service
            .create_from_bom("FRAME", Decimal::from(10), "WH-FG", "WH-RM")
            .unwrap();

        assert!(wo.code.starts_with("WO-"));
        assert_eq!(wo.status, WorkOrderStatus::Created);
        assert_eq!(wo.materials.len(), 2);
        assert_eq!(wo.materials[0].material_id, "TUBE");
        assert_eq!(wo.materials[0].required_qty, Decimal::from(40));
        assert_eq!(wo.materials[1].material_id, "WELD");

        let err = fx
            .service
            .create_from_bom("BIKE", Decimal::ONE, "WH-FG", "WH-RM")
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_pick_shortage_rolls_back() {
        let fx = fixture();
        stock(&fx.ledger, "TUBE", 100);
        stock(&fx.ledger, "WELD", 4);

        let wo = fx
            .service
            .create_from_bom("FRAME", Decimal::from(10), "WH-FG", "WH-RM")
            .unwrap();
        fx.service.release(wo.id).unwrap();

        let err = fx.service.pick(wo.id).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let unchanged = fx.book.work_order(wo.id).unwrap();
        assert_eq!(unchanged.status, WorkOrderStatus::Released);
        assert!(unchanged.materials.iter().all(|m| m.issued_qty.is_zero()));
        assert_eq!(fx.ledger.available("TUBE").unwrap(), Decimal::from(100));
        assert!(fx
            .ledger
            .transactions(&TransactionFilter::reference(ReferenceType::WorkOrder, wo.id))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_full_lifecycle() {
        let fx = fixture();
        stock(&fx.ledger, "TUBE", 100);
        stock(&fx.ledger, "WELD", 20);

        let wo = fx
            .service
            .create_from_bom("FRAME", Decimal::from(10), "WH-FG", "WH-RM")
            .unwrap();

        // 未發放不可領料
        assert!(fx.service.pick(wo.id).is_err());
        fx.service.plan(wo.id).unwrap();
        fx.service.release(wo.id).unwrap();

        let picked = fx.service.pick(wo.id).unwrap();
        assert_eq!(picked.status, WorkOrderStatus::InProgress);
        assert!(picked.actual_start.is_some());
        assert_eq!(fx.ledger.available("TUBE").unwrap(), Decimal::from(60));
        assert_eq!(fx.ledger.available("WELD").unwrap(), Decimal::from(10));

        // 尚未報工不可完工
        assert!(fx.service.complete(wo.id).is_err());

        fx.service
            .report(
                wo.id,
                ReportRequest {
                    quantity: Decimal::from(6),
                    scrap_qty: Decimal::ZERO,
                    operator: "op-1".to_string(),
                },
            )
            .unwrap();
        let report = fx
            .service
            .report(
                wo.id,
                ReportRequest {
                    quantity: Decimal::from(3),
                    scrap_qty: Decimal::ONE,
                    operator: "op-2".to_string(),
                },
            )
            .unwrap();
        assert_eq!(report.scrap_qty, Decimal::ONE);

        let done = fx.service.complete(wo.id).unwrap();
        assert_eq!(done.status, WorkOrderStatus::Completed);
        assert_eq!(done.completed_qty, Decimal::from(9));
        assert_eq!(done.scrap_qty, Decimal::ONE);
        assert!(done.actual_end.is_some());

        let rows = fx
            .ledger
            .transactions(&TransactionFilter::reference(ReferenceType::WorkOrder, wo.id))
            .unwrap();
        assert_eq!(rows.len(), 3);
        let finished = rows
            .iter()
            .find(|r| r.transaction_type == TransactionType::ProductionIn)
            .unwrap();
        assert_eq!(finished.material_id, "FRAME");
        assert_eq!(finished.quantity, Decimal::from(9));
        assert_eq!(finished.unit_cost, Decimal::from(80));

        assert_eq!(fx.service.close(wo.id).unwrap().status, WorkOrderStatus::Closed);
    }

    /// 物料查詢一律失敗，其餘委派給記憶體主檔
    struct BrokenMaterials(InMemoryMasterData);

    impl MasterData for BrokenMaterials {
        fn material(&self, _material_id: &str) -> Result<Material> {
            Err(MrpError::Storage("物料主檔無法讀取".to_string()))
        }

        fn product(&self, product_id: &str) -> Result<mrp_core::Product> {
            self.0.product(product_id)
        }

        fn active_products(&self) -> Result<Vec<mrp_core::Product>> {
            self.0.active_products()
        }

        fn released_bom(&self, product_id: &str) -> Result<Option<Bom>> {
            self.0.released_bom(product_id)
        }
    }

    /// 無用料工單，報工 `qty` 後停在 InProgress
    fn reported_order(service: &ProductionService, product_id: &str, qty: i64) -> WorkOrder {
        let wo = service
            .create(NewWorkOrder {
                product_id: product_id.to_string(),
                warehouse_id: "WH-FG".to_string(),
                planned_qty: Decimal::from(qty),
                materials: Vec::new(),
                planned_start: None,
                planned_end: None,
            })
            .unwrap();
        service.release(wo.id).unwrap();
        service.pick(wo.id).unwrap();
        service
            .report(
                wo.id,
                ReportRequest {
                    quantity: Decimal::from(qty),
                    scrap_qty: Decimal::ZERO,
                    operator: "op-1".to_string(),
                },
            )
            .unwrap();
        wo
    }

    #[test]
    fn test_complete_unknown_product_at_zero_cost() {
        let fx = fixture();
        let wo = reported_order(&fx.service, "GADGET", 4);

        let done = fx.service.complete(wo.id).unwrap();
        assert_eq!(done.status, WorkOrderStatus::Completed);
        let rows = fx
            .ledger
            .transactions(&TransactionFilter::reference(ReferenceType::WorkOrder, wo.id))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unit_cost, Decimal::ZERO);
    }

    #[test]
    fn test_complete_master_failure_leaves_order_open() {
        let book = Arc::new(OrderBook::new());
        let ledger = Arc::new(InventoryLedger::new());
        let service = ProductionService::new(
            Arc::new(BrokenMaterials(InMemoryMasterData::new())),
            Arc::clone(&book),
            Arc::clone(&ledger),
        );
        let wo = reported_order(&service, "FRAME", 4);

        let err = service.complete(wo.id).unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_DEPENDENCY_FAILURE");
        assert_eq!(book.work_order(wo.id).unwrap().status, WorkOrderStatus::InProgress);
        assert!(ledger
            .transactions(&TransactionFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_create_rejects_bad_schedule() {
        let fx = fixture();
        let err = fx
            .service
            .create(NewWorkOrder {
                product_id: "FRAME".to_string(),
                warehouse_id: "WH-FG".to_string(),
                planned_qty: Decimal::ONE,
                materials: Vec::new(),
                planned_start: NaiveDate::from_ymd_opt(2025, 11, 10),
                planned_end: NaiveDate::from_ymd_opt(2025, 11, 1),
            })
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(fx.book.list_work_orders().unwrap().is_empty());
    }
}
