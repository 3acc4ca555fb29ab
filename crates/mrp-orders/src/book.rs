//! 記憶體訂單簿

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use mrp_core::{
    DocumentSequence, MrpError, NewRequisition, OpenOrders, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderStatus, PurchaseRequisition, RequisitionSink, Result, SalesOrder, WorkOrder,
};
use uuid::Uuid;

pub(crate) type Table<T> = RwLock<HashMap<Uuid, T>>;

pub(crate) fn read_table<'a, T>(
    table: &'a Table<T>,
    what: &str,
) -> Result<RwLockReadGuard<'a, HashMap<Uuid, T>>> {
    table.read().map_err(|_| MrpError::poisoned(what))
}

pub(crate) fn write_table<'a, T>(
    table: &'a Table<T>,
    what: &str,
) -> Result<RwLockWriteGuard<'a, HashMap<Uuid, T>>> {
    table.write().map_err(|_| MrpError::poisoned(what))
}

/// 在副本上執行狀態轉換，成功才寫回
pub(crate) fn update<T: Clone>(
    table: &Table<T>,
    entity: &'static str,
    id: Uuid,
    change: impl FnOnce(&mut T) -> Result<()>,
) -> Result<T> {
    let mut rows = write_table(table, entity)?;
    let row = rows.get_mut(&id).ok_or_else(|| MrpError::not_found(entity, id))?;
    let mut staged = row.clone();
    change(&mut staged)?;
    *row = staged.clone();
    Ok(staged)
}

fn get<T: Clone>(table: &Table<T>, entity: &'static str, id: Uuid) -> Result<T> {
    read_table(table, entity)?
        .get(&id)
        .cloned()
        .ok_or_else(|| MrpError::not_found(entity, id))
}

fn list<T: Clone>(table: &Table<T>, entity: &'static str, code: impl Fn(&T) -> &str) -> Result<Vec<T>> {
    let rows = read_table(table, entity)?;
    let mut all: Vec<T> = rows.values().cloned().collect();
    all.sort_by(|a, b| code(a).cmp(code(b)));
    Ok(all)
}

/// 訂單簿：請購單、採購訂單、工單、銷售訂單
///
/// 僅提供儲存與查詢；狀態轉換由各 service 負責。
#[derive(Debug)]
pub struct OrderBook {
    pub(crate) requisitions: Table<PurchaseRequisition>,
    pub(crate) purchase_orders: Table<PurchaseOrder>,
    pub(crate) work_orders: Table<WorkOrder>,
    pub(crate) sales_orders: Table<SalesOrder>,
    pr_sequence: DocumentSequence,
    po_sequence: DocumentSequence,
    wo_sequence: DocumentSequence,
    so_sequence: DocumentSequence,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            requisitions: RwLock::new(HashMap::new()),
            purchase_orders: RwLock::new(HashMap::new()),
            work_orders: RwLock::new(HashMap::new()),
            sales_orders: RwLock::new(HashMap::new()),
            pr_sequence: DocumentSequence::new("PR"),
            po_sequence: DocumentSequence::new("PO"),
            wo_sequence: DocumentSequence::new("WO"),
            so_sequence: DocumentSequence::new("SO"),
        }
    }

    pub(crate) fn next_pr_code(&self) -> String {
        self.pr_sequence.next(Utc::now().date_naive())
    }

    pub(crate) fn next_po_code(&self) -> String {
        self.po_sequence.next(Utc::now().date_naive())
    }

    pub(crate) fn next_wo_code(&self) -> String {
        self.wo_sequence.next(Utc::now().date_naive())
    }

    pub(crate) fn next_so_code(&self) -> String {
        self.so_sequence.next(Utc::now().date_naive())
    }

    pub fn requisition(&self, id: Uuid) -> Result<PurchaseRequisition> {
        get(&self.requisitions, "請購單", id)
    }

    pub fn purchase_order(&self, id: Uuid) -> Result<PurchaseOrder> {
        get(&self.purchase_orders, "採購訂單", id)
    }

    pub fn work_order(&self, id: Uuid) -> Result<WorkOrder> {
        get(&self.work_orders, "工單", id)
    }

    pub fn sales_order(&self, id: Uuid) -> Result<SalesOrder> {
        get(&self.sales_orders, "銷售訂單", id)
    }

    /// 全部請購單（依單號排序）
    pub fn list_requisitions(&self) -> Result<Vec<PurchaseRequisition>> {
        list(&self.requisitions, "請購單", |pr| pr.code.as_str())
    }

    pub fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>> {
        list(&self.purchase_orders, "採購訂單", |po| po.code.as_str())
    }

    pub fn list_work_orders(&self) -> Result<Vec<WorkOrder>> {
        list(&self.work_orders, "工單", |wo| wo.code.as_str())
    }

    pub fn list_sales_orders(&self) -> Result<Vec<SalesOrder>> {
        list(&self.sales_orders, "銷售訂單", |so| so.code.as_str())
    }
}

impl OpenOrders for OrderBook {
    fn sales_orders(&self) -> Result<Vec<SalesOrder>> {
        self.list_sales_orders()
    }

    fn purchase_lines(
        &self,
        material_id: &str,
    ) -> Result<Vec<(PurchaseOrderStatus, PurchaseOrderItem)>> {
        let orders = read_table(&self.purchase_orders, "採購訂單")?;
        Ok(orders
            .values()
            .flat_map(|po| {
                po.items
                    .iter()
                    .filter(|item| item.material_id == material_id)
                    .map(move |item| (po.status, item.clone()))
            })
            .collect())
    }

    fn work_orders_for(&self, material_id: &str) -> Result<Vec<WorkOrder>> {
        let orders = read_table(&self.work_orders, "工單")?;
        Ok(orders
            .values()
            .filter(|wo| wo.product_id == material_id)
            .cloned()
            .collect())
    }
}

impl RequisitionSink for OrderBook {
    fn create_requisition(&self, request: NewRequisition) -> Result<PurchaseRequisition> {
        request.validate()?;
        let requisition = PurchaseRequisition::from_request(self.next_pr_code(), request, Utc::now());

        let mut rows = write_table(&self.requisitions, "請購單")?;
        rows.insert(requisition.id, requisition.clone());

        tracing::debug!(
            "建立請購單 {}：物料 {} 數量 {}",
            requisition.code,
            requisition.material_id,
            requisition.quantity
        );
        Ok(requisition)
    }
}
