//! 外部協作者的唯讀介面
//!
//! MRP 引擎只透過這些 trait 讀取主檔、庫存與未結訂單，
//! 實作可以是資料庫、遠端服務或記憶體。

use rust_decimal::Decimal;

use crate::{
    Bom, InventoryRecord, Material, MrpError, NewRequisition, Product, PurchaseOrderItem,
    PurchaseOrderStatus, PurchaseRequisition, Result, SalesOrder, WorkOrder,
};

/// 物料、產品與 BOM 主檔
pub trait MasterData: Send + Sync {
    /// 查詢物料，不存在時回傳 `NotFound`
    fn material(&self, material_id: &str) -> Result<Material>;

    /// 查詢產品，不存在時回傳 `NotFound`
    fn product(&self, product_id: &str) -> Result<Product>;

    /// 所有有效產品
    fn active_products(&self) -> Result<Vec<Product>>;

    /// 產品目前已發行的 BOM（草稿與作廢版本不可見）
    fn released_bom(&self, product_id: &str) -> Result<Option<Bom>>;
}

/// 庫存查詢
pub trait StockView: Send + Sync {
    /// 物料在所有倉庫、批次的庫存記錄
    fn stock_records(&self, material_id: &str) -> Result<Vec<InventoryRecord>>;
}

/// 未結訂單查詢
pub trait OpenOrders: Send + Sync {
    /// 所有銷售訂單（由需求彙總自行篩選狀態）
    fn sales_orders(&self) -> Result<Vec<SalesOrder>>;

    /// 指定物料的採購明細及其表頭狀態
    fn purchase_lines(&self, material_id: &str)
        -> Result<Vec<(PurchaseOrderStatus, PurchaseOrderItem)>>;

    /// 產出指定物料的工單
    fn work_orders_for(&self, material_id: &str) -> Result<Vec<WorkOrder>>;
}

/// 請購單建立
pub trait RequisitionSink: Send + Sync {
    fn create_requisition(&self, request: NewRequisition) -> Result<PurchaseRequisition>;
}

/// 加總可用庫存
pub fn total_available(records: &[InventoryRecord]) -> Result<Decimal> {
    checked_sum(records.iter().map(|r| r.available_qty), "可用庫存")
}

/// 溢位時回傳驗證錯誤的加總
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>, what: &str) -> Result<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
        .ok_or_else(|| MrpError::validation(format!("{what}加總溢位")))
}
