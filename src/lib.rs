//! # MRP
//!
//! 物料需求規劃與庫存、訂單作業的組裝層。
//!
//! ```no_run
//! use mrp::{MrpSettings, MrpSystem};
//!
//! let system = MrpSystem::new(MrpSettings::default()).unwrap();
//! let run = system.planner.run(None, None).unwrap();
//! println!("{} {}", run.code, run.status);
//! ```

pub mod telemetry;

use std::sync::Arc;

// Re-export 主要類型
pub use mrp_calc::{DemandAggregator, MrpCalculator};
pub use mrp_core::{InMemoryMasterData, MasterData, MrpError, MrpSettings, Result};
pub use mrp_ledger::{
    AdjustRequest, DocumentRef, InboundRequest, InventoryFilter, InventoryLedger, OutboundRequest,
    TransactionFilter, TransferRequest,
};
pub use mrp_orders::{
    NewPurchaseLine, NewPurchaseOrder, NewSalesOrder, NewWorkOrder, OrderBook,
    ProductionService, PurchaseService, ReceiveLine, ReportRequest, SalesService,
};
pub use mrp_planner::{ApplySummary, MrpPlanner};

/// 以共用的記憶體儲存組裝各項服務
pub struct MrpSystem {
    pub settings: Arc<MrpSettings>,
    pub master: Arc<dyn MasterData>,
    pub ledger: Arc<InventoryLedger>,
    pub book: Arc<OrderBook>,
    pub purchasing: PurchaseService,
    pub production: ProductionService,
    pub sales: SalesService,
    pub planner: MrpPlanner,
}

impl MrpSystem {
    /// 使用空白的記憶體主檔
    pub fn new(settings: MrpSettings) -> Result<Self> {
        Self::with_master(Arc::new(InMemoryMasterData::new()), settings)
    }

    /// 使用外部提供的主檔
    pub fn with_master(master: Arc<dyn MasterData>, settings: MrpSettings) -> Result<Self> {
        settings.validate()?;
        let settings = Arc::new(settings);
        let ledger = Arc::new(InventoryLedger::new());
        let book = Arc::new(OrderBook::new());

        let purchasing = PurchaseService::new(book.clone(), ledger.clone(), settings.clone());
        let production = ProductionService::new(master.clone(), book.clone(), ledger.clone());
        let sales = SalesService::new(book.clone());
        let planner = MrpPlanner::new(
            master.clone(),
            ledger.clone(),
            book.clone(),
            book.clone(),
            settings.clone(),
        );

        tracing::debug!("MRP 服務組裝完成");
        Ok(Self {
            settings,
            master,
            ledger,
            book,
            purchasing,
            production,
            sales,
            planner,
        })
    }
}
