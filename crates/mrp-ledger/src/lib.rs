//! # MRP Inventory Ledger
//!
//! 庫存帳本：入庫、出庫、調整、調撥、預留與日記帳查詢

pub mod ledger;
pub mod query;
pub mod request;

// Re-export 主要類型
pub use ledger::InventoryLedger;
pub use query::{AlertKind, InventoryFilter, ReconcileReport, StockAlert, TransactionFilter};
pub use request::{
    AdjustRequest, DocumentRef, InboundRequest, MovementAction, OutboundRequest, StockMovement,
    TransferRequest,
};
