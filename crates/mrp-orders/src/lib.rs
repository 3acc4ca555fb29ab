//! # MRP Orders
//!
//! 訂單簿與請購、採購、工單、銷售作業

pub mod book;
pub mod production;
pub mod purchase;
pub mod sales;

// Re-export 主要類型
pub use book::OrderBook;
pub use production::{NewWorkOrder, ProductionService, ReportRequest};
pub use purchase::{NewPurchaseLine, NewPurchaseOrder, PurchaseService, ReceiveLine};
pub use sales::{NewSalesOrder, SalesService};
