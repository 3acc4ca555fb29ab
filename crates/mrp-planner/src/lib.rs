//! # MRP Planner
//!
//! MRP 運算紀錄與協調：執行、查詢、套用為請購單

pub mod planner;
pub mod store;

// Re-export 主要類型
pub use planner::{ApplySummary, MrpPlanner};
pub use store::RunStore;
