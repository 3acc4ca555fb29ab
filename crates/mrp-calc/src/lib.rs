//! # MRP Calculation Engine
//!
//! 核心 MRP 計算引擎：需求彙總、BOM 展開、供應查詢、淨需求與交期

pub mod calculator;
pub mod demand;
pub mod explosion;
pub mod lead_time;
pub mod netting;
pub mod supply;

// Re-export 主要類型
pub use calculator::MrpCalculator;
pub use demand::DemandAggregator;
pub use explosion::{BomExploder, BomTree, ExplodedMaterial, ExplosionMap};
pub use lead_time::LeadTimeCalculator;
pub use netting::{NetRequirement, NettingCalculator};
pub use supply::SupplyResolver;

use mrp_core::MrpWarning;

/// MRP 計算結果
#[derive(Debug, Clone)]
pub struct MrpOutcome {
    /// 每個展開物料一筆（依物料ID排序）
    pub requirements: Vec<NetRequirement>,

    /// 警告信息
    pub warnings: Vec<MrpWarning>,

    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u128>,
}

impl MrpOutcome {
    /// 需補貨的物料數
    pub fn shortage_count(&self) -> usize {
        self.requirements.iter().filter(|r| r.has_shortage()).count()
    }
}
