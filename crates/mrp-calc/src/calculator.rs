//! MRP 主計算器

use chrono::NaiveDate;
use mrp_core::{
    Demand, MasterData, MrpError, MrpSettings, MrpWarning, OpenOrders, Result, StockView,
};
use rayon::prelude::*;

use crate::explosion::{BomExploder, ExplodedMaterial, ExplosionMap};
use crate::netting::{NetRequirement, NettingCalculator};
use crate::supply::SupplyResolver;
use crate::MrpOutcome;

/// MRP 計算器
///
/// 需求 → BOM 展開 → 逐物料查供應並計算淨需求。
/// 不保存任何狀態，運算紀錄由 planner 負責。
pub struct MrpCalculator<'a> {
    master: &'a dyn MasterData,
    stock: &'a dyn StockView,
    orders: &'a dyn OpenOrders,
    settings: &'a MrpSettings,
}

impl<'a> MrpCalculator<'a> {
    pub fn new(
        master: &'a dyn MasterData,
        stock: &'a dyn StockView,
        orders: &'a dyn OpenOrders,
        settings: &'a MrpSettings,
    ) -> Self {
        Self {
            master,
            stock,
            orders,
            settings,
        }
    }

    /// 主 MRP 計算入口
    pub fn calculate(
        &self,
        demands: &[Demand],
        today: NaiveDate,
        horizon_days: u32,
    ) -> Result<MrpOutcome> {
        tracing::info!("開始 MRP 計算：需求 {} 筆，時界 {} 天", demands.len(), horizon_days);
        let start_time = std::time::Instant::now();

        // Step 1: BOM 展開
        tracing::debug!("Step 1: BOM 展開");
        let mut warnings = Vec::new();
        let exploded = self.explode_demands(demands, &mut warnings)?;
        tracing::debug!("物料數量: {}", exploded.len());

        // Step 2: 逐物料供應與淨需求
        tracing::debug!("Step 2: 供應查詢與淨需求");
        let materials: Vec<&ExplodedMaterial> = exploded.values().collect();
        let netted: Vec<Result<(NetRequirement, Vec<MrpWarning>)>> =
            if self.settings.parallel_netting {
                materials
                    .par_iter()
                    .map(|material| self.net_material(material, today, horizon_days))
                    .collect()
            } else {
                materials
                    .iter()
                    .map(|material| self.net_material(material, today, horizon_days))
                    .collect()
            };

        let mut requirements = Vec::with_capacity(netted.len());
        for entry in netted {
            let (requirement, material_warnings) = entry?;
            warnings.extend(material_warnings);
            requirements.push(requirement);
        }

        let outcome = MrpOutcome {
            requirements,
            warnings,
            calculation_time_ms: Some(start_time.elapsed().as_millis()),
        };

        tracing::info!(
            "MRP 計算完成，耗時 {:?}，需補貨物料 {} 項",
            start_time.elapsed(),
            outcome.shortage_count()
        );

        Ok(outcome)
    }

    /// 依產品的已發行 BOM 展開需求；沒有 BOM 的產品只留診斷
    fn explode_demands(
        &self,
        demands: &[Demand],
        warnings: &mut Vec<MrpWarning>,
    ) -> Result<ExplosionMap> {
        let exploder = BomExploder::new(self.master, self.settings.max_bom_depth);
        let mut accumulator = ExplosionMap::new();

        for demand in demands.iter().filter(|d| d.is_positive()) {
            let bom = self.master.released_bom(&demand.product_id).map_err(|e| {
                MrpError::upstream(format!("產品 {} 的 BOM 查詢失敗: {e}", demand.product_id))
            })?;

            match bom {
                Some(bom) => exploder.explode_bom(&bom, demand.quantity, &mut accumulator)?,
                None => {
                    tracing::debug!("產品 {} 沒有已發行 BOM，跳過", demand.product_id);
                    warnings.push(MrpWarning::info(
                        demand.product_id.clone(),
                        "沒有已發行的 BOM，未展開".to_string(),
                    ));
                }
            }
        }

        Ok(accumulator)
    }

    fn net_material(
        &self,
        material: &ExplodedMaterial,
        today: NaiveDate,
        horizon_days: u32,
    ) -> Result<(NetRequirement, Vec<MrpWarning>)> {
        let resolver = SupplyResolver::new(self.stock, self.orders);
        let (position, warnings) = resolver.resolve(&material.material_id);
        let requirement = NettingCalculator::calculate(material, &position, today, horizon_days)?;
        Ok((requirement, warnings))
    }
}
