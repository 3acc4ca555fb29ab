//! 淨需求計算

use chrono::NaiveDate;
use mrp_core::{ActionType, MrpError, MrpResult, Result, SupplyPosition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::explosion::ExplodedMaterial;
use crate::lead_time::LeadTimeCalculator;

/// 淨需求計算結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetRequirement {
    pub material_id: String,
    /// 總需求（BOM 展開量 + 安全庫存）
    pub gross_requirement: Decimal,
    pub on_hand: Decimal,
    pub in_transit: Decimal,
    pub in_production: Decimal,
    pub safety_stock: Decimal,
    /// 淨需求
    pub net_requirement: Decimal,
    /// 計劃訂購量（不做批量調整，等於淨需求）
    pub planned_order_qty: Decimal,
    pub action_type: ActionType,
    pub required_date: NaiveDate,
    pub lead_time_days: u32,
    pub order_date: NaiveDate,
}

impl NetRequirement {
    /// 是否需要補貨
    pub fn has_shortage(&self) -> bool {
        self.net_requirement > Decimal::ZERO
    }

    /// 轉為運算結果列
    pub fn into_result(self, run_id: Uuid) -> MrpResult {
        MrpResult {
            id: Uuid::new_v4(),
            run_id,
            material_id: self.material_id,
            gross_requirement: self.gross_requirement,
            on_hand: self.on_hand,
            in_transit: self.in_transit,
            in_production: self.in_production,
            safety_stock: self.safety_stock,
            net_requirement: self.net_requirement,
            planned_order_qty: self.planned_order_qty,
            action_type: self.action_type,
            required_date: self.required_date,
            lead_time_days: self.lead_time_days,
            order_date: self.order_date,
            applied: false,
        }
    }
}

/// 淨需求計算器
pub struct NettingCalculator;

impl NettingCalculator {
    /// 計算淨需求
    ///
    /// `net = max(0, gross + safety_stock - on_hand - in_transit - in_production)`
    pub fn calculate(
        exploded: &ExplodedMaterial,
        supply: &SupplyPosition,
        today: NaiveDate,
        horizon_days: u32,
    ) -> Result<NetRequirement> {
        let gross = exploded
            .gross_requirement
            .checked_add(exploded.safety_stock)
            .ok_or_else(|| {
                MrpError::validation(format!("物料 {} 總需求溢位", exploded.material_id))
            })?;
        // 供應皆非負，逐項扣減並截在 0，結果同 max(0, gross - total)
        let net = [supply.on_hand, supply.in_transit, supply.in_production]
            .into_iter()
            .fold(gross, |remaining, qty| (remaining - qty).max(Decimal::ZERO));

        let required_date = LeadTimeCalculator::required_date(today, horizon_days)?;
        let order_date =
            LeadTimeCalculator::calculate_order_date(required_date, exploded.lead_time_days)?;

        Ok(NetRequirement {
            material_id: exploded.material_id.clone(),
            gross_requirement: gross,
            on_hand: supply.on_hand,
            in_transit: supply.in_transit,
            in_production: supply.in_production,
            safety_stock: exploded.safety_stock,
            net_requirement: net,
            planned_order_qty: net,
            action_type: exploded.action_type,
            required_date,
            lead_time_days: exploded.lead_time_days,
            order_date,
        })
    }
}
