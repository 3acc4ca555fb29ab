//! 交期計算（日曆天）

use chrono::{Days, NaiveDate};
use mrp_core::{MrpError, Result};

/// 交期計算器
pub struct LeadTimeCalculator;

impl LeadTimeCalculator {
    /// 需求日期 = 今日 + 計劃時界
    pub fn required_date(today: NaiveDate, horizon_days: u32) -> Result<NaiveDate> {
        today
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .ok_or_else(|| MrpError::validation(format!("計劃時界 {horizon_days} 天超出日期範圍")))
    }

    /// 計算下單日期（向後推算提前期）
    pub fn calculate_order_date(required_date: NaiveDate, lead_time_days: u32) -> Result<NaiveDate> {
        required_date
            .checked_sub_days(Days::new(u64::from(lead_time_days)))
            .ok_or_else(|| MrpError::validation(format!("提前期 {lead_time_days} 天超出日期範圍")))
    }
}
