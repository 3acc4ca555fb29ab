//! MRP 系統設定

use serde::{Deserialize, Serialize};

use crate::{MrpError, Result};

/// MRP 系統參數設定
///
/// 可由 JSON 載入（缺少的欄位使用預設值），或由環境變數覆寫。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrpSettings {
    /// 預設計劃時界（天）
    pub planning_horizon_days: u32,

    /// 計劃時界上限（天）
    pub max_planning_horizon_days: u32,

    /// BOM 展開深度上限
    pub max_bom_depth: usize,

    /// 預設分頁大小
    pub default_page_size: usize,

    /// 分頁大小上限
    pub max_page_size: usize,

    /// 是否允許超收（收貨數量超過訂購數量）
    pub allow_over_receipt: bool,

    /// 是否以多執行緒計算各物料供應與淨需求
    pub parallel_netting: bool,
}

impl Default for MrpSettings {
    fn default() -> Self {
        Self {
            planning_horizon_days: 30,
            max_planning_horizon_days: 365,
            max_bom_depth: 64,
            default_page_size: 20,
            max_page_size: 100,
            allow_over_receipt: false,
            parallel_netting: true,
        }
    }
}

impl MrpSettings {
    /// 從 JSON 字串載入設定
    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(raw)
            .map_err(|e| MrpError::validation(format!("設定格式錯誤: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// 以環境變數覆寫預設設定
    ///
    /// 支援 `MRP_HORIZON_DAYS`、`MRP_MAX_BOM_DEPTH`、`MRP_ALLOW_OVER_RECEIPT`。
    pub fn from_env() -> Result<Self> {
        Self::default().merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("MRP_HORIZON_DAYS") {
            self.planning_horizon_days = parse_var("MRP_HORIZON_DAYS", &raw)?;
        }
        if let Some(raw) = lookup("MRP_MAX_BOM_DEPTH") {
            self.max_bom_depth = parse_var("MRP_MAX_BOM_DEPTH", &raw)?;
        }
        if let Some(raw) = lookup("MRP_ALLOW_OVER_RECEIPT") {
            self.allow_over_receipt = parse_var("MRP_ALLOW_OVER_RECEIPT", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// 建構器模式：設置計劃時界
    pub fn with_planning_horizon(mut self, days: u32) -> Self {
        self.planning_horizon_days = days;
        self
    }

    /// 建構器模式：設置 BOM 展開深度上限
    pub fn with_max_bom_depth(mut self, depth: usize) -> Self {
        self.max_bom_depth = depth;
        self
    }

    /// 建構器模式：設置是否允許超收
    pub fn with_allow_over_receipt(mut self, allow: bool) -> Self {
        self.allow_over_receipt = allow;
        self
    }

    /// 建構器模式：設置是否平行計算
    pub fn with_parallel_netting(mut self, parallel: bool) -> Self {
        self.parallel_netting = parallel;
        self
    }

    /// 檢查設定是否合理
    pub fn validate(&self) -> Result<()> {
        if self.planning_horizon_days == 0
            || self.planning_horizon_days > self.max_planning_horizon_days
        {
            return Err(MrpError::validation(format!(
                "計劃時界必須介於 1 與 {} 天之間，目前為 {}",
                self.max_planning_horizon_days, self.planning_horizon_days
            )));
        }
        if self.max_bom_depth == 0 {
            return Err(MrpError::validation("BOM 展開深度上限不可為 0"));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(MrpError::validation(format!(
                "預設分頁大小必須介於 1 與 {} 之間",
                self.max_page_size
            )));
        }
        Ok(())
    }

    /// 檢查指定的計劃時界是否在允許範圍內
    pub fn check_horizon(&self, days: u32) -> Result<u32> {
        if days == 0 || days > self.max_planning_horizon_days {
            return Err(MrpError::validation(format!(
                "計劃時界 {} 天超出範圍（1..={}）",
                days, self.max_planning_horizon_days
            )));
        }
        Ok(days)
    }

    /// 將分頁大小限制在允許範圍
    pub fn clamp_page_size(&self, size: usize) -> usize {
        if size == 0 {
            self.default_page_size
        } else {
            size.min(self.max_page_size)
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| MrpError::validation(format!("環境變數 {key} 的值無效: {raw}")))
}
