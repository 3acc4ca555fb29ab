//! MRP 運算協調器
//!
//! 一次運算：驗證時界 → 建立 Running 紀錄 → 彙總需求 → 展開與淨需求 →
//! 一次寫入結果列並標記 Completed；任何錯誤都讓紀錄轉為 Failed 且不留結果列。
//! 套用時由結果列產生請購單。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use mrp_calc::{DemandAggregator, MrpCalculator};
use mrp_core::{
    ActionType, Demand, DocumentSequence, MasterData, MrpError, MrpResult, MrpRun, MrpSettings,
    MrpWarning, NewRequisition, OpenOrders, Page, PurchaseRequisition, RequisitionSink,
    RequisitionSource, Result, StockView,
};
use serde::Serialize;
use uuid::Uuid;

use crate::store::RunStore;

/// 套用結果
#[derive(Debug, Clone, Serialize)]
pub struct ApplySummary {
    pub run: MrpRun,

    /// 本次產生的請購單
    pub requisitions: Vec<PurchaseRequisition>,

    /// 未轉工單的生產建議筆數
    pub produce_pending: usize,
}

/// MRP 運算協調器
pub struct MrpPlanner {
    master: Arc<dyn MasterData>,
    stock: Arc<dyn StockView>,
    orders: Arc<dyn OpenOrders>,
    requisitions: Arc<dyn RequisitionSink>,
    settings: Arc<MrpSettings>,
    store: RunStore,
    run_codes: DocumentSequence,
}

impl MrpPlanner {
    pub fn new(
        master: Arc<dyn MasterData>,
        stock: Arc<dyn StockView>,
        orders: Arc<dyn OpenOrders>,
        requisitions: Arc<dyn RequisitionSink>,
        settings: Arc<MrpSettings>,
    ) -> Self {
        Self {
            master,
            stock,
            orders,
            requisitions,
            settings,
            store: RunStore::new(),
            run_codes: DocumentSequence::new("MRP"),
        }
    }

    /// 以今天為基準執行 MRP
    pub fn run(&self, product_id: Option<&str>, horizon_days: Option<u32>) -> Result<MrpRun> {
        self.run_at(product_id, horizon_days, Utc::now().date_naive())
    }

    /// 以指定日期為基準執行 MRP
    ///
    /// 運算失敗時紀錄保留為 Failed，並把原錯誤回傳給呼叫端。
    pub fn run_at(
        &self,
        product_id: Option<&str>,
        horizon_days: Option<u32>,
        today: NaiveDate,
    ) -> Result<MrpRun> {
        let horizon = self
            .settings
            .check_horizon(horizon_days.unwrap_or(self.settings.planning_horizon_days))?;
        if let Some(product_id) = product_id {
            self.master.product(product_id)?;
        }

        let run = MrpRun::start(
            self.run_codes.next(today),
            product_id.map(str::to_string),
            horizon,
            Utc::now(),
        );
        let run_id = run.id;
        self.store.insert(run.clone())?;
        tracing::info!("MRP 運算 {} 開始，產品範圍 {:?}，時界 {} 天", run.code, product_id, horizon);

        match self.compute(run_id, product_id, horizon, today) {
            Ok((results, diagnostics)) => {
                let completed = self.store.complete(run_id, results, diagnostics, Utc::now())?;
                tracing::info!(
                    "MRP 運算 {} 完成，結果 {} 筆，診斷 {} 筆",
                    completed.code,
                    completed.total_items,
                    completed.diagnostics.len()
                );
                Ok(completed)
            }
            Err(e) => {
                tracing::error!("MRP 運算 {} 失敗: {}", run.code, e);
                self.store.fail(run_id, e.to_string(), Utc::now())?;
                Err(e)
            }
        }
    }

    fn compute(
        &self,
        run_id: Uuid,
        product_id: Option<&str>,
        horizon: u32,
        today: NaiveDate,
    ) -> Result<(Vec<MrpResult>, Vec<MrpWarning>)> {
        let demands = self.scoped_demands(product_id)?;
        tracing::debug!("需求產品 {} 項", demands.len());

        let calculator = MrpCalculator::new(
            self.master.as_ref(),
            self.stock.as_ref(),
            self.orders.as_ref(),
            &self.settings,
        );
        let outcome = calculator.calculate(&demands, today, horizon)?;

        let results = outcome
            .requirements
            .into_iter()
            .map(|requirement| requirement.into_result(run_id))
            .collect();
        Ok((results, outcome.warnings))
    }

    /// 指定產品只取該產品需求，否則只取有效產品
    fn scoped_demands(&self, product_id: Option<&str>) -> Result<Vec<Demand>> {
        let sales_orders = self
            .orders
            .sales_orders()
            .map_err(|e| MrpError::upstream(format!("銷售訂單查詢失敗: {e}")))?;
        let demands = DemandAggregator::demands(&sales_orders)?;

        let scoped = match product_id {
            Some(product_id) => demands
                .into_iter()
                .filter(|d| d.product_id == product_id)
                .collect(),
            None => {
                let active: HashSet<String> = self
                    .master
                    .active_products()
                    .map_err(|e| MrpError::upstream(format!("產品主檔查詢失敗: {e}")))?
                    .into_iter()
                    .map(|p| p.id)
                    .collect();
                demands
                    .into_iter()
                    .filter(|d| active.contains(&d.product_id))
                    .collect()
            }
        };
        Ok(scoped)
    }

    pub fn run_record(&self, run_id: Uuid) -> Result<MrpRun> {
        self.store.run(run_id)
    }

    pub fn results(&self, run_id: Uuid) -> Result<Vec<MrpResult>> {
        self.store.results(run_id)
    }

    pub fn latest_run(&self) -> Result<Option<MrpRun>> {
        self.store.latest()
    }

    pub fn list_runs(&self, page: usize, page_size: usize) -> Result<Page<MrpRun>> {
        self.store
            .list(page, self.settings.clamp_page_size(page_size))
    }

    /// 將運算結果轉為請購單
    ///
    /// 每筆結果的「建立請購單 + 標記已套用」在運算紀錄寫鎖下一起完成；
    /// 中途失敗時紀錄維持 Completed，重試只處理剩餘的結果列。
    pub fn apply(&self, run_id: Uuid) -> Result<ApplySummary> {
        self.store.with_entry(run_id, |entry| {
            entry.run.ensure_applicable()?;

            let mut requisitions = Vec::new();
            let mut produce_pending = 0;

            for result in entry.results.iter_mut().filter(|r| r.needs_action()) {
                match result.action_type {
                    ActionType::Purchase => {
                        let request = NewRequisition {
                            material_id: result.material_id.clone(),
                            quantity: result.planned_order_qty,
                            required_date: Some(result.required_date),
                            source: RequisitionSource::Mrp {
                                run_id,
                                result_id: result.id,
                            },
                            remark: Some(format!("MRP 運算 {}", entry.run.code)),
                        };
                        match self.requisitions.create_requisition(request) {
                            Ok(pr) => {
                                result.mark_applied()?;
                                requisitions.push(pr);
                            }
                            Err(e) => {
                                entry.run.prs_generated += requisitions.len();
                                tracing::warn!(
                                    "MRP 運算 {} 套用中斷：物料 {} 請購失敗: {}，已產生 {} 張",
                                    entry.run.code,
                                    result.material_id,
                                    e,
                                    requisitions.len()
                                );
                                return Err(e);
                            }
                        }
                    }
                    ActionType::Produce => produce_pending += 1,
                }
            }

            if produce_pending > 0 {
                entry.run.diagnostics.push(MrpWarning::info(
                    entry.run.code.clone(),
                    format!("{produce_pending} 筆生產建議未自動轉為工單"),
                ));
            }
            entry.run.mark_applied(requisitions.len(), 0, Utc::now())?;
            tracing::info!(
                "MRP 運算 {} 已套用，產生請購單 {} 張",
                entry.run.code,
                requisitions.len()
            );

            Ok(ApplySummary {
                run: entry.run.clone(),
                requisitions,
                produce_pending,
            })
        })
    }
}
