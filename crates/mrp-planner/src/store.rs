//! MRP 運算紀錄儲存

use std::sync::{RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use mrp_core::{MrpError, MrpResult, MrpRun, MrpWarning, Page, Result};
use uuid::Uuid;

/// 一次運算：紀錄與其結果列
#[derive(Debug, Clone)]
pub(crate) struct RunEntry {
    pub run: MrpRun,
    pub results: Vec<MrpResult>,
}

/// 運算紀錄儲存（依建立先後排列）
#[derive(Debug, Default)]
pub struct RunStore {
    entries: RwLock<Vec<RunEntry>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<RunEntry>>> {
        self.entries.write().map_err(|_| MrpError::poisoned("MRP 運算紀錄"))
    }

    fn entry_mut<'a>(entries: &'a mut [RunEntry], run_id: Uuid) -> Result<&'a mut RunEntry> {
        entries
            .iter_mut()
            .find(|e| e.run.id == run_id)
            .ok_or_else(|| MrpError::not_found("MRP 運算", run_id))
    }

    pub fn insert(&self, run: MrpRun) -> Result<()> {
        self.write()?.push(RunEntry {
            run,
            results: Vec::new(),
        });
        Ok(())
    }

    /// Running → Completed，結果列一次寫入
    pub fn complete(
        &self,
        run_id: Uuid,
        results: Vec<MrpResult>,
        diagnostics: Vec<MrpWarning>,
        now: DateTime<Utc>,
    ) -> Result<MrpRun> {
        let mut entries = self.write()?;
        let entry = Self::entry_mut(&mut entries, run_id)?;
        entry.run.complete(results.len(), diagnostics, now)?;
        entry.results = results;
        Ok(entry.run.clone())
    }

    /// Running → Failed，不保留任何結果列
    pub fn fail(&self, run_id: Uuid, message: String, now: DateTime<Utc>) -> Result<MrpRun> {
        let mut entries = self.write()?;
        let entry = Self::entry_mut(&mut entries, run_id)?;
        entry.run.fail(message, now)?;
        entry.results.clear();
        Ok(entry.run.clone())
    }

    pub fn run(&self, run_id: Uuid) -> Result<MrpRun> {
        let entries = self.entries.read().map_err(|_| MrpError::poisoned("MRP 運算紀錄"))?;
        entries
            .iter()
            .find(|e| e.run.id == run_id)
            .map(|e| e.run.clone())
            .ok_or_else(|| MrpError::not_found("MRP 運算", run_id))
    }

    /// 運算結果（依物料ID排序）
    pub fn results(&self, run_id: Uuid) -> Result<Vec<MrpResult>> {
        let entries = self.entries.read().map_err(|_| MrpError::poisoned("MRP 運算紀錄"))?;
        entries
            .iter()
            .find(|e| e.run.id == run_id)
            .map(|e| e.results.clone())
            .ok_or_else(|| MrpError::not_found("MRP 運算", run_id))
    }

    pub fn latest(&self) -> Result<Option<MrpRun>> {
        let entries = self.entries.read().map_err(|_| MrpError::poisoned("MRP 運算紀錄"))?;
        Ok(entries.last().map(|e| e.run.clone()))
    }

    /// 分頁列出（新到舊）
    pub fn list(&self, page: usize, page_size: usize) -> Result<Page<MrpRun>> {
        let entries = self.entries.read().map_err(|_| MrpError::poisoned("MRP 運算紀錄"))?;
        let newest_first: Vec<MrpRun> = entries.iter().rev().map(|e| e.run.clone()).collect();
        Ok(Page::slice(&newest_first, page, page_size))
    }

    /// 持有寫鎖期間修改單次運算
    pub(crate) fn with_entry<R>(
        &self,
        run_id: Uuid,
        change: impl FnOnce(&mut RunEntry) -> Result<R>,
    ) -> Result<R> {
        let mut entries = self.write()?;
        let entry = Self::entry_mut(&mut entries, run_id)?;
        change(entry)
    }
}
