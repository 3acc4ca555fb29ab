//! 庫存帳本
//!
//! 每個（物料, 倉庫）一個 slot，slot 內放該鍵所有批次的庫存記錄。
//! 過帳時依鍵排序逐一上鎖，先在副本上套用全部異動，
//! 全部成功才寫回並附加日記帳；任何一筆失敗則整批不生效。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use mrp_core::{
    InventoryRecord, InventoryTransaction, MrpError, Result, StockKey, StockView,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::query::{AlertKind, InventoryFilter, ReconcileReport, StockAlert, TransactionFilter};
use crate::request::{
    require_positive, AdjustRequest, InboundRequest, MovementAction, OutboundRequest,
    StockMovement, TransferRequest,
};

#[derive(Debug, Clone, Default)]
struct StockSlot {
    /// 依建立先後排列
    records: Vec<InventoryRecord>,
    safety_stock: Decimal,
    max_stock: Option<Decimal>,
}

type SlotHandle = Arc<Mutex<StockSlot>>;

impl StockSlot {
    fn quantity(&self) -> Decimal {
        self.records.iter().map(|r| r.quantity).sum()
    }

    fn available(&self) -> Decimal {
        self.records.iter().map(|r| r.available_qty).sum()
    }

    fn reserved(&self) -> Decimal {
        self.records.iter().map(|r| r.reserved_qty).sum()
    }

    fn record_or_insert(
        &mut self,
        key: &StockKey,
        batch_no: Option<&str>,
        now: DateTime<Utc>,
    ) -> &mut InventoryRecord {
        let index = match self
            .records
            .iter()
            .position(|r| r.batch_no.as_deref() == batch_no)
        {
            Some(index) => index,
            None => {
                let mut record = InventoryRecord::new(
                    key.material_id.clone(),
                    key.warehouse_id.clone(),
                    batch_no.map(str::to_string),
                    now,
                );
                record.safety_stock = self.safety_stock;
                record.max_stock = self.max_stock;
                self.records.push(record);
                self.records.len() - 1
            }
        };
        &mut self.records[index]
    }

    /// 各批次合計加上 `extra` 後仍須可表示，否則之後的加總會溢位
    fn ensure_room(&self, key: &StockKey, extra: Decimal) -> Result<()> {
        self.records
            .iter()
            .try_fold(extra, |total, r| total.checked_add(r.quantity))
            .map(|_| ())
            .ok_or_else(|| MrpError::validation(format!("庫存數量溢位：{key}")))
    }

    /// 扣減計畫：指定批次只看該批，否則先進先出。
    /// 可用量不足時回傳 `Err(可用量)`。
    fn draw_plan(
        &self,
        batch_no: Option<&str>,
        need: Decimal,
    ) -> std::result::Result<Vec<(usize, Decimal)>, Decimal> {
        let candidates: Vec<usize> = match batch_no {
            Some(batch) => self
                .records
                .iter()
                .position(|r| r.batch_no.as_deref() == Some(batch))
                .into_iter()
                .collect(),
            None => {
                let mut indexes: Vec<usize> = (0..self.records.len()).collect();
                indexes.sort_by_key(|&i| self.records[i].created_at);
                indexes
            }
        };

        let available: Decimal = candidates
            .iter()
            .map(|&i| self.records[i].available_qty)
            .sum();
        if available < need {
            return Err(available);
        }

        let mut remaining = need;
        let mut plan = Vec::new();
        for index in candidates {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = self.records[index].available_qty.min(remaining);
            if take > Decimal::ZERO {
                plan.push((index, take));
                remaining -= take;
            }
        }
        Ok(plan)
    }

    /// 在 slot 副本上套用一筆異動，回傳待寫入的日記帳（序號未定）
    fn apply(
        &mut self,
        movement: &StockMovement,
        now: DateTime<Utc>,
        carried_cost: &mut HashMap<String, Decimal>,
    ) -> Result<Vec<InventoryTransaction>> {
        let key = &movement.key;
        let batch_no = movement.batch_no.as_deref();
        let mut entries = Vec::new();

        match movement.action {
            MovementAction::Receive { unit_cost } => {
                let cost = unit_cost
                    .or_else(|| carried_cost.get(&key.material_id).copied())
                    .unwrap_or(Decimal::ZERO);
                self.ensure_room(key, movement.quantity)?;
                let record = self.record_or_insert(key, batch_no, now);
                record.receive(movement.quantity, cost, now)?;
                entries.push(journal_entry(
                    movement,
                    record.batch_no.clone(),
                    movement.quantity,
                    cost,
                    now,
                ));
            }
            MovementAction::Issue => {
                let plan = self
                    .draw_plan(batch_no, movement.quantity)
                    .map_err(|available| MrpError::InsufficientStock {
                        material_id: key.material_id.clone(),
                        warehouse_id: key.warehouse_id.clone(),
                        requested: movement.quantity,
                        available,
                    })?;

                let mut issued_value = Decimal::ZERO;
                for (index, quantity) in plan {
                    let record = &mut self.records[index];
                    record.issue(quantity, now)?;
                    issued_value = quantity
                        .checked_mul(record.unit_cost)
                        .and_then(|value| value.checked_add(issued_value))
                        .ok_or_else(|| {
                            MrpError::validation(format!("出庫金額溢位：{}", movement.key))
                        })?;
                    entries.push(journal_entry(
                        movement,
                        record.batch_no.clone(),
                        -quantity,
                        record.unit_cost,
                        now,
                    ));
                }
                let average = issued_value
                    .checked_div(movement.quantity)
                    .ok_or_else(|| MrpError::validation(format!("出庫成本溢位：{}", movement.key)))?;
                carried_cost.insert(key.material_id.clone(), average);
            }
            MovementAction::Adjust if movement.quantity > Decimal::ZERO => {
                self.ensure_room(key, movement.quantity)?;
                let record = self.record_or_insert(key, batch_no, now);
                record.adjust(movement.quantity, now)?;
                entries.push(journal_entry(
                    movement,
                    record.batch_no.clone(),
                    movement.quantity,
                    record.unit_cost,
                    now,
                ));
            }
            MovementAction::Adjust => {
                let shortage = -movement.quantity;
                let plan = self.draw_plan(batch_no, shortage).map_err(|available| {
                    MrpError::NegativeStock {
                        material_id: key.material_id.clone(),
                        warehouse_id: key.warehouse_id.clone(),
                        current: available,
                        delta: movement.quantity,
                    }
                })?;

                for (index, quantity) in plan {
                    let record = &mut self.records[index];
                    record.adjust(-quantity, now)?;
                    entries.push(journal_entry(
                        movement,
                        record.batch_no.clone(),
                        -quantity,
                        record.unit_cost,
                        now,
                    ));
                }
            }
        }

        Ok(entries)
    }
}

fn journal_entry(
    movement: &StockMovement,
    batch_no: Option<String>,
    quantity: Decimal,
    unit_cost: Decimal,
    now: DateTime<Utc>,
) -> InventoryTransaction {
    InventoryTransaction {
        id: Uuid::new_v4(),
        sequence: 0,
        material_id: movement.key.material_id.clone(),
        warehouse_id: movement.key.warehouse_id.clone(),
        batch_no,
        transaction_type: movement.transaction_type,
        quantity,
        unit_cost,
        reference_type: movement.reference.reference_type,
        reference_id: movement.reference.reference_id,
        reference_code: movement.reference.reference_code.clone(),
        operator: movement.operator.clone(),
        remark: movement.remark.clone(),
        created_at: now,
    }
}

/// 庫存帳本
///
/// 庫存記錄的數量欄位只由帳本寫入；日記帳只能附加。
#[derive(Debug, Default)]
pub struct InventoryLedger {
    slots: RwLock<HashMap<StockKey, SlotHandle>>,
    journal: Mutex<Vec<InventoryTransaction>>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入庫
    pub fn inbound(&self, request: InboundRequest) -> Result<InventoryTransaction> {
        let mut committed = self.post(vec![request.into_movement()?])?;
        committed
            .pop()
            .ok_or_else(|| MrpError::Storage("入庫未產生日記帳".to_string()))
    }

    /// 出庫（未指定批次時可能跨批次，每批一筆日記帳）
    pub fn outbound(&self, request: OutboundRequest) -> Result<Vec<InventoryTransaction>> {
        self.post(vec![request.into_movement()?])
    }

    /// 盤點調整
    pub fn adjust(&self, request: AdjustRequest) -> Result<Vec<InventoryTransaction>> {
        self.post(vec![request.into_movement()?])
    }

    /// 倉庫調撥（調出、調入同一批過帳）
    pub fn transfer(&self, request: TransferRequest) -> Result<Vec<InventoryTransaction>> {
        self.post(request.into_movements()?)
    }

    /// 多鍵過帳：全部成功或全部不生效
    pub fn post(&self, movements: Vec<StockMovement>) -> Result<Vec<InventoryTransaction>> {
        if movements.is_empty() {
            return Ok(Vec::new());
        }

        let keys: BTreeSet<StockKey> = movements.iter().map(|m| m.key.clone()).collect();
        let handles = self.slot_handles(&keys)?;

        // 依鍵順序上鎖，避免交叉等待
        let mut guards = Vec::with_capacity(handles.len());
        for (key, handle) in &handles {
            let guard = handle
                .lock()
                .map_err(|_| MrpError::poisoned("庫存記錄"))?;
            guards.push((key, guard));
        }

        let now = Utc::now();
        let mut staged: BTreeMap<StockKey, StockSlot> = guards
            .iter()
            .map(|(key, guard)| (StockKey::clone(key), StockSlot::clone(guard)))
            .collect();

        let mut carried_cost = HashMap::new();
        let mut pending = Vec::new();
        for movement in &movements {
            let slot = staged
                .get_mut(&movement.key)
                .ok_or_else(|| MrpError::Storage(format!("庫存鍵 {} 未上鎖", movement.key)))?;
            match slot.apply(movement, now, &mut carried_cost) {
                Ok(entries) => pending.extend(entries),
                Err(error) => {
                    tracing::debug!("過帳失敗，整批不生效: {}", error);
                    return Err(error);
                }
            }
        }

        let mut journal = self
            .journal
            .lock()
            .map_err(|_| MrpError::poisoned("庫存日記帳"))?;

        for (key, guard) in guards.iter_mut() {
            if let Some(slot) = staged.remove(*key) {
                **guard = slot;
            }
        }

        let mut sequence = journal.len() as u64;
        for entry in pending.iter_mut() {
            sequence += 1;
            entry.sequence = sequence;
        }
        journal.extend(pending.iter().cloned());

        tracing::info!(
            "庫存過帳完成：異動 {} 筆，鍵 {} 個，日記帳 {} 筆",
            movements.len(),
            keys.len(),
            pending.len()
        );

        Ok(pending)
    }

    /// 預留庫存（先進先出，不產生日記帳）
    pub fn reserve(&self, key: &StockKey, quantity: Decimal) -> Result<()> {
        require_positive(quantity, "預留數量")?;
        let handle = self.existing_slot(key)?;
        let mut slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;

        let plan = slot
            .draw_plan(None, quantity)
            .map_err(|available| MrpError::InsufficientStock {
                material_id: key.material_id.clone(),
                warehouse_id: key.warehouse_id.clone(),
                requested: quantity,
                available,
            })?;

        let now = Utc::now();
        let mut staged = slot.clone();
        for (index, take) in plan {
            staged.records[index].reserve(take, now)?;
        }
        *slot = staged;
        Ok(())
    }

    /// 釋放預留（後進先出）
    pub fn release(&self, key: &StockKey, quantity: Decimal) -> Result<()> {
        require_positive(quantity, "釋放數量")?;
        let handle = self.existing_slot(key)?;
        let mut slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;

        let reserved = slot.reserved();
        if reserved < quantity {
            return Err(MrpError::validation(format!(
                "釋放數量超過已預留數量：釋放 {quantity}, 已預留 {reserved}"
            )));
        }

        let now = Utc::now();
        let mut staged = slot.clone();
        let mut remaining = quantity;
        for record in staged.records.iter_mut().rev() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = record.reserved_qty.min(remaining);
            if take > Decimal::ZERO {
                record.release(take, now)?;
                remaining -= take;
            }
        }
        *slot = staged;
        Ok(())
    }

    /// 設定安全庫存與最高庫存（套用到該鍵所有批次與之後新建的批次）
    pub fn set_stock_limits(
        &self,
        key: &StockKey,
        safety_stock: Decimal,
        max_stock: Option<Decimal>,
    ) -> Result<()> {
        if safety_stock < Decimal::ZERO {
            return Err(MrpError::validation("安全庫存不可為負"));
        }
        if let Some(max) = max_stock {
            if max < safety_stock {
                return Err(MrpError::validation(format!(
                    "最高庫存 {max} 不可低於安全庫存 {safety_stock}"
                )));
            }
        }

        let keys = BTreeSet::from([key.clone()]);
        let handles = self.slot_handles(&keys)?;
        for (_, handle) in handles {
            let mut slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;
            slot.safety_stock = safety_stock;
            slot.max_stock = max_stock;
            for record in slot.records.iter_mut() {
                record.safety_stock = safety_stock;
                record.max_stock = max_stock;
            }
        }
        Ok(())
    }

    /// 列出庫存記錄（依鍵、建立先後排序）
    pub fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryRecord>> {
        let handles = self.handles_where(|key| {
            filter
                .material_id
                .as_ref()
                .map_or(true, |m| *m == key.material_id)
        })?;

        let mut records = Vec::new();
        for (_, handle) in handles {
            let slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;
            records.extend(slot.records.iter().filter(|r| filter.matches(r)).cloned());
        }
        Ok(records)
    }

    /// 查詢單一庫存記錄
    pub fn record(&self, key: &StockKey, batch_no: Option<&str>) -> Result<InventoryRecord> {
        let handle = self.existing_slot(key)?;
        let slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;
        slot.records
            .iter()
            .find(|r| r.batch_no.as_deref() == batch_no)
            .cloned()
            .ok_or_else(|| MrpError::not_found("庫存記錄", key))
    }

    /// 低庫存與超量警示
    pub fn alerts(&self) -> Result<Vec<StockAlert>> {
        let handles = self.handles_where(|_| true)?;
        let mut alerts = Vec::new();

        for (key, handle) in handles {
            let slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;
            let available = slot.available();
            if slot.safety_stock > Decimal::ZERO && available < slot.safety_stock {
                alerts.push(StockAlert {
                    key: key.clone(),
                    kind: AlertKind::LowStock,
                    current: available,
                    threshold: slot.safety_stock,
                });
            }
            if let Some(max) = slot.max_stock {
                let quantity = slot.quantity();
                if quantity > max {
                    alerts.push(StockAlert {
                        key,
                        kind: AlertKind::Overstock,
                        current: quantity,
                        threshold: max,
                    });
                }
            }
        }

        Ok(alerts)
    }

    /// 查詢日記帳（依序號遞增）
    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<InventoryTransaction>> {
        let journal = self
            .journal
            .lock()
            .map_err(|_| MrpError::poisoned("庫存日記帳"))?;
        Ok(journal.iter().filter(|tx| filter.matches(tx)).cloned().collect())
    }

    /// 物料在所有倉庫的可用量
    pub fn available(&self, material_id: &str) -> Result<Decimal> {
        let records = self.stock_records(material_id)?;
        mrp_core::source::total_available(&records)
    }

    /// 核對庫存記錄與日記帳
    pub fn reconcile(&self, key: &StockKey) -> Result<ReconcileReport> {
        let handle = self.existing_slot(key)?;
        let slot = handle.lock().map_err(|_| MrpError::poisoned("庫存記錄"))?;
        let journal = self
            .journal
            .lock()
            .map_err(|_| MrpError::poisoned("庫存日記帳"))?;

        let journal_quantity = journal
            .iter()
            .filter(|tx| tx.material_id == key.material_id && tx.warehouse_id == key.warehouse_id)
            .map(|tx| tx.quantity)
            .sum();

        let report = ReconcileReport {
            key: key.clone(),
            record_quantity: slot.quantity(),
            journal_quantity,
            records_consistent: slot.records.iter().all(InventoryRecord::is_consistent),
        };

        if !report.is_balanced() {
            tracing::warn!(
                "帳實不符 {}: 記錄 {}, 日記帳 {}",
                key,
                report.record_quantity,
                report.journal_quantity
            );
        }
        Ok(report)
    }

    fn existing_slot(&self, key: &StockKey) -> Result<SlotHandle> {
        let slots = self.slots.read().map_err(|_| MrpError::poisoned("庫存索引"))?;
        slots
            .get(key)
            .cloned()
            .ok_or_else(|| MrpError::not_found("庫存記錄", key))
    }

    /// 取得（必要時建立）各鍵的 slot，依鍵排序
    fn slot_handles(&self, keys: &BTreeSet<StockKey>) -> Result<Vec<(StockKey, SlotHandle)>> {
        {
            let slots = self.slots.read().map_err(|_| MrpError::poisoned("庫存索引"))?;
            if keys.iter().all(|key| slots.contains_key(key)) {
                return Ok(keys
                    .iter()
                    .filter_map(|key| slots.get(key).map(|h| (key.clone(), Arc::clone(h))))
                    .collect());
            }
        }

        let mut slots = self.slots.write().map_err(|_| MrpError::poisoned("庫存索引"))?;
        Ok(keys
            .iter()
            .map(|key| {
                let handle = slots.entry(key.clone()).or_default();
                (key.clone(), Arc::clone(handle))
            })
            .collect())
    }

    fn handles_where(
        &self,
        predicate: impl Fn(&StockKey) -> bool,
    ) -> Result<Vec<(StockKey, SlotHandle)>> {
        let slots = self.slots.read().map_err(|_| MrpError::poisoned("庫存索引"))?;
        let mut handles: Vec<(StockKey, SlotHandle)> = slots
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, handle)| (key.clone(), Arc::clone(handle)))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(handles)
    }
}

impl StockView for InventoryLedger {
    fn stock_records(&self, material_id: &str) -> Result<Vec<InventoryRecord>> {
        self.list(&InventoryFilter::material(material_id))
    }
}
