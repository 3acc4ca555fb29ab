//! BOM 展開
//!
//! 將已發行 BOM 依產出數量遞迴展開為「物料 → 總需求」的扁平表。
//! 展開前先驗證明細樹：父項不存在、自我引用或循環都會直接失敗，
//! 不會陷入無窮遞迴。

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use mrp_core::{ActionType, Bom, BomItem, MasterData, Material, MrpError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 展開後的單一物料需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplodedMaterial {
    pub material_id: String,
    pub unit: String,

    /// BOM 總需求（不含安全庫存）
    pub gross_requirement: Decimal,

    pub safety_stock: Decimal,
    pub lead_time_days: u32,

    /// 任何一處出現子件即為 Produce
    pub action_type: ActionType,
}

impl ExplodedMaterial {
    fn first_sight(material: &Material, required_qty: Decimal) -> Self {
        Self {
            material_id: material.id.clone(),
            unit: material.unit.clone(),
            gross_requirement: required_qty,
            safety_stock: material.safety_stock,
            lead_time_days: material.lead_time_days,
            action_type: ActionType::Purchase,
        }
    }
}

/// 展開累積表（有序，保證結果可重現）
pub type ExplosionMap = BTreeMap<String, ExplodedMaterial>;

/// 經驗證的 BOM 明細樹
#[derive(Debug)]
pub struct BomTree<'a> {
    roots: Vec<&'a BomItem>,
    children: HashMap<Uuid, Vec<&'a BomItem>>,
}

impl<'a> BomTree<'a> {
    /// 建立明細樹並檢查結構
    ///
    /// `owner` 只用於錯誤訊息（通常是產品ID）。
    pub fn build(owner: &str, items: &'a [BomItem]) -> Result<Self> {
        let mut by_id: HashMap<Uuid, &BomItem> = HashMap::with_capacity(items.len());
        for item in items {
            if item.quantity <= Decimal::ZERO {
                return Err(MrpError::validation(format!(
                    "BOM {owner} 明細 {} 的用量必須大於 0",
                    item.id
                )));
            }
            if by_id.insert(item.id, item).is_some() {
                return Err(MrpError::validation(format!(
                    "BOM {owner} 明細ID重複: {}",
                    item.id
                )));
            }
        }

        let mut roots = Vec::new();
        let mut children: HashMap<Uuid, Vec<&BomItem>> = HashMap::new();
        for item in items {
            match item.parent_item_id {
                None => roots.push(item),
                Some(parent_id) => {
                    if !by_id.contains_key(&parent_id) {
                        return Err(MrpError::validation(format!(
                            "BOM {owner} 明細 {} 的父項 {parent_id} 不存在",
                            item.id
                        )));
                    }
                    children.entry(parent_id).or_default().push(item);
                }
            }
        }

        // 沿父項鏈往上走，重複造訪即為循環
        for item in items {
            let mut seen = HashSet::from([item.id]);
            let mut current = item;
            while let Some(parent_id) = current.parent_item_id {
                if !seen.insert(parent_id) {
                    return Err(MrpError::validation(format!(
                        "BOM {owner} 存在循環引用（明細 {}）",
                        item.id
                    )));
                }
                current = by_id[&parent_id];
            }
        }

        Ok(Self { roots, children })
    }

    pub fn roots(&self) -> &[&'a BomItem] {
        &self.roots
    }

    pub fn children_of(&self, item_id: Uuid) -> &[&'a BomItem] {
        self.children
            .get(&item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// BOM 展開器
pub struct BomExploder<'a> {
    master: &'a dyn MasterData,
    max_depth: usize,
}

impl<'a> BomExploder<'a> {
    pub fn new(master: &'a dyn MasterData, max_depth: usize) -> Self {
        Self { master, max_depth }
    }

    /// 展開整張 BOM
    pub fn explode_bom(
        &self,
        bom: &Bom,
        quantity: Decimal,
        accumulator: &mut ExplosionMap,
    ) -> Result<()> {
        let owner = bom.header.product_id.as_str();
        let tree = BomTree::build(owner, &bom.items)?;
        self.explode_level(owner, &tree, tree.roots(), quantity, accumulator, 1)
    }

    fn explode_level(
        &self,
        owner: &str,
        tree: &BomTree<'_>,
        items: &[&BomItem],
        parent_quantity: Decimal,
        accumulator: &mut ExplosionMap,
        depth: usize,
    ) -> Result<()> {
        if depth > self.max_depth {
            return Err(MrpError::validation(format!(
                "BOM {owner} 展開深度超過上限 {}",
                self.max_depth
            )));
        }

        let overflow = |material_id: &str| {
            MrpError::validation(format!("BOM {owner} 的物料 {material_id} 需求量溢位"))
        };

        for item in items {
            let required_qty = item
                .quantity
                .checked_mul(parent_quantity)
                .ok_or_else(|| overflow(item.material_id.as_str()))?;

            match accumulator.entry(item.material_id.clone()) {
                Entry::Occupied(mut entry) => {
                    let exploded = entry.get_mut();
                    exploded.gross_requirement = exploded
                        .gross_requirement
                        .checked_add(required_qty)
                        .ok_or_else(|| overflow(item.material_id.as_str()))?;
                }
                Entry::Vacant(entry) => {
                    let material = self.master.material(&item.material_id).map_err(|e| {
                        MrpError::upstream(format!(
                            "BOM {owner} 的物料 {} 查詢失敗: {e}",
                            item.material_id
                        ))
                    })?;
                    entry.insert(ExplodedMaterial::first_sight(&material, required_qty));
                }
            }

            let children = tree.children_of(item.id);
            if children.is_empty() {
                continue;
            }

            if let Some(exploded) = accumulator.get_mut(&item.material_id) {
                exploded.action_type = ActionType::Produce;
            }

            tracing::debug!(
                "BOM 展開: {} → {} 個子件 (數量: {})",
                item.material_id,
                children.len(),
                required_qty
            );

            self.explode_level(owner, tree, children, required_qty, accumulator, depth + 1)?;
        }

        Ok(())
    }
}
