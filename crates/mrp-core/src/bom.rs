//! BOM 主檔（唯讀）

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// BOM 狀態，只有 `Released` 對 MRP 可見
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BomStatus {
    Draft,
    Released,
    Obsolete,
}

/// BOM 表頭
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomHeader {
    pub id: Uuid,

    /// 成品ID
    pub product_id: String,

    /// 版本
    pub version: String,

    pub status: BomStatus,
}

impl BomHeader {
    pub fn new(product_id: impl Into<String>, version: impl Into<String>, status: BomStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: product_id.into(),
            version: version.into(),
            status,
        }
    }

    pub fn is_released(&self) -> bool {
        self.status == BomStatus::Released
    }
}

/// BOM 明細
///
/// 以 `parent_item_id` 形成樹狀結構；沒有父項的明細為第一階。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomItem {
    pub id: Uuid,

    pub bom_id: Uuid,

    /// 父項明細ID
    pub parent_item_id: Option<Uuid>,

    /// 物料ID
    pub material_id: String,

    /// 每單位父項用量
    pub quantity: Decimal,
}

impl BomItem {
    /// 創建第一階明細
    pub fn new(bom_id: Uuid, material_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            bom_id,
            parent_item_id: None,
            material_id: material_id.into(),
            quantity,
        }
    }

    /// 建構器模式：設置父項
    pub fn under(mut self, parent: &BomItem) -> Self {
        self.parent_item_id = Some(parent.id);
        self
    }
}

/// 完整 BOM（表頭 + 明細）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bom {
    pub header: BomHeader,
    pub items: Vec<BomItem>,
}

impl Bom {
    /// 創建空的已發行 BOM
    pub fn released(product_id: impl Into<String>) -> Self {
        Self {
            header: BomHeader::new(product_id, "1.0", BomStatus::Released),
            items: Vec::new(),
        }
    }

    /// 添加第一階明細，回傳該明細供後續掛子項
    pub fn add_item(&mut self, material_id: impl Into<String>, quantity: Decimal) -> BomItem {
        let item = BomItem::new(self.header.id, material_id, quantity);
        self.items.push(item.clone());
        item
    }

    /// 在指定明細下添加子項
    pub fn add_child(
        &mut self,
        parent: &BomItem,
        material_id: impl Into<String>,
        quantity: Decimal,
    ) -> BomItem {
        let item = BomItem::new(self.header.id, material_id, quantity).under(parent);
        self.items.push(item.clone());
        item
    }

    /// 第一階明細
    pub fn top_level_items(&self) -> impl Iterator<Item = &BomItem> {
        self.items.iter().filter(|item| item.parent_item_id.is_none())
    }
}
