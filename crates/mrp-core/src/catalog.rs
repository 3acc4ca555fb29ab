//! 記憶體主檔

use std::collections::HashMap;
use std::sync::RwLock;

use crate::{Bom, MasterData, Material, MrpError, Product, Result};

/// 記憶體主檔實作
///
/// 主檔維護不在本系統範圍內；此實作供測試、示例與嵌入式部署使用。
#[derive(Debug, Default)]
pub struct InMemoryMasterData {
    materials: RwLock<HashMap<String, Material>>,
    products: RwLock<HashMap<String, Product>>,
    boms: RwLock<HashMap<String, Vec<Bom>>>,
}

impl InMemoryMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_material(&self, material: Material) -> Result<()> {
        let mut materials = self
            .materials
            .write()
            .map_err(|_| MrpError::poisoned("物料主檔"))?;
        materials.insert(material.id.clone(), material);
        Ok(())
    }

    pub fn upsert_product(&self, product: Product) -> Result<()> {
        let mut products = self
            .products
            .write()
            .map_err(|_| MrpError::poisoned("產品主檔"))?;
        products.insert(product.id.clone(), product);
        Ok(())
    }

    /// 添加 BOM 版本（同一產品可有多個版本）
    pub fn add_bom(&self, bom: Bom) -> Result<()> {
        let mut boms = self.boms.write().map_err(|_| MrpError::poisoned("BOM"))?;
        boms.entry(bom.header.product_id.clone())
            .or_default()
            .push(bom);
        Ok(())
    }
}

impl MasterData for InMemoryMasterData {
    fn material(&self, material_id: &str) -> Result<Material> {
        let materials = self
            .materials
            .read()
            .map_err(|_| MrpError::poisoned("物料主檔"))?;
        materials
            .get(material_id)
            .cloned()
            .ok_or_else(|| MrpError::not_found("物料", material_id))
    }

    fn product(&self, product_id: &str) -> Result<Product> {
        let products = self
            .products
            .read()
            .map_err(|_| MrpError::poisoned("產品主檔"))?;
        products
            .get(product_id)
            .cloned()
            .ok_or_else(|| MrpError::not_found("產品", product_id))
    }

    fn active_products(&self) -> Result<Vec<Product>> {
        let products = self
            .products
            .read()
            .map_err(|_| MrpError::poisoned("產品主檔"))?;
        let mut active: Vec<Product> = products.values().filter(|p| p.is_active()).cloned().collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    fn released_bom(&self, product_id: &str) -> Result<Option<Bom>> {
        let boms = self.boms.read().map_err(|_| MrpError::poisoned("BOM"))?;
        Ok(boms
            .get(product_id)
            .and_then(|versions| versions.iter().find(|b| b.header.is_released()))
            .cloned())
    }
}
