//! 自行車 MRP 示例：銷售需求 → MRP → 請購 → 採購收貨

use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, Utc};
use mrp::{
    DocumentRef, InboundRequest, MrpSystem, NewPurchaseLine, NewPurchaseOrder, NewSalesOrder,
    ReceiveLine,
};
use mrp_core::{Bom, InMemoryMasterData, Material, MrpSettings, Product, ReferenceType};
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    mrp::telemetry::init();
    println!("=== 自行車 MRP 示例 ===\n");

    // 主檔
    let master = Arc::new(InMemoryMasterData::new());
    for (id, lead, safety) in [("FRAME", 5, 0), ("TUBE", 10, 20), ("WHEEL", 7, 4), ("SEAT", 7, 10)] {
        master.upsert_material(Material::new(id, "PCS", lead).with_safety_stock(Decimal::from(safety)))?;
    }
    master.upsert_product(Product::active("BIKE"))?;

    let mut bom = Bom::released("BIKE");
    let frame = bom.add_item("FRAME", Decimal::ONE);
    bom.add_child(&frame, "TUBE", Decimal::from(3));
    bom.add_item("WHEEL", Decimal::from(2));
    bom.add_item("SEAT", Decimal::ONE);
    master.add_bom(bom)?;

    let system = MrpSystem::with_master(master, MrpSettings::from_env()?)?;

    // 現有庫存
    system.ledger.inbound(
        InboundRequest::new("SEAT", "WH-MAIN", Decimal::from(5), DocumentRef::new(ReferenceType::Return))
            .with_unit_cost(Decimal::from(12)),
    )?;

    // 銷售訂單
    let today = Utc::now().date_naive();
    let order = system.sales.create(NewSalesOrder {
        customer_id: "CUST-001".to_string(),
        order_date: today,
        delivery_date: today.checked_add_days(Days::new(21)),
        lines: vec![("BIKE".to_string(), Decimal::from(40), Decimal::from(450))],
    })?;
    system.sales.confirm(order.id)?;
    println!("銷售訂單 {}：BIKE x 40\n", order.code);

    // MRP
    let run = system.planner.run(None, None)?;
    println!("MRP 運算 {} 狀態 {}，結果 {} 筆", run.code, run.status, run.total_items);
    for result in system.planner.results(run.id)? {
        println!(
            "  - {:<6} 總需求 {:>4} 現有 {:>3} 淨需求 {:>4} {} 下單日 {}",
            result.material_id,
            result.gross_requirement,
            result.on_hand,
            result.net_requirement,
            result.action_type,
            result.order_date
        );
    }

    // 套用 → 請購單
    let summary = system.planner.apply(run.id)?;
    println!(
        "\n已套用：請購單 {} 張，未轉工單的生產建議 {} 筆",
        summary.requisitions.len(),
        summary.produce_pending
    );

    // 座墊請購 → 採購 → 部分收貨
    let seat_pr = summary
        .requisitions
        .iter()
        .find(|pr| pr.material_id == "SEAT")
        .context("應有座墊請購單")?;
    let seat_pr = system.purchasing.approve_requisition(seat_pr.id)?;
    let po = system.purchasing.create_order(NewPurchaseOrder {
        supplier_id: "SUP-001".to_string(),
        lines: vec![NewPurchaseLine::from_requisition(&seat_pr, Decimal::from(12))],
    })?;
    system.purchasing.submit_order(po.id)?;
    system.purchasing.approve_order(po.id)?;
    system.purchasing.send_order(po.id)?;

    let po = system.purchasing.receive(
        po.id,
        vec![ReceiveLine::new(po.items[0].id, Decimal::from(30), "WH-MAIN").with_batch("B-001")],
    )?;
    println!(
        "採購訂單 {} 收貨 30，狀態 {}；座墊可用 {}",
        po.code,
        po.status,
        system.ledger.available("SEAT")?
    );

    for alert in system.ledger.alerts()? {
        println!("  ! {} {:?} 現況 {} 門檻 {}", alert.key, alert.kind, alert.current, alert.threshold);
    }

    Ok(())
}
