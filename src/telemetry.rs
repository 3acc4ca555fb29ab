//! 日誌初始化

use tracing_subscriber::EnvFilter;

/// 初始化日誌輸出
///
/// 過濾條件取自 `RUST_LOG`（預設 `info`）；`MRP_LOG_FORMAT=json` 時輸出 JSON。
/// 重複呼叫不會有作用。
pub fn init() {
    let json = std::env::var("MRP_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    init_with(json);
}

pub fn init_with(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
