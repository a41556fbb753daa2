/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::services::SourceReport;

/// 初始化全局日志
///
/// # 参数
/// - `verbose`: 为 true 时默认级别为 debug，否则为 info；`RUST_LOG` 优先
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // 重复初始化（如测试中）时忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `app_version`: 应用版本
/// - `generation`: 当前缓存代
pub fn log_startup(app_version: &str, generation: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 离线刷题模式 {}", app_version);
    info!("📦 缓存版本: {}", generation);
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 记录题库加载结果
pub fn log_questions_loaded(reports: &[SourceReport], total: usize) {
    info!("{}", "─".repeat(60));
    for report in reports {
        match &report.error {
            None => info!("✓ {}: {} 题", report.url, report.loaded),
            Some(e) => info!("❌ {}: {}", report.url, e),
        }
    }
    info!("📚 共 {} 题", total);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
