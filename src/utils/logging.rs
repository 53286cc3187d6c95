/// 日志工具模块
///
/// 初始化 tracing 订阅器，并提供批量运行各环节的日志输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::job::BatchRequest;
use crate::models::result::BatchStats;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`；未设置时 `verbose` 为 true 输出 debug 级别，否则 info。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("item_forge={},warn", default_level)));

    // 测试中可能被重复调用，忽略重复初始化
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, request: &BatchRequest) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量生成题目");
    info!(
        "📝 题型: {} | 等级: {} | 数量: {} | 策略: {:?}",
        request.question_type, request.level, request.count, request.strategy
    );
    info!("🤖 模型: {} ({})", config.llm_model_name, config.llm_api_base_url);
    info!("📊 最大并发数: {}", config.max_concurrent_jobs.max(1));
    if let Some(seed) = config.seed {
        info!("🎲 随机种子: {}", seed);
    }
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始（整批模式）
pub fn log_stage_start(stage_label: &str, alive: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("📦 阶段 {} 开始: 本阶段任务 {}/{}", stage_label, alive, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &BatchStats, output_file: &str, failure_log_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.succeeded, stats.total);
    if stats.needs_revision > 0 {
        info!("📝 需要修改: {}", stats.needs_revision);
    }
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_file);
    if stats.failed > 0 {
        info!("失败记录: {}", failure_log_file);
    }
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
