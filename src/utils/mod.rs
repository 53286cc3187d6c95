pub mod logging;

pub use logging::truncate_text;

/// 与进程和 Rust 版本无关的字符串哈希（FNV-1a）
///
/// 用于按任务 ID 选取示例、派生随机种子，保证同一输入在不同运行间结果一致。
pub fn stable_hash(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    s.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}
