//! 基于 clap 的命令行接口
//!
//! 子命令：`generate`（规划并生成）、`plan`（只规划，打印任务列表）、
//! `catalog`（列出可选的考查点和主题）。命令行参数覆盖环境变量配置。

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, Granularity};
use crate::models::catalog;
use crate::models::job::{BatchRequest, CefrLevel, QuestionType, Strategy};

/// 英语单选题批量生成工具
#[derive(Debug, Parser)]
#[command(name = "item_forge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 使用的模型名称
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// 同时处理的任务数量
    #[arg(long, short = 'j', global = true)]
    pub concurrency: Option<usize>,

    /// 上游错误的最大重试次数
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// 随机种子，固定后规划和选项顺序可复现
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// 输出 debug 日志
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 规划并生成一批题目
    Generate {
        #[command(flatten)]
        request: RequestArgs,

        /// 顺序策略的执行粒度
        #[arg(long, value_enum, default_value_t = GranularityArg::PerItem)]
        granularity: GranularityArg,

        /// 结果 JSON 文件
        #[arg(long, short)]
        output: Option<String>,

        /// 示例题库 TOML 文件
        #[arg(long)]
        examples: Option<String>,
    },

    /// 只规划任务，打印任务列表（不调用生成服务）
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// 列出某个题型和等级可选的考查点与主题
    Catalog {
        #[arg(long = "type", value_enum, default_value_t = TypeArg::Grammar)]
        question_type: TypeArg,

        #[arg(long, value_enum, default_value_t = LevelArg::B1)]
        level: LevelArg,
    },
}

/// 批量请求参数
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// 生成数量
    #[arg(long, short = 'n', default_value_t = 5)]
    pub count: usize,

    #[arg(long = "type", value_enum, default_value_t = TypeArg::Grammar)]
    pub question_type: TypeArg,

    #[arg(long, value_enum, default_value_t = LevelArg::B1)]
    pub level: LevelArg,

    /// 考查点，可重复；不指定时使用该题型和等级的全部考查点
    #[arg(long = "focus")]
    pub focus: Vec<String>,

    /// 指定主题；不指定时按语义领域轮换
    #[arg(long)]
    pub topic: Option<String>,

    #[arg(long, value_enum, default_value_t = StrategyArg::Sequential)]
    pub strategy: StrategyArg,
}

impl RequestArgs {
    pub fn to_request(&self) -> BatchRequest {
        let question_type = QuestionType::from(self.question_type);
        let level = CefrLevel::from(self.level);
        let focus_choices = if self.focus.is_empty() {
            catalog::focus_options(question_type, level)
                .iter()
                .map(|f| f.to_string())
                .collect()
        } else {
            self.focus.clone()
        };
        BatchRequest {
            count: self.count,
            question_type,
            level,
            focus_choices,
            topic_hint: self.topic.clone(),
            strategy: self.strategy.into(),
        }
    }
}

impl Cli {
    /// 命令行参数覆盖配置
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.llm_model_name = model.clone();
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent_jobs = n;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.verbose {
            config.verbose_logging = true;
        }
        if let Command::Generate {
            output, examples, ..
        } = &self.command
        {
            if let Some(output) = output {
                config.output_file = output.clone();
            }
            if let Some(examples) = examples {
                config.example_bank_path = examples.clone();
            }
        }
    }
}

// ========== 命令行枚举 → 模型枚举 ==========

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Grammar,
    Vocabulary,
}

impl From<TypeArg> for QuestionType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Grammar => QuestionType::Grammar,
            TypeArg::Vocabulary => QuestionType::Vocabulary,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LevelArg {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl From<LevelArg> for CefrLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::A1 => CefrLevel::A1,
            LevelArg::A2 => CefrLevel::A2,
            LevelArg::B1 => CefrLevel::B1,
            LevelArg::B2 => CefrLevel::B2,
            LevelArg::C1 => CefrLevel::C1,
            LevelArg::C2 => CefrLevel::C2,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// 单次调用
    Holistic,
    /// 选项 → 题干
    Segmented,
    /// 题干+线索 → 干扰项 → 质检
    Sequential,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Holistic => Strategy::Holistic,
            StrategyArg::Segmented => Strategy::Segmented,
            StrategyArg::Sequential => Strategy::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    PerItem,
    Batch,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::PerItem => Granularity::PerItem,
            GranularityArg::Batch => Granularity::Batch,
        }
    }
}
