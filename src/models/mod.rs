pub mod catalog;
pub mod example_bank;
pub mod item;
pub mod job;
pub mod loaders;
pub mod result;
pub mod stage;

pub use example_bank::{ExampleBank, ExampleRow};
pub use item::{
    DistractorSet, FinishedItem, OptionLetter, OptionSet, StemClue, ValidationReport, Verdict,
};
pub use job::{BatchRequest, CefrLevel, JobSpec, QuestionType, Strategy};
pub use loaders::{load_example_bank, load_example_bank_or_empty};
pub use result::{BatchRunResult, BatchStats, JobFailure, PipelineResult};
pub use stage::{Stage, StageOutput, StageRecord};
