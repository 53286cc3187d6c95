//! 考查点与主题建议目录
//!
//! 为命令行提供默认的考查点（未指定 `--focus` 时使用）和按等级的主题建议。

use crate::models::job::{CefrLevel, QuestionType};

/// 某题型、某等级下可选的考查点
pub fn focus_options(question_type: QuestionType, level: CefrLevel) -> &'static [&'static str] {
    use CefrLevel::*;
    match (question_type, level) {
        (QuestionType::Grammar, A1) => &[
            "Present Simple ('be'/'have')",
            "Prepositions of Time ('on'/'in')",
            "Possessive Adjectives",
        ],
        (QuestionType::Grammar, A2) => &[
            "Past Simple (irregular)",
            "Countable/Uncountable",
            "Comparatives",
            "Present Continuous",
        ],
        (QuestionType::Grammar, B1) => &[
            "Past Simple vs. Present Perfect",
            "Conditionals (Type 1)",
            "Modals of Obligation",
            "Reported Speech (basic)",
        ],
        (QuestionType::Grammar, B2) => &[
            "Conditionals (Mixed)",
            "Passive (Causative)",
            "Modals (Speculation)",
            "Relative Clauses (advanced)",
        ],
        (QuestionType::Grammar, C1 | C2) => &[
            "Inversion",
            "Conditionals (Advanced Mixed)",
            "Passive (Advanced Forms)",
        ],
        (QuestionType::Vocabulary, A1 | A2) => &[
            "Meaning-in-Sentence",
            "Collocation (Verb+Noun)",
            "Word Form (noun/verb/adj)",
            "Category Membership",
            "Basic Antonym",
        ],
        (QuestionType::Vocabulary, B1) => &[
            "Meaning-in-Sentence (Inference)",
            "Collocation (Adverb+Adj)",
            "Word Form (Affixes)",
            "Functional Usage",
        ],
        (QuestionType::Vocabulary, B2 | C1 | C2) => &[
            "Synonym (subtle difference)",
            "Collocation (idiomatic)",
            "Functional Usage (formal/informal)",
            "Register Trap",
        ],
    }
}

/// 某等级的主题建议
pub fn topic_suggestions(level: CefrLevel) -> &'static [&'static str] {
    match level {
        CefrLevel::A1 => &["Personal Information", "Family", "Food & Drink", "My Home"],
        CefrLevel::A2 => &["Daily Routines", "Past Holidays", "Shopping", "Friends & Hobbies"],
        CefrLevel::B1 => &["Work & Jobs", "The Environment", "Travel & Tourism", "Technology", "Health"],
        CefrLevel::B2 => &["Media & News", "Crime & Society", "The Future", "Education Systems"],
        CefrLevel::C1 | CefrLevel::C2 => &[
            "Philosophy & Ethics",
            "Scientific Research",
            "Global Politics",
            "Art & Literature",
        ],
    }
}
