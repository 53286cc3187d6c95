use crate::error::{AppError, AppResult, FileError};
use crate::models::example_bank::ExampleBank;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载示例题库
///
/// 文件格式：
///
/// ```toml
/// [[grammar]]
/// level = "B1"
/// question_prompt = "I ____ here since 2019."
/// answer_a = "have lived"
/// answer_b = "lived"
/// answer_c = "live"
/// answer_d = "am living"
/// correct_answer = "A"
/// ```
pub async fn load_example_bank(toml_file_path: &Path) -> AppResult<ExampleBank> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(toml_file_path.display().to_string(), e))?;

    parse_example_bank(&content).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: toml_file_path.display().to_string(),
            source: Box::new(e),
        })
    })
}

/// 加载示例题库，文件不存在时返回空题库
///
/// 空题库只是让提示词不带参考题，不影响生成。文件存在但内容有误时仍然报错。
pub async fn load_example_bank_or_empty(toml_file_path: &Path) -> AppResult<ExampleBank> {
    if !fs::try_exists(toml_file_path).await.unwrap_or(false) {
        tracing::warn!(
            "⚠️ 示例题库不存在: {}，提示词将不包含参考题",
            toml_file_path.display()
        );
        return Ok(ExampleBank::default());
    }

    let bank = load_example_bank(toml_file_path).await?;
    tracing::info!(
        "📚 已加载示例题库: 语法 {} 道, 词汇 {} 道",
        bank.grammar.len(),
        bank.vocabulary.len()
    );
    Ok(bank)
}

pub fn parse_example_bank(content: &str) -> Result<ExampleBank, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[grammar]]
level = "B1"
question_prompt = "I ____ here since 2019."
answer_a = "have lived"
answer_b = "lived"
answer_c = "live"
answer_d = "am living"
correct_answer = "A"
"#;

    #[test]
    fn test_parse_example_bank_with_missing_section() {
        let bank = parse_example_bank(SAMPLE).unwrap();
        assert_eq!(bank.grammar.len(), 1);
        assert!(bank.vocabulary.is_empty());
        assert_eq!(bank.grammar[0].answer_a, "have lived");
    }

    #[test]
    fn test_parse_example_bank_rejects_incomplete_row() {
        let broken = "[[grammar]]\nlevel = \"A1\"\n";
        assert!(parse_example_bank(broken).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_bank() {
        let bank = load_example_bank_or_empty(Path::new("definitely/not/here.toml"))
            .await
            .unwrap();
        assert!(bank.is_empty());
    }

    #[test]
    fn test_load_example_bank_reads_file() {
        let path = std::env::temp_dir().join(format!("item_forge_bank_{}.toml", std::process::id()));
        std::fs::write(&path, SAMPLE).unwrap();
        let bank = tokio_test::block_on(load_example_bank(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(bank.grammar[0].level, "B1");
    }
}
