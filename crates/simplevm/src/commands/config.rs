use colored::Colorize;
use simplevm_config::StackConfig;
use std::path::Path;

/// 設定値を表示（キー省略時は全件）
pub fn handle_get(project_root: &Path, stack: &str, key: Option<&str>) -> anyhow::Result<()> {
    let config = StackConfig::load(project_root, stack)?;

    match key {
        Some(key) => {
            let value = config
                .get(key)
                .ok_or_else(|| simplevm_config::ConfigError::MissingKey(key.to_string()))?;
            println!("{}", format_value(value)?);
        }
        None => {
            let keys: Vec<&str> = config.keys().collect();
            if keys.is_empty() {
                println!("{}", "設定値はありません".yellow());
            }
            for key in keys {
                if let Some(value) = config.get(key) {
                    println!("{}: {}", key.bold(), format_value(value)?.cyan());
                }
            }
        }
    }

    Ok(())
}

/// 設定値を保存（スタックファイルが無ければ作成）
pub fn handle_set(project_root: &Path, stack: &str, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = StackConfig::open(project_root, stack)?;
    config.set(key, value);
    config.save()?;

    println!(
        "{} {} を {} に保存しました",
        "✓".green(),
        key.cyan(),
        config.path().display()
    );
    Ok(())
}

fn format_value(value: &serde_yaml::Value) -> anyhow::Result<String> {
    Ok(match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)?.trim_end().to_string(),
    })
}
