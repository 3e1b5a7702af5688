use crate::utils;
use colored::Colorize;
use std::path::Path;

pub async fn handle(project_root: &Path, stack: &str, json: bool) -> anyhow::Result<()> {
    let engine = utils::create_engine(project_root, stack);
    let outputs = engine.outputs().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
        return Ok(());
    }

    if outputs.is_empty() {
        println!("{}", "出力はありません（simplevm up を実行してください）".yellow());
        return Ok(());
    }

    for (name, value) in &outputs {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("{}: {}", name.bold(), text.cyan());
    }

    Ok(())
}
