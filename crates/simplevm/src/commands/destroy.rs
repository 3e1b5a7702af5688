use crate::utils;
use colored::Colorize;
use simplevm_cloud::ResourceGraph;
use std::path::Path;

pub async fn handle(project_root: &Path, stack: &str, yes: bool) -> anyhow::Result<()> {
    println!("{}", "スタックを削除します...".red().bold());
    println!("スタック: {}", stack.cyan());

    let engine = utils::create_engine(project_root, stack);
    let state = engine.state().await?;

    if state.is_empty() {
        println!("{}", "✓ 削除するリソースはありません".green());
        return Ok(());
    }

    // 依存先より先に依存元を削除する順で表示
    let recorded = ResourceGraph::from_state(&state);
    println!();
    println!(
        "{}",
        format!(
            "削除対象のリソース ({} 個):",
            recorded.len() + state.pending_deletes.len()
        )
        .bold()
    );
    for old in &state.pending_deletes {
        println!(
            "  {} {} ({}, 置換前)",
            "-".red(),
            old.id.cyan(),
            old.resource_type.dimmed()
        );
    }
    for wave in recorded.waves()?.into_iter().rev() {
        for resource in wave {
            println!(
                "  {} {} ({})",
                "-".red(),
                resource.id.cyan(),
                resource.resource_type.dimmed()
            );
        }
    }

    // 確認プロンプト
    if !yes {
        println!();
        println!(
            "{}",
            "⚠️  すべてのリソースが削除されます。データは復旧できません。".red()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!();
    utils::ensure_authenticated(&engine).await?;

    println!();
    println!("{}", "リソースを削除中...".yellow());
    let result = engine.destroy().await?;
    utils::print_apply_result(&result);

    if !result.is_success() {
        return Err(anyhow::anyhow!(
            "{} 件のリソースを削除できませんでした",
            result.failed.len() + result.skipped.len()
        ));
    }

    println!();
    println!("{}", "✓ スタックを削除しました".green().bold());
    Ok(())
}
