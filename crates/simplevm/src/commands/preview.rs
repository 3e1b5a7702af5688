use crate::utils;
use colored::Colorize;
use simplevm_cloud::PlanOptions;
use std::path::Path;

pub async fn handle(project_root: &Path, stack: &str) -> anyhow::Result<()> {
    println!("{}", "プレビューを作成中...".blue().bold());
    utils::print_loaded_config_files(project_root, stack);
    println!("スタック: {}", stack.cyan());

    let deployment = utils::load_deployment(project_root, stack)?;
    let engine = utils::create_engine(project_root, stack);
    let plan = engine
        .plan(&deployment.graph, &PlanOptions::default())
        .await?;

    utils::print_plan(&plan);
    if !plan.has_changes {
        println!("{}", "✓ 変更はありません".green());
    }

    Ok(())
}
