use crate::program;
use crate::utils;
use colored::Colorize;
use simplevm_cloud::PlanOptions;
use std::path::Path;

pub async fn handle(
    project_root: &Path,
    stack: &str,
    yes: bool,
    replace: Vec<String>,
) -> anyhow::Result<()> {
    println!("{}", "デプロイを開始します...".blue().bold());
    utils::print_loaded_config_files(project_root, stack);
    println!("スタック: {}", stack.cyan());

    let deployment = utils::load_deployment(project_root, stack)?;
    let engine = utils::create_engine(project_root, stack);

    let plan = engine
        .plan(&deployment.graph, &PlanOptions { replace })
        .await?;
    utils::print_plan(&plan);

    // 確認（--yesが指定されていない場合）
    if !yes {
        println!();
        if plan.has_changes {
            println!("{}", "警告: Azure 上のリソースが変更されます。".yellow());
        }
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!();
    utils::ensure_authenticated(&engine).await?;

    if plan.has_changes {
        println!();
        println!("{}", "リソースを適用中...".green());
        let result = engine.apply(&deployment.graph, &plan).await?;
        utils::print_apply_result(&result);

        if !result.is_success() {
            return Err(anyhow::anyhow!(
                "{} 件のリソースで失敗しました",
                result.failed.len() + result.skipped.len()
            ));
        }
    } else {
        println!("{}", "✓ 変更はありません".green());
    }

    // 出力
    match program::export_vm_ip(&engine, &deployment).await? {
        Some(ip) => {
            println!();
            println!("{}", "出力:".bold());
            println!(
                "  {}: {}",
                program::VM_IP_OUTPUT,
                ip.as_str().map(str::to_string).unwrap_or_else(|| ip.to_string()).cyan()
            );
        }
        None => {
            println!();
            println!(
                "{}",
                "パブリック IP はまだ割り当てられていません（`simplevm up -y` を再実行すると取得します）"
                    .yellow()
            );
        }
    }

    println!();
    println!("{}", "✓ デプロイが完了しました！".green().bold());
    Ok(())
}
