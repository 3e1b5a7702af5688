use crate::program::{self, Settings};
use colored::Colorize;
use std::path::Path;

pub async fn handle(project_root: &Path, stack: &str) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());
    println!(
        "プロジェクトルート: {}",
        project_root.display().to_string().cyan()
    );
    println!("スタック: {}", stack.cyan());

    let config = match simplevm_config::StackConfig::load(project_root, stack) {
        Ok(config) => config,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ スタック設定を読み込めません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let settings = match Settings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let declared = settings
        .read_ssh_public_key(project_root)
        .and_then(|key| program::declare(&settings, &key));
    let deployment = match declared {
        Ok(deployment) => deployment,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ リソースを宣言できません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", "✓ 設定ファイルは正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  プレフィックス: {}", settings.resource_prefix.cyan());
    println!("  リージョン: {}", settings.deployment_region.cyan());
    println!(
        "  SSH 許可レンジ: {}",
        settings.whitelisted_ip_ranges.join(", ")
    );
    println!("  タグ:");
    for (key, value) in settings.tags() {
        println!("    - {}: {}", key, value);
    }

    let order = deployment.graph.execution_order()?;
    println!("  リソース: {}個", order.len());
    for resource in order {
        let dependencies = resource.dependencies();
        if dependencies.is_empty() {
            println!("    - {}", resource.id.cyan());
        } else {
            let names: Vec<&str> = dependencies
                .iter()
                .filter_map(|key| deployment.graph.get(key))
                .map(|r| r.id.as_str())
                .collect();
            println!(
                "    - {} (依存: {})",
                resource.id.cyan(),
                names.join(", ")
            );
        }
    }

    Ok(())
}
