use crate::program::{self, Deployment, Settings};
use colored::Colorize;
use simplevm_cloud::{ActionType, ApplyResult, Engine, Plan, StateManager};
use simplevm_cloud_azure::AzureProvider;
use simplevm_config::StackConfig;
use std::path::Path;
use std::sync::Arc;

/// 読み込んだ設定ファイル情報を表示
pub fn print_loaded_config_files(project_root: &Path, stack: &str) {
    println!("📄 読み込んだ設定ファイル:");

    let project_file = project_root.join(simplevm_config::PROJECT_FILE);
    if project_file.exists() {
        println!("  • {}", project_file.display().to_string().cyan());
    }

    let stack_file = simplevm_config::stack_file_path(project_root, stack);
    if stack_file.exists() {
        println!(
            "  • {} (スタック: {})",
            stack_file.display().to_string().cyan(),
            stack
        );
    }
}

/// 設定を読み込み、リソースを宣言する
pub fn load_deployment(project_root: &Path, stack: &str) -> anyhow::Result<Deployment> {
    let config = StackConfig::load(project_root, stack)?;
    let settings = Settings::from_config(&config)?;
    let ssh_public_key = settings.read_ssh_public_key(project_root)?;
    Ok(program::declare(&settings, &ssh_public_key)?)
}

/// スタックのエンジンを作成
pub fn create_engine(project_root: &Path, stack: &str) -> Engine {
    Engine::new(
        Arc::new(AzureProvider::new()),
        StateManager::new(project_root, stack),
    )
}

/// Azure の認証を確認（失敗時はエラー）
pub async fn ensure_authenticated(engine: &Engine) -> anyhow::Result<()> {
    println!("{}", "認証を確認中...".blue());
    let auth = engine.provider().check_auth().await?;
    if !auth.authenticated {
        return Err(anyhow::anyhow!(
            "{} に認証されていません: {}\nヒント: az login を実行してください",
            engine.provider().display_name(),
            auth.error.unwrap_or_default()
        ));
    }
    if let Some(account) = auth.account_info {
        println!("  ✓ {}", account.cyan());
    }
    Ok(())
}

/// プランを表示
pub fn print_plan(plan: &Plan) {
    println!();
    println!("{}", "実行プラン:".bold());
    for action in &plan.actions {
        let (marker, label) = match action.action_type {
            ActionType::Create => ("+".green(), "作成".green()),
            ActionType::Replace => ("±".yellow(), "置換".yellow()),
            ActionType::Delete => ("-".red(), "削除".red()),
            ActionType::NoOp => (" ".normal(), "変更なし".dimmed()),
        };
        println!(
            "  {} {} {} ({})",
            marker,
            action.resource_id.cyan(),
            label,
            action.resource_type.dimmed()
        );
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}

/// 実行結果を表示
pub fn print_apply_result(result: &ApplyResult) {
    println!();
    for success in &result.succeeded {
        println!("  {} {}", "✓".green(), success.message);
    }
    for failure in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.action_id,
            failure.error.as_deref().unwrap_or_default()
        );
    }
    for skipped in &result.skipped {
        println!(
            "  {} {} (スキップ: {})",
            "-".yellow(),
            skipped.action_id,
            skipped.message
        );
    }
    println!();
    println!(
        "成功: {}  失敗: {}  スキップ: {}  ({:.1}秒)",
        result.succeeded.len(),
        result.failed.len(),
        result.skipped.len(),
        result.duration_ms as f64 / 1000.0
    );
}
