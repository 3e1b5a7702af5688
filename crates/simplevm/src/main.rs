mod commands;
mod program;
mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "simplevm")]
#[command(about = "Azure に Linux VM を 1 台。宣言して、適用する。", long_about = None)]
struct Cli {
    /// スタック名 (-s/--stack フラグ、SIMPLEVM_STACK 環境変数)
    #[arg(
        short = 's',
        long = "stack",
        env = "SIMPLEVM_STACK",
        default_value = "dev",
        global = true
    )]
    stack: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// リソースを作成・更新
    Up {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
        /// 置き換えるリソース（名前または type:name、複数指定可）
        #[arg(long, value_name = "NAME")]
        replace: Vec<String>,
    },
    /// 実行プランを表示（変更は行わない）
    Preview,
    /// スタックのリソースをすべて削除
    Destroy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// スタックの出力を表示
    Output {
        /// JSON 形式で出力
        #[arg(long)]
        json: bool,
    },
    /// 設定を検証
    Validate,
    /// スタック設定を管理
    #[command(subcommand)]
    Config(ConfigCommands),
    /// バージョン情報を表示
    Version,
}

/// スタック設定のサブコマンド
#[derive(Subcommand)]
enum ConfigCommands {
    /// 設定値を表示（キー省略時は全件）
    Get {
        /// 設定キー（例: resourcePrefix）
        key: Option<String>,
    },
    /// 設定値を保存
    Set {
        /// 設定キー（例: resourcePrefix）
        key: String,
        /// 値（タグや IP レンジは YAML/JSON 文字列）
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrに出力（RUST_LOGで制御）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("simplevm {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let project_root = simplevm_config::find_project_root()?;
    tracing::debug!("Project root: {}", project_root.display());
    let stack = cli.stack.as_str();

    // コマンドディスパッチ
    match cli.command {
        Commands::Up { yes, replace } => {
            commands::up::handle(&project_root, stack, yes, replace).await?;
        }
        Commands::Preview => {
            commands::preview::handle(&project_root, stack).await?;
        }
        Commands::Destroy { yes } => {
            commands::destroy::handle(&project_root, stack, yes).await?;
        }
        Commands::Output { json } => {
            commands::output::handle(&project_root, stack, json).await?;
        }
        Commands::Validate => {
            commands::validate::handle(&project_root, stack).await?;
        }
        Commands::Config(ConfigCommands::Get { key }) => {
            commands::config::handle_get(&project_root, stack, key.as_deref())?;
        }
        Commands::Config(ConfigCommands::Set { key, value }) => {
            commands::config::handle_set(&project_root, stack, &key, &value)?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
