use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "プロジェクトファイルが見つかりません\n探索開始位置: {0}\n\
        ヒント: simplevm.yaml を含むディレクトリで実行するか、\
        SIMPLEVM_PROJECT_DIR 環境変数で指定してください"
    )]
    ProjectNotFound(PathBuf),

    #[error("スタック '{stack}' の設定ファイルが見つかりません: {path}")]
    StackFileNotFound { stack: String, path: PathBuf },

    #[error("必須の設定キーがありません: {0}")]
    MissingKey(String),

    #[error("設定値が不正です: {key}\n理由: {message}")]
    InvalidValue { key: String, message: String },

    #[error("設定値を解釈できません: {key}\n理由: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("ホームディレクトリが見つかりません")]
    HomeDirNotFound,

    #[error("YAML エラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
