//! simplevm のスタック設定
//!
//! プロジェクトファイル (`simplevm.yaml`) とスタックごとの設定ファイル
//! (`simplevm.<stack>.yaml`) を読み込み、型付きでキーを参照する。

pub mod error;

pub use error::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// プロジェクトファイル名
pub const PROJECT_FILE: &str = "simplevm.yaml";

/// プロジェクトディレクトリを直接指定する環境変数
pub const PROJECT_DIR_ENV: &str = "SIMPLEVM_PROJECT_DIR";

/// プロジェクトファイルの内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    /// プロジェクト名（設定キーの名前空間）
    pub name: String,

    /// 説明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// スタック設定ファイルの内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackFile {
    /// `<project>:<key>` 形式のキーと値
    #[serde(default)]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

/// プロジェクトルートを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 SIMPLEVM_PROJECT_DIR
/// 2. カレントディレクトリから親方向へ simplevm.yaml を探索
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(PROJECT_DIR_ENV) {
        let path = PathBuf::from(dir);
        if path.join(PROJECT_FILE).exists() {
            return Ok(path);
        }
        tracing::debug!(
            "{} is set but {} does not exist there",
            PROJECT_DIR_ENV,
            PROJECT_FILE
        );
    }

    let current_dir = std::env::current_dir()?;
    current_dir
        .ancestors()
        .find(|dir| dir.join(PROJECT_FILE).exists())
        .map(Path::to_path_buf)
        .ok_or(ConfigError::ProjectNotFound(current_dir))
}

/// スタック設定ファイルのパス
pub fn stack_file_path(project_root: &Path, stack: &str) -> PathBuf {
    project_root.join(format!("simplevm.{}.yaml", stack))
}

/// プロジェクトファイルを読み込む
pub fn load_project(project_root: &Path) -> Result<ProjectFile> {
    let path = project_root.join(PROJECT_FILE);
    if !path.exists() {
        return Err(ConfigError::ProjectNotFound(project_root.to_path_buf()));
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// 設定値のパスを解決する
///
/// `~/` はホームディレクトリに展開し、相対パスは `base` 基準にする。
pub fn resolve_path(base: &Path, value: &str) -> Result<PathBuf> {
    if let Some(rest) = value.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        return Ok(home.join(rest));
    }

    let path = PathBuf::from(value);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(base.join(path))
    }
}

/// 1つのスタックの設定
#[derive(Debug, Clone)]
pub struct StackConfig {
    project: String,
    stack: String,
    path: PathBuf,
    file: StackFile,
}

impl StackConfig {
    /// スタック設定を読み込む（ファイルが無ければエラー）
    pub fn load(project_root: &Path, stack: &str) -> Result<Self> {
        let path = stack_file_path(project_root, stack);
        if !path.exists() {
            return Err(ConfigError::StackFileNotFound {
                stack: stack.to_string(),
                path,
            });
        }
        Self::open(project_root, stack)
    }

    /// スタック設定を開く（ファイルが無ければ空の設定）
    pub fn open(project_root: &Path, stack: &str) -> Result<Self> {
        let project = load_project(project_root)?;
        let path = stack_file_path(project_root, stack);

        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                StackFile::default()
            } else {
                serde_yaml::from_str(&content)?
            }
        } else {
            StackFile::default()
        };

        tracing::debug!(
            "Loaded stack '{}' with {} keys from {}",
            stack,
            file.config.len(),
            path.display()
        );

        Ok(Self {
            project: project.name,
            stack: stack.to_string(),
            path,
            file,
        })
    }

    /// メモリ上で設定を組み立てる
    pub fn from_entries<I, K, V>(project: &str, stack: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_yaml::Value>,
    {
        let mut config = Self {
            project: project.to_string(),
            stack: stack.to_string(),
            path: PathBuf::from(format!("simplevm.{}.yaml", stack)),
            file: StackFile::default(),
        };
        for (key, value) in entries {
            let key = config.qualify(&key.into());
            config.file.config.insert(key, value.into());
        }
        config
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 名前空間なしのキーにプロジェクト名を付ける
    fn qualify(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{}", self.project, key)
        }
    }

    /// 値を取得（`<project>:<key>` を優先し、無ければ `<key>`）
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.file
            .config
            .get(&self.qualify(key))
            .or_else(|| self.file.config.get(key))
            .filter(|value| !value.is_null())
    }

    /// スカラー値を文字列として取得する
    pub fn require(&self, key: &str) -> Result<String> {
        let value = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;

        match value {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "スカラー値である必要があります".to_string(),
            }),
        }
    }

    /// 構造化された値を取得する
    ///
    /// 文字列の場合は YAML（JSON を含む）として解釈する。
    /// 解釈できない値はキーの欠落とは区別して [`ConfigError::Parse`] を返す。
    pub fn require_structured<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;

        let parsed = match value {
            serde_yaml::Value::String(text) => serde_yaml::from_str(text),
            other => serde_yaml::from_value(other.clone()),
        };

        parsed.map_err(|source| ConfigError::Parse {
            key: key.to_string(),
            source,
        })
    }

    /// 値を設定する
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = self.qualify(key);
        self.file
            .config
            .insert(key, serde_yaml::Value::String(value.into()));
    }

    /// 全キー（保存されている形式のまま）
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.file.config.keys().map(String::as_str)
    }

    /// スタック設定ファイルに書き戻す
    pub fn save(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.file)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!("Saved stack config to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::fs;

    fn write_project(dir: &Path, stack_yaml: &str) {
        fs::write(dir.join(PROJECT_FILE), "name: simplelinuxvm\n").unwrap();
        fs::write(stack_file_path(dir, "dev"), stack_yaml).unwrap();
    }

    #[test]
    fn test_load_namespaced_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_project(
            temp_dir.path(),
            "config:\n  simplelinuxvm:resourcePrefix: demo\n  deploymentRegion: westeurope\n",
        );

        let config = StackConfig::load(temp_dir.path(), "dev").unwrap();
        assert_eq!(config.project(), "simplelinuxvm");
        assert_eq!(config.require("resourcePrefix").unwrap(), "demo");
        // 名前空間なしのキーもフォールバックで読める
        assert_eq!(config.require("deploymentRegion").unwrap(), "westeurope");
    }

    #[test]
    fn test_missing_stack_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(PROJECT_FILE), "name: p\n").unwrap();

        let result = StackConfig::load(temp_dir.path(), "prod");
        assert!(matches!(result, Err(ConfigError::StackFileNotFound { .. })));
    }

    #[test]
    fn test_require_missing_key() {
        let config = StackConfig::from_entries("p", "dev", [("a", "1")]);
        match config.require("b") {
            Err(ConfigError::MissingKey(key)) => assert_eq!(key, "b"),
            other => panic!("Expected MissingKey, got {:?}", other),
        }
    }

    #[test]
    fn test_require_null_is_missing() {
        let config =
            StackConfig::from_entries("p", "dev", [("a", serde_yaml::Value::Null)]);
        assert!(matches!(config.require("a"), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn test_require_structured_from_text() {
        let config = StackConfig::from_entries(
            "p",
            "dev",
            [
                ("tags", "env: dev\nowner: ops\n"),
                ("ranges", r#"["203.0.113.0/24", "198.51.100.7/32"]"#),
            ],
        );

        let tags: HashMap<String, String> = config.require_structured("tags").unwrap();
        assert_eq!(tags.get("env").map(String::as_str), Some("dev"));
        assert_eq!(tags.len(), 2);

        let ranges: Vec<String> = config.require_structured("ranges").unwrap();
        assert_eq!(ranges, vec!["203.0.113.0/24", "198.51.100.7/32"]);
    }

    #[test]
    fn test_require_structured_from_node() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_project(
            temp_dir.path(),
            "config:\n  simplelinuxvm:whitelistedIpRanges:\n    - 10.1.0.0/16\n",
        );

        let config = StackConfig::load(temp_dir.path(), "dev").unwrap();
        let ranges: Vec<String> = config.require_structured("whitelistedIpRanges").unwrap();
        assert_eq!(ranges, vec!["10.1.0.0/16"]);
    }

    #[test]
    fn test_require_structured_malformed() {
        let config = StackConfig::from_entries("p", "dev", [("tags", "[unclosed")]);
        let result: Result<HashMap<String, String>> = config.require_structured("tags");
        match result {
            Err(ConfigError::Parse { key, .. }) => assert_eq!(key, "tags"),
            other => panic!("Expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_set_and_save_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(PROJECT_FILE), "name: simplelinuxvm\n").unwrap();

        let mut config = StackConfig::open(temp_dir.path(), "staging").unwrap();
        config.set("resourcePrefix", "stg");
        config.save().unwrap();

        let content = fs::read_to_string(stack_file_path(temp_dir.path(), "staging")).unwrap();
        assert!(content.contains("simplelinuxvm:resourcePrefix"));

        let reloaded = StackConfig::load(temp_dir.path(), "staging").unwrap();
        assert_eq!(reloaded.require("resourcePrefix").unwrap(), "stg");
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/srv/project");
        assert_eq!(
            resolve_path(base, "keys/id.pub").unwrap(),
            PathBuf::from("/srv/project/keys/id.pub")
        );
        assert_eq!(
            resolve_path(base, "/etc/key.pub").unwrap(),
            PathBuf::from("/etc/key.pub")
        );
        let home = resolve_path(base, "~/.ssh/id_rsa.pub").unwrap();
        assert!(home.ends_with(".ssh/id_rsa.pub"));
    }

    #[test]
    #[serial]
    fn test_find_project_root_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(PROJECT_FILE), "name: p\n").unwrap();

        temp_env::with_var(PROJECT_DIR_ENV, Some(temp_dir.path()), || {
            let root = find_project_root().unwrap();
            assert_eq!(root, temp_dir.path());
        });
    }

    #[test]
    #[serial]
    fn test_find_project_root_walks_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(PROJECT_FILE), "name: p\n").unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&nested).unwrap();

        let result = temp_env::with_var_unset(PROJECT_DIR_ENV, find_project_root);

        std::env::set_current_dir(original_dir).unwrap();

        let root = result.unwrap();
        assert!(root.join(PROJECT_FILE).exists());
    }
}
