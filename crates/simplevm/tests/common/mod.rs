use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const PROJECT: &str = "simplelinuxvm";

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join("simplevm.yaml"),
            format!("name: {}\n", PROJECT),
        )
        .unwrap();
        Self { root }
    }

    /// 必須キーをすべて含むスタックと SSH 公開鍵を用意する
    pub fn with_valid_stack(stack: &str) -> Self {
        let project = Self::new();
        project.write_file("id_rsa.pub", "ssh-rsa AAAAB3NzaC1yc2E test@example\n");
        project.write_stack(
            stack,
            r#"config:
  simplelinuxvm:resourcePrefix: demo
  simplelinuxvm:resourceTags: |
    env: dev
    owner: ops
  simplelinuxvm:deploymentRegion: westeurope
  simplelinuxvm:whitelistedIpRanges: '["203.0.113.0/24"]'
  simplelinuxvm:sshPublicKeyPath: id_rsa.pub
"#,
        );
        project
    }

    pub fn write_stack(&self, stack: &str, content: &str) {
        self.write_file(&format!("simplevm.{}.yaml", stack), content);
    }

    pub fn write_file(&self, name: &str, content: &str) {
        fs::write(self.root.path().join(name), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_state(&self, stack: &str, content: &str) {
        let dir = self.root.path().join(".simplevm").join("stacks").join(stack);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("state.json"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn read_file(&self, name: &str) -> String {
        fs::read_to_string(self.root.path().join(name)).unwrap()
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
