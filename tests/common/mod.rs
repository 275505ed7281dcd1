#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory for input files and generated scripts, removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

/// Splits a generated script into its statements.
pub fn statements(script: &str) -> Vec<String> {
    script
        .trim_end()
        .split("\n\n")
        .map(str::to_string)
        .collect()
}

pub fn inserts_into<'a>(statements: &'a [String], table: &str) -> Vec<&'a String> {
    let prefix = format!("INSERT INTO `{table}` ");
    statements
        .iter()
        .filter(|statement| statement.starts_with(&prefix))
        .collect()
}
