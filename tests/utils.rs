#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use templer::cli::{run, Args};

/// Writes `content` to `name` under `dir`, creating parent directories.
///
/// # Returns
/// * `PathBuf` - Path of the written file
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Reads a file that a render is expected to have produced.
pub fn read_output(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("expected output '{}': {e}", path.display()))
}

/// Runs a single render pass over `definitions` the way the CLI does.
///
/// # Returns
/// * `bool` - Whether every definition rendered without failures
pub fn render(definitions: &[PathBuf], force: bool) -> bool {
    let args = Args {
        definition_files: definitions.to_vec(),
        auto_render: false,
        force,
        verbose: 0,
    };
    run(args).unwrap()
}
