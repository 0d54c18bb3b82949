use cargo_metadata::MetadataCommand;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use tracing::debug;

use crate::domain::ast::SourceFile;

pub struct ProjectLoader;

impl ProjectLoader {
    /// Load every `.rs` file of the workspace members' lib, bin and
    /// proc-macro targets.
    pub fn load_workspace(manifest_path: &Path) -> Result<Vec<SourceFile>> {
        let metadata = MetadataCommand::new()
            .manifest_path(manifest_path)
            .no_deps()
            .exec()
            .context("Failed to execute cargo metadata")?;

        let mut files = Vec::new();

        for package_id in &metadata.workspace_members {
            if let Some(package) = metadata.packages.iter().find(|p| &p.id == package_id) {
                for target in &package.targets {
                    if !target.kind.iter().any(|k| k == "lib" || k == "bin" || k == "proc-macro") {
                        continue;
                    }
                    // Everything under the directory of the target's root file.
                    let src_path = &target.src_path;
                    let src_dir = src_path.parent().unwrap_or(src_path);
                    Self::collect_rs_recursive(src_dir.as_std_path(), &mut files)?;
                }
            }
        }

        // lib and bin targets usually share src/
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        debug!(files = files.len(), manifest = %manifest_path.display(), "loaded workspace sources");
        Ok(files)
    }

    fn collect_rs_recursive(dir: &Path, out: &mut Vec<SourceFile>) -> Result<()> {
        if dir.ends_with("target") || dir.ends_with(".git") {
            return Ok(());
        }
        if !dir.exists() {
            return Ok(());
        }

        if dir.is_file() {
            if dir.extension().map_or(false, |ext| ext == "rs") {
                out.push(Self::read(dir)?);
            }
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                Self::collect_rs_recursive(&path, out)?;
            } else if path.extension().map_or(false, |ext| ext == "rs") {
                out.push(Self::read(&path)?);
            }
        }
        Ok(())
    }

    fn read(path: &Path) -> Result<SourceFile> {
        SourceFile::read(path).with_context(|| format!("Failed to read file {}", path.display()))
    }
}
