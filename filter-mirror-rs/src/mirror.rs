use std::fs;
use std::process::{Command, Stdio};

use crate::error::{MirrorError, Result};
use crate::gitutil;
use crate::opts::Options;
use crate::workdir::WorkArea;

/// Refresh the local bare mirror of the source repository, cloning from
/// scratch when the mirror is missing, corrupt, or no longer fetchable.
pub fn ensure_mirror(opts: &Options, area: &WorkArea) -> Result<()> {
    if area.mirror_dir.exists() && gitutil::is_bare_repo_dir(&area.mirror_dir) {
        match gitutil::run(&area.mirror_dir, &["fetch", "--prune", "--quiet", "origin"]) {
            Ok(()) => return Ok(()),
            Err(err) => {
                eprintln!(
                    "NOTICE: refreshing mirror failed ({err}); recreating {}",
                    area.mirror_dir.display()
                );
            }
        }
    }
    if area.mirror_dir.exists() {
        fs::remove_dir_all(&area.mirror_dir)?;
    }
    clone_mirror(opts, area)
}

fn clone_mirror(opts: &Options, area: &WorkArea) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg("--mirror").arg("--quiet");
    if !opts.hardlinks {
        cmd.arg("--no-hardlinks");
    }
    cmd.arg(&opts.source).arg(&area.mirror_dir);
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(MirrorError::SourceUnavailable(format!(
            "mirror clone of {:?} failed with {status}",
            opts.source
        )));
    }
    Ok(())
}

/// All branch names of the source, in sorted order. An empty source is a
/// hard failure: there is nothing to rewrite and pruning against it would
/// wipe the destination.
pub fn source_branches(area: &WorkArea) -> Result<Vec<String>> {
    let branches: Vec<String> = gitutil::refs_under(&area.mirror_dir, "refs/heads")?
        .into_iter()
        .filter_map(|r| r.strip_prefix("refs/heads/").map(|s| s.to_string()))
        .collect();
    if branches.is_empty() {
        return Err(MirrorError::SourceUnavailable(
            "the source repository has no branches".to_string(),
        ));
    }
    Ok(branches)
}

/// All tag names of the source, in sorted order. May be empty.
pub fn source_tags(area: &WorkArea) -> Result<Vec<String>> {
    Ok(gitutil::refs_under(&area.mirror_dir, "refs/tags")?
        .into_iter()
        .filter_map(|r| r.strip_prefix("refs/tags/").map(|s| s.to_string()))
        .collect())
}
