use std::collections::HashSet;
use std::process::{Command, Stdio};

use crate::error::{MirrorError, Result};
use crate::gitutil;
use crate::matcher::RefMatcher;
use crate::opts::Options;
use crate::tagmap::CONVERTED_TAG_PREFIX;
use crate::workdir::WorkArea;

/// Before any rewriting: drop worker-local converted tags whose source tag
/// vanished or fell out of scope, so a later publish cannot resurrect them.
pub fn drop_stale_converted_tags(
    area: &WorkArea,
    tag_matcher: &RefMatcher,
    source_tags: &[String],
) -> Result<usize> {
    let worker = &area.worker_dir;
    let source: HashSet<&str> = source_tags.iter().map(String::as_str).collect();
    let prefix = format!("refs/tags/{CONVERTED_TAG_PREFIX}");
    let mut dropped = 0;
    for full in gitutil::refs_under(worker, prefix.trim_end_matches('/'))? {
        let Some(tag) = full.strip_prefix(&prefix) else {
            continue;
        };
        if !tag_matcher.passes(tag) || !source.contains(tag) {
            gitutil::delete_ref(worker, &full)?;
            dropped += 1;
        }
    }
    if dropped > 0 {
        println!("dropped {dropped} stale converted tag(s) from the worker");
    }
    Ok(dropped)
}

/// Reconcile the destination with the filtered source view: delete
/// destination tags and branches that no longer correspond to in-scope
/// source refs. Both passes are independently gated by the run options.
pub fn prune_destination(
    opts: &Options,
    area: &WorkArea,
    in_scope_branches: &[String],
    source_tags: &[String],
    tag_matcher: &RefMatcher,
) -> Result<usize> {
    let worker = &area.worker_dir;
    let mut deletions: Vec<String> = Vec::new();

    if opts.prune_tags {
        let source: HashSet<&str> = source_tags.iter().map(String::as_str).collect();
        for (_, refname) in gitutil::ls_remote(worker, &["--tags", "destination"])? {
            if refname.ends_with("^{}") {
                continue;
            }
            let Some(tag) = refname.strip_prefix("refs/tags/") else {
                continue;
            };
            if !tag_matcher.passes(tag) || !source.contains(tag) {
                deletions.push(format!(":{refname}"));
            }
        }
    }

    if opts.prune_branches {
        let keep: HashSet<&str> = in_scope_branches.iter().map(String::as_str).collect();
        let head_branch = destination_head(area)?;
        for (_, refname) in gitutil::ls_remote(worker, &["--heads", "destination"])? {
            let Some(branch) = refname.strip_prefix("refs/heads/") else {
                continue;
            };
            if keep.contains(branch) {
                continue;
            }
            if head_branch.as_deref() == Some(branch) {
                eprintln!(
                    "warning: not pruning {branch:?}; it is the destination's current branch"
                );
                continue;
            }
            deletions.push(format!(":{refname}"));
        }
    }

    if deletions.is_empty() {
        return Ok(0);
    }
    println!("pruning {} destination ref(s)", deletions.len());
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(worker).arg("push").arg("destination");
    for refspec in &deletions {
        cmd.arg(refspec);
    }
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(MirrorError::Push(format!(
            "pruning destination refs failed with {status}"
        )));
    }
    Ok(deletions.len())
}

/// The branch the destination's `HEAD` points at, if it reports one.
fn destination_head(area: &WorkArea) -> Result<Option<String>> {
    let out = Command::new("git")
        .arg("-C")
        .arg(&area.worker_dir)
        .arg("ls-remote")
        .arg("--symref")
        .arg("destination")
        .arg("HEAD")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;
    if !out.status.success() {
        return Ok(None);
    }
    for line in String::from_utf8_lossy(&out.stdout).lines() {
        // "ref: refs/heads/<name>\tHEAD"
        if let Some(rest) = line.strip_prefix("ref:") {
            let mut parts = rest.split_whitespace();
            if let Some(target) = parts.next() {
                if let Some(branch) = target.strip_prefix("refs/heads/") {
                    return Ok(Some(branch.to_string()));
                }
            }
        }
    }
    Ok(None)
}
