use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use crate::error::{MirrorError, Result};
use crate::filterspec::FilterSpec;
use crate::gitutil;
use crate::matcher::RefMatcher;
use crate::opts::{Options, TagsPlan};
use crate::tagmap::{self, CommitMap, CONVERTED_TAG_PREFIX, STATE_REF};
use crate::workdir::WorkArea;

/// Stderr line the rewrite engine emits when the requested range contains
/// no commits. The engine treats it as a failure; the pipeline does not.
const NOTHING_TO_REWRITE: &str = "Found nothing to rewrite";

/// Rewrite one in-scope branch: fetch the delta from the source, hand the
/// unrewritten range to the engine with the persistent state branch, map
/// any leftover tags, and advance the filtered-up-to marker.
///
/// Returns whether a rewrite ran (`false` when the branch was already up
/// to date).
pub fn rewrite_branch(
    opts: &Options,
    area: &WorkArea,
    spec: &FilterSpec,
    tag_matcher: &RefMatcher,
    branch: &str,
) -> Result<bool> {
    let worker = &area.worker_dir;
    let remote_ref = format!("refs/remotes/source/{branch}");
    let staged_ref = format!("refs/heads/filter-branch/source/{branch}");
    let result_ref = format!("refs/heads/filter-branch/result/{branch}");
    let filtered_ref = format!("refs/heads/filter-branch/filtered/{branch}");
    let originals_ns = format!("refs/filter-branch/originals/{branch}");

    gitutil::run(
        worker,
        &[
            "fetch",
            "--quiet",
            "--force",
            "--tags",
            "--update-shallow",
            "source",
            &format!("+refs/heads/{branch}:{remote_ref}"),
        ],
    )
    .map_err(|err| MirrorError::SourceUnavailable(format!("fetching {branch:?} failed: {err}")))?;
    let fetch_head = gitutil::rev_parse(worker, &remote_ref)?;

    gitutil::update_ref(worker, &staged_ref, &fetch_head)?;
    gitutil::symbolic_ref(worker, "HEAD", &staged_ref)?;

    let last = gitutil::try_rev_parse(worker, &filtered_ref)?;
    if last.as_deref() == Some(fetch_head.as_str()) {
        println!("branch {branch}: up to date");
        return Ok(false);
    }

    for stale in gitutil::refs_under(worker, &originals_ns)? {
        gitutil::delete_ref(worker, &stale)?;
    }
    gitutil::update_ref(worker, &result_ref, &fetch_head)?;
    area.clear_transients()?;

    let tags_in_scope = in_scope_tags(opts, area, tag_matcher, &staged_ref)?;

    match &last {
        Some(last) => println!("branch {branch}: rewriting {last}..{fetch_head}"),
        None => println!("branch {branch}: rewriting full history up to {fetch_head}"),
    }
    drive_engine(area, spec, branch, &result_ref, last.as_deref(), !tags_in_scope.is_empty())?;

    if opts.tags_plan == TagsPlan::All && !tags_in_scope.is_empty() {
        let mut map = CommitMap::new();
        for tag in &tags_in_scope {
            let converted = format!("refs/tags/{CONVERTED_TAG_PREFIX}{tag}");
            if gitutil::ref_exists(worker, &converted)? {
                continue;
            }
            tagmap::map_tag(area, &mut map, tag, opts.tags_max_history_lookup)?;
        }
    }

    gitutil::update_ref(worker, &filtered_ref, &fetch_head)?;
    area.clear_transients()?;

    Ok(true)
}

/// Tags merged into the staged branch tip that pass the tag matcher.
/// Previously converted tags live under the same `refs/tags/` namespace and
/// are never part of the source-visible set.
fn in_scope_tags(
    opts: &Options,
    area: &WorkArea,
    tag_matcher: &RefMatcher,
    staged_ref: &str,
) -> Result<Vec<String>> {
    if opts.tags_plan == TagsPlan::None {
        return Ok(Vec::new());
    }
    Ok(gitutil::tags_merged_into(&area.worker_dir, staged_ref)?
        .into_iter()
        .filter(|t| !t.starts_with(CONVERTED_TAG_PREFIX))
        .filter(|t| tag_matcher.passes(t))
        .collect())
}

/// Invoke `git filter-branch` for one branch. The user's filter directives
/// come first, followed by the options the pipeline owns: the scratch
/// directory, the persistent state branch, the per-branch originals
/// namespace, and (when tags are in play) a tag-name filter that moves tag
/// names into the converted-tags namespace. The name filter strips the
/// prefix before adding it so re-encountered converted names stay stable.
fn drive_engine(
    area: &WorkArea,
    spec: &FilterSpec,
    branch: &str,
    result_ref: &str,
    last: Option<&str>,
    want_tags: bool,
) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(&area.worker_dir).arg("filter-branch");
    // Suppresses the engine's interactive warning and its ten-second sleep.
    cmd.env("FILTER_BRANCH_SQUELCH_WARNING", "1");
    for arg in spec.engine_args() {
        cmd.arg(arg);
    }
    cmd.arg("-d").arg(&area.scratch_dir);
    cmd.arg("--remap-to-ancestor");
    cmd.arg("--state-branch").arg(STATE_REF);
    cmd.arg("--original")
        .arg(format!("refs/filter-branch/originals/{branch}"));
    if want_tags {
        cmd.arg("--tag-name-filter").arg(format!(
            "sed -e 's|^{CONVERTED_TAG_PREFIX}||' -e 's|^|{CONVERTED_TAG_PREFIX}|'"
        ));
    }
    cmd.arg("--force");
    cmd.arg("--");
    match last {
        Some(last) => cmd.arg(format!("{last}..{result_ref}")),
        None => cmd.arg(result_ref),
    };

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|err| {
        MirrorError::Rewrite(format!("failed to spawn git filter-branch: {err}"))
    })?;
    let mut stderr_buf = Vec::new();
    if let Some(mut err) = child.stderr.take() {
        err.read_to_end(&mut stderr_buf)?;
    }
    let status = child.wait()?;
    io::stderr().write_all(&stderr_buf)?;

    if status.success() {
        return Ok(());
    }
    let stderr_text = String::from_utf8_lossy(&stderr_buf);
    let benign = matches!(status.code(), Some(1) | Some(2))
        && stderr_text.lines().any(|l| l.trim() == NOTHING_TO_REWRITE);
    if benign {
        println!("branch {branch}: nothing to rewrite in the requested range");
        return Ok(());
    }
    Err(MirrorError::Rewrite(format!(
        "git filter-branch exited with {status} for branch {branch:?}"
    )))
}
