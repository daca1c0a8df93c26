use std::process::{Command, Stdio};

use crate::error::{MirrorError, Result};
use crate::gitutil;
use crate::matcher::RefMatcher;
use crate::opts::{Options, TagsPlan};
use crate::tagmap::CONVERTED_TAG_PREFIX;
use crate::workdir::WorkArea;

/// Publish every processed branch and every converted in-scope tag to the
/// destination in a single forced push.
///
/// Returns `(branches, tags)` pushed. Failure is fatal; per-ref retries
/// would only hide a destination that rejects the rewrite.
pub fn publish(
    opts: &Options,
    area: &WorkArea,
    branches: &[String],
    source_tags: &[String],
    tag_matcher: &RefMatcher,
) -> Result<(usize, usize)> {
    let worker = &area.worker_dir;
    let mut refspecs: Vec<String> = Vec::new();
    for branch in branches {
        refspecs.push(format!(
            "refs/heads/filter-branch/result/{branch}:refs/heads/{branch}"
        ));
    }
    let mut tag_count = 0;
    if opts.tags_plan != TagsPlan::None {
        for tag in source_tags {
            if !tag_matcher.passes(tag) {
                continue;
            }
            let converted = format!("refs/tags/{CONVERTED_TAG_PREFIX}{tag}");
            if gitutil::ref_exists(worker, &converted)? {
                refspecs.push(format!("{converted}:refs/tags/{tag}"));
                tag_count += 1;
            }
        }
    }

    println!(
        "publishing {} branch(es) and {tag_count} tag(s) to destination",
        branches.len()
    );
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(worker).arg("push").arg("--force");
    if opts.atomic_push {
        cmd.arg("--atomic");
    }
    cmd.arg("destination");
    for refspec in &refspecs {
        cmd.arg(refspec);
    }
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(MirrorError::Push(format!(
            "publishing to the destination failed with {status}"
        )));
    }
    Ok((branches.len(), tag_count))
}
