mod filterspec;
mod gitutil;
mod lock;
mod matcher;
mod mirror;
mod prune;
mod publish;
mod rewrite;
mod tagmap;
mod worker;
mod workdir;

pub mod error;
pub mod opts;

pub use error::{MirrorError, Result};
pub use opts::{Options, TagsPlan};

use filterspec::FilterSpec;
use matcher::RefMatcher;
use workdir::WorkArea;

/// Run the whole pipeline: validate, lock, refresh the mirror, rewrite
/// every in-scope branch incrementally, publish, and reconcile the
/// destination.
pub fn run(opts: &Options) -> Result<()> {
    opts::validate(opts)?;
    let spec = FilterSpec::parse(&opts.filter_args)?;
    let branch_matcher = RefMatcher::new(&opts.branch_whitelist, &opts.branch_blacklist, "branch")?;
    let tag_matcher = RefMatcher::new(&opts.tag_whitelist, &opts.tag_blacklist, "tag")?;

    let (major, minor) = gitutil::ensure_git_available()
        .map_err(|err| MirrorError::Environment(err.to_string()))?;
    if major < 2 || (major == 2 && minor < 18) {
        return Err(MirrorError::Environment(format!(
            "git {major}.{minor} is too old; 2.18 or newer is required"
        )));
    }

    let area = WorkArea::create(&opts.workdir, &opts.source, &opts.destination)?;
    let _guard = lock::acquire(&area.lock_path, opts.lock)?;

    mirror::ensure_mirror(opts, &area)?;
    let branches = mirror::source_branches(&area)?;
    let in_scope: Vec<String> = branches
        .into_iter()
        .filter(|b| branch_matcher.passes(b))
        .collect();
    if in_scope.is_empty() {
        return Err(MirrorError::SourceUnavailable(
            "no source branch passes the branch whitelist/blacklist".to_string(),
        ));
    }
    let source_tags = mirror::source_tags(&area)?;

    worker::ensure_worker(opts, &area)?;
    if opts.prune_tags {
        prune::drop_stale_converted_tags(&area, &tag_matcher, &source_tags)?;
    }

    let mut rewritten = 0usize;
    let mut up_to_date = 0usize;
    for branch in &in_scope {
        if rewrite::rewrite_branch(opts, &area, &spec, &tag_matcher, branch)? {
            rewritten += 1;
        } else {
            up_to_date += 1;
        }
    }
    worker::park_head(&area.worker_dir)?;
    area.clear_transients()?;

    let (_, tags_published) =
        publish::publish(opts, &area, &in_scope, &source_tags, &tag_matcher)?;
    let mut pruned = 0usize;
    if opts.prune_branches || opts.prune_tags {
        pruned = prune::prune_destination(opts, &area, &in_scope, &source_tags, &tag_matcher)?;
    }

    println!(
        "done: {rewritten} branch(es) rewritten, {up_to_date} up to date, {tags_published} tag(s) published, {pruned} ref(s) pruned"
    );
    Ok(())
}
