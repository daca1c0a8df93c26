use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{MirrorError, Result};
use crate::gitutil;
use crate::opts::Options;
use crate::workdir::WorkArea;

/// Sentinel `HEAD` target used while no branch rewrite is in flight.
pub const HEAD_SENTINEL: &str = "refs/none";

/// Ensure the long-lived bare worker repository exists and is usable, with
/// its `source` remote pinned at the local mirror and its `destination`
/// remote pinned at the user-supplied destination.
///
/// A worker that stops being a repository (deleted objects, interrupted
/// init) is silently rebuilt; only a failing rebuild surfaces as an error.
pub fn ensure_worker(opts: &Options, area: &WorkArea) -> Result<()> {
    if area.worker_dir.exists() {
        if gitutil::is_bare_repo_dir(&area.worker_dir) {
            refresh_remotes(opts, area)?;
            return Ok(());
        }
        eprintln!(
            "NOTICE: worker repository {} is unusable; rebuilding",
            area.worker_dir.display()
        );
        fs::remove_dir_all(&area.worker_dir)?;
        return init_worker(opts, area).map_err(|err| {
            MirrorError::WorkerCorrupt(format!(
                "rebuild of {} failed: {err}",
                area.worker_dir.display()
            ))
        });
    }
    init_worker(opts, area).map_err(MirrorError::Io)
}

fn init_worker(opts: &Options, area: &WorkArea) -> io::Result<()> {
    let result = try_init_worker(opts, area);
    if result.is_err() && area.worker_dir.exists() {
        let _ = fs::remove_dir_all(&area.worker_dir);
    }
    result
}

fn try_init_worker(opts: &Options, area: &WorkArea) -> io::Result<()> {
    let status = Command::new("git")
        .arg("init")
        .arg("--bare")
        .arg("--quiet")
        .arg(&area.worker_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("'git init --bare' failed with {status}"),
        ));
    }
    let mirror = path_arg(&area.mirror_dir);
    gitutil::run(&area.worker_dir, &["remote", "add", "source", &mirror])?;
    gitutil::run(
        &area.worker_dir,
        &["remote", "add", "destination", &destination_url(opts)],
    )?;
    // The rewrite engine commits its state table inside the worker, which
    // therefore needs a committer identity independent of the operator's
    // global configuration.
    gitutil::run(&area.worker_dir, &["config", "user.name", "filter-mirror-rs"])?;
    gitutil::run(
        &area.worker_dir,
        &["config", "user.email", "filter-mirror-rs@localhost"],
    )?;
    park_head(&area.worker_dir)?;
    fetch_destination(area)
}

fn refresh_remotes(opts: &Options, area: &WorkArea) -> Result<()> {
    let mirror = path_arg(&area.mirror_dir);
    gitutil::run(&area.worker_dir, &["remote", "set-url", "source", &mirror])?;
    gitutil::run(
        &area.worker_dir,
        &["remote", "set-url", "destination", &destination_url(opts)],
    )?;
    fetch_destination(area)?;
    Ok(())
}

/// Remote URL for the destination. Local directories are pinned to their
/// canonical path because remote URLs resolve relative to the worker, not
/// to the invocation directory.
fn destination_url(opts: &Options) -> String {
    let path = Path::new(&opts.destination);
    if path.is_dir() {
        if let Ok(abs) = path.canonicalize() {
            return abs.to_string_lossy().into_owned();
        }
    }
    opts.destination.clone()
}

fn fetch_destination(area: &WorkArea) -> io::Result<()> {
    gitutil::run(
        &area.worker_dir,
        &["fetch", "--prune", "--quiet", "destination"],
    )
}

/// Detach `HEAD` onto the sentinel so that no fetched or rewritten branch
/// is ever the current branch of the worker.
pub fn park_head(worker: &Path) -> io::Result<()> {
    gitutil::symbolic_ref(worker, "HEAD", HEAD_SENTINEL)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
