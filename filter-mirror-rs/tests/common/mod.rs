use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use filter_mirror_rs as fmr;

pub fn mktemp(prefix: &str) -> PathBuf {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("target");
    p.push("it");
    static COUNT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let c = COUNT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    p.push(format!("{}_{}_{}_{}", prefix, pid, t, c));
    p
}

pub fn run_git(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let out = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run git");
    let code = out.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    (code, stdout, stderr)
}

#[allow(dead_code)]
pub fn write_file(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    if let Some(p) = path.parent() {
        fs::create_dir_all(p).unwrap();
    }
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
}

/// A non-bare source repository on branch `main` with git identity set.
pub fn init_source_repo(prefix: &str) -> PathBuf {
    let repo = mktemp(prefix);
    fs::create_dir_all(&repo).unwrap();
    let (c, _o, e) = run_git(&repo, &["init", "-b", "main"]);
    assert_eq!(c, 0, "git init failed: {}", e);
    assert_eq!(run_git(&repo, &["config", "user.name", "A U Thor"]).0, 0);
    assert_eq!(
        run_git(&repo, &["config", "user.email", "a.u.thor@example.com"]).0,
        0
    );
    repo
}

/// A bare destination repository whose HEAD points at `head_branch`.
pub fn init_destination_repo(prefix: &str, head_branch: &str) -> PathBuf {
    let repo = mktemp(prefix);
    fs::create_dir_all(&repo).unwrap();
    let (c, _o, e) = run_git(&repo, &["init", "--bare", "-b", head_branch]);
    assert_eq!(c, 0, "git init --bare failed: {}", e);
    repo
}

#[allow(dead_code)]
pub fn commit_file(repo: &Path, rel: &str, contents: &str, message: &str) -> String {
    write_file(repo, rel, contents);
    assert_eq!(run_git(repo, &["add", "."]).0, 0, "git add failed");
    assert_eq!(
        run_git(repo, &["commit", "-q", "-m", message]).0,
        0,
        "git commit failed"
    );
    let (_c, sha, _e) = run_git(repo, &["rev-parse", "HEAD"]);
    sha.trim().to_string()
}

#[allow(dead_code)]
pub fn base_opts(source: &Path, destination: &Path, workdir: &Path, filter: &[&str]) -> fmr::Options {
    let mut opts = fmr::Options::default();
    opts.source = source.to_string_lossy().into_owned();
    opts.destination = destination.to_string_lossy().into_owned();
    opts.workdir = workdir.to_path_buf();
    opts.filter_args = filter.iter().map(|s| s.to_string()).collect();
    opts
}

#[allow(dead_code)]
pub fn run_tool_expect_success(opts: &fmr::Options) {
    fmr::run(opts).expect("filter-mirror-rs run should succeed");
}

/// The worker repository inside a working area (there is exactly one per
/// source/destination pair).
#[allow(dead_code)]
pub fn worker_dir(workdir: &Path) -> PathBuf {
    let mut found: Vec<PathBuf> = fs::read_dir(workdir)
        .expect("workdir exists")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .map(|n| n.to_string_lossy().starts_with("worker-"))
                    .unwrap_or(false)
                && p.extension().is_none()
        })
        .collect();
    assert_eq!(found.len(), 1, "expected exactly one worker dir");
    found.remove(0)
}

/// The accumulated original→rewritten table from the worker's state ref.
#[allow(dead_code)]
pub fn state_map(workdir: &Path) -> String {
    let worker = worker_dir(workdir);
    let (c, out, e) = run_git(&worker, &["show", "refs/filter-branch/state:filter.map"]);
    assert_eq!(c, 0, "state ref missing: {}", e);
    out
}

/// Sorted `sha refname` lines for every ref in a repository.
#[allow(dead_code)]
pub fn all_refs(repo: &Path) -> String {
    let (c, out, _e) = run_git(repo, &["show-ref"]);
    // show-ref exits 1 on an empty repo
    if c != 0 {
        return String::new();
    }
    out
}

#[allow(dead_code)]
pub fn rev_parse(repo: &Path, rev: &str) -> String {
    let (c, out, e) = run_git(repo, &["rev-parse", "--verify", rev]);
    assert_eq!(c, 0, "rev-parse {} failed: {}", rev, e);
    out.trim().to_string()
}

#[allow(dead_code)]
pub fn branch_names(repo: &Path) -> Vec<String> {
    let (c, out, e) = run_git(
        repo,
        &["for-each-ref", "--format=%(refname:strip=2)", "refs/heads"],
    );
    assert_eq!(c, 0, "for-each-ref failed: {}", e);
    out.lines().map(|l| l.trim().to_string()).collect()
}

#[allow(dead_code)]
pub fn tag_names(repo: &Path) -> Vec<String> {
    let (c, out, e) = run_git(
        repo,
        &["for-each-ref", "--format=%(refname:strip=2)", "refs/tags"],
    );
    assert_eq!(c, 0, "for-each-ref failed: {}", e);
    out.lines().map(|l| l.trim().to_string()).collect()
}
