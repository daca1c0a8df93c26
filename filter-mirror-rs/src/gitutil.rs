use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Verify that a usable `git` binary is on PATH and new enough.
///
/// The rewrite engine's persistent-state support (`--state-branch`) first
/// shipped in git 2.18, so anything older cannot run the pipeline at all.
pub fn ensure_git_available() -> io::Result<(u32, u32)> {
    let out = Command::new("git")
        .arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("failed to run 'git --version': {e}"),
            )
        })?;
    if !out.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "'git --version' failed",
        ));
    }
    let text = String::from_utf8_lossy(&out.stdout);
    let version = text
        .split_whitespace()
        .nth(2)
        .unwrap_or("")
        .to_string();
    let mut parts = version.split('.');
    let major = parts.next().and_then(|s| s.parse::<u32>().ok());
    let minor = parts.next().and_then(|s| s.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) => Ok((major, minor)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("could not parse git version from {:?}", text.trim()),
        )),
    }
}

/// Resolve the git directory of a repository.
///
/// Used to validate that a persisted mirror or worker directory still is a
/// usable repository before mutating it.
pub fn git_dir(repo: &Path) -> io::Result<PathBuf> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("rev-parse")
        .arg("--git-dir")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;
    if !out.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("'git -C {:?} rev-parse --git-dir' failed", repo),
        ));
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    let p = PathBuf::from(&s);
    if p.is_absolute() {
        Ok(p)
    } else {
        Ok(repo.join(p))
    }
}

/// Whether `dir` is itself the git directory of a bare repository.
///
/// `rev-parse --git-dir` walks upward, so a stray or gutted directory that
/// happens to live inside some other repository would otherwise pass for a
/// usable one and subsequent commands would mutate the enclosing repo.
pub fn is_bare_repo_dir(dir: &Path) -> bool {
    match git_dir(dir) {
        Ok(found) => {
            let found = found.canonicalize().unwrap_or(found);
            let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
            found == dir
        }
        Err(_) => false,
    }
}

/// Run a git command in `repo`, failing on non-zero exit.
///
/// Stderr is inherited so the operator sees whatever git has to say.
pub fn run(repo: &Path, args: &[&str]) -> io::Result<()> {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("'git -C {:?} {}' failed with {}", repo, args.join(" "), status),
        ));
    }
    Ok(())
}

/// Run a git command in `repo` and return its trimmed stdout.
pub fn stdout(repo: &Path, args: &[&str]) -> io::Result<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()?;
    if !out.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("'git -C {:?} {}' failed with {}", repo, args.join(" "), out.status),
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Run a git command in `repo` and return its stdout split into non-empty
/// trimmed lines.
pub fn lines(repo: &Path, args: &[&str]) -> io::Result<Vec<String>> {
    let text = stdout(repo, args)?;
    Ok(text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Resolve a revision to a full object id, or `None` when it does not
/// resolve (missing ref, unborn branch, and so on).
pub fn try_rev_parse(repo: &Path, rev: &str) -> io::Result<Option<String>> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("rev-parse")
        .arg("--verify")
        .arg("--quiet")
        .arg(rev)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;
    if !out.status.success() {
        return Ok(None);
    }
    let id = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if id.is_empty() {
        Ok(None)
    } else {
        Ok(Some(id))
    }
}

/// Resolve a revision to a full object id, failing when it does not exist.
pub fn rev_parse(repo: &Path, rev: &str) -> io::Result<String> {
    try_rev_parse(repo, rev)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("revision {rev:?} not found in {:?}", repo),
        )
    })
}

/// Whether a fully-qualified ref exists in the repository.
pub fn ref_exists(repo: &Path, refname: &str) -> io::Result<bool> {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("show-ref")
        .arg("--verify")
        .arg("--quiet")
        .arg(refname)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

/// Create or force-update a ref to point at `value`.
pub fn update_ref(repo: &Path, refname: &str, value: &str) -> io::Result<()> {
    run(repo, &["update-ref", refname, value])
}

/// Delete a ref if it exists.
pub fn delete_ref(repo: &Path, refname: &str) -> io::Result<()> {
    run(repo, &["update-ref", "-d", refname])
}

/// Point `HEAD` (or another symbolic ref) at `target` without touching any
/// object.
pub fn symbolic_ref(repo: &Path, name: &str, target: &str) -> io::Result<()> {
    run(repo, &["symbolic-ref", name, target])
}

/// List fully-qualified ref names under `prefix`, in git's sorted order.
pub fn refs_under(repo: &Path, prefix: &str) -> io::Result<Vec<String>> {
    lines(repo, &["for-each-ref", "--format=%(refname)", prefix])
}

/// List the tags whose commits are reachable from `commit`.
pub fn tags_merged_into(repo: &Path, commit: &str) -> io::Result<Vec<String>> {
    lines(repo, &["tag", "--list", "--merged", commit])
}

/// Read a blob addressed by a `<rev>:<path>` spec, or `None` when the rev or
/// path does not exist.
pub fn try_cat_blob(repo: &Path, spec: &str) -> io::Result<Option<Vec<u8>>> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("cat-file")
        .arg("blob")
        .arg(spec)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;
    if !out.status.success() {
        return Ok(None);
    }
    Ok(Some(out.stdout))
}

/// Query refs on a configured remote. Returns `(object id, refname)` pairs
/// exactly as reported, including peeled `^{}` entries.
pub fn ls_remote(repo: &Path, args: &[&str]) -> io::Result<Vec<(String, String)>> {
    let mut full: Vec<&str> = vec!["ls-remote"];
    full.extend_from_slice(args);
    let mut out = Vec::new();
    for line in lines(repo, &full)? {
        let mut parts = line.split_whitespace();
        if let (Some(id), Some(name)) = (parts.next(), parts.next()) {
            out.push((id.to_string(), name.to_string()));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn create_test_repo() -> io::Result<TempDir> {
        let temp_dir = TempDir::new()?;
        let output = Command::new("git")
            .arg("init")
            .current_dir(temp_dir.path())
            .output()?;
        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "Failed to initialize test git repository",
            ));
        }
        Command::new("git")
            .arg("config")
            .arg("user.name")
            .arg("Test User")
            .current_dir(temp_dir.path())
            .output()?;
        Command::new("git")
            .arg("config")
            .arg("user.email")
            .arg("test@example.com")
            .current_dir(temp_dir.path())
            .output()?;
        Ok(temp_dir)
    }

    fn create_commit(repo_path: &Path) -> io::Result<()> {
        std::fs::write(repo_path.join("test.txt"), "test content")?;
        Command::new("git")
            .arg("add")
            .arg("test.txt")
            .current_dir(repo_path)
            .output()?;
        Command::new("git")
            .arg("commit")
            .arg("-m")
            .arg("Test commit")
            .current_dir(repo_path)
            .output()?;
        Ok(())
    }

    #[test]
    fn bare_repo_dir_detection() -> io::Result<()> {
        let bare = TempDir::new()?;
        let out = Command::new("git")
            .arg("init")
            .arg("--bare")
            .current_dir(bare.path())
            .output()?;
        assert!(out.status.success());
        assert!(is_bare_repo_dir(bare.path()));

        let plain = create_test_repo()?;
        assert!(!is_bare_repo_dir(plain.path()));

        let empty = TempDir::new()?;
        assert!(!is_bare_repo_dir(empty.path()));
        Ok(())
    }

    #[test]
    fn git_is_available() {
        let (major, minor) = ensure_git_available().expect("git present");
        assert!(major > 2 || (major == 2 && minor >= 18));
    }

    #[test]
    fn rev_parse_roundtrip() -> io::Result<()> {
        let repo = create_test_repo()?;
        create_commit(repo.path())?;
        let head = rev_parse(repo.path(), "HEAD")?;
        assert_eq!(head.len(), 40);
        assert_eq!(try_rev_parse(repo.path(), "HEAD")?, Some(head));
        assert_eq!(try_rev_parse(repo.path(), "refs/heads/nope")?, None);
        Ok(())
    }

    #[test]
    fn update_and_delete_ref() -> io::Result<()> {
        let repo = create_test_repo()?;
        create_commit(repo.path())?;
        let head = rev_parse(repo.path(), "HEAD")?;
        update_ref(repo.path(), "refs/heads/copy", &head)?;
        assert!(ref_exists(repo.path(), "refs/heads/copy")?);
        delete_ref(repo.path(), "refs/heads/copy")?;
        assert!(!ref_exists(repo.path(), "refs/heads/copy")?);
        Ok(())
    }

    #[test]
    fn refs_under_lists_heads() -> io::Result<()> {
        let repo = create_test_repo()?;
        create_commit(repo.path())?;
        let heads = refs_under(repo.path(), "refs/heads")?;
        assert_eq!(heads.len(), 1);
        assert!(heads[0].starts_with("refs/heads/"));
        Ok(())
    }

    #[test]
    fn tags_merged_lists_reachable_tags() -> io::Result<()> {
        let repo = create_test_repo()?;
        create_commit(repo.path())?;
        Command::new("git")
            .arg("tag")
            .arg("t1")
            .current_dir(repo.path())
            .output()?;
        let tags = tags_merged_into(repo.path(), "HEAD")?;
        assert_eq!(tags, vec!["t1".to_string()]);
        Ok(())
    }

    #[test]
    fn cat_blob_missing_is_none() -> io::Result<()> {
        let repo = create_test_repo()?;
        create_commit(repo.path())?;
        assert!(try_cat_blob(repo.path(), "HEAD:absent.txt")?.is_none());
        let data = try_cat_blob(repo.path(), "HEAD:test.txt")?;
        assert_eq!(data.as_deref(), Some(b"test content".as_ref()));
        Ok(())
    }
}
