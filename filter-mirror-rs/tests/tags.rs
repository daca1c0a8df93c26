mod common;
use common::*;

#[test]
fn surviving_tag_lands_on_its_rewritten_commit() {
    let source = init_source_repo("fmr_tag_keep");
    commit_file(&source, "README.md", "hello", "c1");
    let c2 = commit_file(&source, "a.txt", "a", "c2");
    assert_eq!(
        run_git(&source, &["tag", "-a", "-m", "release one", "v1"]).0,
        0
    );
    commit_file(&source, "b.txt", "b", "c3");

    let destination = init_destination_repo("fmr_tag_keep_dst", "main");
    let workdir = mktemp("fmr_tag_keep_wd");
    let opts = base_opts(&source, &destination, &workdir, &["--prune-empty"]);
    run_tool_expect_success(&opts);

    assert_eq!(tag_names(&destination), vec!["v1".to_string()]);
    // Identity filter: the tagged commit rewrites onto itself.
    assert_eq!(rev_parse(&destination, "refs/tags/v1^{commit}"), c2);
}

#[test]
fn dropped_commit_tag_lands_on_surviving_ancestor() {
    let source = init_source_repo("fmr_tag_drop");
    let c1 = commit_file(&source, "keep/one.txt", "one", "keep one");
    commit_file(&source, "drop/tmp.txt", "tmp", "only droppable content");
    assert_eq!(run_git(&source, &["tag", "-a", "-m", "on dropped", "v1"]).0, 0);
    commit_file(&source, "keep/two.txt", "two", "keep two");

    let destination = init_destination_repo("fmr_tag_drop_dst", "main");
    let workdir = mktemp("fmr_tag_drop_wd");
    let mut opts = base_opts(
        &source,
        &destination,
        &workdir,
        &[
            "--index-filter",
            "git rm -r --cached -q --ignore-unmatch drop",
            "--prune-empty",
        ],
    );
    opts.tags_plan = filter_mirror_rs::TagsPlan::All;
    opts.tags_max_history_lookup = 5;
    run_tool_expect_success(&opts);

    // The tagged commit became empty and was pruned; its tag follows the
    // nearest surviving ancestor, whose rewrite is itself (no drop/ yet).
    assert_eq!(tag_names(&destination), vec!["v1".to_string()]);
    assert_eq!(rev_parse(&destination, "refs/tags/v1^{commit}"), c1);
}

#[test]
fn tags_plan_none_leaves_destination_tags_alone() {
    let source = init_source_repo("fmr_tag_none");
    commit_file(&source, "README.md", "hello", "c1");
    assert_eq!(run_git(&source, &["tag", "v1"]).0, 0);

    let destination = init_destination_repo("fmr_tag_none_dst", "main");
    let workdir = mktemp("fmr_tag_none_wd");
    let mut opts = base_opts(&source, &destination, &workdir, &["--prune-empty"]);
    opts.tags_plan = filter_mirror_rs::TagsPlan::None;
    run_tool_expect_success(&opts);

    assert_eq!(branch_names(&destination), vec!["main".to_string()]);
    assert!(tag_names(&destination).is_empty());
}

#[test]
fn out_of_scope_tags_are_not_published() {
    let source = init_source_repo("fmr_tag_scope");
    commit_file(&source, "README.md", "hello", "c1");
    assert_eq!(run_git(&source, &["tag", "keep-1"]).0, 0);
    assert_eq!(run_git(&source, &["tag", "wip-1"]).0, 0);

    let destination = init_destination_repo("fmr_tag_scope_dst", "main");
    let workdir = mktemp("fmr_tag_scope_wd");
    let mut opts = base_opts(&source, &destination, &workdir, &["--prune-empty"]);
    opts.tag_blacklist = vec!["rx:wip-.*".to_string()];
    run_tool_expect_success(&opts);

    assert_eq!(tag_names(&destination), vec!["keep-1".to_string()]);
}
