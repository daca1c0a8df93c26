use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MirrorError, Result};

/// What happens to source tags.
///
/// `Visited` republishes only tags the rewrite engine translated itself;
/// `All` additionally maps left-over tags onto nearby rewritten ancestors;
/// `None` keeps tags out of the run entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagsPlan {
    Visited,
    All,
    None,
}

impl TagsPlan {
    fn parse(value: &str) -> Option<TagsPlan> {
        match value {
            "visited" => Some(TagsPlan::Visited),
            "all" => Some(TagsPlan::All),
            "none" => Some(TagsPlan::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub source: String,
    pub filter_args: Vec<String>,
    pub destination: String,
    pub workdir: PathBuf,
    pub branch_whitelist: Vec<String>,
    pub branch_blacklist: Vec<String>,
    pub tag_whitelist: Vec<String>,
    pub tag_blacklist: Vec<String>,
    pub tags_plan: TagsPlan,
    pub tags_max_history_lookup: u32,
    pub prune_branches: bool,
    pub prune_tags: bool,
    pub hardlinks: bool,
    pub atomic_push: bool,
    pub lock: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            source: String::new(),
            filter_args: Vec::new(),
            destination: String::new(),
            workdir: PathBuf::from("./temp"),
            branch_whitelist: Vec::new(),
            branch_blacklist: Vec::new(),
            tag_whitelist: Vec::new(),
            tag_blacklist: Vec::new(),
            tags_plan: TagsPlan::Visited,
            tags_max_history_lookup: 50,
            prune_branches: false,
            prune_tags: false,
            hardlinks: true,
            atomic_push: true,
            lock: true,
        }
    }
}

/// Cross-field validation shared by the CLI and library callers.
pub fn validate(opts: &Options) -> Result<()> {
    if opts.source.trim().is_empty() {
        return Err(MirrorError::usage("no source repository given"));
    }
    if opts.destination.trim().is_empty() {
        return Err(MirrorError::usage("no destination repository given"));
    }
    if opts.tags_max_history_lookup < 1 {
        return Err(MirrorError::usage(
            "--tags-max-history-lookup must be at least 1",
        ));
    }
    if opts.tags_plan == TagsPlan::None {
        if opts.prune_tags {
            return Err(MirrorError::ConfigConflict(
                "--prune-tags requires a tags plan other than 'none'".to_string(),
            ));
        }
        if opts.prune_branches {
            return Err(MirrorError::ConfigConflict(
                "--prune-branches requires a tags plan other than 'none'".to_string(),
            ));
        }
        if !opts.tag_whitelist.is_empty() || !opts.tag_blacklist.is_empty() {
            return Err(MirrorError::ConfigConflict(
                "tag whitelists/blacklists have no effect with a tags plan of 'none'".to_string(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct FileTagsConfig {
    plan: Option<String>,
    max_history_lookup: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FilePushConfig {
    atomic: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    workdir: Option<String>,
    hardlinks: Option<bool>,
    locking: Option<bool>,
    tags: Option<FileTagsConfig>,
    push: Option<FilePushConfig>,
}

/// CLI values that must survive being layered over a config file.
#[derive(Default)]
struct CliOverrides {
    workdir: Option<PathBuf>,
    tags_plan: Option<TagsPlan>,
    tags_max_history_lookup: Option<u32>,
    atomic_push: Option<bool>,
    lock: Option<bool>,
    hardlinks: Option<bool>,
}

impl CliOverrides {
    fn apply(&self, opts: &mut Options) {
        if let Some(ref workdir) = self.workdir {
            opts.workdir = workdir.clone();
        }
        if let Some(plan) = self.tags_plan {
            opts.tags_plan = plan;
        }
        if let Some(lookup) = self.tags_max_history_lookup {
            opts.tags_max_history_lookup = lookup;
        }
        if let Some(atomic) = self.atomic_push {
            opts.atomic_push = atomic;
        }
        if let Some(lock) = self.lock {
            opts.lock = lock;
        }
        if let Some(hardlinks) = self.hardlinks {
            opts.hardlinks = hardlinks;
        }
    }
}

pub fn parse_args() -> Options {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config_override = env::var("FILTER_MIRROR_RS_CONFIG").ok().map(PathBuf::from);

    let mut idx = 0;
    while idx < args.len() {
        if args[idx] == "--config" {
            if idx + 1 >= args.len() {
                usage_error("--config requires a file path");
            }
            config_override = Some(PathBuf::from(args.remove(idx + 1)));
            args.remove(idx);
            continue;
        } else if let Some(path) = args[idx].strip_prefix("--config=") {
            if path.is_empty() {
                usage_error("--config= requires a file path");
            }
            config_override = Some(PathBuf::from(path));
            args.remove(idx);
            continue;
        }
        idx += 1;
    }

    let mut opts = Options::default();
    let mut overrides = CliOverrides::default();
    let mut positionals: Vec<String> = Vec::new();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--workdir" => {
                let v = require_value(&mut it, "--workdir");
                overrides.workdir = Some(PathBuf::from(v));
            }
            "--branch-whitelist" => {
                let v = require_value(&mut it, "--branch-whitelist");
                append_list(&mut opts.branch_whitelist, &v);
            }
            "--branch-blacklist" => {
                let v = require_value(&mut it, "--branch-blacklist");
                append_list(&mut opts.branch_blacklist, &v);
            }
            "--tag-whitelist" => {
                let v = require_value(&mut it, "--tag-whitelist");
                append_list(&mut opts.tag_whitelist, &v);
            }
            "--tag-blacklist" => {
                let v = require_value(&mut it, "--tag-blacklist");
                append_list(&mut opts.tag_blacklist, &v);
            }
            "--tags-plan" => {
                let v = require_value(&mut it, "--tags-plan");
                match TagsPlan::parse(&v) {
                    Some(plan) => overrides.tags_plan = Some(plan),
                    None => usage_error(&format!(
                        "--tags-plan expects visited, all or none (got {v:?})"
                    )),
                }
            }
            "--tags-max-history-lookup" => {
                let v = require_value(&mut it, "--tags-max-history-lookup");
                match v.parse::<u32>() {
                    Ok(n) if n >= 1 => overrides.tags_max_history_lookup = Some(n),
                    _ => usage_error("--tags-max-history-lookup expects an integer of at least 1"),
                }
            }
            "--prune-branches" => opts.prune_branches = true,
            "--prune-tags" => opts.prune_tags = true,
            "--no-hardlinks" => overrides.hardlinks = Some(false),
            "--no-atomic" => overrides.atomic_push = Some(false),
            "--no-lock" => overrides.lock = Some(false),
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--" => {
                positionals.extend(it);
                break;
            }
            other if other.starts_with('-') && other.len() > 1 => {
                usage_error(&format!("unknown option: {other}"));
            }
            _ => positionals.push(arg),
        }
    }

    match positionals.len() {
        3 => {}
        n if n < 3 => usage_error("expected <source> <filter-spec> <destination>"),
        _ => usage_error(&format!(
            "unexpected extra argument: {:?}",
            positionals[3]
        )),
    }
    let mut positionals = positionals.into_iter();
    opts.source = positionals.next().unwrap_or_default();
    opts.filter_args = crate::filterspec::tokenize(&positionals.next().unwrap_or_default());
    opts.destination = positionals.next().unwrap_or_default();

    let config_target = match config_override {
        Some(path) => Some((path, true)),
        None => Some((PathBuf::from(".filter-mirror-rs.toml"), false)),
    };
    if let Some((path, explicit)) = config_target {
        match apply_config_from_file(&mut opts, &path) {
            Ok(()) => {}
            Err(ConfigError::Io(err)) => {
                use std::io::ErrorKind;
                if explicit || err.kind() != ErrorKind::NotFound {
                    usage_error(&format!(
                        "failed to read config at {}: {err}",
                        path.display()
                    ));
                }
            }
            Err(ConfigError::Parse(err)) => {
                usage_error(&format!(
                    "failed to parse config at {}: {err}",
                    path.display()
                ));
            }
            Err(ConfigError::Value(msg)) => {
                usage_error(&format!("bad value in config at {}: {msg}", path.display()));
            }
        }
    }

    overrides.apply(&mut opts);
    opts
}

enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Value(String),
}

fn apply_config_from_file(opts: &mut Options, path: &Path) -> std::result::Result<(), ConfigError> {
    let raw = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: FileConfig = toml::from_str(&raw).map_err(ConfigError::Parse)?;

    if let Some(workdir) = config.workdir {
        opts.workdir = PathBuf::from(workdir);
    }
    if let Some(hardlinks) = config.hardlinks {
        opts.hardlinks = hardlinks;
    }
    if let Some(locking) = config.locking {
        opts.lock = locking;
    }
    if let Some(tags) = config.tags {
        if let Some(plan) = tags.plan {
            opts.tags_plan = TagsPlan::parse(&plan).ok_or_else(|| {
                ConfigError::Value(format!("tags.plan expects visited, all or none (got {plan:?})"))
            })?;
        }
        if let Some(lookup) = tags.max_history_lookup {
            if lookup < 1 {
                return Err(ConfigError::Value(
                    "tags.max_history_lookup must be at least 1".to_string(),
                ));
            }
            opts.tags_max_history_lookup = lookup;
        }
    }
    if let Some(push) = config.push {
        if let Some(atomic) = push.atomic {
            opts.atomic_push = atomic;
        }
    }
    Ok(())
}

fn append_list(dest: &mut Vec<String>, value: &str) {
    dest.extend(value.split_whitespace().map(String::from));
}

fn require_value(it: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match it.next() {
        Some(v) => v,
        None => {
            usage_error(&format!("{flag} requires a value"));
        }
    }
}

fn usage_error(msg: &str) -> ! {
    eprintln!("error: {msg}");
    eprintln!("try 'filter-mirror-rs --help'");
    std::process::exit(1);
}

#[derive(Debug, Clone)]
struct HelpOption {
    name: String,
    description: Vec<String>,
}

#[derive(Debug, Clone)]
struct HelpSection {
    title: String,
    options: Vec<HelpOption>,
}

fn help_option(name: &str, description: &[&str]) -> HelpOption {
    HelpOption {
        name: name.to_string(),
        description: description.iter().map(|s| s.to_string()).collect(),
    }
}

fn format_help_section(section: &HelpSection) -> String {
    let max_name_width = section
        .options
        .iter()
        .map(|opt| opt.name.len())
        .max()
        .unwrap_or(0);
    let align_width = (max_name_width + 2).max(30);

    let mut result = String::new();
    result.push_str(&format!("{}\n", section.title));
    for option in &section.options {
        let padding = " ".repeat(align_width - option.name.len());
        result.push_str(&format!(
            "  {}{}{}\n",
            option.name,
            padding,
            option.description.first().map(String::as_str).unwrap_or("")
        ));
        for line in option.description.iter().skip(1) {
            result.push_str(&format!("  {}{}\n", " ".repeat(align_width), line));
        }
    }
    result.push('\n');
    result
}

fn get_help_sections() -> Vec<HelpSection> {
    vec![
        HelpSection {
            title: "Ref selection:".to_string(),
            options: vec![
                help_option(
                    "--branch-whitelist LIST",
                    &[
                        "Space-separated branch names to include (repeatable).",
                        "Prefix an entry with rx: for a regular expression.",
                    ],
                ),
                help_option(
                    "--branch-blacklist LIST",
                    &["Space-separated branch names to exclude (repeatable)."],
                ),
                help_option(
                    "--tag-whitelist LIST",
                    &["Space-separated tag names to include (repeatable)."],
                ),
                help_option(
                    "--tag-blacklist LIST",
                    &["Space-separated tag names to exclude (repeatable)."],
                ),
            ],
        },
        HelpSection {
            title: "Tag handling:".to_string(),
            options: vec![
                help_option(
                    "--tags-plan PLAN",
                    &[
                        "visited: republish tags translated by the rewrite",
                        "all: also map tags onto nearby rewritten ancestors",
                        "none: leave tags alone entirely (default visited)",
                    ],
                ),
                help_option(
                    "--tags-max-history-lookup N",
                    &[
                        "How many ancestors to inspect when mapping a tag",
                        "whose own commit was filtered away (default 50)",
                    ],
                ),
            ],
        },
        HelpSection {
            title: "Destination reconciliation:".to_string(),
            options: vec![
                help_option(
                    "--prune-branches",
                    &["Delete destination branches with no in-scope source branch"],
                ),
                help_option(
                    "--prune-tags",
                    &["Delete destination tags with no in-scope source tag"],
                ),
                help_option("--no-atomic", &["Push destination updates non-atomically"]),
            ],
        },
        HelpSection {
            title: "Execution:".to_string(),
            options: vec![
                help_option(
                    "--workdir DIR",
                    &["Working-area root for mirrors and workers (default ./temp)"],
                ),
                help_option(
                    "--no-hardlinks",
                    &["Do not hardlink objects when cloning local sources"],
                ),
                help_option(
                    "--no-lock",
                    &[
                        "Skip the exclusive-run lock; concurrent runs against",
                        "the same worker become the operator's responsibility",
                    ],
                ),
            ],
        },
        HelpSection {
            title: "Misc:".to_string(),
            options: vec![
                help_option(
                    "--config FILE",
                    &[
                        "Load defaults from a TOML file (default",
                        "./.filter-mirror-rs.toml when present)",
                    ],
                ),
                help_option("--", &["End of options"]),
                help_option("-h, --help", &["Show this help message"]),
            ],
        },
    ]
}

pub fn print_help() {
    println!("filter-mirror-rs");
    println!("Usage: filter-mirror-rs [options] <source> <filter-spec> <destination>");
    println!();
    println!("Incrementally rewrites the history of <source> with the git filter-branch");
    println!("directives in <filter-spec> and publishes the result to <destination>.");
    println!("The filter spec is a single argument, e.g. '--prune-empty --msg-filter cat';");
    println!("since it usually begins with a dash, put -- before the positional arguments.");
    println!();
    for section in get_help_sections() {
        print!("{}", format_help_section(&section));
    }
}
