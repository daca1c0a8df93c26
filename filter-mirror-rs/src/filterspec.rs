use crate::error::{MirrorError, Result};

/// A validated rewrite-filter spec: the ordered engine directives exactly as
/// the user supplied them.
///
/// Validation is purely structural. The filter *commands* are opaque shell
/// fragments interpreted by the rewrite engine; only the directive shapes
/// are checked here, before any repository is touched.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    args: Vec<String>,
}

impl FilterSpec {
    pub fn parse(tokens: &[String]) -> Result<FilterSpec> {
        let tokens: Vec<&String> = tokens.iter().filter(|t| !t.trim().is_empty()).collect();
        if tokens.is_empty() {
            return Err(MirrorError::InvalidFilter(
                "the filter spec is empty".to_string(),
            ));
        }
        let mut it = tokens.iter();
        while let Some(tok) = it.next() {
            match tok.as_str() {
                "--prune-empty" => {}
                "--tag-name-filter" => {
                    return Err(MirrorError::InvalidFilter(
                        "--tag-name-filter is not allowed; tag names are managed automatically"
                            .to_string(),
                    ));
                }
                "--setup" => {
                    if it.next().is_none() {
                        return Err(MirrorError::InvalidFilter(
                            "--setup requires an argument".to_string(),
                        ));
                    }
                }
                other if is_phase_filter(other) => {
                    if it.next().is_none() {
                        return Err(MirrorError::InvalidFilter(format!(
                            "{other} requires an argument"
                        )));
                    }
                }
                other => {
                    return Err(MirrorError::InvalidFilter(format!(
                        "unrecognized filter directive {other:?}"
                    )));
                }
            }
        }
        Ok(FilterSpec {
            args: tokens.into_iter().cloned().collect(),
        })
    }

    /// The directives to splice into the rewrite engine command line.
    pub fn engine_args(&self) -> &[String] {
        &self.args
    }
}

/// Split a raw filter-spec string into directives the way a shell would:
/// whitespace separates tokens, single and double quotes group, backslash
/// escapes outside single quotes. Filter commands routinely contain spaces
/// (`--index-filter 'git rm --cached …'`), so plain whitespace splitting is
/// not enough.
pub fn tokenize(spec: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = spec.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            Some(_) => {
                if c == '"' {
                    quote = None;
                } else if c == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else {
                    current.push(c);
                }
            }
            None => {
                if c.is_whitespace() {
                    if in_word {
                        tokens.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                } else if c == '\'' || c == '"' {
                    quote = Some(c);
                    in_word = true;
                } else if c == '\\' {
                    in_word = true;
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else {
                    current.push(c);
                    in_word = true;
                }
            }
        }
    }
    if in_word {
        tokens.push(current);
    }
    tokens
}

/// `--<phase>-filter` for any non-empty phase name except the reserved
/// tag-name phase.
fn is_phase_filter(token: &str) -> bool {
    let Some(inner) = token
        .strip_prefix("--")
        .and_then(|t| t.strip_suffix("-filter"))
    else {
        return false;
    };
    !inner.is_empty() && inner != "tag-name"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;

    fn parse(tokens: &[&str]) -> Result<FilterSpec> {
        let owned: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        FilterSpec::parse(&owned)
    }

    #[test]
    fn accepts_prune_empty_alone() {
        let spec = parse(&["--prune-empty"]).expect("valid");
        assert_eq!(spec.engine_args(), ["--prune-empty"]);
    }

    #[test]
    fn accepts_phase_filters_with_arguments() {
        let spec = parse(&[
            "--index-filter",
            "git rm --cached --ignore-unmatch -r -q secret",
            "--msg-filter",
            "cat",
            "--prune-empty",
        ])
        .expect("valid");
        assert_eq!(spec.engine_args().len(), 5);
    }

    #[test]
    fn accepts_setup_with_argument() {
        assert!(parse(&["--setup", "export FOO=1", "--env-filter", "true"]).is_ok());
    }

    #[test]
    fn rejects_empty_spec() {
        let err = parse(&[]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
        let err = parse(&["", "  "]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
    }

    #[test]
    fn rejects_tag_name_filter() {
        let err = parse(&["--tag-name-filter", "cat"]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
    }

    #[test]
    fn rejects_missing_argument() {
        let err = parse(&["--msg-filter"]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
        let err = parse(&["--prune-empty", "--setup"]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
    }

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(
            tokenize("--prune-empty  --msg-filter cat"),
            vec!["--prune-empty", "--msg-filter", "cat"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn tokenize_honors_quotes() {
        assert_eq!(
            tokenize("--index-filter 'git rm --cached -r -q --ignore-unmatch drop'"),
            vec!["--index-filter", "git rm --cached -r -q --ignore-unmatch drop"]
        );
        assert_eq!(
            tokenize("--msg-filter \"sed -e 's/a/b/'\""),
            vec!["--msg-filter", "sed -e 's/a/b/'"]
        );
    }

    #[test]
    fn tokenize_honors_escapes() {
        assert_eq!(tokenize(r"--msg-filter sed\ s/a/b/"), vec![
            "--msg-filter",
            "sed s/a/b/"
        ]);
    }

    #[test]
    fn rejects_unknown_tokens() {
        let err = parse(&["--force"]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
        let err = parse(&["cat"]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
        let err = parse(&["---filter", "x"]).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidFilter(_)));
    }
}
