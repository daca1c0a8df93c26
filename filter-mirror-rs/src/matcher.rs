use regex::Regex;

use crate::error::{MirrorError, Result};

/// One whitelist/blacklist entry: a literal name or an `rx:`-prefixed
/// regular expression, anchored at both ends.
#[derive(Debug, Clone)]
enum RefPattern {
    Literal(String),
    Regex(Regex),
}

impl RefPattern {
    fn parse(entry: &str, list: &str) -> Result<Option<RefPattern>> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Ok(None);
        }
        if let Some(expr) = entry.strip_prefix("rx:") {
            let anchored = format!("^(?:{expr})$");
            let re = Regex::new(&anchored).map_err(|err| {
                MirrorError::usage(format!("invalid regex {expr:?} in {list}: {err}"))
            })?;
            Ok(Some(RefPattern::Regex(re)))
        } else {
            Ok(Some(RefPattern::Literal(entry.to_string())))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            RefPattern::Literal(lit) => lit == name,
            RefPattern::Regex(re) => re.is_match(name),
        }
    }
}

/// Whitelist+blacklist matcher for branch or tag names.
///
/// Blacklist entries take strict precedence; an empty whitelist accepts
/// every name that is not blacklisted.
#[derive(Debug, Clone)]
pub struct RefMatcher {
    whitelist: Vec<RefPattern>,
    blacklist: Vec<RefPattern>,
}

impl RefMatcher {
    pub fn new(whitelist: &[String], blacklist: &[String], kind: &str) -> Result<RefMatcher> {
        let mut wl = Vec::new();
        for entry in whitelist {
            if let Some(p) = RefPattern::parse(entry, &format!("{kind} whitelist"))? {
                wl.push(p);
            }
        }
        let mut bl = Vec::new();
        for entry in blacklist {
            if let Some(p) = RefPattern::parse(entry, &format!("{kind} blacklist"))? {
                bl.push(p);
            }
        }
        Ok(RefMatcher {
            whitelist: wl,
            blacklist: bl,
        })
    }

    pub fn passes(&self, name: &str) -> bool {
        if self.blacklist.iter().any(|p| p.matches(name)) {
            return false;
        }
        if self.whitelist.is_empty() {
            return true;
        }
        self.whitelist.iter().any(|p| p.matches(name))
    }
}
