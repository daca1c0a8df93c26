use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;
use crate::gitutil;
use crate::workdir::WorkArea;

/// Ref carrying the accumulated original→rewritten commit table.
pub const STATE_REF: &str = "refs/filter-branch/state";

/// Namespace (under `refs/tags/`) of rewritten tags.
pub const CONVERTED_TAG_PREFIX: &str = "filter-branch/converted-tags/";

/// Lazily materialized view of the persistent commit mapping.
///
/// The authoritative table lives in the tree of [`STATE_REF`] as
/// `filter.map`; on first lookup it is snapshotted to the transient map
/// file and loaded into memory keyed by original commit id. The snapshot is
/// re-taken per branch because the rewrite engine appends to the state
/// between branches.
pub struct CommitMap {
    entries: Option<HashMap<String, String>>,
}

impl CommitMap {
    pub fn new() -> CommitMap {
        CommitMap { entries: None }
    }

    fn load(&mut self, worker: &Path, snapshot: &Path) -> io::Result<&HashMap<String, String>> {
        if self.entries.is_none() {
            let spec = format!("{STATE_REF}:filter.map");
            let raw = gitutil::try_cat_blob(worker, &spec)?.unwrap_or_default();
            fs::write(snapshot, &raw)?;
            self.entries = Some(parse_map(&raw));
        }
        Ok(self.entries.as_ref().expect("entries loaded above"))
    }
}

/// Parse the newline-delimited `original:rewritten` table. Malformed lines
/// are ignored rather than fatal; the engine owns the file format.
fn parse_map(raw: &[u8]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in String::from_utf8_lossy(raw).lines() {
        if let Some((original, rewritten)) = line.split_once(':') {
            map.insert(original.to_string(), rewritten.to_string());
        }
    }
    map
}

/// Map one tag the rewrite engine left untranslated.
///
/// Walks the tagged commit and its ancestors in date order, up to `depth`
/// commits, and points the converted tag at the first rewritten image
/// found. Returns whether a converted tag was written; an unmappable tag is
/// a warning, not an error.
pub fn map_tag(area: &WorkArea, map: &mut CommitMap, tag: &str, depth: u32) -> Result<bool> {
    let worker = &area.worker_dir;
    let tagged = match gitutil::try_rev_parse(worker, &format!("refs/tags/{tag}^{{commit}}"))? {
        Some(id) => id,
        None => {
            eprintln!("warning: tag {tag:?} does not point at a commit; skipping");
            return Ok(false);
        }
    };
    let entries = map.load(worker, &area.map_snapshot)?;
    let candidates = gitutil::lines(
        worker,
        &["rev-list", "--date-order", "-n", &depth.to_string(), &tagged],
    )?;
    for candidate in &candidates {
        if let Some(rewritten) = entries.get(candidate) {
            gitutil::update_ref(
                worker,
                &format!("refs/tags/{CONVERTED_TAG_PREFIX}{tag}"),
                rewritten,
            )?;
            return Ok(true);
        }
    }
    eprintln!(
        "warning: tag {tag:?} has no rewritten ancestor within {depth} commits; it will not be published"
    );
    Ok(false)
}
