//! Namelist key/value stores and the line-level patcher that applies them.
//!
//! Files are never re-serialized: a patch replaces whole lines whose key
//! matches and leaves every other byte of the file as it was.

use crate::utils::error::{PipelineError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Ordered key to pre-formatted value mapping. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamelistStore {
    entries: Vec<(String, String)>,
}

impl NamelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place when the key exists, appends otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| PipelineError::missing_key(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: &NamelistStore) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// Copy of `self` where keys also present in `overrides` take the
    /// override's value. Keys only in `overrides` are not added.
    pub fn overlay_existing(&self, overrides: &NamelistStore) -> NamelistStore {
        let entries = self
            .entries
            .iter()
            .map(|(k, v)| {
                let value = overrides.get(k).unwrap_or(v);
                (k.clone(), value.to_string())
            })
            .collect();
        NamelistStore { entries }
    }

    /// Entries whose value differs from `base`, or that `base` lacks.
    pub fn changed_since(&self, base: &NamelistStore) -> NamelistStore {
        self.iter()
            .filter(|(k, v)| base.get(k) != Some(*v))
            .collect()
    }

    /// First comma-separated item of a value, unquoted.
    pub fn first_item(&self, key: &str) -> Result<String> {
        list_items(self.require(key)?)
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::invalid_value(key, "", "Value is empty"))
    }

    pub fn items(&self, key: &str) -> Result<Vec<String>> {
        Ok(list_items(self.require(key)?))
    }

    pub fn parse_first<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.first_item(key)?;
        raw.parse()
            .map_err(|_| PipelineError::invalid_value(key, raw.as_str(), "Not a number"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NamelistStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = NamelistStore::new();
        for (k, v) in iter {
            store.insert(k, v);
        }
        store
    }
}

pub fn quoted(value: &str) -> String {
    format!("\"{}\"", value)
}

pub fn join_list<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `value` once per nesting level.
pub fn repeated(value: &str, times: usize) -> String {
    vec![value; times].join(", ")
}

/// Splits a value on commas, dropping empties and surrounding quotes.
pub fn list_items(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_%()]*)\s*=(.*)$").expect("static pattern is valid")
    })
}

fn key_pattern(key: &str) -> Result<Regex> {
    Regex::new(&format!(r"^\s*{}\s*=", regex::escape(key)))
        .map_err(|e| PipelineError::invalid_value("namelist key", key, e.to_string()))
}

/// A namelist file held as raw lines, line endings included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamelistDocument {
    lines: Vec<String>,
}

impl NamelistDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    /// Assignments in file order; the first line for a key wins.
    pub fn store(&self) -> NamelistStore {
        let mut store = NamelistStore::new();
        for line in &self.lines {
            if let Some(caps) = assignment_pattern().captures(line.trim_end_matches(['\r', '\n'])) {
                let key = &caps[1];
                if store.contains_key(key) {
                    continue;
                }
                let value = caps[2]
                    .trim()
                    .trim_end_matches(|c: char| c == ',' || c.is_whitespace());
                store.insert(key, value);
            }
        }
        store
    }

    /// Rewrites every line assigning a key of `store` as ` key = value,`.
    /// Returns the number of replaced lines.
    pub fn apply(&mut self, store: &NamelistStore) -> Result<usize> {
        let patterns = store
            .iter()
            .map(|(k, v)| Ok((key_pattern(k)?, k, v)))
            .collect::<Result<Vec<_>>>()?;

        let mut replaced = 0;
        for line in self.lines.iter_mut() {
            if let Some((_, key, value)) = patterns.iter().find(|(re, _, _)| re.is_match(line)) {
                *line = format!(" {} = {},\n", key, value);
                replaced += 1;
            }
        }
        Ok(replaced)
    }
}

/// Reads `src`, applies `store` and writes the result to `dst`.
pub fn patch_file(src: &Path, dst: &Path, store: &NamelistStore) -> Result<usize> {
    let mut doc = NamelistDocument::load(src)?;
    let replaced = doc.apply(store)?;
    doc.save(dst)?;
    tracing::debug!(
        src = %src.display(),
        dst = %dst.display(),
        keys = store.len(),
        replaced,
        "patched namelist"
    );
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "&share\n wrf_core = 'ARW',\n max_dom = 2,\n! max_dom = 9\n start_date = '2019-09-01_00:00:00','2019-09-01_00:00:00',\n/\n\n&geogrid\n dx  =   12000,\n dxx = 1,\n/\n";

    #[test]
    fn test_store_reads_first_match_and_strips_commas() {
        let doc = NamelistDocument::parse(SAMPLE);
        let store = doc.store();
        assert_eq!(store.get("max_dom"), Some("2"));
        assert_eq!(store.get("dx"), Some("12000"));
        assert_eq!(
            store.first_item("start_date").unwrap(),
            "2019-09-01_00:00:00"
        );
        assert_eq!(store.items("start_date").unwrap().len(), 2);
        assert!(store.get("! max_dom").is_none());
    }

    #[test]
    fn test_apply_preserves_other_lines_verbatim() {
        let mut doc = NamelistDocument::parse(SAMPLE);
        let patch: NamelistStore = [("dx", "6000"), ("not_present", "1")].into_iter().collect();
        assert_eq!(doc.apply(&patch).unwrap(), 1);

        let text = doc.to_text();
        assert!(text.contains(" dx = 6000,\n"));
        assert!(text.contains(" dxx = 1,\n"));
        assert!(text.contains("! max_dom = 9\n"));
        assert!(text.contains(" wrf_core = 'ARW',\n"));
        assert!(!text.contains("not_present"));
        assert_eq!(text.lines().count(), SAMPLE.lines().count());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let patch: NamelistStore = [("max_dom", "3"), ("dx", "9000")].into_iter().collect();
        let mut once = NamelistDocument::parse(SAMPLE);
        once.apply(&patch).unwrap();
        let mut twice = once.clone();
        twice.apply(&patch).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_keys_are_regex_escaped() {
        let mut doc = NamelistDocument::parse(" a.b = 1,\n axb = 2,\n");
        let patch: NamelistStore = [("a.b", "5")].into_iter().collect();
        assert_eq!(doc.apply(&patch).unwrap(), 1);
        assert_eq!(doc.to_text(), " a.b = 5,\n axb = 2,\n");
    }

    #[test]
    fn test_store_insert_and_overlay() {
        let mut template: NamelistStore =
            [("run_days", "0"), ("e_vert", "45"), ("debug_level", "0")]
                .into_iter()
                .collect();
        template.insert("run_days", "1");
        assert_eq!(template.keys().collect::<Vec<_>>(), vec!["run_days", "e_vert", "debug_level"]);

        let derived: NamelistStore = [("e_vert", "33, 33"), ("time_step", "36")].into_iter().collect();
        let merged = template.overlay_existing(&derived);
        assert_eq!(merged.get("e_vert"), Some("33, 33"));
        assert_eq!(merged.get("debug_level"), Some("0"));
        assert!(merged.get("time_step").is_none());
    }

    #[test]
    fn test_changed_since_keeps_only_new_values() {
        let template: NamelistStore = [("run_days", "0"), ("e_vert", "45"), ("restart", ".false.")]
            .into_iter()
            .collect();
        let merged = template.overlay_existing(&[("run_days", "1"), ("e_vert", "45")].into_iter().collect());
        let changed = merged.changed_since(&template);
        assert_eq!(changed.keys().collect::<Vec<_>>(), vec!["run_days"]);
        assert_eq!(changed.get("run_days"), Some("1"));
        assert!(template.changed_since(&template).is_empty());
    }

    #[test]
    fn test_require_names_missing_key() {
        let store = NamelistStore::new();
        match store.require("dx") {
            Err(PipelineError::MissingConfigurationKey { key }) => assert_eq!(key, "dx"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(repeated("\"x\"", 3), "\"x\", \"x\", \"x\"");
        assert_eq!(join_list([1, 2, 3]), "1, 2, 3");
        assert_eq!(quoted("lambert"), "\"lambert\"");
        assert_eq!(list_items("'ERA5A', 'ERA5S', "), vec!["ERA5A", "ERA5S"]);
    }
}
