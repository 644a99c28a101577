//! Marker-delimited result protocol
//!
//! Several queries can share one remote round trip when each one tags its
//! output lines with a literal marker. Extraction then picks the lines that
//! contain a marker, no matter what banners, warnings or other queries'
//! output surround them.
//!
//! Matching is a heuristic: a marker is chosen to be unlikely in real data
//! (`RESULT_START_<PURPOSE>`, optionally with a random suffix), but payload
//! text containing the marker would be misattributed. Tools that can print
//! JSON should be read through [`super::ResultExtractor::Json`] instead.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::engine::error::ActionError;

pub const TAG_PREFIX: &str = "RESULT_START_";

/// A validated marker tag, safe to embed in SQL literals and shell words
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Marker(String);

impl Marker {
    /// `RESULT_START_<PURPOSE>`, purpose upper-cased
    pub fn new(purpose: &str) -> Result<Self, ActionError> {
        Self::from_tag(format!("{}{}", TAG_PREFIX, purpose.to_ascii_uppercase()))
    }

    /// Like [`Marker::new`] with a random suffix, for output that may echo
    /// fixed markers back
    pub fn unique(purpose: &str) -> Result<Self, ActionError> {
        let nonce = Uuid::new_v4().simple().to_string();
        Self::from_tag(format!(
            "{}{}_{}",
            TAG_PREFIX,
            purpose.to_ascii_uppercase(),
            &nonce[..12]
        ))
    }

    /// Use `tag` verbatim; it must be `[A-Za-z0-9_]+`
    pub fn from_tag(tag: impl Into<String>) -> Result<Self, ActionError> {
        let tag = tag.into();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ActionError::invalid(format!(
                "marker '{}' must be non-empty and contain only letters, digits and underscores",
                tag
            )));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn overlaps(&self, other: &Marker) -> bool {
        self.0.contains(&other.0) || other.0.contains(&self.0)
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One tagged fragment of stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedRecord {
    pub tag: String,
    pub payload: String,
}

/// Prefix every row selected by `query` with a literal marker column
pub fn tag_query(marker: &Marker, query: &str) -> String {
    let query = query.trim().trim_end_matches(';').trim_end();
    format!(
        "SELECT '{}' AS marker, t.* FROM ({}) AS t;",
        marker.as_str(),
        query
    )
}

/// Print `<marker>1` when the shell `check` succeeds, `<marker>0` otherwise
pub fn tag_shell(marker: &Marker, check: &str) -> String {
    format!(
        "if {{ {}; }} >/dev/null 2>&1; then echo '{}1'; else echo '{}0'; fi",
        check,
        marker.as_str(),
        marker.as_str()
    )
}

/// Recover the payload tagged with `tag`
///
/// Every line containing the tag belongs to it. The first occurrence of the
/// tag is removed and the rest trimmed; several lines are joined with `\n`.
/// Returns `None` when no line carries the tag, which is not the same as
/// `Some("")` (the tag was present with an empty payload).
pub fn extract(stdout: &str, tag: &str) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    let matched: Vec<String> = stdout
        .lines()
        .filter(|line| line.contains(tag))
        .map(|line| line.replacen(tag, "", 1).trim().to_string())
        .collect();

    if matched.is_empty() {
        None
    } else {
        Some(matched.join("\n"))
    }
}

/// Everything after the first line that holds `tag` and nothing else
///
/// Used to skip banners printed before a command's own output.
pub fn after_line<'a>(stdout: &'a str, tag: &str) -> Option<&'a str> {
    let mut offset = 0;
    for line in stdout.split_inclusive('\n') {
        offset += line.len();
        if line.trim() == tag {
            return Some(&stdout[offset..]);
        }
    }
    None
}

/// Every tagged line, in output order, attributed to the first marker it
/// contains
pub fn records(stdout: &str, markers: &[Marker]) -> Vec<MarkedRecord> {
    stdout
        .lines()
        .filter_map(|line| {
            markers
                .iter()
                .find(|m| line.contains(m.as_str()))
                .map(|m| MarkedRecord {
                    tag: m.as_str().to_string(),
                    payload: line.replacen(m.as_str(), "", 1).trim().to_string(),
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    Sql,
    Shell,
}

/// Several tagged fragments sent in one remote call
///
/// Markers must be unique and must not contain one another, otherwise a line
/// could be claimed by two entries.
#[derive(Debug, Clone)]
pub struct MarkerBatch {
    kind: BatchKind,
    entries: Vec<(Marker, String)>,
}

impl MarkerBatch {
    /// Batch of SQL queries, one client invocation
    pub fn sql() -> Self {
        Self {
            kind: BatchKind::Sql,
            entries: Vec::new(),
        }
    }

    /// Batch of shell checks, one shell invocation
    pub fn shell() -> Self {
        Self {
            kind: BatchKind::Shell,
            entries: Vec::new(),
        }
    }

    /// Add a query (SQL batch) or a check command (shell batch)
    pub fn add(&mut self, marker: Marker, body: &str) -> Result<&mut Self, ActionError> {
        if let Some((existing, _)) = self.entries.iter().find(|(m, _)| m.overlaps(&marker)) {
            return Err(ActionError::invalid(format!(
                "marker '{}' collides with '{}' in the same batch",
                marker, existing
            )));
        }
        let fragment = match self.kind {
            BatchKind::Sql => tag_query(&marker, body),
            BatchKind::Shell => tag_shell(&marker, body),
        };
        self.entries.push((marker, fragment));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// The combined script to send
    pub fn script(&self) -> String {
        self.entries
            .iter()
            .map(|(_, fragment)| fragment.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Payload per marker; `None` where the marker never appeared
    pub fn extract_all(&self, stdout: &str) -> BTreeMap<Marker, Option<String>> {
        self.entries
            .iter()
            .map(|(m, _)| (m.clone(), extract(stdout, m.as_str())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_new_uppercases() {
        let marker = Marker::new("exists").unwrap();
        assert_eq!(marker.as_str(), "RESULT_START_EXISTS");
    }

    #[test]
    fn test_marker_rejects_quotes() {
        assert!(Marker::from_tag("BAD'TAG").is_err());
        assert!(Marker::from_tag("").is_err());
        assert!(Marker::new("has space").is_err());
    }

    #[test]
    fn test_unique_markers_differ() {
        let a = Marker::unique("count").unwrap();
        let b = Marker::unique("count").unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("RESULT_START_COUNT_"));
    }

    #[test]
    fn test_tag_query_wraps_select() {
        let marker = Marker::new("COUNT").unwrap();
        let sql = tag_query(&marker, "SELECT COUNT(*) FROM users;");
        assert_eq!(
            sql,
            "SELECT 'RESULT_START_COUNT' AS marker, t.* FROM (SELECT COUNT(*) FROM users) AS t;"
        );
    }

    #[test]
    fn test_tag_shell() {
        let marker = Marker::new("MYSQL").unwrap();
        let script = tag_shell(&marker, "command -v 'mysql'");
        assert_eq!(
            script,
            "if { command -v 'mysql'; } >/dev/null 2>&1; then echo 'RESULT_START_MYSQL1'; else echo 'RESULT_START_MYSQL0'; fi"
        );
    }

    #[test]
    fn test_extract_ignores_noise() {
        let stdout = "Welcome to Ubuntu 22.04\nmysql: [Warning] Using a password\nmarker\tcount\nRESULT_START_COUNT\t42\nbye\n";
        assert_eq!(extract(stdout, "RESULT_START_COUNT").as_deref(), Some("42"));
    }

    #[test]
    fn test_extract_absent_vs_empty() {
        assert_eq!(extract("nothing here", "RESULT_START_X"), None);
        assert_eq!(extract("RESULT_START_X\n", "RESULT_START_X").as_deref(), Some(""));
    }

    #[test]
    fn test_extract_multi_line() {
        let stdout = "RESULT_START_DBS\tshop\nnoise\nRESULT_START_DBS\tblog\n";
        assert_eq!(
            extract(stdout, "RESULT_START_DBS").as_deref(),
            Some("shop\nblog")
        );
    }

    #[test]
    fn test_after_line_skips_banner() {
        let stdout = "Welcome to db-1\r\nRESULT_START_TABLE_ab\r\nUser\nroot\n";
        assert_eq!(after_line(stdout, "RESULT_START_TABLE_ab"), Some("User\nroot\n"));
        assert_eq!(after_line("RESULT_START_TABLE_ab", "RESULT_START_TABLE_ab"), Some(""));
        assert_eq!(after_line("x RESULT_START_TABLE_ab\n", "RESULT_START_TABLE_ab"), None);
        assert_eq!(after_line("User\nroot\n", "RESULT_START_TABLE_ab"), None);
    }

    #[test]
    fn test_records_attribute_lines() {
        let a = Marker::new("A").unwrap();
        let b = Marker::new("B").unwrap();
        let stdout = "RESULT_START_A1\nbanner\nRESULT_START_B0\n";
        let recs = records(stdout, &[a, b]);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].tag, "RESULT_START_A");
        assert_eq!(recs[0].payload, "1");
        assert_eq!(recs[1].payload, "0");
    }

    #[test]
    fn test_batch_rejects_overlapping_markers() {
        let mut batch = MarkerBatch::shell();
        batch.add(Marker::new("DB").unwrap(), "true").unwrap();
        let err = batch.add(Marker::new("DB_USERS").unwrap(), "true").unwrap_err();
        assert!(err.to_string().contains("collides"));
        assert!(batch.add(Marker::new("DB").unwrap(), "true").is_err());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_batch_round_trip() {
        let mut batch = MarkerBatch::sql();
        batch
            .add(Marker::new("USERS").unwrap(), "SELECT COUNT(*) FROM users")
            .unwrap()
            .add(Marker::new("ORDERS").unwrap(), "SELECT COUNT(*) FROM orders")
            .unwrap();
        let script = batch.script();
        assert_eq!(script.lines().count(), 2);

        let stdout = "marker\tCOUNT(*)\nRESULT_START_USERS\t3\nmarker\tCOUNT(*)\n";
        let results = batch.extract_all(stdout);
        assert_eq!(
            results[&Marker::new("USERS").unwrap()].as_deref(),
            Some("3")
        );
        assert_eq!(results[&Marker::new("ORDERS").unwrap()], None);
    }
}
