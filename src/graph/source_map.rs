//! Index of the articles cited in an extraction context.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker that starts every article line of a context.
pub const ARTICLE_MARKER: &str = "From article";

/// Sentinel pmid and url when nothing can be attributed.
pub const UNKNOWN: &str = "unknown";

static PMID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pmid:(\S+)").expect("valid pmid regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"url:(\S+)").expect("valid url regex"));

/// pmid to url, in the order the articles first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: Vec<(String, String)>,
}

impl SourceMap {
    /// Scan `context` line by line for article markers.
    ///
    /// A line counts only when it starts with the marker and carries both a
    /// `pmid:` and a `url:` token. A repeated pmid keeps its first position
    /// and takes the later url.
    pub fn from_context(context: &str) -> Self {
        let mut map = Self::default();
        for line in context.lines() {
            if !line.starts_with(ARTICLE_MARKER) {
                continue;
            }
            let (Some(pmid), Some(url)) = (PMID_RE.captures(line), URL_RE.captures(line)) else {
                continue;
            };
            // context lines read `url:<url>: <title>`
            let url = url[1].trim_end_matches(':');
            map.insert(&pmid[1], url);
        }
        map
    }

    fn insert(&mut self, pmid: &str, url: &str) {
        match self.entries.iter_mut().find(|(id, _)| id == pmid) {
            Some(entry) => entry.1 = url.to_string(),
            None => self.entries.push((pmid.to_string(), url.to_string())),
        }
    }

    pub fn url_for(&self, pmid: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == pmid)
            .map(|(_, url)| url.as_str())
    }

    /// First indexed source, or `unknown` for both when empty.
    pub fn first(&self) -> (&str, &str) {
        self.entries
            .first()
            .map(|(pmid, url)| (pmid.as_str(), url.as_str()))
            .unwrap_or((UNKNOWN, UNKNOWN))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
