//! Extraction context built from search results.

use super::source_map::ARTICLE_MARKER;
use crate::models::DocumentRecord;

/// Records beyond this many are left out of the context.
pub const MAX_CONTEXT_RECORDS: usize = 10;

/// Render up to [`MAX_CONTEXT_RECORDS`] records that have abstracts as
/// `From article pmid:<id> url:<url>: <title>. <abstract>` lines separated
/// by blank lines.
pub fn build_context<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a DocumentRecord>,
{
    records
        .into_iter()
        .filter_map(|record| {
            record.abstract_str().map(|abstract_text| {
                format!(
                    "{} pmid:{} url:{}: {}. {}",
                    ARTICLE_MARKER, record.id, record.url, record.title, abstract_text
                )
            })
        })
        .take(MAX_CONTEXT_RECORDS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SourceMap;

    fn record(id: &str, abstract_text: Option<&str>) -> DocumentRecord {
        DocumentRecord::new(id, format!("Title {id}"), abstract_text.map(String::from), "A B")
    }

    #[test]
    fn renders_marker_lines_for_records_with_abstracts() {
        let records = vec![record("1", Some("First.")), record("2", None), record("3", Some("Third."))];
        let context = build_context(&records);

        assert_eq!(
            context,
            "From article pmid:1 url:https://pubmed.ncbi.nlm.nih.gov/1/: Title 1. First.\n\n\
             From article pmid:3 url:https://pubmed.ncbi.nlm.nih.gov/3/: Title 3. Third."
        );

        let map = SourceMap::from_context(&context);
        assert_eq!(map.first(), ("1", "https://pubmed.ncbi.nlm.nih.gov/1/"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn caps_number_of_records() {
        let records: Vec<_> = (0..25)
            .map(|i| record(&i.to_string(), Some("text")))
            .collect();
        let context = build_context(&records);
        assert_eq!(context.matches(ARTICLE_MARKER).count(), MAX_CONTEXT_RECORDS);
    }
}
