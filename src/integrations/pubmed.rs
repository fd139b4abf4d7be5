//! PubMed E-utilities client (ESearch + EFetch).

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::RecordSource;
use crate::config::{self, Config};
use crate::models::{DocumentRecord, NO_AUTHORS, NO_TITLE};
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// PubMed client.
#[derive(Debug, Clone)]
pub struct PubMedClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    batch_size: usize,
    politeness_delay: Duration,
}

impl PubMedClient {
    /// Client against the public E-utilities endpoint with default tuning.
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: build_http(Duration::from_secs(config::REQUEST_TIMEOUT_SECS))?,
            base_url: config::PUBMED_API_BASE_URL.to_string(),
            api_key: None,
            retry: RetryPolicy::default(),
            batch_size: config::FETCH_BATCH_SIZE,
            politeness_delay: Duration::from_millis(config::POLITENESS_DELAY_MS),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            http: build_http(config.request_timeout)?,
            base_url: config.pubmed_base_url.trim_end_matches('/').to_string(),
            api_key: Some(config.pubmed_api_key.clone()).filter(|k| !k.trim().is_empty()),
            retry: config.retry,
            batch_size: config.fetch_batch_size.max(1),
            politeness_delay: config.politeness_delay,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into()).filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    async fn get_once(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        let response = self.http.get(url).query(params).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get(&self, endpoint: &str, mut params: Vec<(&str, String)>) -> Result<String> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        let url = format!("{}/{}", self.base_url, endpoint);

        self.retry
            .run(endpoint, || self.get_once(&url, &params))
            .await
    }

    /// ESearch: ids for a query plus the total match count.
    pub async fn search_ids(&self, query: &str, max_count: usize) -> Result<(Vec<String>, u64)> {
        let params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", max_count.to_string()),
            ("usehistory", "y".to_string()),
            ("format", "json".to_string()),
        ];

        let body = self.get("esearch.fcgi", params).await?;
        let response: ESearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("Invalid ESearch response: {}", e)))?;

        let result = response.esearchresult.unwrap_or_default();
        let total = match result.count.as_deref() {
            None => 0,
            Some(count) => count
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Parse(format!("Invalid ESearch count {:?}: {}", count, e)))?,
        };

        Ok((result.idlist, total))
    }

    /// EFetch one page of ids.
    pub async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<DocumentRecord>> {
        let params = vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];

        let body = self.get("efetch.fcgi", params).await?;
        parse_efetch_xml(&body)
    }
}

#[async_trait]
impl RecordSource for PubMedClient {
    async fn find_ids(&self, query: &str, max_count: usize) -> (Vec<String>, u64) {
        match self.search_ids(query, max_count).await {
            Ok((ids, total)) => {
                info!(query, ids = ids.len(), total, "PubMed search");
                (ids, total)
            }
            Err(err) => {
                warn!(query, "Failed to fetch article IDs from PubMed: {}", err);
                (Vec::new(), 0)
            }
        }
    }

    async fn fetch_details(&self, ids: &[String]) -> Vec<DocumentRecord> {
        let mut records = Vec::with_capacity(ids.len());

        for (page, batch) in ids.chunks(self.batch_size).enumerate() {
            if page > 0 {
                tokio::time::sleep(self.politeness_delay).await;
            }
            debug!(page, size = batch.len(), "PubMed efetch page");

            match self.fetch_batch(batch).await {
                Ok(mut fetched) => records.append(&mut fetched),
                Err(err) => warn!(page, "Error fetching article details batch: {}", err),
            }
        }

        records
    }
}

fn build_http(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent("pubmed_search/0.1.0")
        .timeout(timeout)
        .build()
        .map_err(|e| Error::NotConfigured(format!("HTTP client error: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: Option<ESearchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct ESearchResult {
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Title,
    Abstract,
    ForeName,
    LastName,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"PMID" => Some(Field::Pmid),
            b"ArticleTitle" => Some(Field::Title),
            b"AbstractText" => Some(Field::Abstract),
            b"ForeName" => Some(Field::ForeName),
            b"LastName" => Some(Field::LastName),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct AuthorBuilder {
    fore_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: Option<String>,
    abstract_text: Option<String>,
    authors: Vec<String>,
}

impl ArticleBuilder {
    /// First occurrence wins, matching a first-descendant lookup.
    fn wants(&self, field: Field, author: Option<&AuthorBuilder>) -> bool {
        match field {
            Field::Pmid => self.pmid.is_none(),
            Field::Title => self.title.is_none(),
            Field::Abstract => self.abstract_text.is_none(),
            Field::ForeName => author.is_some_and(|a| a.fore_name.is_none()),
            Field::LastName => author.is_some_and(|a| a.last_name.is_none()),
        }
    }

    fn store(&mut self, field: Field, text: String, author: Option<&mut AuthorBuilder>) {
        let text = text.trim().to_string();
        match (field, author) {
            (Field::Pmid, _) => self.pmid = Some(text),
            (Field::Title, _) => self.title = Some(text),
            (Field::Abstract, _) => self.abstract_text = Some(text),
            (Field::ForeName, Some(a)) => a.fore_name = Some(text),
            (Field::LastName, Some(a)) => a.last_name = Some(text),
            _ => {}
        }
    }

    fn push_author(&mut self, author: AuthorBuilder) {
        if let (Some(fore), Some(last)) = (author.fore_name, author.last_name) {
            self.authors.push(format!("{} {}", fore, last));
        }
    }

    /// `None` when the article carries no PMID.
    fn build(self) -> Option<DocumentRecord> {
        let pmid = self.pmid.filter(|id| !id.is_empty())?;
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());
        let authors = if self.authors.is_empty() {
            NO_AUTHORS.to_string()
        } else {
            self.authors.join(", ")
        };
        Some(DocumentRecord::new(
            pmid,
            title,
            self.abstract_text,
            authors,
        ))
    }
}

/// Map an EFetch `PubmedArticleSet` document to records.
pub fn parse_efetch_xml(xml: &str) -> Result<Vec<DocumentRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    let mut article: Option<ArticleBuilder> = None;
    let mut author: Option<AuthorBuilder> = None;
    let mut capture: Option<(Field, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"PubmedArticle" => {
                        article = Some(ArticleBuilder::default());
                        author = None;
                        capture = None;
                    }
                    b"Author" if article.is_some() => author = Some(AuthorBuilder::default()),
                    tag => {
                        let idle = capture.is_none();
                        if let (true, Some(field), Some(current)) =
                            (idle, Field::from_tag(tag), article.as_ref())
                        {
                            if current.wants(field, author.as_ref()) {
                                capture = Some((field, String::new()));
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::Parse(format!("Invalid EFetch text: {}", e)))?;
                    buf.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"PubmedArticle" => {
                        match article.take().map(ArticleBuilder::build) {
                            Some(Some(record)) => records.push(record),
                            Some(None) => debug!("Skipping PubmedArticle without PMID"),
                            None => {}
                        }
                    }
                    b"Author" => {
                        if let (Some(current), Some(done)) = (article.as_mut(), author.take()) {
                            current.push_author(done);
                        }
                    }
                    tag => {
                        let closes = matches!(
                            &capture,
                            Some((field, _)) if Field::from_tag(tag) == Some(*field)
                        );
                        if closes {
                            if let (Some((field, text)), Some(current)) =
                                (capture.take(), article.as_mut())
                            {
                                current.store(field, text, author.as_mut());
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Parse(format!(
                    "Invalid EFetch XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(records)
}
