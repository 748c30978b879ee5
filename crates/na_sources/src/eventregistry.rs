use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use na_core::config::{NewsConfig, SortOrder};
use na_core::{Article, ArticleSource, Result, SourceError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Body of an EventRegistry `getArticles` call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetArticlesRequest<'a> {
    action: &'static str,
    keyword: &'a str,
    articles_page: u32,
    articles_count: u32,
    articles_sort_by: &'static str,
    articles_sort_by_asc: bool,
    data_type: [&'static str; 2],
    is_duplicate_filter: &'static str,
    result_type: &'static str,
    article_body_len: i32,
    include_article_body: bool,
    include_article_title: bool,
    include_article_basic_info: bool,
    include_article_image: bool,
    include_article_authors: bool,
    include_article_sentiment: bool,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
    source: Option<RawSource>,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    #[serde(rename = "dateTimePub")]
    date_time_pub: Option<String>,
    date: Option<String>,
    sentiment: Option<f64>,
    authors: Option<Vec<RawAuthor>>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

pub struct EventRegistrySource {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    articles_count: u32,
    sort_by: SortOrder,
}

impl fmt::Debug for EventRegistrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistrySource")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("articles_count", &self.articles_count)
            .field("sort_by", &self.sort_by)
            .finish()
    }
}

impl EventRegistrySource {
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_url: config.api_url.clone(),
            articles_count: config.articles_count,
            sort_by: config.sort_by,
        })
    }

    fn request<'a>(&self, query: &'a str, api_key: &'a str) -> GetArticlesRequest<'a> {
        GetArticlesRequest {
            action: "getArticles",
            keyword: query,
            articles_page: 1,
            articles_count: self.articles_count,
            articles_sort_by: self.sort_by.as_str(),
            articles_sort_by_asc: false,
            data_type: ["news", "pr"],
            is_duplicate_filter: "skipDuplicates",
            result_type: "articles",
            article_body_len: -1,
            include_article_body: true,
            include_article_title: true,
            include_article_basic_info: true,
            include_article_image: true,
            include_article_authors: true,
            include_article_sentiment: true,
            api_key,
        }
    }
}

#[async_trait]
impl ArticleSource for EventRegistrySource {
    fn name(&self) -> &str {
        "EventRegistry"
    }

    async fn search(&self, query: &str) -> std::result::Result<Vec<Article>, SourceError> {
        let api_key = self.api_key.as_deref().ok_or(SourceError::Unconfigured)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(SourceError::EmptyQuery);
        }

        info!("🔎 Searching {} for \"{}\"", self.name(), query);
        let response = self
            .client
            .post(&self.api_url)
            .json(&self.request(query, api_key))
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed {
                status: e.status().map(|s| s.as_u16()),
                body: if e.is_timeout() { format!("request timed out: {}", e) } else { e.to_string() },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SourceError::RequestFailed {
            status: Some(status.as_u16()),
            body: format!("failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            warn!("News API returned {}", status);
            return Err(SourceError::RequestFailed { status: Some(status.as_u16()), body });
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        if let Some(error) = data.get("error").filter(|e| !e.is_null()) {
            let body = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(SourceError::RequestFailed { status: Some(status.as_u16()), body });
        }

        let articles = normalize_response(&data)?;
        info!("📰 Found {} articles", articles.len());
        Ok(articles)
    }
}

/// Maps `articles.results` of a provider response into [`Article`]s,
/// skipping records without a usable title or body.
pub fn normalize_response(data: &Value) -> std::result::Result<Vec<Article>, SourceError> {
    let results = data
        .get("articles")
        .and_then(|a| a.get("results"))
        .and_then(Value::as_array)
        .ok_or(SourceError::NoResults)?;

    let articles: Vec<Article> = results
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value::<RawArticle>(record.clone()) {
            Ok(raw) => {
                let article = normalize_article(raw);
                if article.is_none() {
                    debug!("Skipping record {}: missing title or body", i);
                }
                article
            }
            Err(e) => {
                debug!("Skipping malformed record {}: {}", i, e);
                None
            }
        })
        .collect();

    if articles.is_empty() {
        return Err(SourceError::NoResults);
    }
    Ok(articles)
}

fn normalize_article(raw: RawArticle) -> Option<Article> {
    let title = raw.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
    let content = raw.body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())?;

    let published_at = [raw.date_time, raw.date_time_pub]
        .into_iter()
        .flatten()
        .find_map(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc)))
        .or_else(|| {
            raw.date
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        });

    Some(Article {
        title,
        content,
        source: raw
            .source
            .and_then(|s| s.title)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        url: raw.url.unwrap_or_default(),
        published_at,
        sentiment: raw.sentiment,
        authors: raw
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .collect(),
        image: raw.image.filter(|i| !i.is_empty()),
        relevance_score: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, api_key: Option<&str>) -> NewsConfig {
        NewsConfig {
            api_key: api_key.map(str::to_string),
            api_url: format!("{}/api/v1/article/getArticles", server.uri()),
            articles_count: 5,
            sort_by: SortOrder::Rel,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn record(title: &str, body: &str, url: &str) -> Value {
        json!({
            "title": title,
            "body": body,
            "url": url,
            "source": { "title": "The Daily" },
            "dateTime": "2024-05-01T12:00:00Z",
            "sentiment": 0.2,
            "authors": [{ "name": "Jane Doe" }],
            "image": "http://img"
        })
    }

    #[tokio::test]
    async fn test_search_normalizes_articles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/article/getArticles"))
            .and(body_partial_json(json!({
                "keyword": "visa in the usa",
                "articlesCount": 5,
                "articlesSortBy": "rel",
                "isDuplicateFilter": "skipDuplicates",
                "includeArticleBody": true,
                "apiKey": "key"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "articles": { "results": [
                    record("Visa rules change", "Body one", "http://a"),
                    record("", "No title", "http://b"),
                    { "title": "No body", "url": "http://c" },
                    record("Second", "Body two", "http://d")
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = EventRegistrySource::new(&config(&server, Some("key"))).unwrap();
        let articles = source.search("visa in the usa").await.unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Visa rules change");
        assert_eq!(articles[0].content, "Body one");
        assert_eq!(articles[0].source, "The Daily");
        assert_eq!(articles[0].authors, vec!["Jane Doe".to_string()]);
        assert_eq!(articles[0].sentiment, Some(0.2));
        assert!(articles[0].published_at.is_some());
        assert_eq!(articles[1].url, "http://d");
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let source = EventRegistrySource::new(&config(&server, Some("key"))).unwrap();
        let err = source.search("anything").await.unwrap_err();
        assert_eq!(err, SourceError::RequestFailed { status: Some(500), body: "internal".to_string() });
    }

    #[tokio::test]
    async fn test_empty_results_is_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "articles": { "results": [] } })))
            .mount(&server)
            .await;

        let source = EventRegistrySource::new(&config(&server, Some("key"))).unwrap();
        assert_eq!(source.search("nothing").await.unwrap_err(), SourceError::NoResults);
    }

    #[tokio::test]
    async fn test_provider_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "Invalid API key" })))
            .mount(&server)
            .await;

        let source = EventRegistrySource::new(&config(&server, Some("bad"))).unwrap();
        let err = source.search("anything").await.unwrap_err();
        assert_eq!(err, SourceError::RequestFailed { status: Some(200), body: "Invalid API key".to_string() });
    }

    #[tokio::test]
    async fn test_null_error_field_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": null,
                "articles": { "results": [record("Visa rules change", "Body one", "http://a")] }
            })))
            .mount(&server)
            .await;

        let source = EventRegistrySource::new(&config(&server, Some("key"))).unwrap();
        let articles = source.search("visa").await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "http://a");
    }

    #[tokio::test]
    async fn test_unconfigured_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let source = EventRegistrySource::new(&config(&server, None)).unwrap();
        assert_eq!(source.search("anything").await.unwrap_err(), SourceError::Unconfigured);

        let source = EventRegistrySource::new(&config(&server, Some("key"))).unwrap();
        assert_eq!(source.search("   ").await.unwrap_err(), SourceError::EmptyQuery);
    }

    #[test]
    fn test_missing_results_is_no_results() {
        assert_eq!(normalize_response(&json!({})).unwrap_err(), SourceError::NoResults);
        assert_eq!(
            normalize_response(&json!({ "articles": { "results": [{ "title": "only title" }] } })).unwrap_err(),
            SourceError::NoResults
        );
    }

    #[test]
    fn test_normalize_defaults() {
        let data = json!({ "articles": { "results": [{
            "title": "T",
            "body": "B",
            "date": "2024-02-03",
            "authors": null
        }]}});
        let articles = normalize_response(&data).unwrap();
        assert_eq!(articles[0].source, "Unknown");
        assert!(articles[0].authors.is_empty());
        assert_eq!(articles[0].published_at.unwrap().to_rfc3339(), "2024-02-03T00:00:00+00:00");
    }
}
