//! PubMed-backed news cache.
//!
//! The cache starts empty (`None`), is filled once at startup and then on a
//! fixed interval. A failed refresh leaves the previous articles in place.

use crate::config::NewsConfig;
use crate::error::app_error::AppError;
use crate::models::news::Article;
use regex::Regex;
use rocket::fairing::AdHoc;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>")).expect("valid tag pattern")
}

static ARTICLE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("PubmedArticle"));
static PMID: LazyLock<Regex> = LazyLock::new(|| tag_pattern("PMID"));
static ARTICLE_TITLE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("ArticleTitle"));
static JOURNAL_TITLE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Title"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Year"));
static MONTH: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Month"));
static DAY: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Day"));
static LAST_NAME: LazyLock<Regex> = LazyLock::new(|| tag_pattern("LastName"));
static INITIALS: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Initials"));
static ABSTRACT_TEXT: LazyLock<Regex> = LazyLock::new(|| tag_pattern("AbstractText"));
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid markup pattern"));

#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    esearchresult: Option<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

fn first(block: &str, pattern: &Regex) -> String {
    pattern
        .captures(block)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn decode_entities(value: &str) -> String {
    value.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

fn parse_article(block: &str) -> Option<Article> {
    let id = first(block, &PMID);
    let title = first(block, &ARTICLE_TITLE);
    if id.is_empty() || title.is_empty() {
        return None;
    }

    let or_default = |value: String| if value.is_empty() { "01".to_string() } else { value };
    let date = format!("{}-{}-{}", first(block, &YEAR), or_default(first(block, &MONTH)), or_default(first(block, &DAY)));

    let last_name = first(block, &LAST_NAME);
    let initials = first(block, &INITIALS);
    let author = if last_name.is_empty() || initials.is_empty() {
        "Unknown Author".to_string()
    } else {
        format!("{} {}", last_name, initials)
    };

    let r#abstract = ABSTRACT_TEXT
        .captures_iter(block)
        .filter_map(|captures| captures.get(1))
        .map(|m| MARKUP.replace_all(m.as_str(), "").into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    Some(Article {
        url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id),
        id,
        title: decode_entities(&title),
        journal: decode_entities(&first(block, &JOURNAL_TITLE)),
        date,
        author,
        r#abstract: decode_entities(&r#abstract),
    })
}

/// Extracts articles from an `efetch` XML document. Articles without an id
/// or title are dropped.
pub fn parse_articles(xml: &str) -> Vec<Article> {
    ARTICLE
        .captures_iter(xml)
        .filter_map(|captures| captures.get(1))
        .filter_map(|m| parse_article(m.as_str()))
        .collect()
}

pub struct NewsCache {
    articles: RwLock<Option<Vec<Article>>>,
}

impl NewsCache {
    pub fn new() -> Self {
        Self { articles: RwLock::new(None) }
    }

    pub async fn articles(&self) -> Option<Vec<Article>> {
        self.articles.read().await.clone()
    }

    async fn replace(&self, articles: Vec<Article>) {
        *self.articles.write().await = Some(articles);
    }
}

impl Default for NewsCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NewsClient {
    http: reqwest::Client,
    config: NewsConfig,
}

impl NewsClient {
    pub fn new(http: reqwest::Client, config: NewsConfig) -> Self {
        Self { http, config }
    }

    fn search_url(&self) -> String {
        format!(
            "{}/esearch.fcgi?db=pubmed&term={}&reldate={}&retmode=json&retmax={}&sort=date",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.search_term),
            self.config.reldate_days,
            self.config.max_results
        )
    }

    fn fetch_url(&self, ids: &[String]) -> String {
        format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&ids.join(","))
        )
    }

    pub async fn fetch_articles(&self) -> Result<Vec<Article>, AppError> {
        let response = self.http.get(self.search_url()).send().await?;
        if !response.status().is_success() {
            return Err(AppError::dependency(format!("PubMed search returned {}", response.status()), None));
        }
        let ids = response.json::<SearchReply>().await?.esearchresult.map(|r| r.idlist).unwrap_or_default();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.http.get(self.fetch_url(&ids)).send().await?;
        if !response.status().is_success() {
            return Err(AppError::dependency(format!("PubMed fetch returned {}", response.status()), None));
        }
        Ok(parse_articles(&response.text().await?))
    }

    pub async fn refresh(&self, cache: &NewsCache) {
        match self.fetch_articles().await {
            Ok(articles) => {
                info!(count = articles.len(), "News cache refreshed");
                cache.replace(articles).await;
            }
            Err(err) => error!(error = ?err, "News cache refresh failed; keeping previous articles"),
        }
    }
}

/// Manages the news cache and, when enabled, spawns the refresh loop.
pub fn stage_news(config: NewsConfig, http: reqwest::Client) -> AdHoc {
    AdHoc::on_ignite("News cache", move |rocket| async move {
        let cache = Arc::new(NewsCache::new());
        if config.enabled {
            let interval = Duration::from_secs(config.refresh_interval_seconds.max(60));
            let client = NewsClient::new(http, config);
            let cache = cache.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    client.refresh(&cache).await;
                }
            });
        }
        rocket.manage(cache)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
<PubmedArticle>
  <MedlineCitation Status="PubMed-not-MEDLINE" Owner="NLM">
    <PMID Version="1">39000001</PMID>
    <Article PubModel="Print-Electronic">
      <Journal>
        <JournalIssue CitedMedium="Internet">
          <PubDate><Year>2024</Year><Month>Mar</Month></PubDate>
        </JournalIssue>
        <Title>Ophthalmology &amp; Vision</Title>
      </Journal>
      <ArticleTitle>Low-dose atropine for myopia control &lt;a trial&gt;</ArticleTitle>
      <Abstract>
        <AbstractText Label="PURPOSE">To assess <i>atropine</i>.</AbstractText>
        <AbstractText Label="RESULTS">Axial length slowed.</AbstractText>
      </Abstract>
      <AuthorList>
        <Author><LastName>Kim</LastName><ForeName>Jisoo</ForeName><Initials>J</Initials></Author>
        <Author><LastName>Park</LastName><Initials>H</Initials></Author>
      </AuthorList>
    </Article>
  </MedlineCitation>
</PubmedArticle>
<PubmedArticle>
  <MedlineCitation>
    <PMID Version="1">39000002</PMID>
    <Article><ArticleTitle>Orthokeratology outcomes</ArticleTitle></Article>
  </MedlineCitation>
</PubmedArticle>
<PubmedArticle>
  <MedlineCitation><Article><ArticleTitle>No identifier</ArticleTitle></Article></MedlineCitation>
</PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_complete_article() {
        let articles = parse_articles(SAMPLE);
        let article = &articles[0];
        assert_eq!(article.id, "39000001");
        assert_eq!(article.title, "Low-dose atropine for myopia control <a trial>");
        assert_eq!(article.journal, "Ophthalmology & Vision");
        assert_eq!(article.date, "2024-Mar-01");
        assert_eq!(article.author, "Kim J");
        assert_eq!(article.r#abstract, "To assess atropine. Axial length slowed.");
        assert_eq!(article.url, "https://pubmed.ncbi.nlm.nih.gov/39000001/");
    }

    #[test]
    fn sparse_article_gets_defaults_and_unidentified_is_dropped() {
        let articles = parse_articles(SAMPLE);
        assert_eq!(articles.len(), 2);
        let sparse = &articles[1];
        assert_eq!(sparse.author, "Unknown Author");
        assert_eq!(sparse.date, "-01-01");
        assert_eq!(sparse.r#abstract, "");
    }

    #[test]
    fn search_url_encodes_term() {
        let client = NewsClient::new(reqwest::Client::new(), NewsConfig::default());
        let url = client.search_url();
        assert!(url.starts_with("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?db=pubmed&term=myopia%5BTitle%5D"));
        assert!(url.ends_with("&reldate=180&retmode=json&retmax=10&sort=date"));
    }

    #[rocket::async_test]
    async fn failed_refresh_keeps_previous_articles() {
        let cache = NewsCache::new();
        assert_eq!(cache.articles().await, None);

        let previous = parse_articles(SAMPLE);
        cache.replace(previous.clone()).await;

        let config = NewsConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..NewsConfig::default()
        };
        NewsClient::new(reqwest::Client::new(), config).refresh(&cache).await;
        assert_eq!(cache.articles().await, Some(previous));
    }
}
