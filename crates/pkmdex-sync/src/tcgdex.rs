//! HTTP client for the TCGdex REST API.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use pkmdex_core::model::{CardId, Language, SetInfo};

use crate::catalog::{CardCatalog, CatalogCard};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::resilience::{retry_policy, RateLimiter};

const SOURCE_NAME: &str = "tcgdex";

/// TCGdex API client.
///
/// Every request goes through the rate limiter and is retried with
/// exponential backoff when the failure is transient.
#[derive(Debug, Clone)]
pub struct TcgdexClient {
    http: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    retries: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSet {
    id: String,
    name: String,
    card_count: Option<RawCardCount>,
    release_date: Option<String>,
    serie: Option<RawSerie>,
}

#[derive(Debug, Deserialize)]
struct RawCardCount {
    total: Option<u32>,
    official: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawSerie {
    id: Option<String>,
    name: Option<String>,
}

impl From<RawSet> for SetInfo {
    fn from(raw: RawSet) -> Self {
        let (serie_id, serie_name) = raw
            .serie
            .map_or((None, None), |serie| (serie.id, serie.name));
        Self {
            set_id: raw.id,
            name: raw.name,
            card_count: raw
                .card_count
                .and_then(|count| count.total.or(count.official))
                .unwrap_or(0),
            release_date: raw.release_date,
            serie_id,
            serie_name,
            cached_at: Utc::now(),
        }
    }
}

impl TcgdexClient {
    /// Create a client from the loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &Config) -> SyncResult<Self> {
        Self::with_options(
            &config.api_base_url,
            config.request_timeout(),
            config.requests_per_second,
            config.retry_attempts,
        )
    }

    /// Create a client against an explicit base URL.
    pub fn with_options(
        base_url: &str,
        timeout: Duration,
        requests_per_second: u32,
        retries: usize,
    ) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                "pkmdex/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/pkmdex/pkmdex)"
            ))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(requests_per_second),
            retries,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url` and return the body, retrying transient failures.
    async fn get_text(&self, url: &str, entity: &str) -> SyncResult<String> {
        (|| async move { self.get_once(url, entity).await })
            .retry(retry_policy(self.retries))
            .when(SyncError::is_transient)
            .notify(|err: &SyncError, delay: Duration| {
                log::warn!("Retrying {} in {:?}: {}", url, delay, err);
            })
            .await
    }

    async fn get_once(&self, url: &str, entity: &str) -> SyncResult<String> {
        self.rate_limiter.acquire().await;
        log::debug!("GET {}", url);

        let response = self.http.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound {
                entity: entity.to_string(),
                source_name: SOURCE_NAME.to_string(),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::RateLimited {
                source_name: SOURCE_NAME.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Http {
                source_name: SOURCE_NAME.to_string(),
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(response.text().await?)
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> SyncResult<T> {
        serde_json::from_str(body).map_err(|e| SyncError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CardCatalog for TcgdexClient {
    async fn fetch_card(&self, language: Language, card_id: &CardId) -> SyncResult<CatalogCard> {
        let url = format!("{}/{}/cards/{}", self.base_url, language.code(), card_id);
        let entity = format!("card {card_id} ({language})");
        let body = self.get_text(&url, &entity).await?;
        CatalogCard::from_json(SOURCE_NAME, &body, language, Some(card_id))
    }

    async fn list_sets(&self, language: Language) -> SyncResult<Vec<SetInfo>> {
        let url = format!("{}/{}/sets", self.base_url, language.code());
        let body = self.get_text(&url, "set list").await?;
        let raw: Vec<RawSet> = Self::parse(&body)?;
        Ok(raw.into_iter().map(SetInfo::from).collect())
    }

    async fn fetch_set(&self, language: Language, set_id: &str) -> SyncResult<SetInfo> {
        let url = format!("{}/{}/sets/{}", self.base_url, language.code(), set_id);
        let entity = format!("set {set_id}");
        let body = self.get_text(&url, &entity).await?;
        let raw: RawSet = Self::parse(&body)?;
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::card_json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> TcgdexClient {
        TcgdexClient::with_options(uri, Duration::from_secs(5), 0, 1).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = TcgdexClient::new(&Config::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.tcgdex.net/v2");
    }

    #[tokio::test]
    async fn test_fetch_card() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/de/cards/me01-136"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(card_json("me01-136", "Bisasam")),
            )
            .mount(&server)
            .await;

        let id = CardId::parse("me01-136").unwrap();
        let card = client(&server.uri())
            .fetch_card(Language::German, &id)
            .await
            .unwrap();
        assert_eq!(card.name, "Bisasam");
        assert_eq!(card.language, Language::German);
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let id = CardId::parse("me01-999").unwrap();
        let err = client(&server.uri())
            .fetch_card(Language::English, &id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let id = CardId::parse("me01-136").unwrap();
        let err = client(&server.uri())
            .fetch_card(Language::English, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_invalid_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"id": "me01-136"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = CardId::parse("me01-136").unwrap();
        let err = client(&server.uri())
            .fetch_card(Language::English, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_list_and_fetch_sets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/sets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "me01", "name": "Mega Evolution", "cardCount": {"total": 188, "official": 132}},
                {"id": "sv01", "name": "Scarlet & Violet", "cardCount": {"official": 198}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en/sets/me01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "me01",
                "name": "Mega Evolution",
                "cardCount": {"total": 188},
                "releaseDate": "2025-09-26",
                "serie": {"id": "me", "name": "Mega Evolution"}
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let sets = client.list_sets(Language::English).await.unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].card_count, 198);

        let set = client.fetch_set(Language::English, "me01").await.unwrap();
        assert_eq!(set.release_date.as_deref(), Some("2025-09-26"));
        assert_eq!(set.serie_id.as_deref(), Some("me"));
    }
}
