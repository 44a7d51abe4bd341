// src/smarthr.rs
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::http::{ApiClient, ClientError};
use crate::lenient::{de_null_default, de_opt_string};

pub const SMARTHR_PAGE_SIZE: u32 = 100;

// --- SmartHR API Data Structures ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewEmploymentType {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewDepartment {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<Box<CrewDepartment>>,
}

/// One entry of `GET /api/v1/crews`. Every field may be missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Crew {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub emp_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub business_last_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub business_first_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub entered_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub resigned_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub email: Option<String>,
    #[serde(default)]
    pub employment_type: Option<CrewEmploymentType>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub departments: Vec<Option<CrewDepartment>>,
}

// --- Client ---

#[derive(Debug, Clone)]
pub struct SmartHrClient {
    api: ApiClient,
    base_url: Url,
}

impl SmartHrClient {
    pub fn new(subdomain: &str, token: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(&format!("https://{}.smarthr.jp/api/v1/", subdomain.trim()))?;
        Self::with_base_url(base_url, token, timeout)
    }

    pub fn with_base_url(base_url: Url, token: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new("SmartHR", token, timeout)?,
            base_url,
        })
    }

    /// Fetches every crew page, following `Link: <...>; rel="next"` until it
    /// disappears. Pages are requested one at a time.
    pub async fn fetch_all_crews(&self) -> Result<Vec<Option<Crew>>, ClientError> {
        info!("Fetching SmartHR crews (all pages)...");
        let mut url = self.base_url.join("crews")?;
        url.query_pairs_mut()
            .append_pair("per_page", &SMARTHR_PAGE_SIZE.to_string());

        let mut all_crews = Vec::new();
        let mut next = Some(url);
        let mut page = 1;

        while let Some(page_url) = next {
            debug!("Fetching crews page {}", page);
            let response = self
                .api
                .get::<Vec<Option<Crew>>>(page_url, "Get SmartHR Crews")
                .await?;
            let fetched = response.data.len();
            all_crews.extend(response.data);
            next = next_page_url(&response.headers);
            debug!(
                "Fetched {} crews on page {}. More pages: {}",
                fetched,
                page,
                next.is_some()
            );
            page += 1;
        }

        info!("Finished fetching {} total crews.", all_crews.len());
        Ok(all_crews)
    }
}

static NEXT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]+)>\s*;[^,]*\brel\s*=\s*"?next"?"#).expect("valid Link header pattern")
});

/// Extracts the `rel="next"` target from a `Link` header, if any.
pub fn next_page_url(headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            NEXT_LINK
                .captures(value)
                .and_then(|caps| caps.get(1))
                .and_then(|m| Url::parse(m.as_str().trim()).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers_with_link(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(link).unwrap());
        headers
    }

    #[test]
    fn finds_next_link_among_relations() {
        let headers = headers_with_link(
            r#"<https://x.smarthr.jp/api/v1/crews?page=1&per_page=100>; rel="first", <https://x.smarthr.jp/api/v1/crews?page=2&per_page=100>; rel="next", <https://x.smarthr.jp/api/v1/crews?page=9&per_page=100>; rel="last""#,
        );
        let next = next_page_url(&headers).unwrap();
        assert_eq!(next.as_str(), "https://x.smarthr.jp/api/v1/crews?page=2&per_page=100");
    }

    #[test]
    fn no_next_link_ends_pagination() {
        let headers = headers_with_link(r#"<https://x.smarthr.jp/api/v1/crews?page=1>; rel="first""#);
        assert!(next_page_url(&headers).is_none());
        assert!(next_page_url(&HeaderMap::new()).is_none());
    }

    #[test]
    fn crew_with_nulls_deserializes() {
        let crews: Vec<Option<Crew>> = serde_json::from_str(
            r#"[null, {"emp_code": 42, "departments": null, "employment_type": null,
                "business_last_name": null}]"#,
        )
        .unwrap();
        assert!(crews[0].is_none());
        let crew = crews[1].as_ref().unwrap();
        assert_eq!(crew.emp_code.as_deref(), Some("42"));
        assert!(crew.departments.is_empty());
        assert!(crew.employment_type.is_none());
    }

    #[tokio::test]
    async fn follows_next_links_until_absent() {
        let server = MockServer::start().await;
        let page2 = format!("{}/api/v1/crews?page=2&per_page=100", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/v1/crews"))
            .and(query_param("page", "2"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"emp_code": "B"}])),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/crews"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{}>; rel=\"next\"", page2).as_str())
                    .set_body_json(serde_json::json!([{"emp_code": "A"}, null])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
        let client = SmartHrClient::with_base_url(base, "secret", Duration::from_secs(5)).unwrap();
        let crews = client.fetch_all_crews().await.unwrap();

        let codes: Vec<_> = crews
            .iter()
            .map(|c| c.as_ref().and_then(|c| c.emp_code.clone()))
            .collect();
        assert_eq!(codes, vec![Some("A".into()), None, Some("B".into())]);
    }

    #[tokio::test]
    async fn error_status_aborts_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
        let client = SmartHrClient::with_base_url(base, "bad", Duration::from_secs(5)).unwrap();
        match client.fetch_all_crews().await {
            Err(ClientError::ApiError { status, body, .. }) => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "invalid token");
            }
            other => panic!("Expected ApiError but got: {:?}", other),
        }
    }
}
