//! Azure AI Search client for vector queries and index uploads

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::config::{NetworkConfig, SearchConfig};
use crate::error::{Error, Result, Stage, UpstreamKind};
use crate::providers::http::{build_client, join_url, parse_json, send_with_retry};
use crate::providers::vector_search::{SearchHit, VectorQuery, VectorSearchProvider};
use crate::types::IndexDocument;

/// Azure AI Search REST client bound to one index
#[derive(Clone)]
pub struct AzureSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    index_name: String,
    api_version: String,
    id_field: String,
    content_field: String,
    title_field: String,
    vector_field: String,
    max_retries: u32,
}

impl fmt::Debug for AzureSearchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSearchClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .finish()
    }
}

#[derive(serde::Deserialize)]
struct SearchResponse {
    value: Vec<Map<String, Value>>,
}

#[derive(serde::Deserialize)]
struct IndexResponse {
    value: Vec<IndexResult>,
}

#[derive(serde::Deserialize)]
struct IndexResult {
    key: String,
    status: bool,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

impl AzureSearchClient {
    /// Create a client from configuration
    pub fn new(config: &SearchConfig, network: &NetworkConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::config("Azure AI Search endpoint is not configured"));
        }
        if config.index_name.trim().is_empty() {
            return Err(Error::config("Azure AI Search index name is not configured"));
        }
        Ok(Self {
            client: build_client(network.request_timeout())?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            index_name: config.index_name.clone(),
            api_version: config.api_version.clone(),
            id_field: config.id_field.clone(),
            content_field: config.content_field.clone(),
            title_field: config.title_field.clone(),
            vector_field: config.vector_field.clone(),
            max_retries: network.max_retries,
        })
    }

    /// Build the default query shape for this index
    pub fn query(&self, vector: Vec<f32>, k: usize) -> VectorQuery {
        VectorQuery {
            vector,
            k,
            vector_field: self.vector_field.clone(),
            select: vec![self.id_field.clone(), self.content_field.clone()],
        }
    }

    fn docs_url(&self, operation: &str) -> String {
        format!(
            "{}?api-version={}",
            join_url(
                &self.endpoint,
                &format!("indexes/{}/docs/{}", self.index_name, operation)
            ),
            self.api_version
        )
    }

    fn string_field(&self, hit: &Map<String, Value>, field: &str) -> Result<String> {
        hit.get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::upstream(
                    Stage::Search,
                    UpstreamKind::MalformedResponse,
                    format!("Search hit is missing field '{}'", field),
                )
            })
    }
}

#[async_trait]
impl VectorSearchProvider for AzureSearchClient {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<SearchHit>> {
        if query.k == 0 {
            return Err(Error::input("k must be at least 1"));
        }

        let url = self.docs_url("search");
        let body = serde_json::json!({
            "search": "",
            "vectorQueries": [{
                "kind": "vector",
                "vector": query.vector,
                "k": query.k,
                "fields": query.vector_field,
            }],
            "select": query.select.join(","),
            "top": query.k,
        });

        let response = send_with_retry(Stage::Search, "azure-search", self.max_retries, || {
            self.client
                .post(&url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let parsed: SearchResponse = parse_json(Stage::Search, "azure-search", response).await?;

        let mut hits = Vec::with_capacity(parsed.value.len().min(query.k));
        for hit in parsed.value.iter().take(query.k) {
            hits.push(SearchHit {
                id: self.string_field(hit, &self.id_field)?,
                content: self.string_field(hit, &self.content_field)?,
                score: hit.get("@search.score").and_then(Value::as_f64),
            });
        }

        tracing::debug!("Search on '{}' returned {} hits", self.index_name, hits.len());
        Ok(hits)
    }

    async fn upload(&self, documents: &[IndexDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let actions: Vec<Value> = documents
            .iter()
            .map(|doc| {
                let mut action = Map::new();
                action.insert("@search.action".to_string(), Value::from("mergeOrUpload"));
                action.insert(self.id_field.clone(), Value::from(doc.id.clone()));
                action.insert(self.content_field.clone(), Value::from(doc.content.clone()));
                action.insert(self.title_field.clone(), Value::from(doc.title.clone()));
                action.insert(self.vector_field.clone(), serde_json::json!(doc.vector));
                Value::Object(action)
            })
            .collect();

        let url = self.docs_url("index");
        let body = serde_json::json!({ "value": actions });

        let response = send_with_retry(Stage::Search, "azure-search", self.max_retries, || {
            self.client
                .post(&url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let parsed: IndexResponse = parse_json(Stage::Search, "azure-search", response).await?;

        let failed: Vec<String> = parsed
            .value
            .iter()
            .filter(|r| !r.status)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.key,
                    r.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        if !failed.is_empty() {
            return Err(Error::upstream(
                Stage::Search,
                UpstreamKind::Rejected,
                format!("{} documents rejected: {}", failed.len(), failed.join("; ")),
            ));
        }

        Ok(parsed.value.len())
    }

    fn name(&self) -> &str {
        "azure-search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AzureSearchClient {
        let config = SearchConfig {
            endpoint: server.uri(),
            api_key: "search-key".to_string(),
            index_name: "sqd-index".to_string(),
            ..SearchConfig::default()
        };
        let network = NetworkConfig {
            request_timeout_secs: 5,
            max_retries: 0,
        };
        AzureSearchClient::new(&config, &network).unwrap()
    }

    #[tokio::test]
    async fn test_search_request_shape_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/sqd-index/docs/search"))
            .and(query_param("api-version", "2023-11-01"))
            .and(header("api-key", "search-key"))
            .and(body_partial_json(serde_json::json!({
                "select": "id,content",
                "vectorQueries": [{ "kind": "vector", "k": 3, "fields": "contentVector" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    { "@search.score": 0.9, "id": "doc1", "content": "Jane Doe is CEO." },
                    { "@search.score": 0.5, "id": "doc7", "content": "Founded 2010." }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let hits = client.search(&client.query(vec![0.1, 0.2], 3)).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "doc1");
        assert_eq!(hits[0].score, Some(0.9));
        assert_eq!(hits[1].content, "Founded 2010.");
    }

    #[tokio::test]
    async fn test_search_truncates_to_k() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    { "id": "a", "content": "1" },
                    { "id": "b", "content": "2" },
                    { "id": "c", "content": "3" }
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let hits = client.search(&client.query(vec![0.0], 2)).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_search_missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{ "id": "a" }]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.search(&client.query(vec![0.0], 3)).await.unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::MalformedResponse));
        assert_eq!(err.stage(), Some(Stage::Search));
    }

    #[tokio::test]
    async fn test_search_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.search(&client.query(vec![0.0], 3)).await.unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::ServiceUnavailable));
    }

    #[tokio::test]
    async fn test_upload_merge_or_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/sqd-index/docs/index"))
            .and(body_partial_json(serde_json::json!({
                "value": [{ "@search.action": "mergeOrUpload", "id": "f-0", "title": "a.md" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{ "key": "f-0", "status": true, "statusCode": 201 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let docs = vec![IndexDocument {
            id: "f-0".to_string(),
            content: "hello".to_string(),
            title: "a.md".to_string(),
            vector: vec![0.5],
        }];
        assert_eq!(client(&server).upload(&docs).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(207).set_body_json(serde_json::json!({
                "value": [
                    { "key": "ok", "status": true },
                    { "key": "bad", "status": false, "errorMessage": "field too long" }
                ]
            })))
            .mount(&server)
            .await;

        let doc = |id: &str| IndexDocument {
            id: id.to_string(),
            content: "x".to_string(),
            title: "t".to_string(),
            vector: vec![0.0],
        };
        let err = client(&server)
            .upload(&[doc("ok"), doc("bad")])
            .await
            .unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::Rejected));
        assert!(err.to_string().contains("field too long"));
    }

    #[test]
    fn test_missing_index_name_is_config_error() {
        let config = SearchConfig {
            endpoint: "https://x".to_string(),
            index_name: String::new(),
            ..SearchConfig::default()
        };
        let err = AzureSearchClient::new(&config, &NetworkConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
