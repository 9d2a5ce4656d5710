//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchEngineClient`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::Refresh,
    BulkParts, DeleteParts, GetParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::{RefreshPolicy, SearchEngineConfig};
use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::opensearch::index_config::get_index_settings;
use crate::opensearch::pool::RoundRobinConnectionPool;
use crate::opensearch::queries::build_search_query;
use crate::types::{BatchOperationResult, BatchOperationSummary, IndexRequest};
use post_search_shared::{Document, SearchHit, SearchQuery, SearchResponse};

/// OpenSearch client implementation.
///
/// Provides full-text search capabilities using OpenSearch as the backend.
///
/// # Example
///
/// ```ignore
/// use post_search_repository::{OpenSearchClient, SearchEngineConfig};
/// let config = SearchEngineConfig::with_hosts(["http://localhost:9200"]);
/// let client = OpenSearchClient::new(config)?;
///
/// let document = Document::new()
///     .with_field("name", "Hello")
///     .with_field("content", "World");
/// // Creates the document, or replaces it if it already exists
/// client.index_document("posts", "1", &document).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    config: SearchEngineConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client for the configured hosts.
    ///
    /// A single host uses a single-node connection pool; several hosts are
    /// used round-robin.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchError)` - If no host is configured, a host is not a valid URL,
    ///   or the transport cannot be built
    pub fn new(config: SearchEngineConfig) -> Result<Self, SearchError> {
        let mut urls = config
            .hosts
            .iter()
            .map(|host| {
                Url::parse(host)
                    .map_err(|e| SearchError::connection(format!("Invalid host {}: {}", host, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let builder = match urls.len() {
            0 => return Err(SearchError::connection("No search hosts configured")),
            1 => TransportBuilder::new(SingleNodeConnectionPool::new(urls.remove(0))),
            _ => match RoundRobinConnectionPool::new(urls) {
                Some(pool) => TransportBuilder::new(pool),
                None => return Err(SearchError::connection("No search hosts configured")),
            },
        };

        let transport = builder
            .disable_proxy()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        info!(
            hosts = ?config.hosts,
            refresh = ?config.refresh,
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
            config,
        })
    }

    fn refresh(&self) -> Option<Refresh> {
        match self.config.refresh {
            RefreshPolicy::None => None,
            RefreshPolicy::WaitFor => Some(Refresh::WaitFor),
            RefreshPolicy::Immediate => Some(Refresh::True),
        }
    }

    /// Parse a single search hit.
    ///
    /// Returns `None` if the hit's `_id` is not a record id. The snippet is
    /// the first highlight fragment, taking fields in query order.
    fn parse_hit(hit: &Value, fields: &[String]) -> Option<SearchHit> {
        let id = hit["_id"].as_str()?.parse().ok()?;
        let score = hit["_score"].as_f64().unwrap_or(0.0);

        let highlight = &hit["highlight"];
        let first_fragment = |field: &str| highlight[field][0].as_str().map(str::to_string);
        let snippet = fields
            .iter()
            .find_map(|field| first_fragment(field))
            .or_else(|| {
                highlight
                    .as_object()?
                    .values()
                    .find_map(|fragments| fragments[0].as_str().map(str::to_string))
            });

        Some(SearchHit { id, score, snippet })
    }

    /// Parse a search response body.
    fn parse_search_response(body: &Value, fields: &[String]) -> SearchResponse {
        let took_ms = body["took"].as_u64().unwrap_or(0);
        let total = body["hits"]["total"]["value"].as_u64().unwrap_or(0);

        let hits = body["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| {
                        let parsed = Self::parse_hit(hit, fields);
                        if parsed.is_none() {
                            warn!(id = %hit["_id"], "Skipping hit without a record id");
                        }
                        parsed
                    })
                    .collect()
            })
            .unwrap_or_default();

        SearchResponse {
            hits,
            total,
            took_ms,
        }
    }

    /// Turn a `_bulk` response into per-document outcomes.
    ///
    /// Items are matched to requests by position, as the bulk API guarantees.
    fn parse_bulk_response(requests: &[IndexRequest], body: &Value) -> BatchOperationSummary {
        let items = body["items"].as_array().cloned().unwrap_or_default();

        let results = requests
            .iter()
            .enumerate()
            .map(|(i, request)| {
                let item = items.get(i).map(|item| &item["index"]);
                match item {
                    Some(item) if item["error"].is_null() => {
                        BatchOperationResult::succeeded(request.id.clone())
                    }
                    Some(item) => {
                        let reason = item["error"]["reason"]
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| item["error"].to_string());
                        BatchOperationResult::failed(
                            request.id.clone(),
                            SearchError::index(format!("status {}: {}", item["status"], reason)),
                        )
                    }
                    None => BatchOperationResult::failed(
                        request.id.clone(),
                        SearchError::parse("missing item in bulk response"),
                    ),
                }
            })
            .collect();

        BatchOperationSummary::from_results(results)
    }

    async fn read_json(response: Response) -> Result<Value, SearchError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))
    }
}

#[async_trait]
impl SearchEngineClient for OpenSearchClient {
    #[instrument(skip(self, document))]
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), SearchError> {
        let mut request = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(document);
        if let Some(refresh) = self.refresh() {
            request = request.refresh(refresh);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index request failed");
            return Err(SearchError::index(format!(
                "Index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %id, "Document indexed");
        Ok(())
    }

    #[instrument(skip(self, requests), fields(count = requests.len()))]
    async fn bulk_index_documents(
        &self,
        index: &str,
        requests: &[IndexRequest],
    ) -> Result<BatchOperationSummary, SearchError> {
        if requests.is_empty() {
            return Ok(BatchOperationSummary::empty());
        }

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(requests.len() * 2);
        for request in requests {
            body.push(JsonBody::new(json!({ "index": { "_id": request.id } })));
            body.push(JsonBody::new(request.document.to_json()));
        }

        let mut bulk = self.client.bulk(BulkParts::Index(index)).body(body);
        if let Some(refresh) = self.refresh() {
            bulk = bulk.refresh(refresh);
        }

        let response = bulk
            .send()
            .await
            .map_err(|e| SearchError::bulk_index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchError::bulk_index(format!(
                "Bulk index failed with status {}: {}",
                status, error_body
            )));
        }

        let summary = Self::parse_bulk_response(requests, &Self::read_json(response).await?);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk index completed"
        );
        Ok(summary)
    }

    /// Delete a document from the search index.
    ///
    /// If the document doesn't exist, the operation is considered successful.
    #[instrument(skip(self))]
    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchError> {
        let mut request = self.client.delete(DeleteParts::IndexId(index, id));
        if let Some(refresh) = self.refresh() {
            request = request.refresh(refresh);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(SearchError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %id, "Document deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>, SearchError> {
        let response = self
            .client
            .get(GetParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| SearchError::get(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchError::get(format!(
                "Get failed with status {}: {}",
                status, error_body
            )));
        }

        let body = Self::read_json(response).await?;
        if body["found"] == Value::Bool(false) {
            return Ok(None);
        }

        Document::from_json(&body["_source"])
            .map(Some)
            .ok_or_else(|| SearchError::parse("document has no _source object"))
    }

    #[instrument(skip(self, query), fields(query = %query.query, from = query.from, size = query.size))]
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        query.validate().map_err(SearchError::invalid_query)?;

        let body = build_search_query(query);
        let indices = [index];

        let response = self
            .client
            .search(SearchParts::Index(&indices))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::query(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Search request failed");
            return Err(SearchError::query(format!(
                "Search failed with status {}: {}",
                status, error_body
            )));
        }

        let body = Self::read_json(response).await?;
        let result = Self::parse_search_response(&body, &query.fields);

        debug!(hits = result.hits.len(), total = result.total, "Search completed");
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn ensure_index_exists(&self, index: &str, fields: &[&str]) -> Result<(), SearchError> {
        let indices = [index];
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&indices))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(get_index_settings(fields))
            .send()
            .await
            .map_err(|e| SearchError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();

            // Another process created it between the two requests
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }

            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchError::index_creation(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index, fields = ?fields, "Created search index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body = Self::read_json(response).await?;
        let status = body["status"].as_str().unwrap_or("red");
        debug!(cluster_status = %status, "Cluster health");
        Ok(status == "green" || status == "yellow")
    }
}
