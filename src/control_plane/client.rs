//! REST control plane client implementation.
//!
//! This module provides a generic HTTP client that maps lifecycle calls onto
//! collection-style REST endpoints described by the resource type table.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::{ControlPlaneConfig, LifecycleConfig, ResourceTypeConfig};
use crate::error::{ApiError, ConfigError, LifecycleError, ReconcileError, Result};
use crate::state::ResourceIdentity;

use super::plane::ControlPlane;
use super::types::{
    Attributes, FetchResponse, Intent, MutationRequest, MutationResponse, MutationTarget,
    RemoteSnapshot, Scope, is_success_status,
};

/// Default delay suggested when a 429 carries no `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// REST control plane client.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base_url: Url,
    /// Bearer token.
    token: Option<String>,
    /// Resource types by kind.
    types: HashMap<String, ResourceTypeConfig>,
}

impl HttpControlPlane {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be created.
    pub fn new(
        config: &ControlPlaneConfig,
        types: &[ResourceTypeConfig],
        token: Option<String>,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ConfigError::validation(format!("Invalid base URL: {e}"), "control_plane.base_url")
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
            types: types.iter().map(|t| (t.kind.clone(), t.clone())).collect(),
        })
    }

    /// Creates a client from the full configuration, reading the token from
    /// the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the token variable is not set or the client cannot be created.
    pub fn from_config(config: &LifecycleConfig) -> Result<Self> {
        let token = std::env::var(&config.control_plane.token_env).map_err(|_| {
            ConfigError::MissingEnvVar {
                name: config.control_plane.token_env.clone(),
            }
        })?;

        Self::new(&config.control_plane, &config.resource_types, Some(token))
    }

    /// Looks up a resource type.
    fn resource_type(&self, kind: &str) -> Result<&ResourceTypeConfig> {
        self.types.get(kind).ok_or_else(|| {
            LifecycleError::Config(ConfigError::UnknownKind {
                kind: kind.to_string(),
            })
        })
    }

    /// Renders the collection path of a type within a scope.
    fn collection_segments(rtype: &ResourceTypeConfig, scope: &Scope) -> Result<Vec<String>> {
        rtype
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| match segment {
                "{project}" => Ok(scope.project.clone()),
                "{region}" => scope.region.clone().ok_or_else(|| {
                    LifecycleError::Config(ConfigError::validation(
                        format!("Resource type '{}' requires a region", rtype.kind),
                        "region",
                    ))
                }),
                other => Ok(other.to_string()),
            })
            .collect()
    }

    /// Appends path segments to the base URL.
    fn build_url(&self, segments: &[String]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                ConfigError::validation("Base URL cannot carry a path", "control_plane.base_url")
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// URL of a type's collection.
    fn collection_url(&self, rtype: &ResourceTypeConfig, scope: &Scope) -> Result<Url> {
        let segments = Self::collection_segments(rtype, scope)?;
        self.build_url(&segments)
    }

    /// URL of a single object.
    fn object_url(&self, rtype: &ResourceTypeConfig, identity: &ResourceIdentity) -> Result<Url> {
        let mut segments = Self::collection_segments(rtype, &identity.scope())?;
        segments.push(identity.id().to_string());
        if let Some(sub_id) = identity.sub_id() {
            segments.push(sub_id.to_string());
        }
        self.build_url(&segments)
    }

    /// Sends a request, returning the status code and body text.
    async fn send(&self, request: RequestBuilder) -> Result<(u16, String)> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status == 401 || status == 403 {
            return Err(ApiError::AuthenticationFailed {
                message: format!("Control plane returned {status}"),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response body: {e}")))?;

        trace!("Response {status}: {body}");
        Ok((status, body))
    }
}

/// Parses a response body into attributes. An empty body yields no attributes.
fn parse_object(body: &str) -> Result<Attributes> {
    if body.trim().is_empty() {
        return Ok(Attributes::new());
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(ApiError::invalid_response(format!(
            "Expected a JSON object, got: {other}"
        ))
        .into()),
        Err(e) => Err(ApiError::invalid_response(format!("Failed to parse response: {e}")).into()),
    }
}

/// Reads an identifier field, accepting strings and numbers.
fn field_as_string(fields: &Attributes, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResponse> {
        let rtype = self.resource_type(&request.kind)?;

        let (method, url) = match (request.intent, &request.target) {
            (Intent::Create, MutationTarget::Collection(scope)) => {
                (Method::POST, self.collection_url(rtype, scope)?)
            }
            (Intent::Update, MutationTarget::Object(identity)) => {
                (Method::PATCH, self.object_url(rtype, identity)?)
            }
            (Intent::Delete, MutationTarget::Object(identity)) => {
                (Method::DELETE, self.object_url(rtype, identity)?)
            }
            (intent, _) => {
                return Err(ReconcileError::InvalidRequest {
                    message: format!("{intent} cannot be dispatched to this target"),
                }
                .into());
            }
        };

        debug!("{method} {url}");

        let mut builder = self.client.request(method, url);
        if !request.payload.is_empty() {
            builder = builder.json(&request.payload);
        }

        let (status, body) = self.send(builder).await?;

        if !is_success_status(status) {
            return Ok(MutationResponse {
                status,
                message: Some(body),
                ..MutationResponse::default()
            });
        }

        let fields = parse_object(&body)?;
        let id = field_as_string(&fields, &rtype.id_field);
        let sub_id = rtype
            .sub_id_field
            .as_deref()
            .and_then(|f| field_as_string(&fields, f));

        Ok(MutationResponse {
            status,
            id,
            sub_id,
            fields,
            message: None,
        })
    }

    async fn fetch_status(&self, kind: &str, identity: &ResourceIdentity) -> Result<FetchResponse> {
        let rtype = self.resource_type(kind)?;
        let url = self.object_url(rtype, identity)?;

        debug!("GET {url}");

        let (status, body) = self.send(self.client.get(url)).await?;

        if !is_success_status(status) {
            return Ok(FetchResponse::without_snapshot(status, body));
        }

        let attributes = parse_object(&body)?;
        if attributes.is_empty() {
            return Err(ApiError::invalid_response("Empty snapshot in 2xx response").into());
        }

        let snapshot = RemoteSnapshot::new(attributes);
        let remote_status = rtype
            .status_field
            .as_deref()
            .and_then(|f| snapshot.get_str(f))
            .map(String::from);

        Ok(FetchResponse::found(status, snapshot, remote_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusSets;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lb_type() -> ResourceTypeConfig {
        let mut rtype = ResourceTypeConfig::new(
            "load_balancer",
            "projects/{project}/regions/{region}/loadbalancers",
        )
        .with_statuses("status", StatusSets::new(&["ACTIVE"], &["ERROR"], &[]));
        rtype.id_field = String::from("name");
        rtype
    }

    fn listener_type() -> ResourceTypeConfig {
        let mut rtype = ResourceTypeConfig::new(
            "listener",
            "projects/{project}/regions/{region}/loadbalancers",
        )
        .with_statuses("state", StatusSets::new(&["READY"], &["FAILED"], &[]));
        rtype.id_field = String::from("load_balancer_id");
        rtype.sub_id_field = Some(String::from("listener_id"));
        rtype
    }

    fn client_for(server: &MockServer) -> HttpControlPlane {
        let config = ControlPlaneConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            token_env: String::from("UNUSED"),
        };
        HttpControlPlane::new(
            &config,
            &[lb_type(), listener_type()],
            Some(String::from("secret")),
        )
        .unwrap()
    }

    fn lb_identity() -> ResourceIdentity {
        ResourceIdentity::new("p1", Some(String::from("eu-1")), "my-test-lb", None)
    }

    #[tokio::test]
    async fn test_create_extracts_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/p1/regions/eu-1/loadbalancers"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({"name": "my-test-lb", "status": "creating"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = MutationRequest {
            intent: Intent::Create,
            kind: String::from("load_balancer"),
            target: MutationTarget::Collection(Scope::new("p1", Some(String::from("eu-1")))),
            payload: Attributes::from([(String::from("name"), json!("my-test-lb"))]),
        };

        let response = client.mutate(&request).await.unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(response.id.as_deref(), Some("my-test-lb"));
        assert_eq!(response.fields.get("status"), Some(&json!("creating")));
    }

    #[tokio::test]
    async fn test_create_extracts_sub_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/p1/regions/eu-1/loadbalancers"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "load_balancer_id": "lb-1",
                "listener_id": 2,
                "state": "PROVISIONING"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = MutationRequest {
            intent: Intent::Create,
            kind: String::from("listener"),
            target: MutationTarget::Collection(Scope::new("p1", Some(String::from("eu-1")))),
            payload: Attributes::from([(String::from("port"), json!(443))]),
        };

        let response = client.mutate(&request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.id.as_deref(), Some("lb-1"));
        assert_eq!(response.sub_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_update_patches_sub_object() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/projects/p1/regions/eu-1/loadbalancers/lb-1/listener-2"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({"port": 8443})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "load_balancer_id": "lb-1",
                "listener_id": "listener-2",
                "port": 8443,
                "state": "UPDATING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let identity = ResourceIdentity::new(
            "p1",
            Some(String::from("eu-1")),
            "lb-1",
            Some(String::from("listener-2")),
        );
        let request = MutationRequest {
            intent: Intent::Update,
            kind: String::from("listener"),
            target: MutationTarget::Object(identity),
            payload: Attributes::from([(String::from("port"), json!(8443))]),
        };

        let response = client.mutate(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.sub_id.as_deref(), Some("listener-2"));
        assert_eq!(response.fields.get("port"), Some(&json!(8443)));
    }

    #[tokio::test]
    async fn test_update_of_collection_is_rejected() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let request = MutationRequest {
            intent: Intent::Update,
            kind: String::from("listener"),
            target: MutationTarget::Collection(Scope::new("p1", Some(String::from("eu-1")))),
            payload: Attributes::new(),
        };

        let result = client.mutate(&request).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Reconcile(ReconcileError::InvalidRequest { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_gone_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/projects/p1/regions/eu-1/loadbalancers/my-test-lb"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = MutationRequest {
            intent: Intent::Delete,
            kind: String::from("load_balancer"),
            target: MutationTarget::Object(lb_identity()),
            payload: Attributes::new(),
        };

        let response = client.mutate(&request).await.unwrap();
        assert!(response.is_absent());
        assert!(response.id.is_none());
    }

    #[tokio::test]
    async fn test_fetch_reads_remote_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/regions/eu-1/loadbalancers/my-test-lb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "my-test-lb",
                "status": "ACTIVE",
                "external_address": "203.0.113.7"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client.fetch_status("load_balancer", &lb_identity()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.remote_status.as_deref(), Some("ACTIVE"));
        let snapshot = response.snapshot.unwrap();
        assert_eq!(snapshot.get_str("external_address"), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_fetch_not_found_has_no_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client.fetch_status("load_balancer", &lb_identity()).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(response.snapshot.is_none());
        assert_eq!(response.message.as_deref(), Some("not found"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.fetch_status("load_balancer", &lb_identity()).await;

        assert!(matches!(
            result,
            Err(LifecycleError::Api(ApiError::AuthenticationFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_status("load_balancer", &lb_identity())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            LifecycleError::Api(ApiError::RateLimited { retry_after_secs: 7 })
        ));
    }

    #[tokio::test]
    async fn test_missing_region_is_rejected() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let identity = ResourceIdentity::new("p1", None, "my-test-lb", None);

        let result = client.fetch_status("load_balancer", &identity).await;
        assert!(matches!(result, Err(LifecycleError::Config(_))));
    }

    #[test]
    fn test_parse_object_rejects_arrays() {
        assert!(parse_object("[1, 2]").is_err());
        assert!(parse_object("").unwrap().is_empty());
        assert_eq!(parse_object(r#"{"a": 1}"#).unwrap().len(), 1);
    }
}
