use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ExplorerConfig;
use crate::docs::clean_object;
use crate::normalize::resource_id_of;
use crate::operation::{HttpMethod, OperationDescriptor};
use crate::search::ResourceRecord;

/// Upper-cased provider namespace -> upper-cased child resource types.
pub type ProviderMap = BTreeMap<String, Vec<String>>;

/// Body of a proxied call against the management API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeRequest {
    pub url: String,
    pub http_method: HttpMethod,
    pub api_version: Option<String>,
    pub request_body: Option<Value>,
    pub query_string: Option<String>,
}

impl InvokeRequest {
    pub fn new(http_method: HttpMethod, url: &str, api_version: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            http_method,
            api_version: api_version.map(str::to_string),
            request_body: None,
            query_string: None,
        }
    }

    /// PUT and PATCH bodies are sent without their `(placeholder)` values.
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        let edit = matches!(self.http_method, HttpMethod::Put | HttpMethod::Patch);
        self.request_body = body.map(|mut body| {
            if edit {
                clean_object(&mut body);
            }
            body
        });
        self
    }

    pub fn with_query_string(mut self, query: Option<String>) -> Self {
        self.query_string = query.filter(|q| !q.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: u16,
    pub data: Value,
}

impl ProxyResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything the explorer needs from the backend. Pagination is the
/// implementor's concern: list results are always complete.
pub trait ArmProxy: Send + Sync {
    fn fetch_applicable_providers(&self) -> Result<Vec<String>>;

    fn fetch_applicable_operations(&self, providers: &[String]) -> Result<Vec<OperationDescriptor>>;

    fn fetch_providers_for_scope(
        &self,
        subscription_id: &str,
        resource_group: Option<&str>,
    ) -> Result<ProviderMap>;

    fn fetch_instances(&self, url: &str) -> Result<Vec<Value>>;

    /// Non-2xx answers are returned, not raised.
    fn invoke(&self, request: &InvokeRequest) -> Result<ProxyResponse>;

    /// `""` fetches every resource.
    fn search_by_keyword(&self, keyword: &str) -> Result<Vec<ResourceRecord>>;
}

/// Unwraps `{"value": [...]}` list envelopes.
pub fn unwrap_list(data: Value) -> Result<Vec<Value>> {
    match data {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("value") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!("expected a list response"),
        },
        _ => bail!("expected a list response"),
    }
}

pub struct HttpProxy {
    base_url: String,
    api_token: Option<String>,
    client: Client,
}

impl HttpProxy {
    pub fn new(base_url: String, api_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("arm-explorer")
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url,
            api_token,
            client,
        })
    }

    pub fn from_config(config: &ExplorerConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.token.clone())
    }

    /// One round trip to the proxy. The answer is returned whatever its
    /// status; bodies that are not JSON come back as a string.
    fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<ProxyResponse> {
        debug!(%method, %url, "proxy request");
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .with_context(|| format!("{method} {url}: proxy unreachable"))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .with_context(|| format!("{method} {url}: read proxy answer"))?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ProxyResponse { status, data })
    }

    /// Reads one of the proxy's own routes; anything but 2xx is an error.
    fn read_route(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value> {
        let label = format!("{method} {}", url.path());
        let response = self.send(method, url, body)?;
        if !response.is_success() {
            bail!("{label}: http {}: {}", response.status, response.data);
        }
        Ok(response.data)
    }

    fn route(&self, route: &str) -> Result<Url> {
        api_url(&self.base_url, route)
    }
}

impl ArmProxy for HttpProxy {
    fn fetch_applicable_providers(&self) -> Result<Vec<String>> {
        let data = self.read_route(Method::GET, self.route("providers")?, None)?;
        serde_json::from_value(data).context("providers must be a list of names")
    }

    fn fetch_applicable_operations(&self, providers: &[String]) -> Result<Vec<OperationDescriptor>> {
        let body = serde_json::to_value(providers).context("encode provider list")?;
        let data = self.read_route(Method::POST, self.route("all-operations")?, Some(&body))?;
        let items = unwrap_list(data)?;
        serde_json::from_value(Value::Array(items)).context("decode operation catalog")
    }

    fn fetch_providers_for_scope(
        &self,
        subscription_id: &str,
        resource_group: Option<&str>,
    ) -> Result<ProviderMap> {
        let url = self.route(&format!("operations/providers/{subscription_id}"))?;
        let data = self.read_route(Method::GET, url, None)?;
        let groups: BTreeMap<String, ProviderMap> =
            serde_json::from_value(data).context("decode provider map")?;
        Ok(select_scope(groups, resource_group))
    }

    fn fetch_instances(&self, url: &str) -> Result<Vec<Value>> {
        let route = self.route(resource_id_of(url))?;
        unwrap_list(self.read_route(Method::GET, route, None)?)
            .with_context(|| format!("list instances of {url}"))
    }

    fn invoke(&self, request: &InvokeRequest) -> Result<ProxyResponse> {
        let body = serde_json::to_value(request).context("encode invoke request")?;
        self.send(Method::POST, self.route("operations")?, Some(&body))
    }

    fn search_by_keyword(&self, keyword: &str) -> Result<Vec<ResourceRecord>> {
        let mut url = self.route("search")?;
        url.query_pairs_mut().append_pair("keyword", keyword);
        let items = unwrap_list(self.read_route(Method::GET, url, None)?)?;
        serde_json::from_value(Value::Array(items)).context("decode search results")
    }
}

/// Narrows a `RESOURCEGROUP -> PROVIDER -> [TYPE]` answer to one group, or
/// merges every group when no group is in scope.
fn select_scope(groups: BTreeMap<String, ProviderMap>, resource_group: Option<&str>) -> ProviderMap {
    let mut merged = ProviderMap::new();
    for (group, providers) in groups {
        if let Some(wanted) = resource_group {
            if !group.eq_ignore_ascii_case(wanted) {
                continue;
            }
        }
        for (provider, types) in providers {
            let entry = merged.entry(provider.to_uppercase()).or_default();
            for ty in types {
                let ty = ty.to_uppercase();
                if !entry.contains(&ty) {
                    entry.push(ty);
                }
            }
        }
    }
    merged
}

/// `{endpoint}/api/{route}`. The endpoint may carry a path prefix when the
/// proxy is mounted below the site root.
fn api_url(endpoint: &str, route: &str) -> Result<Url> {
    let root = format!("{}/", endpoint.trim_end_matches('/'));
    let root = Url::parse(&root).with_context(|| format!("proxy endpoint {endpoint:?} is not a url"))?;
    root.join(&format!("api/{}", route.trim_start_matches('/')))
        .with_context(|| format!("proxy route {route:?}"))
}
