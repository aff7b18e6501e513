use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(anyhow!("unsupported http method {other}")),
        }
    }
}

/// One entry of the operation catalog served by the proxy.
///
/// Field names follow the proxy's PascalCase wire format. `url` is the raw
/// URL template with `{placeholder}` segments, possibly prefixed with the
/// management host.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OperationDescriptor {
    #[serde(default)]
    pub method_name: String,
    pub http_method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub request_body_doc: Option<Value>,
    #[serde(default)]
    pub response_body_doc: Option<Value>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub query: Option<Vec<String>>,
}

impl OperationDescriptor {
    pub fn new(method_name: &str, http_method: HttpMethod, url: &str) -> Self {
        Self {
            method_name: method_name.to_string(),
            http_method,
            url: url.to_string(),
            request_body: None,
            request_body_doc: None,
            response_body_doc: None,
            api_version: None,
            query: None,
        }
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = Some(api_version.to_string());
        self
    }

    pub fn with_request_body(mut self, body: Value) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn with_response_body_doc(mut self, doc: Value) -> Self {
        self.response_body_doc = Some(doc);
        self
    }

    pub fn with_query(mut self, query: &[&str]) -> Self {
        self.query = Some(query.iter().map(|q| q.to_string()).collect());
        self
    }

    /// PUT operations named like a creation register CREATE on their parent.
    pub fn is_create(&self) -> bool {
        self.http_method == HttpMethod::Put
            && ["Create", "BeginCreate", "Put"]
                .iter()
                .any(|prefix| self.method_name.starts_with(prefix))
    }

    /// Creation operations that also update keep registering their own path.
    pub fn is_create_or_update(&self) -> bool {
        self.method_name.contains("Updat")
    }
}

pub fn load_operations(path: &Path) -> Result<Vec<OperationDescriptor>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read operation catalog {}", path.display()))?;
    parse_operations(&raw).with_context(|| format!("parse operation catalog {}", path.display()))
}

pub fn parse_operations(raw: &str) -> Result<Vec<OperationDescriptor>> {
    let value: Value = serde_json::from_str(raw).context("invalid catalog json")?;
    // The proxy may wrap the list as {"value": [...]}.
    let list = match value {
        Value::Object(mut map) if map.contains_key("value") => map.remove("value").unwrap_or_default(),
        other => other,
    };
    serde_json::from_value(list).context("catalog entries must be operation descriptors")
}
