#![allow(dead_code)]

use anyhow::{Result, bail};
use arm_explorer::operation::OperationDescriptor;
use arm_explorer::proxy::{ArmProxy, InvokeRequest, ProviderMap, ProxyResponse};
use arm_explorer::search::ResourceRecord;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory backend: canned answers per URL and a log of every call.
#[derive(Default)]
pub struct StubProxy {
    pub operations: Vec<OperationDescriptor>,
    pub providers: ProviderMap,
    pub instances: HashMap<String, Vec<Value>>,
    pub responses: HashMap<String, ProxyResponse>,
    pub records: Vec<ResourceRecord>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<InvokeRequest>>,
}

impl StubProxy {
    pub fn new(operations: Vec<OperationDescriptor>) -> Self {
        Self {
            operations,
            ..Self::default()
        }
    }

    pub fn instances(mut self, url: &str, items: Vec<Value>) -> Self {
        self.instances.insert(url.to_string(), items);
        self
    }

    pub fn response(mut self, url: &str, status: u16, data: Value) -> Self {
        self.responses.insert(url.to_string(), ProxyResponse { status, data });
        self
    }

    pub fn provider(mut self, name: &str, types: &[&str]) -> Self {
        self.providers.insert(
            name.to_uppercase(),
            types.iter().map(|t| t.to_uppercase()).collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Every request passed to `invoke`, in order.
    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ArmProxy for StubProxy {
    fn fetch_applicable_providers(&self) -> Result<Vec<String>> {
        self.log("providers".to_string());
        Ok(self.providers.keys().cloned().collect())
    }

    fn fetch_applicable_operations(&self, _providers: &[String]) -> Result<Vec<OperationDescriptor>> {
        self.log("operations".to_string());
        Ok(self.operations.clone())
    }

    fn fetch_providers_for_scope(
        &self,
        subscription_id: &str,
        resource_group: Option<&str>,
    ) -> Result<ProviderMap> {
        self.log(format!("scope {subscription_id} {}", resource_group.unwrap_or("*")));
        Ok(self.providers.clone())
    }

    fn fetch_instances(&self, url: &str) -> Result<Vec<Value>> {
        self.log(format!("instances {url}"));
        match self.instances.get(url) {
            Some(items) => Ok(items.clone()),
            None => bail!("no instances for {url}"),
        }
    }

    fn invoke(&self, request: &InvokeRequest) -> Result<ProxyResponse> {
        self.log(format!("invoke {} {}", request.http_method, request.url));
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.get(&request.url) {
            Some(response) => Ok(response.clone()),
            None => bail!("unexpected invocation of {}", request.url),
        }
    }

    fn search_by_keyword(&self, keyword: &str) -> Result<Vec<ResourceRecord>> {
        self.log(format!("search {keyword}"));
        Ok(self.records.clone())
    }
}
