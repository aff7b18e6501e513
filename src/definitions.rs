use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::docs::{is_blank, is_blank_opt};
use crate::normalize::{
    is_placeholder, last_segment, normalize_template, parent_path, path_segments,
};
use crate::operation::{HttpMethod, OperationDescriptor};
use crate::proxy::{ArmProxy, InvokeRequest};

/// Root segments that become top-level tree nodes.
pub const SUPPORTED_ROOT_NODES: &[&str] = &["providers", "subscriptions"];

/// Verb tags recorded on a definition. `Create` marks a collection whose
/// members can be created with PUT; `GetPost` marks a resource listed
/// through `POST .../list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionTag {
    Get,
    Put,
    Patch,
    Delete,
    Post,
    Create,
    GetPost,
}

impl From<HttpMethod> for ActionTag {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => ActionTag::Get,
            HttpMethod::Post => ActionTag::Post,
            HttpMethod::Put => ActionTag::Put,
            HttpMethod::Patch => ActionTag::Patch,
            HttpMethod::Delete => ActionTag::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "names", rename_all = "snake_case")]
pub enum Children {
    #[default]
    Leaf,
    /// Named sub-collections, e.g. `providers` under a resource group.
    Static(Vec<String>),
    /// Data-driven instances; holds the placeholder segment.
    Instance(String),
}

impl Children {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Children::Leaf)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub url: String,
    pub resource_name: String,
    pub children: Children,
    pub actions: Vec<ActionTag>,
    pub request_body: Option<Value>,
    pub request_body_doc: Option<Value>,
    pub response_body_doc: Option<Value>,
    pub api_version: Option<String>,
    pub query: Vec<String>,
}

impl ResourceDefinition {
    fn new(url: &str, operation: Option<&OperationDescriptor>) -> Self {
        Self {
            url: url.to_string(),
            resource_name: last_segment(url).to_string(),
            children: Children::Leaf,
            actions: operation
                .map(|op| vec![ActionTag::from(op.http_method)])
                .unwrap_or_default(),
            request_body: operation.and_then(|op| op.request_body.clone()),
            request_body_doc: operation.and_then(|op| op.request_body_doc.clone()),
            response_body_doc: operation.and_then(|op| op.response_body_doc.clone()),
            api_version: operation
                .and_then(|op| op.api_version.clone())
                .filter(|v| !v.is_empty()),
            query: operation.and_then(|op| op.query.clone()).unwrap_or_default(),
        }
    }

    fn add_action(&mut self, action: ActionTag) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    fn merge_operation(&mut self, op: &OperationDescriptor) {
        self.add_action(op.http_method.into());

        if is_blank_opt(self.request_body.as_ref()) && !is_blank_opt(op.request_body.as_ref()) {
            self.request_body = op.request_body.clone();
        }
        if let Some(version) = op.api_version.as_deref().filter(|v| !v.is_empty()) {
            if op.http_method == HttpMethod::Put || self.api_version.is_none() {
                self.api_version = Some(version.to_string());
            }
        }
        merge_doc(
            &mut self.response_body_doc,
            op.response_body_doc.as_ref(),
            op.http_method == HttpMethod::Get,
        );
        merge_doc(
            &mut self.request_body_doc,
            op.request_body_doc.as_ref(),
            op.http_method == HttpMethod::Put,
        );
        if self.query.is_empty() {
            if let Some(query) = &op.query {
                self.query = query.clone();
            }
        }
    }

    fn fill_from_child(&mut self, fill: ParentFill<'_>) {
        if is_blank_opt(self.request_body.as_ref()) {
            if let Some(body) = fill.request_body.filter(|b| !is_blank(b)) {
                self.request_body = Some(body.clone());
            }
        }
        if is_blank_opt(self.request_body_doc.as_ref()) {
            if let Some(doc) = fill.request_body_doc.filter(|d| !is_blank(d)) {
                self.request_body_doc = Some(doc.clone());
            }
        }
        if self.api_version.is_none() {
            if let Some(version) = fill.api_version.filter(|v| !v.is_empty()) {
                self.api_version = Some(version.to_string());
            }
        }
    }

    pub fn has_action(&self, action: ActionTag) -> bool {
        self.actions.contains(&action)
    }

    /// GET-like verbs: plain GET or a `list` POST.
    pub fn get_actions(&self) -> Vec<ActionTag> {
        self.actions
            .iter()
            .copied()
            .filter(|a| matches!(a, ActionTag::Get | ActionTag::GetPost))
            .collect()
    }

    pub fn has_create_action(&self) -> bool {
        self.has_action(ActionTag::Create)
    }

    pub fn has_put_or_patch_action(&self) -> bool {
        self.has_action(ActionTag::Put) || self.has_action(ActionTag::Patch)
    }

    pub fn has_post_action(&self) -> bool {
        self.has_action(ActionTag::Post)
    }

    pub fn doc_body(&self) -> Option<&Value> {
        if !is_blank_opt(self.response_body_doc.as_ref()) {
            self.response_body_doc.as_ref()
        } else {
            self.request_body_doc.as_ref()
        }
    }

    /// Scaffolding with no verb, outside any provider namespace.
    pub fn is_hidden(&self) -> bool {
        self.actions.is_empty() && !self.url.to_lowercase().contains("providers")
    }

    /// Verbs a user can issue directly against a selected instance.
    pub fn http_verbs(&self) -> Vec<HttpMethod> {
        let mut verbs: Vec<HttpMethod> = self
            .actions
            .iter()
            .filter_map(|a| match a {
                ActionTag::Get => Some(HttpMethod::Get),
                ActionTag::Put => Some(HttpMethod::Put),
                ActionTag::Patch => Some(HttpMethod::Patch),
                ActionTag::Post | ActionTag::GetPost => Some(HttpMethod::Post),
                ActionTag::Delete | ActionTag::Create => None,
            })
            .collect();
        verbs.sort_by_key(|v| v.as_str());
        verbs.dedup();
        verbs
    }
}

fn merge_doc(slot: &mut Option<Value>, incoming: Option<&Value>, overwrite: bool) {
    let Some(incoming) = incoming.filter(|d| !is_blank(d)) else {
        return;
    };
    if overwrite || is_blank_opt(slot.as_ref()) {
        *slot = Some(incoming.clone());
    }
}

/// An invocable operation surfaced on a selected resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub http_method: HttpMethod,
    pub name: String,
    pub url: String,
    pub request_body: Option<Value>,
    pub query: Vec<String>,
}

impl Action {
    pub fn new(http_method: HttpMethod, name: &str, url: &str) -> Self {
        Self {
            http_method,
            name: name.to_string(),
            url: url.to_string(),
            request_body: None,
            query: Vec::new(),
        }
    }

    /// The proxy request that runs this action. Only declared query names
    /// with a non-blank value are sent.
    pub fn invoke_request(&self, api_version: Option<&str>, values: &BTreeMap<String, String>) -> InvokeRequest {
        InvokeRequest::new(self.http_method, &self.url, api_version)
            .with_body(self.request_body.clone())
            .with_query_string(self.query_string(values))
    }

    /// `&name=value` pairs for the declared query names that have a
    /// non-blank value.
    pub fn query_string(&self, values: &BTreeMap<String, String>) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        Some(
            self.query
                .iter()
                .filter_map(|name| {
                    let value = values.get(name)?.trim();
                    (!value.is_empty()).then(|| format!("&{name}={}", urlencoding::encode(value)))
                })
                .collect(),
        )
    }
}

/// Catalog anomalies detected while building; the table keeps the earlier
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildDiagnostic {
    #[error("{parent} has named children, ignoring instance child {child}")]
    InstanceChildOnStaticParent { parent: String, child: String },
    #[error("{parent} has instance child {existing}, ignoring named child {child}")]
    StaticChildOnInstanceParent {
        parent: String,
        existing: String,
        child: String,
    },
    #[error("{incoming} collides with {existing}, keeping {existing}")]
    CaseVariantPath { existing: String, incoming: String },
}

#[derive(Debug, Clone, Copy, Default)]
struct ParentFill<'a> {
    request_body: Option<&'a Value>,
    request_body_doc: Option<&'a Value>,
    api_version: Option<&'a str>,
}

/// All resource definitions, one per canonical path (compared
/// case-insensitively).
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefinitionTable {
    definitions: BTreeMap<String, ResourceDefinition>,
    #[serde(skip)]
    diagnostics: Vec<BuildDiagnostic>,
}

impl DefinitionTable {
    /// Builds the table from a catalog. Operations are registered in
    /// ascending canonical-path order so creation PUTs establish parents
    /// before nested POST actions reach them.
    pub fn build(operations: &[OperationDescriptor]) -> Self {
        let mut ordered: Vec<(String, &OperationDescriptor)> = operations
            .iter()
            .map(|op| (normalize_template(&op.url), op))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        let mut table = Self::default();
        for (_, op) in ordered {
            table.add_operation(op);
        }
        table.sort_children();
        table.remove_action_less_definitions();
        info!(
            operations = operations.len(),
            definitions = table.len(),
            diagnostics = table.diagnostics.len(),
            "built resource definitions"
        );
        table
    }

    /// Fetches the applicable catalog through the proxy and builds it.
    pub fn fetch(proxy: &dyn ArmProxy) -> Result<Self> {
        let providers = proxy
            .fetch_applicable_providers()
            .context("fetch applicable providers")?;
        let operations = proxy
            .fetch_applicable_operations(&providers)
            .context("fetch applicable operations")?;
        Ok(Self::build(&operations))
    }

    pub fn add_operation(&mut self, operation: &OperationDescriptor) {
        let url = normalize_template(&operation.url);
        let fill = ParentFill {
            request_body: operation.request_body.as_ref(),
            request_body_doc: operation.request_body_doc.as_ref(),
            api_version: operation.api_version.as_deref(),
        };

        if operation.http_method == HttpMethod::Post && last_segment(&url) == "list" {
            self.set_parent(&url, Some(ActionTag::GetPost), fill);
            return;
        }
        if operation.is_create() {
            self.set_parent(
                &url,
                Some(ActionTag::Create),
                ParentFill {
                    api_version: None,
                    ..fill
                },
            );
            if !operation.is_create_or_update() {
                return;
            }
        }
        self.register(&url, Some(operation));
    }

    fn register(&mut self, url: &str, operation: Option<&OperationDescriptor>) {
        let key = url.to_lowercase();
        match self.definitions.get_mut(&key) {
            Some(existing) => {
                if let Some(op) = operation {
                    if existing.url != url {
                        push_diagnostic(
                            &mut self.diagnostics,
                            BuildDiagnostic::CaseVariantPath {
                                existing: existing.url.clone(),
                                incoming: url.to_string(),
                            },
                        );
                    }
                    existing.merge_operation(op);
                }
            }
            None => {
                debug!(url, scaffold = operation.is_none(), "new resource definition");
                self.definitions
                    .insert(key, ResourceDefinition::new(url, operation));
            }
        }
        self.set_parent(url, None, ParentFill::default());
    }

    fn set_parent(&mut self, url: &str, action: Option<ActionTag>, fill: ParentFill<'_>) {
        let Some(parent_url) = parent_path(url) else {
            return;
        };
        let parent_key = parent_url.to_lowercase();
        if !self.definitions.contains_key(&parent_key) {
            self.register(parent_url, None);
        }
        self.attach_child(&parent_key, last_segment(url));

        let Some(parent) = self.definitions.get_mut(&parent_key) else {
            return;
        };
        if let Some(action) = action {
            parent.add_action(action);
        }
        parent.fill_from_child(fill);
    }

    fn attach_child(&mut self, parent_key: &str, child: &str) {
        let Some(parent) = self.definitions.get_mut(parent_key) else {
            return;
        };
        if is_placeholder(child) {
            match &parent.children {
                Children::Leaf | Children::Instance(_) => {
                    parent.children = Children::Instance(child.to_string());
                }
                Children::Static(_) => push_diagnostic(
                    &mut self.diagnostics,
                    BuildDiagnostic::InstanceChildOnStaticParent {
                        parent: parent.url.clone(),
                        child: child.to_string(),
                    },
                ),
            }
        } else if child != "list" {
            match &mut parent.children {
                Children::Leaf => parent.children = Children::Static(vec![child.to_string()]),
                Children::Static(names) => {
                    if !names.iter().any(|n| n.eq_ignore_ascii_case(child)) {
                        names.push(child.to_string());
                    }
                }
                Children::Instance(existing) => {
                    let diagnostic = BuildDiagnostic::StaticChildOnInstanceParent {
                        parent: parent.url.clone(),
                        existing: existing.clone(),
                        child: child.to_string(),
                    };
                    push_diagnostic(&mut self.diagnostics, diagnostic);
                }
            }
        }
    }

    pub fn sort_children(&mut self) {
        for definition in self.definitions.values_mut() {
            if let Children::Static(names) = &mut definition.children {
                names.sort();
            }
        }
    }

    pub fn remove_action_less_definitions(&mut self) {
        let before = self.definitions.len();
        self.definitions.retain(|_, d| !d.is_hidden());
        debug!(removed = before - self.definitions.len(), "pruned scaffolding definitions");
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.definitions.values()
    }

    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        &self.diagnostics
    }

    pub fn get(&self, url: &str) -> Option<&ResourceDefinition> {
        self.definitions.get(&url.to_lowercase())
    }

    /// The definition of child `name` under `parent`.
    pub fn child_of(&self, parent: &ResourceDefinition, name: &str) -> Option<&ResourceDefinition> {
        self.get(&format!("{}/{}", parent.url, name))
            .filter(|d| d.resource_name.eq_ignore_ascii_case(name))
    }

    /// Definitions for the tree roots, one per root segment.
    pub fn root_definitions(&self) -> Vec<&ResourceDefinition> {
        let mut seen: Vec<String> = Vec::new();
        self.definitions()
            .filter(|d| {
                let segments = path_segments(&d.url);
                if segments.len() != 1 {
                    return false;
                }
                let root = segments[0].to_lowercase();
                if !SUPPORTED_ROOT_NODES.contains(&root.as_str()) || seen.contains(&root) {
                    return false;
                }
                seen.push(root);
                true
            })
            .collect()
    }

    /// Maps an instantiated URL back to its definition, treating `{name}`
    /// segments as wildcards. Literal matches beat placeholder matches. A
    /// trailing `list` resolves to the listed resource.
    pub fn find_for_url(&self, url: &str) -> Option<&ResourceDefinition> {
        let segments = path_segments(url);
        let segments = match segments.split_last() {
            Some((last, rest)) if *last == "list" && !rest.is_empty() => rest.to_vec(),
            _ => segments,
        };
        self.definitions()
            .filter_map(|d| {
                let template = path_segments(&d.url);
                if template.len() != segments.len() {
                    return None;
                }
                let mut literal = 0;
                for (t, s) in template.iter().zip(&segments) {
                    if is_placeholder(t) {
                        continue;
                    }
                    if !t.eq_ignore_ascii_case(s) {
                        return None;
                    }
                    literal += 1;
                }
                Some((literal, d))
            })
            .max_by_key(|(literal, _)| *literal)
            .map(|(_, d)| d)
    }

    /// Actions offered on an instance of `definition` addressed by
    /// `instance_url`: DELETE when declared, plus one POST per static child
    /// that is a POST-declaring leaf.
    pub fn actions_for(&self, definition: &ResourceDefinition, instance_url: &str) -> Vec<Action> {
        let mut actions = Vec::new();
        if definition.has_action(ActionTag::Delete) {
            actions.push(Action::new(HttpMethod::Delete, "Delete", instance_url));
        }
        if let Children::Static(names) = &definition.children {
            for name in names {
                let Some(child) = self.child_of(definition, name) else {
                    continue;
                };
                if child.children.is_leaf() && child.has_post_action() {
                    let mut action = Action::new(
                        HttpMethod::Post,
                        &child.resource_name,
                        &format!("{instance_url}/{}", child.resource_name),
                    );
                    action.request_body = child.request_body.clone().filter(|b| !is_blank(b));
                    action.query = child.query.clone();
                    actions.push(action);
                }
            }
        }
        actions
    }
}

fn push_diagnostic(diagnostics: &mut Vec<BuildDiagnostic>, diagnostic: BuildDiagnostic) {
    if !diagnostics.contains(&diagnostic) {
        warn!("ASSERT: {diagnostic}");
        diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SITES: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Web/sites";

    fn op(method_name: &str, method: HttpMethod, url: &str) -> OperationDescriptor {
        OperationDescriptor::new(method_name, method, url).with_api_version("2022-03-01")
    }

    fn sites_catalog() -> Vec<OperationDescriptor> {
        vec![
            op("Get", HttpMethod::Get, "/subscriptions"),
            op("Get", HttpMethod::Get, "/subscriptions/{subscriptionId}"),
            op("List", HttpMethod::Get, "/subscriptions/{subscriptionId}/resourcegroups"),
            op("CreateOrUpdate", HttpMethod::Put, "/subscriptions/{subscriptionId}/resourcegroups/{resourceGroupName}")
                .with_request_body(json!({"location": "(location)"})),
            op("Get", HttpMethod::Get, "/subscriptions/{subscriptionId}/resourcegroups/{resourceGroupName}"),
            op("Delete", HttpMethod::Delete, "/subscriptions/{subscriptionId}/resourcegroups/{resourceGroupName}"),
            op("List", HttpMethod::Get, SITES),
            op("CreateOrUpdate", HttpMethod::Put, &format!("{SITES}/{{name}}"))
                .with_request_body(json!({"location": "", "properties": {"serverFarmId": ""}})),
            op("Get", HttpMethod::Get, &format!("{SITES}/{{name}}")),
            op("Delete", HttpMethod::Delete, &format!("{SITES}/{{name}}")),
            op("Restart", HttpMethod::Post, &format!("{SITES}/{{name}}/restart"))
                .with_query(&["softRestart"]),
            op("ListAppSettings", HttpMethod::Post, &format!("{SITES}/{{name}}/config/appsettings/list")),
            op("UpdateAppSettings", HttpMethod::Put, &format!("{SITES}/{{name}}/config/appsettings")),
        ]
    }

    fn canonical(url: &str) -> String {
        normalize_template(url)
    }

    #[test]
    fn single_get_creates_definition_and_prunes_scaffolding() {
        let table = DefinitionTable::build(&[op(
            "Get",
            HttpMethod::Get,
            "/subscriptions/{id}/resourceGroups/{name}",
        )]);
        let def = table
            .get("/subscriptions/{name}/resourceGroups/{name}")
            .unwrap();
        assert_eq!(def.actions, vec![ActionTag::Get]);
        assert_eq!(def.resource_name, "{name}");
        assert_eq!(table.len(), 1);
        assert!(table.get("/subscriptions").is_none());
    }

    #[test]
    fn scaffolding_under_providers_survives() {
        let table = DefinitionTable::build(&[op(
            "Get",
            HttpMethod::Get,
            "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites/{name}",
        )]);
        assert!(table.get("/subscriptions/{name}/resourceGroups/{name}/providers").is_some());
        let ns = table
            .get("/subscriptions/{name}/resourceGroups/{name}/providers/Microsoft.Web")
            .unwrap();
        assert!(ns.actions.is_empty());
        assert_eq!(ns.children, Children::Static(vec!["sites".to_string()]));
        assert!(table.get("/subscriptions/{name}/resourceGroups/{name}").is_none());
    }

    #[test]
    fn create_put_marks_parent_and_update_keeps_own_node() {
        let table = DefinitionTable::build(&sites_catalog());
        let sites = table.get(&canonical(SITES)).unwrap();
        assert!(sites.has_create_action());
        assert!(sites.has_action(ActionTag::Get));
        assert_eq!(sites.children, Children::Instance("{name}".to_string()));
        assert_eq!(
            sites.request_body,
            Some(json!({"location": "", "properties": {"serverFarmId": ""}}))
        );

        let site = table.get(&canonical(&format!("{SITES}/{{name}}"))).unwrap();
        for tag in [ActionTag::Get, ActionTag::Put, ActionTag::Delete] {
            assert!(site.has_action(tag), "missing {tag:?}");
        }
        assert!(!site.has_create_action());
    }

    #[test]
    fn list_post_marks_parent_without_own_node() {
        let table = DefinitionTable::build(&sites_catalog());
        let settings = table
            .get(&canonical(&format!("{SITES}/{{name}}/config/appsettings")))
            .unwrap();
        assert!(settings.has_action(ActionTag::GetPost));
        assert!(settings.has_action(ActionTag::Put));
        assert!(table.get(&canonical(&format!("{SITES}/{{name}}/config/appsettings/list"))).is_none());
        assert!(settings.children.is_leaf());
    }

    #[test]
    fn static_children_are_sorted_and_deduplicated() {
        let table = DefinitionTable::build(&sites_catalog());
        let site = table.get(&canonical(&format!("{SITES}/{{name}}"))).unwrap();
        assert_eq!(
            site.children,
            Children::Static(vec!["config".to_string(), "restart".to_string()])
        );
    }

    #[test]
    fn build_is_idempotent_and_order_independent() {
        let catalog = sites_catalog();
        let mut reversed = catalog.clone();
        reversed.reverse();
        let a = DefinitionTable::build(&catalog);
        let b = DefinitionTable::build(&catalog);
        let c = DefinitionTable::build(&reversed);
        let urls = |t: &DefinitionTable| t.definitions().map(|d| d.url.clone()).collect::<Vec<_>>();
        assert_eq!(urls(&a), urls(&b));
        assert_eq!(urls(&a), urls(&c));
        assert_eq!(
            a.definitions().cloned().collect::<Vec<_>>(),
            b.definitions().cloned().collect::<Vec<_>>()
        );
    }

    #[test]
    fn api_version_and_docs_merge_rules() {
        let url = "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites/{name}";
        let table = DefinitionTable::build(&[
            OperationDescriptor::new("Get", HttpMethod::Get, url)
                .with_api_version("2020-01-01")
                .with_response_body_doc(json!({"properties": {"state": "doc"}})),
            OperationDescriptor::new("Update", HttpMethod::Patch, url),
            OperationDescriptor::new("Update", HttpMethod::Put, url).with_api_version("2023-01-01"),
        ]);
        let def = table.get(&canonical(url)).unwrap();
        assert_eq!(def.api_version.as_deref(), Some("2023-01-01"));
        assert_eq!(def.response_body_doc, Some(json!({"properties": {"state": "doc"}})));
        assert_eq!(def.actions, vec![ActionTag::Get, ActionTag::Patch, ActionTag::Put]);
    }

    #[test]
    fn empty_api_version_never_overwrites() {
        let url = "/providers/Microsoft.Web/operations";
        let table = DefinitionTable::build(&[
            OperationDescriptor::new("List", HttpMethod::Get, url).with_api_version("2020-01-01"),
            OperationDescriptor::new("Update", HttpMethod::Put, url).with_api_version(""),
        ]);
        assert_eq!(table.get(url).unwrap().api_version.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn conflicting_children_are_reported() {
        let table = DefinitionTable::build(&[
            op("Get", HttpMethod::Get, "/providers/Microsoft.Foo/widgets"),
            op("Get", HttpMethod::Get, "/providers/Microsoft.Foo/widgets/special"),
            op("Get", HttpMethod::Get, "/providers/Microsoft.Foo/widgets/{id}"),
        ]);
        let widgets = table.get("/providers/Microsoft.Foo/widgets").unwrap();
        // "special" sorts before "{name}", so the named form wins.
        assert_eq!(widgets.children, Children::Static(vec!["special".to_string()]));
        assert_eq!(
            table.diagnostics(),
            &[BuildDiagnostic::InstanceChildOnStaticParent {
                parent: "/providers/Microsoft.Foo/widgets".to_string(),
                child: "{name}".to_string(),
            }]
        );
    }

    #[test]
    fn instance_parent_never_gains_named_children() {
        let mut table = DefinitionTable::default();
        table.add_operation(&op("Get", HttpMethod::Get, "/providers/Microsoft.Foo/widgets/{id}"));
        table.add_operation(&op("Get", HttpMethod::Get, "/providers/Microsoft.Foo/widgets/special"));
        let widgets = table.get("/providers/Microsoft.Foo/widgets").unwrap();
        assert_eq!(widgets.children, Children::Instance("{name}".to_string()));
        assert!(matches!(
            table.diagnostics()[0],
            BuildDiagnostic::StaticChildOnInstanceParent { .. }
        ));
    }

    #[test]
    fn case_variants_merge_into_first_spelling() {
        let table = DefinitionTable::build(&[
            op("Get", HttpMethod::Get, "/providers/Microsoft.Web/Sites"),
            op("Delete", HttpMethod::Delete, "/providers/microsoft.web/sites"),
        ]);
        assert_eq!(table.len(), 3);
        let sites = table.get("/PROVIDERS/Microsoft.Web/sites").unwrap();
        assert_eq!(sites.actions.len(), 2);
        assert_eq!(table.diagnostics().len(), 1);
    }

    #[test]
    fn root_definitions_and_lookup() {
        let table = DefinitionTable::build(&sites_catalog());
        let roots: Vec<&str> = table.root_definitions().iter().map(|d| d.url.as_str()).collect();
        assert_eq!(roots, vec!["/subscriptions"]);

        let found = table
            .find_for_url("https://management.azure.com/subscriptions/abc/resourceGroups/rg1/providers/Microsoft.Web/sites/app1")
            .unwrap();
        assert_eq!(found.url, canonical(&format!("{SITES}/{{name}}")));

        let listed = table
            .find_for_url("/subscriptions/abc/resourceGroups/rg1/providers/Microsoft.Web/sites/app1/config/appsettings/list")
            .unwrap();
        assert!(listed.has_action(ActionTag::GetPost));
        assert!(table.find_for_url("/nothing/here").is_none());
    }

    #[test]
    fn actions_and_verbs_for_site() {
        let table = DefinitionTable::build(&sites_catalog());
        let site = table.get(&canonical(&format!("{SITES}/{{name}}"))).unwrap();
        let url = "/subscriptions/abc/resourceGroups/rg1/providers/Microsoft.Web/sites/app1";
        let actions = table.actions_for(site, url);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].http_method, HttpMethod::Delete);
        assert_eq!(actions[0].url, url);
        assert_eq!(actions[1].name, "restart");
        assert_eq!(actions[1].url, format!("{url}/restart"));
        assert_eq!(actions[1].query, vec!["softRestart".to_string()]);
        assert_eq!(site.http_verbs(), vec![HttpMethod::Get, HttpMethod::Put]);
    }

    #[test]
    fn query_string_skips_blank_values() {
        let mut action = Action::new(HttpMethod::Post, "restart", "/x/restart");
        action.query = vec!["softRestart".to_string(), "synchronous".to_string()];
        let mut values = BTreeMap::new();
        values.insert("softRestart".to_string(), " true ".to_string());
        values.insert("synchronous".to_string(), "  ".to_string());
        assert_eq!(action.query_string(&values).as_deref(), Some("&softRestart=true"));
        assert!(Action::new(HttpMethod::Delete, "Delete", "/x").query_string(&values).is_none());
    }
}
