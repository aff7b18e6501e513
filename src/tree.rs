//! The navigable resource tree. Branches live in an arena owned by
//! [`ResourceTree`] and point back at the shared definitions they were
//! built from; children are fetched lazily on expansion.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::definitions::{Action, ActionTag, Children, DefinitionTable, ResourceDefinition};
use crate::normalize::{last_segment, path_segments, resource_id_of};
use crate::operation::HttpMethod;
use crate::proxy::{ArmProxy, InvokeRequest, ProviderMap, unwrap_list};
use crate::script::Selection;

pub const SHOW_ALL_LABEL: &str = "Show all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Do not descend into a lone child.
    pub no_auto_expand: bool,
    /// Keep children the scope has no resources for.
    pub show_unfiltered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchIcon {
    Succeeded,
    Running,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TreeBranch<'a> {
    pub label: String,
    pub element_url: String,
    pub value: Option<String>,
    pub definition: &'a ResourceDefinition,
    pub sort_value: Option<String>,
    pub icon_name_override: Option<BranchIcon>,
    pub is_leaf: bool,
    pub is_instruction: bool,
    pub expanded: bool,
    parent: Option<BranchId>,
    children: Vec<BranchId>,
    resource_group_providers: Option<ProviderMap>,
}

impl<'a> TreeBranch<'a> {
    fn new(label: &str, element_url: String, definition: &'a ResourceDefinition) -> Self {
        Self {
            label: label.to_string(),
            element_url,
            value: None,
            definition,
            sort_value: None,
            icon_name_override: None,
            is_leaf: definition.children.is_leaf(),
            is_instruction: false,
            expanded: false,
            parent: None,
            children: Vec::new(),
            resource_group_providers: None,
        }
    }

    /// The segment this branch is addressed by in a path.
    pub fn key(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.label)
    }

    pub fn parent(&self) -> Option<BranchId> {
        self.parent
    }

    pub fn children(&self) -> &[BranchId] {
        &self.children
    }

    /// Providers and child types found in the resource group this
    /// `providers` branch belongs to, once filtering has run.
    pub fn providers_in_scope(&self) -> Option<&ProviderMap> {
        self.resource_group_providers.as_ref()
    }
}

/// Label, sort key and icon for instance branches of one resource type.
struct BranchOverride {
    suffix: &'static str,
    label: Option<fn(&Value) -> Option<String>>,
    sort_key: Option<fn(&Value) -> Option<String>>,
    icon: Option<fn(&Value) -> Option<BranchIcon>>,
    descending: bool,
}

const DEFAULT_OVERRIDE: BranchOverride = BranchOverride {
    suffix: "",
    label: None,
    sort_key: None,
    icon: None,
    descending: false,
};

const BRANCH_OVERRIDES: &[BranchOverride] = &[
    BranchOverride {
        suffix: "providers/Microsoft.Resources/deployments/{name}",
        label: None,
        sort_key: Some(deployment_timestamp),
        icon: Some(provisioning_icon),
        descending: true,
    },
    BranchOverride {
        suffix: "providers/Microsoft.Resources/deployments/{name}/operations/{name}",
        label: Some(deployment_operation_label),
        sort_key: Some(deployment_timestamp),
        icon: Some(provisioning_icon),
        descending: true,
    },
];

fn override_for(definition: &ResourceDefinition) -> &'static BranchOverride {
    let url = definition.url.to_lowercase();
    BRANCH_OVERRIDES
        .iter()
        .find(|o| url.ends_with(&o.suffix.to_lowercase()))
        .unwrap_or(&DEFAULT_OVERRIDE)
}

fn deployment_timestamp(item: &Value) -> Option<String> {
    item.pointer("/properties/timestamp")?.as_str().map(str::to_string)
}

fn provisioning_icon(item: &Value) -> Option<BranchIcon> {
    match item.pointer("/properties/provisioningState")?.as_str()? {
        "Succeeded" => Some(BranchIcon::Succeeded),
        "Running" => Some(BranchIcon::Running),
        "Failed" => Some(BranchIcon::Failed),
        _ => None,
    }
}

fn deployment_operation_label(item: &Value) -> Option<String> {
    let text = |pointer: &str| item.pointer(pointer).and_then(Value::as_str).unwrap_or_default();
    if item.pointer("/properties/targetResource/resourceName").is_some() {
        Some(format!(
            "{} ({})",
            text("/properties/targetResource/resourceName"),
            text("/properties/targetResource/resourceType")
        ))
    } else {
        Some(format!(
            "{} ({})",
            text("/properties/provisioningOperation"),
            text("/operationId")
        ))
    }
}

/// Last segment of the decoded `id`, or `name` when there is no id.
fn csm_name(item: &Value) -> String {
    let raw = match item.get("id").and_then(Value::as_str) {
        Some(id) => urlencoding::decode(id)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| id.to_string()),
        None => item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };
    last_segment(&raw).to_string()
}

/// Collections read straight from the proxy rather than through an
/// invocation.
fn is_direct_listing(url: &str) -> bool {
    url.ends_with("resourceGroups") || url.ends_with("subscriptions") || path_segments(url).is_empty()
}

/// Longest shared `/`-token prefix of two resource URLs, lower-cased and
/// without scheme or host.
pub fn common_ancestor(a: &str, b: &str) -> String {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    path_segments(&a)
        .into_iter()
        .zip(path_segments(&b))
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| format!("/{x}"))
        .collect()
}

/// Slots of released branches are reused, so a `BranchId` is only valid
/// while its branch is still attached.
pub struct ResourceTree<'a> {
    table: &'a DefinitionTable,
    branches: Vec<TreeBranch<'a>>,
    free: Vec<usize>,
    roots: Vec<BranchId>,
}

impl<'a> ResourceTree<'a> {
    /// One root per supported root segment of the table.
    pub fn new(table: &'a DefinitionTable) -> Self {
        let mut tree = Self {
            table,
            branches: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
        };
        for definition in table.root_definitions() {
            let label = path_segments(&definition.url)
                .first()
                .map(|s| s.to_string())
                .unwrap_or_default();
            let mut branch = TreeBranch::new(&label, definition.url.clone(), definition);
            branch.is_leaf = false;
            let id = tree.push(branch);
            tree.roots.push(id);
        }
        tree
    }

    fn push(&mut self, branch: TreeBranch<'a>) -> BranchId {
        match self.free.pop() {
            Some(slot) => {
                self.branches[slot] = branch;
                BranchId(slot)
            }
            None => {
                self.branches.push(branch);
                BranchId(self.branches.len() - 1)
            }
        }
    }

    /// Detaches the children of `id` and frees their whole subtrees.
    fn release_children(&mut self, id: BranchId) {
        let mut pending = std::mem::take(&mut self.branches[id.0].children);
        while let Some(child) = pending.pop() {
            pending.append(&mut self.branches[child.0].children);
            self.free.push(child.0);
        }
    }

    #[cfg(test)]
    fn attached(&self) -> usize {
        self.branches.len() - self.free.len()
    }

    pub fn table(&self) -> &'a DefinitionTable {
        self.table
    }

    pub fn roots(&self) -> &[BranchId] {
        &self.roots
    }

    pub fn branch(&self, id: BranchId) -> &TreeBranch<'a> {
        &self.branches[id.0]
    }

    pub fn children(&self, id: BranchId) -> &[BranchId] {
        &self.branches[id.0].children
    }

    pub fn parent(&self, id: BranchId) -> Option<BranchId> {
        self.branches[id.0].parent
    }

    /// Whether the branch's parent is typed `element_type`, e.g. a
    /// subscription is an item of `subscriptions`.
    pub fn is_item_of(&self, id: BranchId, element_type: &str) -> bool {
        self.parent(id)
            .is_some_and(|p| self.branch(p).definition.resource_name == element_type)
    }

    /// The subscription instance at or above `id`.
    pub fn subscription_branch(&self, id: BranchId) -> Option<BranchId> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if self.is_item_of(candidate, "subscriptions") {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Expands `id`, logging and swallowing failures.
    pub fn expand(&mut self, id: BranchId, options: ExpandOptions, proxy: &dyn ArmProxy) {
        if let Err(err) = self.try_expand(id, options, proxy) {
            warn!(url = %self.branch(id).element_url, "expansion failed: {err:#}");
        }
    }

    /// Populates the children of `id`. Children are replaced only once the
    /// whole round has been fetched; on failure they are left as they were.
    /// Expanding an expanded branch refetches it and frees the old subtree.
    pub fn try_expand(&mut self, id: BranchId, options: ExpandOptions, proxy: &dyn ArmProxy) -> Result<()> {
        let branch = self.branch(id);
        if branch.is_leaf || branch.is_instruction {
            return Ok(());
        }
        let definition = branch.definition;
        match &definition.children {
            Children::Leaf => Ok(()),
            Children::Static(names) => self.expand_static(id, names, options, proxy),
            Children::Instance(_) => self.expand_instances(id, options, proxy),
        }
    }

    pub fn collapse(&mut self, id: BranchId) {
        self.release_children(id);
        self.branches[id.0].expanded = false;
    }

    /// Re-expands the parent of a "Show all" branch without filtering.
    pub fn show_all(&mut self, instruction: BranchId, proxy: &dyn ArmProxy) -> Result<()> {
        let Some(parent) = self.parent(instruction) else {
            bail!("instruction branch has no parent");
        };
        let options = ExpandOptions {
            no_auto_expand: true,
            show_unfiltered: true,
        };
        self.try_expand(parent, options, proxy)
    }

    fn expand_static(
        &mut self,
        id: BranchId,
        names: &'a [String],
        options: ExpandOptions,
        proxy: &dyn ArmProxy,
    ) -> Result<()> {
        let table = self.table;
        let branch = self.branch(id);
        let definition = branch.definition;
        let parent = branch.parent;
        let is_providers = branch.label.eq_ignore_ascii_case("providers");

        let mut scope: Option<ProviderMap> = None;
        if !options.show_unfiltered && is_providers {
            scope = self.resource_group_scope(id, proxy)?;
        }
        let inherited = parent.and_then(|p| self.branch(p).resource_group_providers.as_ref());

        let mut kept: Vec<&'a ResourceDefinition> = Vec::new();
        for name in names {
            let Some(child) = table.child_of(definition, name) else {
                continue;
            };
            if child.children.is_leaf() && child.has_post_action() {
                continue;
            }
            if !options.show_unfiltered {
                let present = if is_providers {
                    scope.as_ref().is_none_or(|map| map.contains_key(&name.to_uppercase()))
                } else if let Some(map) = inherited {
                    map.get(&branch.label.to_uppercase())
                        .is_some_and(|types| types.iter().any(|t| t.eq_ignore_ascii_case(name)))
                } else {
                    true
                };
                if !present {
                    continue;
                }
            }
            kept.push(child);
        }

        let filtered = kept.len() != names.len();
        let show_all = !options.show_unfiltered && filtered && (is_providers || inherited.is_some());
        let element_url = branch.element_url.clone();
        debug!(url = %element_url, kept = kept.len(), of = names.len(), "expanding static children");
        self.release_children(id);

        let mut children = Vec::with_capacity(kept.len() + 1);
        if show_all {
            let mut instruction = TreeBranch::new(SHOW_ALL_LABEL, element_url.clone(), definition);
            instruction.is_instruction = true;
            instruction.is_leaf = true;
            instruction.parent = Some(id);
            children.push(self.push(instruction));
        }
        for child in kept {
            let mut node = TreeBranch::new(
                &child.resource_name,
                format!("{element_url}/{}", child.resource_name),
                child,
            );
            node.sort_value = Some(child.resource_name.clone());
            node.parent = Some(id);
            children.push(self.push(node));
        }

        let branch = &mut self.branches[id.0];
        branch.children = children;
        branch.expanded = true;
        if scope.as_ref().is_some_and(|map| !map.is_empty()) {
            branch.resource_group_providers = scope;
        } else if options.show_unfiltered {
            branch.resource_group_providers = None;
        }

        self.auto_expand(id, options, proxy);
        Ok(())
    }

    /// Providers present in the resource group a `providers` branch sits
    /// under. `None` when the branch is not below a resource group.
    fn resource_group_scope(&self, id: BranchId, proxy: &dyn ArmProxy) -> Result<Option<ProviderMap>> {
        let Some(group) = self.parent(id).filter(|p| self.is_item_of(*p, "resourceGroups")) else {
            return Ok(None);
        };
        let Some(subscription) = self.subscription_branch(id) else {
            return Ok(None);
        };
        let subscription_id = self.branch(subscription).key().to_string();
        let group_name = self.branch(group).key().to_string();
        let map = proxy
            .fetch_providers_for_scope(&subscription_id, Some(&group_name))
            .with_context(|| format!("providers of {subscription_id}/{group_name}"))?;
        Ok(Some(map))
    }

    fn expand_instances(&mut self, id: BranchId, options: ExpandOptions, proxy: &dyn ArmProxy) -> Result<()> {
        let table = self.table;
        let branch = self.branch(id);
        let definition = branch.definition;
        let element_url = branch.element_url.clone();
        let Children::Instance(placeholder) = &definition.children else {
            return Ok(());
        };
        let child_definition = table
            .child_of(definition, placeholder)
            .with_context(|| format!("no definition for instances of {}", definition.url))?;

        let items = if is_direct_listing(&element_url) {
            proxy.fetch_instances(&element_url)?
        } else {
            let request = InvokeRequest::new(HttpMethod::Get, &element_url, definition.api_version.as_deref());
            let response = proxy.invoke(&request)?;
            if !response.is_success() {
                bail!("GET {element_url}: http {}: {}", response.status, response.data);
            }
            unwrap_list(response.data).with_context(|| format!("list instances of {element_url}"))?
        };

        let projection = override_for(child_definition);
        let mut nodes: Vec<TreeBranch<'a>> = items
            .iter()
            .map(|item| {
                let csm = csm_name(item);
                let label = projection
                    .label
                    .and_then(|f| f(item))
                    .or_else(|| item.get("displayName").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| csm.clone());
                let value = item
                    .get("subscriptionId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(csm);
                let mut node = TreeBranch::new(&label, format!("{element_url}/{value}"), child_definition);
                node.sort_value = Some(projection.sort_key.and_then(|f| f(item)).unwrap_or(label));
                node.icon_name_override = projection.icon.and_then(|f| f(item));
                node.value = Some(value);
                node.parent = Some(id);
                node
            })
            .collect();
        nodes.sort_by(|a, b| {
            let a = a.sort_value.as_deref().unwrap_or_default().to_lowercase();
            let b = b.sort_value.as_deref().unwrap_or_default().to_lowercase();
            if projection.descending { b.cmp(&a) } else { a.cmp(&b) }
        });
        info!(url = %element_url, instances = nodes.len(), "expanded instances");
        self.release_children(id);

        let children = nodes.into_iter().map(|n| self.push(n)).collect();
        let branch = &mut self.branches[id.0];
        branch.children = children;
        branch.expanded = true;

        self.auto_expand(id, options, proxy);
        Ok(())
    }

    fn auto_expand(&mut self, id: BranchId, options: ExpandOptions, proxy: &dyn ArmProxy) {
        if options.no_auto_expand {
            return;
        }
        let real: Vec<BranchId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|c| !self.branch(*c).is_instruction)
            .collect();
        if let [only] = real.as_slice() {
            self.expand(*only, ExpandOptions::default(), proxy);
        }
    }

    /// URL the branch is read with: the element itself, or its `list`
    /// endpoint for POST-listed resources. `None` unless exactly one
    /// GET-like verb is declared.
    pub fn get_action_url(&self, id: BranchId) -> Option<String> {
        let branch = self.branch(id);
        match branch.definition.get_actions().as_slice() {
            [ActionTag::GetPost] => Some(format!("{}/list", branch.element_url)),
            [_] => Some(branch.element_url.clone()),
            _ => None,
        }
    }

    /// What a script generator needs to describe the branch.
    pub fn selection(&self, id: BranchId) -> Option<Selection<'a>> {
        let branch = self.branch(id);
        if branch.is_instruction {
            return None;
        }
        let url = self.get_action_url(id)?;
        let method = if branch.definition.has_action(ActionTag::GetPost) {
            HttpMethod::Post
        } else {
            HttpMethod::Get
        };
        Some(Selection::new(url, method, branch.definition))
    }

    pub fn actions_and_verbs(&self, id: BranchId) -> Vec<Action> {
        let branch = self.branch(id);
        let url = self
            .get_action_url(id)
            .unwrap_or_else(|| branch.element_url.clone());
        self.table.actions_for(branch.definition, &url)
    }

    /// Follows a `/`-separated path of labels or values from the roots,
    /// expanding as it goes. Returns the deepest branch reached.
    pub fn navigate(&mut self, path: &str, proxy: &dyn ArmProxy) -> Option<BranchId> {
        self.navigate_from(None, path, proxy)
    }

    pub fn navigate_from(
        &mut self,
        start: Option<BranchId>,
        path: &str,
        proxy: &dyn ArmProxy,
    ) -> Option<BranchId> {
        let options = ExpandOptions {
            no_auto_expand: true,
            show_unfiltered: false,
        };
        let mut current = start;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let candidates: Vec<BranchId> = match current {
                Some(id) => {
                    if !self.branch(id).expanded {
                        self.expand(id, options, proxy);
                    }
                    self.children(id).to_vec()
                }
                None => self.roots.clone(),
            };
            let found = candidates.into_iter().find(|c| {
                let branch = self.branch(*c);
                !branch.is_instruction && branch.key().eq_ignore_ascii_case(segment)
            });
            match found {
                Some(id) => current = Some(id),
                None => {
                    debug!(segment, "path segment not found");
                    break;
                }
            }
        }
        if let Some(id) = current {
            if !self.branch(id).expanded {
                self.expand(id, options, proxy);
            }
        }
        current
    }

    /// Moves from `from` to the resource `resource_id`, climbing to the
    /// closest shared ancestor first so already expanded branches are
    /// reused.
    pub fn reveal(
        &mut self,
        from: Option<BranchId>,
        resource_id: &str,
        proxy: &dyn ArmProxy,
    ) -> Option<BranchId> {
        let mut start = None;
        let mut rest = resource_id;
        if let Some(from) = from {
            let ancestor = common_ancestor(&self.branch(from).element_url, resource_id);
            let mut current = Some(from);
            while let Some(id) = current {
                if ancestor.is_empty() {
                    current = None;
                    break;
                }
                if self.branch(id).element_url.to_lowercase().ends_with(&ancestor) {
                    break;
                }
                current = self.parent(id);
            }
            if let Some(id) = current {
                let consumed = resource_id_of(&self.branch(id).element_url).len();
                start = Some(id);
                rest = resource_id.get(consumed..).unwrap_or_default();
            }
        }
        self.navigate_from(start, rest, proxy)
    }

    /// Labels from the root down to `id`.
    pub fn path_of(&self, id: BranchId) -> Vec<&str> {
        let mut labels = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            labels.push(self.branch(c).key());
            current = self.parent(c);
        }
        labels.reverse();
        labels
    }
}
