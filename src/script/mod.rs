//! Script generation for a selected resource.
//!
//! The selection's URL is parsed once ([`ArmUrl`]), folded into an ordered
//! list of [`SupportedCommand`]s by [`ScriptParameterResolver`], and every
//! target renders one block per command from that same list.

pub mod ansible;
pub mod cli;
pub mod powershell;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::definitions::{Action, ActionTag, Children, ResourceDefinition};
use crate::docs::is_blank;
use crate::normalize::last_segment;
use crate::operation::HttpMethod;
use crate::url_parser::{ArmUrl, ResourceIdentifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandKind {
    Get,
    Invoke,
    InvokeAction,
    Set,
    New,
    RemoveAction,
    NewResourceGroup,
}

impl CommandKind {
    pub fn powershell_cmdlet(self) -> &'static str {
        match self {
            CommandKind::Get => "Get-AzureRmResource",
            CommandKind::Invoke | CommandKind::InvokeAction => "Invoke-AzureRmResourceAction",
            CommandKind::Set => "Set-AzureRmResource",
            CommandKind::New => "New-AzureRmResource",
            CommandKind::RemoveAction => "Remove-AzureRmResource",
            CommandKind::NewResourceGroup => "New-AzureRmResourceGroup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupportedCommand {
    pub cmd: CommandKind,
    /// Renders one entry of the selection's action list.
    pub is_action: bool,
    /// A PUT/PATCH against the selected resource itself.
    pub is_set_action: bool,
}

impl SupportedCommand {
    pub fn plain(cmd: CommandKind) -> Self {
        Self {
            cmd,
            is_action: false,
            is_set_action: false,
        }
    }

    fn set(cmd: CommandKind) -> Self {
        Self {
            is_set_action: true,
            ..Self::plain(cmd)
        }
    }

    fn action(cmd: CommandKind) -> Self {
        Self {
            is_action: true,
            ..Self::plain(cmd)
        }
    }
}

/// The resource a script is generated for: the URL and verb it is read
/// with, and its definition.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub url: String,
    pub http_method: HttpMethod,
    pub definition: &'a ResourceDefinition,
}

impl<'a> Selection<'a> {
    pub fn new(url: impl Into<String>, http_method: HttpMethod, definition: &'a ResourceDefinition) -> Self {
        Self {
            url: url.into(),
            http_method,
            definition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptParameters {
    pub api_version: Option<String>,
    pub resource_identifier: ResourceIdentifier,
    pub is_collection: bool,
}

pub struct ScriptParameterResolver<'a> {
    url: ArmUrl,
    definition: &'a ResourceDefinition,
    actions: &'a [Action],
    commands: Vec<SupportedCommand>,
}

impl<'a> ScriptParameterResolver<'a> {
    pub fn new(selection: &Selection<'a>, actions: &'a [Action]) -> Self {
        let url = ArmUrl::parse(&selection.url, selection.http_method);
        let commands = supported_commands(&url, selection.definition, actions);
        debug!(url = %selection.url, ?commands, "resolved script commands");
        Self {
            url,
            definition: selection.definition,
            actions,
            commands,
        }
    }

    pub fn supported_commands(&self) -> &[SupportedCommand] {
        &self.commands
    }

    pub fn parameters(&self) -> ScriptParameters {
        let resource_identifier = self.url.resource_identifier();
        let is_collection = resource_identifier.resource_name().is_none()
            && matches!(self.definition.children, Children::Instance(_))
            && self.url.has_resource_provider();
        ScriptParameters {
            api_version: self.definition.api_version.clone(),
            resource_identifier,
            is_collection,
        }
    }

    pub fn resource_group(&self) -> &str {
        self.url.resource_group().unwrap_or_default()
    }

    pub fn subscription_id(&self) -> &str {
        self.url.subscription_id().unwrap_or_default()
    }

    pub fn complete_resource_id(&self) -> &str {
        self.url.complete_resource_id()
    }

    /// Last segment of the selected URL.
    pub fn action_name(&self) -> &str {
        last_segment(self.url.original_url())
    }

    pub fn action_name_from_list(&self) -> &str {
        last_segment(self.url.url())
    }

    /// The selected definition's request body, when it carries one.
    pub fn definition_request_body(&self) -> Option<&'a Value> {
        self.definition.request_body.as_ref().filter(|b| !is_blank(b))
    }

    pub fn action(&self, index: usize) -> Option<&'a Action> {
        self.actions.get(index)
    }

    pub fn action_name_from_action(&self, index: usize) -> &str {
        self.action(index)
            .map(|a| last_segment(&a.url))
            .unwrap_or_default()
    }

    /// Singular of the selected collection, e.g. `site` for `.../sites`.
    pub fn resource_name(&self) -> &str {
        let name = self.action_name();
        match name.char_indices().last() {
            Some((idx, _)) => &name[..idx],
            None => name,
        }
    }
}

fn supported_commands(
    url: &ArmUrl,
    definition: &ResourceDefinition,
    actions: &[Action],
) -> Vec<SupportedCommand> {
    let mut commands = Vec::new();

    if url.http_method() == HttpMethod::Get {
        commands.push(SupportedCommand::plain(CommandKind::Get));
    } else if url.http_method() == HttpMethod::Post
        && last_segment(url.original_url()).eq_ignore_ascii_case("list")
    {
        commands.push(SupportedCommand::plain(CommandKind::Invoke));
    }

    if definition.has_put_or_patch_action() {
        if definition.has_action(ActionTag::Get) {
            commands.push(SupportedCommand::set(CommandKind::Set));
        } else {
            commands.push(SupportedCommand::set(CommandKind::New));
        }
    }

    if definition.has_create_action() {
        if url.is_resource_group_url() {
            commands.push(SupportedCommand::plain(CommandKind::NewResourceGroup));
        } else {
            commands.push(SupportedCommand::plain(CommandKind::New));
        }
    }

    for action in actions {
        match action.http_method {
            HttpMethod::Delete => commands.push(SupportedCommand::action(CommandKind::RemoveAction)),
            HttpMethod::Post => commands.push(SupportedCommand::action(CommandKind::InvokeAction)),
            _ => {}
        }
    }
    commands
}

pub fn azure_cli_script(selection: &Selection<'_>) -> String {
    let resolver = ScriptParameterResolver::new(selection, &[]);
    cli::CliScriptGenerator::new(&resolver).script()
}

pub fn powershell_script(selection: &Selection<'_>, actions: &[Action]) -> String {
    let resolver = ScriptParameterResolver::new(selection, actions);
    let mut generator = powershell::PowerShellScriptGenerator::new(&resolver);
    let mut script = String::from("# PowerShell equivalent script\n\n");
    for command in resolver.supported_commands() {
        script.push_str(&generator.script(command));
    }
    script
}

pub fn ansible_script(
    selection: &Selection<'_>,
    actions: &[Action],
    definition: &ResourceDefinition,
) -> String {
    let resolver = ScriptParameterResolver::new(selection, actions);
    let mut generator = ansible::AnsibleScriptGenerator::new(&resolver, definition);
    let mut script = String::from("# Ansible Playbooks\n\n");
    for command in resolver.supported_commands() {
        script.push_str(&generator.script(command));
    }
    script
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn kinds(commands: &[SupportedCommand]) -> Vec<CommandKind> {
        commands.iter().map(|c| c.cmd).collect()
    }

    #[test]
    fn get_and_patch_resolve_to_set() {
        let def = definition(
            "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites/{name}",
            &[ActionTag::Get, ActionTag::Patch],
            Children::Leaf,
        );
        let selection = Selection::new(SITE_URL, HttpMethod::Get, &def);
        let resolver = ScriptParameterResolver::new(&selection, &[]);
        let kinds = kinds(resolver.supported_commands());
        assert!(kinds.contains(&CommandKind::Set));
        assert!(!kinds.contains(&CommandKind::New));
        assert!(resolver.supported_commands()[1].is_set_action);
    }

    #[test]
    fn put_without_get_resolves_to_new() {
        let def = definition(
            "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites/{name}",
            &[ActionTag::Put],
            Children::Leaf,
        );
        let selection = Selection::new(SITE_URL, HttpMethod::Get, &def);
        let resolver = ScriptParameterResolver::new(&selection, &[]);
        assert_eq!(
            resolver.supported_commands(),
            &[
                SupportedCommand::plain(CommandKind::Get),
                SupportedCommand::set(CommandKind::New)
            ]
        );
    }

    #[test]
    fn actions_follow_in_declaration_order() {
        let def = site();
        let actions = site_actions();
        let selection = Selection::new(SITE_URL, HttpMethod::Get, &def);
        let resolver = ScriptParameterResolver::new(&selection, &actions);
        assert_eq!(
            kinds(resolver.supported_commands()),
            vec![
                CommandKind::Get,
                CommandKind::Set,
                CommandKind::RemoveAction,
                CommandKind::InvokeAction
            ]
        );
        assert!(resolver.supported_commands()[3].is_action);
        assert_eq!(resolver.action_name_from_action(1), "restart");
        assert_eq!(resolver.action_name_from_action(7), "");
    }

    #[test]
    fn list_post_resolves_to_invoke() {
        let def = definition(
            "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites/{name}/config/appsettings",
            &[ActionTag::GetPost, ActionTag::Put],
            Children::Leaf,
        );
        let url = format!("{SITE_URL}/config/appsettings/list");
        let selection = Selection::new(url, HttpMethod::Post, &def);
        let resolver = ScriptParameterResolver::new(&selection, &[]);
        assert_eq!(
            kinds(resolver.supported_commands()),
            vec![CommandKind::Invoke, CommandKind::New]
        );
        assert_eq!(resolver.action_name(), "list");
        assert_eq!(resolver.action_name_from_list(), "appsettings");
    }

    #[test]
    fn collection_parameters() {
        let def = definition(
            "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites",
            &[ActionTag::Get, ActionTag::Create],
            Children::Instance("{name}".to_string()),
        );
        let url = "/subscriptions/abc/resourceGroups/rg1/providers/Microsoft.Web/sites";
        let selection = Selection::new(url, HttpMethod::Get, &def);
        let resolver = ScriptParameterResolver::new(&selection, &[]);
        let params = resolver.parameters();
        assert!(params.is_collection);
        assert_eq!(params.api_version.as_deref(), Some("2022-03-01"));
        assert_eq!(resolver.resource_name(), "site");
        assert_eq!(
            kinds(resolver.supported_commands()),
            vec![CommandKind::Get, CommandKind::New]
        );
    }
}
