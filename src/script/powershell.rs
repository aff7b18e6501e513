use serde_json::Value;
use tracing::debug;

use super::{CommandKind, ScriptParameterResolver, ScriptParameters, SupportedCommand};
use crate::url_parser::ResourceIdentifier;

const PROPERTIES_PLACEHOLDER: &str = "@{\n\t#Property = value;\n}";

pub struct PowerShellScriptGenerator<'r, 'a> {
    resolver: &'r ScriptParameterResolver<'a>,
    params: ScriptParameters,
    actions_index: usize,
}

impl<'r, 'a> PowerShellScriptGenerator<'r, 'a> {
    pub fn new(resolver: &'r ScriptParameterResolver<'a>) -> Self {
        Self {
            params: resolver.parameters(),
            resolver,
            actions_index: 0,
        }
    }

    /// One block: a comment header, any variables the command refers to,
    /// then the cmdlet line.
    pub fn script(&mut self, command: &SupportedCommand) -> String {
        let prefix = self.prefix(command);
        let body = self.command_line(command);
        format!("{prefix}{body}\n\n")
    }

    fn prefix(&self, command: &SupportedCommand) -> String {
        let r = self.resolver;
        match command.cmd {
            CommandKind::Get => format!("# GET {}\n", r.action_name()),
            CommandKind::NewResourceGroup => format!(
                "# CREATE {}\n$ResourceLocation = \"West US\"\n$ResourceName = \"NewresourceGroup\"\n\n",
                r.action_name()
            ),
            CommandKind::RemoveAction => {
                format!("# DELETE {}\n", r.action_name_from_action(self.actions_index))
            }
            CommandKind::Set => format!(
                "# SET {}\n$PropertiesObject = {}\n",
                r.action_name_from_list(),
                self.properties_object()
            ),
            CommandKind::Invoke | CommandKind::InvokeAction if command.is_action => {
                let parameters = r
                    .action(self.actions_index)
                    .and_then(|a| a.request_body.as_ref())
                    .map(|body| format!("$ParametersObject = {}\n", powershell_literal(body, 0)))
                    .unwrap_or_default();
                format!(
                    "# Action {}\n{parameters}",
                    r.action_name_from_action(self.actions_index)
                )
            }
            CommandKind::Invoke | CommandKind::InvokeAction => {
                format!("# LIST {}\n", r.action_name_from_list())
            }
            CommandKind::New if command.is_set_action => format!(
                "# SET {}\n$PropertiesObject = {}\n",
                r.action_name(),
                self.properties_object()
            ),
            CommandKind::New => format!(
                "# CREATE {}\n$ResourceLocation = \"West US\"\n$ResourceName = \"New{}\"\n$PropertiesObject = {}\n",
                r.action_name(),
                r.resource_name(),
                self.properties_object()
            ),
        }
    }

    /// The `properties` member of the request body as a hashtable, or an
    /// empty template to fill in.
    fn properties_object(&self) -> String {
        self.resolver
            .definition_request_body()
            .and_then(|body| body.get("properties"))
            .filter(|p| p.as_object().is_some_and(|o| !o.is_empty()))
            .map(|p| powershell_literal(p, 0))
            .unwrap_or_else(|| PROPERTIES_PLACEHOLDER.to_string())
    }

    fn command_line(&mut self, command: &SupportedCommand) -> String {
        let cmdlet = command.cmd.powershell_cmdlet();
        let target = target_args(&self.params.resource_identifier);
        let api = api_args(&self.params);
        let mut args: Vec<String> = vec![cmdlet.to_string()];

        match command.cmd {
            CommandKind::Get => {
                args.extend(target);
                if self.params.is_collection {
                    args.push("-IsCollection".to_string());
                }
                args.extend(api);
            }
            CommandKind::Set => {
                args.extend(strs(&["-PropertyObject", "$PropertiesObject"]));
                args.extend(target);
                args.extend(api);
                args.push("-Force".to_string());
            }
            CommandKind::New => {
                let id = &self.params.resource_identifier;
                if matches!(id, ResourceIdentifier::IdOnly { .. }) {
                    debug!("no creation command for a resource addressed by id");
                    return String::new();
                }
                if command.is_set_action {
                    args.extend(strs(&["-PropertyObject", "$PropertiesObject"]));
                    args.extend(target);
                } else if let ResourceIdentifier::GroupTypeName {
                    resource_group,
                    resource_type,
                    resource_name,
                } = id
                {
                    args.extend(strs(&[
                        "-Location",
                        "$ResourceLocation",
                        "-PropertyObject",
                        "$PropertiesObject",
                        "-ResourceGroupName",
                    ]));
                    args.push(resource_group.clone());
                    args.push("-ResourceType".to_string());
                    args.push(resource_type.clone());
                    args.push("-ResourceName".to_string());
                    args.push(format!("\"{resource_name}/$ResourceName\""));
                } else {
                    args.extend(strs(&[
                        "-ResourceName",
                        "$ResourceName",
                        "-Location",
                        "$ResourceLocation",
                        "-PropertyObject",
                        "$PropertiesObject",
                    ]));
                    args.extend(target);
                }
                args.extend(api);
                args.push("-Force".to_string());
            }
            CommandKind::RemoveAction => {
                args.extend(target);
                args.extend(api);
                args.push("-Force".to_string());
                self.actions_index += 1;
            }
            CommandKind::Invoke | CommandKind::InvokeAction if command.is_action => {
                let action = self.resolver.action(self.actions_index);
                self.actions_index += 1;
                args.extend(action_target_args(&self.params.resource_identifier));
                args.push("-Action".to_string());
                args.push(action.map(|a| a.name.clone()).unwrap_or_default());
                if action.is_some_and(|a| a.request_body.is_some()) {
                    args.extend(strs(&["-Parameters", "$ParametersObject"]));
                }
                args.extend(api);
                args.push("-Force".to_string());
            }
            CommandKind::Invoke | CommandKind::InvokeAction => {
                args.extend(target);
                args.extend(strs(&["-Action", "list"]));
                args.extend(api);
                args.push("-Force".to_string());
                return format!("$resource = {}\n$resource.Properties", args.join(" "));
            }
            CommandKind::NewResourceGroup => {
                args.extend(strs(&["-Location", "$ResourceLocation", "-Name", "$ResourceName"]));
            }
        }
        args.join(" ")
    }
}

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn target_args(id: &ResourceIdentifier) -> Vec<String> {
    match id {
        ResourceIdentifier::IdOnly { resource_id } => vec!["-ResourceId".to_string(), resource_id.clone()],
        ResourceIdentifier::GroupType {
            resource_group,
            resource_type,
        } => vec![
            "-ResourceGroupName".to_string(),
            resource_group.clone(),
            "-ResourceType".to_string(),
            resource_type.clone(),
        ],
        ResourceIdentifier::GroupTypeName {
            resource_group,
            resource_type,
            resource_name,
        } => vec![
            "-ResourceGroupName".to_string(),
            resource_group.clone(),
            "-ResourceType".to_string(),
            resource_type.clone(),
            "-ResourceName".to_string(),
            format!("\"{resource_name}\""),
        ],
    }
}

/// Resource actions name the resource bare.
fn action_target_args(id: &ResourceIdentifier) -> Vec<String> {
    match id {
        ResourceIdentifier::GroupTypeName {
            resource_group,
            resource_type,
            resource_name,
        } => vec![
            "-ResourceGroupName".to_string(),
            resource_group.clone(),
            "-ResourceType".to_string(),
            resource_type.clone(),
            "-ResourceName".to_string(),
            resource_name.clone(),
        ],
        other => target_args(other),
    }
}

fn api_args(params: &ScriptParameters) -> Vec<String> {
    match &params.api_version {
        Some(version) => vec!["-ApiVersion".to_string(), version.clone()],
        None => Vec::new(),
    }
}

/// Renders a JSON value as a PowerShell literal. Objects become `@{}`
/// hashtables and arrays `@()`, one entry per line, indented with tabs.
pub fn powershell_literal(value: &Value, depth: usize) -> String {
    let tabs = "\t".repeat(depth);
    match value {
        Value::Null => "$null".to_string(),
        Value::Bool(true) => "$true".to_string(),
        Value::Bool(false) => "$false".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", escape_string(s)),
        Value::Array(items) => {
            let mut out = String::from("@(\n");
            for item in items {
                out.push_str(&format!("{tabs}\t{}\n", powershell_literal(item, depth + 1)));
            }
            out.push_str(&tabs);
            out.push(')');
            out
        }
        Value::Object(map) => {
            let mut out = String::from("@{\n");
            for (key, item) in map {
                out.push_str(&format!(
                    "{tabs}\t{} = {}\n",
                    hashtable_key(key),
                    powershell_literal(item, depth + 1)
                ));
            }
            out.push_str(&tabs);
            out.push('}');
            out
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '`' | '"' | '$' => {
                out.push('`');
                out.push(c);
            }
            '\n' => out.push_str("`n"),
            '\r' => out.push_str("`r"),
            '\t' => out.push_str("`t"),
            _ => out.push(c),
        }
    }
    out
}

fn hashtable_key(key: &str) -> String {
    let bare = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        key.to_string()
    } else {
        format!("'{}'", key.replace('\'', "''"))
    }
}
