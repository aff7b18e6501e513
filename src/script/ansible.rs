use serde_json::Value;
use tracing::warn;

use super::{CommandKind, ScriptParameterResolver, ScriptParameters, SupportedCommand};
use crate::definitions::ResourceDefinition;
use crate::docs::is_blank;
use crate::url_parser::ResourceIdentifier;

const TASK_ARGS: &str = "        ";
const BODY_ARGS: &str = "          ";

pub struct AnsibleScriptGenerator<'r, 'a> {
    resolver: &'r ScriptParameterResolver<'a>,
    definition: &'r ResourceDefinition,
    params: ScriptParameters,
    actions_index: usize,
}

impl<'r, 'a> AnsibleScriptGenerator<'r, 'a> {
    pub fn new(resolver: &'r ScriptParameterResolver<'a>, definition: &'r ResourceDefinition) -> Self {
        Self {
            params: resolver.parameters(),
            resolver,
            definition,
            actions_index: 0,
        }
    }

    /// One single-task playbook per command.
    pub fn script(&mut self, command: &SupportedCommand) -> String {
        let r = self.resolver;
        let mut out = String::from("- hosts: localhost\n  tasks:\n");
        match command.cmd {
            CommandKind::Get => {
                self.task(&mut out, "GET", r.action_name(), "azure_rm_resource_facts");
                self.resource_id(&mut out, command);
            }
            CommandKind::New => {
                let title = if command.is_set_action { "SET" } else { "CREATE" };
                self.task(&mut out, title, r.action_name(), "azure_rm_resource");
                self.resource_id(&mut out, command);
                self.definition_body(&mut out);
            }
            CommandKind::Set => {
                self.task(&mut out, "SET", r.action_name_from_list(), "azure_rm_resource");
                self.resource_id(&mut out, command);
                self.definition_body(&mut out);
            }
            CommandKind::RemoveAction => {
                self.task(
                    &mut out,
                    "DELETE",
                    r.action_name_from_action(self.actions_index),
                    "azure_rm_resource",
                );
                self.resource_id(&mut out, command);
                out.push_str(TASK_ARGS);
                out.push_str("state: absent\n");
                self.actions_index += 1;
            }
            CommandKind::Invoke | CommandKind::InvokeAction if command.is_action => {
                self.task(
                    &mut out,
                    "Action",
                    r.action_name_from_action(self.actions_index),
                    "azure_rm_resource",
                );
                out.push_str(TASK_ARGS);
                out.push_str("method: POST\n");
                self.resource_id(&mut out, command);
                if let Some(body) = r
                    .action(self.actions_index)
                    .and_then(|a| a.request_body.as_ref())
                    .filter(|b| !is_blank(b))
                {
                    write_body(&mut out, body);
                }
                self.actions_index += 1;
            }
            CommandKind::Invoke | CommandKind::InvokeAction => {
                self.task(&mut out, "LIST", r.action_name_from_list(), "azure_rm_resource");
                self.resource_id(&mut out, command);
            }
            CommandKind::NewResourceGroup => {
                self.task(&mut out, "CREATE", r.action_name(), "azure_rm_resource");
                self.api_version(&mut out);
                out.push_str(TASK_ARGS);
                out.push_str("resource_group: NewResourceGroup\n");
                out.push_str(TASK_ARGS);
                out.push_str("body:\n");
                out.push_str(BODY_ARGS);
                out.push_str("location: eastus\n");
            }
        }
        out.push_str("\n\n");
        out
    }

    fn task(&self, out: &mut String, title: &str, name: &str, module: &str) {
        let name = quoted(&format!("{title} {name}"));
        out.push_str(&format!("    - name: {name}\n      {module}:\n"));
    }

    fn definition_body(&self, out: &mut String) {
        if let Some(body) = self.definition.request_body.as_ref().filter(|b| !is_blank(b)) {
            write_body(out, body);
        }
    }

    fn api_version(&self, out: &mut String) {
        if let Some(version) = &self.params.api_version {
            arg(out, "api_version", &quoted(version));
        }
    }

    fn resource_id(&self, out: &mut String, command: &SupportedCommand) {
        self.api_version(out);
        match &self.params.resource_identifier {
            ResourceIdentifier::IdOnly { resource_id } => arg(out, "url", resource_id),
            ResourceIdentifier::GroupType {
                resource_group,
                resource_type,
            } => {
                type_args(out, resource_group, resource_type);
                if command.cmd == CommandKind::New && !command.is_set_action {
                    arg(out, "resource_name", "'{{ name }}'");
                }
            }
            ResourceIdentifier::GroupTypeName {
                resource_group,
                resource_type,
                resource_name,
            } => {
                type_args(out, resource_group, resource_type);
                let mut names = resource_name.split('/');
                arg(out, "resource_name", &quoted(names.next().unwrap_or_default()));
                let subresource = match names.next() {
                    Some(sub) => Some(sub),
                    None if command.is_action => {
                        Some(self.resolver.action_name_from_action(self.actions_index))
                    }
                    None => None,
                };
                if let Some(sub) = subresource {
                    out.push_str(&format!("{TASK_ARGS}subresource:\n{TASK_ARGS}  - type: {}\n", quoted(sub)));
                }
            }
        }
    }
}

fn arg(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("{TASK_ARGS}{key}: {value}\n"));
}

/// `Microsoft.Web/sites` -> provider `Web`, type `sites`.
fn type_args(out: &mut String, resource_group: &str, resource_type: &str) {
    let mut parts = resource_type.split('/');
    let namespace = parts.next().unwrap_or_default();
    let provider = namespace.split_once('.').map_or(namespace, |(_, p)| p);
    arg(out, "resource_group", &quoted(resource_group));
    arg(out, "provider", &quoted(provider));
    arg(out, "resource_type", &quoted(parts.next().unwrap_or_default()));
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn write_body(out: &mut String, body: &Value) {
    out.push_str(TASK_ARGS);
    out.push_str("body:\n");
    out.push_str(&yaml_block(body, BODY_ARGS));
}

/// YAML for `value`, every line prefixed with `indent`.
pub fn yaml_block(value: &Value, indent: &str) -> String {
    let yaml = match serde_yaml::to_string(value) {
        Ok(yaml) => yaml,
        Err(err) => {
            warn!(%err, "request body is not representable as yaml");
            return String::new();
        }
    };
    yaml.lines()
        .map(|line| format!("{indent}{line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{ActionTag, Children};
    use crate::operation::HttpMethod;
    use crate::script::fixtures::*;
    use crate::script::{Selection, ansible_script};
    use serde_json::json;

    fn parse(script: &str) -> Value {
        serde_yaml::from_str(script).unwrap()
    }

    #[test]
    fn site_playbooks() {
        let mut def = site();
        def.request_body = Some(json!({
            "location": "West US",
            "properties": {"serverFarmId": "farm:1", "siteConfig": {"alwaysOn": true, "numberOfWorkers": 2}},
            "tags": ["a", "yes", "007"]
        }));
        let actions = site_actions();
        let selection = Selection::new(SITE_URL, HttpMethod::Get, &def);
        let script = ansible_script(&selection, &actions, &def);

        assert!(script.starts_with(
            "# Ansible Playbooks\n\n- hosts: localhost\n  tasks:\n    - name: 'GET app1'\n      azure_rm_resource_facts:\n\
             \x20       api_version: '2022-03-01'\n\
             \x20       resource_group: 'rg1'\n\
             \x20       provider: 'Web'\n\
             \x20       resource_type: 'sites'\n\
             \x20       resource_name: 'app1'\n\n\n"
        ));

        let plays = parse(&script);
        let plays = plays.as_array().unwrap();
        assert_eq!(plays.len(), 4);
        let set = &plays[1]["tasks"][0];
        assert_eq!(set["name"], "SET app1");
        assert_eq!(set["azure_rm_resource"]["body"], *def.request_body.as_ref().unwrap());

        let delete = &plays[2]["tasks"][0]["azure_rm_resource"];
        assert_eq!(delete["state"], "absent");

        let action = &plays[3]["tasks"][0];
        assert_eq!(action["name"], "Action restart");
        assert_eq!(action["azure_rm_resource"]["method"], "POST");
        assert_eq!(action["azure_rm_resource"]["subresource"][0]["type"], "restart");
        assert_eq!(action["azure_rm_resource"]["body"], json!({"softRestart": true}));
    }

    #[test]
    fn create_in_collection_and_resource_group() {
        let def = definition(
            "/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Web/sites",
            &[ActionTag::Get, ActionTag::Create],
            Children::Instance("{name}".to_string()),
        );
        let url = "/subscriptions/abc/resourceGroups/rg1/providers/Microsoft.Web/sites";
        let selection = Selection::new(url, HttpMethod::Get, &def);
        let script = ansible_script(&selection, &[], &def);
        assert!(script.contains("    - name: 'CREATE sites'\n"));
        assert!(script.contains("        resource_name: '{{ name }}'\n"));

        let def = definition(
            "/subscriptions/{id}/resourceGroups",
            &[ActionTag::Create],
            Children::Instance("{name}".to_string()),
        );
        let selection = Selection::new("/subscriptions/abc/resourceGroups", HttpMethod::Get, &def);
        let plays = parse(&ansible_script(&selection, &[], &def));
        let task = &plays[1]["tasks"][0]["azure_rm_resource"];
        assert_eq!(task["resource_group"], "NewResourceGroup");
        assert_eq!(task["body"]["location"], "eastus");
        assert_eq!(plays[0]["tasks"][0]["azure_rm_resource_facts"]["url"], "/subscriptions/abc/resourceGroups");
    }

    #[test]
    fn names_with_yaml_indicators_stay_strings() {
        let def = site();
        let actions = vec![crate::definitions::Action::new(
            HttpMethod::Post,
            "reboot",
            &format!("{SITE_URL}/*reboot: now"),
        )];
        let selection = Selection::new(SITE_URL, HttpMethod::Get, &def);
        let plays = parse(&ansible_script(&selection, &actions, &def));
        let task = &plays.as_array().unwrap().last().unwrap()["tasks"][0];
        assert_eq!(task["name"], "Action *reboot: now");
        assert_eq!(task["azure_rm_resource"]["subresource"][0]["type"], "*reboot: now");
    }

    #[test]
    fn body_block_is_indented() {
        let block = yaml_block(&json!({"a": {"b": [1, 2]}, "empty": {}}), "  ");
        assert_eq!(block, "  a:\n    b:\n    - 1\n    - 2\n  empty: {}\n");
    }
}
