//! `az` command lines. A handful of well-known resource shapes get their
//! dedicated `az` verbs; everything else uses `az resource`.

use super::{CommandKind, ScriptParameterResolver};

const NEW_RESOURCE_GROUP: &str = "az group create --location westus --name NewResourceGroupName\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliResourceShape {
    Subscriptions,
    Subscription,
    SubscriptionLocations,
    ResourceGroups,
    ResourceGroup,
    WebApps,
    WebApp,
    GenericResource,
}

type ShapeHandler = fn(&ScriptParameterResolver<'_>, CommandKind) -> Option<String>;

impl CliResourceShape {
    /// Classifies a resource id (`/subscriptions/...`) by its suffix and
    /// segment positions. Checks run in a fixed order; the first hit wins.
    pub fn classify(resource_id: &str) -> Self {
        let id = resource_id.to_lowercase();
        if id.ends_with("/subscriptions") {
            return CliResourceShape::Subscriptions;
        }
        if id.ends_with("/locations") {
            return CliResourceShape::SubscriptionLocations;
        }
        if id.ends_with("/resourcegroups") {
            return CliResourceShape::ResourceGroups;
        }
        let parts: Vec<&str> = id.split('/').collect();
        if parts.len() == 3 {
            return CliResourceShape::Subscription;
        }
        if parts.len() >= 2 && parts[parts.len() - 2] == "resourcegroups" {
            return CliResourceShape::ResourceGroup;
        }
        if id.ends_with("/microsoft.web/sites") {
            return CliResourceShape::WebApps;
        }
        if let Some((parent, _)) = id.rsplit_once('/') {
            if parent.ends_with("/microsoft.web/sites") {
                return CliResourceShape::WebApp;
            }
        }
        CliResourceShape::GenericResource
    }

    fn handler(self) -> ShapeHandler {
        match self {
            CliResourceShape::Subscriptions => subscriptions,
            CliResourceShape::Subscription => subscription,
            CliResourceShape::SubscriptionLocations => subscription_locations,
            CliResourceShape::ResourceGroups => resource_groups,
            CliResourceShape::ResourceGroup => resource_group,
            CliResourceShape::WebApps => web_apps,
            CliResourceShape::WebApp => web_app,
            CliResourceShape::GenericResource => generic_only,
        }
    }
}

pub struct CliScriptGenerator<'r, 'a> {
    resolver: &'r ScriptParameterResolver<'a>,
    shape: CliResourceShape,
}

impl<'r, 'a> CliScriptGenerator<'r, 'a> {
    pub fn new(resolver: &'r ScriptParameterResolver<'a>) -> Self {
        let shape = CliResourceShape::classify(resolver.complete_resource_id());
        Self { resolver, shape }
    }

    pub fn shape(&self) -> CliResourceShape {
        self.shape
    }

    pub fn script(&self) -> String {
        let handler = self.shape.handler();
        self.resolver
            .supported_commands()
            .iter()
            .map(|command| {
                handler(self.resolver, command.cmd)
                    .unwrap_or_else(|| generic_resource(self.resolver, command.cmd))
            })
            .collect()
    }
}

fn api_version_flag(resolver: &ScriptParameterResolver<'_>) -> String {
    resolver
        .parameters()
        .api_version
        .map(|v| format!(" --api-version {v}"))
        .unwrap_or_default()
}

fn generic_resource(resolver: &ScriptParameterResolver<'_>, cmd: CommandKind) -> String {
    let id = resolver.complete_resource_id();
    let api = api_version_flag(resolver);
    match cmd {
        CommandKind::Get => format!("az resource show --id {id}{api}\n\n"),
        CommandKind::Set => {
            format!("az resource update --id {id}{api} --set properties.key=value\n\n")
        }
        CommandKind::New | CommandKind::NewResourceGroup => {
            format!("az resource create --id {id}{api} --properties {{}}\n\n")
        }
        CommandKind::RemoveAction => format!("az resource delete --id {id}{api}\n\n"),
        CommandKind::Invoke | CommandKind::InvokeAction => String::new(),
    }
}

fn generic_only(_: &ScriptParameterResolver<'_>, _: CommandKind) -> Option<String> {
    None
}

fn subscriptions(_: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    (cmd == CommandKind::Get).then(|| "az account list\n\n".to_string())
}

fn subscription(resolver: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    (cmd == CommandKind::Get)
        .then(|| format!("az account show --subscription {}\n\n", resolver.subscription_id()))
}

fn subscription_locations(_: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    (cmd == CommandKind::Get).then(|| "az account list-locations\n\n".to_string())
}

fn resource_groups(_: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    match cmd {
        CommandKind::Get => Some("az group list\n\n".to_string()),
        CommandKind::NewResourceGroup => Some(NEW_RESOURCE_GROUP.to_string()),
        _ => None,
    }
}

fn resource_group(resolver: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    let group = resolver.resource_group();
    match cmd {
        CommandKind::Get => Some(format!("az group show --name \"{group}\"\n\n")),
        CommandKind::Set => Some(format!("az group update --name \"{group}\" <properties>\n\n")),
        CommandKind::RemoveAction => Some(format!("az group delete --name \"{group}\"\n\n")),
        CommandKind::NewResourceGroup => Some(NEW_RESOURCE_GROUP.to_string()),
        _ => None,
    }
}

fn web_app_create(resolver: &ScriptParameterResolver<'_>) -> String {
    format!(
        "az webapp create --resource-group \"{}\" --plan planName --name NewWebAppName\n\n",
        resolver.resource_group()
    )
}

fn web_apps(resolver: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    match cmd {
        CommandKind::Get => Some(format!(
            "az webapp list --resource-group \"{}\"\n\n",
            resolver.resource_group()
        )),
        CommandKind::New => Some(web_app_create(resolver)),
        _ => None,
    }
}

fn web_app(resolver: &ScriptParameterResolver<'_>, cmd: CommandKind) -> Option<String> {
    let params = resolver.parameters();
    let name = params.resource_identifier.resource_name().unwrap_or_default();
    let group = resolver.resource_group();
    match cmd {
        CommandKind::Get => Some(format!(
            "az webapp show --name \"{name}\" --resource-group \"{group}\"\n\n"
        )),
        CommandKind::New => Some(web_app_create(resolver)),
        CommandKind::RemoveAction => Some(format!(
            "az webapp delete --name \"{name}\" --resource-group \"{group}\"\n\n"
        )),
        _ => None,
    }
}
