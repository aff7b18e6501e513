use anyhow::{Context, Result, anyhow, bail};
use arm_explorer::config::ExplorerConfig;
use arm_explorer::definitions::{Action, DefinitionTable, ResourceDefinition};
use arm_explorer::docs::flatten_documentation;
use arm_explorer::normalize::last_segment;
use arm_explorer::operation::{HttpMethod, load_operations};
use arm_explorer::proxy::{ArmProxy, HttpProxy, InvokeRequest};
use arm_explorer::script::{Selection, ansible_script, azure_cli_script, powershell_script};
use arm_explorer::search::ResourceSearchCache;
use arm_explorer::tree::{ExpandOptions, ResourceTree};
use clap::parser::ValuesRef;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::{fs, io::Write};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    let config = ExplorerConfig::from_env()?.with_endpoint(matches.get_one::<String>("endpoint").cloned());
    let proxy = Arc::new(HttpProxy::from_config(&config)?);
    let pretty = matches.get_flag("pretty");
    let operations = matches.get_one::<String>("operations");

    match matches.subcommand() {
        Some(("definitions", sub)) => {
            let table = load_table(proxy.as_ref(), operations)?;
            handle_definitions(&table, sub, pretty)
        }
        Some(("describe", sub)) => {
            let table = load_table(proxy.as_ref(), operations)?;
            handle_describe(&table, sub, pretty)
        }
        Some(("show", sub)) => {
            let table = load_table(proxy.as_ref(), operations)?;
            handle_show(&table, proxy.as_ref(), sub, pretty)
        }
        Some(("expand", sub)) => {
            let table = load_table(proxy.as_ref(), operations)?;
            handle_expand(&table, proxy.as_ref(), sub)
        }
        Some(("script", sub)) => {
            let table = load_table(proxy.as_ref(), operations)?;
            handle_script(&table, sub)
        }
        Some(("search", sub)) => handle_search(proxy, &config, sub, pretty),
        Some(("invoke", sub)) => {
            let table = load_table(proxy.as_ref(), operations)?;
            handle_invoke(&table, proxy.as_ref(), sub, pretty)
        }
        _ => Err(anyhow!("subcommand required")),
    }
}

fn build_cli() -> Command {
    let json_flag = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Emit machine-readable JSON");
    let url_arg = Arg::new("url").required(true).help("Resource URL, e.g. /subscriptions/{id}");

    Command::new("arm-explorer")
        .about("Browse resource definitions and generate scripts for a resource-management API")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .global(true)
                .value_name("URL")
                .help("Backend proxy base URL (overrides ARM_EXPLORER_URL)"),
        )
        .arg(
            Arg::new("operations")
                .long("operations")
                .global(true)
                .value_name("PATH")
                .help("Read the operation catalog from a file instead of the proxy"),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Pretty-print JSON output"),
        )
        .subcommand(
            Command::new("definitions")
                .about("List resource definitions")
                .arg(json_flag.clone()),
        )
        .subcommand(
            Command::new("describe")
                .about("Describe the definition behind a URL")
                .arg(url_arg.clone())
                .arg(json_flag),
        )
        .subcommand(
            Command::new("show")
                .about("Read a resource through the proxy")
                .arg(url_arg.clone())
                .arg(
                    Arg::new("docs")
                        .long("docs")
                        .action(ArgAction::SetTrue)
                        .help("Print property documentation instead of the payload"),
                ),
        )
        .subcommand(
            Command::new("expand")
                .about("Expand the tree along a path and list the children reached")
                .arg(Arg::new("path").default_value("").help("e.g. subscriptions/{id}/resourceGroups"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Include children the scope has no resources for"),
                ),
        )
        .subcommand(
            Command::new("script")
                .about("Generate CLI, PowerShell or Ansible scripts for a resource")
                .arg(url_arg.clone())
                .arg(
                    Arg::new("method")
                        .long("method")
                        .default_value("GET")
                        .help("Verb the resource is read with (POST for list endpoints)"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_parser(["cli", "powershell", "ansible", "all"])
                        .default_value("all"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search resources by name or type")
                .arg(Arg::new("keyword").required(true)),
        )
        .subcommand(
            Command::new("invoke")
                .about("Invoke an operation through the proxy")
                .arg(Arg::new("method").required(true))
                .arg(url_arg)
                .arg(
                    Arg::new("api-version")
                        .long("api-version")
                        .value_name("VERSION")
                        .help("Defaults to the definition's api version"),
                )
                .arg(
                    Arg::new("query")
                        .long("query")
                        .action(ArgAction::Append)
                        .value_name("KEY=VALUE")
                        .help("Query param (repeatable)"),
                )
                .arg(
                    Arg::new("body")
                        .long("body")
                        .value_name("JSON")
                        .conflicts_with("body-file")
                        .help("JSON request body"),
                )
                .arg(
                    Arg::new("body-file")
                        .long("body-file")
                        .value_name("PATH")
                        .conflicts_with("body")
                        .help("Read JSON request body from file"),
                ),
        )
}

fn load_table(proxy: &dyn ArmProxy, operations: Option<&String>) -> Result<DefinitionTable> {
    match operations {
        Some(path) => Ok(DefinitionTable::build(&load_operations(Path::new(path))?)),
        None => DefinitionTable::fetch(proxy),
    }
}

fn find_definition<'a>(table: &'a DefinitionTable, url: &str) -> Result<&'a ResourceDefinition> {
    table
        .find_for_url(url)
        .ok_or_else(|| anyhow!("no resource definition matches {url}"))
}

fn handle_definitions(table: &DefinitionTable, matches: &ArgMatches, pretty: bool) -> Result<()> {
    if matches.get_flag("json") {
        return write_json_output(&serde_json::to_value(table)?, pretty);
    }
    for definition in table.definitions() {
        let actions: Vec<String> = definition
            .actions
            .iter()
            .map(|a| format!("{a:?}").to_uppercase())
            .collect();
        write_stdout_line(&format!("{} [{}]", definition.url, actions.join(",")))?;
    }
    for diagnostic in table.diagnostics() {
        write_stdout_line(&format!("! {diagnostic}"))?;
    }
    Ok(())
}

fn handle_describe(table: &DefinitionTable, matches: &ArgMatches, pretty: bool) -> Result<()> {
    let url = required(matches, "url")?;
    let definition = find_definition(table, url)?;
    let actions = table.actions_for(definition, url);

    if matches.get_flag("json") {
        let out = json!({
            "definition": definition,
            "httpMethods": definition.http_verbs(),
            "actions": actions,
        });
        return write_json_output(&out, pretty);
    }

    write_stdout_line(&format!("url: {}", definition.url))?;
    if let Some(version) = &definition.api_version {
        write_stdout_line(&format!("api version: {version}"))?;
    }
    let verbs: Vec<&str> = definition.http_verbs().iter().map(|v| v.as_str()).collect();
    write_stdout_line(&format!("http methods: {}", verbs.join(", ")))?;
    write_stdout_line(&format!("children: {}", serde_json::to_string(&definition.children)?))?;
    if !actions.is_empty() {
        write_stdout_line("actions:")?;
        for action in &actions {
            write_stdout_line(&format!("  {} {} {}", action.http_method, action.name, action.url))?;
        }
    }
    Ok(())
}

fn handle_show(table: &DefinitionTable, proxy: &dyn ArmProxy, matches: &ArgMatches, pretty: bool) -> Result<()> {
    let url = required(matches, "url")?;
    let definition = find_definition(table, url)?;
    let method = if url.ends_with("/list") { HttpMethod::Post } else { HttpMethod::Get };
    let request = InvokeRequest::new(method, url, definition.api_version.as_deref());
    let response = proxy.invoke(&request)?;

    if response.is_success() && matches.get_flag("docs") {
        let rows = flatten_documentation(Some(&response.data), definition.doc_body());
        for row in rows {
            write_stdout_line(&format!("{}: {}", row.name, row.doc))?;
        }
        return Ok(());
    }
    write_json_output(&response.data, pretty)?;
    if !response.is_success() {
        bail!("http {}", response.status);
    }
    Ok(())
}

fn handle_expand(table: &DefinitionTable, proxy: &dyn ArmProxy, matches: &ArgMatches) -> Result<()> {
    let path = matches.get_one::<String>("path").map(String::as_str).unwrap_or_default();
    let mut tree = ResourceTree::new(table);

    let children = match tree.navigate(path, proxy) {
        Some(id) => {
            if matches.get_flag("all") {
                let options = ExpandOptions {
                    no_auto_expand: true,
                    show_unfiltered: true,
                };
                tree.try_expand(id, options, proxy)?;
            }
            write_stdout_line(&tree.path_of(id).join("/"))?;
            tree.children(id).to_vec()
        }
        None => tree.roots().to_vec(),
    };

    for child in children {
        let branch = tree.branch(child);
        let marker = if branch.is_instruction {
            "*"
        } else if branch.is_leaf {
            "-"
        } else {
            "+"
        };
        if branch.key() == branch.label {
            write_stdout_line(&format!("  {marker} {}", branch.label))?;
        } else {
            write_stdout_line(&format!("  {marker} {} ({})", branch.key(), branch.label))?;
        }
    }
    Ok(())
}

fn handle_script(table: &DefinitionTable, matches: &ArgMatches) -> Result<()> {
    let url = required(matches, "url")?;
    let method: HttpMethod = required(matches, "method")?.parse()?;
    let definition = find_definition(table, url)?;
    let actions = table.actions_for(definition, url);
    let selection = Selection::new(url.as_str(), method, definition);

    let target = required(matches, "target")?;
    let mut out = String::new();
    if matches!(target.as_str(), "cli" | "all") {
        out.push_str(&azure_cli_script(&selection));
    }
    if matches!(target.as_str(), "powershell" | "all") {
        out.push_str(&powershell_script(&selection, &actions));
    }
    if matches!(target.as_str(), "ansible" | "all") {
        out.push_str(&ansible_script(&selection, &actions, definition));
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    Ok(())
}

fn handle_search(
    proxy: Arc<HttpProxy>,
    config: &ExplorerConfig,
    matches: &ArgMatches,
    pretty: bool,
) -> Result<()> {
    let keyword = required(matches, "keyword")?;
    let cache = ResourceSearchCache::unprimed(proxy, config.search_ttl);
    let results = cache.search(keyword)?;
    write_json_output(&serde_json::to_value(results)?, pretty)
}

fn handle_invoke(
    table: &DefinitionTable,
    proxy: &dyn ArmProxy,
    matches: &ArgMatches,
    pretty: bool,
) -> Result<()> {
    let method: HttpMethod = required(matches, "method")?.parse()?;
    let url = required(matches, "url")?;
    let api_version = match matches.get_one::<String>("api-version") {
        Some(version) => Some(version.clone()),
        None => table.find_for_url(url).and_then(|d| d.api_version.clone()),
    };
    let (names, values) = query_values(matches.get_many::<String>("query"));

    let mut action = Action::new(method, last_segment(url), url);
    action.request_body = load_body(matches.get_one::<String>("body"), matches.get_one::<String>("body-file"))?;
    action.query = names;
    let request = action.invoke_request(api_version.as_deref(), &values);
    let response = proxy.invoke(&request)?;
    write_json_output(&response.data, pretty)?;

    if !response.is_success() {
        bail!("http {}", response.status);
    }
    Ok(())
}

fn required<'m>(matches: &'m ArgMatches, name: &str) -> Result<&'m String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow!("{name} required"))
}

fn load_body(body: Option<&String>, body_file: Option<&String>) -> Result<Option<Value>> {
    if let Some(raw) = body {
        let value = serde_json::from_str(raw).context("invalid JSON body")?;
        return Ok(Some(value));
    }
    if let Some(path) = body_file {
        let raw = fs::read_to_string(path).with_context(|| format!("read body file {}", path))?;
        let value = serde_json::from_str(&raw).context("invalid JSON body file")?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// `KEY=VALUE` flags as query names, in the order first given, and their
/// values.
fn query_values(values: Option<ValuesRef<String>>) -> (Vec<String>, BTreeMap<String, String>) {
    let mut names = Vec::new();
    let mut map = BTreeMap::new();
    for value in values.into_iter().flatten() {
        if let Some((k, v)) = value.split_once('=') {
            let k = k.trim().to_string();
            if map.insert(k.clone(), v.to_string()).is_none() {
                names.push(k);
            }
        }
    }
    (names, map)
}

fn write_json_output(value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        write_stdout_line(&serde_json::to_string_pretty(value)?)
    } else {
        write_stdout_line(&serde_json::to_string(value)?)
    }
}

fn write_stdout_line(line: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(line.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}
