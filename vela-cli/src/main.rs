use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use vela_core::differ::create_plan;
use vela_core::effect::Effect;
use vela_core::plan::Plan;
use vela_core::provider::Provider;
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::schema::ResourceSchema;
use vela_provider_tencentcloud::{schemas, TencentCloudProvider};
use vela_state::{
    create_backend, BackendConfig, BackendError, ResourceState, StateBackend, StateFile,
};

const DEFAULT_REGION: &str = "ap-guangzhou";
const PROVIDER_NAME: &str = "tencentcloud";

/// Resource types that are queried, never created
const DATA_SOURCE_TYPES: &[&str] = &["cynosdb.clusters", "cwp.machines"];

#[derive(Parser)]
#[command(name = "vela")]
#[command(about = "Vela - Declarative infrastructure for TencentCloud", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest against the provider schemas
    Validate {
        /// Path to the manifest file
        #[arg(default_value = "vela.json")]
        file: PathBuf,
    },
    /// Show what apply would change, without changing anything
    Plan {
        /// Path to the manifest file
        #[arg(default_value = "vela.json")]
        file: PathBuf,
        /// Override the state file path
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Create, update and delete resources to match the manifest
    Apply {
        /// Path to the manifest file
        #[arg(default_value = "vela.json")]
        file: PathBuf,
        /// Override the state file path
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Delete every resource recorded in state
    Destroy {
        /// Path to the manifest file
        #[arg(default_value = "vela.json")]
        file: PathBuf,
        /// Override the state file path
        #[arg(long)]
        state: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Remove a stuck state lock
    Unlock {
        /// Lock ID as reported by the lock error
        lock_id: String,
        /// Path to the manifest file
        #[arg(default_value = "vela.json")]
        file: PathBuf,
        /// Override the state file path
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file, state } => run_plan(&file, state.as_deref()).await,
        Commands::Apply { file, state } => run_apply(&file, state.as_deref()).await,
        Commands::Destroy {
            file,
            state,
            auto_approve,
        } => run_destroy(&file, state.as_deref(), auto_approve).await,
        Commands::Unlock {
            lock_id,
            file,
            state,
        } => run_unlock(&lock_id, &file, state.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

// ========== Manifest ==========

/// Parsed manifest: provider settings, state backend, desired resources
#[derive(Debug)]
struct Manifest {
    region: String,
    backend: BackendConfig,
    resources: Vec<Resource>,
}

/// Load a manifest file.
///
/// The manifest is a JSON document:
///
/// ```json
/// {
///   "provider": { "name": "tencentcloud", "region": "ap-guangzhou" },
///   "state": { "backend": "local", "path": "vela.state.json" },
///   "resources": [
///     {
///       "type": "cynosdb.cluster",
///       "name": "main",
///       "binding": "db",
///       "protect": true,
///       "attributes": { "cluster_name": "demo", ... }
///     }
///   ]
/// }
/// ```
///
/// An attribute value of the form `{"ref": "binding.attribute"}` refers to
/// an attribute of the resource published under that binding name.
fn load_manifest(file: &Path) -> Result<Manifest, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let root: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Parse error in {}: {}", file.display(), e))?;
    let root = root
        .as_object()
        .ok_or_else(|| "Manifest must be a JSON object".to_string())?;

    if let Some(name) = root
        .get("provider")
        .and_then(|p| p.get("name"))
        .and_then(serde_json::Value::as_str)
        && name != PROVIDER_NAME
    {
        return Err(format!("Unknown provider: {}", name));
    }
    let region = root
        .get("provider")
        .and_then(|p| p.get("region"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .or_else(|| std::env::var("TENCENTCLOUD_REGION").ok())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let backend = parse_backend(root)?;

    let entries = root
        .get("resources")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| "Manifest needs a \"resources\" array".to_string())?;

    let mut resources = Vec::new();
    for entry in entries {
        let resource_type = entry
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| "Every resource needs a \"type\"".to_string())?;
        let name = entry
            .get("name")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| format!("Resource of type {} needs a \"name\"", resource_type))?;

        let mut resource = Resource::new(resource_type, name)
            .with_read_only(DATA_SOURCE_TYPES.contains(&resource_type));

        if let Some(attrs) = entry.get("attributes").and_then(serde_json::Value::as_object) {
            for (key, value) in attrs {
                let value = manifest_value(value).ok_or_else(|| {
                    format!("{}.{}: attribute \"{}\" is null", resource_type, name, key)
                })?;
                resource.attributes.insert(key.clone(), value);
            }
        }
        if let Some(binding) = entry.get("binding").and_then(serde_json::Value::as_str) {
            resource
                .attributes
                .insert("_binding".to_string(), Value::String(binding.to_string()));
        }
        if let Some(protect) = entry.get("protect").and_then(serde_json::Value::as_bool) {
            resource
                .attributes
                .insert("_protect".to_string(), Value::Bool(protect));
        }
        resources.push(resource);
    }

    Ok(Manifest {
        region,
        backend,
        resources,
    })
}

fn parse_backend(
    root: &serde_json::Map<String, serde_json::Value>,
) -> Result<BackendConfig, String> {
    let mut backend_type = "local".to_string();
    let mut attributes = HashMap::new();

    if let Some(state) = root.get("state") {
        let state = state
            .as_object()
            .ok_or_else(|| "\"state\" must be an object".to_string())?;
        if let Some(backend) = state.get("backend") {
            backend_type = backend
                .as_str()
                .ok_or_else(|| {
                    BackendError::configuration("state.backend must be a string").to_string()
                })?
                .to_string();
        }
        if let Some(path) = state.get("path") {
            let path = path.as_str().ok_or_else(|| {
                BackendError::configuration("state.path must be a string").to_string()
            })?;
            attributes.insert("path".to_string(), Value::String(path.to_string()));
        }
    }

    Ok(BackendConfig {
        backend_type,
        attributes,
    })
}

/// Convert a manifest JSON value into an attribute value.
///
/// Returns `None` for JSON null: absent is expressed by leaving the
/// attribute out, not by writing null.
fn manifest_value(json: &serde_json::Value) -> Option<Value> {
    if let Some(object) = json.as_object() {
        if object.len() == 1
            && let Some(target) = object.get("ref").and_then(serde_json::Value::as_str)
            && let Some((binding, attribute)) = target.split_once('.')
        {
            return Some(Value::ResourceRef(
                binding.to_string(),
                attribute.to_string(),
            ));
        }
        let map: HashMap<String, Value> = object
            .iter()
            .filter_map(|(k, v)| manifest_value(v).map(|v| (k.clone(), v)))
            .collect();
        return Some(Value::Map(map));
    }
    if let Some(items) = json.as_array() {
        return Some(Value::List(items.iter().filter_map(manifest_value).collect()));
    }
    Value::from_json(json)
}

// ========== Validation ==========

fn get_schemas() -> HashMap<String, ResourceSchema> {
    schemas::all_schemas()
        .into_iter()
        .map(|schema| (schema.resource_type.clone(), schema))
        .collect()
}

fn validate_resources(resources: &[Resource]) -> Result<(), String> {
    let schemas = get_schemas();
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
            None => all_errors.push(format!("{}: unknown resource type", resource.id)),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Validation failed:\n{}", all_errors.join("\n")))
    }
}

// ========== Backend and provider setup ==========

async fn open_backend(
    manifest: &Manifest,
    state_override: Option<&Path>,
) -> Result<Box<dyn StateBackend>, String> {
    let mut config = manifest.backend.clone();
    if let Some(path) = state_override {
        config
            .attributes
            .insert("path".to_string(), Value::String(path.display().to_string()));
    }
    create_backend(&config).await.map_err(|e| e.to_string())
}

fn get_provider(manifest: &Manifest) -> Result<TencentCloudProvider, String> {
    TencentCloudProvider::new(manifest.region.as_str())
        .map_err(|e| format!("Failed to initialize provider: {}", e))
}

// ========== Current state ==========

/// Read the live state of every managed resource, using the identifier
/// recorded in the state file where one exists.
async fn read_current_states(
    provider: &TencentCloudProvider,
    resources: &[Resource],
    state_file: &StateFile,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current_states = HashMap::new();

    for resource in resources {
        if resource.is_data_source() {
            continue;
        }
        let stored = state_file.find_resource(&resource.id.resource_type, &resource.id.name);
        let identifier = stored.and_then(|entry| entry.identifier.clone());
        let mut state = provider
            .read(&resource.id, identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        if state.exists
            && let Some(stored) = stored
        {
            merge_stored_attributes(&mut state, stored);
        }
        current_states.insert(resource.id.clone(), state);
    }

    Ok(current_states)
}

/// Fill in attributes recorded in the state file that the live read did
/// not return. The live value always wins.
fn merge_stored_attributes(state: &mut State, stored: &ResourceState) {
    for (key, value) in &stored.attributes {
        if !state.attributes.contains_key(key)
            && let Some(value) = Value::from_json(value)
        {
            state.attributes.insert(key.clone(), value);
        }
    }
}

// ========== References ==========

/// Build the binding name to attributes map used for reference resolution.
///
/// A resource's published attributes are its declared ones, overlaid with
/// whatever the live state knows that the manifest does not. The remote
/// identifier is published as `id`.
fn build_binding_map(
    resources: &[Resource],
    current_states: &HashMap<ResourceId, State>,
) -> HashMap<String, HashMap<String, Value>> {
    let mut binding_map = HashMap::new();

    for resource in resources {
        let Some(Value::String(binding_name)) = resource.attributes.get("_binding") else {
            continue;
        };
        let mut attrs = resource.attributes.clone();
        if let Some(state) = current_states.get(&resource.id)
            && state.exists
        {
            for (key, value) in &state.attributes {
                if !attrs.contains_key(key) {
                    attrs.insert(key.clone(), value.clone());
                }
            }
            if let Some(identifier) = &state.identifier {
                attrs.insert("id".to_string(), Value::String(identifier.clone()));
            }
        }
        binding_map.insert(binding_name.clone(), attrs);
    }

    binding_map
}

/// Refresh a binding after an apply step. State attributes win over the
/// declared ones here: the provider has just reported them.
fn update_binding(
    binding_map: &mut HashMap<String, HashMap<String, Value>>,
    resource: &Resource,
    state: &State,
) {
    let Some(Value::String(binding_name)) = resource.attributes.get("_binding") else {
        return;
    };
    let mut attrs = resource.attributes.clone();
    for (key, value) in &state.attributes {
        attrs.insert(key.clone(), value.clone());
    }
    if let Some(identifier) = &state.identifier {
        attrs.insert("id".to_string(), Value::String(identifier.clone()));
    }
    binding_map.insert(binding_name.clone(), attrs);
}

fn resolve_ref_value(
    value: &Value,
    binding_map: &HashMap<String, HashMap<String, Value>>,
) -> Value {
    match value {
        Value::ResourceRef(binding, attribute) => {
            if let Some(attrs) = binding_map.get(binding)
                && let Some(resolved) = attrs.get(attribute)
            {
                resolved.clone()
            } else {
                // Not resolvable yet, the target has not been created
                value.clone()
            }
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| resolve_ref_value(item, binding_map))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_ref_value(v, binding_map)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn resolve_refs(
    resources: &mut [Resource],
    binding_map: &HashMap<String, HashMap<String, Value>>,
) {
    for resource in resources.iter_mut() {
        let resolved: HashMap<String, Value> = resource
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), resolve_ref_value(value, binding_map)))
            .collect();
        resource.attributes = resolved;
    }
}

fn resolve_resource(
    resource: &Resource,
    binding_map: &HashMap<String, HashMap<String, Value>>,
) -> Resource {
    let mut resolved = resource.clone();
    resolved.attributes = resource
        .attributes
        .iter()
        .map(|(key, value)| (key.clone(), resolve_ref_value(value, binding_map)))
        .collect();
    resolved
}

// ========== Dependency ordering ==========

fn get_resource_dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding, _) => {
            deps.insert(binding.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for item in map.values() {
                collect_dependencies(item, deps);
            }
        }
        _ => {}
    }
}

/// Order resources so that referenced resources come before the resources
/// that reference them.
fn sort_resources_by_dependencies(resources: &[Resource]) -> Vec<Resource> {
    let binding_to_resource: HashMap<String, usize> = resources
        .iter()
        .enumerate()
        .filter_map(|(index, resource)| match resource.attributes.get("_binding") {
            Some(Value::String(binding)) => Some((binding.clone(), index)),
            _ => None,
        })
        .collect();

    fn visit(
        index: usize,
        resources: &[Resource],
        binding_to_resource: &HashMap<String, usize>,
        visited: &mut [bool],
        visiting: &mut [bool],
        sorted: &mut Vec<Resource>,
    ) {
        if visited[index] || visiting[index] {
            // Circular references surface later as unresolved values
            return;
        }
        visiting[index] = true;
        for dep in get_resource_dependencies(&resources[index]) {
            if let Some(&dep_index) = binding_to_resource.get(&dep) {
                visit(
                    dep_index,
                    resources,
                    binding_to_resource,
                    visited,
                    visiting,
                    sorted,
                );
            }
        }
        visiting[index] = false;
        visited[index] = true;
        sorted.push(resources[index].clone());
    }

    let mut sorted = Vec::new();
    let mut visited = vec![false; resources.len()];
    let mut visiting = vec![false; resources.len()];
    for index in 0..resources.len() {
        visit(
            index,
            resources,
            &binding_to_resource,
            &mut visited,
            &mut visiting,
            &mut sorted,
        );
    }
    sorted
}

// ========== Plan ==========

/// State entries no longer declared in the manifest become deletes.
/// Protected entries are left alone.
fn append_orphan_deletes(plan: &mut Plan, resources: &[Resource], state_file: &StateFile) {
    let declared: HashSet<(&str, &str)> = resources
        .iter()
        .map(|r| (r.id.resource_type.as_str(), r.id.name.as_str()))
        .collect();

    for entry in &state_file.resources {
        if declared.contains(&(entry.resource_type.as_str(), entry.name.as_str()))
            || entry.protected
        {
            continue;
        }
        if let Some(identifier) = &entry.identifier {
            plan.add(Effect::Delete {
                id: ResourceId::new(entry.resource_type.as_str(), entry.name.as_str()),
                identifier: Some(identifier.clone()),
            });
        }
    }
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!(
            "{}",
            "No changes. Your infrastructure matches the configuration.".green()
        );
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        match effect {
            Effect::Read(resource) => {
                println!(
                    "  {} {} {}",
                    "?".cyan().bold(),
                    resource.id.to_string().cyan().bold(),
                    "(data source)".cyan()
                );
            }
            Effect::Create(resource) => {
                println!(
                    "  {} {}",
                    "+".green().bold(),
                    resource.id.to_string().green().bold()
                );
                let mut keys: Vec<&String> = resource
                    .attributes
                    .keys()
                    .filter(|key| !key.starts_with('_'))
                    .collect();
                keys.sort();
                for key in keys {
                    if let Some(value) = resource.attributes.get(key) {
                        println!("      {}: {}", key, format_value(value).green());
                    }
                }
            }
            Effect::Update { from, to, .. } => {
                println!(
                    "  {} {}",
                    "~".yellow().bold(),
                    to.id.to_string().yellow().bold()
                );
                let mut keys: Vec<&String> = to
                    .attributes
                    .keys()
                    .filter(|key| !key.starts_with('_'))
                    .collect();
                keys.sort();
                for key in keys {
                    let Some(new_value) = to.attributes.get(key) else {
                        continue;
                    };
                    let old_value = from.attributes.get(key.as_str());
                    if old_value != Some(new_value) {
                        let old_text = old_value
                            .map(format_value)
                            .unwrap_or_else(|| "(none)".to_string());
                        println!(
                            "      {}: {} → {}",
                            key,
                            old_text.red(),
                            format_value(new_value).green()
                        );
                    }
                }
            }
            Effect::Delete { id, .. } => {
                println!("  {} {}", "-".red().bold(), id.to_string().red().bold());
            }
        }
    }

    println!();
    let summary = plan.summary();
    let mut parts = vec![
        format!("{} to create", summary.create.to_string().green().bold()),
        format!("{} to update", summary.update.to_string().yellow().bold()),
        format!("{} to delete", summary.delete.to_string().red().bold()),
    ];
    if summary.read > 0 {
        parts.push(format!("{} to read", summary.read.to_string().cyan().bold()));
    }
    println!("Plan: {}.", parts.join(", "));
}

fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Read(resource) => format!("Read {}", resource.id),
        Effect::Create(resource) => format!("Create {}", resource.id),
        Effect::Update { id, .. } => format!("Update {}", id),
        Effect::Delete { id, .. } => format!("Delete {}", id),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .iter()
                .filter_map(|key| map.get(*key).map(|v| format!("{}: {}", key, format_value(v))))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::ResourceRef(binding, attribute) => format!("{}.{}", binding, attribute),
    }
}

// ========== State recording ==========

/// Record the applied state of a resource, including the remote identifier
/// the provider assigned. Bookkeeping attributes are not persisted.
fn record_state(state_file: &mut StateFile, resource: &Resource, state: &State) {
    let mut entry = ResourceState::new(
        resource.id.resource_type.as_str(),
        resource.id.name.as_str(),
        PROVIDER_NAME,
    );
    if let Some(identifier) = &state.identifier {
        entry = entry.with_identifier(identifier.clone());
    }
    entry.attributes = state
        .attributes
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();
    entry.protected = resource
        .attributes
        .get("_protect")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    state_file.upsert_resource(entry);
}

/// Dump query results to the file named by `result_output_file`, if the
/// data source asked for one.
fn write_query_result(resource: &Resource, state: &State) -> Result<Option<String>, String> {
    let Some(path) = resource
        .attributes
        .get("result_output_file")
        .and_then(Value::as_str)
    else {
        return Ok(None);
    };
    let output: serde_json::Map<String, serde_json::Value> = state
        .attributes
        .iter()
        .filter(|(key, _)| !key.starts_with('_') && key.as_str() != "result_output_file")
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();
    let content = serde_json::to_string_pretty(&serde_json::Value::Object(output))
        .map_err(|e| format!("Failed to serialize query result: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write {}: {}", path, e))?;
    Ok(Some(path.to_string()))
}

// ========== Commands ==========

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());
    let manifest = load_manifest(file)?;
    validate_resources(&manifest.resources)?;

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            manifest.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &manifest.resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn run_plan(file: &Path, state_override: Option<&Path>) -> Result<(), String> {
    let manifest = load_manifest(file)?;
    validate_resources(&manifest.resources)?;

    let backend = open_backend(&manifest, state_override).await?;
    let state_file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let provider = get_provider(&manifest)?;

    let sorted_resources = sort_resources_by_dependencies(&manifest.resources);
    let current_states = read_current_states(&provider, &sorted_resources, &state_file).await?;
    let binding_map = build_binding_map(&sorted_resources, &current_states);

    let mut resources_for_plan = sorted_resources.clone();
    resolve_refs(&mut resources_for_plan, &binding_map);

    let mut plan = create_plan(&resources_for_plan, &current_states);
    append_orphan_deletes(&mut plan, &manifest.resources, &state_file);

    print_plan(&plan);
    Ok(())
}

async fn run_apply(file: &Path, state_override: Option<&Path>) -> Result<(), String> {
    let manifest = load_manifest(file)?;
    validate_resources(&manifest.resources)?;

    let backend = open_backend(&manifest, state_override).await?;
    let mut state_file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let provider = get_provider(&manifest)?;

    let sorted_resources = sort_resources_by_dependencies(&manifest.resources);
    let current_states = read_current_states(&provider, &sorted_resources, &state_file).await?;

    // An identifier that no longer resolves remotely is dropped from state
    for resource in &sorted_resources {
        if let Some(state) = current_states.get(&resource.id)
            && !state.exists
        {
            state_file.remove_resource(&resource.id.resource_type, &resource.id.name);
        }
    }

    let mut binding_map = build_binding_map(&sorted_resources, &current_states);

    let mut resources_for_plan = sorted_resources.clone();
    resolve_refs(&mut resources_for_plan, &binding_map);

    let mut plan = create_plan(&resources_for_plan, &current_states);
    append_orphan_deletes(&mut plan, &manifest.resources, &state_file);

    if plan.is_empty() {
        println!(
            "{}",
            "No changes. Your infrastructure matches the configuration.".green()
        );
        return Ok(());
    }

    print_plan(&plan);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| e.to_string())?;
    state_file.increment_serial();

    let mut success_count = 0;
    let mut failure_count = 0;

    for effect in plan.effects() {
        match effect {
            Effect::Read(resource) => {
                let resolved = resolve_resource(resource, &binding_map);
                match provider.query(&resolved).await {
                    Ok(state) => match write_query_result(&resolved, &state) {
                        Ok(output) => {
                            println!("  {} {}", "✓".green(), format_effect(effect));
                            if let Some(path) = output {
                                println!("    results written to {}", path);
                            }
                            update_binding(&mut binding_map, &resolved, &state);
                            success_count += 1;
                        }
                        Err(e) => {
                            println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                            failure_count += 1;
                        }
                    },
                    Err(e) => {
                        println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                        failure_count += 1;
                    }
                }
            }
            Effect::Create(resource) => {
                let resolved = resolve_resource(resource, &binding_map);
                match provider.create(&resolved).await {
                    Ok(state) => {
                        println!("  {} {}", "✓".green(), format_effect(effect));
                        update_binding(&mut binding_map, &resolved, &state);
                        record_state(&mut state_file, &resolved, &state);
                        success_count += 1;
                        if let Err(e) = backend.write_state(&state_file).await {
                            println!("  {} Failed to write state: {}", "✗".red(), e);
                            failure_count += 1;
                            break;
                        }
                    }
                    Err(e) => {
                        println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                        failure_count += 1;
                    }
                }
            }
            Effect::Update { id, from, to } => {
                let resolved = resolve_resource(to, &binding_map);
                let identifier = state_file
                    .find_resource(&id.resource_type, &id.name)
                    .and_then(|entry| entry.identifier.clone());
                match identifier {
                    Some(identifier) => {
                        match provider.update(id, &identifier, from, &resolved).await {
                            Ok(state) => {
                                println!("  {} {}", "✓".green(), format_effect(effect));
                                update_binding(&mut binding_map, &resolved, &state);
                                record_state(&mut state_file, &resolved, &state);
                                success_count += 1;
                                if let Err(e) = backend.write_state(&state_file).await {
                                    println!("  {} Failed to write state: {}", "✗".red(), e);
                                    failure_count += 1;
                                    break;
                                }
                            }
                            Err(e) => {
                                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                                failure_count += 1;
                            }
                        }
                    }
                    None => {
                        println!(
                            "  {} {} - no identifier recorded in state",
                            "✗".red(),
                            format_effect(effect)
                        );
                        failure_count += 1;
                    }
                }
            }
            Effect::Delete { id, identifier } => {
                let identifier = identifier.clone().or_else(|| {
                    state_file
                        .find_resource(&id.resource_type, &id.name)
                        .and_then(|entry| entry.identifier.clone())
                });
                match identifier {
                    Some(identifier) => match provider.delete(id, &identifier).await {
                        Ok(()) => {
                            println!("  {} {}", "✓".green(), format_effect(effect));
                            state_file.remove_resource(&id.resource_type, &id.name);
                            success_count += 1;
                            if let Err(e) = backend.write_state(&state_file).await {
                                println!("  {} Failed to write state: {}", "✗".red(), e);
                                failure_count += 1;
                                break;
                            }
                        }
                        Err(e) => {
                            println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                            failure_count += 1;
                        }
                    },
                    None => {
                        println!(
                            "  {} {} - no identifier recorded in state",
                            "✗".red(),
                            format_effect(effect)
                        );
                        failure_count += 1;
                    }
                }
            }
        }
    }

    if let Err(e) = backend.release_lock(&lock).await {
        eprintln!(
            "{} Failed to release state lock: {}",
            "Warning:".yellow().bold(),
            e
        );
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", success_count)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "Apply failed. {} succeeded, {} failed.",
                success_count, failure_count
            )
            .red()
            .bold()
        );
    }
    Ok(())
}

async fn run_destroy(
    file: &Path,
    state_override: Option<&Path>,
    auto_approve: bool,
) -> Result<(), String> {
    let manifest = load_manifest(file)?;
    let backend = open_backend(&manifest, state_override).await?;
    let Some(mut state_file) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No state found. Nothing to destroy.".green());
        return Ok(());
    };
    let provider = get_provider(&manifest)?;

    let mut pruned = false;

    // Entries never confirmed remotely have nothing to delete
    let unconfirmed: Vec<(String, String)> = state_file
        .resources
        .iter()
        .filter(|entry| entry.identifier.is_none())
        .map(|entry| (entry.resource_type.clone(), entry.name.clone()))
        .collect();
    for (resource_type, name) in &unconfirmed {
        state_file.remove_resource(resource_type, name);
        pruned = true;
    }

    let declared: HashSet<(&str, &str)> = manifest
        .resources
        .iter()
        .map(|r| (r.id.resource_type.as_str(), r.id.name.as_str()))
        .collect();

    let mut candidates: Vec<(ResourceId, String, bool)> = Vec::new();

    // Resources dropped from the manifest still live in state; they go first
    for entry in &state_file.resources {
        if declared.contains(&(entry.resource_type.as_str(), entry.name.as_str())) {
            continue;
        }
        if let Some(identifier) = &entry.identifier {
            candidates.push((
                ResourceId::new(entry.resource_type.as_str(), entry.name.as_str()),
                identifier.clone(),
                entry.protected,
            ));
        }
    }

    // Declared resources in reverse dependency order, dependents first
    let sorted_resources = sort_resources_by_dependencies(&manifest.resources);
    for resource in sorted_resources.iter().rev() {
        if resource.is_data_source() {
            continue;
        }
        if let Some(entry) =
            state_file.find_resource(&resource.id.resource_type, &resource.id.name)
            && let Some(identifier) = &entry.identifier
        {
            candidates.push((resource.id.clone(), identifier.clone(), entry.protected));
        }
    }

    let mut targets: Vec<(ResourceId, String)> = Vec::new();
    let mut skipped_protected: Vec<String> = Vec::new();

    for (id, identifier, protected) in candidates {
        if protected {
            skipped_protected.push(id.to_string());
            continue;
        }
        let state = provider
            .read(&id, Some(identifier.as_str()))
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        if state.exists {
            targets.push((id, identifier));
        } else {
            state_file.remove_resource(&id.resource_type, &id.name);
            pruned = true;
        }
    }

    if targets.is_empty() {
        if pruned {
            state_file.increment_serial();
            backend
                .write_state(&state_file)
                .await
                .map_err(|e| e.to_string())?;
        }
        for name in &skipped_protected {
            println!(
                "  {} {} {}",
                "•".yellow(),
                name.yellow(),
                "(protected, skipped)".yellow()
            );
        }
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for (id, _) in &targets {
        println!("  {} {}", "-".red().bold(), id.to_string().red());
    }
    for name in &skipped_protected {
        println!(
            "  {} {} {}",
            "•".yellow(),
            name.yellow(),
            "(protected, skipped)".yellow()
        );
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        targets.len().to_string().red().bold()
    );

    if !auto_approve {
        println!();
        println!(
            "{}",
            "Do you really want to destroy all resources?".yellow().bold()
        );
        println!("This action cannot be undone. Type 'yes' to confirm.");
        print!("  Enter a value: ");
        io::stdout().flush().ok();
        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| format!("Failed to read input: {}", e))?;
        if input.trim() != "yes" {
            println!();
            println!("Destroy cancelled.");
            return Ok(());
        }
    }

    println!();
    let lock = backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| e.to_string())?;
    state_file.increment_serial();

    let mut success_count = 0;
    let mut failure_count = 0;

    for (id, identifier) in &targets {
        match provider.delete(id, identifier).await {
            Ok(()) => {
                println!("  {} Delete {}", "✓".green(), id);
                state_file.remove_resource(&id.resource_type, &id.name);
                success_count += 1;
                if let Err(e) = backend.write_state(&state_file).await {
                    println!("  {} Failed to write state: {}", "✗".red(), e);
                    failure_count += 1;
                    break;
                }
            }
            Err(e) => {
                println!("  {} Delete {} - {}", "✗".red(), id, e);
                failure_count += 1;
            }
        }
    }

    if let Err(e) = backend.release_lock(&lock).await {
        eprintln!(
            "{} Failed to release state lock: {}",
            "Warning:".yellow().bold(),
            e
        );
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", success_count)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "Destroy failed. {} succeeded, {} failed.",
                success_count, failure_count
            )
            .red()
            .bold()
        );
    }
    Ok(())
}

async fn run_unlock(
    lock_id: &str,
    file: &Path,
    state_override: Option<&Path>,
) -> Result<(), String> {
    let manifest = load_manifest(file)?;
    let backend = open_backend(&manifest, state_override).await?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("✓ Lock {} released.", lock_id).green());
    Ok(())
}
