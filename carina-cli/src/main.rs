mod state;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use carina_core::differ::{Action, diff};
use carina_core::provider::{Cancelled, Context, Diagnostics, Provider};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::ResourceSchema;
use carina_provider_cloudflare::config::{ENV_API_KEY, ENV_API_TOKEN, ENV_BASE_URL, ENV_EMAIL};
use carina_provider_cloudflare::identifier::{ACCOUNT_ID, ZONE_ID};
use carina_provider_cloudflare::resources::access_ca_certificate::RESOURCE_TYPE;
use carina_provider_cloudflare::schemas::access_ca_certificate::APPLICATION_ID;
use carina_provider_cloudflare::schemas::get_schema;
use carina_provider_cloudflare::{CloudflareProvider, ProviderConfig};

use state::StateFile;

#[derive(Parser)]
#[command(name = "carina-cf")]
#[command(about = "Manage Cloudflare Access CA certificates", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, default_value = "carina-cf.state.json")]
    state: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AuthArgs {
    /// Cloudflare API token
    #[arg(long, global = true, env = ENV_API_TOKEN, hide_env_values = true)]
    api_token: Option<String>,

    /// Cloudflare global API key (requires --email)
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true)]
    api_key: Option<String>,

    /// Account email used with --api-key
    #[arg(long, global = true, env = ENV_EMAIL)]
    email: Option<String>,

    /// Cloudflare API base URL
    #[arg(long, global = true, env = ENV_BASE_URL)]
    base_url: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ScopeArgs {
    /// Account the Access application belongs to
    #[arg(long)]
    account_id: Option<String>,

    /// Zone the Access application belongs to
    #[arg(long)]
    zone_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or replace a CA certificate so it matches the given settings
    Apply {
        /// Local name of the certificate
        name: String,

        /// Access application to issue the certificate for
        #[arg(long)]
        application_id: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Refresh recorded certificates from the API
    Refresh {
        /// Only refresh this certificate
        name: Option<String>,
    },
    /// Adopt an existing certificate into the state file
    Import {
        /// Local name to record the certificate under
        name: String,

        /// "account/<account_id>/<certificate_id>" or "zone/<zone_id>/<certificate_id>"
        id: String,

        /// Access application the certificate belongs to
        #[arg(long)]
        application_id: String,
    },
    /// Delete a recorded certificate
    Destroy {
        /// Local name of the certificate
        name: String,
    },
    /// Print the state file
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let cancel = CancellationToken::new();
    let ctx = Context::with_token(cancel.clone());
    let mut interrupts = InterruptHandler::new(cancel);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupts.on_ctrl_c() {
                eprintln!("{}", "Interrupted again, exiting.".red());
                std::process::exit(130);
            }
        }
    });

    if let Err(e) = run(cli, &ctx).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Ctrl-C handling: the first press cancels the in-flight operation,
/// a second one asks to exit immediately.
struct InterruptHandler {
    cancel: CancellationToken,
    presses: u32,
}

impl InterruptHandler {
    fn new(cancel: CancellationToken) -> Self {
        Self { cancel, presses: 0 }
    }

    /// Returns true once the process should exit
    fn on_ctrl_c(&mut self) -> bool {
        self.presses += 1;
        if self.presses > 1 {
            return true;
        }
        warn!("Interrupt received, cancelling in-flight operation (press Ctrl-C again to exit)");
        self.cancel.cancel();
        false
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli, ctx: &Context) -> Result<()> {
    let state_path = cli.state.as_path();

    match cli.command {
        Commands::Show => run_show(state_path),
        Commands::Apply {
            name,
            application_id,
            scope,
        } => {
            let provider = build_provider(&cli.auth)?;
            let desired = desired_resource(&name, &application_id, &scope);
            run_apply(ctx, &provider, state_path, desired).await
        }
        Commands::Refresh { name } => {
            let provider = build_provider(&cli.auth)?;
            run_refresh(ctx, &provider, state_path, name.as_deref()).await
        }
        Commands::Import {
            name,
            id,
            application_id,
        } => {
            let provider = build_provider(&cli.auth)?;
            run_import(ctx, &provider, state_path, &name, &id, &application_id).await
        }
        Commands::Destroy { name } => {
            let provider = build_provider(&cli.auth)?;
            run_destroy(ctx, &provider, state_path, &name).await
        }
    }
}

fn provider_config(auth: &AuthArgs) -> ProviderConfig {
    let set = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

    let mut config = ProviderConfig {
        api_token: set(&auth.api_token),
        api_key: set(&auth.api_key),
        email: set(&auth.email),
        ..ProviderConfig::default()
    };
    if let Some(base_url) = set(&auth.base_url) {
        config = config.with_base_url(base_url);
    }
    config
}

fn build_provider(auth: &AuthArgs) -> Result<CloudflareProvider> {
    let config = provider_config(auth);
    debug!("Using Cloudflare API at {}", config.base_url);
    CloudflareProvider::new(&config).context("failed to configure Cloudflare provider")
}

fn desired_resource(name: &str, application_id: &str, scope: &ScopeArgs) -> Resource {
    let resource = Resource::new(RESOURCE_TYPE, name).with_attribute(APPLICATION_ID, application_id);
    match (&scope.account_id, &scope.zone_id) {
        (Some(account_id), _) => resource.with_attribute(ACCOUNT_ID, account_id.as_str()),
        (None, Some(zone_id)) => resource.with_attribute(ZONE_ID, zone_id.as_str()),
        (None, None) => resource,
    }
}

fn resource_schema() -> Result<ResourceSchema> {
    get_schema(RESOURCE_TYPE).ok_or_else(|| anyhow!("no schema for {}", RESOURCE_TYPE))
}

fn validate_resource(schema: &ResourceSchema, resource: &Resource) -> Result<()> {
    if let Err(errors) = schema.validate(&resource.attributes) {
        let lines: Vec<String> = errors
            .iter()
            .map(|e| format!("{}: {}", resource.id, e))
            .collect();
        bail!("invalid configuration:\n{}", lines.join("\n"));
    }
    Ok(())
}

/// Turn error diagnostics into an error
fn check(diags: Diagnostics) -> Result<()> {
    if diags.has_error() {
        bail!("{}", diags);
    }
    Ok(())
}

/// Record `state`, save the file, then surface the operation's diagnostics.
///
/// The state is written even when the operation failed so that partially
/// created resources are not lost.
fn persist(
    file: &mut StateFile,
    path: &Path,
    provider: &dyn Provider,
    state: &State,
    diags: Diagnostics,
) -> Result<()> {
    file.record(provider.name(), state);
    file.save(path)?;
    check(diags)
}

/// Load the recorded state for `id` and refresh it from the provider
async fn current_state(
    ctx: &Context,
    provider: &dyn Provider,
    file: &mut StateFile,
    path: &Path,
    id: &ResourceId,
) -> Result<State> {
    let Some(recorded) = file.find_resource(&id.resource_type, &id.name) else {
        return Ok(State::not_found(id.clone()));
    };

    let mut state = recorded.to_state();
    let diags = provider.read(ctx, &mut state).await;
    if !state.exists {
        warn!("{} no longer exists, removing from state", id);
    }
    persist(file, path, provider, &state, diags)?;
    Ok(state)
}

async fn run_apply(
    ctx: &Context,
    provider: &dyn Provider,
    path: &Path,
    desired: Resource,
) -> Result<()> {
    let schema = resource_schema()?;
    validate_resource(&schema, &desired)?;

    let mut file = StateFile::load(path)?;
    let mut current = current_state(ctx, provider, &mut file, path, &desired.id).await?;

    let action = diff(&schema, &desired, &current);
    debug!("{}: {}", desired.id, action);

    match action {
        Action::NoChange => {
            println!("{}", "No changes needed.".green());
            return Ok(());
        }
        Action::Create => {
            println!("{} {}", "+".green().bold(), desired.id);
        }
        Action::Replace { changed_attributes } => {
            println!(
                "{} {} (forces replacement: {})",
                "-/+".red().bold(),
                desired.id,
                changed_attributes.join(", ")
            );
            let diags = provider.delete(ctx, &mut current).await;
            persist(&mut file, path, provider, &current, diags)?;
        }
        Action::Update { changed_attributes } => {
            println!(
                "{} {} ({})",
                "~".yellow().bold(),
                desired.id,
                changed_attributes.join(", ")
            );
            for (key, value) in &desired.attributes {
                current.set_attribute(key.clone(), value.clone());
            }
            let diags = provider.update(ctx, &mut current).await;
            persist(&mut file, path, provider, &current, diags)?;
            println!("  {} {}", "✓".green(), desired.id);
            return Ok(());
        }
    }

    let mut created = State::planned(&desired);
    let diags = provider.create(ctx, &mut created).await;
    persist(&mut file, path, provider, &created, diags)?;
    println!(
        "  {} {} ({})",
        "✓".green(),
        desired.id,
        created.identifier_str()
    );
    Ok(())
}

async fn run_refresh(
    ctx: &Context,
    provider: &dyn Provider,
    path: &Path,
    name: Option<&str>,
) -> Result<()> {
    let mut file = StateFile::load(path)?;
    let ids: Vec<ResourceId> = file
        .resources
        .iter()
        .filter(|r| name.is_none_or(|n| r.name == n))
        .map(|r| ResourceId::new(&r.resource_type, &r.name))
        .collect();

    if ids.is_empty() {
        println!("{}", "No resources to refresh.".yellow());
        return Ok(());
    }

    for id in ids {
        if ctx.is_cancelled() {
            return Err(Cancelled.into());
        }
        let state = current_state(ctx, provider, &mut file, path, &id).await?;
        if state.exists {
            println!("  {} {}", "✓".green(), id);
        } else {
            println!("  {} {} (gone)", "-".red(), id);
        }
    }
    Ok(())
}

async fn run_import(
    ctx: &Context,
    provider: &dyn Provider,
    path: &Path,
    name: &str,
    import_id: &str,
    application_id: &str,
) -> Result<()> {
    let mut file = StateFile::load(path)?;
    if file.find_resource(RESOURCE_TYPE, name).is_some() {
        bail!("{}.{} is already managed", RESOURCE_TYPE, name);
    }

    let mut seed = State::not_found(ResourceId::new(RESOURCE_TYPE, name));
    seed.identifier = Some(import_id.to_string());
    seed.set_attribute(APPLICATION_ID, application_id);

    let imported = provider.import(ctx, seed).await?;
    for state in &imported {
        if !state.exists {
            bail!("{} {:?} does not exist", state.id, import_id);
        }
        file.record(provider.name(), state);
        println!(
            "  {} {} ({})",
            "✓".green(),
            state.id,
            state.identifier_str()
        );
    }
    file.save(path)?;
    Ok(())
}

async fn run_destroy(ctx: &Context, provider: &dyn Provider, path: &Path, name: &str) -> Result<()> {
    let mut file = StateFile::load(path)?;
    let Some(recorded) = file.find_resource(RESOURCE_TYPE, name) else {
        bail!("{}.{} is not in the state file", RESOURCE_TYPE, name);
    };

    let mut state = recorded.to_state();
    println!("{} {}", "-".red().bold(), state.id);
    let diags = provider.delete(ctx, &mut state).await;
    persist(&mut file, path, provider, &state, diags)?;
    println!("  {} {}", "✓".green(), state.id);
    Ok(())
}

fn run_show(path: &Path) -> Result<()> {
    let file = StateFile::load(path)?;
    if file.resources.is_empty() {
        println!("{}", "No resources in state.".yellow());
        return Ok(());
    }

    println!(
        "{} (serial {}, lineage {})",
        path.display().to_string().cyan().bold(),
        file.serial,
        file.lineage
    );
    for resource in &file.resources {
        println!();
        println!(
            "{}.{} [{}]",
            resource.resource_type.bold(),
            resource.name.bold(),
            resource.identifier
        );
        let mut keys: Vec<&String> = resource.attributes.keys().collect();
        keys.sort();
        for key in keys {
            println!("  {} = {}", key, format_value(&resource.attributes[key]));
        }
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} = {}", k, format_value(v)))
                .collect();
            entries.sort();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CA_PATH: &str = "/zones/z1/access/apps/app/ca";

    fn provider(server: &MockServer) -> CloudflareProvider {
        let config = ProviderConfig::default()
            .with_api_token("test-token")
            .with_base_url(server.uri());
        CloudflareProvider::new(&config).unwrap()
    }

    fn zone_scope() -> ScopeArgs {
        ScopeArgs {
            account_id: None,
            zone_id: Some("z1".to_string()),
        }
    }

    /// State file already holding a zone-level certificate `ssh` / `cert-1`
    fn seeded_state_file(path: &Path) {
        let mut state = State::not_found(ResourceId::new(RESOURCE_TYPE, "ssh"));
        state.set_attribute(ZONE_ID, "z1");
        state.set_attribute(APPLICATION_ID, "app");
        state.set_identifier("cert-1");

        let mut file = StateFile::new();
        file.record("cloudflare", &state);
        file.save(path).unwrap();
    }

    fn auth(token: Option<&str>, base_url: Option<&str>) -> AuthArgs {
        AuthArgs {
            api_token: token.map(String::from),
            api_key: None,
            email: None,
            base_url: base_url.map(String::from),
        }
    }

    #[test]
    fn test_cli_parses_apply_with_zone_scope() {
        let cli = Cli::try_parse_from([
            "carina-cf",
            "apply",
            "ssh",
            "--application-id",
            "app-1",
            "--zone-id",
            "z1",
        ])
        .unwrap();

        let Commands::Apply {
            name,
            application_id,
            scope,
        } = cli.command
        else {
            panic!("expected apply");
        };
        assert_eq!(name, "ssh");
        assert_eq!(application_id, "app-1");
        assert_eq!(scope.zone_id.as_deref(), Some("z1"));
        assert_eq!(cli.state, PathBuf::from("carina-cf.state.json"));
    }

    #[test]
    fn test_cli_rejects_both_scopes() {
        let result = Cli::try_parse_from([
            "carina-cf",
            "apply",
            "ssh",
            "--application-id",
            "app-1",
            "--account-id",
            "a1",
            "--zone-id",
            "z1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_requires_a_scope() {
        let result = Cli::try_parse_from(["carina-cf", "apply", "ssh", "--application-id", "app"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_desired_resource_sets_scope_attribute() {
        let scope = ScopeArgs {
            account_id: Some("a1".to_string()),
            zone_id: None,
        };
        let resource = desired_resource("ssh", "app-1", &scope);
        assert_eq!(resource.id, ResourceId::new(RESOURCE_TYPE, "ssh"));
        assert_eq!(resource.attributes.get(ACCOUNT_ID), Some(&Value::from("a1")));
        assert_eq!(
            resource.attributes.get(APPLICATION_ID),
            Some(&Value::from("app-1"))
        );
        assert!(!resource.attributes.contains_key(ZONE_ID));

        let schema = resource_schema().unwrap();
        assert!(validate_resource(&schema, &resource).is_ok());
    }

    #[test]
    fn test_provider_config_ignores_empty_values() {
        let config = provider_config(&auth(Some(""), Some("")));
        assert_eq!(config.api_token, None);
        assert_eq!(config.base_url, ProviderConfig::default().base_url);

        let config = provider_config(&auth(Some("tok"), Some("http://localhost:9999")));
        assert_eq!(config.api_token.as_deref(), Some("tok"));
        assert_eq!(config.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_check_surfaces_errors() {
        assert!(check(Diagnostics::new()).is_ok());
        let err = check(Diagnostics::cancelled()).unwrap_err();
        assert_eq!(err.to_string(), "error: operation cancelled");
    }

    #[tokio::test]
    async fn test_apply_records_certificate_when_follow_up_read_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": {"id": "cert-1", "aud": "aud-1", "public_key": "pk-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CA_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("carina-cf.state.json");
        let desired = desired_resource("ssh", "app", &zone_scope());

        let err = run_apply(&Context::new(), &provider(&server), &state_path, desired)
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("error finding Access CA Certificate \"cert-1\""),
            "{}",
            err
        );

        let file = StateFile::load(&state_path).unwrap();
        let recorded = file.find_resource(RESOURCE_TYPE, "ssh").unwrap();
        assert_eq!(recorded.identifier, "cert-1");
        assert_eq!(recorded.attributes.get(ZONE_ID), Some(&Value::from("z1")));
    }

    #[tokio::test]
    async fn test_apply_without_changes_makes_no_write_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": {"id": "cert-1", "aud": "aud-1", "public_key": "pk-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("carina-cf.state.json");
        seeded_state_file(&state_path);
        let desired = desired_resource("ssh", "app", &zone_scope());

        run_apply(&Context::new(), &provider(&server), &state_path, desired)
            .await
            .unwrap();

        let file = StateFile::load(&state_path).unwrap();
        let recorded = file.find_resource(RESOURCE_TYPE, "ssh").unwrap();
        assert_eq!(recorded.attributes.get("aud"), Some(&Value::from("aud-1")));
    }

    #[tokio::test]
    async fn test_refresh_drops_certificate_gone_remotely() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CA_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "errors": [{"code": 12130, "message": "access.api.error.not_found"}],
                "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("carina-cf.state.json");
        seeded_state_file(&state_path);

        run_refresh(&Context::new(), &provider(&server), &state_path, None)
            .await
            .unwrap();

        let file = StateFile::load(&state_path).unwrap();
        assert!(file.find_resource(RESOURCE_TYPE, "ssh").is_none());
        assert_eq!(file.serial, 2);
    }

    #[tokio::test]
    async fn test_refresh_stops_when_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("carina-cf.state.json");
        seeded_state_file(&state_path);

        let cancel = CancellationToken::new();
        let ctx = Context::with_token(cancel.clone());
        cancel.cancel();

        let err = run_refresh(&ctx, &provider(&server), &state_path, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "operation cancelled");

        let file = StateFile::load(&state_path).unwrap();
        assert!(file.find_resource(RESOURCE_TYPE, "ssh").is_some());
    }

    #[test]
    fn test_second_interrupt_requests_exit() {
        let cancel = CancellationToken::new();
        let mut interrupts = InterruptHandler::new(cancel.clone());

        assert!(!interrupts.on_ctrl_c());
        assert!(cancel.is_cancelled());
        assert!(interrupts.on_ctrl_c());
        assert!(interrupts.on_ctrl_c());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::from("abc")), "\"abc\"");
        assert_eq!(
            format_value(&Value::List(vec![Value::Int(1), Value::Bool(true)])),
            "[1, true]"
        );
    }
}
