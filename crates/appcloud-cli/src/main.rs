//! AppCloud - deployment client for the platform controller
//!
//! Usage:
//!   appcloud target api.example.com   # Point at a controller
//!   appcloud push blog                # Create, upload and start
//!   appcloud instances blog +2        # Scale
//!   appcloud update blog              # Canary rollout of new bits

mod interactive;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use appcloud_core::bits::package;
use appcloud_core::catalog::ServiceRequest;
use appcloud_core::config::{ClientConfig, strip_scheme};
use appcloud_core::context::AppContext;
use appcloud_core::deploy::{Change, DeploymentController, UpdateRequest, UpdateResult};
use appcloud_core::detect::{Detection, detect_framework, framework_needs_db};
use appcloud_core::format::{format_since, pretty_size, uptime_string};
use appcloud_core::gateway::{HttpGateway, InstanceStats};
use appcloud_core::health::HealthOutcome;
use appcloud_core::scale::{InstanceSpec, ScaleOutcome};
use appcloud_core::state::instance_map::canary_label;
use appcloud_core::types::{
    AppManifest, ServiceManifest, Staging, health_label, memory_choice_to_quota,
    memory_quota_to_choice,
};
use appcloud_core::update::{UpdateOutcome, UpdateStrategy};

use crate::interactive::Prompter;

type Controller = DeploymentController<HttpGateway>;

#[derive(Parser)]
#[command(name = "appcloud")]
#[command(about = "Deploy and manage applications on the platform", long_about = None)]
struct Cli {
    /// Log requests and poll samples to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or set the target controller
    Target {
        /// Controller host, e.g. api.example.com
        host: Option<String>,
    },

    #[command(flatten)]
    Remote(RemoteCommands),
}

/// Commands that talk to the configured target.
#[derive(Subcommand)]
enum RemoteCommands {
    /// Show target information
    Info {
        #[command(subcommand)]
        command: Option<InfoCommands>,
    },

    /// List applications and manage their bound services
    Apps {
        #[command(subcommand)]
        command: Option<AppsCommands>,
    },

    /// Create, upload and start an application
    Push(Box<PushArgs>),

    /// Start an application
    Start {
        name: String,
        /// Wait until every instance is running
        #[arg(long)]
        wait: bool,
    },

    /// Stop an application
    Stop { name: String },

    /// Stop and start an application
    #[command(alias = "bounce")]
    Restart {
        name: String,
        /// Wait until every instance is running
        #[arg(long)]
        wait: bool,
    },

    /// Delete an application, or every application with --all
    Delete {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,
        /// Delete every application
        #[arg(long)]
        all: bool,
        /// Release bound services without asking
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Upload new bits and roll them out
    Update {
        name: String,
        /// Stop and restart instead of rolling out through a canary
        #[arg(long)]
        nocanary: bool,
        /// New memory reservation (64M, 128M, 256M, 512M, 1G, 2G)
        #[arg(long)]
        mem: Option<String>,
        /// Application directory
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// List instances, or scale with <num>, +<delta> or -<delta>
    Instances {
        name: String,
        #[arg(allow_hyphen_values = true)]
        spec: Option<String>,
        /// Wait until every instance is running after scaling
        #[arg(long)]
        wait: bool,
    },

    /// Add a URL to an application
    Map { name: String, uri: String },

    /// Remove a URL from an application
    Unmap { name: String, uri: String },

    /// List recent crashes
    Crashes { name: String },

    /// Read a file or directory listing from an instance
    Files {
        name: String,
        path: Option<String>,
        /// Instance index or debug label (e.g. blog-canary)
        #[arg(long)]
        instance: Option<String>,
    },

    /// Show resource usage per instance
    Stats { name: String },

    /// List, provision and release services
    Services {
        #[command(subcommand)]
        command: Option<ServicesCommands>,
    },
}

#[derive(Subcommand)]
enum InfoCommands {
    /// Show the services the target offers
    Services,
}

#[derive(Subcommand)]
enum AppsCommands {
    /// List applications (default)
    List,
    /// List services bound to an application
    Services { app: String },
    /// Bind a service to an application and restart it
    AddService {
        app: String,
        /// Existing service; omit to provision a new one
        service: Option<String>,
        #[command(flatten)]
        new: ServiceArgs,
    },
    /// Unbind a service from an application and restart it
    RemoveService { app: String, service: String },
}

#[derive(Subcommand)]
enum ServicesCommands {
    /// List provisioned services (default)
    List,
    /// Provision a new service
    Add(ServiceArgs),
    /// Release a provisioned service
    #[command(alias = "rm")]
    Remove { name: String },
}

/// Catalog coordinates; anything omitted is chosen interactively.
#[derive(Args, Debug, Default)]
struct ServiceArgs {
    /// Service type, e.g. database
    #[arg(long = "type")]
    service_type: Option<String>,
    #[arg(long)]
    vendor: Option<String>,
    #[arg(long)]
    version: Option<String>,
    #[arg(long)]
    tier: Option<String>,
    /// Option value as key=value (repeatable)
    #[arg(long = "option", value_parser = parse_option)]
    options: Vec<(String, String)>,
    /// Name for the new service
    #[arg(long)]
    name: Option<String>,
    /// Take the first candidate wherever there is a choice
    #[arg(short = 'y', long)]
    yes: bool,
}

impl ServiceArgs {
    fn request(&self, name_prefix: &str) -> ServiceRequest {
        let mut request = ServiceRequest::new(name_prefix);
        request.name = self.name.clone();
        request.service_type = self.service_type.clone();
        request.vendor = self.vendor.clone();
        request.version = self.version.clone();
        request.tier = self.tier.clone();
        request.options = self.options.iter().cloned().collect();
        request
    }
}

#[derive(Args)]
struct PushArgs {
    /// Application name
    name: String,
    /// URL to map, defaults to <name>.<target domain>
    url: Option<String>,
    /// Number of instances
    #[arg(long, default_value_t = 1)]
    instances: u32,
    /// Startup command, overrides the detected one
    #[arg(long)]
    exec: Option<String>,
    /// Skip framework detection
    #[arg(long)]
    no_framework: bool,
    /// Memory reservation (64M, 128M, 256M, 512M, 1G, 2G)
    #[arg(long)]
    mem: Option<String>,
    /// Application directory
    #[arg(long, default_value = ".")]
    path: PathBuf,
    /// Accept every default without prompting
    #[arg(short = 'y', long)]
    yes: bool,
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "appcloud=debug"
    } else {
        "appcloud=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run_cli(cli.command) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(1);
    }
}

fn run_cli(command: Commands) -> Result<()> {
    let ctx = AppContext::from_env()?;
    match command {
        Commands::Target { host } => run_target(&ctx, host),
        Commands::Remote(command) => {
            let config = ctx.load_config()?;
            debug!(
                host = %config.target,
                config_dir = %ctx.config_dir().display(),
                "loaded client config"
            );
            let controller = ctx.controller(&config)?;
            run_remote(&controller, &config, command)
        }
    }
}

fn run_remote(controller: &Controller, config: &ClientConfig, command: RemoteCommands) -> Result<()> {
    match command {
        RemoteCommands::Info { command: None } => run_info(controller, config),
        RemoteCommands::Info {
            command: Some(InfoCommands::Services),
        } => run_info_services(controller),
        RemoteCommands::Apps { command } => match command.unwrap_or(AppsCommands::List) {
            AppsCommands::List => run_apps(controller),
            AppsCommands::Services { app } => run_app_services(controller, &app),
            AppsCommands::AddService { app, service, new } => {
                run_add_service(controller, &app, service, &new)
            }
            AppsCommands::RemoveService { app, service } => {
                run_remove_service(controller, &app, &service)
            }
        },
        RemoteCommands::Push(args) => run_push(controller, config, *args),
        RemoteCommands::Start { name, wait } => run_start(controller, &name, wait),
        RemoteCommands::Stop { name } => run_stop(controller, &name),
        RemoteCommands::Restart { name, wait } => run_restart(controller, &name, wait),
        RemoteCommands::Delete { name, all, yes } => run_delete(controller, name, all, yes),
        RemoteCommands::Update {
            name,
            nocanary,
            mem,
            path,
        } => run_update(controller, &name, nocanary, mem, &path),
        RemoteCommands::Instances { name, spec, wait } => run_instances(controller, &name, spec, wait),
        RemoteCommands::Map { name, uri } => run_map(controller, &name, &uri),
        RemoteCommands::Unmap { name, uri } => run_unmap(controller, &name, &uri),
        RemoteCommands::Crashes { name } => run_crashes(controller, &name),
        RemoteCommands::Files {
            name,
            path,
            instance,
        } => run_files(controller, &name, instance.as_deref(), path.as_deref()),
        RemoteCommands::Stats { name } => run_stats(controller, &name),
        RemoteCommands::Services { command } => match command.unwrap_or(ServicesCommands::List) {
            ServicesCommands::List => run_services(controller),
            ServicesCommands::Add(args) => run_services_add(controller, &args),
            ServicesCommands::Remove { name } => run_services_remove(controller, &name),
        },
    }
}

// --- Target ---

fn run_target(ctx: &AppContext, host: Option<String>) -> Result<()> {
    let store = ctx.config_store();
    let mut config = store.load()?;

    let Some(host) = host else {
        println!("[{}]", config.base_url()?);
        return Ok(());
    };

    config.target = strip_scheme(host.trim()).trim_end_matches('/').to_string();
    let controller = ctx.controller(&config)?;
    controller.validate_target(&config.target)?;
    store.save(&config)?;

    println!("Successfully targeted to [{}]", config.base_url()?);
    Ok(())
}

fn run_info(controller: &Controller, config: &ClientConfig) -> Result<()> {
    let info = controller.info()?;
    let or_na = |field: &Option<String>| field.clone().unwrap_or_else(|| "N/A".to_string());

    println!();
    println!("{}", or_na(&info.description));
    println!("For support visit {}", or_na(&info.support));
    println!();
    println!("Target:   {} (v{})", config.base_url()?, or_na(&info.version));
    match &info.user {
        Some(user) => println!("User:     {user}"),
        None => println!("User:     (anonymous)"),
    }
    Ok(())
}

fn run_info_services(controller: &Controller) -> Result<()> {
    let directory = controller.service_directory()?;
    if directory.is_empty() {
        println!("No services available");
        return Ok(());
    }

    println!("{:<14} {:<14} {:<10} DESCRIPTION", "TYPE", "VENDOR", "VERSION");
    for entry in directory {
        println!(
            "{:<14} {:<14} {:<10} {}",
            entry.service_type,
            entry.vendor,
            entry.version,
            entry.description.unwrap_or_default()
        );
    }
    Ok(())
}

// --- Applications ---

fn run_apps(controller: &Controller) -> Result<()> {
    let apps = controller.list_apps()?;
    if apps.is_empty() {
        println!("No applications available");
        return Ok(());
    }

    println!(
        "{:<20} {:<4} {:<10} {:<30} SERVICES",
        "APPLICATION", "#", "HEALTH", "URLS"
    );
    for app in &apps {
        println!(
            "{:<20} {:<4} {:<10} {:<30} {}",
            app.name,
            app.instances,
            health_label(app),
            app.uris.join(", "),
            app.services.join(", ")
        );
    }
    Ok(())
}

fn run_push(controller: &Controller, config: &ClientConfig, args: PushArgs) -> Result<()> {
    let mut prompter = Prompter::new(args.yes);
    let mut detection = if args.no_framework {
        Detection::unknown()
    } else {
        detect_framework(&args.path)?
    };
    if let Some(summary) = &detection.summary {
        println!("{}", style(summary).cyan());
    }
    if let Some(exec) = args.exec {
        detection.exec = Some(exec);
    }

    let memory = match args.mem {
        Some(choice) => choice,
        None => prompter.memory("Memory reservation", detection.memory)?,
    };
    let memory = memory_choice_to_quota(&memory)?;

    let url = args
        .url
        .unwrap_or_else(|| format!("{}.{}", args.name, config.suggested_domain()));
    let staging = Staging {
        model: detection.framework.clone(),
        stack: Some(detection.stack().to_string()),
    };
    let manifest = AppManifest::new(&args.name, staging, memory)
        .with_uri(strip_scheme(&url))
        .with_instances(args.instances);

    let database = if framework_needs_db(&detection.framework)
        && prompter.offer_database()?
    {
        let request = ServiceRequest::new(&args.name).with_type("database");
        Some(controller.resolve_service(&request, &mut prompter)?)
    } else {
        None
    };

    let bits = package(&args.path, detection.war_file.as_deref())?;
    let report = controller.push(&manifest, bits, database.as_ref())?;

    println!("Creating application '{}'... {}", report.app, ok());
    if let Some(service) = &report.database {
        println!("Binding service '{service}'... {}", ok());
    }
    println!("Uploading application ({})... {}", report.size, ok());
    println!("Starting application '{}'... {}", report.app, ok());
    Ok(())
}

fn run_start(controller: &Controller, name: &str, wait: bool) -> Result<()> {
    match controller.start(name)? {
        Change::Applied => println!("Starting application '{name}'... {}", ok()),
        Change::Unchanged => println!("Application '{name}' already started"),
    }
    if wait {
        report_health(name, controller.await_health(name, 1.0)?);
    }
    Ok(())
}

fn run_stop(controller: &Controller, name: &str) -> Result<()> {
    match controller.stop(name)? {
        Change::Applied => println!("Stopping application '{name}'... {}", ok()),
        Change::Unchanged => println!("Application '{name}' already stopped"),
    }
    Ok(())
}

fn run_restart(controller: &Controller, name: &str, wait: bool) -> Result<()> {
    let report = controller.restart(name)?;
    if report.stopped.is_applied() {
        println!("Stopping application '{name}'... {}", ok());
    }
    println!("Starting application '{name}'... {}", ok());
    if wait {
        report_health(name, controller.await_health(name, 1.0)?);
    }
    Ok(())
}

fn run_delete(controller: &Controller, name: Option<String>, all: bool, yes: bool) -> Result<()> {
    let prompter = Prompter::new(false);
    let mut decide = |app: &str, service: &str| -> Result<bool> {
        if yes {
            return Ok(true);
        }
        prompter.release_service(app, service)
    };

    let reports = match name {
        Some(name) if !all => vec![controller.delete(&name, &mut decide)?],
        _ => controller.delete_all(&mut decide)?,
    };
    for report in reports {
        for service in &report.released {
            println!("Deleting service '{service}'... {}", ok());
        }
        println!("Deleting application '{}'... {}", report.app, ok());
    }
    Ok(())
}

fn run_update(
    controller: &Controller,
    name: &str,
    nocanary: bool,
    mem: Option<String>,
    path: &Path,
) -> Result<()> {
    let memory = mem
        .map(|choice| memory_choice_to_quota(&choice))
        .transpose()?;
    let strategy = if nocanary {
        UpdateStrategy::Restart
    } else {
        UpdateStrategy::Canary
    };
    let request = UpdateRequest::default()
        .with_memory(memory)
        .with_strategy(strategy);

    let war_file = detect_framework(path)?.war_file;
    let bits = package(path, war_file.as_deref())?;
    println!("Uploading application ({})...", bits.size_label());

    let mut on_phase = |phase: &str| println!("  {}", style(phase).yellow());
    let report = controller.update(name, request, bits, &mut on_phase)?;

    if let Some((_, new)) = report.memory {
        println!(
            "Updated memory reservation to '{}'",
            memory_quota_to_choice(new)
        );
    }

    match report.result {
        UpdateResult::Restarted(_) => {
            println!("Restarted application '{name}'... {}", ok());
            Ok(())
        }
        UpdateResult::Rolled(UpdateOutcome::Succeeded) => {
            println!("Successfully updated application '{name}'");
            Ok(())
        }
        UpdateResult::Rolled(UpdateOutcome::CanaryFailed { canary: Some(_) }) => {
            anyhow::bail!(
                "canary for '{name}' failed. Debug the canary using 'appcloud files {name} --instance {}'",
                canary_label(name)
            )
        }
        UpdateResult::Rolled(UpdateOutcome::CanaryFailed { canary: None }) => {
            anyhow::bail!("canary for '{name}' failed")
        }
    }
}

fn run_instances(
    controller: &Controller,
    name: &str,
    spec: Option<String>,
    wait: bool,
) -> Result<()> {
    let Some(spec) = spec else {
        return print_instances(controller, name);
    };

    let spec: InstanceSpec = spec.parse()?;
    match controller.scale(name, spec)? {
        ScaleOutcome::Unchanged { count } => {
            println!("Application '{name}' already has {count} instance(s)");
        }
        ScaleOutcome::Scaled { from, to, direction } => {
            println!(
                "Scaling {direction} application '{name}' from {from} to {to} instance(s)... {}",
                ok()
            );
        }
    }
    if wait {
        report_health(name, controller.await_health(name, 1.0)?);
    }
    Ok(())
}

fn print_instances(controller: &Controller, name: &str) -> Result<()> {
    let instances = controller.instances(name)?;
    if instances.is_empty() {
        println!("No running instances for '{name}'");
        return Ok(());
    }

    println!("{:<8} {:<12} SINCE", "INDEX", "STATE");
    for instance in instances {
        let since = instance
            .since
            .map(format_since)
            .unwrap_or_else(|| "N/A".to_string());
        println!("{:<8} {:<12} {}", instance.index, instance.state, since);
    }
    Ok(())
}

fn run_map(controller: &Controller, name: &str, uri: &str) -> Result<()> {
    match controller.map_uri(name, uri)? {
        Change::Applied => println!("Mapping '{}' to '{name}'... {}", strip_scheme(uri), ok()),
        Change::Unchanged => println!("'{}' is already mapped to '{name}'", strip_scheme(uri)),
    }
    Ok(())
}

fn run_unmap(controller: &Controller, name: &str, uri: &str) -> Result<()> {
    controller.unmap_uri(name, uri)?;
    println!("Unmapping '{}' from '{name}'... {}", strip_scheme(uri), ok());
    Ok(())
}

// --- Introspection ---

fn run_crashes(controller: &Controller, name: &str) -> Result<()> {
    let crashes = controller.crashes(name)?;
    if crashes.is_empty() {
        println!("No crashed instances for '{name}'");
        return Ok(());
    }

    println!("{:<20} SINCE", "NAME");
    for entry in crashes {
        println!("{:<20} {}", entry.label, format_since(entry.crash.since));
    }
    Ok(())
}

fn run_files(
    controller: &Controller,
    name: &str,
    instance: Option<&str>,
    path: Option<&str>,
) -> Result<()> {
    let content = controller.files(name, instance, path)?;
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn run_stats(controller: &Controller, name: &str) -> Result<()> {
    let stats = controller.stats(name)?;

    println!(
        "{:<8} {:<16} {:<22} {:<22} UPTIME",
        "INSTANCE", "CPU (CORES)", "MEMORY (LIMIT)", "DISK (LIMIT)"
    );
    for (index, stat) in stats {
        let row = StatsRow::from(&stat);
        println!(
            "{:<8} {:<16} {:<22} {:<22} {}",
            index, row.cpu, row.memory, row.disk, row.uptime
        );
    }
    Ok(())
}

/// One formatted `stats` line.
struct StatsRow {
    cpu: String,
    memory: String,
    disk: String,
    uptime: String,
}

impl From<&InstanceStats> for StatsRow {
    fn from(stat: &InstanceStats) -> Self {
        let usage = stat.usage.as_ref();
        let cpu = usage
            .and_then(|u| u.cpu)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "NA".to_string());
        let cores = stat
            .cores
            .map(|c| c.to_string())
            .unwrap_or_else(|| "NA".to_string());
        // Memory usage is reported in KiB.
        let mem = usage.and_then(|u| u.mem).map(|kib| (kib * 1024.0) as u64);
        let disk = usage.and_then(|u| u.disk);

        Self {
            cpu: format!("{cpu}% ({cores})"),
            memory: format!("{} ({})", pretty_size(mem), pretty_size(stat.mem_quota)),
            disk: format!("{} ({})", pretty_size(disk), pretty_size(stat.disk_quota)),
            uptime: uptime_string(stat.uptime.unwrap_or_default()),
        }
    }
}

// --- Services ---

fn run_services(controller: &Controller) -> Result<()> {
    let services = controller.list_services()?;
    if services.is_empty() {
        println!("No services provisioned");
        return Ok(());
    }
    print_service_table(&services);
    Ok(())
}

fn run_app_services(controller: &Controller, app: &str) -> Result<()> {
    let services = controller.app_services(app)?;
    if services.is_empty() {
        println!("No services bound to '{app}'");
        return Ok(());
    }
    print_service_table(&services);
    Ok(())
}

fn print_service_table(services: &[ServiceManifest]) {
    println!(
        "{:<24} {:<12} {:<12} {:<8} TIER",
        "NAME", "TYPE", "VENDOR", "VERSION"
    );
    for service in services {
        println!(
            "{:<24} {:<12} {:<12} {:<8} {}",
            service.name, service.service_type, service.vendor, service.version, service.tier
        );
    }
}

fn run_services_add(controller: &Controller, args: &ServiceArgs) -> Result<()> {
    let manifest = provision(controller, "service", args)?;
    println!("Creating service '{}'... {}", manifest.name, ok());
    Ok(())
}

fn run_services_remove(controller: &Controller, name: &str) -> Result<()> {
    controller.release_service(name)?;
    println!("Deleting service '{name}'... {}", ok());
    Ok(())
}

fn run_add_service(
    controller: &Controller,
    app: &str,
    service: Option<String>,
    new: &ServiceArgs,
) -> Result<()> {
    let service = match service {
        Some(service) => service,
        None => {
            let manifest = provision(controller, app, new)?;
            println!("Creating service '{}'... {}", manifest.name, ok());
            manifest.name
        }
    };

    if controller.attach_service(app, &service)?.is_applied() {
        println!("Binding service '{service}' to '{app}'... {}", ok());
        controller.restart(app)?;
        println!("Restarting application '{app}'... {}", ok());
    } else {
        println!("Service '{service}' is already bound to '{app}'");
    }
    Ok(())
}

fn run_remove_service(controller: &Controller, app: &str, service: &str) -> Result<()> {
    if controller.detach_service(app, service)?.is_applied() {
        println!("Unbinding service '{service}' from '{app}'... {}", ok());
        controller.restart(app)?;
        println!("Restarting application '{app}'... {}", ok());
    } else {
        println!("Service '{service}' is not bound to '{app}'");
    }
    Ok(())
}

fn provision(controller: &Controller, name_prefix: &str, args: &ServiceArgs) -> Result<ServiceManifest> {
    let mut chooser = Prompter::new(args.yes);
    let manifest = controller
        .provision_service(&args.request(name_prefix), &mut chooser)
        .with_context(|| format!("Failed to provision service for '{name_prefix}'"))?;
    if let Some(price) = &manifest.price {
        println!("  price: {}", style(price).green());
    }
    Ok(manifest)
}

// --- Output helpers ---

fn ok() -> console::StyledObject<&'static str> {
    style("OK").green()
}

fn report_health(name: &str, outcome: HealthOutcome) {
    let percent = (outcome.observed() * 100.0).round();
    if outcome.converged {
        println!("Application '{name}' is running ({percent}%)");
    } else {
        println!(
            "{} application '{name}' reached {percent}% health after {} checks",
            style("Warning:").yellow(),
            outcome.samples
        );
    }
}
