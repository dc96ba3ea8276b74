use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dotnet_depgraph::config::{Config, TraceConfig, TraceVerbosity};
use dotnet_depgraph::framework::Tfm;
use dotnet_depgraph::nuget_config::NugetConfigFile;
use dotnet_depgraph::registries::client::RegistryClient;
use dotnet_depgraph::registries::http_client::create_shared_client;
use dotnet_depgraph::registries::nuget::NuGetRegistry;
use dotnet_depgraph::cache::HybridCache;
use dotnet_depgraph::scanner::{ProjectScanner, ScanRequest};

#[derive(Parser)]
#[command(name = "dotnet-depgraph")]
#[command(about = "Resolves the transitive NuGet dependency graph for a .NET project", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory containing the project to scan (defaults to the current directory).
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Force the target framework instead of discovering it from the project file,
    /// e.g. `net8.0`, `netstandard2.0`, `net472`.
    #[arg(short = 'f', long)]
    target_framework: Option<String>,

    /// Write the JSON report here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to a `nuget.config` to read additional feeds and credentials from.
    #[arg(long)]
    nuget_config: Option<PathBuf>,

    /// Fetch descriptive metadata (license, authors, homepage, ...) for every
    /// resolved package. Slower: one extra registry round-trip per package.
    #[arg(long)]
    with_details: bool,

    /// Fall back to a line-oriented scan of the project file when the
    /// structured MSBuild-style reader fails to parse it.
    #[arg(long)]
    with_fallback: bool,

    /// Don't query nuget.org, even if no other feed is configured.
    #[arg(long)]
    no_nuget_org: bool,

    /// Verbose logging (`debug` instead of `info`).
    #[arg(short, long)]
    verbose: bool,

    /// Quiet logging (`warn` only).
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbosity = if cli.quiet {
        TraceVerbosity::Quiet
    } else if cli.verbose {
        TraceVerbosity::Verbose
    } else {
        TraceVerbosity::Normal
    };
    let trace_config = TraceConfig::new(verbosity);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(trace_config.filter_directive())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::default();

    let target_framework = match cli.target_framework.as_deref().map(Tfm::parse) {
        Some(Ok(tfm)) => Some(tfm),
        Some(Err(e)) => {
            eprintln!("invalid --target-framework: {e}");
            return ExitCode::FAILURE;
        }
        None => None,
    };

    // Share one pooled HTTP client across every feed.
    let shared_client = match create_shared_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to initialize HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut endpoints = Vec::new();
    if let Some(nuget_config_path) = &cli.nuget_config {
        match NugetConfigFile::read(nuget_config_path) {
            Ok(file) => {
                for feed in file.feeds {
                    let mut registry = NuGetRegistry::with_client(shared_client.clone(), feed.url);
                    if let Some(credentials) = feed.credentials {
                        registry = registry.with_credentials(credentials);
                    }
                    endpoints.push(registry);
                }
            }
            Err(e) => {
                eprintln!("failed to read {}: {e}", nuget_config_path.display());
                return ExitCode::FAILURE;
            }
        }
    }
    if endpoints.is_empty() && !cli.no_nuget_org {
        endpoints.push(NuGetRegistry::with_client(
            shared_client.clone(),
            config.default_service_index_url.clone(),
        ));
    }
    if endpoints.is_empty() {
        eprintln!("no registry feeds configured: pass --nuget-config or drop --no-nuget-org");
        return ExitCode::FAILURE;
    }

    let cache_ttl = std::time::Duration::from_secs(config.cache_ttl_secs);
    let client = if config.use_sqlite_cache {
        RegistryClient::with_cache(endpoints, HybridCache::with_ttl(cache_ttl))
    } else {
        RegistryClient::with_cache(endpoints, HybridCache::memory_only_with_ttl(cache_ttl))
    };

    let project_dir = match cli.project.canonicalize() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("cannot access project directory {}: {e}", cli.project.display());
            return ExitCode::FAILURE;
        }
    };

    let request = ScanRequest {
        project_dir,
        target_framework,
        with_details: cli.with_details,
        with_fallback: cli.with_fallback,
    };

    let report = ProjectScanner::scan(request, &client).await;
    let exit_code = report.status.exit_code();

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("failed to serialize report: {e}");
            return ExitCode::FAILURE;
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, json) {
                eprintln!("failed to write {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => println!("{json}"),
    }

    if exit_code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
