//! Chorus - ask many AI providers at once and compare their answers
//!
//! One prompt fans out to every configured provider concurrently; the answers
//! come back as a single comparison view (table, detailed sections, combined
//! summary, or JSON).

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use chorus_core::ai::providers::{get_provider, ModelTier, ProviderId, Registry};
use chorus_core::ai::retry::RetryPolicy;
use chorus_core::ai::{self, DispatchOptions, HttpTransport};
use chorus_core::config::ChorusConfig;
use chorus_core::error::ConfigError;
use chorus_core::paths;

mod output;

use output::OutputMode;

/// Prompt used by `chorus test` to probe reachability
const TEST_PROMPT: &str = "Reply with the single word: ok";

/// Chorus - multi-provider AI comparison
#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Ask many AI providers at once and compare their answers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the provider config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Store an API key for a provider and enable it
    Config {
        /// Provider id (zhipu, silicon, openai, anthropic, google)
        provider: String,
        /// The API key
        api_key: String,
    },

    /// Show the status of every provider
    List,

    /// Send a prompt to the configured providers and compare answers
    Ask {
        /// The prompt; read from stdin when omitted
        prompt: Option<String>,

        /// Comma-separated provider ids (default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        providers: Vec<String>,

        /// Per-request timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output mode
        #[arg(short, long, value_enum, default_value_t = OutputMode::Combined)]
        format: OutputMode,

        /// Write the rendered output to a file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Probe every configured provider with a one-line prompt
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout stays clean for rendered output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cmd_init(force),
        Commands::Config { provider, api_key } => cmd_config(&provider, api_key),
        Commands::List => cmd_list(cli.verbose),
        Commands::Ask {
            prompt,
            providers,
            timeout,
            format,
            save,
        } => cmd_ask(prompt, providers, timeout, format, save).await,
        Commands::Test => cmd_test(cli.verbose).await,
    }
}

fn cmd_init(force: bool) -> Result<()> {
    let path = paths::config_file();
    if path.exists() && !force {
        bail!(
            "config file already exists at {}; use --force to overwrite",
            path.display()
        );
    }

    ChorusConfig::init_default().save()?;
    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Store a key:    chorus config zhipu <api_key>");
    println!("  2. Check status:   chorus list");
    println!("  3. Ask something:  chorus ask \"why is the sky blue?\"");
    Ok(())
}

fn cmd_config(provider: &str, api_key: String) -> Result<()> {
    let id = ProviderId::parse(provider)
        .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))?;

    let mut config = ChorusConfig::load()?;
    config.set_api_key(id, api_key.clone());
    config.save()?;

    let spec = get_provider(id).context("provider missing from catalog")?;
    let key_preview: String = api_key.chars().take(10).collect();
    println!("Configured {} ({})", spec.name, id.storage_key());
    println!("Key: {}...", key_preview);
    println!();
    println!("Models ({}):", spec.models.len());
    for model in &spec.models {
        println!("  - {} ({})", model.id, tier_label(model.tier));
    }
    Ok(())
}

fn cmd_list(verbose: bool) -> Result<()> {
    let config = ChorusConfig::load()?;

    println!("Provider status");
    println!("{}", "=".repeat(50));

    let mut configured = 0usize;
    for &id in ProviderId::all() {
        let spec = get_provider(id).context("provider missing from catalog")?;
        let has_key = config.api_key(id).is_some();
        let enabled = config.is_enabled(id);

        let status = match (has_key, enabled) {
            (true, true) => {
                configured += 1;
                "configured"
            }
            (true, false) => "disabled",
            (false, _) => "no key",
        };

        let free = spec.free_model_count();
        println!();
        println!("{} ({})", spec.name, id.storage_key());
        println!("  status: {}", status);
        println!("  url:    {}", config.base_url_override(id).unwrap_or(&spec.base_url));
        println!(
            "  models: {} ({} free, {} paid)",
            spec.models.len(),
            free,
            spec.models.len() - free
        );
        if verbose {
            if let Some(key) = config.api_key(id) {
                let key_preview: String = key.chars().take(10).collect();
                println!("  key:    {}...", key_preview);
            }
        }
    }

    println!();
    println!("{}", "=".repeat(50));
    println!("{}/{} providers ready", configured, ProviderId::all().len());
    if configured == 0 {
        println!();
        println!("Store a key with: chorus config zhipu <api_key>");
    }
    Ok(())
}

async fn cmd_ask(
    prompt: Option<String>,
    providers: Vec<String>,
    timeout: Option<u64>,
    format: OutputMode,
    save: Option<PathBuf>,
) -> Result<()> {
    let prompt = match prompt {
        Some(p) => p,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading prompt from stdin")?;
            buffer.trim().to_string()
        }
    };
    if prompt.is_empty() {
        bail!("no prompt given; pass it as an argument or on stdin");
    }

    let config = ChorusConfig::load()?;
    let requested = if providers.is_empty() {
        config.settings.default_providers.clone()
    } else {
        providers
    };

    let registry = Registry::new(config);
    let resolved = registry.resolve(&requested)?;

    let mut options = DispatchOptions::from_config(registry.config());
    if let Some(secs) = timeout {
        options.request_timeout = Duration::from_secs(secs);
    }

    let names: Vec<&str> = resolved.iter().map(|p| p.spec.name.as_str()).collect();
    eprintln!("Asking {} provider(s): {}", resolved.len(), names.join(", "));

    let transport = HttpTransport::new();
    let report = ai::compare(&transport, &resolved, &prompt, &options).await;

    let rendered = output::render(&report, format)?;
    println!("{}", rendered);

    if let Some(path) = save {
        let contents = if format == OutputMode::Json {
            rendered
        } else {
            format!(
                "_Generated by chorus at {}_\n\n{}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                rendered
            )
        };
        std::fs::write(&path, contents)
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

async fn cmd_test(verbose: bool) -> Result<()> {
    let config = ChorusConfig::load()?;
    let registry = Registry::new(config);
    let resolved = registry.resolve(&[])?;

    println!("Testing {} provider(s)...", resolved.len());

    let options = DispatchOptions {
        request_timeout: Duration::from_secs(15),
        overall_timeout: None,
        retry: RetryPolicy::none(),
    };

    let transport = HttpTransport::new();
    let report = ai::compare(&transport, &resolved, TEST_PROMPT, &options).await;

    for result in &report.results {
        if result.is_success() {
            println!(
                "  ok  {} ({}) {:.2}s",
                result.provider_name,
                result.model,
                result.elapsed_ms as f64 / 1000.0
            );
            if verbose {
                let excerpt: String = result.text.chars().take(50).collect();
                println!("      {}", excerpt);
            }
        } else {
            println!("  err {} - {}", result.provider_name, result.text);
        }
    }

    println!();
    println!(
        "{}/{} providers reachable",
        report.summary.success_count, report.summary.total
    );
    Ok(())
}

fn tier_label(tier: ModelTier) -> &'static str {
    match tier {
        ModelTier::Free => "free",
        ModelTier::Paid => "paid",
    }
}
