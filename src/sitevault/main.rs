use chrono::Utc;
use clap::Parser;
use colored::*;
use serde_json::Value;
use sitevault::api::SiteApi;
use sitevault::bootstrap::{BootstrapLoader, HttpSource};
use sitevault::commands::{CmdMessage, CmdResult, MessageLevel};
use sitevault::config::{resolve_data_dir, SiteConfig};
use sitevault::error::{Result, SiteError};
use sitevault::model::{Collection, Record};
use sitevault::store::checksum::ChecksumStore;
use sitevault::store::{DocumentStore, DualModeStore, StorageMode};
use sitevault::sync::{poller, GitPublisher, HttpRemote, RemoteApi, RetryPolicy, SyncQueue};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod args;
use args::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct AppContext {
    api: SiteApi<DualModeStore>,
    config: SiteConfig,
    data_dir: PathBuf,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let env: HashMap<String, String> = std::env::vars().collect();
    let ctx = init_context(&cli, &env)?;

    let skip_bootstrap = matches!(
        cli.command,
        Some(Commands::Doctor) | Some(Commands::Clear { .. }) | Some(Commands::Init { .. })
    );
    if !skip_bootstrap {
        bootstrap(&ctx, None);
    }

    match cli.command {
        Some(Commands::Init { remote }) => handle_init(&ctx, remote),
        Some(Commands::Get { collection, id }) => handle_get(&ctx, &collection, id),
        Some(Commands::Put {
            collection,
            json,
            preserve,
            replace,
        }) => handle_put(&ctx, &collection, &json, &preserve, replace),
        Some(Commands::Delete { collection, id }) => handle_delete(&ctx, &collection, &id),
        Some(Commands::Doctor) => handle_doctor(&ctx),
        Some(Commands::Drift {
            collection,
            remote,
            pull,
            push,
        }) => handle_drift(&ctx, &collection, remote, pull, push),
        Some(Commands::Watch {
            collection,
            remote,
            interval,
        }) => handle_watch(&ctx, &collection, remote, interval),
        Some(Commands::Publish { message }) => handle_publish(&ctx, &message),
        Some(Commands::Status) | None => handle_status(&ctx),
        Some(Commands::Clear { yes }) => handle_clear(&ctx, yes),
    }?;

    finish(ctx);
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sitevault=debug")
    } else {
        EnvFilter::try_from_env("SITEVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn init_context(cli: &Cli, env: &HashMap<String, String>) -> Result<AppContext> {
    let data_dir = resolve_data_dir(cli.data_dir.clone(), env)?;
    let mut config = SiteConfig::load(&data_dir)?;
    config.apply_env(env)?;
    if cli.memory {
        config.storage_mode = StorageMode::Memory;
    }
    debug!(dir = %data_dir.display(), mode = %config.storage_mode, "starting");

    let store = DualModeStore::new(config.storage_mode, &data_dir);
    let mut api = SiteApi::new(store);
    if let Some(publisher) = GitPublisher::from_config(&config.sync) {
        let policy = RetryPolicy {
            max_attempts: config.sync.max_attempts,
            delay: config.sync.retry_delay(),
        };
        api = api.with_sync(SyncQueue::start(publisher, policy));
    }

    Ok(AppContext {
        api,
        config,
        data_dir,
    })
}

fn loader(config: &SiteConfig, remote_override: Option<String>) -> BootstrapLoader {
    let mut loader = BootstrapLoader::new().with_example(config.example_path.clone());
    if let Some(url) = remote_override.or_else(|| config.remote_url.clone()) {
        loader = loader.with_remote(HttpSource::new(url, config.fetch_timeout()));
    }
    loader
}

fn bootstrap(ctx: &AppContext, remote_override: Option<String>) -> CmdResult {
    let outcome = ctx.api.bootstrap(&loader(&ctx.config, remote_override)).outcome;
    debug!(%outcome, "bootstrap finished");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::info(format!("Loaded content from {}", outcome)));
    result
}

fn finish(ctx: AppContext) {
    if let Some(status) = ctx.api.finish() {
        if let Some(err) = status.last_error {
            eprintln!("{}", format!("Sync failed: {}", err).yellow());
        }
    }
}

fn parse_collection(raw: &str) -> Result<Collection> {
    raw.parse()
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| SiteError::Api(format!("invalid JSON input: {}", e)))
}

fn remote_api(ctx: &AppContext, override_url: Option<String>) -> Result<HttpRemote> {
    let base = override_url
        .or_else(|| ctx.config.api_base_url.clone())
        .ok_or_else(|| {
            SiteError::Config("no content API configured (set SITEVAULT_API_URL or --remote)".into())
        })?;
    Ok(HttpRemote::new(base, ctx.config.fetch_timeout()))
}

fn handle_init(ctx: &AppContext, remote: Option<String>) -> Result<()> {
    let result = bootstrap(ctx, remote);
    print_messages(&result.messages);
    Ok(())
}

fn handle_get(ctx: &AppContext, collection: &str, id: Option<String>) -> Result<()> {
    let collection = parse_collection(collection)?;
    let result = ctx.api.get(collection, id.as_deref())?;
    if let Some(value) = &result.value {
        print_json(value)?;
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_put(
    ctx: &AppContext,
    collection: &str,
    json: &str,
    preserve: &[String],
    replace: bool,
) -> Result<()> {
    let collection = parse_collection(collection)?;
    let value = parse_json(json)?;
    let result = if replace {
        ctx.api.replace(collection, value)?
    } else {
        ctx.api.upsert(collection, value, preserve)?
    };
    print_messages(&result.messages);
    Ok(())
}

fn handle_delete(ctx: &AppContext, collection: &str, id: &str) -> Result<()> {
    let collection = parse_collection(collection)?;
    let result = ctx.api.delete(collection, id)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_doctor(ctx: &AppContext) -> Result<()> {
    let result = ctx.api.doctor()?;
    if let Some(report) = &result.doctor {
        print_check("data file present", report.data_present);
        print_check("data file valid", report.data_valid);
        print_check("checksum present", report.checksum_present);
        print_check("backup present", report.backup_present);
        print_check("backup valid", report.backup_valid);
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_drift(
    ctx: &AppContext,
    collection: &str,
    remote: Option<String>,
    pull: bool,
    push: bool,
) -> Result<()> {
    let collection = parse_collection(collection)?;
    let remote = remote_api(ctx, remote)?;
    let result = if pull {
        ctx.api.pull(collection, &remote)?
    } else if push {
        ctx.api.push(collection, &remote)?
    } else {
        ctx.api.drift(collection, &remote)?
    };
    print_messages(&result.messages);
    Ok(())
}

fn handle_watch(
    ctx: &AppContext,
    collection: &str,
    remote: Option<String>,
    interval: Option<u64>,
) -> Result<()> {
    let collection = parse_collection(collection)?;
    if collection.is_singleton() {
        return Err(SiteError::Api("watch needs a list collection".into()));
    }
    let remote = remote_api(ctx, remote)?;
    let interval = interval
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| ctx.config.poll_interval());

    // The poller thread cannot share the store, so file mode re-reads from
    // disk each tick and memory mode watches a snapshot.
    let snapshot = ctx.api.store().read();
    let data_dir = ctx.data_dir.clone();
    let mode = ctx.config.storage_mode;
    let local = move || -> Result<Vec<Record>> {
        let doc = match mode {
            StorageMode::File => ChecksumStore::new(&data_dir).read(),
            StorageMode::Memory => snapshot.clone(),
        };
        Ok(doc.records(collection).cloned().unwrap_or_default())
    };
    let fetch = move || remote.fetch_records(collection);

    println!(
        "{}",
        format!("Watching {} every {}s (Ctrl-C to stop)", collection, interval.as_secs()).dimmed()
    );
    let handle = poller::spawn(interval, local, fetch, move |differences| {
        println!(
            "{} {}",
            Utc::now().format("%H:%M:%S").to_string().dimmed(),
            format!("{} difference(s) in {}", differences.len(), collection).yellow()
        );
        for difference in differences {
            let key = difference
                .key()
                .map(Value::to_string)
                .unwrap_or_else(|| "(no id)".to_string());
            println!("  - {} {}", difference.label(), key);
        }
    });
    handle.wait();
    Ok(())
}

fn handle_publish(ctx: &AppContext, message: &str) -> Result<()> {
    match ctx.api.publish(message)? {
        Some(id) => println!("{}", format!("Queued snapshot {}", id).green()),
        None => println!(
            "{}",
            "No sync repository configured (set sync.repo_dir in sitevault.json).".yellow()
        ),
    }
    Ok(())
}

fn handle_status(ctx: &AppContext) -> Result<()> {
    let result = ctx.api.status()?;
    if let Some(report) = &result.status {
        println!("{:<10} {}", "mode".dimmed(), report.mode);
        if let Some(dir) = &report.data_dir {
            println!("{:<10} {}", "data".dimmed(), dir.display());
        }
        if let Some(modified) = report.modified {
            println!("{:<10} {}", "modified".dimmed(), format_time_ago(modified));
        }
        if let Some(sum) = &report.checksum {
            println!("{:<10} {}", "checksum".dimmed(), sum.chars().take(12).collect::<String>());
        }
        if report.mode == StorageMode::File {
            println!(
                "{:<10} {}",
                "backup".dimmed(),
                if report.backup_present { "yes" } else { "no" }
            );
        }
        println!();
        for (collection, count) in &report.counts {
            println!("{:<14} {:>4}", collection.to_string(), count);
        }
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_clear(ctx: &AppContext, yes: bool) -> Result<()> {
    if !yes {
        return Err(SiteError::Api("refusing to clear without --yes".into()));
    }
    ctx.api.store().clear();
    println!("{}", "All stored content removed.".green());
    Ok(())
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_check(label: &str, ok: bool) {
    let mark = if ok { "ok".green() } else { "--".red() };
    println!("{:>4}  {}", mark, label);
}

fn format_time_ago(timestamp: chrono::DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    timeago::Formatter::new().convert(duration.to_std().unwrap_or_default())
}
