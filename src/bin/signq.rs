//! signq CLI — duplicate check for the packaging signing/publishing queue.

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use signq::config::Config;
use signq::db::Db;
use signq::model::{Artifact, BuildSpec, Envelope};
use signq::queue::{Client, MessageBatch};
use signq::telemetry::{TelemetryConfig, init_telemetry};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "signq",
    about = "Duplicate check for the packaging signing/publishing queue"
)]
struct Cli {
    /// Storage account the queue database belongs to
    #[arg(long)]
    account: Option<String>,
    /// Queue holding pending signing/publishing jobs
    #[arg(long)]
    queue: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether a build spec is already pending (exit 1 when it is)
    Check {
        /// Build spec JSON
        spec: String,
    },
    /// List the build specs pending in the queue
    List,
    /// Enqueue a build message unless its spec is already pending
    Enqueue {
        /// Build spec JSON
        spec: String,
        /// Artifact file name
        #[arg(long)]
        name: String,
        /// Artifact download URI
        #[arg(long)]
        uri: String,
        /// Artifact SHA-256 checksum
        #[arg(long)]
        sha256sum: String,
        /// Enqueue even when a duplicate is pending
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(account) = cli.account {
        config.account = account;
    }
    if let Some(queue) = cli.queue {
        config.queue = queue;
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "signq".to_string(),
    })?;

    let db = Db::connect(config.connection_url().expose_secret()).await?;

    match cli.command {
        Command::Check { spec } => cmd_check(&db, &config.queue, spec).await,
        Command::List => cmd_list(&db, &config.queue).await,
        Command::Enqueue {
            spec,
            name,
            uri,
            sha256sum,
            force,
        } => {
            let artifact = Artifact {
                name,
                uri,
                sha256sum,
            };
            cmd_enqueue(&db, &config.queue, spec, artifact, force).await
        }
    }
}

/// Drain the queue into a batch, aborting cleanly on ctrl-c.
///
/// Non-fatal fetch errors (transport noise, skippable decode failures)
/// are logged and the partial batch is used anyway.
async fn fetch_batch(db: &Db, queue: &str) -> anyhow::Result<MessageBatch> {
    let client = Client::new(db, queue);
    let cancel = client.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel.cancel();
    });

    let (batch, err) = client.fetch_all().await;
    ctrl_c.abort();

    if let Some(err) = err {
        if err.is_fatal() {
            return Err(err.into());
        }
        tracing::warn!("fetch completed with errors: {err}");
    }

    Ok(batch)
}

async fn cmd_check(db: &Db, queue: &str, spec_json: String) -> anyhow::Result<ExitCode> {
    let spec: BuildSpec = serde_json::from_str(&spec_json)?;
    let mut batch = fetch_batch(db, queue).await?;

    if batch.contains(&spec)? {
        println!("Pending: {spec}");
        Ok(ExitCode::from(1))
    } else {
        println!("Not pending: {spec}");
        Ok(ExitCode::SUCCESS)
    }
}

async fn cmd_list(db: &Db, queue: &str) -> anyhow::Result<ExitCode> {
    let mut batch = fetch_batch(db, queue).await?;
    let mut specs: Vec<&BuildSpec> = batch.specs()?.collect();

    if specs.is_empty() {
        println!("No pending builds.");
        return Ok(ExitCode::SUCCESS);
    }

    specs.sort_by(|a, b| {
        (&a.pkg, &a.distro, &a.arch, &a.tag).cmp(&(&b.pkg, &b.distro, &b.arch, &b.tag))
    });

    // Header
    println!(
        "{:<16}  {:<12}  {:<8}  {:<12}  COMMIT",
        "PKG", "DISTRO", "ARCH", "TAG"
    );
    println!("{}", "-".repeat(72));

    for spec in &specs {
        println!(
            "{:<16}  {:<12}  {:<8}  {:<12}  {}",
            spec.pkg, spec.distro, spec.arch, spec.tag, spec.commit
        );
    }

    println!("\n{} pending build(s)", specs.len());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_enqueue(
    db: &Db,
    queue: &str,
    spec_json: String,
    artifact: Artifact,
    force: bool,
) -> anyhow::Result<ExitCode> {
    let spec: BuildSpec = serde_json::from_str(&spec_json)?;

    if !force {
        let mut batch = fetch_batch(db, queue).await?;
        if batch.contains(&spec)? {
            println!("Already pending, not enqueuing: {spec}");
            return Ok(ExitCode::SUCCESS);
        }
    }

    db.create_queue(queue).await?;

    let envelope = Envelope { artifact, spec };
    let payload = serde_json::Value::String(envelope.encode()?);
    let msg_id = db.send_to_queue(queue, &payload, 0).await?;

    println!("Enqueued: {} (msg {msg_id})", envelope.spec);
    Ok(ExitCode::SUCCESS)
}
