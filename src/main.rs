// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use corral::config::Config;
use corral::pipeline;
use corral::session::Session;
use corral::steps::build_steps;
use corral::teardown;

/// Disposable Kubernetes development environments
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the cluster, controllers and workload, then forward the service
    Deploy(DeployArgs),

    /// Remove managed resources, best-effort, in reverse dependency order
    Teardown(TeardownArgs),
}

#[derive(Args, Debug)]
struct SharedArgs {
    /// Name of the development cluster
    #[arg(long, default_value = "corral-dev")]
    cluster: String,

    /// Declarative cluster-runtime config file
    #[arg(long)]
    cluster_config: Option<PathBuf>,

    /// Application manifest file or directory
    #[arg(long, default_value = "deploy/app")]
    manifests: PathBuf,

    /// Extra values file for chart installs (repeatable)
    #[arg(long = "values")]
    values: Vec<PathBuf>,

    /// Namespace for the application workload
    #[arg(long, default_value = "demo")]
    app_namespace: String,

    /// Namespace for the GitOps controller
    #[arg(long, default_value = "flux-system")]
    gitops_namespace: String,

    /// Namespace for the ingress controller
    #[arg(long, default_value = "ingress-nginx")]
    ingress_namespace: String,

    /// Chart reference for the GitOps controller
    #[arg(long, default_value = "fluxcd-community/flux2")]
    gitops_chart: String,

    /// Release name for the GitOps controller
    #[arg(long, default_value = "flux2")]
    gitops_release: String,

    /// Chart reference for the ingress controller
    #[arg(long, default_value = "ingress-nginx/ingress-nginx")]
    ingress_chart: String,

    /// Release name for the ingress controller
    #[arg(long, default_value = "ingress-nginx")]
    ingress_release: String,

    /// Service to expose on the workstation
    #[arg(long, default_value = "demo-web")]
    service: String,

    /// Port the service listens on inside the cluster
    #[arg(long, default_value_t = 80)]
    remote_port: u16,

    /// Preferred local port; the next free one is used if taken
    #[arg(long, default_value_t = 8080)]
    local_port: u16,

    /// Directory for registry, kubeconfig, lock and process logs
    #[arg(long, default_value = ".corral")]
    state_dir: PathBuf,
}

#[derive(Args, Debug)]
struct DeployArgs {
    #[command(flatten)]
    shared: SharedArgs,
}

#[derive(Args, Debug)]
struct TeardownArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Also destroy the cluster itself (the explicit confirmation)
    #[arg(long)]
    destroy_cluster: bool,
}

impl SharedArgs {
    fn into_config(self) -> Config {
        Config {
            cluster_name: self.cluster,
            cluster_config: self.cluster_config,
            manifest_path: self.manifests,
            values_files: self.values,
            app_namespace: self.app_namespace,
            gitops_namespace: self.gitops_namespace,
            ingress_namespace: self.ingress_namespace,
            gitops_chart: self.gitops_chart,
            gitops_release: self.gitops_release,
            ingress_chart: self.ingress_chart,
            ingress_release: self.ingress_release,
            service: self.service,
            remote_port: self.remote_port,
            local_port: self.local_port,
            state_dir: self.state_dir,
        }
    }
}

// Exit status contract: 0 success, 1 fatal failure, 2 partial failure.
const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Deploy(args) => deploy(args).await,
        Commands::Teardown(args) => teardown_cmd(args).await,
    }
}

async fn deploy(args: DeployArgs) -> Result<ExitCode> {
    let session = Arc::new(Session::open(args.shared.into_config())?);
    info!("deploying environment '{}'", session.config.cluster_name);

    spawn_interrupt_handler(&session);

    let report = pipeline::run(&build_steps(&session), &session.cancel).await;

    match report.failure {
        None => {
            info!(
                "environment ready: {} steps applied, {} already in place",
                report.applied(),
                report.skipped()
            );
            info!("press Ctrl-C to stop the forward and exit");
            session.cancel.cancelled().await;

            info!("shutting down");
            session.stop_forwards().await;
            Ok(ExitCode::SUCCESS)
        }
        Some(failure) => {
            session.stop_forwards().await;
            error!("deploy failed at step '{}': {}", failure.step, failure.error);
            // Anything already provisioned stays recorded for teardown.
            if report.records.is_empty() {
                Ok(ExitCode::from(EXIT_FATAL))
            } else {
                Ok(ExitCode::from(EXIT_PARTIAL))
            }
        }
    }
}

async fn teardown_cmd(args: TeardownArgs) -> Result<ExitCode> {
    let session = Session::open(args.shared.into_config())?;
    info!("tearing down environment '{}'", session.config.cluster_name);

    let report = teardown::run(&session, args.destroy_cluster).await;

    if report.discovered {
        info!("resources were discovered by listing (registry was unavailable)");
    }
    info!("teardown finished: {}", report.summary());

    if report.cluster_destroy_failed {
        error!("cluster destroy failed; the cluster may still be holding resources");
        Ok(ExitCode::from(EXIT_FATAL))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// First Ctrl-C cancels the session: in-flight waits return promptly,
/// supervised forwards stop, the registry stays intact for a later teardown.
fn spawn_interrupt_handler(session: &Arc<Session>) {
    let cancel = session.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            cancel.cancel();
        }
    });
}
