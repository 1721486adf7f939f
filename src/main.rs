use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchbox::browser::{BrowserLauncher, DEFAULT_BROWSER_IMAGE};
use launchbox::compose;
use launchbox::container::{ContainerRuntime, ContainerRuntimeApi};
use launchbox::lifecycle::{self, ShutdownHandle};
use launchbox::proxy;
use launchbox::server::{self, GatewayState};
use launchbox::session::Session;
use launchbox::STORE_URL;

#[derive(Parser, Debug)]
#[command(
    name = "launchbox",
    version,
    about = "Local launcher and session manager for containerized demo apps"
)]
struct Cli {
    /// Address to serve the front-end and control channel on
    #[arg(long, env = "LAUNCHBOX_ADDR", default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Do not launch any browser
    #[arg(long = "no-browser")]
    no_browser: bool,

    /// Force the containerized browser even when a host browser exists
    #[arg(long = "container-browser")]
    container_browser: bool,

    /// HTTP proxy URL applied to this process and every container it starts
    #[arg(long = "http-proxy", env = "LAUNCHBOX_HTTP_PROXY", default_value = "")]
    http_proxy: String,

    /// Comma-separated proxy exclusion list
    #[arg(long = "no-proxy", env = "LAUNCHBOX_NO_PROXY", default_value = "")]
    no_proxy: String,

    /// Containerized browser image
    #[arg(long = "browser-image", default_value = DEFAULT_BROWSER_IMAGE)]
    browser_image: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let session = Arc::new(Session::new());
    let runtime: Arc<dyn ContainerRuntimeApi> = Arc::new(ContainerRuntime::new());
    let shutdown = ShutdownHandle::new();
    lifecycle::spawn_signal_listener(shutdown.clone());

    let code = match run(&cli, session.clone(), runtime.clone(), shutdown.clone()).await {
        Ok(()) => shutdown.exit_code(),
        Err(err) => {
            error!("{err:#}");
            1
        }
    };

    // Master shutdown path: best-effort teardown of every container this
    // session started, then exit.
    session.registry().drain_and_stop_all(runtime.as_ref()).await;
    std::process::exit(code);
}

async fn run(
    cli: &Cli,
    session: Arc<Session>,
    runtime: Arc<dyn ContainerRuntimeApi>,
    shutdown: ShutdownHandle,
) -> Result<()> {
    lifecycle::check_display_env()?;

    let workdir = lifecycle::setup_working_dir()?;
    info!("working directory: {}", workdir.display());

    // Must complete before any container launch so children inherit it.
    if let Some(settings) = proxy::configure(&cli.http_proxy, &cli.no_proxy) {
        session.set_proxy(settings);
    }

    let compose_tool = compose::ensure_compose_tool(&workdir).await;

    if !cli.no_browser {
        info!("launching browser");
        let launcher = BrowserLauncher::new(
            cli.browser_image.clone(),
            cli.container_browser,
            gateway_url(cli.addr),
        );
        launcher.launch(session, runtime, shutdown.clone()).await;
    }

    let state = GatewayState::new(compose_tool, STORE_URL);
    server::serve(cli.addr, state, shutdown).await
}

/// Root URL the browser should open; an unspecified bind address maps to
/// localhost.
fn gateway_url(addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        "localhost".to_string()
    } else if addr.is_ipv6() {
        format!("[{}]", addr.ip())
    } else {
        addr.ip().to_string()
    };
    format!("http://{}:{}/#/", host, addr.port())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "launchbox=debug,tower_http=debug"
    } else {
        "launchbox=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
