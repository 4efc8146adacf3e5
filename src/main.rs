//! `folio`: serves book archives through the virtual content proxy.

mod app;
mod error;

use crate::error::{ErrorKind, Result};
use axum::http::Uri;
use clap::{Parser, Subcommand};
use exn::ResultExt;
use folio_archive::Locator;
use folio_config::Config;
use folio_proxy::{RequestRouter, Route};
use folio_session::{CFI_KEY, DescriptorSource, HttpSource, Mode, ProxySource, select_mode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "folio", version, about = "Serve book archives through a virtual content proxy")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to listen on, overriding the configuration.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Fetch a book's manifest and print the reading mode it selects.
    Inspect {
        locator: String,
        /// Ask a running server instead of loading the book in-process.
        #[arg(long)]
        server: Option<reqwest::Url>,
    },
    /// Print how a request path would be routed.
    Route { path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).map_err(|err| err.raise(ErrorKind::Config))?;
    match cli.command {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Inspect { locator, server } => inspect(config, &locator, server).await,
        Command::Route { path } => route(&config, &path),
    }
}

async fn serve(mut config: Config, bind: Option<SocketAddr>) -> Result<ExitCode> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let proxy = app::proxy(&config)?;
    proxy.lifecycle().install();
    let app = app::router(&config, proxy.clone());

    let address = config.server.bind;
    let listener = TcpListener::bind(address)
        .await
        .or_raise(|| ErrorKind::Bind(address.to_string()))?;
    // Every client from here on is claimed, whether or not the proxy was
    // allowed to skip waiting.
    proxy.lifecycle().activate();
    tracing::info!(%address, prefix = proxy.router().prefix(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await
        .or_raise(|| ErrorKind::Serve)?;
    tracing::info!("Server stopped");
    Ok(ExitCode::SUCCESS)
}

async fn shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn inspect(config: Config, locator: &str, server: Option<reqwest::Url>) -> Result<ExitCode> {
    let locator = Locator::parse(locator).map_err(|err| {
        let message = (*err).to_string();
        err.raise(ErrorKind::Argument(message))
    })?;
    let router = RequestRouter::new(&config.proxy.prefix);
    let source: Box<dyn DescriptorSource> = match server {
        Some(server) => Box::new(HttpSource::new(reqwest::Client::new(), server, router)),
        None => Box::new(ProxySource::new(app::proxy(&config)?, app::origin(&config))),
    };
    match select_mode(source.as_ref(), &locator).await {
        Mode::Error { locator, failure } => {
            println!("mode: error");
            println!("locator: {locator}");
            println!("failure: {failure}");
            Ok(ExitCode::FAILURE)
        },
        mode => {
            let store = app::store(&config).await?;
            let position = match store.get(CFI_KEY).await {
                Ok(position) => position.filter(|cfi| !cfi.is_empty()),
                Err(err) => {
                    tracing::warn!(error = ?err, "Failed to read reading position");
                    None
                },
            };
            println!("mode: {}", mode.name());
            println!("position: {}", position.as_deref().unwrap_or("-"));
            let manifest = serde_json::to_string_pretty(&mode.manifest())
                .or_raise(|| ErrorKind::Inspect("failed to render manifest".to_string()))?;
            println!("{manifest}");
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn route(config: &Config, path: &str) -> Result<ExitCode> {
    let uri: Uri = path.parse::<Uri>().or_raise(|| ErrorKind::Argument(format!("not a request path: {path}")))?;
    let router = RequestRouter::new(&config.proxy.prefix);
    match router.route(&uri, &app::origin(config)) {
        Route::Manifest(request) => {
            println!("manifest");
            println!("locator: {}", request.target.locator);
            println!("qualifier: {}", request.target.qualifier.as_deref().unwrap_or("-"));
            println!("base_url: {}", request.target.base_url);
        },
        Route::Resource(request) => {
            println!("resource");
            println!("locator: {}", request.target.locator);
            println!("qualifier: {}", request.target.qualifier.as_deref().unwrap_or("-"));
            println!("base_url: {}", request.target.base_url);
            println!("path: {}", request.path);
        },
        Route::NotRouted => println!("not routed"),
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from(["folio", "serve", "--bind", "0.0.0.0:9000", "-c", "folio.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("folio.toml")));
        assert!(matches!(cli.command, Command::Serve { bind: Some(bind) } if bind.port() == 9000));
        assert!(Cli::try_parse_from(["folio", "inspect"]).is_err());
    }

    #[tokio::test]
    async fn test_inspect_unroutable_locator() {
        let err = inspect(Config::default(), "../escape.cbz", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Argument(_)));
    }
}
