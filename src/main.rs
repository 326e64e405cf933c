use clap::Parser;
use std::sync::Arc;
use tokio::sync::Notify;

mod config;
mod handler;
mod http;
mod logger;
mod relay;
mod server;

/// Local relay that forwards browser chat requests to an LLM API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file name, without extension
    #[arg(short, long, default_value = "config")]
    config: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = config::Config::load_from(&args.config)?;

    logger::init(&cfg.logging)?;

    // Worker threads follow `server.workers`, defaulting to one per CPU core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::bind_listener(addr, cfg.server.backlog)?;

    let state = Arc::new(config::AppState::new(cfg)?);
    logger::log_server_start(
        &addr,
        &state.config,
        state.upstream.url().as_str(),
        state.upstream.timeout(),
    );

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown));
    server::start_server_loop(listener, state, shutdown).await;

    logger::log_info("Chat relay stopped");
    Ok(())
}
