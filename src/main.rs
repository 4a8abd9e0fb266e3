use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use time::UtcOffset;
use tracing::{info, warn};

use process_booster::console::ConsoleDisplay;
use process_booster::logging::init_tracing;
use process_booster::web::{HttpServer, Router};
use process_booster::{ActivityLog, Config, FileActivityLog, Manager};

fn main() -> Result<()> {
    // The local offset can only be read soundly while this is the only thread
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let config = Config::load().context("loading configuration")?;
    init_tracing(&config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?
        .block_on(run(config, offset))
}

async fn run(config: Config, offset: UtcOffset) -> Result<()> {
    let log: Arc<dyn ActivityLog> = Arc::new(
        FileActivityLog::new(config.log.file_path.clone()).with_offset(offset),
    );
    let manager = Arc::new(Manager::new(Arc::clone(&log)));

    let mut server = HttpServer::new(
        Router::new(Arc::clone(&manager), Arc::clone(&log)),
        config.bind_address()?,
        config.request_timeout(),
    );
    // The console stays usable even when the port is taken
    let web_url = match server.start().await {
        Ok(addr) => {
            info!(%addr, url = %config.http.listen_url, "web interface available");
            Some(config.http.listen_url.clone())
        }
        Err(e) => {
            warn!(error = %e, "continuing without the HTTP server");
            None
        }
    };

    let console = ConsoleDisplay::new(manager, log, web_url).with_offset(offset);
    tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        console.run(&mut stdin.lock(), &mut stdout.lock());
    })
    .await
    .context("console loop panicked")?;

    server.stop().await;
    Ok(())
}
