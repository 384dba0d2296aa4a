use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use oi_tracker::api_server_axum;
use oi_tracker::logging::init_logging;
use oi_tracker::models::Grid;
use oi_tracker::nse::NseClient;
use oi_tracker::{DataSource, Mode, Orchestrator, TrackerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn print_banner(title: &str) {
    println!("{}", "=".repeat(60).blue());
    println!("{}", title.green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();
}

fn print_grid_summary(grid: &Grid) {
    println!("{} Underlying: {} @ {:.2}", "✓".green(), grid.underlying.yellow(), grid.underlying_price);
    println!("{} Expiry: {}", "✓".green(), grid.expiry);
    println!("{} ATM strike: {}", "✓".green(), grid.atm_strike);
    println!("{} Contracts tracked: {}", "ℹ".blue(), grid.rows.len());
    println!(
        "{} Breached cells: {}/{} (calls {}/{}, puts {}/{})",
        "ℹ".blue(),
        grid.breached,
        grid.total,
        grid.calls.breached,
        grid.calls.total,
        grid.puts.breached,
        grid.puts.total
    );
    if grid.alert {
        println!("{} {}", "⚠".red(), "ALERT: more than half of OI cells breached".red().bold());
    } else {
        println!("{} No alert", "✓".green());
    }
    println!();
}

/// Single cycle, grid printed as JSON
async fn run_once(mut orchestrator: Orchestrator) -> Result<()> {
    print_banner("OI Change Tracker (single cycle)");

    let grid = orchestrator.run_cycle(Utc::now()).await?;
    print_grid_summary(&grid);
    println!("{}", serde_json::to_string_pretty(grid.as_ref())?);

    Ok(())
}

/// Background tracker plus API server until Ctrl+C
async fn run_server(orchestrator: Orchestrator, port: u16) -> Result<()> {
    print_banner("OI Change Tracker");

    let cancel = CancellationToken::new();
    let handle = orchestrator.handle();

    let tracker = tokio::spawn(orchestrator.run(cancel.clone()));
    let mut server = tokio::spawn(api_server_axum::start_server(port, handle, cancel.clone()));

    println!("{} API: http://127.0.0.1:{}/api/grid", "→".cyan(), port);
    println!("{} Press Ctrl+C to stop", "ℹ".blue());
    println!();

    // The server only returns early on error (e.g. port already bound)
    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            None
        }
        res = &mut server => Some(res),
    };
    cancel.cancel();

    tracker.await?;
    match finished {
        Some(res) => res??,
        None => server.await??,
    }

    println!("{}", "Stopped".green().bold());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e.to_string().red());
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir)?;
    info!(
        underlying = %config.underlying,
        windows = ?config.windows,
        strikes_each_side = config.strikes_each_side,
        "configuration loaded"
    );

    let source: Arc<dyn DataSource> = Arc::new(NseClient::new()?.pin_expiry(config.expiry));
    let mode = config.mode.clone();
    let port = config.port;
    let orchestrator = Orchestrator::new(source, config);

    let result = match mode {
        Mode::Once => run_once(orchestrator).await,
        Mode::Server => run_server(orchestrator, port).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "OI tracker exited with error");
    }
    result
}
