use anyhow::Result;
use clap::Parser;
use gtags_engine::cli::app::Cli;
use gtags_engine::runtime::surface::CancelHandle;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    // Initialize tracing with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Ctrl-C cancels the run in flight
    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    // Execute command with user-friendly error handling
    if let Err(e) = cli.execute(cancel).await {
        // Log the full error for debugging
        debug!("Command execution failed: {:?}", e);

        let message = e.user_message();
        if !message.is_empty() {
            eprintln!("Error: {}", message);
        }

        std::process::exit(e.exit_code());
    }

    Ok(())
}
