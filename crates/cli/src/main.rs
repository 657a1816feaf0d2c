use anyhow::Context;
use biblioteca_app::App;
use biblioteca_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "biblioteca", version)]
#[command(about = "Biblioteca library backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Render the chart reports as PNG files
    #[command(name = "generar-reportes")]
    GenerarReportes {
        /// Directory the charts are written to
        #[arg(long, env = "BIBLIOTECA_REPORTS__OUTPUT_DIR")]
        output_dir: Option<String>,
    },
    /// Drop blacklisted refresh tokens that already expired
    FlushExpiredTokens,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load Biblioteca settings")?;
    biblioteca_telemetry::init(&settings.telemetry)?;
    tracing::debug!(env = ?settings.environment, db = %settings.database.url, "cli settings loaded");

    match cli.command {
        Commands::Serve => {
            let app = App::bootstrap(settings).await?;
            app.serve().await?;
        }
        Commands::Migrate => {
            let app = App::bootstrap(settings).await?;
            app.db().close().await;
            println!("Migraciones aplicadas.");
        }
        Commands::GenerarReportes { output_dir } => {
            if let Some(dir) = output_dir {
                settings.reports.output_dir = dir;
            }
            let app = App::bootstrap(settings).await?;
            let summary = app.generate_reports().await?;
            app.db().close().await;

            for path in &summary.written {
                println!("{}", path.display());
            }
            println!(
                "Reportes generados: {} escritos, {} sin datos.",
                summary.written.len(),
                summary.skipped.len()
            );
        }
        Commands::FlushExpiredTokens => {
            let app = App::bootstrap(settings).await?;
            let removed = app.flush_expired_tokens().await?;
            app.db().close().await;
            println!("Tokens expirados eliminados: {removed}");
        }
    }

    Ok(())
}
