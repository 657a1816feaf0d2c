use anyhow::Context;
use biblioteca_app::App;
use biblioteca_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load Biblioteca settings")?;
    biblioteca_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "biblioteca-app bootstrap starting"
    );

    let app = App::bootstrap(settings).await?;
    app.serve().await
}
