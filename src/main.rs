use newsletter_webhook::configuration::get_config;
use newsletter_webhook::startup::Application;
use newsletter_webhook::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber(
        "newsletter-webhook".to_string(),
        "info".to_string(),
        std::io::stdout,
    );
    init_subscriber(subscriber);

    let config = get_config()?;
    let application = Application::build(config).await?;
    application.run_until_stopped().await?;
    Ok(())
}
