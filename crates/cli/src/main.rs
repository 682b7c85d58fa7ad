use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use cdp_client::HttpClientFactory;
use cdp_domain::Settings;

use cdp_cli::cli::Cli;
use cdp_cli::commands::{self, Context as CommandContext};
use cdp_cli::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_or_default(&cli.settings)
        .with_context(|| format!("loading settings from {}", cli.settings.display()))?;
    init_tracing(&settings.logging);

    let ctx = CommandContext {
        factory: Arc::new(HttpClientFactory::new(settings.client.clone())),
        workers: settings.dispatch.workers,
    };
    let mut stdout = std::io::stdout().lock();
    commands::run(cli.command, &ctx, &mut stdout).await
}
