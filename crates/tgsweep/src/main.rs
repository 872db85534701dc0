use std::sync::Arc;

use anyhow::Context;

use tgsweep_core::{
    audit::AuditLogger,
    client::throttled::{ThrottleConfig, ThrottledClient},
    config::Config,
    engine::Engine,
};
use tgsweep_telegram::TelegramClient;

mod menu;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgsweep_core::logging::init("tgsweep")?;

    let cfg = Config::load().context("loading configuration")?;
    let telegram = TelegramClient::connect(cfg.api_id, &cfg.api_hash, &cfg.session_file)
        .await
        .context("connecting to Telegram")?;
    let client = Arc::new(ThrottledClient::new(
        Arc::new(telegram),
        ThrottleConfig {
            min_interval: cfg.min_call_interval,
        },
    ));

    let engine = Engine::new(client, cfg.engine.clone())
        .with_audit(AuditLogger::new(&cfg.audit_log_path, cfg.audit_log_json));

    menu::run(&engine).await?;
    Ok(())
}
