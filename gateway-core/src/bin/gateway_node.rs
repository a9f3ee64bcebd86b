//! Gateway node binary
//!
//! Runs two in-process gateways, one serving FABRIC and one serving BESU,
//! moves an asset between them, and prints the session and metrics.

use anyhow::Context;
use chrono::{Duration, Utc};
use gateway_core::{Gateway, GatewayConfig, LocalChannel, TransferRequest};
use ledger_adapters::InMemoryLedger;
use odap_protocol::AssetProfile;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => GatewayConfig::from_env()?,
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level));
    if config.log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting {} v{}", config.name, config.service_version);

    let client = Gateway::new(config.clone())?;
    let fabric = Arc::new(InMemoryLedger::new("FABRIC").with_asset("asset-1", 100));
    client.register_adapter(fabric.clone()).await;

    let server = Arc::new(Gateway::new(GatewayConfig {
        name: format!("{}-counterpart", config.name),
        secret_key_hex: None,
        ..config
    })?);
    let besu = Arc::new(InMemoryLedger::new("BESU"));
    server.register_adapter(besu.clone()).await;

    let request = TransferRequest {
        session_id: None,
        asset_profile: AssetProfile::expiring_at(Utc::now() + Duration::hours(1)),
        source_dlt: "FABRIC".to_string(),
        recipient_dlt: "BESU".to_string(),
        source_ledger_asset_id: "asset-1".to_string(),
        recipient_ledger_asset_id: "asset-1-besu".to_string(),
        asset_size: 100,
        recipient_gateway_pubkey: server.public_key_hex().to_string(),
        originator_pubkey: client.public_key_hex().to_string(),
        beneficiary_pubkey: server.public_key_hex().to_string(),
    };

    let channel = LocalChannel::new(server.clone());
    let outcome = client.transfer(request, &channel).await?;

    tracing::info!(
        "Transfer {} finished: source asset present = {}, recipient asset present = {}",
        outcome.session_id,
        fabric.asset("asset-1").is_some(),
        besu.asset("asset-1-besu").is_some()
    );
    println!("{}", serde_json::to_string_pretty(&outcome.session)?);

    let mut buffer = Vec::new();
    for gateway in [&client, server.as_ref()] {
        TextEncoder::new().encode(&gateway.metrics().registry().gather(), &mut buffer)?;
    }
    println!("{}", String::from_utf8(buffer)?);

    Ok(())
}
