use anyhow::Result;
use clap::Parser;
use cpiscan_core::{
    fan_out, retry_rate_limited, scan_transaction, CpiscanError, DecodedEvent, EventRegistry,
    TransactionRecord,
};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::UiTransactionEncoding;
use std::sync::Arc;
use tracing::{debug, info};

/// Cpiscan Backfill - collect historical CPI events for an Anchor program
#[derive(Parser)]
#[command(name = "cpiscan-backfill")]
#[command(about = "Scan a program's transaction history for CPI events", long_about = None)]
struct Cli {
    /// Solana RPC URL
    #[arg(short, long, default_value = "https://api.mainnet-beta.solana.com")]
    rpc_url: String,

    /// Program ID whose CPI events to collect
    #[arg(short, long)]
    program: String,

    /// Path to the program's Anchor IDL JSON
    #[arg(short, long)]
    idl: String,

    /// Stop scanning back at this signature (exclusive lower bound)
    #[arg(short, long)]
    until: Option<String>,

    /// Number of signatures to fetch (latest N transactions)
    #[arg(short, long, default_value = "1000")]
    limit: u64,

    /// Maximum concurrent transaction fetches
    #[arg(short, long, default_value = "8")]
    concurrency: usize,
}

struct TransactionEvents {
    signature: String,
    slot: u64,
    block_time: Option<chrono::DateTime<chrono::Utc>>,
    events: Vec<DecodedEvent>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    run_backfill(cli).await
}

async fn run_backfill(cli: Cli) -> Result<()> {
    info!("Starting Cpiscan Backfill");
    info!("RPC URL: {}", cli.rpc_url);
    info!("Fetching latest {} signatures", cli.limit);

    let program_id = cli
        .program
        .parse::<Pubkey>()
        .map_err(|e| anyhow::anyhow!("Invalid program ID {}: {}", cli.program, e))?;

    let registry = EventRegistry::from_idl_file(&cli.idl)?;
    info!(
        "Loaded IDL for {}: {} event(s)",
        registry.address(),
        registry.event_count()
    );

    let rpc_client = Arc::new(RpcClient::new(cli.rpc_url));
    let registry = Arc::new(registry);

    let until = cli
        .until
        .as_deref()
        .map(|s| s.parse::<Signature>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid until signature: {}", e))?;

    let config = GetConfirmedSignaturesForAddress2Config {
        before: None,
        until,
        limit: Some(cli.limit as usize),
        commitment: Some(CommitmentConfig::confirmed()),
    };

    let signatures = rpc_client
        .get_signatures_for_address_with_config(&program_id, config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get signatures for {}: {}", cli.program, e))?;

    info!("Found {} signatures", signatures.len());

    // Fetch and scan concurrently; completion order is arbitrary.
    let results = {
        let rpc_client = rpc_client.clone();
        let registry = registry.clone();
        fan_out(signatures, cli.concurrency, move |status| {
            let rpc_client = rpc_client.clone();
            let registry = registry.clone();
            async move { fetch_and_scan(rpc_client, registry, program_id, status).await }
        })
        .await
    };

    let mut batches = Vec::new();
    for result in results {
        match result {
            Ok(Some(batch)) => batches.push(batch),
            Ok(None) => {}
            // A registry fault means every remaining transaction would hit
            // the same malformed table; stop instead of skipping.
            Err(e) => return Err(e.into()),
        }
    }

    // Restore ledger order after the unordered fan-out.
    batches.sort_by(|a, b| {
        a.slot
            .cmp(&b.slot)
            .then_with(|| a.signature.cmp(&b.signature))
    });

    let mut total_events = 0;
    for batch in &batches {
        for event in &batch.events {
            total_events += 1;
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({
                    "signature": batch.signature,
                    "slot": batch.slot,
                    "block_time": batch.block_time,
                    "name": event.name,
                    "data": event.data,
                }))?
            );
        }
    }

    info!(
        "Backfill complete: {} event(s) from {} transaction(s)",
        total_events,
        batches.len()
    );

    Ok(())
}

async fn fetch_and_scan(
    rpc_client: Arc<RpcClient>,
    registry: Arc<EventRegistry>,
    program_id: Pubkey,
    status: RpcConfirmedTransactionStatusWithSignature,
) -> std::result::Result<Option<TransactionEvents>, CpiscanError> {
    if status.err.is_some() {
        debug!("skipping failed transaction {}", status.signature);
        return Ok(None);
    }

    let signature = match status.signature.parse::<Signature>() {
        Ok(signature) => signature,
        Err(e) => {
            debug!("failed to parse signature {}: {}", status.signature, e);
            return Ok(None);
        }
    };

    let transaction = retry_rate_limited(
        || async {
            rpc_client
                .get_transaction_with_config(
                    &signature,
                    RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::Json),
                        commitment: Some(CommitmentConfig::confirmed()),
                        max_supported_transaction_version: Some(0),
                    },
                )
                .await
        },
        3,
    )
    .await;

    let transaction = match transaction {
        Ok(transaction) => transaction,
        Err(e) => {
            debug!("failed to fetch transaction {}: {}", status.signature, e);
            return Ok(None);
        }
    };

    let record = match TransactionRecord::from_encoded(&transaction) {
        Ok(record) => record,
        Err(e) => {
            debug!("skipping transaction {}: {}", status.signature, e);
            return Ok(None);
        }
    };

    let events = scan_transaction(&record, &program_id, &registry)?;
    if events.is_empty() {
        return Ok(None);
    }

    debug!("{}: {} event(s)", record.signature, events.len());
    Ok(Some(TransactionEvents {
        block_time: record.timestamp(),
        signature: record.signature,
        slot: record.slot,
        events,
    }))
}
