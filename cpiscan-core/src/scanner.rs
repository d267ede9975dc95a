use crate::decoder::EventDecoder;
use crate::error::{CpiscanError, Result};
use crate::registry::EventRegistry;
use crate::types::{DecodedEvent, TransactionRecord};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

/// Walk a confirmed transaction's inner-instruction tree and decode every
/// CPI event the target program emitted.
///
/// Ordering is preserved end to end: inner-instruction sets in transaction
/// order, instructions within each set in execution order, so the result is
/// deterministic for identical input. A malformed payload on one matching
/// instruction is logged and skipped; only a registry-consistency fault
/// aborts the scan.
pub fn scan_transaction(
    record: &TransactionRecord,
    program_id: &Pubkey,
    registry: &EventRegistry,
) -> Result<Vec<DecodedEvent>> {
    let decoder = EventDecoder::new(registry);
    let target = program_id.to_string();
    let mut events = Vec::new();

    for set in &record.inner_instruction_sets {
        for ix in &set.instructions {
            // An out-of-range index or unknown key is ledger data this
            // crate does not validate; treat it as a non-match.
            let key = record.account_keys.get(ix.program_id_index as usize);
            if key.map(String::as_str) != Some(target.as_str()) {
                continue;
            }

            match decoder.decode(&ix.data) {
                Ok(Some(event)) => {
                    debug!(
                        "decoded {} from inner set {} of {}",
                        event.name, set.index, record.signature
                    );
                    events.push(event);
                }
                Ok(None) => {}
                Err(CpiscanError::EventDecode(msg)) => {
                    warn!(
                        "skipping malformed event payload in {} (inner set {}): {}",
                        record.signature, set.index, msg
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(events)
}
