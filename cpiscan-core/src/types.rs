use crate::error::{CpiscanError, Result};
use serde::{Deserialize, Serialize};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInnerInstructions,
    UiInstruction, UiMessage,
};

pub type Slot = u64;
pub type EventDiscriminator = [u8; 8];

/// One decoded CPI event: the registry name plus its decoded fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub name: String,
    pub data: serde_json::Value,
}

/// One field of an event layout. `field_type` keeps the IDL's own type
/// descriptor, which may be a plain string ("u64") or an object
/// ({"array": ["u8", 32]}).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: serde_json::Value,
}

/// An instruction synthesized by CPI during execution. `data` is the
/// base-58 text the RPC layer returns; `program_id_index` points into the
/// transaction's static account keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerInstruction {
    pub program_id_index: u8,
    pub data: String,
}

/// The inner instructions nested under the top-level instruction at `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerInstructionSet {
    pub index: u8,
    pub instructions: Vec<InnerInstruction>,
}

/// Immutable view of one confirmed transaction: just the pieces the event
/// scan needs, lifted out of the RPC response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub slot: Slot,
    pub block_time: Option<i64>,
    /// Static account keys, base-58 text, in message order.
    pub account_keys: Vec<String>,
    pub inner_instruction_sets: Vec<InnerInstructionSet>,
}

impl TransactionRecord {
    /// Lift an RPC `getTransaction` response into a record.
    ///
    /// Only JSON-encoded transactions with a raw message are supported;
    /// other encodings do not carry the index-addressed account keys the
    /// scanner resolves against.
    pub fn from_encoded(tx: &EncodedConfirmedTransactionWithStatusMeta) -> Result<Self> {
        let meta = tx
            .transaction
            .meta
            .as_ref()
            .ok_or_else(|| CpiscanError::Transaction("transaction has no metadata".to_string()))?;

        let ui_tx = match &tx.transaction.transaction {
            EncodedTransaction::Json(ui_tx) => ui_tx,
            _ => {
                return Err(CpiscanError::Transaction(
                    "only JSON-encoded transactions are supported".to_string(),
                ));
            }
        };

        let signature = ui_tx
            .signatures
            .first()
            .ok_or_else(|| CpiscanError::Transaction("transaction has no signature".to_string()))?
            .clone();

        let account_keys = match &ui_tx.message {
            UiMessage::Raw(raw) => raw.account_keys.clone(),
            UiMessage::Parsed(_) => {
                return Err(CpiscanError::Transaction(
                    "jsonParsed messages are not supported, request Json encoding".to_string(),
                ));
            }
        };

        let inner: Option<Vec<UiInnerInstructions>> = meta.inner_instructions.clone().into();
        let inner_instruction_sets = inner
            .unwrap_or_default()
            .into_iter()
            .map(|set| InnerInstructionSet {
                index: set.index,
                instructions: set
                    .instructions
                    .into_iter()
                    .filter_map(|ix| match ix {
                        UiInstruction::Compiled(ix) => Some(InnerInstruction {
                            program_id_index: ix.program_id_index,
                            data: ix.data,
                        }),
                        // jsonParsed inner instructions carry no account
                        // index to resolve against
                        UiInstruction::Parsed(_) => None,
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            signature,
            slot: tx.slot,
            block_time: tx.block_time,
            account_keys,
            inner_instruction_sets,
        })
    }

    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.block_time
            .and_then(|bt| chrono::DateTime::from_timestamp(bt, 0))
    }
}
