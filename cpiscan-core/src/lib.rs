mod cpi;
mod decoder;
mod error;
mod layout;
mod registry;
mod retry;
mod scanner;
mod types;

pub use cpi::{parse_cpi_event_data, CPI_EVENT_TAG};
pub use decoder::EventDecoder;
pub use error::{CpiscanError, Result};
pub use layout::EventLayout;
pub use registry::{compute_discriminator, EventRegistry, IdlEventEntry, ProgramIdl};
pub use retry::{fan_out, retry_rate_limited};
pub use scanner::scan_transaction;
pub use types::{
    DecodedEvent, EventDiscriminator, IdlField, InnerInstruction, InnerInstructionSet, Slot,
    TransactionRecord,
};
