use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Anchor's self-CPI instruction tag: the leading 8 bytes of instruction
/// data when a program invokes itself to log an event (`emit_cpi!`).
/// Little-endian bytes of 0x1d9acb512ea545e4; fixed protocol-wide.
pub const CPI_EVENT_TAG: [u8; 8] = [0xe4, 0x45, 0xa5, 0x2e, 0x51, 0xcb, 0x9a, 0x1d];

/// Probe one logged payload for the CPI event wrapper.
///
/// Inner-instruction data arrives as base-58 text. If it decodes and leads
/// with [`CPI_EVENT_TAG`], the remainder is a standard event payload and is
/// returned re-encoded as base-64, ready for plain event decoding. Anything
/// else yields `None`: most instruction data is unrelated, so a failed
/// probe is an expected outcome, not an error.
pub fn parse_cpi_event_data(log: &str) -> Option<String> {
    let raw = bs58::decode(log).into_vec().ok()?;
    let payload = raw.strip_prefix(&CPI_EVENT_TAG)?;
    Some(STANDARD.encode(payload))
}
