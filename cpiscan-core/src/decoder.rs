use crate::cpi::parse_cpi_event_data;
use crate::error::{CpiscanError, Result};
use crate::registry::EventRegistry;
use crate::types::DecodedEvent;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decodes opaque instruction-data strings against one program's registry.
///
/// Borrows the registry, so decoders for different programs can run side by
/// side over the same transaction stream without copying layout tables.
pub struct EventDecoder<'a> {
    registry: &'a EventRegistry,
}

impl<'a> EventDecoder<'a> {
    pub fn new(registry: &'a EventRegistry) -> Self {
        Self { registry }
    }

    /// Decode one logged payload.
    ///
    /// `Ok(None)` covers every expected non-match: data that is not
    /// base-64, payloads shorter than a discriminator, and discriminators
    /// the registry does not know. A discriminator that resolves to a name
    /// with no registered layout means the registry itself is malformed and
    /// fails hard; a resolved event whose bytes do not fit its layout is a
    /// recoverable [`CpiscanError::EventDecode`].
    pub fn decode(&self, log: &str) -> Result<Option<DecodedEvent>> {
        // CPI wrapper first. The unwrapped remainder is strictly shorter
        // than the input, so the recursion bottoms out on the plain path.
        if let Some(unwrapped) = parse_cpi_event_data(log) {
            return self.decode(&unwrapped);
        }

        let raw = match STANDARD.decode(log) {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        };
        if raw.len() < 8 {
            return Ok(None);
        }
        let (disc, payload) = raw.split_at(8);

        let name = match self.registry.event_name(disc) {
            Some(name) => name,
            None => return Ok(None),
        };
        let layout = self.registry.layout(name).ok_or_else(|| {
            CpiscanError::Registry(format!("event {} has no registered layout", name))
        })?;

        let data = layout.decode(payload)?;
        Ok(Some(DecodedEvent {
            name: name.to_string(),
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpi::CPI_EVENT_TAG;
    use crate::registry::compute_discriminator;
    use serde_json::json;
    use solana_sdk::pubkey::Pubkey;

    const PING_IDL: &str = r#"{
        "address": "Test111111111111111111111111111111",
        "events": [
            { "name": "Ping", "discriminator": [0, 0, 0, 0, 0, 0, 0, 0] }
        ],
        "types": [
            { "name": "Ping", "type": { "kind": "struct", "fields": [] } }
        ]
    }"#;

    fn domain_registry() -> EventRegistry {
        EventRegistry::from_idl_str(
            r#"{
                "address": "GsNNozDfJPnQNRHsDXZKcECg5yYrUna6Td8rYb1otJCu",
                "events": [ { "name": "DomainCreated" } ],
                "types": [
                    {
                        "name": "DomainCreated",
                        "type": {
                            "kind": "struct",
                            "fields": [
                                {"name": "id", "type": "u64"},
                                {"name": "owner", "type": "pubkey"},
                                {"name": "name", "type": "string"},
                                {"name": "dom_type", "type": "u8"}
                            ]
                        }
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    fn domain_created_bytes(id: u64, owner: &Pubkey, name: &str, dom_type: u8) -> Vec<u8> {
        let mut bytes = compute_discriminator("DomainCreated").to_vec();
        bytes.extend_from_slice(&id.to_le_bytes());
        bytes.extend_from_slice(&owner.to_bytes());
        bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(dom_type);
        bytes
    }

    #[test]
    fn test_ping_event_decodes_to_empty_data() {
        let registry = EventRegistry::from_idl_str(PING_IDL).unwrap();
        let decoder = EventDecoder::new(&registry);

        let event = decoder.decode("AAAAAAAAAAA=").unwrap().unwrap();
        assert_eq!(event.name, "Ping");
        assert_eq!(event.data, json!({}));
    }

    #[test]
    fn test_direct_event_decodes_fields() {
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);
        let owner = Pubkey::new_unique();

        let log = STANDARD.encode(domain_created_bytes(7, &owner, "first-domain", 1));
        let event = decoder.decode(&log).unwrap().unwrap();

        assert_eq!(event.name, "DomainCreated");
        assert_eq!(event.data["id"], "7");
        assert_eq!(event.data["owner"], owner.to_string());
        assert_eq!(event.data["name"], "first-domain");
        assert_eq!(event.data["dom_type"], 1);
    }

    #[test]
    fn test_wrapped_event_recurses_to_direct_path() {
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);
        let owner = Pubkey::new_unique();

        let mut wrapped = CPI_EVENT_TAG.to_vec();
        wrapped.extend_from_slice(&domain_created_bytes(9, &owner, "wrapped", 2));
        let log = bs58::encode(wrapped).into_string();

        let event = decoder.decode(&log).unwrap().unwrap();
        assert_eq!(event.name, "DomainCreated");
        assert_eq!(event.data["id"], "9");
    }

    #[test]
    fn test_malformed_base64_is_no_event() {
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);

        // length not a multiple of 4, and invalid characters
        assert_eq!(decoder.decode("abc").unwrap(), None);
        assert_eq!(decoder.decode("!!not-base64!!").unwrap(), None);
    }

    #[test]
    fn test_short_payload_is_no_event() {
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);
        let log = STANDARD.encode([1u8, 2, 3]);
        assert_eq!(decoder.decode(&log).unwrap(), None);
    }

    #[test]
    fn test_unknown_discriminator_is_no_event() {
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);
        let log = STANDARD.encode([0xffu8; 16]);
        assert_eq!(decoder.decode(&log).unwrap(), None);
    }

    #[test]
    fn test_wrapper_tag_is_not_an_event_discriminator() {
        // The self-CPI tag lives in a separate namespace from event
        // discriminators; a base-64 payload leading with it must miss the
        // registry, not decode.
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);

        let mut bytes = CPI_EVENT_TAG.to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(decoder.decode(&STANDARD.encode(bytes)).unwrap(), None);
    }

    #[test]
    fn test_missing_layout_is_fatal() {
        let registry = EventRegistry::from_idl_str(
            r#"{
                "address": "Test111111111111111111111111111111",
                "events": [ { "name": "Orphan" } ]
            }"#,
        )
        .unwrap();
        let decoder = EventDecoder::new(&registry);

        let log = STANDARD.encode(compute_discriminator("Orphan"));
        let err = decoder.decode(&log).unwrap_err();
        assert!(matches!(err, CpiscanError::Registry(_)));
    }

    #[test]
    fn test_truncated_known_event_is_decode_error() {
        let registry = domain_registry();
        let decoder = EventDecoder::new(&registry);

        let mut bytes = compute_discriminator("DomainCreated").to_vec();
        bytes.extend_from_slice(&7u64.to_le_bytes());
        // owner, name and dom_type missing
        let err = decoder.decode(&STANDARD.encode(bytes)).unwrap_err();
        assert!(matches!(err, CpiscanError::EventDecode(_)));
    }
}
