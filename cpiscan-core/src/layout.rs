use crate::error::{CpiscanError, Result};
use crate::types::IdlField;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

/// Ordered field list for one event, able to decode a borsh payload into a
/// JSON object keyed by field name.
///
/// Rendering rules: integers up to 32 bits become JSON numbers, wider ones
/// become strings (JSON numbers lose precision past 2^53); pubkeys render
/// base-58; `bytes` renders hex.
#[derive(Debug, Clone)]
pub struct EventLayout {
    fields: Vec<IdlField>,
}

impl EventLayout {
    pub fn new(fields: Vec<IdlField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[IdlField] {
        &self.fields
    }

    /// Decode `data` field by field. The payload must be consumed exactly:
    /// leftover bytes mean the layout and the data disagree.
    pub fn decode(&self, data: &[u8]) -> Result<Value> {
        let mut reader = ByteReader::new(data);
        let mut object = serde_json::Map::new();

        for field in &self.fields {
            let value = decode_field(&mut reader, &field.field_type)?;
            object.insert(field.name.clone(), value);
        }

        if reader.remaining() != 0 {
            return Err(CpiscanError::EventDecode(format!(
                "layout consumed {} bytes but payload is {} bytes",
                data.len() - reader.remaining(),
                data.len()
            )));
        }

        Ok(Value::Object(object))
    }
}

/// Forward-only cursor over the payload. Every read is bounds-checked so
/// truncation surfaces as a decode error, never a panic.
struct ByteReader<'a> {
    data: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(CpiscanError::EventDecode(format!(
                "payload truncated: needed {} bytes for {}, {} left",
                n,
                what,
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn fixed<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let bytes = self.take(N, what)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    /// Borsh u32 length prefix.
    fn length_prefix(&mut self, what: &str) -> Result<usize> {
        Ok(u32::from_le_bytes(self.fixed(what)?) as usize)
    }
}

fn decode_field(reader: &mut ByteReader, field_type: &Value) -> Result<Value> {
    if let Some(type_name) = field_type.as_str() {
        return decode_named_type(reader, type_name);
    }
    if let Some(obj) = field_type.as_object() {
        return decode_composite_type(reader, obj);
    }
    Err(CpiscanError::EventDecode(format!(
        "invalid field type descriptor: {}",
        field_type
    )))
}

fn decode_named_type(reader: &mut ByteReader, type_name: &str) -> Result<Value> {
    match type_name {
        "bool" => Ok(Value::Bool(reader.take(1, "bool")?[0] != 0)),

        "u8" => Ok(Value::Number(reader.take(1, "u8")?[0].into())),
        "u16" => Ok(u16::from_le_bytes(reader.fixed(type_name)?).into()),
        "u32" => Ok(u32::from_le_bytes(reader.fixed(type_name)?).into()),
        "u64" => Ok(Value::String(
            u64::from_le_bytes(reader.fixed(type_name)?).to_string(),
        )),
        "u128" => Ok(Value::String(
            u128::from_le_bytes(reader.fixed(type_name)?).to_string(),
        )),

        "i8" => Ok(i8::from_le_bytes(reader.fixed(type_name)?).into()),
        "i16" => Ok(i16::from_le_bytes(reader.fixed(type_name)?).into()),
        "i32" => Ok(i32::from_le_bytes(reader.fixed(type_name)?).into()),
        "i64" => Ok(Value::String(
            i64::from_le_bytes(reader.fixed(type_name)?).to_string(),
        )),
        "i128" => Ok(Value::String(
            i128::from_le_bytes(reader.fixed(type_name)?).to_string(),
        )),

        "string" => {
            let len = reader.length_prefix("string length")?;
            let bytes = reader.take(len, "string content")?;
            let s = String::from_utf8(bytes.to_vec())
                .map_err(|e| CpiscanError::EventDecode(format!("invalid UTF-8: {}", e)))?;
            Ok(Value::String(s))
        }

        "bytes" => {
            let len = reader.length_prefix("bytes length")?;
            let bytes = reader.take(len, "bytes content")?;
            Ok(Value::String(hex::encode(bytes)))
        }

        "pubkey" | "publicKey" | "Pubkey" => {
            let bytes: [u8; 32] = reader.fixed("pubkey")?;
            Ok(Value::String(Pubkey::new_from_array(bytes).to_string()))
        }

        t if t.starts_with("option<") && t.ends_with('>') => {
            let is_some = reader.take(1, "option flag")?[0] != 0;
            if is_some {
                decode_named_type(reader, &t[7..t.len() - 1])
            } else {
                Ok(Value::Null)
            }
        }

        t if t.starts_with("vec<") && t.ends_with('>') => {
            let inner = &t[4..t.len() - 1];
            let len = reader.length_prefix("vec length")?;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(decode_named_type(reader, inner)?);
            }
            Ok(Value::Array(items))
        }

        // "[u8; 32]" style fixed arrays
        t if t.starts_with('[') && t.ends_with(']') && t.contains(';') => {
            let (inner, count) = t[1..t.len() - 1].split_once(';').ok_or_else(|| {
                CpiscanError::EventDecode(format!("invalid array type: {}", t))
            })?;
            let count: usize = count.trim().parse().map_err(|_| {
                CpiscanError::EventDecode(format!("invalid array length in: {}", t))
            })?;
            decode_array(reader, &Value::String(inner.trim().to_string()), count)
        }

        _ => Err(CpiscanError::EventDecode(format!(
            "unsupported field type: {}",
            type_name
        ))),
    }
}

/// Composite descriptors as Anchor IDLs spell them:
/// {"option": T}, {"vec": T}, {"array": [T, N]}, {"defined": {...}}.
fn decode_composite_type(
    reader: &mut ByteReader,
    obj: &serde_json::Map<String, Value>,
) -> Result<Value> {
    if let Some(inner) = obj.get("option") {
        let is_some = reader.take(1, "option flag")?[0] != 0;
        return if is_some {
            decode_field(reader, inner)
        } else {
            Ok(Value::Null)
        };
    }

    if let Some(inner) = obj.get("vec") {
        let len = reader.length_prefix("vec length")?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(decode_field(reader, inner)?);
        }
        return Ok(Value::Array(items));
    }

    if let Some(array) = obj.get("array") {
        if let Some([inner, count]) = array.as_array().map(Vec::as_slice) {
            if let Some(count) = count.as_u64() {
                return decode_array(reader, inner, count as usize);
            }
        }
        return Err(CpiscanError::EventDecode(format!(
            "invalid array descriptor: {}",
            array
        )));
    }

    if let Some(defined) = obj.get("defined") {
        let name = defined
            .get("name")
            .and_then(|n| n.as_str())
            .or_else(|| defined.as_str())
            .unwrap_or("<unnamed>");
        return Err(CpiscanError::EventDecode(format!(
            "defined type '{}' is not supported",
            name
        )));
    }

    Err(CpiscanError::EventDecode(format!(
        "unsupported composite type: {:?}",
        obj
    )))
}

fn decode_array(reader: &mut ByteReader, inner: &Value, count: usize) -> Result<Value> {
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(decode_field(reader, inner)?);
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, ty: Value) -> IdlField {
        IdlField {
            name: name.to_string(),
            field_type: ty,
        }
    }

    #[test]
    fn test_decode_u64() {
        let layout = EventLayout::new(vec![field("amount", json!("u64"))]);
        let result = layout.decode(&42u64.to_le_bytes()).unwrap();
        assert_eq!(result["amount"], "42");
    }

    #[test]
    fn test_decode_negative_i32() {
        let layout = EventLayout::new(vec![field("delta", json!("i32"))]);
        let result = layout.decode(&(-7i32).to_le_bytes()).unwrap();
        assert_eq!(result["delta"], -7);
    }

    #[test]
    fn test_decode_pubkey() {
        let pubkey = Pubkey::new_unique();
        let layout = EventLayout::new(vec![field("owner", json!("pubkey"))]);
        let result = layout.decode(&pubkey.to_bytes()).unwrap();
        assert_eq!(result["owner"], pubkey.to_string());
    }

    #[test]
    fn test_decode_string() {
        let s = "first-domain";
        let mut data = (s.len() as u32).to_le_bytes().to_vec();
        data.extend_from_slice(s.as_bytes());

        let layout = EventLayout::new(vec![field("name", json!("string"))]);
        let result = layout.decode(&data).unwrap();
        assert_eq!(result["name"], s);
    }

    #[test]
    fn test_decode_multiple_fields_in_order() {
        let owner = Pubkey::new_unique();
        let mut data = 1000u64.to_le_bytes().to_vec();
        data.extend_from_slice(&owner.to_bytes());
        data.push(3);

        let layout = EventLayout::new(vec![
            field("amount", json!("u64")),
            field("owner", json!("pubkey")),
            field("kind", json!("u8")),
        ]);
        let result = layout.decode(&data).unwrap();
        assert_eq!(result["amount"], "1000");
        assert_eq!(result["owner"], owner.to_string());
        assert_eq!(result["kind"], 3);
    }

    #[test]
    fn test_decode_vec_string_form() {
        let mut data = 3u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[1, 2, 3]);

        let layout = EventLayout::new(vec![field("values", json!("vec<u8>"))]);
        let result = layout.decode(&data).unwrap();
        assert_eq!(result["values"], json!([1, 2, 3]));
    }

    #[test]
    fn test_decode_vec_object_form() {
        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&6u16.to_le_bytes());

        let layout = EventLayout::new(vec![field("values", json!({"vec": "u16"}))]);
        let result = layout.decode(&data).unwrap();
        assert_eq!(result["values"], json!([5, 6]));
    }

    #[test]
    fn test_decode_option_some_and_none() {
        let layout = EventLayout::new(vec![field("value", json!("option<u64>"))]);

        let mut data = vec![1u8];
        data.extend_from_slice(&42u64.to_le_bytes());
        assert_eq!(layout.decode(&data).unwrap()["value"], "42");

        assert!(layout.decode(&[0u8]).unwrap()["value"].is_null());
    }

    #[test]
    fn test_decode_fixed_array_object_form() {
        let layout = EventLayout::new(vec![field("memo", json!({"array": ["u8", 4]}))]);
        let result = layout.decode(&[1, 2, 3, 4]).unwrap();
        assert_eq!(result["memo"], json!([1, 2, 3, 4]));
    }

    #[test]
    fn test_decode_fixed_array_string_form() {
        let layout = EventLayout::new(vec![field("memo", json!("[u8; 4]"))]);
        let result = layout.decode(&[1, 2, 3, 4]).unwrap();
        assert_eq!(result["memo"], json!([1, 2, 3, 4]));
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let layout = EventLayout::new(vec![field("amount", json!("u64"))]);
        let err = layout.decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CpiscanError::EventDecode(_)));
    }

    #[test]
    fn test_trailing_bytes_are_error() {
        let layout = EventLayout::new(vec![field("flag", json!("bool"))]);
        let err = layout.decode(&[1, 99]).unwrap_err();
        assert!(matches!(err, CpiscanError::EventDecode(_)));
    }

    #[test]
    fn test_empty_layout_accepts_only_empty_payload() {
        let layout = EventLayout::new(vec![]);
        assert_eq!(layout.decode(&[]).unwrap(), json!({}));
        assert!(layout.decode(&[0]).is_err());
    }

    #[test]
    fn test_defined_type_is_explicit_error() {
        let layout = EventLayout::new(vec![field(
            "nested",
            json!({"defined": {"name": "OrderState"}}),
        )]);
        let err = layout.decode(&[0u8; 16]).unwrap_err();
        assert!(err.to_string().contains("OrderState"));
    }
}
