use base64::Engine;
use serde_json::{Map, Value};

use sink_api::{BulkItem, LogicalType, Record, Schema, SchemaType};

use crate::batch::WriteOperation;
use crate::error::WriterError;
use crate::topic::{TopicConfig, TopicConfigResolver};

/// Converts inbound records into document writes.
#[derive(Debug, Clone)]
pub struct RecordTranslator {
    resolver: TopicConfigResolver,
    type_name: String,
    drop_invalid: bool,
}

impl RecordTranslator {
    pub fn new(resolver: TopicConfigResolver, type_name: impl Into<String>, drop_invalid: bool) -> Self {
        Self {
            resolver,
            type_name: type_name.into(),
            drop_invalid,
        }
    }

    pub fn resolver(&self) -> &TopicConfigResolver {
        &self.resolver
    }

    pub fn drops_invalid(&self) -> bool {
        self.drop_invalid
    }

    /// Translate and apply the drop-invalid policy.
    ///
    /// `Ok(None)` means the record was invalid and has been discarded.
    pub fn apply(&self, record: Record) -> Result<Option<WriteOperation>, WriterError> {
        let topic = self.resolver.resolve(&record.topic);
        match self.translate(&record, &topic) {
            Ok(item) => Ok(Some(WriteOperation::new(item, record))),
            Err(e @ WriterError::InvalidRecord { .. }) if self.drop_invalid => {
                tracing::warn!(error = %e, "dropping invalid record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn translate(&self, record: &Record, topic: &TopicConfig) -> Result<BulkItem, WriterError> {
        let invalid = |reason: String| WriterError::InvalidRecord {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            reason,
        };

        let id = if topic.key_ignore {
            None
        } else {
            Some(document_id(record.key.as_ref(), record.key_schema.as_ref()).map_err(invalid)?)
        };

        if record.value.is_null() {
            return Err(invalid("tombstone records are not supported".into()));
        }

        let document = if topic.schema_ignore {
            serde_json::to_string(&record.value)
        } else {
            let schema = record
                .value_schema
                .as_ref()
                .ok_or_else(|| invalid("value schema is required unless schemas are ignored".into()))?;
            let converted = convert_value(&record.value, schema, "value").map_err(invalid)?;
            serde_json::to_string(&converted)
        }
        .map_err(|e| invalid(e.to_string()))?;

        Ok(BulkItem {
            index: topic.index.clone(),
            type_name: self.type_name.clone(),
            id,
            document,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Key → document id
// ═══════════════════════════════════════════════════════════════

fn document_id(key: Option<&Value>, schema: Option<&Schema>) -> Result<String, String> {
    let key = match key {
        None | Some(Value::Null) => {
            return Err("key is used as document id and can not be null".into());
        }
        Some(key) => key,
    };

    if let Some(schema) = schema {
        return match schema.ty {
            ty if ty.is_integer() => check_integer(key, ty, "key").map(|n| n.to_string()),
            SchemaType::String => key
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| "key: expected string".to_string()),
            ty => Err(format!("unsupported key schema type {ty}")),
        };
    }

    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        other => Err(format!("unsupported key {other}: expected string or integer")),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Value → document
// ═══════════════════════════════════════════════════════════════

fn convert_value(value: &Value, schema: &Schema, path: &str) -> Result<Value, String> {
    if value.is_null() {
        return if schema.optional {
            Ok(Value::Null)
        } else {
            Err(format!("{path}: null for non-optional {}", schema.ty))
        };
    }

    if let Some(logical) = schema.logical {
        return convert_logical(value, logical, path);
    }

    match schema.ty {
        ty if ty.is_integer() => check_integer(value, ty, path).map(Value::from),
        SchemaType::Float32 | SchemaType::Float64 => {
            if value.is_number() {
                Ok(value.clone())
            } else {
                Err(format!("{path}: expected {}", schema.ty))
            }
        }
        SchemaType::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| format!("{path}: expected boolean")),
        SchemaType::String => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| format!("{path}: expected string")),
        SchemaType::Bytes => {
            let encoded = value
                .as_str()
                .ok_or_else(|| format!("{path}: expected base64 string"))?;
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| format!("{path}: invalid base64: {e}"))?;
            Ok(Value::String(encoded.to_string()))
        }
        SchemaType::Array => {
            let items = schema.item_schema().map_err(|e| format!("{path}: {e}"))?;
            let array = value.as_array().ok_or_else(|| format!("{path}: expected array"))?;
            array
                .iter()
                .enumerate()
                .map(|(i, v)| convert_value(v, items, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        SchemaType::Map => convert_map(value, schema, path),
        SchemaType::Struct => convert_struct(value, schema, path),
        ty => Err(format!("{path}: unsupported schema type {ty}")),
    }
}

fn convert_logical(value: &Value, logical: LogicalType, path: &str) -> Result<Value, String> {
    match logical {
        LogicalType::Decimal { .. } => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("{path}: expected decimal"))
        }
        LogicalType::Date | LogicalType::Time | LogicalType::Timestamp => value
            .as_i64()
            .map(Value::from)
            .ok_or_else(|| format!("{path}: expected integer {logical:?}")),
    }
}

fn convert_map(value: &Value, schema: &Schema, path: &str) -> Result<Value, String> {
    let keys = schema.key_schema().map_err(|e| format!("{path}: {e}"))?;
    let values = schema.value_schema().map_err(|e| format!("{path}: {e}"))?;

    if keys.ty == SchemaType::String {
        let object = value.as_object().ok_or_else(|| format!("{path}: expected object"))?;
        let mut out = Map::with_capacity(object.len());
        for (k, v) in object {
            out.insert(k.clone(), convert_value(v, values, &format!("{path}.{k}"))?);
        }
        return Ok(Value::Object(out));
    }

    // Non-string keys cannot be object keys in the document; emit entries.
    let entries: Vec<(Value, &Value)> = match value {
        Value::Object(object) => object
            .iter()
            .map(|(k, v)| parse_map_key(k, keys, path).map(|k| (k, v)))
            .collect::<Result<_, _>>()?,
        Value::Array(pairs) => pairs
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([k, v]) => Ok((k.clone(), v)),
                _ => Err(format!("{path}: map entries must be [key, value] pairs")),
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(format!("{path}: expected map")),
    };

    let mut out = Vec::with_capacity(entries.len());
    for (i, (k, v)) in entries.into_iter().enumerate() {
        let mut entry = Map::with_capacity(2);
        entry.insert("key".into(), convert_value(&k, keys, &format!("{path}#{i}.key"))?);
        entry.insert("value".into(), convert_value(v, values, &format!("{path}#{i}.value"))?);
        out.push(Value::Object(entry));
    }
    Ok(Value::Array(out))
}

fn parse_map_key(raw: &str, keys: &Schema, path: &str) -> Result<Value, String> {
    let parsed = match keys.ty {
        ty if ty.is_integer() => raw.parse::<i64>().ok().map(Value::from),
        SchemaType::Float32 | SchemaType::Float64 => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        SchemaType::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    parsed.ok_or_else(|| format!("{path}: map key '{raw}' is not a valid {}", keys.ty))
}

fn convert_struct(value: &Value, schema: &Schema, path: &str) -> Result<Value, String> {
    let object = value.as_object().ok_or_else(|| format!("{path}: expected struct"))?;

    if let Some(unknown) = object.keys().find(|k| !schema.fields.iter().any(|f| &f.name == *k)) {
        return Err(format!("{path}: unknown field '{unknown}'"));
    }

    let mut out = Map::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let field_path = format!("{path}.{}", field.name);
        let v = object.get(&field.name).unwrap_or(&Value::Null);
        out.insert(field.name.clone(), convert_value(v, &field.schema, &field_path)?);
    }
    Ok(Value::Object(out))
}

fn check_integer(value: &Value, ty: SchemaType, path: &str) -> Result<i64, String> {
    let n = value
        .as_i64()
        .ok_or_else(|| format!("{path}: expected {ty}"))?;
    match ty.integer_range() {
        Some((min, max)) if n < min || n > max => Err(format!("{path}: {n} out of range for {ty}")),
        _ => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sink_api::{Field, Record};

    use super::*;
    use crate::config::WriterConfig;

    fn translator(f: impl FnOnce(&mut WriterConfig)) -> RecordTranslator {
        let mut cfg = WriterConfig::new("doc");
        f(&mut cfg);
        let resolver = TopicConfigResolver::from_config(&cfg).unwrap();
        RecordTranslator::new(resolver, cfg.type_name.clone(), cfg.drop_invalid_message)
    }

    fn user_schema() -> Schema {
        Schema::structure(vec![
            Field::new("id", Schema::int32()),
            Field::new("name", Schema::string()),
            Field::new("nick", Schema::string().optional()),
        ])
    }

    #[test]
    fn key_becomes_document_id() {
        let t = translator(|_| {});
        let record = Record::new("users", 0, 5, Some(json!(42)), json!({"id": 1, "name": "a"}))
            .with_key_schema(Schema::int64())
            .with_value_schema(user_schema());
        let item = t.apply(record).unwrap().unwrap().item;
        assert_eq!(item.id.as_deref(), Some("42"));
        assert_eq!(item.index, "users");
        assert_eq!(item.type_name, "doc");
        assert_eq!(item.document, r#"{"id":1,"name":"a","nick":null}"#);
    }

    #[test]
    fn schemaless_string_key() {
        let t = translator(|c| c.schema_ignore = true);
        let record = Record::new("t", 0, 0, Some(json!("abc")), json!({"free": [1, "x"]}));
        let item = t.apply(record).unwrap().unwrap().item;
        assert_eq!(item.id.as_deref(), Some("abc"));
        assert_eq!(item.document, r#"{"free":[1,"x"]}"#);
    }

    #[test]
    fn ignored_key_leaves_id_to_engine() {
        let t = translator(|c| {
            c.topic_key_ignore = vec!["logs".into()];
            c.schema_ignore = true;
        });
        let item = t.apply(Record::new("logs", 0, 0, None, json!({"m": 1}))).unwrap().unwrap().item;
        assert_eq!(item.id, None);
    }

    #[test]
    fn null_and_unsupported_keys_are_invalid() {
        let t = translator(|c| c.schema_ignore = true);
        for key in [None, Some(json!(1.5)), Some(json!({"a": 1})), Some(json!(true))] {
            let err = t.apply(Record::new("t", 1, 9, key.clone(), json!({}))).unwrap_err();
            assert!(matches!(err, WriterError::InvalidRecord { offset: 9, .. }), "{key:?}");
        }
        let err = t
            .apply(Record::new("t", 0, 0, Some(json!(1)), json!({})).with_key_schema(Schema::float64()))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported key schema type float64"));
    }

    #[test]
    fn schema_mismatches_are_invalid() {
        let t = translator(|_| {});
        let cases = [
            json!({"id": "x", "name": "a"}),
            json!({"id": 1}),
            json!({"id": 1, "name": "a", "extra": true}),
            json!({"id": 3_000_000_000i64, "name": "a"}),
            json!([1, 2]),
        ];
        for value in cases {
            let record = Record::new("users", 0, 0, Some(json!(1)), value.clone())
                .with_value_schema(user_schema());
            assert!(
                matches!(t.apply(record), Err(WriterError::InvalidRecord { .. })),
                "{value}"
            );
        }
    }

    #[test]
    fn missing_value_schema_and_tombstones_are_invalid() {
        let t = translator(|_| {});
        let no_schema = Record::new("t", 0, 0, Some(json!(1)), json!({"a": 1}));
        assert!(t.apply(no_schema).is_err());
        let tombstone = Record::new("t", 0, 0, Some(json!(1)), Value::Null)
            .with_value_schema(user_schema().optional());
        assert!(t.apply(tombstone).is_err());
    }

    #[test]
    fn drop_policy_skips_invalid_records() {
        let t = translator(|c| c.drop_invalid_message = true);
        let record = Record::new("t", 0, 0, None, json!({"a": 1}));
        assert!(t.apply(record).unwrap().is_none());
    }

    #[test]
    fn maps_logical_types_and_bytes() {
        let t = translator(|_| {});
        let schema = Schema::structure(vec![
            Field::new("tags", Schema::map(Schema::string(), Schema::int16())),
            Field::new("scores", Schema::map(Schema::int32(), Schema::float64())),
            Field::new("price", Schema::bytes().with_logical(LogicalType::Decimal { scale: 2 })),
            Field::new("at", Schema::int64().with_logical(LogicalType::Timestamp)),
            Field::new("blob", Schema::bytes()),
            Field::new("list", Schema::array(Schema::boolean())),
        ]);
        let value = json!({
            "tags": {"a": 1, "b": 2},
            "scores": {"7": 0.5},
            "price": "12.25",
            "at": 1_700_000_000_000i64,
            "blob": "aGVsbG8=",
            "list": [true, false]
        });
        let record = Record::new("t", 0, 0, Some(json!("k")), value).with_value_schema(schema);
        let item = t.apply(record).unwrap().unwrap().item;
        let doc: Value = serde_json::from_str(&item.document).unwrap();
        assert_eq!(doc["tags"], json!({"a": 1, "b": 2}));
        assert_eq!(doc["scores"], json!([{"key": 7, "value": 0.5}]));
        assert_eq!(doc["price"], json!(12.25));
        assert_eq!(doc["at"], json!(1_700_000_000_000i64));
        assert_eq!(doc["blob"], json!("aGVsbG8="));
        assert_eq!(doc["list"], json!([true, false]));
    }

    #[test]
    fn map_pairs_and_bad_keys() {
        let schema = Schema::map(Schema::int8(), Schema::string());
        assert_eq!(
            convert_value(&json!([[1, "a"], [2, "b"]]), &schema, "v").unwrap(),
            json!([{"key": 1, "value": "a"}, {"key": 2, "value": "b"}])
        );
        assert!(convert_value(&json!({"x": "a"}), &schema, "v").is_err());
        assert!(convert_value(&json!({"300": "a"}), &schema, "v").is_err());
        assert!(convert_value(&json!("eA=="), &Schema::bytes(), "v").is_ok());
        assert!(convert_value(&json!("not base64!"), &Schema::bytes(), "v").is_err());
    }
}
