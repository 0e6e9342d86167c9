use serde_json::{Map, Value, json};
use sink_api::{LogicalType, Schema, SchemaError, SchemaType};

/// Index mapping for documents of `schema`.
///
/// Only struct schemas produce a root mapping; any other root type yields
/// `None` and the engine's dynamic mapping applies.
pub fn infer_mapping(schema: &Schema) -> Result<Option<Value>, SchemaError> {
    if schema.ty != SchemaType::Struct || schema.logical.is_some() {
        return Ok(None);
    }
    Ok(Some(json!({ "properties": struct_properties(schema)? })))
}

/// Mapping of one field.
pub fn field_mapping(schema: &Schema) -> Result<Value, SchemaError> {
    if let Some(logical) = &schema.logical {
        let ty = match logical {
            LogicalType::Decimal { .. } => "double",
            LogicalType::Date | LogicalType::Timestamp => "date",
            LogicalType::Time => "long",
        };
        return Ok(json!({ "type": ty }));
    }

    let primitive = match schema.ty {
        SchemaType::Int8 => "byte",
        SchemaType::Int16 => "short",
        SchemaType::Int32 => "integer",
        SchemaType::Int64 => "long",
        SchemaType::Float32 => "float",
        SchemaType::Float64 => "double",
        SchemaType::Boolean => "boolean",
        SchemaType::String => "text",
        SchemaType::Bytes => "binary",
        SchemaType::Array => return field_mapping(schema.item_schema()?),
        SchemaType::Map => {
            let keys = schema.key_schema()?;
            let values = schema.value_schema()?;
            if keys.ty == SchemaType::String {
                return Ok(json!({ "type": "object" }));
            }
            return Ok(json!({
                "type": "nested",
                "properties": {
                    "key": field_mapping(keys)?,
                    "value": field_mapping(values)?,
                }
            }));
        }
        SchemaType::Struct => {
            return Ok(json!({ "type": "object", "properties": struct_properties(schema)? }));
        }
    };
    Ok(json!({ "type": primitive }))
}

fn struct_properties(schema: &Schema) -> Result<Value, SchemaError> {
    let mut properties = Map::with_capacity(schema.fields.len());
    for field in &schema.fields {
        properties.insert(field.name.clone(), field_mapping(&field.schema)?);
    }
    Ok(Value::Object(properties))
}
