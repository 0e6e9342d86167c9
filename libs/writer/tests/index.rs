mod common;

use std::sync::Arc;

use bulk_writer::WriterError;
use common::*;
use serde_json::json;
use sink_api::{Field, Record, Schema, SchemaType, TransportError};

#[tokio::test(start_paused = true)]
async fn concurrent_open_creates_index_once() {
    let transport = FakeTransport::with_latency(ms(20));
    let writer = Arc::new(start(config(), &transport));

    let partitions = vec![tp("orders", 0), tp("orders", 1)];
    let (a, b) = tokio::join!(writer.open_partitions(&partitions), writer.open_partitions(&partitions));
    a.unwrap();
    b.unwrap();

    assert_eq!(transport.created(), vec!["orders"]);
    assert_eq!(transport.create_calls(), 1);

    writer.open_partitions(&partitions).await.unwrap();
    assert_eq!(transport.create_calls(), 1);

    writer.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn existing_index_counts_as_success_and_topic_map_applies() {
    let transport = FakeTransport::new();
    transport.add_existing_index("orders-v2");
    let mut cfg = config();
    cfg.topic_index_map = vec!["orders:orders-v2".into()];
    let writer = start(cfg, &transport);

    writer.open_partitions(&[tp("orders", 0), tp("users", 0)]).await.unwrap();
    assert_eq!(transport.created(), vec!["users"]);
    assert_eq!(transport.create_calls(), 2);

    writer.write(vec![record("orders", 0, 1)]).await.unwrap();
    writer.flush_default().await.unwrap();
    assert_eq!(transport.submissions()[0].items[0].index, "orders-v2");

    writer.stop().await.unwrap();
}

fn typed_record(topic: &str, offset: i64) -> Record {
    let schema = Schema::structure(vec![
        Field::new("qty", Schema::int32()),
        Field::new("sku", Schema::string()),
    ]);
    Record::new(topic, 0, offset, Some(json!(offset)), json!({ "qty": 2, "sku": "A-1" }))
        .with_key_schema(Schema::int64())
        .with_value_schema(schema)
}

#[tokio::test(start_paused = true)]
async fn mapping_is_installed_once_per_index() {
    let transport = FakeTransport::new();
    let mut cfg = config();
    cfg.schema_ignore = false;
    let writer = start(cfg, &transport);

    writer.write(vec![typed_record("orders", 0), typed_record("orders", 1)]).await.unwrap();
    writer.flush_default().await.unwrap();

    let mappings = transport.mappings();
    assert_eq!(mappings.len(), 1);
    let (index, type_name, body) = &mappings[0];
    assert_eq!(index, "orders");
    assert_eq!(type_name, "doc");
    assert_eq!(
        body,
        &json!({ "properties": { "qty": { "type": "integer" }, "sku": { "type": "text" } } })
    );
    assert_eq!(writer.stats().acknowledged, 2);

    writer.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn topics_ignoring_schemas_get_no_mapping() {
    let transport = FakeTransport::new();
    let mut cfg = config();
    cfg.schema_ignore = false;
    cfg.topic_schema_ignore = vec!["raw".into()];
    let writer = start(cfg, &transport);

    writer.write(vec![typed_record("raw", 0)]).await.unwrap();
    writer.flush_default().await.unwrap();
    assert!(transport.mappings().is_empty());

    writer.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn mapping_failure_is_fatal() {
    let transport = FakeTransport::new();
    transport.fail_mappings(TransportError::request("400 mapper_parsing_exception"));
    let mut cfg = config();
    cfg.schema_ignore = false;
    let writer = start(cfg, &transport);

    let err = writer.write(vec![typed_record("orders", 0)]).await.unwrap_err();
    assert!(matches!(err, WriterError::Fatal(ref cause) if matches!(**cause, WriterError::Transport(_))));
    assert!(writer.flush_default().await.unwrap_err().is_fatal());
    assert!(transport.submissions().is_empty());

    writer.stop().await.unwrap();
}

fn unmappable_record(topic: &str, offset: i64) -> Record {
    // An array field without an items schema: null passes translation, mapping cannot be derived.
    let schema = Schema::structure(vec![
        Field::new("id", Schema::int32()),
        Field::new("xs", Schema::of(SchemaType::Array).optional()),
    ]);
    Record::new(topic, 0, offset, Some(json!(offset)), json!({ "id": 1, "xs": null }))
        .with_key_schema(Schema::int64())
        .with_value_schema(schema)
}

#[tokio::test(start_paused = true)]
async fn unmappable_schema_is_dropped_under_policy() {
    let transport = FakeTransport::new();
    let mut cfg = config();
    cfg.schema_ignore = false;
    cfg.drop_invalid_message = true;
    let writer = start(cfg, &transport);

    writer.write(vec![unmappable_record("orders", 0)]).await.unwrap();
    writer.flush_default().await.unwrap();
    assert_eq!(writer.stats().skipped_invalid, 1);
    assert!(transport.mappings().is_empty());
    assert!(transport.submissions().is_empty());

    writer.write(vec![typed_record("orders", 1)]).await.unwrap();
    writer.flush_default().await.unwrap();
    assert_eq!(transport.mappings().len(), 1);
    assert_eq!(writer.stats().acknowledged, 1);

    writer.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unmappable_schema_is_fatal_without_policy() {
    let transport = FakeTransport::new();
    let mut cfg = config();
    cfg.schema_ignore = false;
    let writer = start(cfg, &transport);

    let err = writer.write(vec![unmappable_record("orders", 0)]).await.unwrap_err();
    assert!(matches!(err, WriterError::Fatal(ref cause) if matches!(**cause, WriterError::InvalidRecord { .. })));
    assert!(writer.flush_default().await.unwrap_err().is_fatal());
    assert_eq!(writer.stats().skipped_invalid, 0);

    writer.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn struct_schema_after_plain_schema_still_installs_mapping() {
    let transport = FakeTransport::new();
    let mut cfg = config();
    cfg.schema_ignore = false;
    let writer = start(cfg, &transport);

    let plain = Record::new("orders", 0, 0, Some(json!(0)), json!("plain"))
        .with_key_schema(Schema::int64())
        .with_value_schema(Schema::string());
    writer.write(vec![plain, typed_record("orders", 1), typed_record("orders", 2)]).await.unwrap();
    writer.flush_default().await.unwrap();

    let mappings = transport.mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].0, "orders");
    assert_eq!(writer.stats().acknowledged, 3);

    writer.stop().await.unwrap();
}
