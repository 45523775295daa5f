//! Processor tests: caching, invalidation and alias notifications

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sql_object_model::model::ClassType;
use sql_object_model::{CacheState, LinkerSettings};

use crate::common::*;

fn seeded_source() -> MemorySource {
    let source = MemorySource::new();
    source.write("db/classes.sql", order_class_sql());
    source.write("db/properties.sql", properties_sql());
    source.write("db/links.sql", link_sql(ORDER_CLASS_ID, STATUS_PROPERTY_ID));
    source
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[tokio::test]
async fn test_order_class_scenario() {
    let source = MemorySource::new();
    source.write(
        "orders.sql",
        "INSERT INTO classes (id, name, description, type) VALUES ('11111111-1111-1111-1111-111111111111', 'Order', 'An order', 2);",
    );
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let model = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(model.classes.len(), 1);
    let class = &model.classes[0];
    assert_eq!(class.id, ORDER_CLASS_ID);
    assert_eq!(class.name, "Order");
    assert_eq!(class.class_type, ClassType::Processable);
    assert!(class.properties.is_empty());
    assert!(class.objects.is_empty());
}

#[tokio::test]
async fn test_links_across_files() {
    let ctx = TestProcessor::new(seeded_source(), LinkerSettings::default());
    let model = ctx.processor.parse_all_sql_files(false).await;

    assert_eq!(model.properties.len(), 2);
    let order = model.find_class(ORDER_CLASS_ID).unwrap();
    assert_eq!(order.properties.len(), 1);
    assert_eq!(order.properties[0].id, STATUS_PROPERTY_ID);
}

// ============================================================================
// Cache Tests
// ============================================================================

#[tokio::test]
async fn test_second_call_is_a_cache_hit() {
    let ctx = TestProcessor::new(seeded_source(), LinkerSettings::default());
    assert_eq!(ctx.processor.cache_state().await, CacheState::Empty);

    let first = ctx.processor.parse_all_sql_files(false).await;
    let reads_after_first = ctx.source.reads();
    assert_eq!(reads_after_first, 3);
    assert_eq!(ctx.processor.cache_state().await, CacheState::Populated);

    let second = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(*first, *second);
    assert!(Arc::ptr_eq(&first, &second));
    // Only the hash pass reads files
    assert_eq!(ctx.source.reads() - reads_after_first, 3);
}

#[tokio::test]
async fn test_changed_file_is_never_served_stale() {
    let ctx = TestProcessor::new(seeded_source(), LinkerSettings::default());
    let before = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(before.classes.len(), 1);

    ctx.source.write("db/invoice.sql", invoice_class_sql());
    let added = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(added.classes.len(), 2);

    ctx.source.write(
        "db/invoice.sql",
        invoice_class_sql().replace("'Invoice'", "'Bill'"),
    );
    let modified = ctx.processor.parse_all_sql_files(false).await;
    assert!(modified.classes.iter().any(|c| c.name == "Bill"));

    ctx.source.remove("db/invoice.sql");
    let removed = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(*removed, *before);
}

#[tokio::test]
async fn test_force_refresh_recomputes() {
    let ctx = TestProcessor::new(seeded_source(), LinkerSettings::default());
    let first = ctx.processor.parse_all_sql_files(false).await;
    let computed_at = ctx.processor.last_computed_at().await.unwrap();

    let refreshed = ctx.processor.parse_all_sql_files(true).await;
    assert_eq!(*first, *refreshed);
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert!(ctx.processor.last_computed_at().await.unwrap() >= computed_at);
}

#[tokio::test]
async fn test_invalidation_clears_state() {
    let ctx = TestProcessor::new(seeded_source(), LinkerSettings::default());
    let first = ctx.processor.parse_all_sql_files(false).await;

    ctx.processor.invalidate_cache().await;
    assert_eq!(ctx.processor.cache_state().await, CacheState::Empty);
    let second = ctx.processor.parse_all_sql_files(false).await;
    assert!(!Arc::ptr_eq(&first, &second));

    ctx.processor
        .invalidate_cache_for_file(Path::new("db/classes.sql"))
        .await;
    let third = ctx.processor.parse_all_sql_files(false).await;
    assert!(!Arc::ptr_eq(&second, &third));
    assert_eq!(*second, *third);

    ctx.processor.dispose().await;
    assert_eq!(ctx.processor.cache_state().await, CacheState::Empty);
}

#[tokio::test]
async fn test_unreadable_file_is_skipped() {
    let source = seeded_source();
    source.write("db/broken.sql", invoice_class_sql());
    source.fail_reads("db/broken.sql");
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let model = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(model.classes.len(), 1);
    assert_eq!(model.find_class(ORDER_CLASS_ID).unwrap().properties.len(), 1);
}

#[tokio::test]
async fn test_read_failure_keeps_cached_parse() {
    let source = seeded_source();
    source.write("db/invoice.sql", invoice_class_sql());
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let first = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(first.classes.len(), 2);
    assert_eq!(ctx.processor.last_reparsed_count().await, Some(4));

    ctx.source.fail_reads("db/invoice.sql");
    let degraded = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(degraded.classes.len(), 1);
    assert_eq!(ctx.processor.last_reparsed_count().await, Some(0));
    assert_eq!(ctx.processor.cached_file_count().await, 4);

    ctx.source.restore_reads("db/invoice.sql");
    let restored = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(*restored, *first);
    assert_eq!(ctx.processor.last_reparsed_count().await, Some(0));
}

#[tokio::test]
async fn test_removed_files_leave_the_file_cache() {
    let source = seeded_source();
    source.write("db/invoice.sql", invoice_class_sql());
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(ctx.processor.cached_file_count().await, 4);

    ctx.source.remove("db/invoice.sql");
    let model = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(model.classes.len(), 1);
    assert_eq!(ctx.processor.cached_file_count().await, 3);
}

#[tokio::test]
async fn test_binary_file_is_skipped() {
    let source = seeded_source();
    source.write_bytes("db/blob.sql", b"\x00\x9D\xFF");
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let model = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(model.classes.len(), 1);
    assert_eq!(ctx.processor.cached_file_count().await, 3);
}

#[tokio::test]
async fn test_first_file_wins_on_duplicate_ids() {
    let source = MemorySource::new();
    source.write("a.sql", order_class_sql());
    source.write("b.sql", order_class_sql().replace("'Order'", "'Duplicate'"));
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let model = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(model.classes.len(), 1);
    assert_eq!(model.classes[0].name, "Order");
}

#[tokio::test]
async fn test_windows_1252_file() {
    let source = MemorySource::new();
    source.write_bytes(
        "legacy.sql",
        b"INSERT INTO classes (id, name) VALUES ('11111111-1111-1111-1111-111111111111', 'Caf\xE9');",
    );
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let model = ctx.processor.parse_all_sql_files(false).await;
    assert_eq!(model.classes[0].name, "Café");
}

// ============================================================================
// Alias Tests
// ============================================================================

#[tokio::test]
async fn test_alias_change_invalidates_aggregate() {
    let source = seeded_source();
    source.write(
        "db/Заказы/objects.sql",
        object_sql(ORDER_OBJECT_ID, "Order 1", &random_id()),
    );
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let before = ctx.processor.parse_all_sql_files(false).await;
    assert!(before.find_class(ORDER_CLASS_ID).unwrap().objects.is_empty());

    ctx.aliases.set_alias(ORDER_CLASS_ID, "Заказы");
    assert_eq!(ctx.processor.cache_state().await, CacheState::Empty);

    let after = ctx.processor.parse_all_sql_files(false).await;
    let order = after.find_class(ORDER_CLASS_ID).unwrap();
    assert_eq!(order.objects.len(), 1);
    assert_eq!(order.objects[0].id, ORDER_OBJECT_ID);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_overlapping_calls_share_one_recompute() {
    let source = MemorySource::with_read_delay(Duration::from_millis(20));
    source.write("db/classes.sql", order_class_sql());
    source.write("db/properties.sql", properties_sql());
    let ctx = TestProcessor::new(source, LinkerSettings::default());

    let (first, second) = tokio::join!(
        ctx.processor.parse_all_sql_files(false),
        ctx.processor.parse_all_sql_files(false)
    );

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(ctx.source.discovers(), 2);
}
