//! Unit tests for the INSERT tokenizer, value normalizer and record parsers

use std::path::Path;

use pretty_assertions::assert_eq;
use sql_object_model::model::{ClassType, DataType};
use sql_object_model::parser::{
    extract_inserts_from_sql, normalize_source, normalize_value, parse_link, parse_sql, split_row,
};

// ============================================================================
// Tokenizer Tests
// ============================================================================

#[test]
fn test_nested_subselect_is_one_value() {
    let inserts = extract_inserts_from_sql("INSERT INTO t (a) VALUES ((SELECT id FROM other))");
    assert_eq!(inserts.len(), 1);
    assert_eq!(inserts[0].columns, vec!["a"]);
    assert_eq!(inserts[0].value_rows.len(), 1);
    assert_eq!(inserts[0].value_rows[0].values, vec!["(SELECT id FROM other)"]);
}

#[test]
fn test_quoted_comma_and_parens_do_not_split() {
    let inserts = extract_inserts_from_sql("INSERT INTO t (a,b) VALUES ('x, (y)', 2)");
    assert_eq!(inserts[0].value_rows[0].values, vec!["x, (y)", "2"]);
}

#[test]
fn test_escaped_and_doubled_quotes() {
    let sql = r"INSERT INTO t (a, b) VALUES ('it''s, here', 'say \'hi\', ok')";
    let inserts = extract_inserts_from_sql(sql);
    assert_eq!(inserts[0].value_rows[0].values, vec!["it's, here", "say 'hi', ok"]);
}

#[test]
fn test_multiple_rows_and_statements() {
    let sql = "INSERT INTO t (a) VALUES (1), (2), (3);\n\
               insert into u (b, c) values ('x', 'y');";
    let inserts = extract_inserts_from_sql(sql);
    assert_eq!(inserts.len(), 2);
    assert_eq!(inserts[0].value_rows.len(), 3);
    assert_eq!(inserts[1].table_name, "u");
    assert_eq!(inserts[1].columns, vec!["b", "c"]);
}

#[test]
fn test_unbalanced_group_keeps_closed_rows() {
    let inserts = extract_inserts_from_sql("INSERT INTO t (a) VALUES (1), (2), (3");
    assert_eq!(inserts.len(), 1);
    let values: Vec<&str> = inserts[0]
        .value_rows
        .iter()
        .map(|r| r.values[0].as_str())
        .collect();
    assert_eq!(values, vec!["1", "2"]);
}

#[test]
fn test_comments_are_stripped_outside_strings() {
    let sql = "-- seed data\n/* classes\n   block */\nINSERT INTO t (a, b) VALUES ('--not a comment', '/* nor this */'); -- trailing";
    let inserts = extract_inserts_from_sql(sql);
    assert_eq!(
        inserts[0].value_rows[0].values,
        vec!["--not a comment", "/* nor this */"]
    );
}

#[test]
fn test_uuid_positions_point_into_original_source() {
    let uuid = "11111111-1111-1111-1111-111111111111";
    let sql = format!(
        "-- comment :my_utc_now\nINSERT INTO t (a, b, c) VALUES (:my_utc_now, gen_random_uuid(), '{}');",
        uuid
    );
    let inserts = extract_inserts_from_sql(&sql);
    let expected = sql.find(&format!("'{}'", uuid)).unwrap();
    assert_eq!(inserts[0].uuid_positions, vec![expected]);
    assert_eq!(inserts[0].value_rows[0].offset, expected);
}

#[test]
fn test_split_row_top_level_only() {
    assert_eq!(split_row("1, f(a, b), 'c,d'"), vec!["1", " f(a, b)", " 'c,d'"]);
}

// ============================================================================
// Normalizer Tests
// ============================================================================

#[test]
fn test_placeholder_substitution_order() {
    let normalized = normalize_source(
        "VALUES (:my_utc_now, :my_admin_id, gen_random_uuid(), :other_param, '12:30')",
    );
    assert_eq!(
        normalized.text,
        "VALUES (NULL::timestamp, NULL::uuid, NULL::uuid, NULL, '12:30')"
    );
}

#[test]
fn test_casts_are_not_placeholders() {
    let normalized = normalize_source("VALUES ('2024-01-01'::date, 1::int)");
    assert_eq!(normalized.text, "VALUES ('2024-01-01'::date, 1::int)");
}

#[test]
fn test_normalize_value_round_trip() {
    for value in ["plain", "with, comma", "it's", "(parens)", "", "ünïcödé"] {
        let quoted = format!("'{}'", value.replace('\'', "''"));
        assert_eq!(normalize_value(&quoted), value);
    }
    assert_eq!(normalize_value("\"double\""), "double");
    assert_eq!(normalize_value("  42  "), "42");
}

// ============================================================================
// Record Parser Tests
// ============================================================================

#[test]
fn test_order_scenario() {
    let sql = "INSERT INTO classes (id, name, description, type) VALUES \
               ('11111111-1111-1111-1111-111111111111', 'Order', 'An order', 2);";
    let parsed = parse_sql(sql, Path::new("Orders/classes.sql"));

    assert_eq!(parsed.classes.len(), 1);
    let class = &parsed.classes[0];
    assert_eq!(class.id, "11111111-1111-1111-1111-111111111111");
    assert_eq!(class.name, "Order");
    assert_eq!(class.description, "An order");
    assert_eq!(class.class_type, ClassType::Processable);
    assert!(class.properties.is_empty());
    assert!(class.objects.is_empty());
    assert_eq!(class.location.line_number, 1);
}

#[test]
fn test_property_rows_with_placeholders() {
    let sql = "INSERT INTO property_definitions (id, name, data_type, source_class_id, created_at) VALUES\n\
               ('33333333-3333-3333-3333-333333333333', 'Status', 4, 'null', :my_utc_now),\n\
               ('44444444-4444-4444-4444-444444444444', 'Tags', 6, '11111111-1111-1111-1111-111111111111', :my_utc_now);";
    let parsed = parse_sql(sql, Path::new("props.sql"));

    assert_eq!(parsed.properties.len(), 2);
    assert_eq!(parsed.properties[0].data_type, DataType::Reference);
    assert_eq!(parsed.properties[0].source_class_id, None);
    assert_eq!(parsed.properties[1].data_type, DataType::StringArray);
    assert_eq!(
        parsed.properties[1].source_class_id.as_deref(),
        Some("11111111-1111-1111-1111-111111111111")
    );
    assert_eq!(parsed.properties[1].location.line_number, 3);
}

#[test]
fn test_invalid_rows_do_not_abort_file() {
    let sql = "INSERT INTO objects (id, name, class_id) VALUES ('o1', 'No class', NULL), ('o2', 'Ok', 'c1');\n\
               INSERT INTO classes (id, name) VALUES ('', 'Nameless id');";
    let parsed = parse_sql(sql, Path::new("mixed.sql"));
    assert_eq!(parsed.objects.len(), 1);
    assert_eq!(parsed.objects[0].id, "o2");
    assert!(parsed.classes.is_empty());
}

#[test]
fn test_link_rows_require_literal_uuids() {
    let sql = "INSERT INTO classes_property_definitions (class_id, property_definition_id) VALUES \
               ('11111111-1111-1111-1111-111111111111', '33333333-3333-3333-3333-333333333333'), \
               ((SELECT id FROM classes WHERE name = 'Order'), '33333333-3333-3333-3333-333333333333'), \
               (:class_param, '33333333-3333-3333-3333-333333333333');";
    let parsed = parse_sql(sql, Path::new("links.sql"));
    assert_eq!(parsed.links.len(), 1);
    assert_eq!(parsed.links[0].class_id, "11111111-1111-1111-1111-111111111111");
}

#[test]
fn test_parse_link_rejects_malformed_uuids() {
    let columns = vec!["class_id".to_string(), "property_definition_id".to_string()];
    let valid = "33333333-3333-3333-3333-333333333333".to_string();
    for bad in ["not-a-uuid", "11111111-1111-1111-1111-11111111111", "1111111g-1111-1111-1111-111111111111"] {
        assert!(parse_link(&columns, &[bad.to_string(), valid.clone()]).is_none());
    }
}
