use remote_actions::tabular::{coerce_count, parse, parse_tsv};
use remote_actions::ErrorKind;

#[test]
fn test_short_row_gets_nulls() {
    let table = parse_tsv("a\tb\tc\n1\t2").unwrap();
    assert_eq!(table.rows.len(), 1);
    let row = &table.rows[0];
    assert_eq!(row.get("a"), Some("1"));
    assert_eq!(row.get("b"), Some("2"));
    assert!(row.contains("c"));
    assert_eq!(row.get("c"), None);

    let json = serde_json::to_value(row).unwrap();
    assert_eq!(json, serde_json::json!({"a": "1", "b": "2", "c": null}));
}

#[test]
fn test_single_empty_header_is_no_results() {
    let table = parse_tsv("\n").unwrap();
    assert!(table.columns.is_empty());
    assert!(table.rows.is_empty());
}

#[test]
fn test_one_row_of_empty_values_is_not_no_results() {
    let table = parse_tsv("a\tb\n\t\n").unwrap();
    assert_eq!(table.columns.len(), 2);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].get("a"), Some(""));
}

#[test]
fn test_psql_unaligned_output() {
    let stdout = "datname\tsize\r\npostgres\t7901\r\nshop\t12045\r\n";
    let table = parse_tsv(stdout).unwrap();
    assert_eq!(table.column("datname"), vec![Some("postgres"), Some("shop")]);
    let total: u64 = table.column("size").into_iter().map(coerce_count).sum();
    assert_eq!(total, 19946);
}

#[test]
fn test_custom_delimiters() {
    let table = parse("id,name;1,shop;2,blog", ',', ';').unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1].get("name"), Some("blog"));
}

#[test]
fn test_extra_fields_are_parse_error() {
    let err = parse_tsv("a\tb\n1\t2\t3\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn test_coercion_fails_softly() {
    let table = parse_tsv("n\nNULL\n12\n\n").unwrap();
    let counts: Vec<u64> = table.column("n").into_iter().map(coerce_count).collect();
    assert_eq!(counts, vec![0, 12]);
}
