mod common;

use common::*;
use remote_actions::extract::{extract, records, tag_query};
use remote_actions::prelude::*;
use remote_actions::ScriptedTransport;

#[test]
fn test_extract_ignores_surrounding_noise() {
    let marker = Marker::new("COUNT").unwrap();
    let query = tag_query(&marker, "SELECT COUNT(*) FROM users");
    assert!(query.contains("'RESULT_START_COUNT' AS marker"));

    let stdout = "Warning: Using a password on the command line\n\
                  marker\tCOUNT(*)\n\
                  RESULT_START_COUNT\t42\n\
                  mysql: [Warning] something else\n";
    assert_eq!(extract(stdout, marker.as_str()).as_deref(), Some("42"));
}

#[test]
fn test_absent_differs_from_empty() {
    assert_eq!(extract("banner\n", "RESULT_START_X"), None);
    assert_eq!(extract("RESULT_START_X\n", "RESULT_START_X").as_deref(), Some(""));
}

#[test]
fn test_multi_line_payload_joined() {
    let stdout = "RESULT_START_DBS shop\nnoise\nRESULT_START_DBS blog\n";
    assert_eq!(
        extract(stdout, "RESULT_START_DBS").as_deref(),
        Some("shop\nblog")
    );
}

#[test]
fn test_batch_recovers_each_query() {
    let mut batch = MarkerBatch::sql();
    batch
        .add(Marker::new("USERS").unwrap(), "SELECT COUNT(*) FROM mysql.user")
        .unwrap()
        .add(Marker::new("DBS").unwrap(), "SELECT COUNT(*) FROM information_schema.schemata")
        .unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.script().lines().count(), 2);

    let stdout = "marker\tCOUNT(*)\nRESULT_START_USERS\t5\nmarker\tCOUNT(*)\nRESULT_START_DBS\t7\n";
    let results = batch.extract_all(stdout);
    assert_eq!(
        results[&Marker::new("USERS").unwrap()].as_deref(),
        Some("5")
    );
    assert_eq!(results[&Marker::new("DBS").unwrap()].as_deref(), Some("7"));
}

#[test]
fn test_batch_rejects_overlapping_markers() {
    let mut batch = MarkerBatch::shell();
    batch.add(Marker::new("DB").unwrap(), "true").unwrap();
    let err = batch.add(Marker::new("DB_SIZE").unwrap(), "true").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_records_in_output_order() {
    let markers = vec![Marker::new("A").unwrap(), Marker::new("B").unwrap()];
    let found = records("RESULT_START_B x\nRESULT_START_A y\n", &markers);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].tag, "RESULT_START_B");
    assert_eq!(found[1].payload, "y");
}

#[test]
fn test_json_strategy_behind_same_interface() {
    let extractor = ResultExtractor::json("/0/name");
    let stdout = "Using config file\n[{\"name\":\"shop\"}]\n";
    assert_eq!(extractor.extract(stdout).unwrap().as_deref(), Some("shop"));
    assert!(extractor.extract("no json here").is_err());
}

#[test]
fn test_probe_false_is_not_absent() {
    tokio_test::block_on(async {
        let transport = ScriptedTransport::new();
        transport.push_ok("RESULT_START_EXISTS0\n");
        let probe = Probe::new("exists", "test -d /var/lib/mysql")
            .unwrap()
            .with_marker(Marker::new("EXISTS").unwrap());

        let installed = check_installed(&transport, &test_target(), &[probe.clone()])
            .await
            .unwrap();
        assert_eq!(installed.get("exists"), Some(&false));

        transport.push_ok("motd only\n");
        let err = check_installed(&transport, &test_target(), &[probe])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    });
}

#[test]
fn test_probe_script_is_one_call() {
    tokio_test::block_on(async {
        let probes = default_engine_probes().unwrap();
        let transport = ScriptedTransport::new();
        transport.push_ok(&format!("{}1\n{}1\n", probes[0].marker, probes[1].marker));

        check_installed(&transport, &test_target(), &probes)
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        for probe in &probes {
            assert!(calls[0]
                .spec
                .text
                .contains(&format!("echo '{}1'", probe.marker)));
        }
    });
}

#[test]
fn test_probe_names_may_share_a_prefix() {
    tokio_test::block_on(async {
        let probes = vec![
            Probe::command_exists("mysql", "mysql").unwrap(),
            Probe::service_active("mysql_server", "mysql").unwrap(),
        ];
        let transport = ScriptedTransport::new();
        transport.push_ok(&format!("{}1\n{}0\n", probes[0].marker, probes[1].marker));

        let installed = check_installed(&transport, &test_target(), &probes)
            .await
            .unwrap();
        assert_eq!(installed.get("mysql"), Some(&true));
        assert_eq!(installed.get("mysql_server"), Some(&false));
    });
}
