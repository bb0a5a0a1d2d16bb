use std::net::TcpListener;

use assert_cmd::Command;
use predicates::prelude::*;

fn client() -> Command {
    Command::cargo_bin("blp-client").unwrap()
}

// порт, на котором точно никто не слушает
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn help_lists_query_kinds() {
    client()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ref-hist")
                .and(predicate::str::contains("bulkref"))
                .and(predicate::str::contains("bdib"))
                .and(predicate::str::contains("beqs")),
        );
}

#[test]
fn subjects_source_is_required() {
    client()
        .args(["ref", "--fields", "PX_LAST"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tickers"));
}

#[test]
fn missing_tickers_file_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.txt");
    client()
        .args(["ref", "--fields", "PX_LAST", "--tickers-file"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tickers file not found"));
}

#[test]
fn bad_date_fails_validation() {
    client()
        .args([
            "bdh",
            "--tickers",
            "SPY US Equity",
            "--fields",
            "PX_LAST",
            "--start",
            "2015-06-29",
            "--end",
            "20150630",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYYmmdd"));
}

#[test]
fn unreachable_host_reports_connect_error() {
    let port = closed_port();
    client()
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["bsrch", "--domain", "COMDTY:NGFLOW"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to connect"));
}
