use assert_cmd::Command;
use predicates::str::contains;
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

#[test]
fn no_args_shows_usage_error() {
    let mut cmd = Command::cargo_bin("skewrun").unwrap();
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn help_mentions_the_transaction() {
    let mut cmd = Command::cargo_bin("skewrun").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("Time authority host"))
        .stdout(contains("--dry-run"));
}

#[test]
fn unresolvable_authority_exits_with_dns_code() {
    let mut cmd = Command::cargo_bin("skewrun").unwrap();
    cmd.args(["--dry-run", "--no-color", "no.such.domain.example", "true"])
        .assert()
        .failure()
        .code(2)
        .stdout(contains("query failed"));
}

#[test]
fn json_output_carries_the_schema_version() {
    let mut cmd = Command::cargo_bin("skewrun").unwrap();
    cmd.args(["--dry-run", "-j", "no.such.domain.example", "true"])
        .assert()
        .failure()
        .stdout(contains("\"schema_version\":1"));
}

#[test]
fn dry_run_against_mock_authority_succeeds() {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let addr = sock.local_addr().unwrap();
    let server = thread::spawn(move || {
        let mut buf = [0u8; 64];
        let (n, peer) = sock.recv_from(&mut buf).unwrap();
        assert!(n >= 48);
        let mut reply = [0u8; 48];
        reply[0] = 0x1C;
        reply[40..44].copy_from_slice(&3_912_345_678u32.to_be_bytes());
        sock.send_to(&reply, peer).unwrap();
    });

    let mut cmd = Command::cargo_bin("skewrun").unwrap();
    cmd.args([
        "--dry-run",
        "--no-color",
        &format!("127.0.0.1:{}", addr.port()),
        "true",
    ])
    .assert()
    .success()
    .stdout(contains("Command: succeeded"));

    server.join().unwrap();
}
