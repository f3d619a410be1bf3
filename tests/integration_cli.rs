//! Integration tests for the event-mailer binary.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn mailer() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_event-mailer"));
    cmd.env_remove("SMTP_USERNAME")
        .env_remove("SMTP_PASSWORD")
        .env_remove("LOG_FORMAT")
        .env("RUST_LOG", "info");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("Failed to run event-mailer")
}

#[test]
fn validate_valid_config_exits_success() {
    let output = run(mailer()
        .args(["--validate", "-c"])
        .arg(fixture_path("config_valid.yaml")));

    assert!(
        output.status.success(),
        "event-mailer --validate should exit with code 0 for valid config\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration is valid"), "{}", stdout);
    assert!(stdout.contains("SMTP server: smtp.example.com:2525"), "{}", stdout);
    assert!(stdout.contains("Auth method: login"), "{}", stdout);
    assert!(stdout.contains("From: Ops <ops@example.com>"), "{}", stdout);
    assert!(stdout.contains("Body template: default"), "{}", stdout);
    assert!(!stdout.contains("hunter2"));
}

#[test]
fn validate_applies_cli_and_annotation_layers() {
    let output = run(mailer()
        .args(["--validate", "-P", "465", "-c"])
        .arg(fixture_path("config_valid.yaml"))
        .arg("--event-file")
        .arg(fixture_path("event.json")));

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SMTP server: smtp.example.com:465"), "{}", stdout);
    assert!(stdout.contains("To: web-team@example.com"), "{}", stdout);
    assert!(stdout.contains("Body template: hook output"), "{}", stdout);
}

#[test]
fn validate_invalid_auth_method_exits_failure() {
    let output = run(mailer()
        .args(["--validate", "-c"])
        .arg(fixture_path("config_invalid_auth.yaml")));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cram-md5 is not a valid auth method"),
        "{}",
        stderr
    );
}

#[test]
fn validate_unknown_key_exits_failure() {
    let output = run(mailer()
        .args(["--validate", "-c"])
        .arg(fixture_path("config_unknown_key.yaml")));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("smtp_hots"), "{}", stderr);
}

#[test]
fn validate_missing_config_file_exits_failure() {
    let output = run(mailer().args(["--validate", "-c", "/nonexistent/event-mailer.yaml"]));
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn conflicting_body_options_exit_failure() {
    let output = run(mailer().args([
        "--validate",
        "-s", "smtp.example.com",
        "-t", "oncall@example.com",
        "-f", "ops@example.com",
        "-a", "none",
        "-H",
        "-T", "/etc/event-mailer/body.tmpl",
    ]));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mutually exclusive"), "{}", stderr);
}

#[test]
fn malformed_event_exits_failure() {
    let mut child = mailer()
        .args([
            "-s", "127.0.0.1",
            "-t", "oncall@example.com",
            "-f", "ops@example.com",
            "-a", "none",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn event-mailer");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"{not json")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse event"), "{}", stderr);
}

/// Minimal blocking SMTP server accepting one message.
fn accept_one_message(listener: TcpListener) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut transcript = Vec::new();
        writer.write_all(b"220 mail.test ESMTP\r\n").unwrap();

        let mut in_data = false;
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 {
            let text = line.trim_end_matches("\r\n").to_string();
            line.clear();
            if in_data {
                if text == "." {
                    in_data = false;
                    writer.write_all(b"250 Ok: queued\r\n").unwrap();
                } else {
                    transcript.push(text);
                }
                continue;
            }
            let reply: &[u8] = if text.starts_with("EHLO") {
                b"250 mail.test\r\n"
            } else if text == "DATA" {
                in_data = true;
                b"354 Go ahead\r\n"
            } else if text == "QUIT" {
                b"221 Bye\r\n"
            } else {
                b"250 Ok\r\n"
            };
            transcript.push(text);
            writer.write_all(reply).unwrap();
        }
        transcript
    })
}

#[test]
fn sends_event_from_file() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = accept_one_message(listener);

    let output = run(mailer()
        .args(["-s", "127.0.0.1", "-P"])
        .arg(port.to_string())
        .args(["-t", "oncall@example.com", "-f", "Ops <ops@example.com>", "-a", "none"])
        .args(["-S", "{{ CheckState | upper }}: {{ EntityName }}"])
        .arg("--event-file")
        .arg(fixture_path("event.json")));

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Email sent"));

    let transcript = server.join().unwrap();
    assert_eq!(transcript[0], "EHLO localhost");
    assert_eq!(transcript[1], "MAIL FROM:<ops@example.com>");
    // The annotation on the event overrides the recipient.
    assert_eq!(transcript[2], "RCPT TO:<web-team@example.com>");
    assert!(transcript.contains(&"Subject: FAILING: web1".to_string()));
    assert!(transcript.contains(&"Hook Command:  df -h /".to_string()));
    assert_eq!(transcript.last().unwrap(), "QUIT");
}
