// crates/oath-server/tests/dynalogin_session_test.rs
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use oath_core::otp::{time_step, totp};
use oath_core::{CredentialRecord, CredentialStore, Validator};
use oath_server::dynalogin::{self, SessionStats};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

const SECRET: &[u8] = b"12345678901234567890";

// RFC 4226 Appendix D, counters 0..
const HOTP_CODES: [&str; 3] = ["755224", "287082", "359152"];

fn validator() -> Arc<Validator> {
    let store: CredentialStore = [
        ("sam", CredentialRecord::hotp(SECRET, 0)),
        ("tina", CredentialRecord::totp(SECRET)),
    ]
    .into_iter()
    .collect();
    Arc::new(Validator::new(Arc::new(store)))
}

fn start(validator: Arc<Validator>) -> (DuplexStream, JoinHandle<SessionStats>) {
    let (client, server) = tokio::io::duplex(4096);
    let handle = tokio::spawn(dynalogin::serve(server, validator));
    (client, handle)
}

/// Send `input`, optionally close our side, and collect everything the
/// server writes until it closes.
async fn converse(input: &str, close: bool) -> (String, SessionStats) {
    let (mut client, handle) = start(validator());
    client.write_all(input.as_bytes()).await.unwrap();
    if close {
        client.shutdown().await.unwrap();
    }

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    (output, handle.await.unwrap())
}

#[tokio::test]
async fn valid_hotp_code_is_authorized_then_quit() {
    let input = format!("UDATA HOTP sam {}\r\nQUIT\r\n", HOTP_CODES[0]);
    let (output, stats) = converse(&input, false).await;

    assert_eq!(output, "220 Ready\r\n250 Authorized\r\n221 See ya starside\r\n");
    assert_eq!(
        stats,
        SessionStats {
            successes: 1,
            failures: 0,
            errors: 0
        }
    );
}

#[tokio::test]
async fn replayed_code_is_unauthorized() {
    let input = format!(
        "UDATA HOTP sam {0}\r\nUDATA HOTP sam {0}\r\nQUIT\r\n",
        HOTP_CODES[0]
    );
    let (output, stats) = converse(&input, false).await;

    assert_eq!(
        output,
        "220 Ready\r\n250 Authorized\r\n401 Unauthorized\r\n221 See ya starside\r\n"
    );
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 1);
}

#[tokio::test]
async fn unknown_user_and_wrong_mode_are_plain_failures() {
    let input = format!(
        "UDATA HOTP nobody {0}\r\nUDATA TOTP sam {0}\r\nQUIT\r\n",
        HOTP_CODES[0]
    );
    let (output, stats) = converse(&input, false).await;

    assert_eq!(
        output,
        "220 Ready\r\n401 Unauthorized\r\n401 Unauthorized\r\n221 See ya starside\r\n"
    );
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn current_totp_code_is_authorized() {
    let mut now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    if time_step(now) != time_step(now + 2) {
        tokio::time::sleep(Duration::from_secs(3)).await;
        now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    }
    let code = totp(SECRET, now, 6).unwrap();

    let (output, _) = converse(&format!("UDATA TOTP tina {code}\r\nQUIT\r\n"), false).await;
    assert_eq!(output, "220 Ready\r\n250 Authorized\r\n221 See ya starside\r\n");
}

#[tokio::test]
async fn every_terminator_style_ends_a_line() {
    let input = format!(
        "udata HOTP sam {}\nUDATA HOTP sam {}\r\nUDATA HOTP sam {}\rquit\r",
        HOTP_CODES[0], HOTP_CODES[1], HOTP_CODES[2]
    );
    let (output, stats) = converse(&input, false).await;

    assert_eq!(
        output,
        "220 Ready\r\n250 Authorized\r\n250 Authorized\r\n250 Authorized\r\n221 See ya starside\r\n"
    );
    assert_eq!(stats.successes, 3);
}

#[tokio::test]
async fn lone_cr_followed_by_crlf_is_an_empty_line() {
    let (output, stats) = converse("QUIT2\r\r\nQUIT\r\n", false).await;

    assert_eq!(
        output,
        "220 Ready\r\n500 Command not recognized\r\n501 Insufficient arguments\r\n221 See ya starside\r\n"
    );
    assert_eq!(stats.errors, 2);
}

#[tokio::test]
async fn syntax_errors_are_recoverable() {
    let (output, stats) = converse(
        "UDATA HOTP sam\r\nUDATA hotp sam 1\r\n\r\nQUIT\r\n",
        false,
    )
    .await;

    assert_eq!(
        output,
        "220 Ready\r\n\
         501 Expected 4 words\r\n\
         501 Mode not recognized\r\n\
         501 Insufficient arguments\r\n\
         221 See ya starside\r\n"
    );
    assert_eq!(stats.errors, 3);
}

#[tokio::test]
async fn eighth_error_closes_the_session() {
    let (output, stats) = converse(&"FOO\r\n".repeat(10), false).await;

    let mut expected = String::from("220 Ready\r\n");
    for _ in 0..7 {
        expected.push_str("500 Command not recognized\r\n");
    }
    expected.push_str("500-Command not recognized\r\n");
    expected.push_str("504 Too many errors. Goodbye!\r\n");

    assert_eq!(output, expected);
    assert_eq!(stats.errors, 8);
}

#[tokio::test]
async fn valid_commands_do_not_reset_the_error_count() {
    let mut input = "FOO\r\n".repeat(7);
    input.push_str(&format!("UDATA HOTP sam {}\r\n", HOTP_CODES[0]));
    input.push_str("FOO\r\nQUIT\r\n");

    let (output, stats) = converse(&input, false).await;
    assert!(output.ends_with("250 Authorized\r\n500-Command not recognized\r\n504 Too many errors. Goodbye!\r\n"));
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.errors, 8);
}

#[tokio::test]
async fn overlong_line_is_fatal_without_waiting_for_a_terminator() {
    // Client keeps its side open; the server must still answer and close.
    let (output, stats) = converse(&"a".repeat(257), false).await;

    assert_eq!(output, "220 Ready\r\n501 Line too long\r\n");
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn line_limit_counts_the_terminator() {
    let fits = format!("{}\nQUIT\n", "a".repeat(255));
    let (output, _) = converse(&fits, false).await;
    assert_eq!(
        output,
        "220 Ready\r\n500 Command not recognized\r\n221 See ya starside\r\n"
    );

    let too_long = format!("{}\nQUIT\n", "a".repeat(256));
    let (output, _) = converse(&too_long, false).await;
    assert_eq!(output, "220 Ready\r\n501 Line too long\r\n");
}

#[tokio::test]
async fn eof_ends_the_session_silently() {
    let (output, stats) = converse("", true).await;
    assert_eq!(output, "220 Ready\r\n");
    assert_eq!(stats, SessionStats::default());

    let (output, _) = converse("UDATA HO", true).await;
    assert_eq!(output, "220 Ready\r\n");
}

#[tokio::test(start_paused = true)]
async fn idle_client_times_out() {
    let (output, _) = converse("", false).await;
    assert_eq!(output, "220 Ready\r\n503 Timed out waiting for command\r\n");
}

#[tokio::test(start_paused = true)]
async fn silent_partial_line_times_out() {
    let (mut client, handle) = start(validator());
    client.write_all(b"UDATA HOTP").await.unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();

    assert_eq!(output, "220 Ready\r\n503 Timed out waiting for command\r\n");
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_typist_is_not_timed_out() {
    let (mut client, handle) = start(validator());
    let input = format!("UDATA HOTP sam {}\nQUIT\n", HOTP_CODES[0]);

    // Whole line takes well over the idle timeout; no single gap does.
    for byte in input.as_bytes() {
        client.write_all(&[*byte]).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();

    assert_eq!(output, "220 Ready\r\n250 Authorized\r\n221 See ya starside\r\n");
    assert_eq!(handle.await.unwrap().successes, 1);
}
