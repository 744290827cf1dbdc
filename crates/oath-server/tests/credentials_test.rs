// crates/oath-server/tests/credentials_test.rs
use std::io::Write;
use std::path::Path;

use oath_core::OtpMode;
use oath_server::credentials::{load_credentials, parse_credentials, CredentialFileError};

const RFC_SECRET_HEX: &str = "3132333435363738393031323334353637383930";

#[test]
fn provisioning_file_populates_the_store() {
    let text = format!(
        r#"
[[user]]
name = "sam"
mode = "HOTP"
secret = "{RFC_SECRET_HEX}"
counter = 200

[[user]]
name = "tina"
mode = "TOTP"
secret = "{RFC_SECRET_HEX}"

[[user]]
name = "new"
mode = "HOTP"
secret = "00ff"
"#
    );

    let store = parse_credentials(&text).unwrap();
    assert_eq!(store.len(), 3);

    let sam = store.get("sam").unwrap();
    assert_eq!(sam.mode(), OtpMode::Hotp);
    assert_eq!(sam.secret(), b"12345678901234567890");
    assert_eq!(sam.counter(), Some(200));

    let tina = store.get("tina").unwrap();
    assert_eq!(tina.mode(), OtpMode::Totp);
    assert_eq!(tina.counter(), None);

    assert_eq!(store.counter("new"), Some(0));
}

#[test]
fn empty_file_is_an_empty_store() {
    assert!(parse_credentials("").unwrap().is_empty());
}

#[test]
fn entries_are_validated() {
    let bad_mode = r#"
[[user]]
name = "sam"
mode = "hotp"
secret = "00"
"#;
    assert!(matches!(
        parse_credentials(bad_mode),
        Err(CredentialFileError::Mode { user, .. }) if user == "sam"
    ));

    let bad_hex = r#"
[[user]]
name = "sam"
mode = "HOTP"
secret = "xyz"
"#;
    assert!(matches!(
        parse_credentials(bad_hex),
        Err(CredentialFileError::Secret { .. })
    ));

    let totp_counter = r#"
[[user]]
name = "tina"
mode = "TOTP"
secret = "00"
counter = 1
"#;
    assert!(matches!(
        parse_credentials(totp_counter),
        Err(CredentialFileError::TotpCounter(user)) if user == "tina"
    ));

    let unknown_field = r#"
[[user]]
name = "sam"
mode = "HOTP"
secret = "00"
digits = 8
"#;
    assert!(matches!(
        parse_credentials(unknown_field),
        Err(CredentialFileError::Parse(_))
    ));
}

#[test]
fn duplicate_users_are_rejected() {
    let text = r#"
[[user]]
name = "sam"
mode = "HOTP"
secret = "00"

[[user]]
name = "sam"
mode = "TOTP"
secret = "00"
"#;
    assert!(matches!(
        parse_credentials(text),
        Err(CredentialFileError::Duplicate(user)) if user == "sam"
    ));
}

#[test]
fn load_reads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[user]]\nname = \"sam\"\nmode = \"HOTP\"\nsecret = \"{RFC_SECRET_HEX}\"").unwrap();

    let store = load_credentials(file.path()).unwrap();
    assert_eq!(store.counter("sam"), Some(0));

    let err = load_credentials(Path::new("/nonexistent/users.toml")).unwrap_err();
    assert!(matches!(err, CredentialFileError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/users.toml"));
}
