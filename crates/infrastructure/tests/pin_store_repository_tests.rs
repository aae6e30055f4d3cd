use ferrous_doh_application::ports::PinStore;
use ferrous_doh_application::services::CertificatePinValidator;
use ferrous_doh_domain::DomainError;
use ferrous_doh_infrastructure::repositories::FilePinStore;
use std::sync::Arc;

fn store_in(dir: &tempfile::TempDir) -> FilePinStore {
    FilePinStore::open(dir.path().join("pins.toml")).unwrap()
}

#[test]
fn test_missing_file_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.get("CERT_PIN_dns.google").unwrap(), None);
    assert!(!store.path().exists());
}

#[test]
fn test_put_is_written_through() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store.put("CERT_PIN_dns.google", "AB:CD").unwrap();

    let contents = std::fs::read_to_string(store.path()).unwrap();
    assert!(contents.contains(r#"CERT_PIN_dns.google = "AB:CD""#));
    assert_eq!(store_in(&dir).get("CERT_PIN_dns.google").unwrap().as_deref(), Some("AB:CD"));
}

#[test]
fn test_put_replaces_existing_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store.put("CERT_PIN_a", "01").unwrap();
    store.put("CERT_PIN_a", "02").unwrap();

    assert_eq!(store.get("CERT_PIN_a").unwrap().as_deref(), Some("02"));
    assert_eq!(store_in(&dir).get("CERT_PIN_a").unwrap().as_deref(), Some("02"));
}

#[test]
fn test_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.put("CERT_PIN_a", "01").unwrap();
    store.put("CERT_PIN_b", "02").unwrap();

    assert!(store.remove("CERT_PIN_a").unwrap());
    assert!(!store.remove("CERT_PIN_a").unwrap());

    let reopened = store_in(&dir);
    assert_eq!(reopened.get("CERT_PIN_a").unwrap(), None);
    assert_eq!(reopened.get("CERT_PIN_b").unwrap().as_deref(), Some("02"));
}

#[test]
fn test_comments_and_other_keys_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pins.toml");
    std::fs::write(
        &path,
        "# pinned resolvers\nCERT_PIN_dns.quad9.net = \"11:22\" # rotated 2024\nowner = \"ops\"\n",
    )
    .unwrap();

    let store = FilePinStore::open(&path).unwrap();
    store.put("CERT_PIN_dns.quad9.net", "33:44").unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("# pinned resolvers"));
    assert!(contents.contains(r#""33:44" # rotated 2024"#));
    assert!(contents.contains(r#"owner = "ops""#));
}

#[test]
fn test_nested_directory_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("pins.toml");
    let store = FilePinStore::open(&path).unwrap();

    store.put("CERT_PIN_a", "01").unwrap();
    assert!(path.exists());
}

#[test]
fn test_invalid_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pins.toml");
    std::fs::write(&path, "CERT_PIN_a = [unterminated").unwrap();

    assert!(matches!(FilePinStore::open(&path), Err(DomainError::PinStore(_))));
}

#[test]
fn test_validator_pin_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store_in(&dir));
    let validator = CertificatePinValidator::new(store.clone());

    let first = rcgen::generate_simple_self_signed(vec!["dns.example".to_string()]).unwrap();
    let second = rcgen::generate_simple_self_signed(vec!["dns.example".to_string()]).unwrap();
    let first = first.cert.der().to_vec();
    let second = second.cert.der().to_vec();

    assert!(validator.verify(&second, "dns.example").unwrap());

    let fingerprint = validator.save(&first, "dns.example").unwrap();
    assert_eq!(
        store.get("CERT_PIN_dns.example").unwrap().as_deref(),
        Some(fingerprint.as_str())
    );
    assert!(validator.verify(&first, "dns.example").unwrap());
    assert!(!validator.verify(&second, "dns.example").unwrap());

    assert!(validator.remove("dns.example").unwrap());
    assert!(validator.verify(&second, "dns.example").unwrap());
}

#[test]
fn test_pin_saved_by_another_store_is_visible() {
    let dir = tempfile::tempdir().unwrap();
    let running = store_in(&dir);
    let cli = store_in(&dir);

    assert_eq!(running.get("CERT_PIN_dns.example").unwrap(), None);

    cli.put("CERT_PIN_dns.example", "AA:BB").unwrap();
    assert_eq!(
        running.get("CERT_PIN_dns.example").unwrap().as_deref(),
        Some("AA:BB")
    );

    cli.put("CERT_PIN_dns.example", "CC:DD").unwrap();
    assert_eq!(
        running.get("CERT_PIN_dns.example").unwrap().as_deref(),
        Some("CC:DD")
    );

    assert!(cli.remove("CERT_PIN_dns.example").unwrap());
    assert_eq!(running.get("CERT_PIN_dns.example").unwrap(), None);
}

#[test]
fn test_writes_from_two_stores_do_not_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let first = store_in(&dir);
    let second = store_in(&dir);

    first.put("CERT_PIN_a", "01").unwrap();
    second.put("CERT_PIN_b", "02").unwrap();
    first.put("CERT_PIN_c", "03").unwrap();

    let reopened = store_in(&dir);
    assert_eq!(reopened.get("CERT_PIN_a").unwrap().as_deref(), Some("01"));
    assert_eq!(reopened.get("CERT_PIN_b").unwrap().as_deref(), Some("02"));
    assert_eq!(reopened.get("CERT_PIN_c").unwrap().as_deref(), Some("03"));
}

#[test]
fn test_deleted_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.put("CERT_PIN_a", "01").unwrap();

    std::fs::remove_file(store.path()).unwrap();
    assert_eq!(store.get("CERT_PIN_a").unwrap(), None);
}

#[test]
fn test_failed_write_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.put("CERT_PIN_a", "01").unwrap();

    let blocker = dir.path().join("pins.toml.tmp");
    std::fs::create_dir(&blocker).unwrap();

    assert!(matches!(store.put("CERT_PIN_a", "02"), Err(DomainError::PinStore(_))));
    assert!(matches!(store.remove("CERT_PIN_a"), Err(DomainError::PinStore(_))));
    assert_eq!(store.get("CERT_PIN_a").unwrap().as_deref(), Some("01"));
    assert_eq!(store_in(&dir).get("CERT_PIN_a").unwrap().as_deref(), Some("01"));

    std::fs::remove_dir(&blocker).unwrap();
    store.put("CERT_PIN_a", "02").unwrap();
    assert_eq!(store.get("CERT_PIN_a").unwrap().as_deref(), Some("02"));
}
