//! Credential resolution and `.env` loading.

use babushka::credentials::{
    load_env_file, resolve_anthropic_auth, Credentials, ANTHROPIC_API_KEY_VAR,
};

#[test]
fn resolver_skips_blank_values() {
    let credentials = Credentials::from_resolver(&[ANTHROPIC_API_KEY_VAR], |_| {
        Some("   ".to_owned())
    });
    assert_eq!(credentials.get(ANTHROPIC_API_KEY_VAR), None);
    assert!(resolve_anthropic_auth(&credentials).is_none());
}

#[test]
fn resolved_key_is_trimmed() {
    let credentials = Credentials::from_resolver(&[ANTHROPIC_API_KEY_VAR], |_| {
        Some(" sk-ant-test \n".to_owned())
    });

    let auth = match resolve_anthropic_auth(&credentials) {
        Some(auth) => auth,
        None => panic!("key should resolve"),
    };
    assert_eq!(auth.expose(), "sk-ant-test");
}

#[test]
fn debug_output_never_contains_secrets() {
    let credentials = Credentials::from_resolver(&[ANTHROPIC_API_KEY_VAR], |_| {
        Some("sk-ant-secret-value".to_owned())
    });

    let rendered = format!("{credentials:?}");
    assert!(!rendered.contains("sk-ant-secret-value"), "{rendered}");

    let auth = resolve_anthropic_auth(&credentials);
    let rendered = format!("{auth:?}");
    assert!(!rendered.contains("sk-ant-secret-value"), "{rendered}");
}

#[test]
fn load_env_file_sets_variables() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(".env");
    std::fs::write(&path, "BABUSHKA_CREDENTIALS_TEST_VAR=from-file\n").expect("write env file");

    load_env_file(&path).expect("env file should load");
    assert_eq!(
        std::env::var("BABUSHKA_CREDENTIALS_TEST_VAR").ok().as_deref(),
        Some("from-file")
    );
}

#[test]
fn load_env_file_rejects_missing_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = load_env_file(&dir.path().join("absent.env"))
        .expect_err("missing file should fail");
    assert!(err.to_string().contains("does not exist"), "{err}");
}
