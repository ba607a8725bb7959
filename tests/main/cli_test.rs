//! CLI contract tests.

use assert_cmd::Command;

fn babushka(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("babushka").expect("binary should build");
    cmd.current_dir(dir)
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("CLERK_JWKS_URL")
        .env_remove("BABUSHKA_CONFIG_PATH")
        .env("RUST_LOG", "info");
    cmd
}

#[test]
fn help_lists_flags() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = babushka(dir.path()).arg("--help").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--host", "--port", "--env-file", "--log-dir"] {
        assert!(stdout.contains(flag), "missing {flag} in:\n{stdout}");
    }
}

#[test]
fn startup_fails_without_api_key() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = babushka(dir.path()).arg("--port").arg("0").output().expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ANTHROPIC_API_KEY"), "stderr was:\n{stderr}");
}

#[test]
fn startup_fails_on_missing_env_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = babushka(dir.path())
        .arg("--env-file")
        .arg(dir.path().join("missing.env"))
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("env file does not exist"), "stderr was:\n{stderr}");
}

#[test]
fn rust_log_from_env_file_applies() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join(".env"), "RUST_LOG=debug\n").expect("write .env");

    let output = babushka(dir.path())
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no config file found, using defaults"),
        "debug output missing, stderr was:\n{stderr}"
    );
}

#[test]
fn jwks_url_from_config_file_enables_auth() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("babushka.toml"),
        "[auth]\njwks_url = \"https://keys.example.test/.well-known/jwks.json\"\n",
    )
    .expect("write config");
    // Occupy a port so startup stops right after configuration is logged.
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = taken.local_addr().expect("local addr").port();

    let output = babushka(dir.path())
        .env("ANTHROPIC_API_KEY", "sk-ant-test")
        .env("NO_COLOR", "1")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration loaded"), "stderr was:\n{stderr}");
    assert!(
        !stderr.contains("no JWKS URL configured"),
        "stderr was:\n{stderr}"
    );
    assert!(stderr.contains("failed to bind"), "stderr was:\n{stderr}");
}
