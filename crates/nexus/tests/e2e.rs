// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the compiled `nexus` binary against temporary config files.

use std::io::Write;
use std::process::{Command, Output};

fn nexus(args: &[&str], config: &str, vault_secret: Option<&str>) -> Output {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(config.as_bytes()).unwrap();

    let mut command = Command::new(env!("CARGO_BIN_EXE_nexus"));
    command.args(args).arg("--config").arg(file.path());
    command.env_remove("NEXUS_VAULT_SECRET");
    if let Some(secret) = vault_secret {
        command.env("NEXUS_VAULT_SECRET", secret);
    }
    command.output().unwrap()
}

const VALID: &str = r#"
[storage]
database_path = "/tmp/nexus-e2e.db"

[gateway]
host = "127.0.0.1"
port = 3999
bearer_token = "admin"

[vault]
kdf_memory_cost = 32768
kdf_iterations = 2
kdf_parallelism = 1

[[tenants]]
id = "acme"
name = "Acme"
auto_respond = true

[[tenants]]
id = "globex"
name = "Globex"
"#;

#[test]
fn config_check_prints_summary() {
    let output = nexus(&["config", "check"], VALID, None);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("127.0.0.1:3999"));
    assert!(stdout.contains("tenants:   2"));
    assert!(stdout.contains("locked (no secret)"));
    assert!(!stdout.contains("admin"));
}

#[test]
fn invalid_config_exits_non_zero() {
    let config = r#"
[[tenants]]
id = "acme"
name = "Acme"
confidence_threshold = 1.5

[[tenants]]
id = "acme"
name = "Acme again"
"#;
    let output = nexus(&["config", "check"], config, None);
    assert!(!output.status.success());
}

#[test]
fn unknown_key_exits_non_zero() {
    let output = nexus(&["config", "check"], "[gateway]\nprot = 3000\n", None);
    assert!(!output.status.success());
}

#[test]
fn vault_probe_uses_secret_from_env() {
    let output = nexus(&["vault", "encrypt-test"], VALID, Some("e2e-secret"));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("vault: ok"));

    let output = nexus(&["vault", "encrypt-test"], VALID, None);
    assert!(!output.status.success());
}
