use assert_cmd::Command;
use authz::{PrincipalRef, ResourcePermission, ResourceRef};
use catalog::ConnectionProtocol;
use chrono::{Duration, Utc};
use database::{
    initialize_database, DatabaseConfig, SqliteCatalogStore, SqliteGrantStore, SqliteRoleStore,
};
use permissions::Role;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BROKER_ENV_VARS: [&str; 5] = [
    "BROKER_CONFIG",
    "BROKER_DATABASE_PATH",
    "BROKER_LOG_DIR",
    "BROKER_LOG_LEVEL",
    "RUST_LOG",
];

/// A `brokerctl` command with no broker variables inherited from the caller
fn brokerctl() -> Command {
    let mut cmd = Command::cargo_bin("brokerctl").unwrap();
    for var in BROKER_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper function to create a mock deployment with a configuration file
fn create_mock_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    fs::create_dir(root.join("config")).unwrap();
    fs::create_dir(root.join("data")).unwrap();

    fs::write(
        root.join("config").join("broker.yaml"),
        r#"database:
  database_path: data/broker.db
  max_connections: 2
logging:
  level: debug
  directory: data/logs
sessions:
  grace_period_secs: 120
catalog:
  protocols:
    vnc:
      enabled: false
"#,
    )
    .unwrap();

    temp_dir
}

fn protocol(id: &str, order: i64, driver_enabled: bool, config_enabled: bool) -> ConnectionProtocol {
    ConnectionProtocol {
        id: id.to_string(),
        title: id.to_uppercase(),
        category: "remote".to_string(),
        sort_order: order,
        driver_enabled,
        config_enabled,
        updated_at: Utc::now(),
    }
}

fn grant(id: &str, expires_in: Option<Duration>) -> ResourcePermission {
    let now = Utc::now();
    ResourcePermission {
        id: id.to_string(),
        resource: ResourceRef::connection("c1"),
        principal: PrincipalRef::team("ops"),
        permission_id: "connection.view".to_string(),
        granted_by: "alice".to_string(),
        expires_at: expires_in.map(|d| now + d),
        metadata: serde_json::Map::new(),
        created_at: now,
    }
}

/// Write the state a running broker would leave behind
fn seed_database(path: &Path) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let config = DatabaseConfig::new().with_database_path(path.to_path_buf());
        let db = initialize_database(&config).await.unwrap();

        let catalog = SqliteCatalogStore::new(db.as_ref().clone());
        catalog.upsert_row(&protocol("ssh", 10, true, true)).await.unwrap();
        catalog.upsert_row(&protocol("rdp", 20, false, true)).await.unwrap();
        catalog.upsert_row(&protocol("vnc", 30, true, false)).await.unwrap();

        let grants = SqliteGrantStore::new(db.as_ref().clone());
        grants.insert_grant(&grant("g-active", None)).await.unwrap();
        grants
            .insert_grant(&grant("g-expired", Some(Duration::hours(-1))))
            .await
            .unwrap();

        let roles = SqliteRoleStore::new(db.as_ref().clone());
        roles
            .seed(&[Role::new("admin", "Administrator")
                .system()
                .with_permission("connection.share")])
            .await
            .unwrap();

        db.close().await;
    });
}

fn create_seeded_project() -> TempDir {
    let project = create_mock_project();
    seed_database(&project.path().join("data").join("broker.db"));
    project
}

#[test]
fn test_cli_help() {
    brokerctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Operator CLI"))
        .stdout(predicate::str::contains("protocols"));
}

#[test]
fn test_cli_version() {
    brokerctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("brokerctl"));
}

#[test]
fn test_not_in_project_root() {
    let temp_dir = TempDir::new().unwrap();

    brokerctl()
        .current_dir(temp_dir.path())
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Not in a broker deployment directory",
        ))
        .stderr(predicate::str::contains("BROKER_CONFIG"));
}

#[test]
fn test_health_command_text() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("Broker Health Check"))
        .stdout(predicate::str::contains("Overall Status"))
        .stdout(predicate::str::contains("not_initialized"));

    // Health never creates the database
    assert!(!project_dir.path().join("data").join("broker.db").exists());
}

#[test]
fn test_health_command_json() {
    let project_dir = create_seeded_project();

    let output = brokerctl()
        .current_dir(project_dir.path())
        .args(["health", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let status: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(status["status"], "healthy");
    assert_eq!(status["components"]["database"]["status"], "healthy");
    assert_eq!(status["components"]["catalog"]["count"], 3);
    assert_eq!(
        status["components"]["catalog"]["available"],
        serde_json::json!(["ssh"])
    );
}

#[test]
fn test_config_list_text() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Broker Configuration"))
        .stdout(predicate::str::contains("[sessions]"))
        .stdout(predicate::str::contains("Total sections: 5"));
}

#[test]
fn test_config_list_json() {
    let project_dir = create_mock_project();

    let output = brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "list", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let config: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(config["sessions"]["grace_period_secs"], 120);
    // Unset values fall back to defaults
    assert_eq!(config["sessions"]["cleanup_interval_secs"], 60);
    assert_eq!(config["catalog"]["protocols"]["vnc"]["enabled"], false);
}

#[test]
fn test_config_list_yaml() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "list", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("grace_period_secs: 120"));
}

#[test]
fn test_config_get_valid_path() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "get", "database.database_path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration Value"))
        .stdout(predicate::str::contains("data/broker.db"));
}

#[test]
fn test_config_get_invalid_path() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "get", "invalid.path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_config_get_json_format() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "get", "sessions.grace_period_secs", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("120"));
}

#[test]
fn test_env_override_wins_over_file() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .env("BROKER_LOG_LEVEL", "trace")
        .args(["config", "get", "logging.level"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trace"));
}

#[test]
fn test_invalid_config_fails() {
    let project_dir = create_mock_project();
    fs::write(
        project_dir.path().join("config").join("broker.yaml"),
        "sessions:\n  cleanup_interval_secs: 0\n",
    )
    .unwrap();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["config", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load broker configuration"));
}

#[test]
fn test_verbose_flag() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["--verbose", "health"])
        .assert()
        .success();
}

#[test]
fn test_subcommand_help() {
    brokerctl()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration management"));

    brokerctl()
        .args(["health", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Check broker state"));
}

#[test]
fn test_cli_from_subdirectory() {
    let project_dir = create_mock_project();

    let subdir = project_dir.path().join("data").join("logs");
    fs::create_dir_all(&subdir).unwrap();

    brokerctl()
        .current_dir(subdir)
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("Broker Health Check"));
}

#[test]
fn test_explicit_config_path() {
    let deployment = TempDir::new().unwrap();
    let db_path = deployment.path().join("custom.db");
    let config_path = deployment.path().join("custom.yaml");
    fs::write(
        &config_path,
        format!("database:\n  database_path: {}\n", db_path.display()),
    )
    .unwrap();
    seed_database(&db_path);

    // No config/broker.yaml anywhere above the working directory
    let elsewhere = TempDir::new().unwrap();
    brokerctl()
        .current_dir(elsewhere.path())
        .env("BROKER_CONFIG", &config_path)
        .args(["protocols", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ssh\""));
}

#[test]
fn test_protocols_list() {
    let project_dir = create_seeded_project();

    brokerctl()
        .current_dir(project_dir.path())
        .arg("protocols")
        .assert()
        .success()
        .stdout(predicate::str::contains("Protocol Catalog"))
        .stdout(predicate::str::contains("driver unavailable"))
        .stdout(predicate::str::contains("disabled"))
        .stdout(predicate::str::contains("1 of 3 protocol(s) available"));
}

#[test]
fn test_protocols_available_only() {
    let project_dir = create_seeded_project();

    let output = brokerctl()
        .current_dir(project_dir.path())
        .args(["protocols", "--available", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rows: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let ids: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["ssh"]);
}

#[test]
fn test_protocols_without_database() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .arg("protocols")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Database not initialized"));

    assert!(!project_dir.path().join("data").join("broker.db").exists());
}

#[test]
fn test_grants_list_hides_expired() {
    let project_dir = create_seeded_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["grants", "list", "--resource", "connection:c1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("g-active"))
        .stdout(predicate::str::contains("g-expired").not())
        .stdout(predicate::str::contains("Total grants: 1"));

    brokerctl()
        .current_dir(project_dir.path())
        .args(["grants", "list", "--include-expired"])
        .assert()
        .success()
        .stdout(predicate::str::contains("g-expired"))
        .stdout(predicate::str::contains("(expired)"));
}

#[test]
fn test_grants_list_rejects_malformed_resource() {
    let project_dir = create_seeded_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["grants", "list", "--resource", "c1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected type:id"));
}

#[test]
fn test_grants_purge() {
    let project_dir = create_seeded_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["grants", "purge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Purged 1 expired grant(s)"));

    brokerctl()
        .current_dir(project_dir.path())
        .args(["grants", "list", "--include-expired"])
        .assert()
        .success()
        .stdout(predicate::str::contains("g-expired").not())
        .stdout(predicate::str::contains("Total grants: 1"));
}

#[test]
fn test_permissions_list() {
    let project_dir = create_mock_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["permissions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("connection.share"))
        .stdout(predicate::str::contains("Total permissions: 5"));
}

#[test]
fn test_permissions_roles() {
    let project_dir = create_seeded_project();

    brokerctl()
        .current_dir(project_dir.path())
        .args(["permissions", "roles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("admin"))
        .stdout(predicate::str::contains("[system]"))
        .stdout(predicate::str::contains("Total roles: 1"));
}
