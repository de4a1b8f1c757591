use crate::utils::storage::{load_config, open_database};
use anyhow::Result;
use broker::config::{CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH};
use broker::BrokerConfig;
use catalog::CatalogStore;
use colored::*;
use database::SqliteCatalogStore;
use serde_json::json;
use std::env;
use std::path::PathBuf;

/// Execute the health check command
pub async fn execute(format: String) -> Result<()> {
    let health_status = check_system_health().await;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&health_status)?);
        }
        _ => {
            print_health_status_text(&health_status);
        }
    }

    Ok(())
}

/// Check the health of the configuration, the database and the catalog mirror
async fn check_system_health() -> serde_json::Value {
    let mut status = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "components": {}
    });

    let config = match load_config() {
        Ok(config) => {
            status["components"]["configuration"] = json!({
                "status": "healthy",
                "message": "Configuration loaded",
                "path": config_path().display().to_string()
            });
            Some(config)
        }
        Err(e) => {
            status["components"]["configuration"] = json!({
                "status": "unhealthy",
                "message": format!("{:#}", e),
                "path": config_path().display().to_string()
            });
            None
        }
    };

    if let Some(config) = config {
        status["components"]["database"] = check_database_health(&config).await;
        status["components"]["catalog"] = check_catalog_health(&config).await;
    }

    let all_healthy = status["components"]
        .as_object()
        .map(|components| {
            components
                .values()
                .all(|v| v["status"].as_str().unwrap_or("unknown") == "healthy")
        })
        .unwrap_or(false);

    if !all_healthy {
        status["status"] = json!("degraded");
    }

    status
}

fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Check database presence and schema
async fn check_database_health(config: &BrokerConfig) -> serde_json::Value {
    let db_path = &config.database.database_path;

    if !db_path.exists() {
        return json!({
            "status": "not_initialized",
            "message": "Database file does not exist yet",
            "path": db_path.display().to_string()
        });
    }

    let db = match open_database(config).await {
        Ok(db) => db,
        Err(e) => {
            return json!({
                "status": "unhealthy",
                "message": format!("Database exists but cannot be accessed: {:#}", e),
                "path": db_path.display().to_string()
            });
        }
    };

    let result = match db.missing_tables().await {
        Ok(missing) if missing.is_empty() => json!({
            "status": "healthy",
            "message": "Database file exists and all tables are present",
            "path": db_path.display().to_string()
        }),
        Ok(missing) => json!({
            "status": "unhealthy",
            "message": "Database is missing tables",
            "path": db_path.display().to_string(),
            "missing": missing
        }),
        Err(e) => json!({
            "status": "unhealthy",
            "message": format!("Failed to inspect schema: {}", e),
            "path": db_path.display().to_string()
        }),
    };
    db.close().await;
    result
}

/// Summarize the persisted protocol catalog
async fn check_catalog_health(config: &BrokerConfig) -> serde_json::Value {
    if !config.database.database_path.exists() {
        return json!({
            "status": "not_initialized",
            "message": "No catalog has been synchronized yet"
        });
    }

    let db = match open_database(config).await {
        Ok(db) => db,
        Err(e) => {
            return json!({
                "status": "unhealthy",
                "message": format!("{:#}", e)
            });
        }
    };

    let store = SqliteCatalogStore::new(db.as_ref().clone());
    let result = match store.list().await {
        Ok(rows) if rows.is_empty() => json!({
            "status": "warning",
            "message": "No protocols registered",
            "count": 0
        }),
        Ok(rows) => {
            let available: Vec<&str> = rows
                .iter()
                .filter(|r| r.is_available())
                .map(|r| r.id.as_str())
                .collect();
            let unavailable: Vec<&str> = rows
                .iter()
                .filter(|r| !r.is_available())
                .map(|r| r.id.as_str())
                .collect();
            let catalog_status = if available.is_empty() {
                "warning"
            } else {
                "healthy"
            };
            json!({
                "status": catalog_status,
                "message": format!("{} of {} protocol(s) available", available.len(), rows.len()),
                "count": rows.len(),
                "available": available,
                "unavailable": unavailable
            })
        }
        Err(e) => json!({
            "status": "unhealthy",
            "message": format!("Failed to read catalog: {}", e)
        }),
    };
    db.close().await;
    result
}

/// Print health status in a formatted text output
fn print_health_status_text(status: &serde_json::Value) {
    println!("{}", "=== Broker Health Check ===".bold());
    println!();

    let overall_status = status["status"].as_str().unwrap_or("unknown");
    let status_display = match overall_status {
        "healthy" => "HEALTHY".green().bold(),
        "degraded" => "DEGRADED".yellow().bold(),
        "unhealthy" => "UNHEALTHY".red().bold(),
        _ => "UNKNOWN".white().bold(),
    };

    println!("Overall Status: {}", status_display);
    println!("Timestamp: {}", status["timestamp"].as_str().unwrap_or(""));
    println!();

    println!("{}", "Components:".bold());
    println!("{}", "─".repeat(50));

    if let Some(components) = status["components"].as_object() {
        for (name, component) in components {
            let comp_status = component["status"].as_str().unwrap_or("unknown");
            let status_icon = match comp_status {
                "healthy" => "✓".green(),
                "unhealthy" => "✗".red(),
                "warning" => "⚠".yellow(),
                "not_initialized" => "○".white(),
                _ => "?".white(),
            };

            let status_text = match comp_status {
                "healthy" => comp_status.green(),
                "unhealthy" => comp_status.red(),
                "warning" => comp_status.yellow(),
                _ => comp_status.white(),
            };

            println!(
                "{} {} ({})",
                status_icon,
                name.to_uppercase().bold(),
                status_text
            );

            if let Some(message) = component["message"].as_str() {
                println!("  {}", message);
            }

            let list_field = match name.as_str() {
                "database" => Some(("missing", "Missing tables")),
                "catalog" => Some(("unavailable", "Unavailable")),
                _ => None,
            };
            if let Some((field, label)) = list_field {
                if let Some(items) = component[field].as_array() {
                    if !items.is_empty() {
                        println!(
                            "  {}: {}",
                            label,
                            items
                                .iter()
                                .filter_map(|s| s.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                    }
                }
            }

            println!();
        }
    }
}
