use crate::utils::storage::{load_config, open_database};
use anyhow::Result;
use catalog::{CatalogStore, ConnectionProtocol};
use colored::*;
use database::SqliteCatalogStore;

/// List the persisted protocol catalog
pub async fn list(available_only: bool, format: String) -> Result<()> {
    let config = load_config()?;
    let db = open_database(&config).await?;
    let store = SqliteCatalogStore::new(db.as_ref().clone());

    let mut rows = store.list().await?;
    db.close().await;
    if available_only {
        rows.retain(|row| row.is_available());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            print_protocols_text(&rows);
        }
    }

    Ok(())
}

/// Why a row cannot be launched, if it cannot
fn availability_label(row: &ConnectionProtocol) -> &'static str {
    match (row.driver_enabled, row.config_enabled) {
        (true, true) => "available",
        (false, _) => "driver unavailable",
        (true, false) => "disabled",
    }
}

fn print_protocols_text(rows: &[ConnectionProtocol]) {
    println!("{}", "=== Protocol Catalog ===".bold());
    println!();

    if rows.is_empty() {
        println!("{}", "No protocols found".yellow());
        return;
    }

    println!(
        "{:<16} {:<24} {:<12} {:>6}  {}",
        "ID".bold(),
        "TITLE".bold(),
        "CATEGORY".bold(),
        "ORDER".bold(),
        "STATUS".bold()
    );
    for row in rows {
        let label = availability_label(row);
        let status = match label {
            "available" => label.green(),
            "disabled" => label.yellow(),
            _ => label.red(),
        };
        println!(
            "{:<16} {:<24} {:<12} {:>6}  {}",
            row.id.cyan(),
            row.title,
            row.category,
            row.sort_order,
            status
        );
    }

    println!();
    let available = rows.iter().filter(|r| r.is_available()).count();
    println!(
        "{}",
        format!("{} of {} protocol(s) available", available, rows.len()).green()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(driver_enabled: bool, config_enabled: bool) -> ConnectionProtocol {
        ConnectionProtocol {
            id: "ssh".into(),
            title: "SSH".into(),
            category: "shell".into(),
            sort_order: 0,
            driver_enabled,
            config_enabled,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_availability_label() {
        assert_eq!(availability_label(&row(true, true)), "available");
        assert_eq!(availability_label(&row(false, true)), "driver unavailable");
        assert_eq!(availability_label(&row(false, false)), "driver unavailable");
        assert_eq!(availability_label(&row(true, false)), "disabled");
    }
}
