use crate::utils::storage::{load_config, open_database};
use anyhow::{anyhow, Result};
use authz::{ResourcePermission, ResourceRef};
use chrono::{DateTime, Utc};
use colored::*;
use database::SqliteGrantStore;

/// List stored grants, optionally for one resource
pub async fn list(resource: Option<String>, include_expired: bool, format: String) -> Result<()> {
    let resource = resource.as_deref().map(parse_resource).transpose()?;

    let config = load_config()?;
    let db = open_database(&config).await?;
    let store = SqliteGrantStore::new(db.as_ref().clone());

    let mut grants = match &resource {
        Some(resource) => store.list_grants(resource).await?,
        None => store.list_all().await?,
    };
    db.close().await;

    let now = Utc::now();
    if !include_expired {
        grants.retain(|grant| grant.is_active_at(now));
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&grants)?);
        }
        _ => {
            print_grants_text(&grants, now);
        }
    }

    Ok(())
}

/// Delete every grant whose expiry has passed
pub async fn purge() -> Result<()> {
    let config = load_config()?;
    let db = open_database(&config).await?;
    let store = SqliteGrantStore::new(db.as_ref().clone());

    let purged = store.purge(Utc::now()).await?;
    db.close().await;

    println!(
        "{}",
        format!("Purged {} expired grant(s)", purged).green()
    );
    Ok(())
}

/// Parse the `type:id` form used on the command line
fn parse_resource(raw: &str) -> Result<ResourceRef> {
    match raw.split_once(':') {
        Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(ResourceRef::new(id, kind)),
        _ => Err(anyhow!(
            "Invalid resource '{}': expected type:id (e.g. connection:c1)",
            raw
        )),
    }
}

fn print_grants_text(grants: &[ResourcePermission], now: DateTime<Utc>) {
    println!("{}", "=== Resource Grants ===".bold());
    println!();

    if grants.is_empty() {
        println!("{}", "No grants found".yellow());
        return;
    }

    for grant in grants {
        println!("{} {}", "Grant".bold(), grant.id.cyan());
        println!("  Resource:   {}", grant.resource);
        println!("  Principal:  {}", grant.principal);
        println!("  Permission: {}", grant.permission_id.yellow());
        println!("  Granted by: {}", grant.granted_by);
        match grant.expires_at {
            None => println!("  Expires:    {}", "never".green()),
            Some(at) if at > now => println!("  Expires:    {}", at.to_rfc3339().green()),
            Some(at) => println!("  Expires:    {}", format!("{} (expired)", at.to_rfc3339()).red()),
        }
        if !grant.metadata.is_empty() {
            println!(
                "  Metadata:   {}",
                serde_json::Value::Object(grant.metadata.clone())
            );
        }
        println!();
    }

    println!("{}", format!("Total grants: {}", grants.len()).green());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource() {
        let resource = parse_resource("connection:c1").unwrap();
        assert_eq!(resource, ResourceRef::connection("c1"));

        let resource = parse_resource("folder:ops:eu").unwrap();
        assert_eq!(resource.resource_type, "folder");
        assert_eq!(resource.id, "ops:eu");

        assert!(parse_resource("c1").is_err());
        assert!(parse_resource(":c1").is_err());
        assert!(parse_resource("connection:").is_err());
    }
}
