use crate::utils::storage::{load_config, open_database};
use anyhow::Result;
use catalog::DriverRegistry;
use colored::*;
use database::SqliteRoleStore;
use permissions::{PermissionRegistry, Role};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PermissionView {
    id: String,
    module: String,
    description: String,
    depends_on: Vec<String>,
    implies: Vec<String>,
}

/// Core permissions with their direct dependencies and full closure.
///
/// Driver permissions are contributed at broker startup and are not known here.
fn permission_views(registry: &PermissionRegistry) -> Vec<PermissionView> {
    registry
        .definitions()
        .map(|definition| {
            let implies = registry
                .closure([definition.id.as_str()])
                .into_iter()
                .filter(|id| id != &definition.id)
                .collect();
            PermissionView {
                id: definition.id.clone(),
                module: definition.module.clone(),
                description: definition.description.clone(),
                depends_on: definition.depends_on.iter().cloned().collect(),
                implies,
            }
        })
        .collect()
}

/// List the core permission registry
pub fn list(format: String) -> Result<()> {
    let registry = broker::build_permission_registry(&DriverRegistry::new())?;
    let views = permission_views(&registry);

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        _ => {
            println!("{}", "=== Core Permissions ===".bold());
            println!();
            for view in &views {
                println!("{} ({})", view.id.cyan().bold(), view.module);
                println!("  {}", view.description);
                if !view.implies.is_empty() {
                    println!("  Implies: {}", view.implies.join(", ").yellow());
                }
            }
            println!();
            println!("{}", format!("Total permissions: {}", views.len()).green());
        }
    }

    Ok(())
}

/// List roles stored by the broker
pub async fn roles(format: String) -> Result<()> {
    let config = load_config()?;
    let db = open_database(&config).await?;
    let roles = SqliteRoleStore::new(db.as_ref().clone()).list().await?;
    db.close().await;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&roles)?);
        }
        _ => {
            print_roles_text(&roles);
        }
    }

    Ok(())
}

fn print_roles_text(roles: &[Role]) {
    println!("{}", "=== Roles ===".bold());
    println!();

    if roles.is_empty() {
        println!("{}", "No roles found".yellow());
        return;
    }

    for role in roles {
        let marker = if role.system { " [system]".magenta() } else { "".normal() };
        println!("{} - {}{}", role.id.cyan().bold(), role.name, marker);
        if !role.description.is_empty() {
            println!("  {}", role.description);
        }
        let permissions: Vec<&str> = role.permissions.iter().map(String::as_str).collect();
        println!("  Permissions: {}", permissions.join(", "));
        println!();
    }

    println!("{}", format!("Total roles: {}", roles.len()).green());
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::builtin::{CONNECTION_MANAGE, CONNECTION_SHARE, CONNECTION_VIEW};

    #[test]
    fn test_permission_views_include_closure() {
        let registry = broker::build_permission_registry(&DriverRegistry::new()).unwrap();
        let views = permission_views(&registry);

        let share = views.iter().find(|v| v.id == CONNECTION_SHARE).unwrap();
        assert_eq!(share.depends_on, vec![CONNECTION_MANAGE.to_string()]);
        assert_eq!(
            share.implies,
            vec![CONNECTION_MANAGE.to_string(), CONNECTION_VIEW.to_string()]
        );

        let view = views.iter().find(|v| v.id == CONNECTION_VIEW).unwrap();
        assert!(view.implies.is_empty());
    }
}
