use crate::utils::storage::load_config;
use anyhow::{anyhow, Result};
use colored::*;

/// Print the effective broker configuration
pub fn list(format: String) -> Result<()> {
    let config = load_config()?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(&config)?);
        }
        _ => {
            print_config_text(&serde_yaml::to_value(&config)?);
        }
    }

    Ok(())
}

/// Get a single configuration value by dotted path
pub fn get(section: String, format: String) -> Result<()> {
    let config = serde_yaml::to_value(load_config()?)?;

    // e.g. "sessions.grace_period_secs"
    let parts: Vec<&str> = section.split('.').filter(|p| !p.is_empty()).collect();
    let value = navigate_config_path(&config, &parts)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(&value)?);
        }
        _ => {
            print_config_value(&section, &value);
        }
    }

    Ok(())
}

/// Navigate through the configuration structure to find a specific value
fn navigate_config_path(config: &serde_yaml::Value, path: &[&str]) -> Result<serde_yaml::Value> {
    if path.is_empty() {
        return Err(anyhow!("Empty configuration path"));
    }

    let mut current_value = config;
    for (i, &key) in path.iter().enumerate() {
        match current_value {
            serde_yaml::Value::Mapping(map) => {
                current_value = map.get(key).ok_or_else(|| {
                    let partial_path = path[..=i].join(".");
                    if i == 0 {
                        anyhow!("Configuration section '{}' not found", partial_path)
                    } else {
                        anyhow!("Configuration key '{}' not found", partial_path)
                    }
                })?;
            }
            _ => {
                let partial_path = path[..i].join(".");
                return Err(anyhow!(
                    "Cannot navigate further from '{}': not a mapping",
                    partial_path
                ));
            }
        }
    }

    Ok(current_value.clone())
}

/// One leaf setting, addressed by its dotted path
#[derive(Debug, PartialEq, Eq)]
struct Setting {
    path: String,
    value: String,
    note: Option<String>,
}

/// Flatten a configuration subtree into leaf settings, in file order.
fn flatten_settings(value: &serde_yaml::Value, prefix: &str, out: &mut Vec<Setting>) {
    match value {
        serde_yaml::Value::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                let key = key.as_str().map(str::to_string).unwrap_or_else(|| format!("{:?}", key));
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_settings(child, &path, out);
            }
        }
        _ => out.push(Setting {
            path: prefix.to_string(),
            value: render_scalar(value),
            note: setting_note(prefix, value),
        }),
    }
}

fn render_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Mapping(_) => "{}".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Human hint for interval, timeout and protocol toggle settings
fn setting_note(path: &str, value: &serde_yaml::Value) -> Option<String> {
    let key = path.rsplit('.').next().unwrap_or(path);
    if key.ends_with("_secs") {
        return value.as_u64().map(humanize_secs);
    }
    if key.ends_with("_ms") {
        return value.as_u64().map(|ms| {
            if ms >= 1000 && ms % 1000 == 0 {
                humanize_secs(ms / 1000)
            } else {
                format!("{}ms", ms)
            }
        });
    }
    if key == "protocols" && value.as_mapping().map_or(false, |m| m.is_empty()) {
        return Some("every protocol enabled".to_string());
    }
    if path.starts_with("catalog.protocols.") && key == "enabled" && value.as_bool() == Some(false) {
        return Some("launches refused with protocol_disabled".to_string());
    }
    None
}

fn humanize_secs(secs: u64) -> String {
    match secs {
        s if s >= 3600 && s % 3600 == 0 => format!("{}h", s / 3600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

/// What kind of broker setting a path holds
fn setting_kind(path: &str, value: &serde_yaml::Value) -> &'static str {
    let key = path.rsplit('.').next().unwrap_or(path);
    match value {
        serde_yaml::Value::Mapping(_) => "section",
        serde_yaml::Value::Number(_) if key.ends_with("_secs") => "interval (seconds)",
        serde_yaml::Value::Number(_) if key.ends_with("_ms") => "timeout (milliseconds)",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) if key.ends_with("_path") || key == "directory" => "path",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Null => "unset",
        _ => "value",
    }
}

fn print_setting(setting: &Setting, label: &str) {
    let value = if setting.value.contains('/') {
        setting.value.green()
    } else {
        setting.value.yellow()
    };
    match &setting.note {
        Some(note) => println!("  {} = {}  {}", label.cyan(), value, format!("({})", note).dimmed()),
        None => println!("  {} = {}", label.cyan(), value),
    }
}

/// Print the configuration one section at a time
fn print_config_text(config: &serde_yaml::Value) {
    println!("{}", "=== Broker Configuration ===".bold());
    println!();

    let sections = match config {
        serde_yaml::Value::Mapping(map) => map,
        _ => {
            println!("{}", "No configuration loaded".yellow());
            return;
        }
    };

    for (name, values) in sections {
        let name = name.as_str().unwrap_or("?");
        println!("{}", format!("[{}]", name).cyan().bold());

        let mut settings = Vec::new();
        flatten_settings(values, name, &mut settings);
        for setting in &settings {
            let label = setting
                .path
                .strip_prefix(name)
                .map(|rest| rest.trim_start_matches('.'))
                .unwrap_or(&setting.path);
            print_setting(setting, label);
        }
        println!();
    }

    println!("{}", format!("Total sections: {}", sections.len()).green());
}

/// Print a specific configuration value
fn print_config_value(path: &str, value: &serde_yaml::Value) {
    println!("{}", "=== Configuration Value ===".bold());
    println!();
    println!("{}: {}", "Path".bold(), path.cyan());
    println!("{}: {}", "Type".bold(), setting_kind(path, value).yellow());
    println!();
    println!("{}:", "Value".bold());

    let mut settings = Vec::new();
    flatten_settings(value, path, &mut settings);
    for setting in &settings {
        print_setting(setting, &setting.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_config_path() {
        let config: serde_yaml::Value = serde_yaml::from_str(
            r#"
            database:
                database_path: "/data/broker.db"
                max_connections: 10
            sessions:
                grace_period_secs: 300
        "#,
        )
        .unwrap();

        let result = navigate_config_path(&config, &["database", "database_path"]).unwrap();
        assert_eq!(
            result,
            serde_yaml::Value::String("/data/broker.db".to_string())
        );

        let result = navigate_config_path(&config, &["sessions", "grace_period_secs"]).unwrap();
        assert_eq!(result, serde_yaml::Value::Number(300.into()));

        let section = navigate_config_path(&config, &["sessions"]).unwrap();
        assert!(section.is_mapping());

        let err = navigate_config_path(&config, &["invalid"]).unwrap_err();
        assert!(err.to_string().contains("section 'invalid' not found"));
        let err = navigate_config_path(&config, &["database", "invalid"]).unwrap_err();
        assert!(err.to_string().contains("'database.invalid' not found"));
        assert!(navigate_config_path(&config, &["database", "max_connections", "x"]).is_err());
        assert!(navigate_config_path(&config, &[]).is_err());
    }

    #[test]
    fn test_default_config_is_navigable() {
        let config = serde_yaml::to_value(broker::BrokerConfig::default()).unwrap();
        let value = navigate_config_path(&config, &["access", "decision_timeout_ms"]).unwrap();
        assert_eq!(value, serde_yaml::Value::Number(2000.into()));
    }

    #[test]
    fn test_flatten_default_config() {
        let config = serde_yaml::to_value(broker::BrokerConfig::default()).unwrap();
        let mut settings = Vec::new();
        flatten_settings(&config, "", &mut settings);

        let grace = settings
            .iter()
            .find(|s| s.path == "sessions.grace_period_secs")
            .unwrap();
        assert_eq!(grace.value, "300");
        assert_eq!(grace.note.as_deref(), Some("5m"));

        let timeout = settings
            .iter()
            .find(|s| s.path == "access.decision_timeout_ms")
            .unwrap();
        assert_eq!(timeout.note.as_deref(), Some("2s"));

        let protocols = settings
            .iter()
            .find(|s| s.path == "catalog.protocols")
            .unwrap();
        assert_eq!(protocols.value, "{}");
        assert_eq!(protocols.note.as_deref(), Some("every protocol enabled"));

        // Sections are flattened, never emitted as leaves
        assert!(settings.iter().all(|s| s.path.contains('.')));
    }

    #[test]
    fn test_disabled_protocol_note() {
        let section: serde_yaml::Value =
            serde_yaml::from_str("vnc:\n  enabled: false\nssh:\n  enabled: true\n").unwrap();
        let mut settings = Vec::new();
        flatten_settings(&section, "catalog.protocols", &mut settings);

        assert_eq!(
            settings,
            vec![
                Setting {
                    path: "catalog.protocols.vnc.enabled".into(),
                    value: "false".into(),
                    note: Some("launches refused with protocol_disabled".into()),
                },
                Setting {
                    path: "catalog.protocols.ssh.enabled".into(),
                    value: "true".into(),
                    note: None,
                },
            ]
        );
    }

    #[test]
    fn test_humanize_secs() {
        assert_eq!(humanize_secs(45), "45s");
        assert_eq!(humanize_secs(60), "1m");
        assert_eq!(humanize_secs(90), "90s");
        assert_eq!(humanize_secs(3600), "1h");
        assert_eq!(humanize_secs(5400), "90m");
    }

    #[test]
    fn test_setting_kind() {
        let secs = serde_yaml::Value::Number(60.into());
        assert_eq!(setting_kind("sessions.cleanup_interval_secs", &secs), "interval (seconds)");
        assert_eq!(setting_kind("access.decision_timeout_ms", &secs), "timeout (milliseconds)");
        assert_eq!(setting_kind("database.max_connections", &secs), "number");

        let path = serde_yaml::Value::String("data/broker.db".into());
        assert_eq!(setting_kind("database.database_path", &path), "path");
        assert_eq!(setting_kind("logging.directory", &path), "path");
        assert_eq!(setting_kind("logging.level", &path), "string");
        assert_eq!(
            setting_kind("sessions", &serde_yaml::Value::Mapping(Default::default())),
            "section"
        );
    }
}
