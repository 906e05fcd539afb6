//! kvpstore CLI - inspect and edit typed key-value datastore files

use clap::{Parser, Subcommand};
use kvpstore::config::{self, KvpConfig};
use kvpstore::ui::{self, TableBuilder};
use kvpstore::{Datastore, Value, ValueType};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kvpstore")]
#[command(version)]
#[command(about = "Inspect and edit kvpstore datastore files")]
#[command(long_about = r#"
kvpstore keeps typed values (string, bool, float, int) under string keys
in a SQLite file. This tool reads and writes those files directly.

Example usage:
  kvpstore init --app-name myapp
  kvpstore set volume 11 --type int
  kvpstore get volume
  kvpstore keys
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the datastore and write a config file pointing at it
    Init {
        /// Application name to record in the file
        #[arg(long)]
        app_name: Option<String>,

        /// Application file version to record
        #[arg(long)]
        app_version: Option<i64>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List all keys and their types
    Keys,

    /// Print the value of a key
    Get {
        key: String,

        /// Read the key as this type instead of its recorded one
        #[arg(short, long)]
        r#type: Option<ValueType>,
    },

    /// Write a value
    Set {
        key: String,

        value: String,

        /// Type to store the value as (string, bool, float, int)
        #[arg(short, long)]
        r#type: ValueType,
    },

    /// Remove a key whatever its type
    Remove { key: String },

    /// Show file metadata and per-type counts
    Info,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let file_config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| file_config.database_path());

    match cli.command {
        Commands::Init {
            app_name,
            app_version,
            force,
        } => {
            config::ensure_db_dir(&database)?;
            let store = Datastore::open_with(&database, &file_config.options)?;
            if let Some(name) = &app_name {
                store.set_app_name(name)?;
            }
            if let Some(version) = app_version {
                store.set_app_version(version)?;
            }
            store.close()?;

            let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
            let new_config = KvpConfig {
                database: Some(database.to_string_lossy().into_owned()),
                options: file_config.options.clone(),
            };
            config::write_config(&config_path, &new_config, force)?;
            tracing::info!("Initialized {:?} with config {:?}", database, config_path);

            if cli.json {
                emit(&serde_json::json!({
                    "database": database,
                    "config": config_path,
                }))?;
            } else {
                ui::success(&format!("Initialized datastore at {}", database.display()));
                ui::info("Config", &config_path.display().to_string());
            }
        }

        Commands::Keys => {
            let store = open_existing(&database, &file_config)?;
            let (keys, types) = store.keys_and_types()?;
            let mut entries: Vec<(String, ValueType)> = keys.into_iter().zip(types).collect();
            entries.sort();

            if cli.json {
                let list: Vec<_> = entries
                    .iter()
                    .map(|(key, ty)| serde_json::json!({ "key": key, "type": ty }))
                    .collect();
                emit(&serde_json::json!({ "keys": list }))?;
            } else if entries.is_empty() {
                ui::empty("No keys stored.");
            } else {
                let mut table = TableBuilder::new();
                for (key, ty) in &entries {
                    let value = store
                        .get_value(key)
                        .map(|v| v.to_string())
                        .unwrap_or_else(|e| format!("<{}>", e));
                    table.add_row(key, *ty, &value);
                }
                ui::header(&format!("{} ({} keys)", database.display(), table.len()));
                println!("{}", table.build());
            }
        }

        Commands::Get { key, r#type } => {
            let store = open_existing(&database, &file_config)?;
            let value = match r#type {
                Some(ValueType::String) => Value::String(store.get_string(&key)?),
                Some(ValueType::Bool) => Value::Bool(store.get_bool(&key)?),
                Some(ValueType::Float) => Value::Float(store.get_float(&key)?),
                Some(ValueType::Int) => Value::Int(store.get_int(&key)?),
                None => store.get_value(&key)?,
            };

            if cli.json {
                emit(&serde_json::json!({ "key": key, "value": value }))?;
            } else {
                ui::key_value(&key, &value);
            }
        }

        Commands::Set { key, value, r#type } => {
            let store = open_existing(&database, &file_config)?;
            let value = parse_value(r#type, &value)?;
            store.set_value(&key, value.clone())?;

            if cli.json {
                emit(&serde_json::json!({ "key": key, "value": value }))?;
            } else {
                ui::key_value(&key, &value);
            }
        }

        Commands::Remove { key } => {
            let store = open_existing(&database, &file_config)?;
            store.remove(&key)?;

            if cli.json {
                emit(&serde_json::json!({ "removed": key }))?;
            } else {
                ui::removed(&key);
            }
        }

        Commands::Info => {
            let store = open_existing(&database, &file_config)?;
            let version = store.format_version()?;
            let app_name = store.app_name()?;
            let app_version = store.app_version()?;
            let stats = store.stats()?;

            if cli.json {
                emit(&serde_json::json!({
                    "database": database,
                    "format_version": version,
                    "app_name": app_name,
                    "app_version": app_version,
                    "stats": stats,
                }))?;
            } else {
                ui::header(&database.display().to_string());
                ui::info("Format version", &version.to_string());
                ui::info("App name", app_name.as_deref().unwrap_or("-"));
                ui::info(
                    "App version",
                    &app_version.map_or_else(|| "-".to_string(), |v| v.to_string()),
                );
                ui::section("Rows");
                println!(
                    "{}",
                    ui::stats_table(&[
                        (ValueType::String, stats.strings),
                        (ValueType::Bool, stats.bools),
                        (ValueType::Float, stats.floats),
                        (ValueType::Int, stats.ints),
                    ])
                );
                ui::info("Total", &stats.total().to_string());
            }
        }
    }

    Ok(())
}

/// Open a datastore that must already exist; only `init` creates files.
fn open_existing(database: &Path, file_config: &KvpConfig) -> anyhow::Result<Datastore> {
    if !database.exists() {
        anyhow::bail!(
            "no datastore at {} (run `kvpstore init` first)",
            database.display()
        );
    }
    Ok(Datastore::open_with(database, &file_config.options)?)
}

fn parse_value(ty: ValueType, raw: &str) -> anyhow::Result<Value> {
    let value = match ty {
        ValueType::String => Value::String(raw.to_string()),
        ValueType::Bool => Value::Bool(match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => anyhow::bail!("'{}' is not a bool", raw),
        }),
        ValueType::Float => Value::Float(raw.parse()?),
        ValueType::Int => Value::Int(raw.parse()?),
    };
    Ok(value)
}

fn emit(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_per_type() {
        assert_eq!(parse_value(ValueType::Int, "11").unwrap(), Value::Int(11));
        assert_eq!(parse_value(ValueType::Float, "2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_value(ValueType::Bool, "Yes").unwrap(), Value::Bool(true));
        assert_eq!(
            parse_value(ValueType::String, "11").unwrap(),
            Value::String("11".to_string())
        );
        assert!(parse_value(ValueType::Bool, "maybe").is_err());
        assert!(parse_value(ValueType::Int, "1.5").is_err());
    }

    #[test]
    fn test_cli_parses_type_flag() {
        let cli = Cli::try_parse_from(["kvpstore", "set", "volume", "11", "--type", "int"]).unwrap();
        match cli.command {
            Commands::Set { key, value, r#type } => {
                assert_eq!(key, "volume");
                assert_eq!(value, "11");
                assert_eq!(r#type, ValueType::Int);
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn test_set_requires_type_flag() {
        assert!(Cli::try_parse_from(["kvpstore", "set", "volume", "11"]).is_err());
    }
}
