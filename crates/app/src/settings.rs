//! Handles settings for the application. Configuration is written in
//! `settings.toml` and can be overridden with `DEFTER__*` environment
//! variables (e.g. `DEFTER__APP__LEVEL=debug`).
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub ttl_secs: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

/// One tenant: every company has its own database.
#[derive(Debug, Deserialize)]
pub struct Company {
    pub name: String,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub companies: Vec<Company>,
}

impl Settings {
    /// Loads `<name>.toml` (any format `config` knows) plus the environment.
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        Self::from_config(
            Config::builder()
                .add_source(File::with_name(name))
                .add_source(Environment::with_prefix("DEFTER").separator("__")),
        )
    }

    fn from_config(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Settings {
        Settings::from_config(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
            .unwrap()
    }

    #[test]
    fn companies_are_read_in_order() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [cache]
            ttl_secs = 60

            [[companies]]
            name = "Merkez"
            database = { sqlite = "merkez.db" }

            [[companies]]
            name = "Sube"
            database = "memory"
            "#,
        );

        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.cache.ttl_secs, 60);
        assert_eq!(settings.companies.len(), 2);
        assert_eq!(
            settings.companies[0].database,
            Database::Sqlite("merkez.db".to_string())
        );
        assert_eq!(settings.companies[1].database, Database::Memory);
    }

    #[test]
    fn sections_fall_back_to_defaults() {
        let settings = parse("");
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert!(settings.companies.is_empty());
    }
}
