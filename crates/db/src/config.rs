use crate::error::DbError;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection string (`DATABASE_URL`, required).
    pub database_url: String,
    /// Pool size (default: `20`).
    pub max_connections: u32,
    /// Seconds to wait for a free connection (default: `5`).
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 20,
            acquire_timeout_secs: 5,
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `DATABASE_URL`            | —       |
    /// | `DB_MAX_CONNECTIONS`      | `20`    |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `5`     |
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DbError::Config("DATABASE_URL must be set".to_string()))?;

        let mut config = Self::new(database_url);

        if let Some(raw) = lookup("DB_MAX_CONNECTIONS") {
            config.max_connections = raw.parse().map_err(|_| {
                DbError::Config(format!("DB_MAX_CONNECTIONS must be a valid u32, got '{raw}'"))
            })?;
        }

        if let Some(raw) = lookup("DB_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout_secs = raw.parse().map_err(|_| {
                DbError::Config(format!(
                    "DB_ACQUIRE_TIMEOUT_SECS must be a valid u64, got '{raw}'"
                ))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = DbConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/cflows")]))
            .unwrap();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.acquire_timeout_secs, 5);
    }

    #[test]
    fn database_url_required() {
        assert!(DbConfig::from_lookup(lookup(&[])).is_err());
        assert!(DbConfig::from_lookup(lookup(&[("DATABASE_URL", " ")])).is_err());
    }

    #[test]
    fn overrides_parsed() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/cflows"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout_secs, 30);
    }

    #[test]
    fn bad_numbers_rejected() {
        let result = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/cflows"),
            ("DB_MAX_CONNECTIONS", "many"),
        ]));
        assert!(matches!(result, Err(DbError::Config(msg)) if msg.contains("DB_MAX_CONNECTIONS")));
    }
}
