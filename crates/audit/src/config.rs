/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Audit run configuration loaded from environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditConfig {
    /// Slug of the single organization to audit; all organizations if `None`.
    pub organization: Option<String>,
    /// Also audit deactivated organizations (default: `false`).
    pub include_inactive: bool,
    pub log_format: LogFormat,
}

impl AuditConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `AUDIT_ORGANIZATION`     | all     |
    /// | `AUDIT_INCLUDE_INACTIVE` | `false` |
    /// | `LOG_FORMAT`             | `text`  |
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let organization = lookup("AUDIT_ORGANIZATION")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let include_inactive = match lookup("AUDIT_INCLUDE_INACTIVE") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                format!("AUDIT_INCLUDE_INACTIVE must be true or false, got '{raw}'")
            })?,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(format!("LOG_FORMAT must be text or json, got '{other}'")),
        };

        Ok(Self {
            organization,
            include_inactive,
            log_format,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}
