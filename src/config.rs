use std::path::PathBuf;

pub const DEFAULT_FROM_EMAIL: &str = "webmaster@localhost";

/// Engine configuration
///
/// Built with setters, or read from `MEMOFORMS_*` environment variables.
#[derive(Debug, Clone)]
pub struct FormsConfig {
    /// Sender address used by email handlers
    pub default_from_email: String,

    /// Where definitions are snapshotted, if anywhere
    pub snapshot_path: Option<PathBuf>,

    /// Write a snapshot after every definition change
    pub autosave: bool,

    /// Fail template rendering on undefined variables instead of rendering
    /// them empty
    pub strict_templates: bool,
}

impl FormsConfig {
    pub fn new() -> Self {
        Self {
            default_from_email: DEFAULT_FROM_EMAIL.to_string(),
            snapshot_path: None,
            autosave: false,
            strict_templates: false,
        }
    }

    /// Set the sender address for outgoing mail
    pub fn default_from_email(mut self, address: &str) -> Self {
        self.default_from_email = address.to_string();
        self
    }

    /// Set the snapshot file
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Enable or disable autosave
    pub fn autosave(mut self, enabled: bool) -> Self {
        self.autosave = enabled;
        self
    }

    pub fn strict_templates(mut self, enabled: bool) -> Self {
        self.strict_templates = enabled;
        self
    }

    /// Read configuration from the environment
    ///
    /// Recognised variables:
    /// - `MEMOFORMS_DEFAULT_FROM_EMAIL`
    /// - `MEMOFORMS_SNAPSHOT_PATH`
    /// - `MEMOFORMS_AUTOSAVE` (`1`/`true`/`yes`)
    /// - `MEMOFORMS_STRICT_TEMPLATES` (`1`/`true`/`yes`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(address) = lookup("MEMOFORMS_DEFAULT_FROM_EMAIL")
            && !address.trim().is_empty()
        {
            config.default_from_email = address.trim().to_string();
        }
        if let Some(path) = lookup("MEMOFORMS_SNAPSHOT_PATH")
            && !path.trim().is_empty()
        {
            config.snapshot_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(flag) = lookup("MEMOFORMS_AUTOSAVE") {
            config.autosave = parse_flag(&flag);
        }
        if let Some(flag) = lookup("MEMOFORMS_STRICT_TEMPLATES") {
            config.strict_templates = parse_flag(&flag);
        }

        config
    }
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
