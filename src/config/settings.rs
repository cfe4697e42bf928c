//! Settings for spindb
//!
//! Settings live in a JSON file; every field has a default, so a missing file
//! or a partial one is fine. `SPINDB_*` environment variables override the
//! file. [`Settings::validate`] checks everything once, up front, and turns the
//! settings into the values a run works with.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::paths::SpinPaths;
use crate::dump::{ArchiveMethod, CommandDumper, Compressed, DatabaseConnection, DatabaseKind, Dumper};
use crate::error::{SpinError, SpinResult};
use crate::rotation::{AnchoredTier, KeyLayout, PathTemplate, RetentionPolicy, Tier};

/// Retention tier settings
///
/// Counts: 0 disables a tier, a negative count keeps matching backups forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Number of daily backups to keep
    #[serde(default = "default_keep_daily")]
    pub keep_daily: i32,

    /// Number of weeks to keep weekly backups for
    #[serde(default)]
    pub keep_weekly: i32,

    /// Day of week kept by the weekly tier (0 = Sunday)
    #[serde(default)]
    pub keep_weekly_day: u32,

    /// Number of months to keep monthly backups for
    #[serde(default = "default_keep_monthly")]
    pub keep_monthly: i32,

    /// Day of month kept by the monthly tier (starts at 1)
    #[serde(default = "default_anchor_day")]
    pub keep_monthly_day: u32,

    /// Number of years to keep yearly backups for
    #[serde(default = "default_keep_yearly")]
    pub keep_yearly: i32,

    /// Day of year kept by the yearly tier (1 = 1 January)
    #[serde(default = "default_anchor_day")]
    pub keep_yearly_day: u32,
}

fn default_keep_daily() -> i32 {
    7
}

fn default_keep_monthly() -> i32 {
    4
}

fn default_keep_yearly() -> i32 {
    -1
}

fn default_anchor_day() -> u32 {
    1
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            keep_daily: default_keep_daily(),
            keep_weekly: 0,
            keep_weekly_day: 0,
            keep_monthly: default_keep_monthly(),
            keep_monthly_day: default_anchor_day(),
            keep_yearly: default_keep_yearly(),
            keep_yearly_day: default_anchor_day(),
        }
    }
}

impl RetentionSettings {
    /// Build the retention policy, checking anchor ranges
    pub fn policy(&self) -> SpinResult<RetentionPolicy> {
        RetentionPolicy::new(
            Tier::new(self.keep_daily),
            AnchoredTier::new(self.keep_weekly, self.keep_weekly_day),
            AnchoredTier::new(self.keep_monthly, self.keep_monthly_day),
            AnchoredTier::new(self.keep_yearly, self.keep_yearly_day),
        )
    }
}

/// Where backups are stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding buckets (defaults to the `store` directory next to the settings)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Bucket name; required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// Which database to dump and how
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database engine
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<DatabaseKind>,

    /// Connection details
    #[serde(flatten)]
    pub connection: DatabaseConnection,

    /// Shell command printing the dump to stdout; takes precedence over `type`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_command: Option<String>,
}

/// Everything a run needs, validated
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub layout: KeyLayout,
    pub policy: RetentionPolicy,
    /// Directory of the bucket backups are stored in
    pub bucket_dir: PathBuf,
}

/// User settings for spindb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Key template; must contain `{date}`, may contain `{time}`, `{baseurl}`,
    /// `{basepath}` and `{ext}`
    #[serde(default = "default_path")]
    pub path: String,

    /// Value of `{baseurl}`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of `{basepath}`; must be set when the template uses it
    #[serde(default)]
    pub base_path: String,

    /// Format of `{date}` (strftime)
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Format of `{time}` (strftime); dot-separated to stay key-safe
    #[serde(default = "default_time_format")]
    pub time_format: String,

    /// Archive method; determines `{ext}`
    #[serde(default)]
    pub archive: ArchiveMethod,

    #[serde(default)]
    pub retention: RetentionSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_path() -> String {
    "{baseurl}/db_{date}{ext}".to_string()
}

fn default_base_url() -> String {
    "backups".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_time_format() -> String {
    "%H.%M.%S".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            path: default_path(),
            base_url: default_base_url(),
            base_path: String::new(),
            date_format: default_date_format(),
            time_format: default_time_format(),
            archive: ArchiveMethod::default(),
            retention: RetentionSettings::default(),
            storage: StorageSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or use default settings if the file doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self, SpinError> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| SpinError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| SpinError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), SpinError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SpinError::Io(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| SpinError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| SpinError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) -> SpinResult<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Apply `SPINDB_*` overrides read through `lookup`
    ///
    /// Empty values count as unset. Numeric variables that do not parse keep
    /// their current value.
    pub fn apply_env<F>(&mut self, lookup: F) -> SpinResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = var("SPINDB_PATH") {
            self.path = path;
        }
        if let Some(base_url) = var("SPINDB_BASEURL") {
            self.base_url = base_url;
        }
        if let Some(base_path) = var("SPINDB_BASEPATH") {
            self.base_path = base_path;
        }
        if let Some(format) = var("SPINDB_DATE_FORMAT") {
            self.date_format = format;
        }
        if let Some(format) = var("SPINDB_TIME_FORMAT") {
            self.time_format = format;
        }
        if let Some(method) = var("SPINDB_ARCHIVE") {
            self.archive = method.parse()?;
        }

        if let Some(bucket) = var("SPINDB_BUCKET").or_else(|| var("AWS_S3_BUCKET")) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(root) = var("SPINDB_STORE_ROOT") {
            self.storage.root = Some(PathBuf::from(root));
        }

        let retention = &mut self.retention;
        set_numeric(&mut retention.keep_daily, var("SPINDB_KEEP_DAILY"));
        set_numeric(&mut retention.keep_weekly, var("SPINDB_KEEP_WEEKLY"));
        set_numeric(&mut retention.keep_weekly_day, var("SPINDB_KEEP_WEEKLY_DAY"));
        set_numeric(&mut retention.keep_monthly, var("SPINDB_KEEP_MONTHLY"));
        set_numeric(&mut retention.keep_monthly_day, var("SPINDB_KEEP_MONTHLY_DAY"));
        set_numeric(&mut retention.keep_yearly, var("SPINDB_KEEP_YEARLY"));
        set_numeric(&mut retention.keep_yearly_day, var("SPINDB_KEEP_YEARLY_DAY"));

        let database = &mut self.database;
        if let Some(kind) = var("SPINDB_DB_TYPE") {
            database.kind = Some(kind.parse()?);
        }
        if let Some(name) = var("SPINDB_DB_NAME") {
            database.connection.name = name;
        }
        if let Some(host) = var("SPINDB_DB_HOST") {
            database.connection.host = Some(host);
        }
        if let Some(port) = var("SPINDB_DB_PORT").and_then(|p| p.trim().parse().ok()) {
            database.connection.port = Some(port);
        }
        if let Some(user) = var("SPINDB_DB_USER") {
            database.connection.username = Some(user);
        }
        if let Some(password) = var("SPINDB_DB_PASSWORD") {
            database.connection.password = Some(password);
        }
        if let Some(command) = var("SPINDB_DUMP_COMMAND") {
            database.dump_command = Some(command);
        }

        Ok(())
    }

    /// Check the settings and build the runtime configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the template lacks `{date}`, a format
    /// or anchor is invalid, or no bucket is configured.
    pub fn validate(&self, paths: &SpinPaths) -> SpinResult<RuntimeConfig> {
        let template = PathTemplate::new(self.path.as_str())?;
        let layout = KeyLayout::new(
            &template,
            &[
                ("baseurl", self.base_url.as_str()),
                ("basepath", self.base_path.as_str()),
                ("ext", self.archive.extension()),
            ],
            &self.date_format,
            &self.time_format,
        )?;
        let policy = self.retention.policy()?;

        let bucket = self
            .storage
            .bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| SpinError::Config("No storage bucket provided".into()))?;
        if bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(SpinError::Config(format!("Invalid bucket name '{}'", bucket)));
        }

        let root = self.storage.root.clone().unwrap_or_else(|| paths.store_dir());

        Ok(RuntimeConfig {
            layout,
            policy,
            bucket_dir: root.join(bucket),
        })
    }

    /// Build the dumper for the configured database, compressed per `archive`
    pub fn dumper(&self) -> SpinResult<Box<dyn Dumper>> {
        let base = match (&self.database.dump_command, self.database.kind) {
            (Some(command), _) => CommandDumper::shell(command.as_str()),
            (None, Some(kind)) => CommandDumper::for_database(kind, &self.database.connection)?,
            (None, None) => {
                return Err(SpinError::Config(
                    "No database configured: set database.type or database.dump_command".into(),
                ))
            }
        };

        let dumper: Box<dyn Dumper> = match self.archive {
            ArchiveMethod::None => Box::new(base),
            ArchiveMethod::Gzip => Box::new(Compressed::new(base)),
        };
        Ok(dumper)
    }
}

fn set_numeric<T: FromStr>(target: &mut T, value: Option<String>) {
    if let Some(parsed) = value.and_then(|v| v.trim().parse().ok()) {
        *target = parsed;
    }
}
