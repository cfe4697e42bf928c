//! Database dumps
//!
//! A [`Dumper`] writes one complete, self-contained snapshot to a local file.
//! [`CommandDumper`] runs the database's own dump tool (or any shell command)
//! and captures its standard output; [`Compressed`] gzips another dumper's
//! output. On failure no file is left at the target path.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SpinError, SpinResult};

/// Produces a database snapshot file
pub trait Dumper {
    fn dump_to_file(&self, path: &Path) -> SpinResult<()>;
}

impl<D: Dumper + ?Sized> Dumper for Box<D> {
    fn dump_to_file(&self, path: &Path) -> SpinResult<()> {
        (**self).dump_to_file(path)
    }
}

/// How a dump is archived before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMethod {
    /// Plain SQL
    None,
    /// Gzip-compressed SQL
    #[default]
    Gzip,
}

impl ArchiveMethod {
    /// File extension for dumps archived with this method
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => ".sql",
            Self::Gzip => ".sql.gz",
        }
    }
}

impl fmt::Display for ArchiveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

impl FromStr for ArchiveMethod {
    type Err = SpinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            other => Err(SpinError::Config(format!(
                "Invalid archive method '{}' (expected 'none' or 'gzip')",
                other
            ))),
        }
    }
}

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Mysql,
    Postgres,
    Sqlite,
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql => write!(f, "mysql"),
            Self::Postgres => write!(f, "postgres"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DatabaseKind {
    type Err = SpinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(SpinError::Config(format!("Invalid database type '{}'", other))),
        }
    }
}

/// Connection details handed to the dump tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConnection {
    /// Database name, or the database file for SQLite
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Runs an external program and stores its standard output as the dump
#[derive(Debug, Clone)]
pub struct CommandDumper {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CommandDumper {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            envs: Vec::new(),
        }
    }

    /// Run `command` through `sh -c`
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new("sh", vec!["-c".to_string(), command.into()])
    }

    /// The engine's standard dump tool for `connection`
    ///
    /// Passwords travel through the environment, never the argument list.
    pub fn for_database(kind: DatabaseKind, connection: &DatabaseConnection) -> SpinResult<Self> {
        if connection.name.trim().is_empty() {
            return Err(SpinError::Config(format!(
                "A database name is required to dump {}",
                kind
            )));
        }

        let mut args = Vec::new();
        let mut envs = Vec::new();
        let program = match kind {
            DatabaseKind::Mysql => {
                args.push("--single-transaction".to_string());
                if let Some(host) = &connection.host {
                    args.push(format!("--host={}", host));
                }
                if let Some(port) = connection.port {
                    args.push(format!("--port={}", port));
                }
                if let Some(user) = &connection.username {
                    args.push(format!("--user={}", user));
                }
                if let Some(password) = &connection.password {
                    envs.push(("MYSQL_PWD".to_string(), password.clone()));
                }
                args.push(connection.name.clone());
                "mysqldump"
            }
            DatabaseKind::Postgres => {
                args.push("--no-password".to_string());
                if let Some(host) = &connection.host {
                    args.push(format!("--host={}", host));
                }
                if let Some(port) = connection.port {
                    args.push(format!("--port={}", port));
                }
                if let Some(user) = &connection.username {
                    args.push(format!("--username={}", user));
                }
                if let Some(password) = &connection.password {
                    envs.push(("PGPASSWORD".to_string(), password.clone()));
                }
                args.push(connection.name.clone());
                "pg_dump"
            }
            DatabaseKind::Sqlite => {
                args.push(connection.name.clone());
                args.push(".dump".to_string());
                "sqlite3"
            }
        };

        Ok(Self {
            program: program.to_string(),
            args,
            envs,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }
}

impl Dumper for CommandDumper {
    fn dump_to_file(&self, path: &Path) -> SpinResult<()> {
        let file = File::create(path).map_err(|e| {
            SpinError::Dump(format!("Failed to create {}: {}", path.display(), e))
        })?;

        debug!(program = %self.program, path = %path.display(), "running dump");
        let output = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .output();

        let failure = match output {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim())
            }
            Err(e) => format!("Failed to run {}: {}", self.program, e),
        };

        let _ = fs::remove_file(path);
        Err(SpinError::Dump(failure))
    }
}

/// Gzip-compresses the output of another dumper
#[derive(Debug, Clone)]
pub struct Compressed<D> {
    inner: D,
}

impl<D: Dumper> Compressed<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: Dumper> Dumper for Compressed<D> {
    fn dump_to_file(&self, path: &Path) -> SpinResult<()> {
        let mut raw_name = path.as_os_str().to_owned();
        raw_name.push(".raw");
        let raw_path = PathBuf::from(raw_name);

        self.inner.dump_to_file(&raw_path)?;

        let compress = || -> io::Result<()> {
            let mut reader = BufReader::new(File::open(&raw_path)?);
            let writer = BufWriter::new(File::create(path)?);
            let mut encoder = GzEncoder::new(writer, Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?.flush()
        };

        let result = compress();
        let _ = fs::remove_file(&raw_path);

        result.map_err(|e| {
            let _ = fs::remove_file(path);
            SpinError::Dump(format!("Failed to compress dump: {}", e))
        })
    }
}
