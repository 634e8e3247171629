//! Engine construction from database URLs.

use crate::connection::{OpenFlags, SqliteConfig, SqliteConnection};
use sqlmodel_plus_core::{Engine, Error, Result};
use std::sync::Arc;

const SCHEME: &str = "sqlite://";

/// A parsed `sqlite://` URL.
#[derive(Debug, Clone)]
pub struct SqliteUrl {
    pub config: SqliteConfig,
    pub echo: bool,
}

impl SqliteUrl {
    /// Parse an engine URL.
    ///
    /// | URL | database |
    /// |-----|----------|
    /// | `sqlite://` | in-memory |
    /// | `sqlite:///:memory:` | in-memory |
    /// | `sqlite:///data/app.db` | `data/app.db`, relative to the working directory |
    /// | `sqlite:////var/app.db` | `/var/app.db` |
    ///
    /// Recognized query options: `echo=true|false`, `timeout=<seconds>` and
    /// `mode=ro|rw|rwc`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix(SCHEME).ok_or_else(|| {
            let scheme = url.split_once("://").map_or(url, |(s, _)| s);
            Error::config(format!(
                "unsupported engine URL '{}': backend '{}' is not available, expected sqlite://",
                url, scheme
            ))
        })?;

        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut config = match location {
            "" | "/" | "/:memory:" => SqliteConfig::memory(),
            path if path.starts_with('/') => SqliteConfig::file(&path[1..]),
            _ => {
                return Err(Error::config(format!(
                    "invalid sqlite URL '{}': host names are not supported, use sqlite:///<path>",
                    url
                )));
            }
        };
        let mut echo = false;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "echo" => echo = parse_bool(url, value)?,
                "timeout" => {
                    let secs: f64 = value.parse().map_err(|_| {
                        Error::config(format!("invalid timeout '{}' in '{}'", value, url))
                    })?;
                    config = config.busy_timeout((secs * 1000.0) as u32);
                }
                "mode" => {
                    let flags = match value {
                        "ro" => OpenFlags::read_only(),
                        "rw" => OpenFlags::read_write(),
                        "rwc" => OpenFlags::create_read_write(),
                        _ => {
                            return Err(Error::config(format!(
                                "invalid mode '{}' in '{}', expected ro, rw or rwc",
                                value, url
                            )));
                        }
                    };
                    config = config.flags(flags);
                }
                _ => tracing::warn!(url, option = key, "ignoring unknown engine URL option"),
            }
        }

        Ok(Self { config, echo })
    }
}

fn parse_bool(url: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "invalid boolean '{}' in '{}'",
            value, url
        ))),
    }
}

/// Create an engine from a `sqlite://` URL.
///
/// Every session on the returned engine shares one connection, so an
/// in-memory database lives exactly as long as the engine.
pub fn create_engine(url: &str) -> Result<Engine> {
    let parsed = SqliteUrl::parse(url)?;
    let conn = SqliteConnection::open(&parsed.config)?;
    tracing::info!(url, path = %parsed.config.path, echo = parsed.echo, "created engine");
    Ok(Engine::new(url, Arc::new(conn)).with_echo(parsed.echo))
}

/// Create an engine from an explicit configuration.
pub fn create_engine_with(config: &SqliteConfig) -> Result<Engine> {
    let conn = SqliteConnection::open(config)?;
    let url = if config.is_memory() {
        format!("{}/:memory:", SCHEME)
    } else {
        format!("{}/{}", SCHEME, config.path)
    };
    tracing::info!(url = %url, "created engine");
    Ok(Engine::new(url, Arc::new(conn)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_urls() {
        for url in ["sqlite://", "sqlite:///:memory:", "sqlite:///"] {
            let parsed = SqliteUrl::parse(url).unwrap();
            assert!(parsed.config.is_memory(), "{url}");
            assert!(!parsed.echo);
        }
    }

    #[test]
    fn test_file_urls() {
        let parsed = SqliteUrl::parse("sqlite:///data/app.db").unwrap();
        assert_eq!(parsed.config.path, "data/app.db");

        let parsed = SqliteUrl::parse("sqlite:////var/lib/app.db").unwrap();
        assert_eq!(parsed.config.path, "/var/lib/app.db");
    }

    #[test]
    fn test_query_options() {
        let parsed = SqliteUrl::parse("sqlite://?echo=true&timeout=2.5").unwrap();
        assert!(parsed.echo);
        assert_eq!(parsed.config.busy_timeout_ms, 2500);

        let parsed = SqliteUrl::parse("sqlite:///x.db?mode=ro&echo=0").unwrap();
        assert!(parsed.config.flags.read_only);
        assert!(!parsed.echo);

        assert!(SqliteUrl::parse("sqlite://?echo=maybe").is_err());
        assert!(SqliteUrl::parse("sqlite://?mode=rx").is_err());
        assert!(SqliteUrl::parse("sqlite://?unknown=1").is_ok());
    }

    #[test]
    fn test_rejects_other_backends() {
        for url in ["postgresql://localhost/db", "mysql://x", "app.db", "sqlite://host/x.db"] {
            let err = SqliteUrl::parse(url).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{url}");
        }
    }

    #[test]
    fn test_create_engine_echo() {
        let engine = create_engine("sqlite:///:memory:?echo=true").unwrap();
        assert!(engine.echo());
        assert_eq!(engine.url(), "sqlite:///:memory:?echo=true");
        engine.execute_raw("CREATE TABLE t (x INTEGER)").unwrap();
    }
}
