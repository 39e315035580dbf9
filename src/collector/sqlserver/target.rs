//! Connection targets.

use serde::{Deserialize, Serialize};

/// Keys that name the server in an ADO.NET style connection string.
const SERVER_KEYS: &[&str] = &["server", "data source", "address", "addr", "network address"];

/// A SQL Server connection string, e.g.
/// `Server=10.0.0.5;Port=1433;User Id=monitor;Password=...;`.
///
/// The string is passed to the driver verbatim. Only [`label`](Target::label)
/// is ever logged or used as a tag, so credentials never leave this type.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self(connection_string.into())
    }

    /// The raw connection string.
    pub fn connection_string(&self) -> &str {
        &self.0
    }

    /// Credential-free `host[:port]` label.
    ///
    /// Falls back to `"unknown"` when the string names no server.
    pub fn label(&self) -> String {
        let mut host = None;
        let mut port = None;

        for pair in self.0.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if SERVER_KEYS.contains(&key.as_str()) {
                host = Some(value.trim_start_matches("tcp:"));
            } else if key == "port" {
                port = Some(value);
            }
        }

        match (host, port) {
            // `host,port` already carries the port.
            (Some(h), _) if h.contains(',') => h.replacen(',', ":", 1),
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => "unknown".to_string(),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Target").field(&self.label()).finish()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_with_port() {
        let t = Target::new("Server=192.168.1.10;Port=1433;User Id=sa;Password=secret;");
        assert_eq!(t.label(), "192.168.1.10:1433");
    }

    #[test]
    fn test_label_variants() {
        assert_eq!(Target::new("Server=.;app name=agent;log=1;").label(), ".");
        assert_eq!(
            Target::new("Data Source=tcp:db.local,1444;User ID=x").label(),
            "db.local:1444"
        );
        assert_eq!(Target::new("user id=x;password=y").label(), "unknown");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let t = Target::new("Server=db;Password=hunter2;");
        let debug = format!("{t:?}");
        assert!(!debug.contains("hunter2"));
        assert_eq!(debug, "Target(\"db\")");
        assert!(!t.to_string().contains("hunter2"));
    }
}
