//! Query definitions and built-in scripts.

use serde::{Deserialize, Serialize};

/// Name of the built-in transaction log backup script.
pub const LOG_BACKUP_SIZE_SCRIPT_NAME: &str = "SQLServerLogBackupSize";

/// Log backups taken in the last 24 hours, per database.
///
/// Emits one aggregated row per database: the instance and database names are
/// tags, the size and count are fields.
pub const LOG_BACKUP_SIZE_SCRIPT: &str = r"
SET DEADLOCK_PRIORITY -10;
SET NOCOUNT ON;

SELECT
    'sqlserver_log_backup' AS [measurement],
    REPLACE(@@SERVERNAME, '\', ':') AS [sql_instance],
    d.[name] AS [database_name],
    CAST(ISNULL(SUM(b.[backup_size]), 0) / 1048576.0 AS float) AS [log_backup_size_mb],
    CAST(COUNT(b.[backup_set_id]) AS int) AS [log_backup_count]
FROM sys.databases AS d
LEFT JOIN msdb.dbo.backupset AS b
    ON b.[database_name] = d.[name]
    AND b.[type] = 'L'
    AND b.[backup_finish_date] >= DATEADD(HOUR, -24, GETDATE())
WHERE d.[database_id] > 4
GROUP BY d.[name];
";

/// A named script and how its rows become metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Identifier used in logs and errors.
    #[serde(rename = "name")]
    pub script_name: String,
    /// T-SQL executed verbatim.
    pub script: String,
    /// `true`: one `value` field per row. `false`: every non-string column is a field.
    #[serde(default)]
    pub result_by_row: bool,
    /// Column names of the result set, filled in after execution.
    #[serde(skip)]
    pub ordered_columns: Vec<String>,
}

impl Query {
    pub fn new(
        script_name: impl Into<String>,
        script: impl Into<String>,
        result_by_row: bool,
    ) -> Self {
        Self {
            script_name: script_name.into(),
            script: script.into(),
            result_by_row,
            ordered_columns: Vec::new(),
        }
    }

    /// The built-in log backup size query (aggregated mode).
    pub fn log_backup_size() -> Self {
        Self::new(LOG_BACKUP_SIZE_SCRIPT_NAME, LOG_BACKUP_SIZE_SCRIPT, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_query() {
        let q = Query::log_backup_size();
        assert_eq!(q.script_name, LOG_BACKUP_SIZE_SCRIPT_NAME);
        assert!(!q.result_by_row);
        assert!(q.ordered_columns.is_empty());
        assert!(q.script.contains("[measurement]"));
    }

    #[test]
    fn test_query_from_yaml() {
        let q: Query = serde_yaml::from_str(
            "name: waits\nscript: SELECT 'waits' AS measurement, 1 AS value\nresult_by_row: true\n",
        )
        .unwrap();
        assert_eq!(q.script_name, "waits");
        assert!(q.result_by_row);
    }
}
