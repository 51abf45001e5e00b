//! Output formatting utilities

use crate::config::Config;
use crate::error::Result;
use crate::metrics::Summary;
use serde_json::json;

/// Pretty printer for rowaudit output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the audited table list
    pub fn print_table_list(tables: &[String]) {
        print!("{}", Self::render_table_list(tables));
    }

    pub fn render_table_list(tables: &[String]) -> String {
        if tables.is_empty() {
            return "No tables found.\n".to_string();
        }

        let mut out = format!("📋 Tables ({}):\n", tables.len());
        for (i, table) in tables.iter().enumerate() {
            let prefix = if i == tables.len() - 1 { "└─" } else { "├─" };
            out.push_str(&format!("{} {}\n", prefix, table));
        }
        out
    }

    /// Print the effective configuration
    pub fn print_config(config: &Config) {
        print!("{}", Self::render_config(config));
    }

    pub fn render_config(config: &Config) -> String {
        let mut out = String::from("⚙️  rowaudit configuration\n");
        out.push_str(&format!(
            "├─ Audit store: {} ({})\n",
            config.audit.connection_string, config.audit.db_type
        ));
        out.push_str(&format!(
            "├─ Target: {} ({})\n",
            config.target.connection_string, config.target.db_type
        ));
        out.push_str(&format!("├─ Key separator: '{}'\n", config.key_separator));
        out.push_str(&format!("├─ Workers: {}\n", config.workers));
        out.push_str(&format!(
            "├─ Table timeout: {}\n",
            config
                .table_timeout_seconds
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "none".to_string())
        ));

        match &config.target.tables {
            None => out.push_str("└─ Tables: all\n"),
            Some(tables) => {
                out.push_str(&format!("└─ Tables: {}\n", tables.len()));
                for (i, table) in tables.iter().enumerate() {
                    let prefix = if i == tables.len() - 1 { "   └─" } else { "   ├─" };
                    let keys = config
                        .key_columns(&table.table_name)
                        .map(|k| k.join(", "))
                        .unwrap_or_else(|| "keyless".to_string());
                    out.push_str(&format!("{} {} [{}]\n", prefix, table.table_name, keys));
                }
            }
        }

        out
    }

    /// Print an audit run summary
    pub fn print_summary(summary: &Summary) {
        print!("{}", Self::render_summary(summary));
    }

    pub fn render_summary(summary: &Summary) -> String {
        let mut out = String::from("📊 rowaudit summary\n");

        if !summary.tables.is_empty() {
            out.push_str("├─ Tables:\n");
            for (i, table) in summary.tables.iter().enumerate() {
                let prefix = if i == summary.tables.len() - 1 { "│  └─" } else { "│  ├─" };
                let marker = if table.changes > 0 { "❌" } else { "✅" };
                out.push_str(&format!("{} {} {}: {} changes", prefix, marker, table.table, table.changes));
                if table.unseen > 0 {
                    out.push_str(&format!(" ({} not seen)", table.unseen));
                }
                out.push('\n');
            }
        }

        out.push_str(&format!("├─ Database changes: {}\n", summary.database_changes));
        out.push_str(&format!("├─ Rows processed: {}\n", summary.rows_processed));

        match &summary.execution_timestamp {
            Some(timestamp) => {
                out.push_str(&format!("├─ Execution time: {}\n", summary.execution_time));
                out.push_str(&format!("└─ History saved at: {}\n", timestamp));
            }
            None => out.push_str(&format!("└─ Execution time: {}\n", summary.execution_time)),
        }

        out
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    pub fn format_table_list(tables: &[String]) -> Result<String> {
        let json = json!({
            "count": tables.len(),
            "tables": tables,
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}
