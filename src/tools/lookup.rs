//! Lookup Sales Data tool.
//!
//! Steps for each call:
//!
//! 1. Materialize the parquet dataset as a table in a fresh in-memory
//!    DuckDB database and read its column names
//! 2. Ask the model for a SQL query over that table
//! 3. Run the query and render the rows as fixed-width text
//!
//! Failures come back as `"Error accessing data: ..."` text, tagged as a
//! failed call so the executor can tell them apart from real rows.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use duckdb::Connection;
use serde_json::json;
use tracing::{debug, warn};

use super::{required_str, ReportedFailure, Tool};
use crate::context::AgentContext;

pub const LOOKUP_ERROR_PREFIX: &str = "Error accessing data: ";

pub struct LookupSalesDataTool {
    ctx: Arc<AgentContext>,
}

impl LookupSalesDataTool {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }

    async fn lookup(&self, prompt: &str) -> Result<String> {
        let dataset = self.ctx.config.data.dataset_path.clone();
        let table = self.ctx.config.data.table_name.clone();

        let (conn, columns) = {
            let table = table.clone();
            tokio::task::spawn_blocking(move || open_dataset(&dataset, &table))
                .await
                .context("dataset loader panicked")??
        };

        let response = self
            .ctx
            .complete(sql_prompt(prompt, &columns, &table))
            .await
            .context("SQL generation failed")?;
        let sql = clean_sql(&response.content);
        debug!(%sql, "running generated query");

        tokio::task::spawn_blocking(move || run_query(&conn, &sql))
            .await
            .context("query runner panicked")?
    }
}

fn sql_prompt(prompt: &str, columns: &[String], table: &str) -> String {
    format!(
        "Generate an SQL query based on a prompt. Do not reply with anything besides the SQL query.\n\
         The prompt is: {}\n\n\
         The available columns are: {:?}\n\
         The table name is: {}",
        prompt, columns, table
    )
}

/// Remove markdown fences and trailing semicolons from generated SQL.
fn clean_sql(raw: &str) -> String {
    raw.trim()
        .replace("```sql", "")
        .replace("```", "")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string()
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Load the parquet file into `table` and return the connection with the
/// table's column names in declaration order.
fn open_dataset(path: &Path, table: &str) -> Result<(Connection, Vec<String>)> {
    let conn = Connection::open_in_memory().context("failed to open DuckDB")?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM read_parquet({})",
        quote_ident(table),
        quote_literal(&path.to_string_lossy())
    ))
    .with_context(|| format!("failed to load dataset {}", path.display()))?;

    let columns = {
        let mut stmt = conn.prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;
        let names = stmt.query_map(duckdb::params![table], |row| row.get::<_, String>(0))?;
        names.collect::<Result<Vec<_>, _>>()?
    };
    Ok((conn, columns))
}

/// Run `sql` and render its result. Every column is cast to text inside
/// DuckDB so dates and decimals print the way DuckDB formats them.
fn run_query(conn: &Connection, sql: &str) -> Result<String> {
    let header = {
        let mut stmt = conn.prepare(&format!("DESCRIBE {}", sql))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect::<Result<Vec<_>, _>>()?
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT COLUMNS(*)::VARCHAR FROM ({}\n) AS generated_query",
        sql
    ))?;
    let mut rows = stmt.query([])?;
    let mut cells = Vec::new();
    while let Some(row) = rows.next()? {
        let mut line = Vec::with_capacity(header.len());
        for i in 0..header.len() {
            let value: Option<String> = row.get(i)?;
            line.push(value.unwrap_or_else(|| "NULL".to_string()));
        }
        cells.push(line);
    }
    Ok(render_table(&header, &cells))
}

/// Fixed-width rendering with a leading row index, right-aligned cells.
pub fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return format!("Empty result\nColumns: [{}]", header.join(", "));
    }

    let index_width = (rows.len() - 1).to_string().len();
    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            rows.iter()
                .map(|r| r.get(i).map_or(0, |c| c.chars().count()))
                .max()
                .unwrap_or(0)
                .max(name.chars().count())
        })
        .collect();

    let mut out = String::new();
    out.push_str(&" ".repeat(index_width));
    for (name, width) in header.iter().zip(&widths) {
        out.push_str(&format!("  {:>w$}", name, w = *width));
    }
    for (n, row) in rows.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!("{:<w$}", n, w = index_width));
        for (cell, width) in row.iter().zip(&widths) {
            out.push_str(&format!("  {:>w$}", cell, w = *width));
        }
    }
    out
}

#[async_trait]
impl Tool for LookupSalesDataTool {
    fn name(&self) -> &str {
        "lookup_sales_data"
    }

    fn description(&self) -> &str {
        "Look up data from Store Sales Price Elasticity Promotions dataset"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The unchanged prompt that the user provided."
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let prompt = required_str(&params, "prompt")?;
        match self.lookup(prompt).await {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "sales data lookup failed");
                Err(ReportedFailure(format!("{}{:#}", LOOKUP_ERROR_PREFIX, e)).into())
            }
        }
    }
}
