use crate::db::Db;
use crate::error::{AccordError, Result};
use rusqlite::types::ValueRef;
use std::path::Path;

/// Read-only view of the SQL tool's database
#[derive(Debug, Clone)]
pub struct SqlDatabase {
    db: Db,
}

impl SqlDatabase {
    /// Open an existing SQLite file; the file is never written
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AccordError::Config(format!(
                "SQL database not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            db: Db::read_only(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// User tables, sorted by name
    pub async fn usable_table_names(&self) -> Result<Vec<String>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
    }

    /// `CREATE TABLE` statements of every user table, blank-line separated
    pub async fn table_info(&self) -> Result<String> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT sql FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
                     ORDER BY name",
                )?;
                let statements = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(statements.join("\n\n"))
            })
            .await
    }

    /// Run one read query and render at most `max_rows` rows as a text table.
    ///
    /// Only the first statement of `sql` is prepared; anything after it is
    /// never executed. Statements that would write are rejected.
    pub async fn run(&self, sql: &str, max_rows: usize) -> Result<String> {
        let sql = read_query(sql)?.to_string();

        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                if !stmt.readonly() {
                    return Err(AccordError::Sql("only read-only statements may be run".to_string()));
                }
                let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
                let column_count = columns.len();

                let mut lines = vec![columns.join(" | ")];
                let mut rows = stmt.query([])?;
                let mut seen = 0;
                let mut truncated = false;

                while let Some(row) = rows.next()? {
                    if seen == max_rows {
                        truncated = true;
                        break;
                    }
                    let cells = (0..column_count)
                        .map(|i| row.get_ref(i).map(render_value))
                        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                    lines.push(cells.join(" | "));
                    seen += 1;
                }

                if seen == 0 {
                    lines.push("(no rows)".to_string());
                }
                if truncated {
                    lines.push(format!("... (first {} rows shown)", max_rows));
                }
                Ok(lines.join("\n"))
            })
            .await
    }
}

/// Accept a query starting with `SELECT` or `WITH`, trailing semicolon allowed
pub fn read_query(sql: &str) -> Result<&str> {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    if trimmed.is_empty() {
        return Err(AccordError::Sql("empty query".to_string()));
    }

    let keyword = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    if keyword != "SELECT" && keyword != "WITH" {
        return Err(AccordError::Sql(format!(
            "only SELECT queries are allowed, got {}",
            keyword
        )));
    }
    Ok(trimmed)
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
