use std::path::Path;

use pg_escape::{quote_identifier, quote_literal};
use tokio_postgres::{Client, Config, NoTls};
use tracing::{Instrument, debug, error, info};

use crate::credentials::Credentials;
use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::types::Cell;
use crate::warehouse::{Warehouse, read_script};

const DEFAULT_PORT: u16 = 5432;

/// Warehouse speaking the Postgres wire protocol.
///
/// Credentials fields: `host`, `port` (optional), `user`, `password` and
/// `database`.
#[derive(Debug)]
pub struct PostgresWarehouse {
    client: Client,
}

impl PostgresWarehouse {
    pub async fn connect(credentials: &Credentials) -> IngestResult<Self> {
        let port = match credentials.get("port") {
            Some(port) => port.parse::<u16>().map_err(|err| {
                ingest_error!(
                    ErrorKind::ConfigError,
                    "Warehouse port is not a valid number",
                    format!("{port}: {err}")
                )
            })?,
            None => DEFAULT_PORT,
        };

        let mut config = Config::new();
        config
            .host(credentials.require("host")?)
            .port(port)
            .user(credentials.require("user")?)
            .password(credentials.require("password")?)
            .dbname(credentials.require("database")?);

        let (client, connection) = config.connect(NoTls).await?;

        let span = tracing::Span::current();
        let task = async move {
            if let Err(e) = connection.await {
                error!("an error occurred during the warehouse connection: {}", e);
                return;
            }

            info!("warehouse connection terminated successfully")
        }
        .instrument(span);
        tokio::spawn(task);

        Ok(Self { client })
    }
}

impl Warehouse for PostgresWarehouse {
    async fn truncate(&self, qualified_table: &str) -> IngestResult<()> {
        let statement = format!("truncate table {}", quote_qualified(qualified_table));
        debug!(statement, "truncating table");
        self.client.batch_execute(&statement).await?;

        Ok(())
    }

    async fn execute_script(&self, script: &Path) -> IngestResult<()> {
        let sql = read_script(script).await?;
        debug!(script = %script.display(), "executing script");
        self.client.batch_execute(&sql).await?;

        Ok(())
    }

    async fn insert_row(&self, qualified_table: &str, columns: &[(&str, Cell)]) -> IngestResult<()> {
        let statement = insert_statement(qualified_table, columns);
        self.client.batch_execute(&statement).await?;

        Ok(())
    }
}

/// Quotes each part of a dotted table name.
fn quote_qualified(qualified_table: &str) -> String {
    qualified_table
        .split('.')
        .map(|part| quote_identifier(part).into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

fn sql_literal(cell: &Cell) -> String {
    match cell {
        Cell::Null => "null".to_owned(),
        Cell::Bool(value) => value.to_string(),
        Cell::I64(value) => value.to_string(),
        Cell::F64(value) if value.is_finite() => value.to_string(),
        other => quote_literal(&other.to_string()).into_owned(),
    }
}

fn insert_statement(qualified_table: &str, columns: &[(&str, Cell)]) -> String {
    let names = columns
        .iter()
        .map(|(name, _)| quote_identifier(name).into_owned())
        .collect::<Vec<_>>()
        .join(", ");
    let values = columns
        .iter()
        .map(|(_, cell)| sql_literal(cell))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "insert into {} ({names}) values ({values})",
        quote_qualified(qualified_table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_are_quoted_per_part() {
        assert_eq!(quote_qualified("raw.crm.users"), "raw.crm.users");
        assert_eq!(quote_qualified("RAW.crm.Users"), "\"RAW\".crm.\"Users\"");
    }

    #[test]
    fn insert_statement_renders_literals() {
        let statement = insert_statement(
            "ops.meta.run_stats",
            &[
                ("job_alias", Cell::String("o'neil".to_owned())),
                ("pages", Cell::I64(3)),
                ("error_text", Cell::Null),
                ("succeeded", Cell::Bool(true)),
            ],
        );

        assert_eq!(
            statement,
            "insert into ops.meta.run_stats (job_alias, pages, error_text, succeeded) values ('o''neil', 3, null, true)"
        );
    }
}
