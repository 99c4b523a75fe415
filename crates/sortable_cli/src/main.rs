//! Command-line front end for ordering records in a SQLite file.
//!
//! # Responsibility
//! - Map subcommands onto `OrderService` operations.
//! - Print records as JSON lines on stdout; errors go to stderr.

use clap::{Parser, Subcommand};
use log::error;
use rusqlite::Connection;
use sortable_core::db::open_db;
use sortable_core::{
    default_log_level, init_logging, run_in_transaction, OrderResult, OrderService,
    SortableConfig, SortableRecord, SqliteRecordStore,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

/// Keep records of a SQLite table in a persistent order
#[derive(Parser, Debug)]
#[command(name = "sortable")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long)]
    db: PathBuf,

    /// Optional JSON config (`order_column_name`, `sort_when_creating`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<String>,

    /// Log level used with `--log-dir`
    #[arg(long, requires = "log_dir")]
    log_level: Option<String>,

    /// Run the command inside one transaction
    #[arg(long)]
    atomic: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a record at the end of the order
    Add { label: String },
    /// List records by order
    List,
    /// Reassign orders from a JSON array of ids
    Reorder {
        ids: String,
        #[arg(long, default_value_t = 1)]
        start: i64,
    },
    /// Swap a record with the one before it
    Up { id: Uuid },
    /// Swap a record with the one after it
    Down { id: Uuid },
    /// Exchange the orders of two records
    Swap { first: Uuid, second: Uuid },
}

#[derive(Debug)]
enum Outcome {
    Records(Vec<SortableRecord>),
    Unmoved(Uuid),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let config = match cli.config.as_ref() {
        Some(path) => SortableConfig::from_json_file(path)?,
        None => SortableConfig::default(),
    };
    let conn = open_db(&cli.db)?;
    let outcome = dispatch(&conn, &config, cli.atomic, &cli.command)?;

    match outcome {
        Outcome::Records(records) => {
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Outcome::Unmoved(id) => eprintln!("record {id} has no neighbour in that direction"),
    }
    Ok(())
}

fn dispatch(
    conn: &Connection,
    config: &SortableConfig,
    atomic: bool,
    command: &Command,
) -> OrderResult<Outcome> {
    if atomic {
        return run_in_transaction(conn, config, |service| execute(service, command));
    }
    let store = SqliteRecordStore::try_new(conn, config)?;
    execute(&OrderService::new(store, config.clone()), command)
}

fn execute(
    service: &OrderService<SqliteRecordStore<'_>>,
    command: &Command,
) -> OrderResult<Outcome> {
    let outcome = match command {
        Command::Add { label } => Outcome::Records(vec![service.create(label.as_str())?]),
        Command::List => Outcome::Records(service.list_ordered()?),
        Command::Reorder { ids, start } => {
            service.set_new_order_from_json(ids, *start)?;
            Outcome::Records(service.list_ordered()?)
        }
        Command::Up { id } => match service.move_order_up_by_id(*id)? {
            Some(record) => Outcome::Records(vec![record]),
            None => Outcome::Unmoved(*id),
        },
        Command::Down { id } => match service.move_order_down_by_id(*id)? {
            Some(record) => Outcome::Records(vec![record]),
            None => Outcome::Unmoved(*id),
        },
        Command::Swap { first, second } => {
            let mut first = service.find(*first)?;
            let mut second = service.find(*second)?;
            service.swap_order(&mut first, &mut second)?;
            Outcome::Records(vec![first, second])
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::{dispatch, Cli, Command, Outcome};
    use clap::Parser;
    use rusqlite::Connection;
    use sortable_core::db::open_db_in_memory;
    use sortable_core::{OrderServiceError, SortableConfig};
    use uuid::Uuid;

    fn add(conn: &Connection, label: &str) -> Uuid {
        let command = Command::Add {
            label: label.to_string(),
        };
        match dispatch(conn, &SortableConfig::default(), false, &command).unwrap() {
            Outcome::Records(records) => records[0].id,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn listed_labels(conn: &Connection) -> Vec<String> {
        match dispatch(conn, &SortableConfig::default(), false, &Command::List).unwrap() {
            Outcome::Records(records) => records.into_iter().map(|record| record.label).collect(),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn listed_orders(conn: &Connection) -> Vec<(String, i64)> {
        match dispatch(conn, &SortableConfig::default(), false, &Command::List).unwrap() {
            Outcome::Records(records) => records
                .into_iter()
                .map(|record| (record.label, record.order_column))
                .collect(),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn reorder(ids: &[Uuid], start: i64) -> Command {
        let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
        Command::Reorder {
            ids: format!("[{}]", quoted.join(",")),
            start,
        }
    }

    #[test]
    fn reorder_then_list_follows_given_ids() {
        let conn = open_db_in_memory().unwrap();
        let a = add(&conn, "a");
        let b = add(&conn, "b");
        let c = add(&conn, "c");

        let outcome = dispatch(&conn, &SortableConfig::default(), false, &reorder(&[c, a, b], 1));
        assert!(matches!(outcome, Ok(Outcome::Records(ref records)) if records.len() == 3));
        assert_eq!(listed_labels(&conn), vec!["c", "a", "b"]);
    }

    #[test]
    fn atomic_reorder_rolls_back_on_missing_id() {
        let conn = open_db_in_memory().unwrap();
        let a = add(&conn, "a");
        let b = add(&conn, "b");
        let missing = Uuid::new_v4();

        let err = dispatch(
            &conn,
            &SortableConfig::default(),
            true,
            &reorder(&[b, missing, a], 10),
        )
        .unwrap_err();
        assert!(matches!(err, OrderServiceError::NotFound(id) if id == missing));
        assert_eq!(
            listed_orders(&conn),
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn plain_reorder_keeps_writes_before_missing_id() {
        let conn = open_db_in_memory().unwrap();
        let a = add(&conn, "a");
        let b = add(&conn, "b");
        let missing = Uuid::new_v4();

        dispatch(
            &conn,
            &SortableConfig::default(),
            false,
            &reorder(&[b, missing, a], 10),
        )
        .unwrap_err();
        assert_eq!(
            listed_orders(&conn),
            vec![("a".to_string(), 1), ("b".to_string(), 10)]
        );
    }

    #[test]
    fn up_at_top_reports_unmoved_and_down_swaps() {
        let conn = open_db_in_memory().unwrap();
        let a = add(&conn, "a");
        add(&conn, "b");
        let config = SortableConfig::default();

        let outcome = dispatch(&conn, &config, false, &Command::Up { id: a }).unwrap();
        assert!(matches!(outcome, Outcome::Unmoved(id) if id == a));

        let outcome = dispatch(&conn, &config, true, &Command::Down { id: a }).unwrap();
        assert!(matches!(outcome, Outcome::Records(ref records) if records[0].order_column == 2));
        assert_eq!(listed_labels(&conn), vec!["b", "a"]);
    }

    #[test]
    fn log_level_requires_log_dir() {
        let result = Cli::try_parse_from(["sortable", "--db", "x.db", "--log-level", "debug", "list"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "sortable",
            "--db",
            "x.db",
            "--log-dir",
            "/tmp/sortable-logs",
            "--log-level",
            "debug",
            "list",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn parses_reorder_with_start_and_atomic_flag() {
        let cli = Cli::try_parse_from([
            "sortable",
            "--db",
            "/tmp/records.db",
            "--atomic",
            "reorder",
            "[]",
            "--start",
            "5",
        ])
        .unwrap();
        assert!(cli.atomic);
        assert!(matches!(cli.command, Command::Reorder { ref ids, start: 5 } if ids == "[]"));
    }

    #[test]
    fn rejects_malformed_record_ids() {
        let result = Cli::try_parse_from(["sortable", "--db", "x.db", "up", "not-a-uuid"]);
        assert!(result.is_err());
    }
}
