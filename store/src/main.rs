use std::{path::PathBuf, process};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sms_store::{EntityId, Repository, SqlRepository, StoreConfig, Student, StudentRepository};
use tracing_subscriber::EnvFilter;

/// Inspect and edit the student records of the school-management database.
#[derive(Debug, Parser)]
#[command(name = "sms-store", version)]
struct Cli {
    /// TOML file with the store settings; `sms-store.toml` is used when present.
    #[arg(short, long, env = "SMS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert a new student.
    Add {
        /// Use this id instead of a store-assigned one.
        #[arg(long)]
        id: Option<EntityId>,
        #[command(flatten)]
        student: StudentArgs,
    },
    /// Print one student, or `null` if the id is unknown.
    Get { id: EntityId },
    /// Print every student.
    List,
    /// Replace the fields of an existing student.
    Update {
        id: EntityId,
        #[command(flatten)]
        student: StudentArgs,
    },
    Delete { id: EntityId },
    /// Print the students matching one field exactly.
    Find(FindArgs),
    Count,
}

#[derive(Debug, Args)]
struct StudentArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
}

impl From<StudentArgs> for Student {
    fn from(args: StudentArgs) -> Self {
        Student::new(args.first_name, args.last_name, args.email)
    }
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct FindArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::error!(err = %format!("{err:#}"), "command failed");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = StoreConfig::load(cli.config.as_deref())?;
    let repository = SqlRepository::<Student>::connect(&config).await?;

    execute(&repository, cli.command).await
}

async fn execute<R: StudentRepository>(repository: &R, command: Command) -> Result<()> {
    match command {
        Command::Add { id, student } => {
            let mut student = Student::from(student);
            student.id = id;
            student.validate()?;
            print(&repository.insert(student).await?)
        }
        Command::Get { id } => print(&repository.find_by_id(id).await?),
        Command::List => print(&repository.find_all().await?),
        Command::Update { id, student } => {
            let student = Student::from(student).with_id(id);
            student.validate()?;
            print(&repository.update(student).await?)
        }
        Command::Delete { id } => {
            repository.delete_by_id(id).await?;
            tracing::info!(id, "student deleted");
            Ok(())
        }
        Command::Find(FindArgs {
            first_name,
            last_name,
            email,
        }) => {
            let students = match (first_name, last_name, email) {
                (Some(first_name), _, _) => repository.find_by_first_name(&first_name).await?,
                (_, Some(last_name), _) => repository.find_by_last_name(&last_name).await?,
                (_, _, Some(email)) => repository.find_by_email(&email).await?,
                (None, None, None) => {
                    anyhow::bail!("one of --first-name, --last-name or --email is required")
                }
            };
            print(&students)
        }
        Command::Count => print(&repository.count().await?),
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
