use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use serde::Serialize;
use structopt::StructOpt;

use catalog::address::{NewAddress, RecordId};
use catalog::catalog::Catalog;
use catalog::config::Config;
use catalog::db::PgDb;
use catalog::environment::{system_clock, Environment};
use catalog::errors::ErrorKind;
use catalog::generation::GenerationRequest;
use catalog::language::Language;
use catalog::listing::ListingRequest;
use catalog::llm::{OpenAiClient, ReasoningEffort};
use log::{debug, info, o, warn};

#[derive(Debug, StructOpt)]
#[structopt(name = "catalog-admin", about = "Manage the address catalog")]
struct Opt {
    /// The catalog language to work in
    #[structopt(short, long, default_value = "EN")]
    language: Language,

    /// Log through `RUST_LOG` instead of JSON
    #[cfg(feature = "env_logging")]
    #[structopt(long)]
    env_logging: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// List addresses, most recently updated first
    List {
        /// Only list addresses with any of these tags
        #[structopt(short, long = "tag")]
        tags: Vec<String>,

        #[structopt(long)]
        page_size: Option<i64>,

        /// The next cursor printed by the previous page
        #[structopt(long)]
        cursor: Option<String>,
    },

    /// Print a single address
    Get { id: String },

    /// Create an address from a JSON file
    Create { file: PathBuf },

    /// Replace an address with the contents of a JSON file
    Update { id: String, file: PathBuf },

    /// Delete an address
    Delete { id: String },

    /// Generate address drafts
    Generate {
        prompt: String,

        /// Defaults to the stored prompt for the language
        #[structopt(long)]
        system_prompt: Option<String>,

        #[structopt(long)]
        model: Option<String>,

        #[structopt(long)]
        effort: Option<ReasoningEffort>,

        /// Create every generated draft
        #[structopt(long)]
        save: bool,
    },

    /// Print the stored generation system prompt
    Prompt,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    #[cfg(feature = "env_logging")]
    let _guard = if opt.env_logging {
        Some(log::initialize_env_logger())
    } else {
        None
    };

    let logger = Arc::new(log::initialize_logger());
    let config = Config::from_env();

    let pool = sqlx::postgres::PgPool::connect(&config.connection_string)
        .await
        .expect("create database pool from CATALOG_DB_CONNECTION_STRING");
    let db = Arc::new(PgDb::new(pool, config.store.clone()));
    let llm = Arc::new(OpenAiClient::new(logger.clone(), config.llm.clone())?);

    let catalog = Catalog::new(Environment::new(
        logger.clone(),
        db.clone(),
        db,
        llm,
        system_clock(),
    ));

    let language = opt.language;
    let logger = logger.new(o!("language" => language.code()));

    match opt.command {
        Command::List {
            tags,
            page_size,
            cursor,
        } => {
            let request = ListingRequest {
                tags,
                page_size,
                cursor: cursor.map(RecordId::new),
            };

            print(&catalog.list(language, request).await?)?;
        }

        Command::Get { id } => {
            print(&catalog.retrieve(language, &RecordId::new(id)).await?)?;
        }

        Command::Create { file } => {
            let new = read_address(&file)?;
            print(&catalog.create(language, new).await?)?;
        }

        Command::Update { id, file } => {
            let submitted = read_address(&file)?;
            print(&catalog.update(language, &RecordId::new(id), submitted).await?)?;
        }

        Command::Delete { id } => {
            let deleted = catalog.delete(language, &RecordId::new(id)).await?;
            print(&deleted)?;
        }

        Command::Generate {
            prompt,
            system_prompt,
            model,
            effort,
            save,
        } => {
            let system_prompt = match system_prompt {
                Some(system_prompt) => Some(system_prompt),
                None => match catalog.system_generation_prompt(Some(language)).await {
                    Ok(stored) => Some(stored),
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        warn!(logger, "No stored system prompt, generating without one");
                        None
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            let drafts = catalog
                .generate(GenerationRequest {
                    prompt,
                    system_prompt,
                    model,
                    effort,
                })
                .await?;

            if !save {
                print(&drafts)?;
                return Ok(());
            }

            info!(logger, "Saving {} drafts...", drafts.len());

            let mut created = vec![];

            for draft in drafts {
                let provisional_id = draft.provisional_id;

                match catalog.create(language, NewAddress::from(draft)).await {
                    Ok(record) => created.push(record),
                    Err(e) if e.kind() == ErrorKind::Conflict => {
                        warn!(logger, "Skipping draft"; "provisional_id" => %provisional_id, "error" => %e);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            print(&created)?;
        }

        Command::Prompt => {
            println!("{}", catalog.system_generation_prompt(Some(language)).await?);
        }
    }

    debug!(logger, "Done.");

    Ok(())
}

fn read_address(path: &PathBuf) -> Result<NewAddress, Box<dyn Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn print<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
