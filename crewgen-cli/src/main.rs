//! # Crewgen CLI
//!
//! Command-line interface for generating, reviewing and running crews.
//!
//! Usage:
//!   crewgen generate <objective>
//!   crewgen run <config.json>
//!   crewgen sql --db <uri> <question>
//!   crewgen prompts [name]
//!
//! Examples:
//!   crewgen generate --db sqlite:///./spaceship_titanic.db "Report on survival rates by vip status"
//!   crewgen generate --auto-approve --output crew.json "Plan a landing page for a plant shop"
//!   crewgen generate --db sqlite:///./shop.db --python "Chart monthly plant sales"
//!   crewgen run crew.json --db sqlite:///./spaceship_titanic.db
//!   crewgen sql --db sqlite:///./shop.db --table plants "Which plants like low light?"

use clap::{Parser, Subcommand};
use crewgen_agent::{
    load_crew, materialize, AutoApprove, CrewGenerator, CrewOutput, EditorReviewer,
    GeneratorConfig, Reviewer,
};
use crewgen_core::{
    build_sql_tool, prompts, CodeFixer, ProviderConfig, PythonReplTool, Result, SharedProvider,
    SharedTool, SqlAgent, SqlDatabase, TableQa, ToolRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const SQL_TOOL_DESCRIPTION: &str =
    "Answers a natural-language question by querying the database and returns the answer.";

#[derive(Parser)]
#[command(name = "crewgen")]
#[command(author, version, about = "Crewgen - let the model design the crew")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model to use instead of the provider default
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Enable debug logging (prompts, replies, tool calls)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - warnings and results only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// HTTP timeout per model call, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a crew config for an objective
    Generate {
        /// The objective, in plain words
        #[arg(trailing_var_arg = true, required = true)]
        objective: Vec<String>,

        /// Database URI; registers a SQL tool the crew can use
        #[arg(long)]
        db: Option<String>,

        /// Name of the SQL tool
        #[arg(long, default_value = "query_sql_db_tool")]
        tool_name: String,

        /// Register the python_repl tool (runs model-written code with python3)
        #[arg(long)]
        python: bool,

        /// Review the roster, agents and tasks, not only the final config
        #[arg(long)]
        review_intermediate: bool,

        /// Skip the editor and accept every stage as generated
        #[arg(long)]
        auto_approve: bool,

        /// Keep the review scratch file after the final review
        #[arg(long)]
        keep: bool,

        /// Editor command (default: $EDITOR, then vim)
        #[arg(long)]
        editor: Option<String>,

        /// Attempts per model call before giving up
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Agent or task configs generated at once
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Save the finished config here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Kick off the crew once the config is ready
        #[arg(long)]
        run: bool,
    },
    /// Run a saved crew config
    Run {
        /// Path to the config JSON file
        config: PathBuf,

        /// Database URI for the SQL tool
        #[arg(long)]
        db: Option<String>,

        /// Name of the SQL tool
        #[arg(long, default_value = "query_sql_db_tool")]
        tool_name: String,

        /// Register the python_repl tool (runs model-written code with python3)
        #[arg(long)]
        python: bool,
    },
    /// Ask a question about a database
    Sql {
        /// The question
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,

        /// Database URI (sqlite:///path/to.db)
        #[arg(long, required = true)]
        db: String,

        /// Answer from this single table with one query instead of the agent
        #[arg(long)]
        table: Option<String>,

        /// Print the query result rows as JSON (with --table)
        #[arg(long)]
        json: bool,
    },
    /// List prompt templates, or print one
    Prompts {
        /// Template name
        name: Option<String>,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn provider(model: Option<&str>, timeout: Option<u64>) -> Result<SharedProvider> {
    let Some(mut config) = ProviderConfig::from_env() else {
        return Err(crewgen_core::Error::config_invalid(
            "no provider configured; set ANTHROPIC_API_KEY, OPENAI_API_KEY or CREWGEN_BASE_URL",
        ));
    };
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(secs) = timeout {
        config = config.with_timeout(secs);
    }
    config.build()
}

fn registry(
    db: Option<&str>,
    tool_name: &str,
    python: bool,
    provider: &SharedProvider,
    model: Option<String>,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    if let Some(db) = db {
        let tool: SharedTool = Arc::new(build_sql_tool(
            db,
            Some(tool_name),
            SQL_TOOL_DESCRIPTION,
            provider.clone(),
            model,
        )?);
        registry.register(tool)?;
    }
    if python {
        registry.register(Arc::new(PythonReplTool::new()))?;
    }
    debug!(tools = ?registry.names(), "tool registry ready");
    Ok(registry)
}

fn print_output(output: &CrewOutput, quiet: bool) {
    if !quiet {
        for task in &output.tasks {
            println!("--- {} ({}) ---\n{}\n", task.task, task.agent, task.output);
        }
        println!(
            "Usage: {} calls, {} tokens",
            output.usage.total_calls,
            output.usage.total_tokens()
        );
        println!("\nFinal output:");
    }
    println!("{}", output.final_output);
}

#[allow(clippy::too_many_arguments)]
async fn generate(
    cli_model: Option<String>,
    timeout: Option<u64>,
    quiet: bool,
    objective: &str,
    db: Option<&str>,
    tool_name: &str,
    python: bool,
    review_intermediate: bool,
    auto_approve: bool,
    keep: bool,
    editor: Option<String>,
    max_attempts: u32,
    concurrency: usize,
    output: Option<PathBuf>,
    run: bool,
) -> Result<()> {
    let provider = provider(cli_model.as_deref(), timeout)?;
    let registry = registry(db, tool_name, python, &provider, cli_model.clone())?;
    let tool_names = registry.names();

    if !quiet {
        println!("Objective: {}", objective);
        println!("Tools: {:?}\n", tool_names);
    }

    let reviewer: Arc<dyn Reviewer> = if auto_approve {
        Arc::new(AutoApprove)
    } else {
        Arc::new(
            EditorReviewer::from_env(editor)
                .with_fixer(provider.clone(), CodeFixer::new().with_model(cli_model.clone())),
        )
    };

    let mut config = GeneratorConfig::default()
        .with_max_attempts(max_attempts)
        .with_concurrency(concurrency)
        .with_review_intermediate(review_intermediate && !auto_approve)
        .with_keep_final_config(keep);
    config.model = cli_model.clone();

    let generated = CrewGenerator::new(provider.clone())
        .with_reviewer(reviewer)
        .with_config(config)
        .create_full_config(objective, &tool_names)
        .await?;

    if let Some(path) = &output {
        generated.config.save(path)?;
        info!(path = %path.display(), "config saved");
    } else if !run {
        println!("{}", generated.config.to_json_pretty()?);
    }

    if !quiet {
        println!(
            "Generation used {} calls, {} tokens",
            generated.usage.total_calls,
            generated.usage.total_tokens()
        );
    }

    if run {
        let crew = materialize(&generated.config, &registry, provider)?.with_model(cli_model);
        let output = crew.kickoff().await?;
        print_output(&output, quiet);
    }
    Ok(())
}

async fn run_saved(
    cli_model: Option<String>,
    timeout: Option<u64>,
    quiet: bool,
    path: &PathBuf,
    db: Option<&str>,
    tool_name: &str,
    python: bool,
) -> Result<()> {
    let provider = provider(cli_model.as_deref(), timeout)?;
    let registry = registry(db, tool_name, python, &provider, cli_model.clone())?;
    let crew = load_crew(path, &registry, provider)?.with_model(cli_model);

    if !quiet {
        println!("Running {} tasks with {} agents\n", crew.tasks().len(), crew.agents().len());
    }
    let output = crew.kickoff().await?;
    print_output(&output, quiet);
    Ok(())
}

async fn ask_sql(
    cli_model: Option<String>,
    timeout: Option<u64>,
    quiet: bool,
    question: &str,
    db: &str,
    table: Option<&str>,
    json: bool,
) -> Result<()> {
    let provider = provider(cli_model.as_deref(), timeout)?;
    let database = SqlDatabase::open(db)?;

    match table {
        Some(table) => {
            let answer = TableQa::new(database, provider)
                .with_model(cli_model)
                .answer(table, question)
                .await?;
            if json {
                let rows = serde_json::to_string_pretty(&answer.rows)
                    .map_err(|e| crewgen_core::Error::serialization_failed(e.to_string()))?;
                println!("{}", rows);
            } else if !quiet {
                println!("Query: {}\n", answer.query);
                println!("{}\n", answer.rows.to_table());
            }
            println!("{}", answer.answer);
        }
        None => {
            let outcome = SqlAgent::new(database, provider)
                .with_model(cli_model)
                .ask(question)
                .await?;
            if !quiet {
                println!("Tools used: {}\n", outcome.tool_calls.join(", "));
            }
            println!("{}", outcome.answer);
        }
    }
    Ok(())
}

fn show_prompts(name: Option<&str>) -> Result<()> {
    match name {
        None => {
            for template in prompts::ALL {
                println!("{:<20} {}", template.name(), template.placeholders()?.join(", "));
            }
        }
        Some(name) => {
            let template = prompts::ALL
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| crewgen_core::Error::invalid_argument(format!("no prompt named '{}'", name)))?;
            println!("{}", template.text());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Generate {
            objective,
            db,
            tool_name,
            python,
            review_intermediate,
            auto_approve,
            keep,
            editor,
            max_attempts,
            concurrency,
            output,
            run,
        } => {
            generate(
                cli.model,
                cli.timeout,
                cli.quiet,
                &objective.join(" "),
                db.as_deref(),
                &tool_name,
                python,
                review_intermediate,
                auto_approve,
                keep,
                editor,
                max_attempts,
                concurrency,
                output,
                run,
            )
            .await
        }
        Commands::Run {
            config,
            db,
            tool_name,
            python,
        } => {
            run_saved(
                cli.model,
                cli.timeout,
                cli.quiet,
                &config,
                db.as_deref(),
                &tool_name,
                python,
            )
            .await
        }
        Commands::Sql { question, db, table, json } => {
            ask_sql(
                cli.model,
                cli.timeout,
                cli.quiet,
                &question.join(" "),
                &db,
                table.as_deref(),
                json,
            )
            .await
        }
        Commands::Prompts { name } => show_prompts(name.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
