use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use memoforms::{FormEngine, FormsConfig, LogMailer, OwnerRef};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "form-tool")]
#[command(about = "Inspect memoforms definition snapshots")]
struct Cli {
    /// Snapshot file; falls back to MEMOFORMS_SNAPSHOT_PATH
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every form definition
    List,
    /// Render a form as HTML paragraphs
    Preview { owner: String },
    /// Show model columns that have no field yet
    Suggest { owner: String },
    /// Re-run validation on every field and handler of a form
    Check { owner: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = FormsConfig::from_env().autosave(false);
    if let Some(path) = cli.snapshot {
        config = config.snapshot_path(path);
    }
    let path = config
        .snapshot_path
        .clone()
        .ok_or_else(|| anyhow!("no snapshot given; pass --snapshot or set MEMOFORMS_SNAPSHOT_PATH"))?;
    if !path.exists() {
        return Err(anyhow!("snapshot {} does not exist", path.display()));
    }

    let engine = FormEngine::open(config, Arc::new(LogMailer))
        .await
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;

    match cli.command {
        Command::List => list(&engine).await,
        Command::Preview { owner } => preview(&engine, parse_owner(&owner)?).await,
        Command::Suggest { owner } => suggest(&engine, parse_owner(&owner)?).await,
        Command::Check { owner } => check(&engine, parse_owner(&owner)?).await,
    }
}

fn parse_owner(raw: &str) -> Result<OwnerRef> {
    OwnerRef::parse(raw)
        .ok_or_else(|| anyhow!("invalid form reference '{}', expected e.g. form:1 or model_form:2", raw))
}

async fn list(engine: &FormEngine) -> Result<()> {
    let forms = engine.list_forms().await?;
    if forms.is_empty() {
        println!("no forms defined");
    }
    for summary in forms {
        println!("{}", summary);
    }
    Ok(())
}

async fn preview(engine: &FormEngine, owner: OwnerRef) -> Result<()> {
    let html = engine
        .preview(owner)
        .await
        .with_context(|| format!("failed to render {}", owner))?;
    println!("{}", html);
    Ok(())
}

async fn suggest(engine: &FormEngine, owner: OwnerRef) -> Result<()> {
    let definition = engine.load_form(owner).await?;
    for (name, label) in definition.suggested_model_field_choices()? {
        println!("{:<24} {}", name, label);
    }
    Ok(())
}

async fn check(engine: &FormEngine, owner: OwnerRef) -> Result<()> {
    let definition = engine.load_form(owner).await?;
    let mut problems = 0usize;

    for spec in definition.fields() {
        match spec.validate() {
            Ok(()) => println!("ok    field   {}", spec.name()),
            Err(err) => {
                problems += 1;
                println!("FAIL  field   {}: {}", spec.name(), err);
            }
        }
    }

    for record in definition.handlers() {
        let outcome = match record.specific(engine.storage()).await {
            Ok(spec) => spec.clean(&definition),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => println!("ok    handler {}", record.base().name),
            Err(err) => {
                problems += 1;
                println!("FAIL  handler {}: {}", record.base().name, err);
            }
        }
    }

    if problems > 0 {
        return Err(anyhow!("{} problem(s) in {}", problems, definition));
    }
    println!("{} is consistent", definition);
    Ok(())
}
