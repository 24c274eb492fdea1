mod api;
mod cli;
mod config;
mod error;
mod journal;
mod registry;
mod report;
mod service;
mod store;

use crate::cli::onboard::run_onboarding;
use crate::cli::{ChildCommands, Cli, Commands, ConfigCommands, QuestionCommands};
use crate::config::Config;
use crate::journal::{CHILD_COLUMN, DATE_COLUMN};
use crate::registry::catalog;
use crate::registry::question::{Question, QuestionKind};
use crate::service::{JournalService, field_name};
use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use dialoguer::{Input, theme::ColorfulTheme};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Child { command } => handle_child_command(command),
        Commands::Questions { command } => handle_question_command(command),
        Commands::Submit { child, answers } => handle_submit(&child, &answers),
        Commands::Entries { child } => handle_entries(child.as_deref()),
        Commands::Trends { child } => handle_trends(child.as_deref()),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let service = JournalService::from_config(&config);
    let children = service.list_children()?;
    let snapshot = service.snapshot(None)?;

    println!("Child Journal status");
    println!("- registry: {}", config.registry_path.display());
    println!("- journal: {}", config.journal_path.display());
    println!("- children: {}", children.len());
    println!("- entries: {}", snapshot.rows.len());
    println!("- question columns: {}", snapshot.question_columns().count());
    println!("- api: http://{}:{}", config.api_host, config.api_port);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;
    let service = JournalService::from_config(&config);

    let children = match service.list_children() {
        Ok(children) => {
            println!(
                "[OK] question registry readable: {} ({} children)",
                service.registry().path().display(),
                children.len()
            );
            children
        }
        Err(error) => {
            println!("[WARN] question registry check failed: {error}");
            issues.push("registry unreadable".to_string());
            Vec::new()
        }
    };

    match service.snapshot(None) {
        Ok(snapshot) => {
            println!(
                "[OK] journal readable: {} ({} rows)",
                service.table().path().display(),
                snapshot.rows.len()
            );

            let missing = service
                .registry()
                .all_questions()
                .unwrap_or_default()
                .into_iter()
                .filter(|question| !snapshot.header.contains(&question.text))
                .count();
            if missing == 0 {
                println!("[OK] journal header covers every registered question");
            } else {
                println!("[WARN] journal header is missing {missing} registered question(s)");
                issues.push("header out of date".to_string());
            }

            let orphans = snapshot
                .rows
                .iter()
                .map(|row| row.child.trim())
                .filter(|child| !children.iter().any(|known| known.as_str() == *child))
                .collect::<BTreeSet<_>>();
            if orphans.is_empty() {
                println!("[OK] every journal row belongs to a registered child");
            } else {
                println!(
                    "[WARN] rows for children missing from the registry: {}",
                    orphans.into_iter().collect::<Vec<_>>().join(", ")
                );
                issues.push("orphaned rows".to_string());
            }
        }
        Err(error) => {
            println!("[WARN] journal check failed: {error}");
            issues.push("journal unreadable".to_string());
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_child_command(command: ChildCommands) -> Result<()> {
    let service = open_service()?;

    match command {
        ChildCommands::Add { name } => {
            let name = service.add_child(&name)?;
            println!("Child registered: {name}");
        }
        ChildCommands::List => {
            let children = service.list_children()?;
            if children.is_empty() {
                println!("No children registered yet.");
            }
            for child in children {
                println!("{child}");
            }
        }
    }

    Ok(())
}

fn handle_question_command(command: QuestionCommands) -> Result<()> {
    match command {
        QuestionCommands::Catalog => {
            for (category_index, category) in catalog::categories().iter().enumerate() {
                println!("{}. {}", category_index + 1, category.name);
                for (question_index, question) in category.questions.iter().enumerate() {
                    println!("  {}.{} {question}", category_index + 1, question_index + 1);
                }
            }
            Ok(())
        }
        QuestionCommands::Show { child } => {
            let service = open_service()?;
            if !service.registry().contains(&child)? {
                bail!("Unknown child: {child}");
            }

            let questions = service.child_questions(&child)?;
            if questions.is_empty() {
                println!("No questions selected for {child}.");
            }
            for (index, question) in questions.iter().enumerate() {
                println!("{} [{}] {}", field_name(index), question.kind, question.text);
            }
            Ok(())
        }
        QuestionCommands::Set {
            child,
            predefined,
            custom,
        } => {
            let service = open_service()?;
            let predefined = predefined
                .iter()
                .map(|entry| {
                    catalog::by_reference(entry)
                        .map(ToOwned::to_owned)
                        .or_else(|| catalog::find(entry).map(|question| question.text))
                        .with_context(|| format!("Not in the predefined catalog: {entry}"))
                })
                .collect::<Result<Vec<_>>>()?;
            let custom = custom.into_iter().map(Question::new).collect::<Vec<_>>();

            let questions = service.set_questions(&child, &predefined, &custom)?;
            println!("{} question(s) saved for {}", questions.len(), child.trim());
            Ok(())
        }
    }
}

fn handle_submit(child: &str, answers: &[String]) -> Result<()> {
    let service = open_service()?;
    let form = if answers.is_empty() {
        prompt_answers(&service, child)?
    } else {
        parse_answers(answers)?
    };

    let submission = service.submit(child, &form, Local::now().naive_local())?;

    println!(
        "Saved {} answer(s) for {} at {}",
        submission.answers.len(),
        submission.child,
        submission.recorded_at
    );
    for issue in &submission.issues {
        println!(
            "- discarded {} ({:?}): {}",
            issue.field, issue.raw, issue.reason
        );
    }

    Ok(())
}

fn handle_entries(child: Option<&str>) -> Result<()> {
    let service = open_service()?;
    let snapshot = service.snapshot(child)?;

    if snapshot.is_empty() {
        println!("No entries recorded yet.");
        return Ok(());
    }

    for row in &snapshot.rows {
        println!("{DATE_COLUMN}: {} | {CHILD_COLUMN}: {}", row.recorded_at, row.child);
        for column in snapshot.question_columns() {
            let value = row.value(column);
            if !value.is_empty() {
                println!("  {column}: {value}");
            }
        }
    }

    Ok(())
}

fn handle_trends(child: Option<&str>) -> Result<()> {
    let service = open_service()?;
    let report = service.trends(child);

    println!("{}", report::render_text(&report));
    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let service = JournalService::from_config(&config);
    service
        .bootstrap()
        .context("Failed to prepare journal backing files")?;

    let shared_config = Arc::new(config);
    let shared_service = Arc::new(service);

    info!("Child Journal service started");

    tokio::select! {
        api_result = api::run_server(shared_config, shared_service) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn prompt_answers(service: &JournalService, child: &str) -> Result<HashMap<String, String>> {
    let questions = service.child_questions(child)?;
    if questions.is_empty() {
        bail!("No questions selected for {child}. Run `child-journal questions set` first.");
    }

    let theme = ColorfulTheme::default();
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let hint = match question.kind {
                QuestionKind::Rating => " (1-5)",
                QuestionKind::YesNo => " (1 = yes, 0 = no)",
                QuestionKind::FreeText => "",
            };
            let answer: String = Input::with_theme(&theme)
                .with_prompt(format!("{}{hint}", question.text))
                .allow_empty(true)
                .interact_text()
                .context("Failed to read answer")?;
            Ok::<_, anyhow::Error>((field_name(index), answer))
        })
        .collect()
}

fn parse_answers(answers: &[String]) -> Result<HashMap<String, String>> {
    answers
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(field, value)| (field.trim().to_string(), value.to_string()))
                .with_context(|| format!("Invalid answer: {entry}. Example: q0=3"))
        })
        .collect()
}

fn open_service() -> Result<JournalService> {
    let config = load_or_default_config()?;
    Ok(JournalService::from_config(&config))
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}
