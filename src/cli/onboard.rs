use crate::config::{Config, expand_home};
use crate::registry::catalog;
use crate::service::JournalService;
use anyhow::{Context, Result};
use dialoguer::{Input, MultiSelect, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to Child Journal onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::load().unwrap_or_default();

    println!("\n[1/4] Data directory");
    println!("  The question list and the journal CSV are stored here.");
    let data_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder for journal data")
        .default(defaults.data_dir.display().to_string())
        .interact_text()
        .context("Failed to read data directory")?;
    let data_dir = expand_home(data_dir_input.trim());
    println!("  ✓ {}", data_dir.display());

    println!("\n[2/4] API port");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Port for the local API server")
        .default(defaults.api_port)
        .interact_text()
        .context("Failed to read API port")?;
    println!("  ✓ http://{}:{api_port}", defaults.api_host);

    let config = Config {
        api_port,
        api_host: defaults.api_host,
        ..Config::with_data_dir(data_dir)
    };
    config.ensure_bootstrap_files()?;
    config.save()?;

    let service = JournalService::from_config(&config);
    service.bootstrap()?;

    println!("\n[3/4] Add a child");
    let child: String = Input::with_theme(&theme)
        .with_prompt("  Child name (leave empty to skip)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read child name")?;

    if child.trim().is_empty() {
        println!("  ✓ Skipped; add one later with `child-journal child add <name>`");
    } else {
        let child = service.add_child(&child)?;
        println!("  ✓ Added {child}");

        println!("\n[4/4] Choose question categories");
        let names = catalog::categories()
            .iter()
            .map(|category| category.name)
            .collect::<Vec<_>>();
        let picked = MultiSelect::with_theme(&theme)
            .with_prompt("  Space to toggle, Enter to confirm")
            .items(&names)
            .interact()
            .context("Failed to read category selection")?;

        let predefined = picked
            .into_iter()
            .filter_map(|index| catalog::categories().get(index))
            .flat_map(|category| category.questions.iter())
            .map(|question| question.to_string())
            .collect::<Vec<_>>();
        let questions = service.set_questions(&child, &predefined, &[])?;
        println!("  ✓ {} question(s) registered for {child}", questions.len());
    }

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run child-journal serve to start the API.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
