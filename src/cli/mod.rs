pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "child-journal",
    about = "Daily caregiver observations with per-child question sets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Run the JSON API server (Ctrl+C to stop)
    Serve,
    Child {
        #[command(subcommand)]
        command: ChildCommands,
    },
    Questions {
        #[command(subcommand)]
        command: QuestionCommands,
    },
    /// Record today's answers; prompts for each question when no --answer is given
    Submit {
        child: String,
        /// Answer as `q<index>=<value>`, e.g. `q0=3`
        #[arg(long = "answer", short = 'a')]
        answers: Vec<String>,
    },
    Entries {
        #[arg(long)]
        child: Option<String>,
    },
    Trends {
        #[arg(long)]
        child: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum ChildCommands {
    Add { name: String },
    List,
}

#[derive(Debug, Subcommand)]
pub enum QuestionCommands {
    /// Print the predefined catalog with `category.question` references
    Catalog,
    Show {
        child: String,
    },
    /// Replace a child's questions: predefined first, then custom
    Set {
        child: String,
        /// Catalog reference (`1.3`) or exact catalog text
        #[arg(long = "predefined", short = 'p')]
        predefined: Vec<String>,
        #[arg(long = "custom", short = 'c')]
        custom: Vec<String>,
    },
}
