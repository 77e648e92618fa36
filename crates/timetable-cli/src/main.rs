use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use timetable_core::{Config, CoreError, ScheduleError};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use context::Context;

#[derive(Parser)]
#[command(name = "timetable-cli", version, about = "Timetable CLI")]
struct Cli {
    /// Database file (overrides database.path from config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Institution id (overrides institution.default_id from config)
    #[arg(long, global = true)]
    institution: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Academic years
    Year {
        #[command(subcommand)]
        action: commands::calendar::YearAction,
    },
    /// Periods of an academic year
    Period {
        #[command(subcommand)]
        action: commands::calendar::PeriodAction,
    },
    /// Time slots
    Slot {
        #[command(subcommand)]
        action: commands::catalog::SlotAction,
    },
    /// Teachers
    Teacher {
        #[command(subcommand)]
        action: commands::catalog::NamedAction,
    },
    /// Subjects
    Subject {
        #[command(subcommand)]
        action: commands::catalog::NamedAction,
    },
    /// Student groups
    Group {
        #[command(subcommand)]
        action: commands::catalog::GroupAction,
    },
    /// Classrooms
    Classroom {
        #[command(subcommand)]
        action: commands::catalog::ClassroomAction,
    },
    /// Assignment management
    Assignment {
        #[command(subcommand)]
        action: commands::assignment::AssignmentAction,
    },
    /// Placement management
    Placement {
        #[command(subcommand)]
        action: commands::placement::PlacementAction,
    },
    /// Weekly timetables
    Timetable {
        #[command(subcommand)]
        action: commands::timetable::TimetableAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print a shell completion script
    Completions {
        shell: Shell,
    },
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// `error[CODE]: message` for scheduling errors, `error: message` otherwise.
fn report(err: &(dyn std::error::Error + 'static)) -> String {
    let schedule = err.downcast_ref::<ScheduleError>().or_else(|| {
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::Schedule(inner)) => Some(inner),
            _ => None,
        }
    });
    match schedule {
        Some(e) => format!("error[{}]: {e}", e.code()),
        None => format!("error: {err}"),
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&Config::default().logging.filter);
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config.logging.filter);

    let ctx = Context::new(config, cli.db, cli.institution);
    let result = match cli.command {
        Commands::Year { action } => commands::calendar::run_year(&ctx, action),
        Commands::Period { action } => commands::calendar::run_period(&ctx, action),
        Commands::Slot { action } => commands::catalog::run_slot(&ctx, action),
        Commands::Teacher { action } => {
            commands::catalog::run_named(&ctx, commands::catalog::Named::Teacher, action)
        }
        Commands::Subject { action } => {
            commands::catalog::run_named(&ctx, commands::catalog::Named::Subject, action)
        }
        Commands::Group { action } => commands::catalog::run_group(&ctx, action),
        Commands::Classroom { action } => commands::catalog::run_classroom(&ctx, action),
        Commands::Assignment { action } => commands::assignment::run(&ctx, action),
        Commands::Placement { action } => commands::placement::run(&ctx, action),
        Commands::Timetable { action } => commands::timetable::run(&ctx, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "timetable-cli",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", report(e.as_ref()));
        std::process::exit(1);
    }
}
