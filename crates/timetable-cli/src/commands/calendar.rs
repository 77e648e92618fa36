//! Academic year and period commands.

use chrono::NaiveDate;
use clap::Subcommand;
use timetable_core::{CalendarRegistry, ReferenceCatalog};

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum YearAction {
    /// Create an academic year
    Create {
        /// Year name, e.g. "2024"
        name: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// List academic years of the institution
    List,
}

#[derive(Subcommand)]
pub enum PeriodAction {
    /// Create a period inside an academic year
    Create {
        /// Period name, e.g. "Term 1"
        name: String,
        /// Academic year ID
        #[arg(long)]
        year: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Change a period's name or dates
    Update {
        /// Period ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Remove a period
    Delete {
        /// Period ID
        id: String,
    },
    /// List periods of an academic year
    List {
        /// Academic year ID
        #[arg(long)]
        year: String,
    },
    /// Show the period containing a date
    At {
        /// Academic year ID
        #[arg(long)]
        year: String,
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },
}

pub fn run_year(ctx: &Context, action: YearAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;

    match action {
        YearAction::Create { name, start, end } => {
            let year = CalendarRegistry::new(&db).create_academic_year(&institution, &name, start, end)?;
            print_json(&year)?;
        }
        YearAction::List => {
            print_json(&db.list_academic_years(&institution)?)?;
        }
    }
    Ok(())
}

pub fn run_period(ctx: &Context, action: PeriodAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;
    let registry = CalendarRegistry::new(&db);

    match action {
        PeriodAction::Create {
            name,
            year,
            start,
            end,
        } => {
            print_json(&registry.create_period(&institution, &year, &name, start, end)?)?;
        }
        PeriodAction::Update {
            id,
            name,
            start,
            end,
        } => {
            print_json(&registry.update_period(&institution, &id, name.as_deref(), start, end)?)?;
        }
        PeriodAction::Delete { id } => {
            registry.delete_period(&institution, &id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
        }
        PeriodAction::List { year } => {
            print_json(&registry.list_periods(&institution, &year)?)?;
        }
        PeriodAction::At { year, date } => {
            print_json(&registry.period_containing(&institution, &year, date)?)?;
        }
    }
    Ok(())
}
