//! Registration of time slots, teachers, subjects, groups and classrooms.

use chrono::NaiveTime;
use clap::Subcommand;
use timetable_core::{Catalogs, ReferenceCatalog};

use crate::context::{parse_clock, print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum SlotAction {
    /// Create a time slot
    Create {
        /// Slot name, e.g. "first"
        name: String,
        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_clock)]
        start: NaiveTime,
        /// End time (HH:MM)
        #[arg(long, value_parser = parse_clock)]
        end: NaiveTime,
    },
    /// List time slots ordered by start time
    List,
}

/// Teachers and subjects only carry a name.
#[derive(Subcommand)]
pub enum NamedAction {
    /// Register by name
    Create { name: String },
}

#[derive(Clone, Copy)]
pub enum Named {
    Teacher,
    Subject,
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Register a student group
    Create {
        name: String,
        /// Site ID
        #[arg(long)]
        site: String,
        /// Grade level ID
        #[arg(long)]
        grade: String,
    },
}

#[derive(Subcommand)]
pub enum ClassroomAction {
    /// Register a classroom
    Create {
        name: String,
        /// Room kind, e.g. "lab"
        #[arg(long, default_value = "standard")]
        kind: String,
        /// Seats
        #[arg(long, default_value = "30")]
        capacity: u32,
    },
}

pub fn run_slot(ctx: &Context, action: SlotAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;

    match action {
        SlotAction::Create { name, start, end } => {
            print_json(&Catalogs::new(&db).create_time_slot(&institution, &name, start, end)?)?;
        }
        SlotAction::List => {
            print_json(&db.list_time_slots(&institution)?)?;
        }
    }
    Ok(())
}

pub fn run_named(ctx: &Context, kind: Named, action: NamedAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;
    let catalogs = Catalogs::new(&db);

    let NamedAction::Create { name } = action;
    match kind {
        Named::Teacher => print_json(&catalogs.create_teacher(&institution, &name)?),
        Named::Subject => print_json(&catalogs.create_subject(&institution, &name)?),
    }
}

pub fn run_group(ctx: &Context, action: GroupAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;

    let GroupAction::Create { name, site, grade } = action;
    print_json(&Catalogs::new(&db).create_group(&institution, &site, &grade, &name)?)
}

pub fn run_classroom(ctx: &Context, action: ClassroomAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;

    let ClassroomAction::Create {
        name,
        kind,
        capacity,
    } = action;
    print_json(&Catalogs::new(&db).create_classroom(&institution, &name, &kind, capacity)?)
}
