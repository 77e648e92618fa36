//! Assignment management commands for CLI.

use clap::{Args, Subcommand};
use serde_json::json;
use timetable_core::{
    AssignmentFilter, AssignmentLedger, AssignmentPatch, DayOfWeek, NewAssignment, RecordStatus,
};

use crate::context::{print_json, CliResult, Context};

/// Fields of a new assignment.
#[derive(Args)]
pub struct AssignmentArgs {
    /// Teacher ID
    #[arg(long)]
    teacher: String,
    /// Subject ID
    #[arg(long)]
    subject: String,
    /// Group ID
    #[arg(long)]
    group: String,
    /// Time slot ID
    #[arg(long)]
    slot: String,
    /// Day of week: mon, tue, wed, thu, fri or sat
    #[arg(long)]
    day: DayOfWeek,
    /// Academic year ID
    #[arg(long)]
    year: String,
    /// Period ID inside the academic year
    #[arg(long)]
    period: Option<String>,
}

impl From<AssignmentArgs> for NewAssignment {
    fn from(args: AssignmentArgs) -> Self {
        NewAssignment {
            teacher_id: args.teacher,
            subject_id: args.subject,
            group_id: args.group,
            time_slot_id: args.slot,
            day_of_week: args.day,
            academic_year_id: args.year,
            period_id: args.period,
        }
    }
}

#[derive(Subcommand)]
pub enum AssignmentAction {
    /// Create an assignment
    Create(AssignmentArgs),
    /// Update fields of an assignment
    Update {
        /// Assignment ID
        id: String,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        slot: Option<String>,
        #[arg(long)]
        day: Option<DayOfWeek>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long, conflicts_with = "clear_period")]
        period: Option<String>,
        /// Drop the period binding
        #[arg(long)]
        clear_period: bool,
    },
    /// Deactivate an assignment and remove its placements
    Deactivate {
        /// Assignment ID
        id: String,
    },
    /// Reactivate an inactive assignment
    Reactivate {
        /// Assignment ID
        id: String,
    },
    /// Delete an assignment
    Delete {
        /// Assignment ID
        id: String,
    },
    /// Get assignment details
    Get {
        /// Assignment ID
        id: String,
    },
    /// List assignments of an academic year
    List {
        /// Academic year ID
        #[arg(long)]
        year: String,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<RecordStatus>,
    },
    /// Report the conflicts a new assignment would hit, without writing
    Check(AssignmentArgs),
}

pub fn run(ctx: &Context, action: AssignmentAction) -> CliResult {
    let db = ctx.open_db()?;
    let ledger = AssignmentLedger::new(&db);

    match action {
        AssignmentAction::Create(args) => {
            let assignment = ledger.create_assignment(&ctx.institution()?, args.into())?;
            print_json(&assignment)?;
        }
        AssignmentAction::Update {
            id,
            teacher,
            subject,
            group,
            slot,
            day,
            year,
            period,
            clear_period,
        } => {
            let patch = AssignmentPatch {
                teacher_id: teacher,
                subject_id: subject,
                group_id: group,
                time_slot_id: slot,
                day_of_week: day,
                academic_year_id: year,
                period_id: period,
                clear_period,
                status: None,
            };
            print_json(&ledger.update_assignment(&ctx.institution()?, &id, patch)?)?;
        }
        AssignmentAction::Deactivate { id } => {
            print_json(&ledger.deactivate_assignment(&id)?)?;
        }
        AssignmentAction::Reactivate { id } => {
            print_json(&ledger.reactivate_assignment(&ctx.institution()?, &id)?)?;
        }
        AssignmentAction::Delete { id } => {
            let outcome = ledger.delete_assignment(&id)?;
            print_json(&json!({ "id": id, "outcome": outcome }))?;
        }
        AssignmentAction::Get { id } => {
            print_json(&ledger.get_assignment(&id)?)?;
        }
        AssignmentAction::List {
            year,
            teacher,
            group,
            status,
        } => {
            let filter = AssignmentFilter {
                teacher_id: teacher,
                group_id: group,
                status,
            };
            print_json(&ledger.list_assignments(&year, &filter)?)?;
        }
        AssignmentAction::Check(args) => {
            let conflicts = ledger.check_assignment(&ctx.institution()?, args.into())?;
            let bodies: Vec<_> = conflicts.iter().map(|e| e.to_body()).collect();
            print_json(&bodies)?;
        }
    }
    Ok(())
}
