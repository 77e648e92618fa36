//! Placement management commands for CLI.

use clap::Subcommand;
use serde_json::json;
use timetable_core::{DayOfWeek, NewPlacement, PlacementEngine, PlacementFilter};

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum PlacementAction {
    /// Place an assignment in a classroom at its own day and slot
    Create {
        /// Assignment ID
        #[arg(long)]
        assignment: String,
        /// Classroom ID
        #[arg(long)]
        classroom: String,
        /// Time slot ID
        #[arg(long)]
        slot: String,
        /// Day of week
        #[arg(long)]
        day: DayOfWeek,
        /// Academic year ID
        #[arg(long)]
        year: String,
    },
    /// Move a placement to another classroom
    Move {
        /// Placement ID
        id: String,
        /// New classroom ID
        #[arg(long)]
        classroom: String,
    },
    /// Remove a placement
    Delete {
        /// Placement ID
        id: String,
    },
    /// Get placement details
    Get {
        /// Placement ID
        id: String,
    },
    /// List live placements of an academic year
    List {
        /// Academic year ID
        #[arg(long)]
        year: String,
        #[arg(long)]
        classroom: Option<String>,
        #[arg(long)]
        assignment: Option<String>,
    },
    /// Remove placements whose assignment is no longer active
    Sweep,
}

pub fn run(ctx: &Context, action: PlacementAction) -> CliResult {
    let db = ctx.open_db()?;
    let engine = PlacementEngine::new(&db);

    match action {
        PlacementAction::Create {
            assignment,
            classroom,
            slot,
            day,
            year,
        } => {
            let input = NewPlacement {
                assignment_id: assignment,
                classroom_id: classroom,
                time_slot_id: slot,
                day_of_week: day,
                academic_year_id: year,
            };
            print_json(&engine.create_placement(&ctx.institution()?, input)?)?;
        }
        PlacementAction::Move { id, classroom } => {
            print_json(&engine.move_placement(&ctx.institution()?, &id, &classroom)?)?;
        }
        PlacementAction::Delete { id } => {
            let outcome = engine.delete_placement(&id)?;
            print_json(&json!({ "id": id, "outcome": outcome }))?;
        }
        PlacementAction::Get { id } => {
            print_json(&engine.get_placement(&id)?)?;
        }
        PlacementAction::List {
            year,
            classroom,
            assignment,
        } => {
            let filter = PlacementFilter {
                classroom_id: classroom,
                assignment_id: assignment,
            };
            print_json(&engine.list_placements(&year, &filter)?)?;
        }
        PlacementAction::Sweep => {
            let removed = engine.sweep_orphaned_placements()?;
            print_json(&json!({ "removed": removed }))?;
        }
    }
    Ok(())
}
