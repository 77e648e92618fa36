use clap::{ArgGroup, Subcommand};
use timetable_core::{weekly_timetable, TimetableView};

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum TimetableAction {
    /// Weekly timetable of one teacher, group or classroom
    #[command(group(ArgGroup::new("view").required(true).args(["teacher", "group", "classroom"])))]
    Show {
        /// Academic year ID
        #[arg(long)]
        year: String,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        classroom: Option<String>,
    },
}

pub fn run(ctx: &Context, action: TimetableAction) -> CliResult {
    let db = ctx.open_db()?;
    let institution = ctx.institution()?;

    let TimetableAction::Show {
        year,
        teacher,
        group,
        classroom,
    } = action;
    let view = match (teacher, group, classroom) {
        (Some(id), _, _) => TimetableView::Teacher(id),
        (_, Some(id), _) => TimetableView::Group(id),
        (_, _, Some(id)) => TimetableView::Classroom(id),
        (None, None, None) => return Err("one of --teacher, --group or --classroom is required".into()),
    };
    print_json(&weekly_timetable(&db, &institution, &year, &view)?)
}
