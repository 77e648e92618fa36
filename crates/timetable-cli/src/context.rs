//! Per-invocation settings shared by every command.

use std::error::Error;
use std::path::PathBuf;

use chrono::NaiveTime;
use serde::Serialize;
use timetable_core::{Config, CoreError, TimetableDb};

pub type CliResult = Result<(), Box<dyn Error>>;

pub struct Context {
    pub config: Config,
    db: Option<PathBuf>,
    institution: Option<String>,
}

impl Context {
    pub fn new(config: Config, db: Option<PathBuf>, institution: Option<String>) -> Self {
        Self {
            config,
            db,
            institution,
        }
    }

    /// Open the database named by `--db`, else the configured one.
    pub fn open_db(&self) -> Result<TimetableDb, CoreError> {
        match &self.db {
            Some(path) => Ok(TimetableDb::open_at(path, self.config.busy_timeout())?),
            None => TimetableDb::open_with_config(&self.config),
        }
    }

    /// `--institution`, else `institution.default_id`.
    pub fn institution(&self) -> Result<String, Box<dyn Error>> {
        self.institution
            .clone()
            .or_else(|| self.config.institution.default_id.clone())
            .ok_or_else(|| {
                "no institution: pass --institution or set institution.default_id".into()
            })
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Clock time as `HH:MM` or `HH:MM:SS`.
pub fn parse_clock(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_accepts_minutes_and_seconds() {
        assert_eq!(parse_clock("08:30").unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(
            parse_clock("08:30:15").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 15).unwrap()
        );
        assert!(parse_clock("8h30").is_err());
    }

    #[test]
    fn flag_institution_wins_over_config() {
        let mut config = Config::default();
        config.institution.default_id = Some("from-config".into());
        let ctx = Context::new(config.clone(), None, Some("from-flag".into()));
        assert_eq!(ctx.institution().unwrap(), "from-flag");
        let ctx = Context::new(config, None, None);
        assert_eq!(ctx.institution().unwrap(), "from-config");
        let ctx = Context::new(Config::default(), None, None);
        assert!(ctx.institution().is_err());
    }
}
