pub mod assignment;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod placement;
pub mod timetable;
