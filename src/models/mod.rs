mod user;
mod developer;
mod project;
mod timesheet;
mod datasheet_link;

pub use user::User;
pub use developer::Developer;
pub use project::Project;
pub use timesheet::{TimesheetEntry, TimesheetWithNames};
pub use datasheet_link::DatasheetLink;
