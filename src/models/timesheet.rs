#[derive(sqlx::FromRow, Debug, Clone)]
pub struct TimesheetEntry {
    pub id: i64,
    pub date: chrono::NaiveDateTime,
    pub developer_id: String,
    pub team_lead_id: String,
    pub project_id: String,
    pub hours: f64,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Timesheet row with its developer, team-lead, and project references
/// resolved to names at read time.
#[derive(Debug, Clone)]
pub struct TimesheetWithNames {
    pub id: i64,
    pub date: chrono::NaiveDateTime,
    pub developer_name: String,
    pub team_lead_name: String,
    pub project_name: String,
    pub hours: f64,
}
