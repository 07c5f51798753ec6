#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Developer {
    pub id: i64,
    pub name: String,
    pub team_lead: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}
