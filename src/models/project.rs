#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub project_name: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}
