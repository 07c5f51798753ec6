#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DatasheetLink {
    pub id: i64,
    pub datasheet_link: String,
    pub is_enabled: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}
