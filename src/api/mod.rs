use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::config::Config;
use crate::db::{Database, NewTimesheetEntry};
use crate::error::ApiError;
use crate::sheets::{self, SheetRecord, SheetsClient};

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/create-master-developer", post(create_master_developer))
        .route("/get-master-developer", get(get_master_developer))
        .route(
            "/delete-master-developer/:developer_id",
            delete(delete_master_developer),
        )
        .route("/create-master-project", post(create_master_project))
        .route("/get-master-projects", get(get_master_projects))
        .route(
            "/delete-master-project/:project_id",
            delete(delete_master_project),
        )
        .route("/read-spreadsheet-data", post(read_spreadsheet_data))
        .route("/save-timesheet-data", post(save_timesheet_data))
        .route("/get-timesheets-data", get(get_timesheets_data))
        .route(
            "/delete-timesheet-data/:date_to_delete",
            delete(delete_timesheet_data),
        )
        .route(
            "/delete-today-timesheet-data",
            delete(delete_today_timesheet_data),
        )
        .route("/save-datasheet-link", post(save_datasheet_link))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Request payloads

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub super_user: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeveloperRequest {
    pub name: String,
    #[serde(default)]
    pub team_lead: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub project_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadSpreadsheetRequest {
    pub sheet_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetDatasheetLinkRequest {
    pub datasheet_link: String,
}

// Response payloads

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CreateDeveloperResponse {
    pub message: &'static str,
    pub new_developer: i64,
}

#[derive(Debug, Serialize)]
pub struct DeveloperRow {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TL")]
    pub team_lead: bool,
}

#[derive(Debug, Serialize)]
pub struct DeveloperListResponse {
    pub master_developer: Vec<DeveloperRow>,
}

#[derive(Debug, Serialize)]
pub struct CreateProjectResponse {
    pub message: &'static str,
    pub project_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ProjectRow {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Project_name")]
    pub project_name: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub master_projects: Vec<ProjectRow>,
}

/// Deletes report "not found" inline rather than via a status code.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DeleteResponse {
    Deleted { message: &'static str },
    NotFound { error: &'static str },
}

#[derive(Debug, Serialize)]
pub struct SpreadsheetResponse {
    pub excel_data: Vec<SheetRecord>,
}

#[derive(Debug, Serialize)]
pub struct TimesheetRow {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Date")]
    pub date: chrono::NaiveDateTime,
    #[serde(rename = "Developer")]
    pub developer: String,
    #[serde(rename = "Team Lead")]
    pub team_lead: String,
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "Hours")]
    pub hours: f64,
}

#[derive(Debug, Serialize)]
pub struct DatasheetLinkResponse {
    pub message: &'static str,
    pub datasheet_link: String,
    pub is_enabled: bool,
}

// Handlers

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !auth::email_is_valid(&payload.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    if !auth::password_is_complex(&payload.password) {
        return Err(ApiError::Validation(
            "Password must contain at least one uppercase letter, one lowercase letter, \
             one digit, and one special character"
                .to_string(),
        ));
    }

    if state.db.get_user_by_email(&payload.email).await?.is_some() {
        return Err(ApiError::Validation("Email already registered".to_string()));
    }

    let hashed_password = auth::hash_password(&payload.password)
        .map_err(|e| ApiError::internal("Internal server error", e))?;

    state
        .db
        .create_user(
            &payload.first_name,
            &payload.last_name,
            &payload.email,
            &hashed_password,
            payload.super_user,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "User created successfully".to_string(),
    }))
}

async fn login_user(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !auth::email_is_valid(&form.username) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    let Some(user) = state.db.authenticate_user(&form.username, &form.password).await? else {
        return Err(ApiError::Unauthorized(
            "Incorrect email or password".to_string(),
        ));
    };

    let access_token = auth::create_access_token(&user.email, &state.config.token_secret)
        .map_err(|e| ApiError::internal("Internal server error", e))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

async fn create_master_developer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeveloperRequest>,
) -> Result<Json<CreateDeveloperResponse>, ApiError> {
    let developer = state
        .db
        .create_master_developer(&payload.name, payload.team_lead)
        .await?;

    Ok(Json(CreateDeveloperResponse {
        message: "Master Developer created successfully",
        new_developer: developer.id,
    }))
}

async fn get_master_developer(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeveloperListResponse>, ApiError> {
    let developers = state.db.get_master_developers().await?;

    Ok(Json(DeveloperListResponse {
        master_developer: developers
            .into_iter()
            .map(|d| DeveloperRow {
                id: d.id,
                name: d.name,
                team_lead: d.team_lead,
            })
            .collect(),
    }))
}

async fn delete_master_developer(
    State(state): State<Arc<AppState>>,
    Path(developer_id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.db.delete_master_developer(developer_id).await?;

    Ok(Json(if deleted {
        DeleteResponse::Deleted {
            message: "Master Developer deleted successfully",
        }
    } else {
        DeleteResponse::NotFound {
            error: "Master Developer not found",
        }
    }))
}

async fn create_master_project(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<Json<CreateProjectResponse>, ApiError> {
    let project = state.db.create_master_project(&payload.project_name).await?;

    Ok(Json(CreateProjectResponse {
        message: "Master Project created successfully",
        project_id: project.id,
    }))
}

async fn get_master_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let projects = state.db.get_master_projects().await?;

    Ok(Json(ProjectListResponse {
        master_projects: projects
            .into_iter()
            .map(|p| ProjectRow {
                id: p.id,
                project_name: p.project_name,
            })
            .collect(),
    }))
}

async fn delete_master_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.db.delete_master_project(project_id).await?;

    Ok(Json(if deleted {
        DeleteResponse::Deleted {
            message: "Master Project deleted successfully",
        }
    } else {
        DeleteResponse::NotFound {
            error: "Master Project not found",
        }
    }))
}

async fn read_spreadsheet_data(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ReadSpreadsheetRequest>>,
) -> Result<Json<SpreadsheetResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();

    // Explicit link from the caller wins, then the configured override,
    // then the stored active link.
    let sheet_link = match payload.sheet_link.or_else(|| state.config.sheet_link.clone()) {
        Some(link) => link,
        None => state
            .db
            .active_link()
            .await?
            .map(|l| l.datasheet_link)
            .ok_or_else(|| ApiError::NotFound("No active datasheet link configured".to_string()))?,
    };

    let credentials = state.config.sheets_credentials.as_deref().ok_or_else(|| {
        ApiError::Internal {
            message: "Spreadsheet credentials not configured".to_string(),
            source: None,
        }
    })?;

    let client = SheetsClient::from_credentials_file(credentials)
        .map_err(|e| ApiError::internal("Error reading spreadsheet data", e))?;

    let grid = client
        .fetch_first_sheet(&sheet_link)
        .await
        .map_err(|e| ApiError::internal("Error reading spreadsheet data", e))?;

    let excel_data = sheets::grid_to_records(&grid);
    if excel_data.is_empty() {
        return Err(ApiError::NotFound(
            "No data found in the spreadsheet".to_string(),
        ));
    }

    Ok(Json(SpreadsheetResponse { excel_data }))
}

async fn save_timesheet_data(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<MessageResponse>, ApiError> {
    // The batch arrives as loose JSON so a malformed entry is a 400
    // rather than a framework-level rejection.
    let entries: Vec<NewTimesheetEntry> = serde_json::from_value(payload)
        .map_err(|_| ApiError::Validation("Invalid timesheet data format".to_string()))?;

    if entries.is_empty() {
        return Err(ApiError::Validation(
            "No valid timesheet data received".to_string(),
        ));
    }

    state
        .db
        .save_timesheet_batch(&entries)
        .await
        .map_err(|e| ApiError::internal("Error saving timesheet data", e))?;

    Ok(Json(MessageResponse {
        message: "TimeSheetData saved successfully".to_string(),
    }))
}

async fn get_timesheets_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TimesheetRow>>, ApiError> {
    let timesheets = state
        .db
        .get_timesheets_with_names()
        .await
        .map_err(|e| ApiError::internal("Error fetching timesheet data", e))?;

    Ok(Json(
        timesheets
            .into_iter()
            .map(|t| TimesheetRow {
                id: t.id,
                date: t.date,
                developer: t.developer_name,
                team_lead: t.team_lead_name,
                project: t.project_name,
                hours: t.hours,
            })
            .collect(),
    ))
}

async fn delete_timesheet_data(
    State(state): State<Arc<AppState>>,
    Path(date_to_delete): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let date = NaiveDate::parse_from_str(&date_to_delete, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date format. Use YYYY-MM-DD".to_string()))?;

    delete_timesheets_for(&state, date).await
}

async fn delete_today_timesheet_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    delete_timesheets_for(&state, Utc::now().date_naive()).await
}

async fn delete_timesheets_for(
    state: &AppState,
    date: NaiveDate,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = state.db.delete_timesheets_by_date(date).await?;

    let message = if deleted == 0 {
        "No timesheet data found for the specified date".to_string()
    } else {
        format!("Timesheet data for {date} deleted successfully")
    };

    Ok(Json(MessageResponse { message }))
}

async fn save_datasheet_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetDatasheetLinkRequest>,
) -> Result<Json<DatasheetLinkResponse>, ApiError> {
    let (link, created) = state.db.set_active_link(&payload.datasheet_link).await?;

    Ok(Json(DatasheetLinkResponse {
        message: if created {
            "Datasheet Link saved successfully"
        } else {
            "Datasheet Link updated successfully"
        },
        datasheet_link: link.datasheet_link,
        is_enabled: link.is_enabled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            token_secret: "test-secret".to_string(),
            sheets_credentials: None,
            sheet_link: None,
        };
        Arc::new(AppState { db, config })
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn register_body(email: &str) -> Value {
        serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": email,
            "password": "Valid1!pass",
            "super_user": false,
        })
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let app = router(test_state().await);

        let mut body = register_body("ada@example.com");
        body["password"] = Value::String("alllowercase1!".to_string());
        let response = app
            .oneshot(json_request("POST", "/register", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let state = test_state().await;

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/register",
                register_body("ada@example.com"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "User created successfully"
        );

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/register",
                register_body("ada@example.com"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn login_round_trip() {
        let state = test_state().await;

        router(state.clone())
            .oneshot(json_request(
                "POST",
                "/register",
                register_body("ada@example.com"),
            ))
            .await
            .unwrap();

        let form = "username=ada%40example.com&password=Valid1!pass";
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["token_type"], "bearer");
        let claims = auth::decode_access_token(
            body["access_token"].as_str().unwrap(),
            &state.config.token_secret,
        )
        .unwrap();
        assert_eq!(claims.sub, "ada@example.com");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let state = test_state().await;

        router(state.clone())
            .oneshot(json_request(
                "POST",
                "/register",
                register_body("ada@example.com"),
            ))
            .await
            .unwrap();

        let form = "username=ada%40example.com&password=Wrong1!pass";
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_missing_developer_reports_inline_error() {
        let app = router(test_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/delete-master-developer/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["error"], "Master Developer not found");
    }

    #[tokio::test]
    async fn malformed_timesheet_batch_is_a_400() {
        let app = router(test_state().await);

        let response = app
            .oneshot(json_request(
                "POST",
                "/save-timesheet-data",
                serde_json::json!([{ "developer_id": "1" }]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["detail"],
            "Invalid timesheet data format"
        );
    }

    #[tokio::test]
    async fn empty_timesheet_batch_is_a_400() {
        let app = router(test_state().await);

        let response = app
            .oneshot(json_request(
                "POST",
                "/save-timesheet-data",
                serde_json::json!([]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_date_format_is_a_400() {
        let app = router(test_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/delete-timesheet-data/15-01-2024")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["detail"],
            "Invalid date format. Use YYYY-MM-DD"
        );
    }
}
