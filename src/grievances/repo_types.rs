use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Grievance as written by the grievance-management side; read-only here.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Grievance {
    pub grievance_code: String,
    pub complainant_name: String,
    pub complainant_email: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub ai_resolved: bool,
    pub current_status: String,
}
