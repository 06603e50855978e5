use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::Grievance;

#[async_trait]
pub trait GrievanceStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<Grievance>>;
}

#[derive(Clone)]
pub struct PgGrievanceStore {
    db: PgPool,
}

impl PgGrievanceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GrievanceStore for PgGrievanceStore {
    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<Grievance>> {
        let row = sqlx::query_as::<_, Grievance>(
            r#"
            SELECT grievance_code, complainant_name, complainant_email, description,
                   created_at, ai_resolved, current_status
              FROM grievances
             WHERE grievance_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("find grievance {code}"))?;
        Ok(row)
    }
}
