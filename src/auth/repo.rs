use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{ContactRow, NewUser, ProfilePatch, User};

/// Outcome of an insert that may collide with an existing email.
#[derive(Debug)]
pub enum CreateUser {
    Created(User),
    EmailTaken,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> anyhow::Result<CreateUser>;
    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> anyhow::Result<Option<User>>;
    async fn list_contacts(&self) -> anyhow::Result<Vec<ContactRow>>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, gender, phone, address, city, state, \
                            pincode, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<CreateUser> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, gender, phone, address, city, state, pincode)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.gender)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.city)
        .bind(&user.state)
        .bind(&user.pincode)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(CreateUser::Created(u)),
            // The unique index on email settles races between concurrent signups.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(CreateUser::EmailTaken),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name       = COALESCE($2, name),
                   gender     = COALESCE($3, gender),
                   phone      = COALESCE($4, phone),
                   address    = COALESCE($5, address),
                   city       = COALESCE($6, city),
                   state      = COALESCE($7, state),
                   pincode    = COALESCE($8, pincode),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.gender)
        .bind(patch.phone)
        .bind(patch.address)
        .bind(patch.city)
        .bind(patch.state)
        .bind(patch.pincode)
        .fetch_optional(&self.db)
        .await
        .context("update user profile")?;
        Ok(user)
    }

    async fn list_contacts(&self) -> anyhow::Result<Vec<ContactRow>> {
        let rows = sqlx::query_as::<_, ContactRow>(
            r#"
            SELECT id, name, email, gender, phone, address, city, state, pincode
              FROM users
             ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list user contacts")?;
        Ok(rows)
    }
}
