//! Postgres user repository

use async_trait::async_trait;
use common::{CoreError, CoreResult, with_deadline};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use tracing::{info, warn};

use super::UserRepository;
use crate::models::{NewUser, User};

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

fn user_from_row(row: &PgRow) -> CoreResult<User> {
    Ok(User {
        identity_id: row.try_get("identity_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        contact_number: row.try_get("contact_number")?,
        hostel_name: row.try_get("hostel_name")?,
        profile_photo_url: row.try_get("profile_photo_url")?,
        survey_responses: row.try_get("survey_responses")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &NewUser) -> CoreResult<User> {
        let result = with_deadline(self.timeout, "User insert", async {
            sqlx::query(
                r#"
                INSERT INTO users (identity_id, email, name, contact_number, hostel_name, profile_photo_url)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING identity_id, email, name, contact_number, hostel_name,
                          profile_photo_url, survey_responses, created_at, updated_at
                "#,
            )
            .bind(&user.identity_id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.contact_number)
            .bind(&user.hostel_name)
            .bind(&user.profile_photo_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    warn!("User {} already stored: {}", user.identity_id, db);
                    CoreError::DuplicateIdentity("User already exists".to_string())
                }
                other => CoreError::from(other),
            })
        })
        .await?;

        info!("Stored user {}", user.identity_id);
        user_from_row(&result)
    }

    async fn find_by_identity(&self, identity_id: &str) -> CoreResult<Option<User>> {
        let row = with_deadline(self.timeout, "User lookup", async {
            Ok(sqlx::query(
                r#"
                SELECT identity_id, email, name, contact_number, hostel_name,
                       profile_photo_url, survey_responses, created_at, updated_at
                FROM users
                WHERE identity_id = $1
                "#,
            )
            .bind(identity_id)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_profile_photo(
        &self,
        identity_id: &str,
        url: Option<&str>,
    ) -> CoreResult<Option<User>> {
        let row = with_deadline(self.timeout, "Profile photo update", async {
            Ok(sqlx::query(
                r#"
                UPDATE users
                SET profile_photo_url = $2, updated_at = NOW()
                WHERE identity_id = $1
                RETURNING identity_id, email, name, contact_number, hostel_name,
                          profile_photo_url, survey_responses, created_at, updated_at
                "#,
            )
            .bind(identity_id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_hostel(&self, identity_id: &str, hostel_name: &str) -> CoreResult<Option<User>> {
        let row = with_deadline(self.timeout, "Hostel update", async {
            Ok(sqlx::query(
                r#"
                UPDATE users
                SET hostel_name = $2, updated_at = NOW()
                WHERE identity_id = $1
                RETURNING identity_id, email, name, contact_number, hostel_name,
                          profile_photo_url, survey_responses, created_at, updated_at
                "#,
            )
            .bind(identity_id)
            .bind(hostel_name)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn append_survey_response(&self, identity_id: &str, response: &str) -> CoreResult<bool> {
        let result = with_deadline(self.timeout, "Survey append", async {
            Ok(sqlx::query(
                r#"
                UPDATE users
                SET survey_responses = array_append(survey_responses, $2), updated_at = NOW()
                WHERE identity_id = $1
                "#,
            )
            .bind(identity_id)
            .bind(response)
            .execute(&self.pool)
            .await?)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
