//! Postgres post repository
//!
//! Comments live in the `comments` JSONB array of their post. Appends,
//! edits and removals are each one `UPDATE` that rebuilds the array from
//! the row it locks, so concurrent comment writers serialize on the row.

use async_trait::async_trait;
use common::{CoreError, CoreResult, with_deadline};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::{CommentChange, PostRepository};
use crate::models::{Comment, NewComment, NewPost, Post, PostPatch, PostType};

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgPostRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn post_exists(&self, id: Uuid) -> CoreResult<bool> {
        with_deadline(self.timeout, "Post existence check", async {
            Ok(
                sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?,
            )
        })
        .await
    }

    async fn missing<T>(&self, post_id: Uuid) -> CoreResult<CommentChange<T>> {
        if self.post_exists(post_id).await? {
            Ok(CommentChange::CommentMissing)
        } else {
            Ok(CommentChange::PostMissing)
        }
    }
}

fn post_from_row(row: &PgRow) -> CoreResult<Post> {
    let post_type: String = row.try_get("post_type")?;
    let post_type = post_type.parse::<PostType>().map_err(|_| {
        CoreError::internal(format!("Stored post has unknown type '{}'", post_type))
    })?;
    let Json(comments): Json<Vec<Comment>> = row.try_get("comments")?;

    Ok(Post {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        location: row.try_get("location")?,
        post_type,
        description: row.try_get("description")?,
        image_urls: row.try_get("image_urls")?,
        comments,
        created_at: row.try_get("created_at")?,
    })
}

fn posts_from_rows(rows: &[PgRow]) -> CoreResult<Vec<Post>> {
    rows.iter().map(post_from_row).collect()
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert(&self, post: &NewPost) -> CoreResult<Post> {
        let row = with_deadline(self.timeout, "Post insert", async {
            Ok(sqlx::query(
                r#"
                INSERT INTO posts (owner_id, location, post_type, description, image_urls)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, owner_id, location, post_type, description, image_urls,
                          comments, created_at
                "#,
            )
            .bind(&post.owner_id)
            .bind(&post.location)
            .bind(post.post_type.as_str())
            .bind(&post.description)
            .bind(&post.image_urls)
            .fetch_one(&self.pool)
            .await?)
        })
        .await?;

        let post = post_from_row(&row)?;
        info!("Stored post {} for {}", post.id, post.owner_id);
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Post>> {
        let row = with_deadline(self.timeout, "Post lookup", async {
            Ok(sqlx::query(
                r#"
                SELECT id, owner_id, location, post_type, description, image_urls,
                       comments, created_at
                FROM posts
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_all(&self) -> CoreResult<Vec<Post>> {
        let rows = with_deadline(self.timeout, "Post listing", async {
            Ok(sqlx::query(
                r#"
                SELECT id, owner_id, location, post_type, description, image_urls,
                       comments, created_at
                FROM posts
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        posts_from_rows(&rows)
    }

    async fn list_by_owner(&self, owner_id: &str) -> CoreResult<Vec<Post>> {
        let rows = with_deadline(self.timeout, "Owner post listing", async {
            Ok(sqlx::query(
                r#"
                SELECT id, owner_id, location, post_type, description, image_urls,
                       comments, created_at
                FROM posts
                WHERE owner_id = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        posts_from_rows(&rows)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: &PostPatch,
        post_type: Option<PostType>,
    ) -> CoreResult<Option<Post>> {
        let row = with_deadline(self.timeout, "Post update", async {
            Ok(sqlx::query(
                r#"
                UPDATE posts
                SET description = CASE WHEN $2::text IS NULL THEN description ELSE NULLIF($2, '') END,
                    location = COALESCE($3, location),
                    post_type = COALESCE($4, post_type)
                WHERE id = $1
                RETURNING id, owner_id, location, post_type, description, image_urls,
                          comments, created_at
                "#,
            )
            .bind(id)
            .bind(&patch.description)
            .bind(&patch.location)
            .bind(post_type.map(|t| t.as_str()))
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn remove_image_urls(&self, id: Uuid, urls: &[String]) -> CoreResult<bool> {
        let result = with_deadline(self.timeout, "Post image pruning", async {
            Ok(sqlx::query(
                r#"
                UPDATE posts
                SET image_urls = ARRAY(
                    SELECT url
                    FROM unnest(posts.image_urls) WITH ORDINALITY AS images(url, idx)
                    WHERE url <> ALL($2)
                    ORDER BY idx
                )
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(urls)
            .execute(&self.pool)
            .await?)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        let result = with_deadline(self.timeout, "Post delete", async {
            Ok(sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn push_comment(&self, post_id: Uuid, comment: &NewComment) -> CoreResult<Option<Post>> {
        let row = with_deadline(self.timeout, "Comment append", async {
            Ok(sqlx::query(
                r#"
                UPDATE posts
                SET comments = comments || jsonb_build_array(jsonb_build_object(
                    'id', gen_random_uuid(),
                    'authorId', $2::text,
                    'authorName', $3::text,
                    'text', $4::text,
                    'createdAt', NOW()
                ))
                WHERE id = $1
                RETURNING id, owner_id, location, post_type, description, image_urls,
                          comments, created_at
                "#,
            )
            .bind(post_id)
            .bind(&comment.author_id)
            .bind(&comment.author_name)
            .bind(&comment.text)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn update_comment_text(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> CoreResult<CommentChange<Comment>> {
        let row = with_deadline(self.timeout, "Comment update", async {
            Ok(sqlx::query(
                r#"
                UPDATE posts
                SET comments = (
                    SELECT jsonb_agg(
                        CASE WHEN entry->>'id' = $2::text
                             THEN jsonb_set(entry, '{text}', to_jsonb($3::text))
                             ELSE entry
                        END
                        ORDER BY idx
                    )
                    FROM jsonb_array_elements(posts.comments) WITH ORDINALITY AS entries(entry, idx)
                )
                WHERE id = $1
                  AND comments @> jsonb_build_array(jsonb_build_object('id', $2::text))
                RETURNING (
                    SELECT entry
                    FROM jsonb_array_elements(posts.comments) AS updated(entry)
                    WHERE entry->>'id' = $2::text
                ) AS comment
                "#,
            )
            .bind(post_id)
            .bind(comment_id.to_string())
            .bind(text)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await?;

        match row {
            Some(row) => {
                let Json(comment): Json<Comment> = row.try_get("comment")?;
                Ok(CommentChange::Applied(comment))
            }
            None => self.missing(post_id).await,
        }
    }

    async fn pull_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> CoreResult<CommentChange<()>> {
        let result = with_deadline(self.timeout, "Comment removal", async {
            Ok(sqlx::query(
                r#"
                UPDATE posts
                SET comments = COALESCE((
                    SELECT jsonb_agg(entry ORDER BY idx)
                    FROM jsonb_array_elements(posts.comments) WITH ORDINALITY AS entries(entry, idx)
                    WHERE entry->>'id' <> $2::text
                ), '[]'::jsonb)
                WHERE id = $1
                  AND comments @> jsonb_build_array(jsonb_build_object('id', $2::text))
                "#,
            )
            .bind(post_id)
            .bind(comment_id.to_string())
            .execute(&self.pool)
            .await?)
        })
        .await?;

        if result.rows_affected() > 0 {
            Ok(CommentChange::Applied(()))
        } else {
            warn!("Comment {} not removed from post {}", comment_id, post_id);
            self.missing(post_id).await
        }
    }
}
