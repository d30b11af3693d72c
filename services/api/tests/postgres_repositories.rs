//! Repository tests against a live PostgreSQL instance
//!
//! Run with `DATABASE_URL` pointing at a scratch database and `--ignored`.

use api::{
    models::{NewComment, NewPost, NewUser, PostPatch, PostType},
    repositories::{
        CommentChange, PgPostRepository, PgUserRepository, PostRepository, UserRepository,
    },
};
use common::{
    ErrorKind,
    database::{DatabaseConfig, init_pool, run_migrations},
};
use futures::future::join_all;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn pool() -> PgPool {
    let config = DatabaseConfig::from_env().expect("database config");
    let pool = init_pool(&config).await.expect("database pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}

fn new_user(identity_id: &str) -> NewUser {
    NewUser {
        identity_id: identity_id.to_string(),
        email: format!("{}@example.com", identity_id),
        name: "Sam".to_string(),
        contact_number: "+15550001".to_string(),
        hostel_name: "North".to_string(),
        profile_photo_url: None,
    }
}

fn new_post(owner_id: &str) -> NewPost {
    NewPost {
        owner_id: owner_id.to_string(),
        location: "Library".to_string(),
        post_type: PostType::Lost,
        description: Some("black umbrella".to_string()),
        image_urls: vec!["u1".to_string(), "u2".to_string(), "u3".to_string()],
    }
}

fn comment(text: &str) -> NewComment {
    NewComment {
        author_id: "sam".to_string(),
        author_name: "Sam".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_user_round_trip_and_survey_append() {
    let pool = pool().await;
    let users = PgUserRepository::new(pool, TIMEOUT);
    let id = Uuid::new_v4().simple().to_string();

    let user = users.insert(&new_user(&id)).await.unwrap();
    assert!(user.survey_responses.is_empty());

    let err = users.insert(&new_user(&id)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);

    let appends = (0..10).map(|i| {
        let users = users.clone();
        let id = id.clone();
        async move {
            users
                .append_survey_response(&id, &format!("answer {}", i))
                .await
        }
    });
    for result in join_all(appends).await {
        assert!(result.unwrap());
    }

    let updated = users
        .set_profile_photo(&id, Some("https://cdn.example.com/p.jpg"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.survey_responses.len(), 10);
    assert_eq!(
        updated.profile_photo_url.as_deref(),
        Some("https://cdn.example.com/p.jpg")
    );

    assert!(!users.append_survey_response("missing", "x").await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_concurrent_comment_appends() {
    let pool = pool().await;
    let posts = PgPostRepository::new(pool, TIMEOUT);
    let post_id = posts.insert(&new_post("owner")).await.unwrap().id;

    let adds = (0..20).map(|i| {
        let posts = posts.clone();
        tokio::spawn(async move {
            posts
                .push_comment(post_id, &comment(&format!("comment {}", i)))
                .await
        })
    });
    for result in join_all(adds).await {
        assert!(result.unwrap().unwrap().is_some());
    }

    let stored = posts.find_by_id(post_id).await.unwrap().unwrap();
    assert_eq!(stored.comments.len(), 20);

    posts.delete(post_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_comment_update_and_removal_by_id() {
    let pool = pool().await;
    let posts = PgPostRepository::new(pool, TIMEOUT);
    let post = posts.insert(&new_post("owner")).await.unwrap();

    posts.push_comment(post.id, &comment("first")).await.unwrap();
    let post = posts
        .push_comment(post.id, &comment("found it!"))
        .await
        .unwrap()
        .unwrap();
    let target = post.comments[1].id;

    match posts
        .update_comment_text(post.id, target, "never mind")
        .await
        .unwrap()
    {
        CommentChange::Applied(updated) => {
            assert_eq!(updated.id, target);
            assert_eq!(updated.text, "never mind");
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(
        posts
            .update_comment_text(post.id, Uuid::new_v4(), "x")
            .await
            .unwrap(),
        CommentChange::CommentMissing
    );
    assert_eq!(
        posts
            .pull_comment(Uuid::new_v4(), target)
            .await
            .unwrap(),
        CommentChange::PostMissing
    );

    assert_eq!(
        posts.pull_comment(post.id, target).await.unwrap(),
        CommentChange::Applied(())
    );
    let stored = posts.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.comments.len(), 1);
    assert_eq!(stored.comments[0].text, "first");

    posts.delete(post.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_field_update_and_image_pruning() {
    let pool = pool().await;
    let posts = PgPostRepository::new(pool, TIMEOUT);
    let owner = Uuid::new_v4().simple().to_string();
    let post = posts.insert(&new_post(&owner)).await.unwrap();

    let patch = PostPatch {
        location: Some("Gym".to_string()),
        ..Default::default()
    };
    let updated = posts
        .update_fields(post.id, &patch, Some(PostType::Found))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.location, "Gym");
    assert_eq!(updated.post_type, PostType::Found);
    assert_eq!(updated.description, post.description);

    let clear = PostPatch {
        description: Some(String::new()),
        ..Default::default()
    };
    let cleared = posts
        .update_fields(post.id, &clear, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.location, "Gym");

    posts
        .remove_image_urls(post.id, &["u2".to_string()])
        .await
        .unwrap();
    let stored = posts.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.image_urls, vec!["u1".to_string(), "u3".to_string()]);

    let listed = posts.list_by_owner(&owner).await.unwrap();
    assert_eq!(listed.len(), 1);

    assert!(posts.delete(post.id).await.unwrap());
    assert!(posts.list_by_owner(&owner).await.unwrap().is_empty());
}
