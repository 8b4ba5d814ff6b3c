//! Database and schema tests
//!
//! Tests SQLite migrations, entity storage, and the SQLite-backed stores

use chrono::Utc;
use di::Ref;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;
use study_chat_server::core::error::ChatError;
use study_chat_server::core::types::{NewConversation, NewMessage, UserId};
use study_chat_server::infrastructure::database::DatabaseConnection;
use study_chat_server::infrastructure::entities::{DEFAULT_TITLE, Sender};
use study_chat_server::infrastructure::repositories::{
    DbConversationRepository, DbMessageRepository,
};
use study_chat_server::infrastructure::traits::{ConversationRepository, MessageRepository};
use uuid::Uuid;

/// Setup test database with migrations
async fn setup_test_db() -> SqlitePool {
    // A single connection, every `:memory:` connection is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

fn repositories(pool: &SqlitePool) -> (DbConversationRepository, DbMessageRepository) {
    let connection = Ref::new(DatabaseConnection::from_pool(pool.clone()));
    (
        DbConversationRepository::new(connection.clone()),
        DbMessageRepository::new(connection),
    )
}

async fn pause() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_database_migrations_work() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table'")
            .fetch_all(&pool)
            .await
            .unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

    assert!(names.contains(&"conversations"));
    assert!(names.contains(&"messages"));
}

#[tokio::test]
async fn test_sender_enum_storage() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();
    messages
        .append(user, conversation.id, NewMessage::user("question"))
        .await
        .unwrap();
    messages
        .append(
            user,
            conversation.id,
            NewMessage::assistant("answer", vec!["notes.pdf".to_owned()]),
        )
        .await
        .unwrap();

    let stored: Vec<(i64,)> =
        sqlx::query_as("SELECT sender FROM messages WHERE conversation_id = ? ORDER BY sequence")
            .bind(conversation.id)
            .fetch_all(&pool)
            .await
            .unwrap();

    assert_eq!(stored, vec![(1,), (2,)]);
}

#[tokio::test]
async fn test_conversation_cascade_delete() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();
    messages
        .append(user, conversation.id, NewMessage::user("Test"))
        .await
        .unwrap();

    // Delete conversation directly, the foreign key takes the messages along
    sqlx::query("DELETE FROM conversations WHERE id = ?")
        .bind(conversation.id)
        .execute(&pool)
        .await
        .unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
        .bind(conversation.id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn test_create_uses_default_title_and_keeps_provenance() {
    let pool = setup_test_db().await;
    let (conversations, _) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let untitled = conversations
        .create(user, NewConversation::titled("   "))
        .await
        .unwrap();
    assert_eq!(untitled.title, DEFAULT_TITLE);
    assert_eq!(untitled.created_at, untitled.updated_at);

    let from_material = conversations
        .create(
            user,
            NewConversation {
                title: Some("Linked lists".to_owned()),
                course_id: Some("cs101".to_owned()),
                material_id: Some("mat-1".to_owned()),
            },
        )
        .await
        .unwrap();

    let stored = conversations
        .get(user, from_material.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Linked lists");
    assert_eq!(stored.started_from_course_id.as_deref(), Some("cs101"));
    assert_eq!(stored.started_from_material_id.as_deref(), Some("mat-1"));
}

#[tokio::test]
async fn test_list_orders_by_most_recent_activity() {
    let pool = setup_test_db().await;
    let (conversations, _) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let older = conversations
        .create(user, NewConversation::titled("older"))
        .await
        .unwrap();
    pause().await;
    let newer = conversations
        .create(user, NewConversation::titled("newer"))
        .await
        .unwrap();

    let listed: Vec<Uuid> = conversations
        .list(user)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed, vec![newer.id, older.id]);

    pause().await;
    conversations.touch(user, older.id, None).await.unwrap();

    let listed: Vec<Uuid> = conversations
        .list(user)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed, vec![older.id, newer.id]);
}

#[tokio::test]
async fn test_rename_with_blank_title_keeps_title_but_advances_updated_at() {
    let pool = setup_test_db().await;
    let (conversations, _) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::titled("Algorithms"))
        .await
        .unwrap();
    pause().await;

    conversations
        .rename(user, conversation.id, "  ")
        .await
        .unwrap();

    let stored = conversations
        .get(user, conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Algorithms");
    assert!(stored.updated_at > conversation.updated_at);
    assert!(stored.updated_at >= stored.created_at);
}

#[tokio::test]
async fn test_rename_unknown_conversation_is_not_found() {
    let pool = setup_test_db().await;
    let (conversations, _) = repositories(&pool);

    let result = conversations
        .rename(UserId(Uuid::new_v4()), Uuid::new_v4(), "My Notes")
        .await;

    assert!(matches!(result, Err(ChatError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_unknown_conversation_succeeds() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    conversations.delete(user, Uuid::new_v4()).await.unwrap();
    messages
        .delete_for_conversation(user, Uuid::new_v4())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_touch_derives_title_only_while_untitled() {
    let pool = setup_test_db().await;
    let (conversations, _) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();

    conversations
        .touch(user, conversation.id, Some("What is a stack?"))
        .await
        .unwrap();
    conversations
        .touch(user, conversation.id, Some("Something else entirely"))
        .await
        .unwrap();

    let stored = conversations
        .get(user, conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "What is a stack?");
}

#[tokio::test]
async fn test_messages_are_listed_in_append_order() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();

    for i in 0..5 {
        let message = if i % 2 == 0 {
            NewMessage::user(format!("question {i}"))
        } else {
            NewMessage::assistant(format!("answer {i}"), Vec::new())
        };
        messages
            .append(user, conversation.id, message)
            .await
            .unwrap();
    }

    let listed = messages
        .list_for_conversation(user, conversation.id)
        .await
        .unwrap();

    assert_eq!(listed.len(), 5);
    assert_eq!(
        listed.iter().map(|m| m.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(listed.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert_eq!(listed[0].sender, Sender::User);
    assert_eq!(listed[1].sender, Sender::Assistant);
    assert_eq!(listed[4].content, "question 4");
}

#[tokio::test]
async fn test_assistant_sources_round_trip() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();
    messages
        .append(
            user,
            conversation.id,
            NewMessage::assistant(
                "answer",
                vec!["Process Management.pdf".to_owned(), "Trees.ppt".to_owned()],
            ),
        )
        .await
        .unwrap();

    let listed = messages
        .list_for_conversation(user, conversation.id)
        .await
        .unwrap();
    assert_eq!(
        listed[0].source_labels(),
        ["Process Management.pdf".to_owned(), "Trees.ppt".to_owned()]
    );
}

#[tokio::test]
async fn test_append_rejects_empty_user_message() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let user = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();

    let result = messages
        .append(user, conversation.id, NewMessage::user("  "))
        .await;
    assert!(matches!(result, Err(ChatError::Validation(_))));
}

#[tokio::test]
async fn test_append_to_unknown_conversation_is_not_found() {
    let pool = setup_test_db().await;
    let (_, messages) = repositories(&pool);

    let result = messages
        .append(
            UserId(Uuid::new_v4()),
            Uuid::new_v4(),
            NewMessage::user("hello"),
        )
        .await;
    assert!(matches!(result, Err(ChatError::NotFound(_))));
}

#[tokio::test]
async fn test_other_users_cannot_reach_a_conversation() {
    let pool = setup_test_db().await;
    let (conversations, messages) = repositories(&pool);
    let owner = UserId(Uuid::new_v4());
    let intruder = UserId(Uuid::new_v4());

    let conversation = conversations
        .create(owner, NewConversation::default())
        .await
        .unwrap();
    messages
        .append(owner, conversation.id, NewMessage::user("private"))
        .await
        .unwrap();

    assert!(conversations.list(intruder).await.unwrap().is_empty());
    assert!(
        conversations
            .get(intruder, conversation.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        messages
            .list_for_conversation(intruder, conversation.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        messages
            .append(intruder, conversation.id, NewMessage::user("hi"))
            .await,
        Err(ChatError::NotFound(_))
    ));

    // Deleting someone else's conversation is a no-op
    messages
        .delete_for_conversation(intruder, conversation.id)
        .await
        .unwrap();
    conversations.delete(intruder, conversation.id).await.unwrap();

    let remaining = messages
        .list_for_conversation(owner, conversation.id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(conversations.get(owner, conversation.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_timestamps_are_stored_as_text() {
    let pool = setup_test_db().await;
    let (conversations, _) = repositories(&pool);
    let user = UserId(Uuid::new_v4());
    let before = Utc::now();

    let conversation = conversations
        .create(user, NewConversation::default())
        .await
        .unwrap();

    let row: (String,) = sqlx::query_as("SELECT created_at FROM conversations WHERE id = ?")
        .bind(conversation.id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let parsed = chrono::DateTime::parse_from_rfc3339(&row.0).unwrap();
    assert!(parsed >= before);
}
