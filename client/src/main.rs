use fitchat_client::transport::InMemoryBackend;
use fitchat_client::{init_tracing, ChatSession, SessionContext, SyncConfig};
use fitchat_messaging::{Role, User, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Drives a coach session against the in-memory backend while the trainee
/// answers from "another device".
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SyncConfig::from_env()?;

    // Optional first argument: the trainee's user id.
    let trainee_id = match std::env::args().nth(1) {
        Some(raw) => raw.parse::<UserId>()?,
        None => UserId(2),
    };

    let coach = User::new(UserId(1), "Coach Dana");
    let trainee = User::new(trainee_id, "Sam");
    let backend = InMemoryBackend::new(coach.id);
    backend.add_user(coach.clone()).await;
    backend.add_user(trainee.clone()).await;
    backend.assign(coach.id, trainee.id).await;

    let session = ChatSession::new(
        SessionContext::new(coach.clone(), Role::Coach),
        config.clone(),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
    );

    let mut events = session.subscribe();
    let logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!(event = %json, "sync event"),
                Err(err) => warn!(%err, "unserializable sync event"),
            }
        }
    });

    session.start();

    let available = session.available_peers().await?;
    info!(count = available.len(), "assigned peers without a conversation");

    session.start_new_conversation(trainee.id).await?;
    let outcome = session
        .send("Welcome aboard! First check-in is Monday.")
        .await?;
    info!(message_id = %outcome.message.id, promoted = outcome.promoted, "message sent");

    backend
        .deliver(trainee.id, coach.id, "Thanks coach, see you Monday")
        .await;
    tokio::time::sleep(config.conversation_poll_interval + Duration::from_millis(250)).await;

    info!(
        messages = session.messages().await.len(),
        conversations = session.conversations().await.len(),
        "demo finished"
    );

    session.shutdown();
    logger.abort();
    Ok(())
}
