use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking};
use kiosk_db::models::{ConversationSummaryRow, MessageRow};
use kiosk_db::{now_ts, parse_ts};
use kiosk_types::api::{
    ConversationResponse, MessageResponse, SendMessageRequest, SendMessageResponse,
};

const MAX_MESSAGE_LEN: usize = 2000;

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::nil()
    })
}

fn message_response(m: &MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&m.id, "message id"),
        conversation_id: parse_uuid(&m.conversation_id, "conversation id"),
        listing_id: parse_uuid(&m.listing_id, "listing id"),
        listing_title: m.listing_title.clone(),
        sender_id: parse_uuid(&m.sender_id, "sender id"),
        sender_name: m.sender_name.clone(),
        receiver_id: parse_uuid(&m.receiver_id, "receiver id"),
        receiver_name: m.receiver_name.clone(),
        content: m.content.clone(),
        is_read: m.is_read,
        created_at: parse_ts(&m.created_at),
    }
}

fn conversation_response(c: &ConversationSummaryRow) -> ConversationResponse {
    ConversationResponse {
        id: parse_uuid(&c.id, "conversation id"),
        listing_id: parse_uuid(&c.listing_id, "listing id"),
        listing_title: c.listing_title.clone(),
        listing_photo: c.listing_photo.clone(),
        listing_price: c.listing_price,
        other_user_id: parse_uuid(&c.other_user_id, "user id"),
        other_user_name: c.other_user_name.clone(),
        last_message: c.last_message.clone(),
        last_message_date: parse_ts(&c.last_message_at),
        unread_count: c.unread_count,
    }
}

/// Start or continue a conversation about a listing. The receiver is always
/// the listing owner, so only a buyer can post here; messaging your own
/// listing is rejected.
pub async fn send(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::validation("message cannot be empty"));
    }
    if content.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation(format!(
            "message cannot exceed {MAX_MESSAGE_LEN} characters"
        )));
    }

    let listing = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&req.listing_id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if listing.user_id == user.id.to_string() {
        return Err(ApiError::validation(
            "you cannot message yourself about your own listing",
        ));
    }

    let message_id = Uuid::new_v4();
    let conversation_id = Uuid::new_v4();

    let (actual_conversation, listing_title, receiver_id) = {
        let state = state.clone();
        let sender = user.id.to_string();
        let receiver = listing.user_id.clone();
        let title = listing.title.clone();
        let content = content.clone();
        blocking(move || {
            let conv = state.db.record_message(
                &conversation_id.to_string(),
                &message_id.to_string(),
                &listing.id,
                &sender,
                &receiver,
                &content,
                &now_ts(),
            )?;
            Ok((conv, title, receiver))
        })
        .await?
    };

    // Email the listing owner about the new message, best-effort.
    {
        let state = state.clone();
        let sender_name = user.pseudo.clone();
        tokio::task::spawn_blocking(move || match state.db.get_user_by_id(&receiver_id) {
            Ok(Some(receiver)) => {
                state.mailer.send_new_message_notice(
                    &receiver.email,
                    &receiver.pseudo,
                    &sender_name,
                    &listing_title,
                );
            }
            Ok(None) => warn!("Receiver {} vanished before message notice", receiver_id),
            Err(e) => warn!("Receiver lookup failed for message notice: {:#}", e),
        });
    }

    Ok(Json(SendMessageResponse {
        message_id,
        conversation_id: parse_uuid(&actual_conversation, "conversation id"),
    }))
}

pub async fn conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let rows = blocking(move || state.db.conversation_summaries(&user.id.to_string())).await?;
    Ok(Json(rows.iter().map(conversation_response).collect()))
}

/// Fetch a thread. Opening it marks the caller's unread messages read, but
/// the returned payload still carries the read flags as they were before
/// this fetch.
pub async fn conversation_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let user_id = user.id.to_string();
    let rows = blocking(move || {
        let conversation = state
            .db
            .get_conversation(&id.to_string())?
            .filter(|c| c.has_participant(&user_id));

        match conversation {
            Some(c) => {
                let messages = state.db.messages_in_conversation(&c.id)?;
                state.db.mark_conversation_read(&c.id, &user_id)?;
                Ok(Some(messages))
            }
            None => Ok(None),
        }
    })
    .await?
    // Hidden rather than forbidden, so conversation ids cannot be probed.
    .ok_or_else(|| ApiError::not_found("conversation not found"))?;

    Ok(Json(rows.iter().map(message_response).collect()))
}

pub async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let stats = blocking(move || state.db.owner_stats(&user.id.to_string(), &now_ts())).await?;
    Ok(Json(json!({ "unread_count": stats.unread_messages })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn first_read_returns_unread_flags_then_clears_them() {
        let state = testutil::state();
        let owner = testutil::seed_user(&state, "owner@example.com", "0600000001");
        let buyer = testutil::seed_user(&state, "buyer@example.com", "0600000002");
        let row = testutil::listing_row(&owner);
        state.db.insert_listing(&row).unwrap();

        let sent = send(
            State(state.clone()),
            buyer,
            Json(SendMessageRequest {
                listing_id: row.id.parse().unwrap(),
                content: "still available?".into(),
            }),
        )
        .await
        .unwrap();
        let conversation_id = sent.0.conversation_id;

        // The fetch that marks the thread read still shows the flags as the
        // caller found them.
        let first = conversation_messages(State(state.clone()), owner.clone(), Path(conversation_id))
            .await
            .unwrap();
        assert_eq!(first.0.len(), 1);
        assert!(!first.0[0].is_read);

        let second = conversation_messages(State(state.clone()), owner, Path(conversation_id))
            .await
            .unwrap();
        assert!(second.0[0].is_read);
    }
}
