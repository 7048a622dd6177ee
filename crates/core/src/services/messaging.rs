//! Direct messaging between two users.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use livenest_common::{AppError, AppResult, IdGenerator};
use livenest_db::{
    entities::{conversation, message},
    repositories::{ConversationRepository, MessageRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::services::event_publisher::{
    EventPublisherService, events, publish_best_effort, user_channel,
};
use crate::services::pagination::{Cursor, clamp_limit};
use crate::services::presenter::AuthorSummary;
use crate::services::visibility::Viewer;

/// Input for sending a message.
#[derive(Debug, Deserialize, Validate)]
pub struct MessageInput {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
}

/// A conversation as listed for one participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    /// The other participant
    pub partner: AuthorSummary,
    pub last_message: Option<message::Model>,
    pub updated_at: DateTime<FixedOffset>,
}

/// Messaging service for business logic.
#[derive(Clone)]
pub struct MessagingService {
    conversation_repo: ConversationRepository,
    message_repo: MessageRepository,
    user_repo: UserRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl MessagingService {
    /// Create a new messaging service.
    #[must_use]
    pub const fn new(
        conversation_repo: ConversationRepository,
        message_repo: MessageRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            user_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Open the conversation with `other_id`, creating it on first contact.
    pub async fn start_conversation(
        &self,
        viewer: &Viewer,
        other_id: &str,
    ) -> AppResult<ConversationSummary> {
        if viewer.id == other_id {
            return Err(AppError::InvalidOperation(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }

        let other = self.user_repo.get_existing(other_id).await?;
        let (conversation, created) = self
            .conversation_repo
            .find_or_create(self.id_gen.generate(), &viewer.id, other_id)
            .await?;

        let last_message = if created {
            tracing::info!(conversation_id = %conversation.id, "Started conversation");
            publish_best_effort(
                self.event_publisher.as_ref(),
                &user_channel(other_id),
                events::NEW_CONVERSATION,
                json!({ "conversationId": conversation.id, "userId": viewer.id }),
            )
            .await;
            None
        } else {
            self.message_repo.find_latest(&conversation.id).await?
        };

        Ok(ConversationSummary {
            id: conversation.id,
            partner: AuthorSummary::from(&other),
            last_message,
            updated_at: conversation.updated_at,
        })
    }

    /// Send a message into a conversation the viewer takes part in.
    pub async fn send(
        &self,
        viewer: &Viewer,
        conversation_id: &str,
        input: MessageInput,
    ) -> AppResult<message::Model> {
        input.validate()?;
        let text = input.text.trim().to_string();
        if text.is_empty() {
            return Err(AppError::Validation("Message text is empty".to_string()));
        }

        let conversation = self.participant_conversation(viewer, conversation_id).await?;

        let model = message::ActiveModel {
            id: Set(self.id_gen.generate()),
            conversation_id: Set(conversation.id.clone()),
            sender_id: Set(viewer.id.clone()),
            text: Set(text),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let created = self.message_repo.create(model).await?;

        let payload = json!(created);
        for participant in [&conversation.user_a_id, &conversation.user_b_id] {
            publish_best_effort(
                self.event_publisher.as_ref(),
                &user_channel(participant),
                events::NEW_MESSAGE,
                payload.clone(),
            )
            .await;
        }

        Ok(created)
    }

    /// The viewer's conversations, most recently active first.
    pub async fn list_conversations(
        &self,
        viewer: &Viewer,
        limit: Option<u64>,
    ) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self
            .conversation_repo
            .find_by_user(&viewer.id, clamp_limit(limit))
            .await?;

        let partner_ids: Vec<String> = conversations
            .iter()
            .map(|c| c.other_participant(&viewer.id).to_string())
            .collect();
        let partners: HashMap<String, AuthorSummary> = self
            .user_repo
            .find_by_ids(&partner_ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), AuthorSummary::from(u)))
            .collect();

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(partner) = partners
                .get(conversation.other_participant(&viewer.id))
                .cloned()
            else {
                continue;
            };
            let last_message = self.message_repo.find_latest(&conversation.id).await?;
            summaries.push(ConversationSummary {
                id: conversation.id,
                partner,
                last_message,
                updated_at: conversation.updated_at,
            });
        }

        Ok(summaries)
    }

    /// Messages of a conversation, newest first.
    pub async fn messages(
        &self,
        viewer: &Viewer,
        conversation_id: &str,
        cursor: &Cursor,
    ) -> AppResult<Vec<message::Model>> {
        let conversation = self.participant_conversation(viewer, conversation_id).await?;
        self.message_repo
            .find_by_conversation(&conversation.id, cursor.limit(), cursor.until_id.as_deref())
            .await
    }

    async fn participant_conversation(
        &self,
        viewer: &Viewer,
        conversation_id: &str,
    ) -> AppResult<conversation::Model> {
        let conversation = self.conversation_repo.get_by_id(conversation_id).await?;
        if !conversation.has_participant(&viewer.id) {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }
}
