use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for forvibe-back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::scores::submit_score,
        crate::routes::scores::get_leaderboard,
        crate::routes::conversations::list_conversations,
        crate::routes::conversations::create_conversation,
        crate::routes::conversations::get_conversation,
        crate::routes::conversations::delete_conversation,
        crate::routes::chat::send_message,
        crate::routes::chat::chat,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::score::SubmitScoreRequest,
            crate::dto::score::ScoreResponse,
            crate::dto::chat::CreateConversationRequest,
            crate::dto::chat::ConversationResponse,
            crate::dto::chat::ConversationDetailResponse,
            crate::dto::chat::MessageResponse,
            crate::dto::chat::SendMessageRequest,
            crate::dto::chat::ChatRequest,
            crate::dto::chat::ChatReply,
            crate::dto::sse::FragmentEvent,
            crate::dto::sse::DoneEvent,
            crate::dto::sse::StreamErrorEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "scores", description = "Score submission and leaderboards"),
        (name = "conversations", description = "Chat conversation management"),
        (name = "chat", description = "Assistant relay, streamed as server-sent events"),
    )
)]
pub struct ApiDoc;
