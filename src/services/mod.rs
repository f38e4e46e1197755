/// Chat relay: user turn storage, model call and reply forwarding.
pub mod chat_service;
/// Conversation CRUD.
pub mod conversation_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Score submission and leaderboards.
pub mod score_service;
/// Server-Sent Events rendering of the chat relay.
pub mod sse_service;
/// Background schema setup with retry, followed by demo seeding.
pub mod storage_supervisor;
