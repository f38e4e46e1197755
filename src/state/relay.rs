//! Per-request progress of the chat relay. Rebuilt for every request and never persisted.

use thiserror::Error;
use tracing::debug;

/// Stages a chat request goes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    /// Request accepted, nothing touched yet.
    Start,
    /// Target conversation exists (or was just created) and the user turn is stored.
    ConversationResolved,
    /// Prior messages were loaded and the model context assembled.
    HistoryLoaded,
    /// The completion request is in flight.
    ModelRequested,
    /// Fragments are being forwarded to the caller.
    Streaming,
    /// The assistant reply has been written.
    Persisted,
    /// Request finished successfully.
    Done,
    /// Request aborted; reachable from every non-terminal stage.
    Error,
}

impl RelayStage {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayStage::Done | RelayStage::Error)
    }

    fn allows(self, next: RelayStage) -> bool {
        use RelayStage::*;

        if next == Error {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Start, ConversationResolved)
                | (ConversationResolved, HistoryLoaded)
                | (HistoryLoaded, ModelRequested)
                | (ModelRequested, Streaming)
                // Buffered replies skip the streaming stage.
                | (ModelRequested, Persisted)
                | (Streaming, Persisted)
                // Empty replies are not written.
                | (ModelRequested, Done)
                | (Streaming, Done)
                | (Persisted, Done)
        )
    }
}

/// Error returned when a stage is entered out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid relay transition: {from:?} -> {to:?}")]
pub struct InvalidRelayTransition {
    pub from: RelayStage,
    pub to: RelayStage,
}

/// Tracks the stage of one relay request and logs every move.
#[derive(Debug, Clone)]
pub struct RelayProgress {
    stage: RelayStage,
    conversation_id: Option<i32>,
}

impl Default for RelayProgress {
    fn default() -> Self {
        Self {
            stage: RelayStage::Start,
            conversation_id: None,
        }
    }
}

impl RelayProgress {
    /// Fresh tracker in [`RelayStage::Start`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage.
    pub fn stage(&self) -> RelayStage {
        self.stage
    }

    /// Conversation the request is bound to, once resolved.
    pub fn conversation_id(&self) -> Option<i32> {
        self.conversation_id
    }

    /// Record the conversation and enter [`RelayStage::ConversationResolved`].
    pub fn resolve(&mut self, conversation_id: i32) -> Result<(), InvalidRelayTransition> {
        self.advance(RelayStage::ConversationResolved)?;
        self.conversation_id = Some(conversation_id);
        Ok(())
    }

    /// Move to `next`, rejecting out-of-order stages.
    pub fn advance(&mut self, next: RelayStage) -> Result<(), InvalidRelayTransition> {
        if !self.stage.allows(next) {
            return Err(InvalidRelayTransition {
                from: self.stage,
                to: next,
            });
        }

        debug!(
            conversation_id = ?self.conversation_id,
            from = ?self.stage,
            to = ?next,
            "relay stage"
        );
        self.stage = next;
        Ok(())
    }

    /// Enter [`RelayStage::Error`] unless already terminal. Returns the stage that failed.
    pub fn fail(&mut self) -> RelayStage {
        let failed_at = self.stage;
        if !failed_at.is_terminal() {
            self.stage = RelayStage::Error;
        }
        failed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(stages: &[RelayStage]) -> RelayProgress {
        let mut progress = RelayProgress::new();
        for stage in stages {
            progress.advance(*stage).unwrap();
        }
        progress
    }

    #[test]
    fn streaming_path_reaches_done() {
        let progress = walk(&[
            RelayStage::ConversationResolved,
            RelayStage::HistoryLoaded,
            RelayStage::ModelRequested,
            RelayStage::Streaming,
            RelayStage::Persisted,
            RelayStage::Done,
        ]);
        assert_eq!(progress.stage(), RelayStage::Done);
    }

    #[test]
    fn buffered_path_skips_streaming() {
        let progress = walk(&[
            RelayStage::ConversationResolved,
            RelayStage::HistoryLoaded,
            RelayStage::ModelRequested,
            RelayStage::Persisted,
            RelayStage::Done,
        ]);
        assert_eq!(progress.stage(), RelayStage::Done);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut progress = RelayProgress::new();
        let err = progress.advance(RelayStage::ModelRequested).unwrap_err();
        assert_eq!(
            err,
            InvalidRelayTransition {
                from: RelayStage::Start,
                to: RelayStage::ModelRequested,
            }
        );
        assert_eq!(progress.stage(), RelayStage::Start);
    }

    #[test]
    fn error_is_reachable_until_terminal() {
        let mut progress = walk(&[RelayStage::ConversationResolved, RelayStage::HistoryLoaded]);
        assert_eq!(progress.fail(), RelayStage::HistoryLoaded);
        assert_eq!(progress.stage(), RelayStage::Error);
        assert!(progress.advance(RelayStage::Error).is_err());
        assert!(progress.advance(RelayStage::Done).is_err());
    }

    #[test]
    fn resolve_records_conversation() {
        let mut progress = RelayProgress::new();
        progress.resolve(12).unwrap();
        assert_eq!(progress.conversation_id(), Some(12));
        assert!(progress.resolve(13).is_err());
    }
}
