use crate::consensus::Message;
use crate::error::ValidationError;

/// Boundary checks for inbound protocol messages. The engine assumes
/// well-formed input, so anything that fails here never reaches it.
#[derive(Debug, Clone)]
pub struct MessageValidator {
    total_nodes: usize,
    min_round: u64,
}

impl MessageValidator {
    pub fn new(total_nodes: usize) -> Self {
        MessageValidator {
            total_nodes,
            min_round: 0,
        }
    }

    /// Rejects rounds below the network's starting round.
    pub fn with_min_round(mut self, round: u64) -> Self {
        self.min_round = round;
        self
    }

    pub fn validate(&self, message: &Message) -> Result<(), ValidationError> {
        if message.sender_id >= self.total_nodes {
            return Err(ValidationError {
                field: "senderId".to_string(),
                reason: format!(
                    "Sender {} outside peer range [0, {})",
                    message.sender_id, self.total_nodes
                ),
            });
        }

        if message.round < self.min_round {
            return Err(ValidationError {
                field: "k".to_string(),
                reason: format!(
                    "Round {} is below starting round {}",
                    message.round, self.min_round
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Value;

    #[test]
    fn test_accepts_known_sender() {
        let validator = MessageValidator::new(4).with_min_round(1);
        assert!(validator.validate(&Message::propose(1, Value::One, 3)).is_ok());
        assert!(validator.validate(&Message::vote(9, Value::Unknown, 0)).is_ok());
    }

    #[test]
    fn test_rejects_unknown_sender() {
        let validator = MessageValidator::new(4);
        let err = validator
            .validate(&Message::propose(1, Value::One, 4))
            .unwrap_err();
        assert_eq!(err.field, "senderId");
    }

    #[test]
    fn test_rejects_round_below_start() {
        let validator = MessageValidator::new(4).with_min_round(1);
        let err = validator
            .validate(&Message::propose(0, Value::Zero, 1))
            .unwrap_err();
        assert_eq!(err.field, "k");
        assert!(err.reason.contains("below starting round"));
    }
}
