//! Reply helpers shared by service command handlers.

use super::ServiceEffect;

/// Result type for service commands - a list of effects to apply.
pub type ServiceResult = Vec<ServiceEffect>;

/// Common reply construction for a named service.
pub trait ServiceBase {
    /// Get the service name (e.g., "ChanServ").
    fn service_name(&self) -> &str;

    /// Create a single reply effect (NOTICE to user).
    fn reply_effect(&self, target: &str, text: &str) -> ServiceEffect {
        ServiceEffect::Reply {
            target: target.to_string(),
            text: text.to_string(),
        }
    }

    /// Create multiple reply effects.
    fn reply_effects(&self, target: &str, texts: &[&str]) -> ServiceResult {
        texts
            .iter()
            .map(|t| self.reply_effect(target, t))
            .collect()
    }

    /// Create an error reply (single message).
    fn error_reply(&self, target: &str, text: &str) -> ServiceResult {
        vec![self.reply_effect(target, text)]
    }

    /// Reply used when a store call fails mid-command.
    fn store_failure(&self, target: &str) -> ServiceResult {
        self.error_reply(
            target,
            &format!(
                "Sorry! {} could not reach its database. Please try again later.",
                self.service_name()
            ),
        )
    }
}
