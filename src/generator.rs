//! Pattern-generator collaborator, explicitly out of core scope: no
//! LLM pattern generator implementation. `PatternGenerator` is the
//! narrow trait the lifecycle manager depends on to signal that a
//! domain needs a fresh extraction recipe; `ChannelPatternGenerator`
//! is the in-process default, in the same "hand control to an
//! external consumer over a channel" style as
//! `route_quality::mitigation`'s `mpsc::Sender<MitigationAction>`.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct PatternGenerationRequest {
    pub domain: String,
    pub sample_url: String,
    pub requested_at: DateTime<Utc>,
}

pub trait PatternGenerator: Send + Sync {
    fn request(&self, domain: &str, sample_url: &str, now: DateTime<Utc>);
}

/// Forwards requests over an unbounded channel; never blocks the
/// caller (the Fetch Orchestrator hot path) and never errors — a full
/// or closed receiver is the external generator's problem, not the
/// producer's.
pub struct ChannelPatternGenerator {
    sender: mpsc::UnboundedSender<PatternGenerationRequest>,
}

impl ChannelPatternGenerator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PatternGenerationRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PatternGenerator for ChannelPatternGenerator {
    fn request(&self, domain: &str, sample_url: &str, now: DateTime<Utc>) {
        let _ = self.sender.send(PatternGenerationRequest {
            domain: domain.to_string(),
            sample_url: sample_url.to_string(),
            requested_at: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_is_received_on_the_channel() {
        let (generator, mut receiver) = ChannelPatternGenerator::new();
        generator.request("shop.example.com", "https://shop.example.com/item/1", Utc::now());
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.domain, "shop.example.com");
    }

    #[tokio::test]
    async fn request_after_receiver_dropped_does_not_panic() {
        let (generator, receiver) = ChannelPatternGenerator::new();
        drop(receiver);
        generator.request("shop.example.com", "https://shop.example.com/item/1", Utc::now());
    }
}
