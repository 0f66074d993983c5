//! Tracking id generation.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::status::EventType;

const TRACKING_ID_SUFFIX_LEN: usize = 6;

/// Produces the human-shareable tracking code of a new declaration.
pub trait TrackingIdGenerator: Send + Sync {
    fn generate(&self, event: EventType) -> String;
}

impl<F> TrackingIdGenerator for F
where
    F: Fn(EventType) -> String + Send + Sync,
{
    fn generate(&self, event: EventType) -> String {
        self(event)
    }
}

/// `B` or `D` followed by six random upper-case alphanumerics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTrackingIds;

impl TrackingIdGenerator for RandomTrackingIds {
    fn generate(&self, event: EventType) -> String {
        let prefix = match event {
            EventType::Birth => 'B',
            EventType::Death => 'D',
        };
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TRACKING_ID_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        format!("{prefix}{suffix}")
    }
}
