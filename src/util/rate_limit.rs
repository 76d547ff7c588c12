//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Default max pose/landmark messages per second per connection
pub const POSE_RATE_LIMIT: u32 = 60;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct PlayerRateLimiter {
    pose_limiter: Arc<Limiter>,
}

impl PlayerRateLimiter {
    pub fn new(poses_per_second: u32) -> Self {
        Self {
            pose_limiter: create_limiter(poses_per_second),
        }
    }

    /// Check if a pose message is allowed (returns true if allowed)
    pub fn check_pose(&self) -> bool {
        self.pose_limiter.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new(POSE_RATE_LIMIT)
    }
}
