//! Geographically keyed AGPS cache.
//!
//! The cache holds a fixed list of slots, one per configured anchor point.
//! A request is served from the slot nearest to the requester; if that slot is
//! stale, the first request to notice refreshes it from upstream while any
//! concurrent requests for the same slot are served the stale payload.
//!
//! ## Architecture
//!
//! ```text
//!   Session ----> GeoCache::resolve_nearest
//!                   |
//!                   | nearest slot (squared distance, first wins ties)
//!                   v
//!              +-----------+   expired && !in_flight   +----------+
//!              | CacheSlot | ------------------------> | Upstream |
//!              +-----------+ <------- payload -------- +----------+
//! ```
//!
//! Refreshes run on their own tokio task. The session that triggered the
//! refresh waits for it, but if that session goes away the refresh still
//! completes and updates the slot.

mod error;
mod slot;

pub use error::CacheError;
pub use slot::{CacheSlot, SlotConfig, SlotSnapshot};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::protocol::Params;
use crate::upstream::Upstream;
use slot::RefreshGuard;

/// Default slot time-to-live (5 minutes).
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

/// Nearest-slot AGPS cache with single-flight refresh per slot.
pub struct GeoCache<U: Upstream> {
    slots: Vec<Arc<CacheSlot>>,
    upstream: Arc<U>,
    ttl: Duration,
}

impl<U: Upstream + 'static> GeoCache<U> {
    /// Creates a cache with one slot per entry of `slots`, in order.
    ///
    /// Every slot starts out expired.
    pub fn new(slots: impl IntoIterator<Item = SlotConfig>, upstream: U, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            slots: slots
                .into_iter()
                .map(|config| Arc::new(CacheSlot::new(config, now)))
                .collect(),
            upstream: Arc::new(upstream),
            ttl,
        }
    }

    pub fn slots(&self) -> &[Arc<CacheSlot>] {
        &self.slots
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Returns the slot closest to `(lat, lon)`.
    ///
    /// On an exact distance tie the slot configured first wins.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<&Arc<CacheSlot>> {
        let mut best: Option<(&Arc<CacheSlot>, f64)> = None;
        for slot in &self.slots {
            let distance = slot.distance_sq(lat, lon);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((slot, distance)),
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Resolves a request to the payload of its nearest slot.
    ///
    /// Refreshes the slot first if it is stale and no other refresh for it is
    /// running. The returned payload may be stale, or empty if no fetch for
    /// this slot has ever succeeded; upstream failures are logged, not
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidRequest` if `lat` or `lon` is missing or
    /// not a number, and `CacheError::NoSlots` if the cache is empty. Neither
    /// case contacts upstream.
    pub async fn resolve_nearest(&self, params: &Params) -> Result<Bytes, CacheError> {
        let (lat, lon) = requested_position(params)?;
        let slot = self.nearest(lat, lon).ok_or(CacheError::NoSlots)?;

        if let Some(guard) = slot.try_begin_refresh(Instant::now()) {
            let request = slot.upstream_params(params);
            let upstream = Arc::clone(&self.upstream);
            let ttl = self.ttl;

            let task = tokio::spawn(refresh(guard, upstream, request, ttl));
            if let Err(e) = task.await {
                error!(
                    lat = slot.config().lat,
                    lon = slot.config().lon,
                    "cache refresh task failed: {}",
                    e
                );
            }
        }

        Ok(slot.content())
    }
}

/// Extracts the requester's position.
fn requested_position(params: &Params) -> Result<(f64, f64), CacheError> {
    let lat = params
        .get_f64("lat")
        .ok_or(CacheError::InvalidRequest { field: "lat" })?;
    let lon = params
        .get_f64("lon")
        .ok_or(CacheError::InvalidRequest { field: "lon" })?;
    Ok((lat, lon))
}

/// Fetches a new payload for the slot held by `guard`.
///
/// On failure the slot keeps its old payload and expiry, so the next request
/// retries immediately. There is no backoff: a long upstream outage means
/// one upstream attempt per incoming request for the affected slot.
async fn refresh<U: Upstream>(
    guard: RefreshGuard,
    upstream: Arc<U>,
    request: Params,
    ttl: Duration,
) {
    let slot = guard.slot();
    let SlotConfig { lat, lon, pacc } = slot.config();
    info!(lat, lon, pacc, "updating cache");

    match upstream.fetch(&request).await {
        Ok(content) => {
            let expires_at = Instant::now() + ttl;
            let size = content.len();
            slot.store(content, expires_at);
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            info!(lat, lon, size, ttl_ms, "updated cache");
        }
        Err(e) => {
            warn!(lat, lon, "cache refresh failed, serving stale content: {}", e);
        }
    }
    // `guard` drops here and clears the in-flight flag.
}
