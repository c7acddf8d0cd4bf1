use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::protocol::Params;

/// Static description of a cache slot: the geographic point it serves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotConfig {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Position accuracy radius in meters, forwarded upstream as `pacc`.
    pub pacc: u64,
}

impl SlotConfig {
    pub fn new(lat: f64, lon: f64, pacc: u64) -> Self {
        Self { lat, lon, pacc }
    }
}

/// One pre-configured point with its cached payload.
///
/// The coordinates never change after construction. The payload, expiry and
/// in-flight flag live behind a single mutex so the "expired and not already
/// refreshing" test and the flag update happen atomically.
#[derive(Debug)]
pub struct CacheSlot {
    config: SlotConfig,
    state: Mutex<SlotState>,
}

#[derive(Debug)]
struct SlotState {
    /// Last successfully fetched payload. Empty until the first fetch succeeds.
    content: Bytes,
    /// Content is stale once `now >= expires_at`.
    expires_at: Instant,
    /// True while a refresh for this slot is outstanding.
    in_flight: bool,
}

/// Point-in-time view of a slot, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub config: SlotConfig,
    pub content: Bytes,
    pub expires_at: Instant,
    pub in_flight: bool,
}

impl CacheSlot {
    /// Creates a slot that is already expired at `now`, so the first request
    /// triggers a fetch.
    pub fn new(config: SlotConfig, now: Instant) -> Self {
        Self {
            config,
            state: Mutex::new(SlotState {
                content: Bytes::new(),
                expires_at: now,
                in_flight: false,
            }),
        }
    }

    pub fn config(&self) -> SlotConfig {
        self.config
    }

    /// Squared distance in degree space. Good enough to pick between coarse
    /// regional anchors; not a geodesic distance.
    pub fn distance_sq(&self, lat: f64, lon: f64) -> f64 {
        let dlat = lat - self.config.lat;
        let dlon = lon - self.config.lon;
        dlat * dlat + dlon * dlon
    }

    /// Returns the current payload, fresh or not.
    pub fn content(&self) -> Bytes {
        self.state.lock().content.clone()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let state = self.state.lock();
        SlotSnapshot {
            config: self.config,
            content: state.content.clone(),
            expires_at: state.expires_at,
            in_flight: state.in_flight,
        }
    }

    /// Claims the refresh for this slot if it is expired and nobody else is
    /// refreshing it. Returns a guard that releases the claim on drop.
    pub(crate) fn try_begin_refresh(self: &Arc<Self>, now: Instant) -> Option<RefreshGuard> {
        let mut state = self.state.lock();
        if now < state.expires_at || state.in_flight {
            return None;
        }
        state.in_flight = true;
        Some(RefreshGuard {
            slot: Arc::clone(self),
        })
    }

    /// Stores a freshly fetched payload.
    pub(crate) fn store(&self, content: Bytes, expires_at: Instant) {
        let mut state = self.state.lock();
        state.content = content;
        state.expires_at = expires_at;
    }

    /// Builds the upstream request for this slot.
    ///
    /// The client's parameters are forwarded, but `lat`, `lon` and `pacc` are
    /// replaced by the slot's own values: the cached payload describes the
    /// slot, not whichever device happened to trigger the refresh.
    pub(crate) fn upstream_params(&self, client: &Params) -> Params {
        let mut params = client.clone();
        params.insert("lat", self.config.lat.to_string());
        params.insert("lon", self.config.lon.to_string());
        params.insert("pacc", self.config.pacc.to_string());
        params
    }
}

/// Exclusive right to refresh a slot.
///
/// Dropping the guard clears the slot's in-flight flag, whether the refresh
/// succeeded, failed or panicked.
#[derive(Debug)]
pub(crate) struct RefreshGuard {
    slot: Arc<CacheSlot>,
}

impl RefreshGuard {
    pub(crate) fn slot(&self) -> &Arc<CacheSlot> {
        &self.slot
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.slot.state.lock().in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wuhan() -> SlotConfig {
        SlotConfig::new(30.45, 114.17, 1_500_000)
    }

    #[test]
    fn test_new_slot_is_expired_and_empty() {
        let now = Instant::now();
        let slot = CacheSlot::new(wuhan(), now);
        let snap = slot.snapshot();
        assert!(snap.content.is_empty());
        assert_eq!(snap.expires_at, now);
        assert!(!snap.in_flight);
    }

    #[test]
    fn test_refresh_claim_is_exclusive() {
        let now = Instant::now();
        let slot = Arc::new(CacheSlot::new(wuhan(), now));

        let guard = slot.try_begin_refresh(now).expect("expired slot should be claimable");
        assert!(slot.snapshot().in_flight);
        assert!(slot.try_begin_refresh(now).is_none());

        drop(guard);
        assert!(!slot.snapshot().in_flight);
        assert!(slot.try_begin_refresh(now).is_some());
    }

    #[test]
    fn test_fresh_slot_is_not_claimable() {
        let now = Instant::now();
        let slot = Arc::new(CacheSlot::new(wuhan(), now));
        slot.store(Bytes::from_static(b"data"), now + Duration::from_secs(300));

        assert!(slot.try_begin_refresh(now).is_none());
        assert!(
            slot.try_begin_refresh(now + Duration::from_secs(300))
                .is_some()
        );
    }

    #[test]
    fn test_upstream_params_override_position() {
        let slot = CacheSlot::new(wuhan(), Instant::now());
        let client = Params::decode("cmd=full;user=dev;lat=30.46;lon=114.18;pacc=50");

        let params = slot.upstream_params(&client);
        assert_eq!(params.get("lat"), Some("30.45"));
        assert_eq!(params.get("lon"), Some("114.17"));
        assert_eq!(params.get("pacc"), Some("1500000"));
        assert_eq!(params.get("cmd"), Some("full"));
        assert_eq!(params.get("user"), Some("dev"));
    }

    #[test]
    fn test_distance_sq() {
        let slot = CacheSlot::new(wuhan(), Instant::now());
        assert_eq!(slot.distance_sq(30.45, 114.17), 0.0);
        assert!((slot.distance_sq(31.45, 115.17) - 2.0).abs() < 1e-9);
    }
}
