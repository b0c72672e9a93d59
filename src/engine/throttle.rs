use std::time::{Duration, Instant};

/// Coalesces render requests that arrive faster than `interval`.
///
/// A request inside the window is not lost: it is parked as a single
/// trailing render that becomes due once the window has elapsed.
#[derive(Debug)]
pub(crate) struct RenderThrottle {
    interval: Duration,
    last_render: Option<Instant>,
    pending: bool,
}

impl RenderThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_render: None,
            pending: false,
        }
    }

    /// Returns `true` when the request should render now; otherwise parks it.
    pub(crate) fn request(&mut self, now: Instant, force: bool) -> bool {
        if force || self.window_elapsed(now) {
            return true;
        }
        self.pending = true;
        false
    }

    /// When the parked render becomes due, if one is parked.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        if !self.pending {
            return None;
        }
        self.last_render.map(|at| at + self.interval)
    }

    /// Consumes the parked render if its window has elapsed.
    pub(crate) fn take_due(&mut self, now: Instant) -> bool {
        if self.pending && self.window_elapsed(now) {
            self.pending = false;
            return true;
        }
        false
    }

    pub(crate) fn mark_rendered(&mut self, now: Instant) {
        self.last_render = Some(now);
        self.pending = false;
    }

    pub(crate) fn cancel_pending(&mut self) {
        self.pending = false;
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        self.last_render
            .is_none_or(|at| now.saturating_duration_since(at) >= self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(30);

    #[test]
    fn first_request_renders_immediately() {
        let mut throttle = RenderThrottle::new(WINDOW);
        assert!(throttle.request(Instant::now(), false));
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn requests_inside_window_collapse_into_one() {
        let t0 = Instant::now();
        let mut throttle = RenderThrottle::new(WINDOW);
        throttle.mark_rendered(t0);
        for ms in [1, 5, 10, 29] {
            assert!(!throttle.request(t0 + Duration::from_millis(ms), false));
        }
        assert_eq!(throttle.deadline(), Some(t0 + WINDOW));
        assert!(!throttle.take_due(t0 + Duration::from_millis(29)));
        assert!(throttle.take_due(t0 + WINDOW));
        assert!(!throttle.take_due(t0 + WINDOW));
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn forced_request_bypasses_window_and_clears_parked() {
        let t0 = Instant::now();
        let mut throttle = RenderThrottle::new(WINDOW);
        throttle.mark_rendered(t0);
        assert!(!throttle.request(t0 + Duration::from_millis(2), false));
        assert!(throttle.request(t0 + Duration::from_millis(3), true));
        throttle.mark_rendered(t0 + Duration::from_millis(3));
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn request_after_window_renders() {
        let t0 = Instant::now();
        let mut throttle = RenderThrottle::new(WINDOW);
        throttle.mark_rendered(t0);
        assert!(throttle.request(t0 + Duration::from_millis(31), false));
    }

    #[test]
    fn cancel_drops_parked_render() {
        let t0 = Instant::now();
        let mut throttle = RenderThrottle::new(WINDOW);
        throttle.mark_rendered(t0);
        assert!(!throttle.request(t0, false));
        throttle.cancel_pending();
        assert!(!throttle.take_due(t0 + WINDOW * 2));
    }
}
