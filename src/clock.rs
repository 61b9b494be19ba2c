//! Clock and sleep contract: a monotonic millisecond counter and a
//! blocking wait. The bounded-wait helper that turns this into "drain
//! inbound until a deadline" lives on [`crate::node::Node`] since it must
//! call back into `process`.

pub trait Clock {
    /// Monotonic milliseconds since some fixed but unspecified epoch.
    fn now_ms(&self) -> u32;

    /// Blocks the caller for approximately `ms` milliseconds.
    fn wait_ms(&mut self, ms: u32);

    /// Returns `now_ms()` modulo a `mask`-style bound, used for the
    /// pseudorandom jitter on broadcast-discover and find-parent replies.
    /// Exposed separately from `now_ms` so hosts with a real RNG can
    /// override it; the default just reads the clock's low bits.
    fn jitter(&self, mask: u32) -> u32 {
        self.now_ms() & (mask - 1)
    }
}
