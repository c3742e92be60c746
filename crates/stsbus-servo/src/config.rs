use std::time::Duration;

/// Default time a query waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(200);

/// Default pause around EPROM lock changes.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10);

/// Behavior of a [`ServoBus`](crate::ServoBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// How long query verbs wait for a reply. Default: 200 ms.
    pub reply_timeout: Duration,
    /// Pause after unlocking and before re-locking the EPROM. Default: 10 ms.
    pub settle_delay: Duration,
    /// Wrap configuration writes in an EPROM unlock/lock sequence so they
    /// survive a power cycle.
    pub persistent: bool,
    /// The line reflects every transmitted frame back to the receiver.
    ///
    /// When set, a pending request only accepts a reply after its own echo
    /// has gone by.
    pub expect_echo: bool,
    /// Read timeout of the receiver thread. Bounds shutdown latency.
    pub poll_interval: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            persistent: false,
            expect_echo: true,
            poll_interval: Duration::from_millis(20),
        }
    }
}
