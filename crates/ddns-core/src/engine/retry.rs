//! Single-shot retry timer
//!
//! At most one retry is pending per service. Arming replaces any pending
//! retry, and a new address event cancels it.

use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// A cancellable one-shot timer carrying the address to retry with
#[derive(Debug, Default)]
pub struct RetryTimer {
    pending: Option<(Pin<Box<Sleep>>, IpAddr)>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a retry for `ip` after `delay`, replacing any pending one
    pub fn arm(&mut self, delay: Duration, ip: IpAddr) {
        self.pending = Some((Box::pin(tokio::time::sleep(delay)), ip));
    }

    /// Drop the pending retry, if any
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending retry fires
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(sleep, _)| sleep.deadline())
    }

    /// Wait for the pending retry and disarm it
    ///
    /// Never completes while nothing is armed, so it can sit in a
    /// `select!` next to other branches.
    pub async fn expired(&mut self) -> IpAddr {
        match self.pending.as_mut() {
            Some((sleep, ip)) => {
                let ip = *ip;
                sleep.as_mut().await;
                self.pending = None;
                ip
            }
            None => std::future::pending().await,
        }
    }
}
