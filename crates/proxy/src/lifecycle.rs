//! Install/activate signals gating interception.

use derive_more::Display;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Display, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[default]
    #[display("pending")]
    Pending,
    #[display("installed")]
    Installed,
    #[display("active")]
    Active,
}

/// Tracks whether the proxy may claim requests yet.
///
/// With `skip_waiting`, [`install`](Self::install) activates straight away.
/// Otherwise the proxy sits in [`Phase::Installed`] and passes every request
/// through until [`activate`](Self::activate) claims the open clients. Phases
/// only ever move forward.
#[derive(Debug)]
pub struct Lifecycle {
    skip_waiting: bool,
    phase: watch::Sender<Phase>,
}
impl Lifecycle {
    pub fn new(skip_waiting: bool) -> Self {
        let (phase, _) = watch::channel(Phase::Pending);
        Self { skip_waiting, phase }
    }

    /// A lifecycle that is already active.
    pub fn active() -> Self {
        let lifecycle = Self::new(true);
        lifecycle.install();
        lifecycle
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Active
    }

    pub fn install(&self) -> Phase {
        let target = if self.skip_waiting { Phase::Active } else { Phase::Installed };
        self.advance(target);
        self.phase()
    }

    /// Start intercepting for every open client. Returns `true` if this call
    /// made the proxy active.
    pub fn activate(&self) -> bool {
        self.advance(Phase::Active)
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn advance(&self, target: Phase) -> bool {
        let changed = self.phase.send_if_modified(|phase| {
            if *phase < target {
                *phase = target;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(phase = %target, "Proxy lifecycle advanced");
        }
        changed
    }
}
