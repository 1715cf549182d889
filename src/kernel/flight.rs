use parking_lot::Mutex;
use tokio::sync::watch;

/// Identifies one occupancy of a [`SingleFlight`]. Finishing with a stale
/// generation is a no-op, which is what keeps racing finishers from
/// releasing twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

struct Slot<T> {
    next: u64,
    active: Option<(Generation, T)>,
}

/// At most one in-flight operation, with the state it needs to undo itself.
///
/// Both the check and the claim happen under one lock. Idleness is also
/// published on a watch channel so waiters can `.await` instead of polling.
pub struct SingleFlight<T> {
    slot: Mutex<Slot<T>>,
    idle_tx: watch::Sender<bool>,
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        let (idle_tx, _) = watch::channel(true);
        Self {
            slot: Mutex::new(Slot { next: 1, active: None }),
            idle_tx,
        }
    }

    /// Claims the slot if nobody holds it.
    pub fn try_begin(&self, value: T) -> Option<Generation> {
        self.try_begin_with(|| value)
    }

    /// Like [`Self::try_begin`], but builds the value under the lock so that
    /// whatever it captures cannot change between the check and the claim.
    pub fn try_begin_with(&self, make: impl FnOnce() -> T) -> Option<Generation> {
        let mut slot = self.slot.lock();
        if slot.active.is_some() {
            return None;
        }
        let generation = Generation(slot.next);
        slot.next += 1;
        slot.active = Some((generation, make()));
        self.idle_tx.send_replace(false);
        Some(generation)
    }

    /// Releases the slot and hands back its value, but only if `generation`
    /// is still the current holder.
    pub fn finish(&self, generation: Generation) -> Option<T> {
        self.finish_with(generation, |value| value)
    }

    /// Releases the slot, running `undo` on the held value before anyone else
    /// can claim it. Stale generations skip `undo` entirely.
    pub fn finish_with<R>(&self, generation: Generation, undo: impl FnOnce(T) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        match &slot.active {
            Some((current, _)) if *current == generation => {}
            _ => return None,
        }
        let released = slot.active.take().map(|(_, value)| undo(value));
        self.idle_tx.send_replace(true);
        released
    }

    /// Runs `f` against the in-flight value, if `generation` still holds the slot.
    pub fn with_active<R>(&self, generation: Generation, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        match slot.active.as_mut() {
            Some((current, value)) if *current == generation => Some(f(value)),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<Generation> {
        self.slot.lock().active.as_ref().map(|(g, _)| *g)
    }

    pub fn is_idle(&self) -> bool {
        self.slot.lock().active.is_none()
    }

    pub async fn wait_idle(&self) {
        let mut rx = self.idle_tx.subscribe();
        // Sender lives in self, so the channel cannot close while we borrow it.
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
