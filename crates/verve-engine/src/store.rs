use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::features::{BandVolumes, ChorusSection, FeatureSnapshot, Spectrum};

/// Which half of the snapshot a publish replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// Live bands (and optionally the spectrum) changed.
    Live,
    /// Offline results (energy frames + chorus sections) changed.
    Offline,
}

pub type SubscriptionId = u64;

type Callback = Box<dyn Fn(StoreEvent, &FeatureSnapshot) + Send>;

/// Channel subscribers buffer this many snapshots before updates drop.
const CHANNEL_DEPTH: usize = 4;

struct Subscribers {
    entries: Vec<(SubscriptionId, Callback)>,
    channels: Vec<Sender<(StoreEvent, FeatureSnapshot)>>,
    next_id: SubscriptionId,
    disposed: bool,
}

/// Shared feature state with subscriber fan-out. The live stream and the
/// offline worker both publish here; hosts read snapshots or subscribe.
///
/// Publishes are totally ordered: the dispatch lock is held across the
/// state mutation and all notifications, so every subscriber sees updates
/// in the same order they were applied. The state lock itself is only held
/// for the swap + clone, so `snapshot()` never waits on callbacks.
pub struct FeatureStore {
    state: Mutex<FeatureSnapshot>,
    subscribers: Mutex<Subscribers>,
}

impl FeatureStore {
    /// Store seeded at the silence floor, so reads before the first tick
    /// see quiet bands instead of garbage.
    pub fn new(db_floor: f32) -> Self {
        Self {
            state: Mutex::new(FeatureSnapshot::empty(db_floor)),
            subscribers: Mutex::new(Subscribers {
                entries: Vec::new(),
                channels: Vec::new(),
                next_id: 0,
                disposed: false,
            }),
        }
    }

    /// Owned copy of the current state. Later publishes never mutate it.
    pub fn snapshot(&self) -> FeatureSnapshot {
        self.state.lock().unwrap().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.subscribers.lock().unwrap().disposed
    }

    /// Replace the live portion of the snapshot and notify subscribers.
    /// Returns false (and changes nothing) once the store is disposed.
    pub fn update_live(&self, bands: BandVolumes, spectrum: Option<Spectrum>) -> bool {
        let mut subs = self.subscribers.lock().unwrap();
        if subs.disposed {
            return false;
        }
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.bands = bands;
            state.spectrum = spectrum;
            state.clone()
        };
        Self::notify(&mut subs, StoreEvent::Live, &snapshot);
        true
    }

    /// Replace both offline result sets in one step and notify subscribers.
    /// Frames and sections always come from the same analysis run, so they
    /// are swapped together; a reader never sees a mixed pair.
    pub fn set_offline_results(
        &self,
        frames: Vec<f64>,
        sections: Vec<ChorusSection>,
    ) -> bool {
        let mut subs = self.subscribers.lock().unwrap();
        if subs.disposed {
            return false;
        }
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.high_energy_frames = frames;
            state.chorus_sections = sections;
            state.clone()
        };
        Self::notify(&mut subs, StoreEvent::Offline, &snapshot);
        true
    }

    /// Register a callback invoked on every publish, in publish order.
    ///
    /// Callbacks run on the publishing thread while the dispatch lock is
    /// held; they must stay short and must not call back into this store's
    /// subscription or publish methods. On a disposed store the returned id
    /// is valid but never fires.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(StoreEvent, &FeatureSnapshot) + Send + 'static,
    {
        let mut subs = self.subscribers.lock().unwrap();
        let id = subs.next_id;
        subs.next_id += 1;
        if !subs.disposed {
            subs.entries.push((id, Box::new(callback)));
        }
        id
    }

    /// Remove a callback subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    /// Register a bounded channel receiving `(event, snapshot)` per publish.
    ///
    /// Unlike callbacks this is lossy: when the receiver lags more than
    /// a few updates behind, newer publishes are dropped for it rather
    /// than blocking the publisher. On a disposed store the receiver is
    /// disconnected from the start.
    pub fn subscribe_channel(&self) -> Receiver<(StoreEvent, FeatureSnapshot)> {
        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_DEPTH);
        let mut subs = self.subscribers.lock().unwrap();
        if !subs.disposed {
            subs.channels.push(tx);
        }
        rx
    }

    /// Mark the store disposed and drop all subscribers. Any publish in
    /// flight holds the dispatch lock, so it completes before this returns;
    /// afterwards no notification is ever observed again. Idempotent.
    pub fn dispose(&self) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.disposed = true;
        subs.entries.clear();
        subs.channels.clear();
    }

    fn notify(subs: &mut Subscribers, event: StoreEvent, snapshot: &FeatureSnapshot) {
        for (_, callback) in &subs.entries {
            callback(event, snapshot);
        }
        subs.channels.retain(|tx| {
            match tx.try_send((event, snapshot.clone())) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => true, // lagging consumer, drop this update
                Err(TrySendError::Disconnected(_)) => false, // receiver gone
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn bands(low: f32) -> BandVolumes {
        BandVolumes {
            low,
            mid: -50.0,
            high: -70.0,
        }
    }

    #[test]
    fn new_store_starts_at_floor() {
        let store = FeatureStore::new(-100.0);
        let snap = store.snapshot();
        assert_eq!(snap.bands, BandVolumes::splat(-100.0));
        assert!(snap.spectrum.is_none());
        assert!(snap.high_energy_frames.is_empty());
        assert!(snap.chorus_sections.is_empty());
        assert!(!store.is_disposed());
    }

    #[test]
    fn update_live_replaces_bands_and_spectrum() {
        let store = FeatureStore::new(-100.0);
        let spectrum = Spectrum::new(vec![-80.0, -40.0], 23.4);
        assert!(store.update_live(bands(-12.0), Some(spectrum.clone())));

        let snap = store.snapshot();
        assert_eq!(snap.bands, bands(-12.0));
        assert_eq!(snap.spectrum, Some(spectrum));

        // Spectrum publishing can be off while bands keep flowing.
        assert!(store.update_live(bands(-6.0), None));
        let snap = store.snapshot();
        assert_eq!(snap.bands, bands(-6.0));
        assert!(snap.spectrum.is_none());
    }

    #[test]
    fn offline_results_swap_as_a_pair() {
        let store = FeatureStore::new(-100.0);
        let first_sections = vec![ChorusSection {
            start: 10.0,
            end: 25.0,
        }];
        assert!(store.set_offline_results(vec![2.0, 4.0], first_sections));

        let snap = store.snapshot();
        assert_eq!(snap.high_energy_frames, vec![2.0, 4.0]);
        assert_eq!(snap.chorus_sections.len(), 1);

        // A later run replaces both sets wholesale.
        assert!(store.set_offline_results(vec![8.0], Vec::new()));
        let snap = store.snapshot();
        assert_eq!(snap.high_energy_frames, vec![8.0]);
        assert!(snap.chorus_sections.is_empty());
    }

    #[test]
    fn snapshot_is_isolated_from_later_updates() {
        let store = FeatureStore::new(-100.0);
        store.update_live(bands(-30.0), None);
        let before = store.snapshot();
        store.update_live(bands(-3.0), None);
        assert_eq!(before.bands, bands(-30.0));
        assert_eq!(store.snapshot().bands, bands(-3.0));
    }

    #[test]
    fn callbacks_see_events_in_publish_order() {
        let store = FeatureStore::new(-100.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |event, snap| {
            sink.lock().unwrap().push((event, snap.bands.low));
        });

        store.update_live(bands(-20.0), None);
        store.set_offline_results(vec![1.0], Vec::new());
        store.update_live(bands(-10.0), None);

        // The offline publish leaves the live bands untouched.
        let log = seen.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                (StoreEvent::Live, -20.0),
                (StoreEvent::Offline, -20.0),
                (StoreEvent::Live, -10.0),
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let store = FeatureStore::new(-100.0);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        store.update_live(bands(-20.0), None);
        assert_eq!(count.load(Ordering::Relaxed), 1);

        store.unsubscribe(id);
        store.update_live(bands(-10.0), None);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn subscribers_get_distinct_ids() {
        let store = FeatureStore::new(-100.0);
        let a = store.subscribe(|_, _| {});
        let b = store.subscribe(|_, _| {});
        assert_ne!(a, b);
    }

    #[test]
    fn channel_subscriber_receives_snapshots() {
        let store = FeatureStore::new(-100.0);
        let rx = store.subscribe_channel();

        store.update_live(bands(-18.0), None);
        let (event, snap) = rx.try_recv().unwrap();
        assert_eq!(event, StoreEvent::Live);
        assert_eq!(snap.bands, bands(-18.0));

        store.set_offline_results(vec![5.0], Vec::new());
        let (event, snap) = rx.try_recv().unwrap();
        assert_eq!(event, StoreEvent::Offline);
        assert_eq!(snap.high_energy_frames, vec![5.0]);
    }

    #[test]
    fn lagging_channel_drops_newer_updates() {
        let store = FeatureStore::new(-100.0);
        let rx = store.subscribe_channel();

        for i in 0..6 {
            store.update_live(bands(-(i as f32)), None);
        }

        // The buffer holds the first CHANNEL_DEPTH publishes; the rest drop.
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), CHANNEL_DEPTH);
        assert_eq!(received[0].1.bands.low, 0.0);

        // Dropping updates does not unsubscribe the channel.
        store.update_live(bands(-40.0), None);
        assert_eq!(rx.try_recv().unwrap().1.bands.low, -40.0);
    }

    #[test]
    fn dropped_receiver_is_pruned() {
        let store = FeatureStore::new(-100.0);
        let rx = store.subscribe_channel();
        drop(rx);
        // Publish twice: the first prunes the dead sender, the second
        // must still succeed with an empty channel list.
        assert!(store.update_live(bands(-20.0), None));
        assert!(store.update_live(bands(-10.0), None));
    }

    #[test]
    fn dispose_blocks_updates_and_disconnects_channels() {
        let store = FeatureStore::new(-100.0);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let rx = store.subscribe_channel();

        store.dispose();
        assert!(store.is_disposed());
        assert!(!store.update_live(bands(-10.0), None));
        assert!(!store.set_offline_results(vec![1.0], Vec::new()));
        assert_eq!(count.load(Ordering::Relaxed), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        ));

        // The snapshot itself stays readable after disposal.
        assert_eq!(store.snapshot().bands, BandVolumes::splat(-100.0));
    }

    #[test]
    fn dispose_is_idempotent() {
        let store = FeatureStore::new(-100.0);
        store.dispose();
        store.dispose();
        assert!(store.is_disposed());
    }

    #[test]
    fn subscribing_after_dispose_never_fires() {
        let store = FeatureStore::new(-100.0);
        store.dispose();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _id = store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let rx = store.subscribe_channel();

        store.update_live(bands(-10.0), None);
        assert_eq!(count.load(Ordering::Relaxed), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        ));
    }
}
