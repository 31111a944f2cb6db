use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::messages;
use crate::registry::{Registry, RoomRecord};
use crate::sidekick::StatusSource;
use crate::telegram::Notifier;

/// The scheduled half of the bot: poll every monitored room, notify
/// subscribers on live/offline transitions, persist the new state.
pub struct Monitor {
    registry: Registry,
    source: Arc<dyn StatusSource>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    max_in_flight: usize,
}

impl Monitor {
    pub fn new(
        registry: Registry,
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
        max_in_flight: usize,
    ) -> Self {
        Monitor {
            registry,
            source,
            notifier,
            poll_interval,
            // for_each_concurrent reads a limit of 0 as "unlimited", the one
            // thing the cap must never mean
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Check all rooms, sleep, repeat. A failed cycle (store listing down)
    /// is logged and the next cycle tried anyway.
    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            log::debug!("starting status check cycle");
            if let Err(err) = self.check_all().await {
                log::error!("status check cycle failed: {}", err);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One pass over a registry snapshot. Rooms are checked concurrently,
    /// capped so neither the status api nor telegram get hammered. A failure
    /// on one room never aborts the batch.
    pub async fn check_all(&self) -> Result<()> {
        let rooms = self.registry.get_all().await?;
        log::debug!("checking {} monitored room(s)", rooms.len());
        stream::iter(rooms)
            .for_each_concurrent(self.max_in_flight, |(room_id, record)| async move {
                if let Err(err) = self.check_room(&room_id, record).await {
                    log::error!("check failed for room {}: {}", room_id, err);
                }
            })
            .await;
        Ok(())
    }

    // check-then-maybe-notify-then-persist, sequential for a given room
    async fn check_room(&self, room_id: &str, record: RoomRecord) -> Result<()> {
        let current = self.source.fetch_status(room_id).await?;
        if current.live_status == record.is_live {
            // no transition: no notification and no write
            return Ok(());
        }

        log::info!(
            "room {} ({}) went {}",
            room_id,
            current.username,
            if current.live_status { "live" } else { "offline" }
        );

        let text = messages::notification(&current);
        for chat_id in &record.subscribers {
            // delivery attempts are independent, a failing subscriber must
            // not block the others
            if let Err(err) = self.notifier.send_message(chat_id, &text).await {
                log::error!("cannot notify {} about room {}: {}", chat_id, room_id, err);
            }
        }

        let updated = RoomRecord {
            is_live: current.live_status,
            last_checked: Utc::now(),
            subscribers: record.subscribers,
            streamer_info: current,
        };
        self.registry.put(room_id, &updated).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::registry::StreamerSnapshot;
    use crate::store::MemoryStore;
    use crate::subscription::{SubscriptionManager, Toggle};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn snapshot(uid: &str, live_status: bool) -> StreamerSnapshot {
        StreamerSnapshot {
            username: format!("streamer-{}", uid),
            title: "hello".to_string(),
            viewer: 7,
            followers: 99,
            tags: vec![],
            twitter: None,
            uid: uid.to_string(),
            live_status,
        }
    }

    struct FakeSource {
        statuses: Mutex<HashMap<String, StreamerSnapshot>>,
    }

    impl FakeSource {
        fn with(rooms: &[(&str, bool)]) -> Arc<Self> {
            let statuses = rooms
                .iter()
                .map(|(uid, live)| (uid.to_string(), snapshot(uid, *live)))
                .collect();
            Arc::new(FakeSource {
                statuses: Mutex::new(statuses),
            })
        }

        fn set_live(&self, uid: &str, live_status: bool) {
            self.statuses
                .lock()
                .unwrap()
                .get_mut(uid)
                .expect("unknown fake room")
                .live_status = live_status;
        }
    }

    #[async_trait]
    impl StatusSource for FakeSource {
        async fn fetch_status(&self, room_id: &str) -> Result<StreamerSnapshot> {
            self.statuses
                .lock()
                .unwrap()
                .get(room_id)
                .cloned()
                .ok_or_else(|| Error::UpstreamRejected {
                    service: "sidekick",
                    code: 1,
                    message: "unknown room".to_string(),
                })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        failing: Vec<String>,
    }

    impl RecordingNotifier {
        /// Rejects deliveries to the given chat, like telegram does when a
        /// user has blocked the bot.
        fn failing_for(chat_id: &str) -> Self {
            RecordingNotifier {
                sent: Mutex::new(vec![]),
                failing: vec![chat_id.to_string()],
            }
        }

        fn deliveries(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
            if self.failing.iter().any(|c| c == chat_id) {
                return Err(Error::UpstreamRejected {
                    service: "telegram",
                    code: 403,
                    message: "bot was blocked by the user".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct Setup {
        registry: Registry,
        source: Arc<FakeSource>,
        notifier: Arc<RecordingNotifier>,
        monitor: Monitor,
    }

    fn setup(rooms: &[(&str, bool)]) -> Setup {
        let registry = Registry::new(Arc::new(MemoryStore::new()));
        let source = FakeSource::with(rooms);
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            registry.clone(),
            source.clone(),
            notifier.clone(),
            Duration::from_secs(300),
            5,
        );
        Setup {
            registry,
            source,
            notifier,
            monitor,
        }
    }

    async fn subscribe(setup: &Setup, chat_id: &str, room_id: &str) {
        SubscriptionManager::new(setup.registry.clone(), setup.source.clone())
            .toggle(chat_id, room_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn transition_notifies_every_subscriber_and_persists() {
        let setup = setup(&[("r1", false)]);
        subscribe(&setup, "chatA", "r1").await;
        subscribe(&setup, "chatB", "r1").await;

        setup.source.set_live("r1", true);
        setup.monitor.check_all().await.unwrap();

        let mut chats: Vec<String> = setup
            .notifier
            .deliveries()
            .into_iter()
            .map(|(chat, _)| chat)
            .collect();
        chats.sort();
        assert_eq!(chats, vec!["chatA", "chatB"]);

        let record = setup.registry.get("r1").await.unwrap().unwrap();
        assert!(record.is_live);
        assert!(record.streamer_info.live_status);
    }

    #[tokio::test]
    async fn unchanged_status_writes_and_notifies_nothing() {
        let setup = setup(&[("r1", true)]);
        subscribe(&setup, "chatA", "r1").await;
        let before = setup.registry.get("r1").await.unwrap().unwrap();

        setup.monitor.check_all().await.unwrap();
        setup.monitor.check_all().await.unwrap();

        assert_eq!(setup.notifier.deliveries(), vec![]);
        // untouched record, including its last_checked timestamp
        let after = setup.registry.get("r1").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn one_bad_room_does_not_abort_the_batch() {
        let setup = setup(&[("r1", false), ("r3", false)]);
        subscribe(&setup, "chatA", "r1").await;
        subscribe(&setup, "chatA", "r3").await;
        // r2 only exists in the store, the status api rejects it
        let mut orphan = RoomRecord::bootstrap(&snapshot("r2", false));
        orphan.subscribers.insert("chatA".to_string());
        setup.registry.put("r2", &orphan).await.unwrap();

        setup.source.set_live("r1", true);
        setup.source.set_live("r3", true);
        setup.monitor.check_all().await.unwrap();

        assert_eq!(setup.notifier.deliveries().len(), 2);
    }

    #[tokio::test]
    async fn one_failing_delivery_does_not_block_the_others() {
        let registry = Registry::new(Arc::new(MemoryStore::new()));
        let source = FakeSource::with(&[("r1", false)]);
        let notifier = Arc::new(RecordingNotifier::failing_for("chatA"));
        let monitor = Monitor::new(
            registry.clone(),
            source.clone(),
            notifier.clone(),
            Duration::from_secs(300),
            5,
        );

        let subscriptions = SubscriptionManager::new(registry.clone(), source.clone());
        subscriptions.toggle("chatA", "r1").await.unwrap();
        subscriptions.toggle("chatB", "r1").await.unwrap();

        source.set_live("r1", true);
        monitor.check_all().await.unwrap();

        // the rejected delivery to chatA is logged and skipped, chatB is
        // still notified
        let deliveries = notifier.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "chatB");

        // and the transition is still persisted
        let record = registry.get("r1").await.unwrap().unwrap();
        assert!(record.is_live);
        assert!(record.subscribers.contains("chatA"));
    }

    #[test]
    fn zero_concurrency_cap_is_clamped_to_one() {
        let registry = Registry::new(Arc::new(MemoryStore::new()));
        let source = FakeSource::with(&[]);
        let monitor = Monitor::new(
            registry,
            source,
            Arc::new(RecordingNotifier::default()),
            Duration::from_secs(300),
            0,
        );
        assert_eq!(monitor.max_in_flight, 1);
    }

    #[tokio::test]
    async fn subscribe_then_flip_then_unsubscribe_end_to_end() {
        let setup = setup(&[("r1", false)]);
        let subscriptions =
            SubscriptionManager::new(setup.registry.clone(), setup.source.clone());

        let toggled = subscriptions.toggle("chatA", "r1").await.unwrap();
        assert_eq!(toggled, Toggle::Added(snapshot("r1", false)));
        assert!(!setup.registry.get("r1").await.unwrap().unwrap().is_live);

        setup.source.set_live("r1", true);
        setup.monitor.check_all().await.unwrap();
        let deliveries = setup.notifier.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "chatA");
        assert!(deliveries[0].1.contains("went live"));
        assert!(setup.registry.get("r1").await.unwrap().unwrap().is_live);

        subscriptions.toggle("chatA", "r1").await.unwrap();
        assert_eq!(setup.registry.get("r1").await.unwrap(), None);
    }
}
