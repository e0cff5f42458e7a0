//! Alert Dispatcher Implementation

use safety_status::Tier;
use speech::{Speaker, SpeechOptions};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{Category, Event, EventCounts, EventType};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cooldown::{AlertConfig, CooldownGate};
use crate::messages::{critical_issue, critical_message, dangerous_event_message, warning_message};

const CRITICAL_KEY: &str = "critical";
const WARNING_KEY: &str = "warning";

/// A tier transition that qualified for an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAlert {
    pub tier: Tier,
    /// Whether speech went out (false when the cooldown suppressed it)
    pub spoken: bool,
}

/// Spoken-alert policy for one mounted driver view
///
/// Owns its cooldown table; nothing is shared between views.
pub struct AlertDispatcher {
    speaker: Arc<dyn Speaker>,
    config: AlertConfig,
    gate: CooldownGate,
    previous_tier: Option<Tier>,
    alert_until: Option<Instant>,
    /// Newest event id seen so far; `None` before the first observation
    newest_event: Option<Option<Uuid>>,
}

impl AlertDispatcher {
    pub fn new(speaker: Arc<dyn Speaker>, config: AlertConfig) -> Self {
        Self {
            speaker,
            gate: CooldownGate::new(Duration::from_millis(config.cooldown_ms)),
            config,
            previous_tier: None,
            alert_until: None,
            newest_event: None,
        }
    }

    /// Run once per refresh cycle with the freshly classified tier.
    /// Edge-triggered: staying in a tier never re-alerts.
    pub fn evaluate(
        &mut self,
        driver_name: &str,
        tier: Tier,
        counts: &EventCounts,
    ) -> Option<TierAlert> {
        let previous = self.previous_tier;
        self.previous_tier = Some(tier);

        match tier {
            Tier::Critical if previous != Some(Tier::Critical) => {
                let spoken = self.alert_critical(driver_name, &critical_issue(counts));
                self.hold(self.config.critical_hold_ms);
                Some(TierAlert { tier, spoken })
            }
            Tier::Warning
                if !matches!(previous, Some(Tier::Warning) | Some(Tier::Critical)) =>
            {
                let spoken = self.alert_warning(driver_name);
                self.hold(self.config.warning_hold_ms);
                Some(TierAlert { tier, spoken })
            }
            _ => None,
        }
    }

    /// Announce a newly arrived event. The first observation after mount
    /// only records a baseline.
    pub fn observe_newest_event(&mut self, driver_name: &str, newest: Option<&Event>) -> bool {
        let id = newest.map(|e| e.id);
        let Some(seen) = self.newest_event.replace(id) else {
            debug!("Recorded newest-event baseline");
            return false;
        };

        match newest {
            Some(event) if seen != Some(event.id) && Category::of(event.event_type).is_some() => {
                self.alert_dangerous_event(event.event_type, driver_name)
            }
            _ => false,
        }
    }

    pub fn alert_critical(&mut self, driver_name: &str, issue: &str) -> bool {
        if !self.gate.try_fire(CRITICAL_KEY) {
            return false;
        }
        info!("Critical alert for {}", driver_name);
        metrics::counter!("fleet_alerts_total", "kind" => CRITICAL_KEY).increment(1);
        self.speaker
            .speak(&critical_message(driver_name, issue), SpeechOptions::urgent());
        true
    }

    pub fn alert_warning(&mut self, driver_name: &str) -> bool {
        if !self.gate.try_fire(WARNING_KEY) {
            return false;
        }
        info!("Warning alert for {}", driver_name);
        metrics::counter!("fleet_alerts_total", "kind" => WARNING_KEY).increment(1);
        self.speaker
            .speak(&warning_message(driver_name), SpeechOptions::calm());
        true
    }

    pub fn alert_dangerous_event(&mut self, event_type: EventType, driver_name: &str) -> bool {
        if !self.gate.try_fire(event_type.as_str()) {
            return false;
        }
        info!("{} alert for {}", event_type.as_str(), driver_name);
        metrics::counter!("fleet_alerts_total", "kind" => event_type.as_str()).increment(1);
        self.speaker.speak(
            &dangerous_event_message(event_type, driver_name),
            SpeechOptions::default(),
        );
        true
    }

    fn hold(&mut self, millis: u64) {
        self.alert_until = Some(Instant::now() + Duration::from_millis(millis));
    }

    /// True while a recent transition's alert banner should show
    pub fn is_alert_active(&self) -> bool {
        self.alert_until.map_or(false, |until| Instant::now() < until)
    }

    pub fn previous_tier(&self) -> Option<Tier> {
        self.previous_tier
    }

    /// Called when the owning view goes away
    pub fn teardown(&mut self) {
        self.speaker.stop();
        self.gate.clear();
        self.previous_tier = None;
        self.alert_until = None;
        self.newest_event = None;
        debug!("Alert dispatcher torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::critical_messages;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use telemetry::EventSeverity;

    #[derive(Default)]
    struct RecordingSpeaker {
        spoken: Mutex<Vec<(String, SpeechOptions)>>,
        stops: AtomicUsize,
    }

    impl RecordingSpeaker {
        fn messages(&self) -> Vec<String> {
            self.spoken.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    impl Speaker for RecordingSpeaker {
        fn speak(&self, message: &str, options: SpeechOptions) {
            self.spoken.lock().unwrap().push((message.to_string(), options));
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispatcher() -> (AlertDispatcher, Arc<RecordingSpeaker>) {
        let speaker = Arc::new(RecordingSpeaker::default());
        let dispatcher = AlertDispatcher::new(speaker.clone(), AlertConfig::default());
        (dispatcher, speaker)
    }

    fn event(event_type: EventType) -> Event {
        Event {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            event_type,
            severity: EventSeverity::High,
            timestamp: Utc::now(),
            x: None,
            y: None,
            z: None,
        }
    }

    const NAME: &str = "James Wilson";

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_critical_fires_once() {
        let (mut dispatcher, speaker) = dispatcher();
        let counts = EventCounts { swerving: 6, ..Default::default() };

        assert!(dispatcher.evaluate(NAME, Tier::Critical, &counts).is_some());
        tokio::time::advance(Duration::from_millis(2_000)).await;
        assert!(dispatcher.evaluate(NAME, Tier::Critical, &counts).is_none());

        let messages = speaker.messages();
        assert_eq!(messages.len(), 1);
        assert!(critical_messages(NAME, "Swerving detected").contains(&messages[0]));
        assert_eq!(speaker.spoken.lock().unwrap()[0].1.rate, 1.2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentering_critical_respects_cooldown() {
        let (mut dispatcher, speaker) = dispatcher();
        let counts = EventCounts::default();

        dispatcher.evaluate(NAME, Tier::Critical, &counts);
        tokio::time::advance(Duration::from_millis(2_000)).await;
        dispatcher.evaluate(NAME, Tier::Good, &counts);
        tokio::time::advance(Duration::from_millis(2_000)).await;

        // Transition qualifies but "critical" fired 4s ago
        let alert = dispatcher.evaluate(NAME, Tier::Critical, &counts).unwrap();
        assert!(!alert.spoken);
        assert_eq!(speaker.messages().len(), 1);

        dispatcher.evaluate(NAME, Tier::Good, &counts);
        tokio::time::advance(Duration::from_millis(10_000)).await;
        let alert = dispatcher.evaluate(NAME, Tier::Critical, &counts).unwrap();
        assert!(alert.spoken);
        assert_eq!(speaker.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_transitions() {
        let (mut dispatcher, speaker) = dispatcher();
        let counts = EventCounts::default();

        // From the initial "none" state
        assert!(dispatcher.evaluate(NAME, Tier::Warning, &counts).is_some());
        assert_eq!(
            speaker.messages(),
            vec![
                "Attention! James Wilson is showing concerning driving patterns. Monitor closely."
                    .to_string()
            ]
        );
        assert_eq!(speaker.spoken.lock().unwrap()[0].1.rate, 1.0);

        assert!(dispatcher.evaluate(NAME, Tier::Warning, &counts).is_none());
        dispatcher.evaluate(NAME, Tier::Critical, &counts);
        // Critical -> warning is a de-escalation
        assert!(dispatcher.evaluate(NAME, Tier::Warning, &counts).is_none());
        assert_eq!(dispatcher.previous_tier(), Some(Tier::Warning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alert_for_calm_tiers() {
        let (mut dispatcher, speaker) = dispatcher();
        let counts = EventCounts::default();

        for tier in [Tier::Info, Tier::Excellent, Tier::Good] {
            assert!(dispatcher.evaluate(NAME, tier, &counts).is_none());
            assert_eq!(dispatcher.previous_tier(), Some(tier));
        }
        assert!(speaker.messages().is_empty());
        assert!(!dispatcher.is_alert_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_active_hold() {
        let (mut dispatcher, _speaker) = dispatcher();
        let counts = EventCounts::default();

        dispatcher.evaluate(NAME, Tier::Critical, &counts);
        assert!(dispatcher.is_alert_active());
        tokio::time::advance(Duration::from_millis(5_999)).await;
        assert!(dispatcher.is_alert_active());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!dispatcher.is_alert_active());

        dispatcher.evaluate(NAME, Tier::Good, &counts);
        dispatcher.evaluate(NAME, Tier::Warning, &counts);
        assert!(dispatcher.is_alert_active());
        tokio::time::advance(Duration::from_millis(4_000)).await;
        assert!(!dispatcher.is_alert_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_events_alert_after_baseline() {
        let (mut dispatcher, speaker) = dispatcher();
        let first = event(EventType::Swerving);

        assert!(!dispatcher.observe_newest_event(NAME, Some(&first)));
        assert!(!dispatcher.observe_newest_event(NAME, Some(&first)));
        assert!(speaker.messages().is_empty());

        let drowsy = event(EventType::EyesClosed);
        assert!(dispatcher.observe_newest_event(NAME, Some(&drowsy)));
        assert_eq!(
            speaker.messages(),
            vec![
                "Alert! James Wilson is showing signs of drowsiness. Pull over immediately and rest."
                    .to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_type_events_within_cooldown_speak_once() {
        let (mut dispatcher, speaker) = dispatcher();

        assert!(dispatcher.alert_dangerous_event(EventType::HarshBrake, NAME));
        tokio::time::advance(Duration::from_millis(3_000)).await;
        assert!(!dispatcher.alert_dangerous_event(EventType::HarshBrake, NAME));
        assert!(dispatcher.alert_dangerous_event(EventType::Distracted, NAME));

        assert_eq!(speaker.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncategorised_event_is_not_announced() {
        let (mut dispatcher, speaker) = dispatcher();

        dispatcher.observe_newest_event(NAME, None);
        assert!(!dispatcher.observe_newest_event(NAME, Some(&event(EventType::Other))));
        assert!(speaker.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_speech_and_forgets_state() {
        let (mut dispatcher, speaker) = dispatcher();
        let counts = EventCounts::default();

        dispatcher.evaluate(NAME, Tier::Critical, &counts);
        dispatcher.teardown();

        assert_eq!(speaker.stops.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.previous_tier(), None);
        assert!(!dispatcher.is_alert_active());

        // Cooldown table was cleared with the view
        let alert = dispatcher.evaluate(NAME, Tier::Critical, &counts).unwrap();
        assert!(alert.spoken);
        assert_eq!(speaker.messages().len(), 2);
    }
}
