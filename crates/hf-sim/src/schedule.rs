//! Periodic event schedule.
//!
//! Trigger times come from `PeriodicEvent`'s integer-indexed formula, so the
//! "is this event due at `t_event`" test is exact float equality against the
//! same computation that produced `t_event`.

use hf_framework::{Event, EventDeclaration};

#[derive(Debug, Clone, Default)]
pub struct EventSchedule {
    declarations: Vec<EventDeclaration>,
}

impl EventSchedule {
    /// Declarations must be in system add order; ties dispatch in that order.
    pub fn new(declarations: Vec<EventDeclaration>) -> Self {
        Self { declarations }
    }

    pub fn declarations(&self) -> &[EventDeclaration] {
        &self.declarations
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Earliest trigger time strictly after `t`.
    pub fn next_event_time(&self, t: f64) -> Option<f64> {
        self.declarations
            .iter()
            .map(|d| d.event.next_trigger_after(t))
            .min_by(f64::total_cmp)
    }

    /// Events due exactly at `t0`, for initialization.
    pub fn initial_events(&self, t0: f64) -> Vec<Event> {
        self.collect(t0, |d| d.event.first_trigger_at_or_after(t0))
    }

    /// Events whose first trigger after `t_prev` is exactly `t_event`.
    pub fn events_at(&self, t_prev: f64, t_event: f64) -> Vec<Event> {
        self.collect(t_event, |d| d.event.next_trigger_after(t_prev))
    }

    fn collect(&self, t: f64, trigger: impl Fn(&EventDeclaration) -> f64) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .declarations
            .iter()
            .filter(|d| trigger(d) == t)
            .map(|d| Event::periodic(d, t))
            .collect();
        // Stable: declaration order survives within each kind.
        events.sort_by_key(|e| e.kind);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_framework::{EventKind, PeriodicEvent};
    use proptest::prelude::*;

    fn decl(owner: usize, event: PeriodicEvent) -> EventDeclaration {
        EventDeclaration {
            owner,
            system: format!("s{owner}"),
            ordinal: 0,
            event,
        }
    }

    #[test]
    fn updates_sort_before_publishes() {
        let schedule = EventSchedule::new(vec![
            decl(1, PeriodicEvent::publish(0.5).unwrap()),
            decl(2, PeriodicEvent::discrete_update(0.25).unwrap()),
            decl(3, PeriodicEvent::publish(0.25).unwrap()),
        ]);
        let at0: Vec<_> = schedule.initial_events(0.0).iter().map(|e| (e.owner, e.kind)).collect();
        assert_eq!(
            at0,
            vec![
                (2, EventKind::DiscreteUpdate),
                (1, EventKind::Publish),
                (3, EventKind::Publish)
            ]
        );
        assert_eq!(schedule.next_event_time(0.0), Some(0.25));
        let at_quarter: Vec<_> = schedule.events_at(0.0, 0.25).iter().map(|e| e.owner).collect();
        assert_eq!(at_quarter, vec![2, 3]);
    }

    #[test]
    fn clipped_interval_fires_nothing() {
        let schedule = EventSchedule::new(vec![decl(1, PeriodicEvent::publish(1.0).unwrap())]);
        assert!(schedule.events_at(0.0, 0.5).is_empty());
    }

    #[test]
    fn offset_delays_first_event() {
        let event = PeriodicEvent::new(0.1, 0.05, EventKind::Publish).unwrap();
        let schedule = EventSchedule::new(vec![decl(1, event)]);
        assert!(schedule.initial_events(0.0).is_empty());
        assert_eq!(schedule.next_event_time(0.0), Some(0.05));
    }

    proptest! {
        #[test]
        fn walking_the_schedule_visits_every_trigger(
            period in 0.01f64..1.0,
            offset in 0.0f64..1.0,
            t_final in 0.0f64..5.0,
        ) {
            let event = PeriodicEvent::new(period, offset, EventKind::Publish).unwrap();
            let schedule = EventSchedule::new(vec![decl(1, event)]);

            let mut seen = Vec::new();
            if !schedule.initial_events(0.0).is_empty() {
                seen.push(0.0);
            }
            let mut t = 0.0;
            while t < t_final {
                let t_event = schedule.next_event_time(t).unwrap().min(t_final);
                if !schedule.events_at(t, t_event).is_empty() {
                    seen.push(t_event);
                }
                t = t_event;
            }

            let expected: Vec<f64> = (0..)
                .map(|k| event.trigger_time(k))
                .take_while(|&tk| tk <= t_final)
                .collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
