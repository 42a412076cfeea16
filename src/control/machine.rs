//! Display state machine.
//!
//! Owns power state, the media set and the cursor into it. Every transition
//! is synchronous and returns the render directives it produced.
//!
//! Invariants kept after every event:
//! - `current` is `None` exactly when the set is empty
//! - `current`, when set, is a valid index into the set

use super::registry::{MediaSet, RegistryEffect};
use super::{Channel, ControlError, ControlEvent, MediaItem, StatusSnapshot};
use crate::render::{ErrorDialog, RenderDirective};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Display power state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    #[default]
    On,
    Off,
}

/// Result of applying one event
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub directives: Vec<RenderDirective>,
    /// At most one diagnostic per event
    pub notice: Option<ControlError>,
    /// Ask the media collaborator for a full rescan
    pub rescan: bool,
}

impl Outcome {
    fn push(&mut self, directive: RenderDirective) {
        self.directives.push(directive);
    }
}

pub struct DisplayStateMachine {
    power: Power,
    current: Option<usize>,
    media: MediaSet,
    closed: HashSet<Channel>,
    no_media_message: String,
}

impl DisplayStateMachine {
    /// Create the machine with an empty set and the given power state
    pub fn new(power: Power) -> Self {
        Self {
            power,
            current: None,
            media: MediaSet::new(),
            closed: HashSet::new(),
            no_media_message: "No media found. Add some GIFs and they will show up.".to_string(),
        }
    }

    /// Set the text shown when there is nothing to display
    pub fn with_no_media_message(mut self, message: impl Into<String>) -> Self {
        self.no_media_message = message.into();
        self
    }

    /// Directives that put the sink into the initial state explicitly
    pub fn start(&self) -> Vec<RenderDirective> {
        match self.power {
            Power::On => vec![RenderDirective::Unhide],
            Power::Off => vec![RenderDirective::Hide],
        }
    }

    pub fn power(&self) -> Power {
        self.power
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn media(&self) -> &MediaSet {
        &self.media
    }

    /// The item currently marked shown
    pub fn shown(&self) -> Option<&MediaItem> {
        self.current.and_then(|i| self.media.get(i))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            power: self.power(),
            current_index: self.current_index(),
            shown: self.shown().cloned(),
            media_count: self.media().len(),
            updated_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Apply one control event
    pub fn apply(&mut self, event: ControlEvent) -> Outcome {
        let mut outcome = Outcome::default();

        match event {
            ControlEvent::PowerOn => self.power_on(&mut outcome),
            ControlEvent::PowerOff => self.power_off(&mut outcome),
            ControlEvent::Advance => self.advance(&mut outcome),
            ControlEvent::ReloadRequested => outcome.rescan = true,
            ControlEvent::SetAdded(item) => {
                if let RegistryEffect::Inserted(_) = self.media.add(item) {
                    if self.current.is_none() {
                        self.show(0, &mut outcome);
                    }
                }
            }
            ControlEvent::SetRemoved(item) => {
                if let RegistryEffect::Removed(index) = self.media.remove(&item) {
                    self.after_removal(index, &mut outcome);
                }
            }
            ControlEvent::SetReplaced(items) => self.replace(items, &mut outcome),
            ControlEvent::ScanCompleted => {
                if self.media.is_empty() {
                    self.show_empty(&mut outcome);
                }
            }
            ControlEvent::ChannelClosed(channel) => {
                if self.closed.insert(channel) {
                    outcome.push(RenderDirective::ShowErrorDialog(
                        ErrorDialog::channel_closed(channel),
                    ));
                    outcome.notice = Some(ControlError::ChannelClosed(channel));
                }
            }
        }

        outcome
    }

    fn power_on(&mut self, outcome: &mut Outcome) {
        if self.power == Power::On {
            tracing::debug!("Already powered on");
            return;
        }

        self.power = Power::On;
        outcome.push(RenderDirective::Unhide);

        if self.media.is_empty() {
            outcome.push(RenderDirective::ShowEmpty);
            outcome.notice = Some(ControlError::EmptyMediaSet);
        }
    }

    fn power_off(&mut self, outcome: &mut Outcome) {
        if self.power == Power::Off {
            tracing::debug!("Already powered off");
            return;
        }

        self.power = Power::Off;
        outcome.push(RenderDirective::Hide);
    }

    fn advance(&mut self, outcome: &mut Outcome) {
        if self.power == Power::Off {
            tracing::debug!("Ignoring advance while powered off");
            return;
        }

        match (self.media.len(), self.current) {
            (0, _) => outcome.notice = Some(ControlError::EmptyMediaSet),
            (1, _) => outcome.notice = Some(ControlError::SingleItemSet),
            (len, current) => {
                let next = current.map_or(0, |i| (i + 1) % len);
                self.show(next, outcome);
            }
        }
    }

    /// Fix up the cursor after the registry removed `index`
    fn after_removal(&mut self, index: usize, outcome: &mut Outcome) {
        if self.media.is_empty() {
            self.show_empty(outcome);
            return;
        }

        let Some(current) = self.current else {
            return;
        };

        if index < current {
            // Same item, one slot earlier
            self.current = Some(current - 1);
        } else if index == current {
            // The former next item slid into this slot
            let next = if current >= self.media.len() { 0 } else { current };
            self.show(next, outcome);
        }
    }

    /// Replace the whole set, emitting at most one item change
    fn replace(&mut self, items: Vec<MediaItem>, outcome: &mut Outcome) {
        let previous: Vec<MediaItem> = self.media.iter().cloned().collect();
        let shown = self.shown().cloned();

        let incoming: HashSet<&MediaItem> = items.iter().collect();
        for item in previous.iter().filter(|i| !incoming.contains(i)) {
            self.media.remove(item);
        }
        for item in items.iter().cloned() {
            self.media.add(item);
        }

        if self.media.is_empty() {
            self.show_empty(outcome);
            return;
        }

        let Some(shown) = shown else {
            self.show(0, outcome);
            return;
        };

        if let Some(index) = self.media.position(&shown) {
            self.current = Some(index);
            return;
        }

        // Successor: first survivor after the old shown item, wrapping around
        let start = previous.iter().position(|i| *i == shown).unwrap_or(0);
        let next = (1..previous.len())
            .map(|k| &previous[(start + k) % previous.len()])
            .find_map(|item| self.media.position(item))
            .unwrap_or(0);
        self.show(next, outcome);
    }

    fn show(&mut self, index: usize, outcome: &mut Outcome) {
        self.current = Some(index);
        if let Some(item) = self.media.get(index) {
            outcome.push(RenderDirective::ShowItem(item.clone()));
        }
    }

    fn show_empty(&mut self, outcome: &mut Outcome) {
        self.current = None;
        outcome.push(RenderDirective::ShowEmpty);
        outcome.push(RenderDirective::ShowErrorDialog(ErrorDialog::no_media(
            self.no_media_message.clone(),
        )));
        outcome.notice = Some(ControlError::EmptyMediaSet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> MediaItem {
        MediaItem::new(id)
    }

    fn show(id: &str) -> RenderDirective {
        RenderDirective::ShowItem(item(id))
    }

    fn machine_with(power: Power, ids: &[&str]) -> DisplayStateMachine {
        let mut machine = DisplayStateMachine::new(power);
        for id in ids {
            machine.apply(ControlEvent::SetAdded(item(id)));
        }
        machine
    }

    fn assert_invariants(machine: &DisplayStateMachine) {
        match machine.current_index() {
            None => assert!(machine.media().is_empty()),
            Some(i) => assert!(i < machine.media().len()),
        }
    }

    #[test]
    fn starts_with_explicit_visibility() {
        assert_eq!(DisplayStateMachine::new(Power::On).start(), [RenderDirective::Unhide]);
        assert_eq!(DisplayStateMachine::new(Power::Off).start(), [RenderDirective::Hide]);
    }

    #[test]
    fn first_add_marks_item_shown() {
        let mut machine = DisplayStateMachine::new(Power::On);
        let outcome = machine.apply(ControlEvent::SetAdded(item("a")));

        assert_eq!(outcome.directives, [show("a")]);
        assert_eq!(machine.current_index(), Some(0));

        let outcome = machine.apply(ControlEvent::SetAdded(item("b")));
        assert!(outcome.directives.is_empty());
        assert_eq!(machine.shown(), Some(&item("a")));
    }

    #[test]
    fn power_on_with_empty_set_shows_empty() {
        let mut machine = DisplayStateMachine::new(Power::Off);
        let outcome = machine.apply(ControlEvent::PowerOn);

        assert_eq!(
            outcome.directives,
            [RenderDirective::Unhide, RenderDirective::ShowEmpty]
        );
        assert_eq!(outcome.notice, Some(ControlError::EmptyMediaSet));
        assert_eq!(machine.power(), Power::On);
    }

    #[test]
    fn power_transitions() {
        let mut machine = machine_with(Power::On, &["a"]);

        assert_eq!(machine.apply(ControlEvent::PowerOff).directives, [RenderDirective::Hide]);
        assert!(machine.apply(ControlEvent::PowerOff).directives.is_empty());
        assert_eq!(machine.apply(ControlEvent::PowerOn).directives, [RenderDirective::Unhide]);
        assert!(machine.apply(ControlEvent::PowerOn).directives.is_empty());
    }

    #[test]
    fn advance_walks_the_set_and_wraps() {
        let mut machine = machine_with(Power::On, &["a", "b", "c"]);
        assert_eq!(machine.shown(), Some(&item("a")));

        assert_eq!(machine.apply(ControlEvent::Advance).directives, [show("b")]);
        assert_eq!(machine.apply(ControlEvent::Advance).directives, [show("c")]);
        assert_eq!(machine.apply(ControlEvent::Advance).directives, [show("a")]);
    }

    #[test]
    fn advance_is_cyclic_for_any_size() {
        for n in 2..8 {
            let ids: Vec<String> = (0..n).map(|i| format!("{}.gif", i)).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let mut machine = machine_with(Power::On, &refs);
            machine.apply(ControlEvent::Advance);
            let start = machine.current_index();

            for _ in 0..n {
                machine.apply(ControlEvent::Advance);
                assert_invariants(&machine);
            }
            assert_eq!(machine.current_index(), start);
        }
    }

    #[test]
    fn advance_on_empty_or_single_set_is_a_no_op() {
        let mut empty = DisplayStateMachine::new(Power::On);
        let outcome = empty.apply(ControlEvent::Advance);
        assert!(outcome.directives.is_empty());
        assert_eq!(outcome.notice, Some(ControlError::EmptyMediaSet));
        assert_eq!(empty.current_index(), None);

        let mut single = machine_with(Power::On, &["a"]);
        let outcome = single.apply(ControlEvent::Advance);
        assert!(outcome.directives.is_empty());
        assert_eq!(outcome.notice, Some(ControlError::SingleItemSet));
        assert_eq!(single.shown(), Some(&item("a")));
    }

    #[test]
    fn advance_while_off_is_ignored() {
        let mut machine = machine_with(Power::Off, &["a", "b"]);
        let outcome = machine.apply(ControlEvent::Advance);

        assert_eq!(outcome, Outcome::default());
        assert_eq!(machine.current_index(), Some(0));
    }

    #[test]
    fn removing_shown_item_selects_next() {
        let mut machine = machine_with(Power::On, &["a", "b", "c"]);
        machine.apply(ControlEvent::Advance);

        let outcome = machine.apply(ControlEvent::SetRemoved(item("b")));
        assert_eq!(outcome.directives, [show("c")]);
        assert_eq!(machine.current_index(), Some(1));
    }

    #[test]
    fn removing_last_shown_item_wraps_to_first() {
        let mut machine = machine_with(Power::On, &["a", "b", "c"]);
        machine.apply(ControlEvent::Advance);
        machine.apply(ControlEvent::Advance);

        let outcome = machine.apply(ControlEvent::SetRemoved(item("c")));
        assert_eq!(outcome.directives, [show("a")]);
        assert_eq!(machine.current_index(), Some(0));
    }

    #[test]
    fn removing_earlier_item_keeps_shown_item() {
        let mut machine = machine_with(Power::On, &["a", "b", "c"]);
        machine.apply(ControlEvent::Advance);
        machine.apply(ControlEvent::Advance);

        let outcome = machine.apply(ControlEvent::SetRemoved(item("a")));
        assert!(outcome.directives.is_empty());
        assert_eq!(machine.shown(), Some(&item("c")));
        assert_eq!(machine.current_index(), Some(1));
    }

    #[test]
    fn draining_the_set_shows_empty() {
        let mut machine = machine_with(Power::On, &["a"]);
        let outcome = machine.apply(ControlEvent::SetRemoved(item("a")));

        assert_eq!(outcome.directives[0], RenderDirective::ShowEmpty);
        assert!(matches!(
            &outcome.directives[1],
            RenderDirective::ShowErrorDialog(d) if d.kind == crate::render::DialogKind::NoMedia
        ));
        assert_eq!(outcome.notice, Some(ControlError::EmptyMediaSet));
        assert_eq!(machine.current_index(), None);
    }

    #[test]
    fn stale_remove_is_ignored() {
        let mut machine = machine_with(Power::On, &["a"]);
        let outcome = machine.apply(ControlEvent::SetRemoved(item("ghost")));

        assert_eq!(outcome, Outcome::default());
        assert_eq!(machine.shown(), Some(&item("a")));
    }

    #[test]
    fn removal_always_leaves_one_shown_item() {
        let ids = ["a", "b", "c", "d"];
        for shown in 0..ids.len() {
            for removed in ids {
                let mut machine = machine_with(Power::On, &ids);
                for _ in 0..shown {
                    machine.apply(ControlEvent::Advance);
                }
                machine.apply(ControlEvent::SetRemoved(item(removed)));

                assert_invariants(&machine);
                assert!(machine.shown().is_some());
                assert_ne!(machine.shown(), Some(&item(removed)));
            }
        }
    }

    #[test]
    fn empty_scan_shows_empty() {
        let mut machine = DisplayStateMachine::new(Power::On);
        let outcome = machine.apply(ControlEvent::ScanCompleted);
        assert_eq!(outcome.directives[0], RenderDirective::ShowEmpty);
        assert_eq!(outcome.notice, Some(ControlError::EmptyMediaSet));

        let mut machine = machine_with(Power::On, &["a"]);
        assert_eq!(machine.apply(ControlEvent::ScanCompleted), Outcome::default());
    }

    #[test]
    fn replace_with_empty_list_shows_empty() {
        let mut machine = machine_with(Power::On, &["a", "b"]);
        let outcome = machine.apply(ControlEvent::SetReplaced(Vec::new()));

        assert_eq!(outcome.directives[0], RenderDirective::ShowEmpty);
        assert_eq!(outcome.notice, Some(ControlError::EmptyMediaSet));
        assert!(machine.media().is_empty());
        assert_eq!(machine.current_index(), None);
    }

    #[test]
    fn replace_keeps_surviving_shown_item() {
        let mut machine = machine_with(Power::On, &["a", "b", "c"]);
        machine.apply(ControlEvent::Advance);

        let outcome =
            machine.apply(ControlEvent::SetReplaced(vec![item("x"), item("b"), item("c")]));
        assert!(outcome.directives.is_empty());
        assert_eq!(machine.shown(), Some(&item("b")));
        assert_eq!(machine.current_index(), Some(0));

        let ids: Vec<&str> = machine.media().iter().map(MediaItem::id).collect();
        assert_eq!(ids, ["b", "c", "x"]);
    }

    #[test]
    fn replace_dropping_shown_item_picks_successor() {
        let mut machine = machine_with(Power::On, &["a", "b", "c"]);
        machine.apply(ControlEvent::Advance);

        let outcome = machine.apply(ControlEvent::SetReplaced(vec![item("a"), item("c")]));
        assert_eq!(outcome.directives, [show("c")]);

        let outcome = machine.apply(ControlEvent::SetReplaced(vec![item("y"), item("z")]));
        assert_eq!(outcome.directives, [show("y")]);
        assert_invariants(&machine);
    }

    #[test]
    fn replace_into_empty_set_shows_first() {
        let mut machine = DisplayStateMachine::new(Power::On);
        let outcome = machine.apply(ControlEvent::SetReplaced(vec![item("a"), item("a")]));

        assert_eq!(outcome.directives, [show("a")]);
        assert_eq!(machine.media().len(), 1);
    }

    #[test]
    fn channel_closed_is_escalated_once() {
        let mut machine = DisplayStateMachine::new(Power::On);

        let first = machine.apply(ControlEvent::ChannelClosed(Channel::Network));
        assert_eq!(first.directives.len(), 1);
        assert_eq!(first.notice, Some(ControlError::ChannelClosed(Channel::Network)));

        let again = machine.apply(ControlEvent::ChannelClosed(Channel::Network));
        assert_eq!(again, Outcome::default());

        let other = machine.apply(ControlEvent::ChannelClosed(Channel::Gpio));
        assert_eq!(other.directives.len(), 1);
    }

    #[test]
    fn reload_requests_rescan_without_state_change() {
        let mut machine = machine_with(Power::On, &["a", "b"]);
        let outcome = machine.apply(ControlEvent::ReloadRequested);

        assert!(outcome.rescan);
        assert!(outcome.directives.is_empty());
        assert_eq!(machine.current_index(), Some(0));
    }
}
