//! Loading area node state

use loadstate_core::{AreaId, LoadingConfig, Timestamp};
use loadstate_time::TimerId;

use crate::subscription::{ListenerId, Listeners};

/// Observable phase of an area's own loading flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AreaPhase {
    /// Not loading, nothing scheduled
    Idle,
    /// Loading, nothing scheduled
    Active,
    /// A stop request is waiting out the debounce delay
    Debouncing,
    /// Debounce elapsed; waiting for the minimum loading time to pass
    ConfirmingMinDuration,
}

/// The single delayed transition an area may have in flight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum Pending {
    #[default]
    None,
    Debounce(TimerId),
    MinDuration(TimerId),
}

impl Pending {
    pub(crate) fn timer(self) -> Option<TimerId> {
        match self {
            Pending::None => None,
            Pending::Debounce(id) | Pending::MinDuration(id) => Some(id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Debounce,
    MinDuration,
}

/// A named child owned by its parent
#[derive(Clone, Debug)]
pub(crate) struct Segment {
    pub name: String,
    pub id: AreaId,
    /// Upward link registered in the child's listener set
    pub subscription: ListenerId,
}

/// One node of a loading tree
pub(crate) struct LoadingNode {
    /// Directly set loading flag, independent of segments
    pub loading_self: bool,
    pub config: LoadingConfig,
    /// Set on non-forced activation, cleared on force and on deactivation
    pub started_at: Option<Timestamp>,
    pub pending: Pending,
    /// Segments in insertion order
    pub segments: Vec<Segment>,
    pub listeners: Listeners,
    /// Effective state subscribers last heard about
    pub last_emitted: bool,
    /// Owned by a parent
    pub attached: bool,
    /// Set while a force cascades through this node's subtree
    pub forcing: bool,
}

impl LoadingNode {
    pub(crate) fn new(config: LoadingConfig) -> Self {
        LoadingNode {
            loading_self: config.initial_loading_state,
            config,
            started_at: None,
            pending: Pending::None,
            segments: Vec::new(),
            listeners: Listeners::new(),
            last_emitted: config.initial_loading_state,
            attached: false,
            forcing: false,
        }
    }

    pub(crate) fn phase(&self) -> AreaPhase {
        match self.pending {
            Pending::Debounce(_) => AreaPhase::Debouncing,
            Pending::MinDuration(_) => AreaPhase::ConfirmingMinDuration,
            Pending::None if self.loading_self => AreaPhase::Active,
            Pending::None => AreaPhase::Idle,
        }
    }

    pub(crate) fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.name == name)
    }

    pub(crate) fn segment_ids(&self) -> Vec<AreaId> {
        self.segments.iter().map(|segment| segment.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadstate_time::TimerQueue;

    #[test]
    fn test_new_node_takes_initial_state() {
        let node = LoadingNode::new(LoadingConfig::new().with_initial_loading_state(true));
        assert!(node.loading_self);
        assert!(node.last_emitted);
        assert_eq!(node.phase(), AreaPhase::Active);
        assert!(node.started_at.is_none());

        let idle = LoadingNode::new(LoadingConfig::default());
        assert_eq!(idle.phase(), AreaPhase::Idle);
    }

    #[test]
    fn test_phase_follows_pending_timer() {
        let mut timers = TimerQueue::new();
        let mut node = LoadingNode::new(LoadingConfig::default());

        node.pending = Pending::Debounce(timers.schedule(Timestamp::ZERO, ()));
        assert_eq!(node.phase(), AreaPhase::Debouncing);

        node.pending = Pending::MinDuration(timers.schedule(Timestamp::ZERO, ()));
        assert_eq!(node.phase(), AreaPhase::ConfirmingMinDuration);
        assert!(node.pending.timer().is_some());
        assert_eq!(Pending::None.timer(), None);
    }
}
