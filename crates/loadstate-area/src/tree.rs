//! Loading tree - arena of loading areas
//!
//! The tree exclusively owns every area. A parent owns its segments; the
//! upward direction is only a listener registered in the child's listener
//! set, whose id the parent keeps and disposes when the segment is removed.
//!
//! Time is the tree's own timeline: nothing happens between calls, and
//! delayed transitions complete only when the owner calls [`LoadingTree::advance`]
//! or [`LoadingTree::advance_to`].

use std::collections::HashMap;
use std::time::Duration;

use loadstate_core::{
    validate_name, AreaId, ConfigPatch, LoadingConfig, LoadingError, LoadingResult,
    SetLoadingOptions, Timestamp,
};
use loadstate_time::{TimelineClock, TimerQueue};

use crate::node::{AreaPhase, LoadingNode, Pending, Segment, TimerKind};
use crate::subscription::{Listener, Subscription};

/// Loading tree
pub struct LoadingTree {
    nodes: HashMap<AreaId, LoadingNode>,
    timers: TimerQueue<(AreaId, TimerKind)>,
    clock: TimelineClock,
    next_id: AreaId,
}

impl LoadingTree {
    pub fn new() -> Self {
        LoadingTree {
            nodes: HashMap::new(),
            timers: TimerQueue::new(),
            clock: TimelineClock::new(),
            next_id: AreaId::new(1),
        }
    }

    // ---------------------------------------------------------------------
    // Construction and teardown
    // ---------------------------------------------------------------------

    /// Create a parentless area
    pub fn create_root(&mut self, config: LoadingConfig) -> AreaId {
        let id = self.insert_node(config);
        tracing::debug!(area = %id, ?config, "area created");
        id
    }

    /// Destroy a parentless area and everything below it
    pub fn remove_root(&mut self, id: AreaId) -> LoadingResult<()> {
        if self.node(id)?.attached {
            return Err(LoadingError::NotARoot(id));
        }
        self.destroy(id);
        tracing::debug!(area = %id, "area removed");
        Ok(())
    }

    /// Add a named segment. Without `config` the segment copies the parent's
    /// current configuration. Names must be non-empty and contain no `/`.
    pub fn add_child(
        &mut self,
        parent: AreaId,
        name: &str,
        config: Option<LoadingConfig>,
    ) -> LoadingResult<AreaId> {
        validate_name(name)?;
        let parent_node = self.node(parent)?;
        if parent_node.segment(name).is_some() {
            return Err(LoadingError::DuplicateName(name.to_string()));
        }
        let config = config.unwrap_or(parent_node.config);

        let child = self.insert_node(config);
        let child_node = self.node_mut(child)?;
        child_node.attached = true;
        let subscription = child_node.listeners.add(Listener::Segment(parent));

        self.node_mut(parent)?.segments.push(Segment {
            name: name.to_string(),
            id: child,
            subscription,
        });
        tracing::debug!(area = %parent, segment = name, child = %child, "segment added");

        // A segment born loading changes the aggregate
        self.emit(parent);
        Ok(child)
    }

    /// Remove a named segment and its subtree, then re-evaluate the parent
    pub fn remove_child(&mut self, parent: AreaId, name: &str) -> LoadingResult<()> {
        let parent_node = self.node_mut(parent)?;
        let index = parent_node
            .segments
            .iter()
            .position(|segment| segment.name == name)
            .ok_or_else(|| LoadingError::NotFound(name.to_string()))?;
        let segment = parent_node.segments.remove(index);

        if let Some(child) = self.nodes.get(&segment.id) {
            child.listeners.remove(segment.subscription);
        }
        self.destroy(segment.id);
        tracing::debug!(area = %parent, segment = name, "segment removed");

        self.handle_segment_state_change(parent);
        Ok(())
    }

    /// Look up a segment by name
    pub fn child(&self, parent: AreaId, name: &str) -> LoadingResult<AreaId> {
        self.node(parent)?
            .segment(name)
            .map(|segment| segment.id)
            .ok_or_else(|| LoadingError::NotFound(name.to_string()))
    }

    /// Segments in insertion order
    pub fn children(&self, id: AreaId) -> LoadingResult<Vec<(String, AreaId)>> {
        Ok(self
            .node(id)?
            .segments
            .iter()
            .map(|segment| (segment.name.clone(), segment.id))
            .collect())
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    /// Request a loading state.
    ///
    /// `true` applies immediately. `false` is debounced and held until the
    /// minimum loading time has passed; it completes while the timeline
    /// advances. `force` applies `loading` to the whole subtree right away.
    pub fn set_loading(
        &mut self,
        id: AreaId,
        loading: bool,
        options: SetLoadingOptions,
    ) -> LoadingResult<()> {
        self.node(id)?;
        if options.force {
            self.force(id, loading);
        } else if loading {
            self.activate(id);
        } else {
            self.schedule_loading_end(id);
        }
        Ok(())
    }

    /// Effective loading state: own flag OR any segment
    pub fn get_loading(&self, id: AreaId) -> LoadingResult<bool> {
        self.node(id)?;
        Ok(self.effective(id))
    }

    /// Own flag only, ignoring segments
    pub fn loading_self(&self, id: AreaId) -> LoadingResult<bool> {
        Ok(self.node(id)?.loading_self)
    }

    pub fn phase(&self, id: AreaId) -> LoadingResult<AreaPhase> {
        Ok(self.node(id)?.phase())
    }

    /// When the area was last activated, if it still counts as active
    pub fn started_at(&self, id: AreaId) -> LoadingResult<Option<Timestamp>> {
        Ok(self.node(id)?.started_at)
    }

    pub fn config(&self, id: AreaId) -> LoadingResult<LoadingConfig> {
        Ok(self.node(id)?.config)
    }

    /// Merge `patch` into the area's config, then overwrite every
    /// descendant's config with the merged result. Timers already running
    /// keep their durations.
    pub fn patch_config(&mut self, id: AreaId, patch: ConfigPatch) -> LoadingResult<()> {
        let node = self.node_mut(id)?;
        node.config = node.config.merged(&patch);
        let config = node.config;
        let segments = node.segment_ids();

        for segment in segments {
            self.overwrite_config(segment, config);
        }
        tracing::debug!(area = %id, ?config, "config patched");
        Ok(())
    }

    /// Subscribe to effective state changes
    pub fn on_emit<F>(&self, id: AreaId, callback: F) -> LoadingResult<Subscription>
    where
        F: FnMut(bool) + Send + 'static,
    {
        let listeners = &self.node(id)?.listeners;
        let listener = listeners.add_callback(Box::new(callback));
        Ok(listeners.subscription(listener))
    }

    /// Number of registered listeners, segment links included
    pub fn listener_count(&self, id: AreaId) -> LoadingResult<usize> {
        Ok(self.node(id)?.listeners.len())
    }

    // ---------------------------------------------------------------------
    // Time
    // ---------------------------------------------------------------------

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Advance the timeline by `dt`, firing due timers.
    /// Returns the number of timers fired.
    pub fn advance(&mut self, dt: Duration) -> usize {
        let target = self.clock.now() + dt;
        self.advance_to(target)
    }

    /// Advance the timeline to `target`, firing due timers in deadline
    /// order. Timers scheduled while firing are honored if they fall due
    /// before `target`.
    pub fn advance_to(&mut self, target: Timestamp) -> usize {
        let mut fired = 0;
        while let Some(due) = self.timers.pop_due(target) {
            self.clock.advance_to(due.deadline);
            let (id, kind) = due.key;
            let live = self
                .nodes
                .get(&id)
                .is_some_and(|node| node.pending.timer() == Some(due.id));
            if !live {
                continue;
            }

            fired += 1;
            tracing::trace!(area = %id, ?kind, at = ?due.deadline, "timer fired");
            match kind {
                TimerKind::Debounce => self.on_debounce_elapsed(id),
                TimerKind::MinDuration => self.on_min_duration_elapsed(id),
            }
        }
        self.clock.advance_to(target);
        fired
    }

    /// Earliest pending deadline across the tree
    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn contains(&self, id: AreaId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live areas
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------------
    // State machine
    // ---------------------------------------------------------------------

    fn activate(&mut self, id: AreaId) {
        self.cancel_pending(id);
        let now = self.clock.now();
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.loading_self = true;
        node.started_at = Some(now);
        tracing::debug!(area = %id, at = ?now, "loading activated");
        self.emit(id);
    }

    fn schedule_loading_end(&mut self, id: AreaId) {
        self.cancel_pending(id);
        let now = self.clock.now();
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let deadline = now + node.config.debounce_time;
        node.pending = Pending::Debounce(self.timers.schedule(deadline, (id, TimerKind::Debounce)));
        tracing::debug!(area = %id, ?deadline, "loading end debounced");
    }

    fn on_debounce_elapsed(&mut self, id: AreaId) {
        let now = self.clock.now();
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.pending = Pending::None;

        // Never activated: nothing to hold on to
        let remaining = match node.started_at {
            Some(started) => node.config.min_loading_time.saturating_sub(now - started),
            None => Duration::ZERO,
        };

        if remaining > Duration::ZERO {
            let deadline = now + remaining;
            node.pending =
                Pending::MinDuration(self.timers.schedule(deadline, (id, TimerKind::MinDuration)));
            tracing::debug!(area = %id, ?deadline, "holding for minimum loading time");
        } else {
            self.finalize(id);
        }
    }

    fn on_min_duration_elapsed(&mut self, id: AreaId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.pending = Pending::None;
        }
        self.finalize(id);
    }

    /// Clear the own flag unless a segment is still loading. A deferred
    /// finalize is not retried; the next segment emission re-evaluates.
    fn finalize(&mut self, id: AreaId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.segments.iter().any(|segment| self.effective(segment.id)) {
            tracing::trace!(area = %id, "finalize deferred, segments still loading");
            return;
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.loading_self = false;
            node.started_at = None;
        }
        tracing::debug!(area = %id, "loading finished");
        self.emit(id);
    }

    fn force(&mut self, id: AreaId, loading: bool) {
        self.cancel_pending(id);
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.forcing = true;
        node.started_at = None;
        let segments = node.segment_ids();

        for segment in segments {
            self.force(segment, loading);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.loading_self = loading;
            node.forcing = false;
        }
        tracing::debug!(area = %id, loading, "loading forced");
        self.emit(id);
    }

    /// Re-derive an area's state after one of its segments changed
    fn handle_segment_state_change(&mut self, id: AreaId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let any_loading = node.segments.iter().any(|segment| self.effective(segment.id));

        if any_loading {
            // Segments override a pending stop. An area that is already
            // visibly active keeps its activation time.
            if node.loading_self && node.started_at.is_some() {
                self.cancel_pending(id);
                self.emit(id);
            } else {
                self.activate(id);
            }
            return;
        }

        if node.started_at.is_none() {
            self.cancel_pending(id);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.loading_self = false;
            }
            self.emit(id);
        } else {
            self.schedule_loading_end(id);
        }
    }

    /// Notify listeners if the effective state differs from the last one
    /// they were told about
    fn emit(&mut self, id: AreaId) {
        let loading = self.effective(id);
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.last_emitted == loading {
            return;
        }
        node.last_emitted = loading;
        let listeners = node.listeners.clone();
        tracing::debug!(area = %id, loading, "state changed");

        for (listener_id, listener) in listeners.snapshot() {
            // Disposed by an earlier listener in this round
            if !listeners.contains(listener_id) {
                continue;
            }
            match listener {
                Listener::Segment(parent) => {
                    let parent_forcing = self.nodes.get(&parent).map(|p| p.forcing);
                    if parent_forcing == Some(false) {
                        self.handle_segment_state_change(parent);
                    }
                }
                Listener::Callback(callback) => {
                    let mut callback = callback.lock();
                    (*callback)(loading);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn effective(&self, id: AreaId) -> bool {
        match self.nodes.get(&id) {
            Some(node) => {
                node.loading_self
                    || node
                        .segments
                        .iter()
                        .any(|segment| self.effective(segment.id))
            }
            None => false,
        }
    }

    fn cancel_pending(&mut self, id: AreaId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let Some(timer) = node.pending.timer() {
                self.timers.cancel(timer);
            }
            node.pending = Pending::None;
        }
    }

    fn overwrite_config(&mut self, id: AreaId, config: LoadingConfig) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.config = config;
        let segments = node.segment_ids();
        for segment in segments {
            self.overwrite_config(segment, config);
        }
    }

    fn insert_node(&mut self, config: LoadingConfig) -> AreaId {
        let id = self.next_id;
        self.next_id = id.next();
        self.nodes.insert(id, LoadingNode::new(config));
        id
    }

    /// Free an area and its subtree: timers cancelled, listeners dropped
    fn destroy(&mut self, id: AreaId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(timer) = node.pending.timer() {
            self.timers.cancel(timer);
        }
        node.listeners.clear();
        for segment in node.segments {
            self.destroy(segment.id);
        }
    }

    fn node(&self, id: AreaId) -> LoadingResult<&LoadingNode> {
        self.nodes.get(&id).ok_or(LoadingError::UnknownArea(id))
    }

    fn node_mut(&mut self, id: AreaId) -> LoadingResult<&mut LoadingNode> {
        self.nodes.get_mut(&id).ok_or(LoadingError::UnknownArea(id))
    }
}

impl Default for LoadingTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoadingTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingTree")
            .field("areas", &self.nodes.len())
            .field("now", &self.clock.now())
            .field("timers", &self.timers)
            .finish()
    }
}
