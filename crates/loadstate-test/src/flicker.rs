//! Flicker Simulator - seeded random traffic against a loading tree
//!
//! Drives a root area with branch segments and leaf segments through
//! random on/off requests, forced resets and time steps, then checks:
//! - Aggregation: an area is loading iff its own flag or a segment is
//! - Floor: a leaf never stops before its minimum time or its debounce
//! - Notifications: every call reports an actual change
//! - Settling: once timers drain, each leaf shows the last value it was given

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use loadstate_area::LoadingTree;
use loadstate_core::{
    AreaId, LoadingConfig, LoadingError, LoadingResult, SetLoadingOptions, Timestamp,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Simulator configuration
#[derive(Clone, Debug)]
pub struct FlickerConfig {
    /// Segments below the root
    pub branch_count: usize,
    /// Leaves below each branch; 0 makes the branches leaves
    pub leaves_per_branch: usize,
    /// Number of random operations
    pub op_count: usize,
    /// Largest time step between operations
    pub max_step: Duration,
    /// Probability that an operation is a forced reset
    pub force_prob: f64,
    /// Probability that a leaf request is "loading"
    pub on_prob: f64,
    pub min_loading_time: Duration,
    pub debounce_time: Duration,
    /// Random seed
    pub seed: u64,
}

impl Default for FlickerConfig {
    fn default() -> Self {
        FlickerConfig {
            branch_count: 4,
            leaves_per_branch: 3,
            op_count: 1000,
            max_step: Duration::from_millis(80),
            force_prob: 0.02,
            on_prob: 0.5,
            min_loading_time: Duration::from_millis(300),
            debounce_time: Duration::from_millis(50),
            seed: 42,
        }
    }
}

impl FlickerConfig {
    /// Light run for quick tests
    pub fn light() -> Self {
        FlickerConfig {
            branch_count: 2,
            leaves_per_branch: 2,
            op_count: 200,
            ..Default::default()
        }
    }

    /// Heavy run for thorough testing
    pub fn heavy() -> Self {
        FlickerConfig {
            branch_count: 8,
            leaves_per_branch: 6,
            op_count: 20_000,
            max_step: Duration::from_millis(150),
            force_prob: 0.05,
            ..Default::default()
        }
    }

    /// Rapid toggling well inside the debounce window
    pub fn jittery() -> Self {
        FlickerConfig {
            op_count: 5000,
            max_step: Duration::from_millis(5),
            force_prob: 0.0,
            debounce_time: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn area_config(&self) -> LoadingConfig {
        LoadingConfig::new()
            .with_min_loading_time(self.min_loading_time)
            .with_debounce_time(self.debounce_time)
    }
}

/// Per-leaf bookkeeping
#[derive(Clone, Debug, Default)]
struct LeafTrack {
    /// Last non-forced activation still counting toward the floor
    activated_at: Option<Timestamp>,
    last_stop_request: Option<Timestamp>,
    /// Value the leaf must settle on
    expected: bool,
}

type Inbox = Arc<Mutex<Vec<(AreaId, bool)>>>;

/// Flicker simulator
pub struct FlickerSimulator {
    config: FlickerConfig,
    tree: LoadingTree,
    root: AreaId,
    /// Every area with its segments, root first
    areas: Vec<(AreaId, Vec<AreaId>)>,
    leaves: Vec<AreaId>,
    tracks: HashMap<AreaId, LeafTrack>,
    last_notified: HashMap<AreaId, bool>,
    inbox: Inbox,
    rng: StdRng,
    result: FlickerResult,
}

impl FlickerSimulator {
    /// Build the tree described by `config`. `branch_count` must be positive.
    pub fn new(config: FlickerConfig) -> LoadingResult<Self> {
        if config.branch_count == 0 {
            return Err(LoadingError::InvalidConfig(
                "branch_count must be positive".into(),
            ));
        }
        let rng = StdRng::seed_from_u64(config.seed);
        let mut tree = LoadingTree::new();
        let root = tree.create_root(config.area_config());
        let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));

        let mut areas = Vec::new();
        let mut leaves = Vec::new();
        let mut branches = Vec::new();

        for b in 0..config.branch_count {
            let branch = tree.add_child(root, &format!("branch{}", b), None)?;
            let mut children = Vec::new();
            for l in 0..config.leaves_per_branch {
                children.push(tree.add_child(branch, &format!("leaf{}", l), None)?);
            }
            if children.is_empty() {
                leaves.push(branch);
            } else {
                leaves.extend(children.iter().copied());
            }
            branches.push(branch);
            areas.push((branch, children));
        }
        areas.insert(0, (root, branches));

        let mut last_notified = HashMap::new();
        let watched = areas.iter().map(|(id, _)| *id).chain(leaves.iter().copied());
        for area in watched {
            if last_notified.contains_key(&area) {
                continue;
            }
            let sink = Arc::clone(&inbox);
            tree.on_emit(area, move |loading| sink.lock().push((area, loading)))?;
            last_notified.insert(area, tree.get_loading(area)?);
        }

        let tracks = leaves.iter().map(|&leaf| (leaf, LeafTrack::default())).collect();

        Ok(FlickerSimulator {
            config,
            tree,
            root,
            areas,
            leaves,
            tracks,
            last_notified,
            inbox,
            rng,
            result: FlickerResult::new(),
        })
    }

    pub fn root(&self) -> AreaId {
        self.root
    }

    pub fn tree(&self) -> &LoadingTree {
        &self.tree
    }

    /// Run the configured number of operations, then let timers drain
    pub fn run(mut self) -> FlickerResult {
        for _ in 0..self.config.op_count {
            self.step();
        }
        self.settle();
        self.result
    }

    fn step(&mut self) {
        let roll: f64 = self.rng.gen();
        if roll < self.config.force_prob {
            self.forced_reset();
        } else {
            let leaf = self.leaves[self.rng.gen_range(0..self.leaves.len())];
            let loading = self.rng.gen::<f64>() < self.config.on_prob;
            self.request(leaf, loading);
        }

        let max = self.config.max_step.as_micros() as u64;
        let dt = Duration::from_micros(self.rng.gen_range(0..=max));
        self.advance(dt);
        self.result.ops += 1;
    }

    fn request(&mut self, leaf: AreaId, loading: bool) {
        let now = self.tree.now();
        if self
            .tree
            .set_loading(leaf, loading, SetLoadingOptions::default())
            .is_err()
        {
            return;
        }
        if let Some(track) = self.tracks.get_mut(&leaf) {
            track.expected = loading;
            if loading {
                track.activated_at = Some(now);
            } else {
                track.last_stop_request = Some(now);
            }
        }
        self.observe(false);
    }

    /// Force a random area off, or a random leaf on
    fn forced_reset(&mut self) {
        let (target, loading) = if self.rng.gen_bool(0.5) {
            (self.areas[self.rng.gen_range(0..self.areas.len())].0, false)
        } else {
            (self.leaves[self.rng.gen_range(0..self.leaves.len())], true)
        };
        if self
            .tree
            .set_loading(target, loading, SetLoadingOptions::forced())
            .is_err()
        {
            return;
        }

        for leaf in self.leaves_under(target) {
            if let Some(track) = self.tracks.get_mut(&leaf) {
                *track = LeafTrack {
                    expected: loading,
                    ..LeafTrack::default()
                };
            }
        }
        self.result.forces += 1;
        self.observe(true);
    }

    fn leaves_under(&self, area: AreaId) -> Vec<AreaId> {
        if self.tracks.contains_key(&area) {
            return vec![area];
        }
        let mut found = Vec::new();
        if let Some((_, children)) = self.areas.iter().find(|(id, _)| *id == area) {
            for child in children {
                found.extend(self.leaves_under(*child));
            }
        }
        found
    }

    /// Advance deadline by deadline so each release is checked at its time
    fn advance(&mut self, dt: Duration) {
        let target = self.tree.now() + dt;
        while let Some(deadline) = self.tree.next_deadline() {
            if deadline > target {
                break;
            }
            self.tree.advance_to(deadline);
            self.observe(false);
        }
        self.tree.advance_to(target);
        self.check_aggregation();
    }

    fn settle(&mut self) {
        while let Some(deadline) = self.tree.next_deadline() {
            self.tree.advance_to(deadline);
            self.observe(false);
        }
        self.check_aggregation();

        for &leaf in &self.leaves {
            let expected = self.tracks.get(&leaf).map(|t| t.expected).unwrap_or(false);
            if self.tree.get_loading(leaf).ok() != Some(expected) {
                self.result.settle_violations += 1;
            }
        }
    }

    /// Drain notifications and check each one
    fn observe(&mut self, forced: bool) {
        let now = self.tree.now();
        let drained: Vec<(AreaId, bool)> = self.inbox.lock().drain(..).collect();

        for (area, loading) in drained {
            self.result.notifications += 1;

            let previous = self.last_notified.insert(area, loading);
            if previous == Some(loading) {
                self.result.duplicate_notifications += 1;
            }

            if forced || loading {
                continue;
            }
            let Some(track) = self.tracks.get_mut(&area) else {
                continue;
            };
            if let Some(activated) = track.activated_at.take() {
                if now < activated + self.config.min_loading_time {
                    self.result.floor_violations += 1;
                }
            }
            if let Some(requested) = track.last_stop_request {
                if now < requested + self.config.debounce_time {
                    self.result.floor_violations += 1;
                }
            }
        }
    }

    fn check_aggregation(&mut self) {
        for (area, children) in &self.areas {
            let own = self.tree.loading_self(*area).unwrap_or(false);
            let any_child = children
                .iter()
                .any(|child| self.tree.get_loading(*child).unwrap_or(false));
            if self.tree.get_loading(*area).ok() != Some(own || any_child) {
                self.result.aggregation_violations += 1;
            }
        }
    }
}

/// Simulation result
#[derive(Debug, Clone, Default)]
pub struct FlickerResult {
    pub ops: u64,
    pub forces: u64,
    pub notifications: u64,
    pub aggregation_violations: u32,
    pub floor_violations: u32,
    pub duplicate_notifications: u32,
    pub settle_violations: u32,
}

impl FlickerResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.aggregation_violations == 0
            && self.floor_violations == 0
            && self.duplicate_notifications == 0
            && self.settle_violations == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_light_run_holds_invariants() {
        let result = FlickerSimulator::new(FlickerConfig::light()).unwrap().run();
        assert!(result.is_valid(), "{:?}", result);
        assert_eq!(result.ops, 200);
        assert!(result.notifications > 0);
    }

    #[test]
    fn test_default_run_holds_invariants() {
        let result = FlickerSimulator::new(FlickerConfig::default()).unwrap().run();
        assert!(result.is_valid(), "{:?}", result);
    }

    #[test]
    fn test_jittery_run_holds_invariants() {
        let result = FlickerSimulator::new(FlickerConfig::jittery()).unwrap().run();
        assert!(result.is_valid(), "{:?}", result);
    }

    #[test]
    fn test_flat_tree() {
        let config = FlickerConfig {
            branch_count: 5,
            leaves_per_branch: 0,
            ..FlickerConfig::light()
        };
        let result = FlickerSimulator::new(config).unwrap().run();
        assert!(result.is_valid(), "{:?}", result);
    }

    #[test]
    fn test_no_timing_policy() {
        let config = FlickerConfig {
            min_loading_time: Duration::ZERO,
            debounce_time: Duration::ZERO,
            ..FlickerConfig::light()
        };
        let result = FlickerSimulator::new(config).unwrap().run();
        assert!(result.is_valid(), "{:?}", result);
    }

    #[test]
    fn test_rejects_empty_tree() {
        let config = FlickerConfig {
            branch_count: 0,
            ..FlickerConfig::light()
        };
        assert!(matches!(
            FlickerSimulator::new(config),
            Err(LoadingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_same_seed_same_run() {
        let a = FlickerSimulator::new(FlickerConfig::light()).unwrap().run();
        let b = FlickerSimulator::new(FlickerConfig::light()).unwrap().run();
        assert_eq!(a.notifications, b.notifications);
        assert_eq!(a.forces, b.forces);
    }

    #[test]
    fn test_tree_shape() {
        let sim = FlickerSimulator::new(FlickerConfig::light()).unwrap();
        assert_eq!(sim.tree().len(), 1 + 2 + 2 * 2);
        assert_eq!(sim.tree().children(sim.root()).unwrap().len(), 2);
    }

    #[test]
    #[ignore]
    fn test_heavy_run_holds_invariants() {
        let result = FlickerSimulator::new(FlickerConfig::heavy()).unwrap().run();
        assert!(result.is_valid(), "{:?}", result);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_any_seed_holds_invariants(
            seed in any::<u64>(),
            min_ms in 0u64..400,
            debounce_ms in 0u64..120,
        ) {
            let config = FlickerConfig {
                op_count: 150,
                min_loading_time: Duration::from_millis(min_ms),
                debounce_time: Duration::from_millis(debounce_ms),
                seed,
                ..FlickerConfig::light()
            };
            let result = FlickerSimulator::new(config).unwrap().run();
            prop_assert!(result.is_valid(), "{:?}", result);
        }
    }
}
