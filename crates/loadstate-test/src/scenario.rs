//! Scenario Runner - scripted timelines with expectations
//!
//! A scenario is a list of steps run against a fresh [`LoadingManager`].
//! Time only moves on `advance` steps, and it moves timer by timer so
//! every recorded notification carries the instant it happened at.

use std::sync::Arc;
use std::time::Duration;

use loadstate_core::{LoadingConfig, SetLoadingOptions, Timestamp};
use loadstate_runtime::LoadingManager;
use parking_lot::Mutex;

/// One scripted action or check
#[derive(Clone, Debug)]
pub enum Step {
    Area {
        name: String,
        config: LoadingConfig,
    },
    Segment {
        parent: String,
        name: String,
    },
    RemoveSegment {
        parent: String,
        name: String,
    },
    Set {
        path: String,
        loading: bool,
        force: bool,
    },
    /// Record notifications of `path` from now on
    Watch {
        path: String,
    },
    Advance(Duration),
    Expect {
        path: String,
        loading: bool,
    },
    /// Notifications recorded for `path` so far
    ExpectNotifications {
        path: String,
        states: Vec<bool>,
    },
}

/// Notification observed while running
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub path: String,
    pub at: Timestamp,
    pub loading: bool,
}

/// A step that did not hold
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepFailure {
    pub step: usize,
    pub at: Timestamp,
    pub message: String,
}

/// Outcome of a scenario run
#[derive(Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub steps_run: usize,
    pub failures: Vec<StepFailure>,
    pub notifications: Vec<Notification>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Notifications recorded for one path
    pub fn notifications_for(&self, path: &str) -> Vec<(Timestamp, bool)> {
        self.notifications
            .iter()
            .filter(|n| n.path == path)
            .map(|n| (n.at, n.loading))
            .collect()
    }
}

type Inbox = Arc<Mutex<Vec<(String, bool)>>>;

/// Scripted scenario
#[derive(Clone, Debug)]
pub struct Scenario {
    name: String,
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Scenario {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn area(self, name: &str, config: LoadingConfig) -> Self {
        self.step(Step::Area {
            name: name.to_string(),
            config,
        })
    }

    pub fn segment(self, parent: &str, name: &str) -> Self {
        self.step(Step::Segment {
            parent: parent.to_string(),
            name: name.to_string(),
        })
    }

    pub fn remove_segment(self, parent: &str, name: &str) -> Self {
        self.step(Step::RemoveSegment {
            parent: parent.to_string(),
            name: name.to_string(),
        })
    }

    pub fn set(self, path: &str, loading: bool) -> Self {
        self.step(Step::Set {
            path: path.to_string(),
            loading,
            force: false,
        })
    }

    pub fn force(self, path: &str, loading: bool) -> Self {
        self.step(Step::Set {
            path: path.to_string(),
            loading,
            force: true,
        })
    }

    pub fn watch(self, path: &str) -> Self {
        self.step(Step::Watch {
            path: path.to_string(),
        })
    }

    pub fn advance(self, dt: Duration) -> Self {
        self.step(Step::Advance(dt))
    }

    pub fn advance_ms(self, millis: u64) -> Self {
        self.advance(Duration::from_millis(millis))
    }

    pub fn expect(self, path: &str, loading: bool) -> Self {
        self.step(Step::Expect {
            path: path.to_string(),
            loading,
        })
    }

    pub fn expect_notifications(self, path: &str, states: &[bool]) -> Self {
        self.step(Step::ExpectNotifications {
            path: path.to_string(),
            states: states.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step. Failures are collected; the run never stops early.
    pub fn run(&self) -> ScenarioReport {
        let mut runner = Runner {
            manager: LoadingManager::new(),
            inbox: Arc::new(Mutex::new(Vec::new())),
            notifications: Vec::new(),
            failures: Vec::new(),
        };

        for (index, step) in self.steps.iter().enumerate() {
            if let Err(message) = runner.apply(step) {
                runner.failures.push(StepFailure {
                    step: index,
                    at: runner.manager.now(),
                    message,
                });
            }
            runner.collect();
        }

        ScenarioReport {
            name: self.name.clone(),
            steps_run: self.steps.len(),
            failures: runner.failures,
            notifications: runner.notifications,
        }
    }
}

struct Runner {
    manager: LoadingManager,
    inbox: Inbox,
    notifications: Vec<Notification>,
    failures: Vec<StepFailure>,
}

impl Runner {
    fn apply(&mut self, step: &Step) -> Result<(), String> {
        let manager = &mut self.manager;
        match step {
            Step::Area { name, config } => {
                manager
                    .create_area(name, Some(*config))
                    .map_err(|e| e.to_string())?;
            }
            Step::Segment { parent, name } => {
                manager
                    .add_segment(parent, name, None)
                    .map_err(|e| e.to_string())?;
            }
            Step::RemoveSegment { parent, name } => {
                manager
                    .remove_segment(parent, name)
                    .map_err(|e| e.to_string())?;
            }
            Step::Set {
                path,
                loading,
                force,
            } => {
                manager
                    .set_loading_state(path, *loading, SetLoadingOptions { force: *force })
                    .map_err(|e| e.to_string())?;
            }
            Step::Watch { path } => {
                let inbox = Arc::clone(&self.inbox);
                let watched = path.clone();
                manager
                    .subscribe(path, move |loading| inbox.lock().push((watched.clone(), loading)))
                    .map_err(|e| e.to_string())?;
            }
            Step::Advance(dt) => {
                let target = manager.now() + *dt;
                // Stop at every deadline so notifications get exact times
                while let Some(deadline) = self.manager.next_deadline() {
                    if deadline > target {
                        break;
                    }
                    self.manager.advance_to(deadline);
                    self.collect();
                }
                self.manager.advance_to(target);
            }
            Step::Expect { path, loading } => {
                let actual = manager.get_loading_state(path).map_err(|e| e.to_string())?;
                if actual != *loading {
                    return Err(format!(
                        "expected {} to be {}, was {}",
                        path, loading, actual
                    ));
                }
            }
            Step::ExpectNotifications { path, states } => {
                let actual: Vec<bool> = self
                    .notifications
                    .iter()
                    .filter(|n| &n.path == path)
                    .map(|n| n.loading)
                    .collect();
                if actual != *states {
                    return Err(format!(
                        "expected notifications {:?} for {}, got {:?}",
                        states, path, actual
                    ));
                }
            }
        }
        Ok(())
    }

    fn collect(&mut self) {
        let at = self.manager.now();
        let drained: Vec<(String, bool)> = self.inbox.lock().drain(..).collect();
        self.notifications
            .extend(drained.into_iter().map(|(path, loading)| Notification {
                path,
                at,
                loading,
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_ms: u64, debounce_ms: u64) -> LoadingConfig {
        LoadingConfig::new()
            .with_min_loading_time(Duration::from_millis(min_ms))
            .with_debounce_time(Duration::from_millis(debounce_ms))
    }

    #[test]
    fn test_minimum_loading_time_scenario() {
        let report = Scenario::new("min loading time")
            .area("page", config(1000, 0))
            .watch("page")
            .set("page", true)
            .set("page", false)
            .expect("page", true)
            .advance_ms(999)
            .expect("page", true)
            .advance_ms(1)
            .expect("page", false)
            .expect_notifications("page", &[true, false])
            .run();

        assert!(report.passed(), "{:?}", report.failures);
        assert_eq!(
            report.notifications_for("page"),
            vec![
                (Timestamp::ZERO, true),
                (Timestamp::from_millis(1000), false)
            ]
        );
    }

    #[test]
    fn test_two_segments_scenario() {
        let report = Scenario::new("two segments")
            .area("page", config(100, 50))
            .segment("page", "a")
            .segment("page", "b")
            .set("page/a", true)
            .set("page/b", true)
            .set("page/a", false)
            .set("page/b", false)
            .advance_ms(90)
            .expect("page", true)
            .advance_ms(60)
            .expect("page", false)
            .run();

        assert!(report.passed(), "{:?}", report.failures);
    }

    #[test]
    fn test_flicker_is_absorbed() {
        let report = Scenario::new("flicker")
            .area("page", config(0, 100))
            .watch("page")
            .set("page", true)
            .set("page", false)
            .advance_ms(40)
            .set("page", true)
            .set("page", false)
            .advance_ms(40)
            .set("page", true)
            .advance_ms(500)
            .expect("page", true)
            .expect_notifications("page", &[true])
            .run();

        assert!(report.passed(), "{:?}", report.failures);
    }

    #[test]
    fn test_force_scenario() {
        let report = Scenario::new("force")
            .area("page", config(1000, 300))
            .segment("page", "list")
            .watch("page")
            .set("page/list", true)
            .force("page", false)
            .expect("page", false)
            .expect("page/list", false)
            .expect_notifications("page", &[true, false])
            .run();

        assert!(report.passed(), "{:?}", report.failures);
    }

    #[test]
    fn test_failures_are_reported() {
        let report = Scenario::new("broken")
            .area("page", config(0, 0))
            .segment("page", "a")
            .segment("page", "a")
            .expect("page", true)
            .remove_segment("page", "ghost")
            .run();

        assert!(!report.passed());
        let steps: Vec<usize> = report.failures.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![2, 3, 4]);
        assert_eq!(report.steps_run, 5);
        assert!(report.failures[0].message.contains("already exists"));
    }
}
