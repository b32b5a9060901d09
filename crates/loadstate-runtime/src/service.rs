//! Loading service - async owner of the registry
//!
//! The service task exclusively owns a [`LoadingManager`]. Handles send it
//! commands over a bounded channel and await the reply on a oneshot. Between
//! commands the task sleeps until the next timer deadline and moves the tree's
//! timeline up to wall time, so delayed transitions complete without callers
//! touching the clock.
//!
//! Subscriber callbacks run on the service task.

use std::collections::BTreeMap;

use loadstate_area::{Callback, Subscription};
use loadstate_core::{
    AreaId, ConfigPatch, LoadingConfig, LoadingError, LoadingResult, SetLoadingOptions, Timestamp,
};
use loadstate_time::WallClock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{LoadingManager, ServiceConfig};

pub type Reply<T> = oneshot::Sender<LoadingResult<T>>;

/// Request to the service task
pub enum Command {
    CreateArea {
        name: String,
        config: Option<LoadingConfig>,
        reply: Reply<AreaId>,
    },
    RemoveArea {
        name: String,
        reply: Reply<()>,
    },
    AddSegment {
        path: String,
        name: String,
        config: Option<LoadingConfig>,
        reply: Reply<AreaId>,
    },
    RemoveSegment {
        path: String,
        name: String,
        reply: Reply<()>,
    },
    SetLoading {
        path: String,
        loading: bool,
        options: SetLoadingOptions,
        reply: Reply<()>,
    },
    GetLoading {
        path: String,
        reply: Reply<bool>,
    },
    PatchConfig {
        path: String,
        patch: ConfigPatch,
        reply: Reply<()>,
    },
    Subscribe {
        path: String,
        callback: Callback,
        reply: Reply<Subscription>,
    },
    Areas {
        reply: Reply<BTreeMap<String, AreaId>>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::CreateArea { .. } => "create_area",
            Command::RemoveArea { .. } => "remove_area",
            Command::AddSegment { .. } => "add_segment",
            Command::RemoveSegment { .. } => "remove_segment",
            Command::SetLoading { .. } => "set_loading",
            Command::GetLoading { .. } => "get_loading",
            Command::PatchConfig { .. } => "patch_config",
            Command::Subscribe { .. } => "subscribe",
            Command::Areas { .. } => "areas",
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Command").field(&self.name()).finish()
    }
}

/// Service task state
pub struct LoadingService {
    manager: LoadingManager,
    commands: mpsc::Receiver<Command>,
    clock: WallClock,
}

impl LoadingService {
    /// Wrap a manager. The manager's timeline starts at the current instant.
    pub fn new(manager: LoadingManager, buffer: usize) -> (Self, LoadingHandle) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let service = LoadingService {
            manager,
            commands: rx,
            clock: WallClock::with_epoch(Instant::now().into_std()),
        };
        (service, LoadingHandle { commands: tx })
    }

    /// Build the configured registry and run it on a new task
    pub fn spawn(config: &ServiceConfig) -> LoadingResult<(LoadingHandle, JoinHandle<()>)> {
        let manager = LoadingManager::from_config(config)?;
        let (service, handle) = Self::new(manager, config.command_buffer);
        let task = tokio::spawn(service.run());
        Ok((handle, task))
    }

    /// Serve commands until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(areas = self.manager.get_areas().len(), "loading service started");

        loop {
            self.sync_clock();
            let deadline = self
                .manager
                .next_deadline()
                .map(|t| Instant::from_std(self.clock.instant_at(t)));

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        self.sync_clock();
                        self.handle(command);
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => {}
            }
        }

        tracing::info!("loading service stopped");
    }

    /// Fire every timer due by wall time
    fn sync_clock(&mut self) {
        let now = self.wall_now();
        let fired = self.manager.advance_to(now);
        if fired > 0 {
            tracing::trace!(fired, ?now, "timers fired");
        }
    }

    fn wall_now(&self) -> Timestamp {
        self.clock.timestamp_at(Instant::now().into_std())
    }

    fn handle(&mut self, command: Command) {
        let kind = command.name();
        tracing::trace!(command = kind, "handling command");

        // A closed reply means the caller gave up; the command still applies.
        let manager = &mut self.manager;
        let delivered = match command {
            Command::CreateArea {
                name,
                config,
                reply,
            } => reply.send(manager.create_area(&name, config)).is_ok(),
            Command::RemoveArea { name, reply } => reply.send(manager.remove_area(&name)).is_ok(),
            Command::AddSegment {
                path,
                name,
                config,
                reply,
            } => reply
                .send(manager.add_segment(&path, &name, config))
                .is_ok(),
            Command::RemoveSegment { path, name, reply } => reply
                .send(manager.remove_segment(&path, &name))
                .is_ok(),
            Command::SetLoading {
                path,
                loading,
                options,
                reply,
            } => reply
                .send(manager.set_loading_state(&path, loading, options))
                .is_ok(),
            Command::GetLoading { path, reply } => {
                reply.send(manager.get_loading_state(&path)).is_ok()
            }
            Command::PatchConfig { path, patch, reply } => {
                reply.send(manager.patch_config(&path, patch)).is_ok()
            }
            Command::Subscribe {
                path,
                callback,
                reply,
            } => reply.send(manager.subscribe(&path, callback)).is_ok(),
            Command::Areas { reply } => reply.send(Ok(manager.get_areas())).is_ok(),
        };

        if !delivered {
            tracing::warn!(command = kind, "caller dropped before the reply");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable client of a [`LoadingService`]
#[derive(Clone, Debug)]
pub struct LoadingHandle {
    commands: mpsc::Sender<Command>,
}

impl LoadingHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> LoadingResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| LoadingError::ServiceStopped)?;
        response.await.map_err(|_| LoadingError::ServiceStopped)?
    }

    pub async fn create_area(
        &self,
        name: &str,
        config: Option<LoadingConfig>,
    ) -> LoadingResult<AreaId> {
        let name = name.to_string();
        self.request(|reply| Command::CreateArea {
            name,
            config,
            reply,
        })
        .await
    }

    pub async fn remove_area(&self, name: &str) -> LoadingResult<()> {
        let name = name.to_string();
        self.request(|reply| Command::RemoveArea { name, reply })
            .await
    }

    pub async fn get_areas(&self) -> LoadingResult<BTreeMap<String, AreaId>> {
        self.request(|reply| Command::Areas { reply }).await
    }

    pub async fn add_segment(
        &self,
        path: &str,
        name: &str,
        config: Option<LoadingConfig>,
    ) -> LoadingResult<AreaId> {
        let (path, name) = (path.to_string(), name.to_string());
        self.request(|reply| Command::AddSegment {
            path,
            name,
            config,
            reply,
        })
        .await
    }

    pub async fn remove_segment(&self, path: &str, name: &str) -> LoadingResult<()> {
        let (path, name) = (path.to_string(), name.to_string());
        self.request(|reply| Command::RemoveSegment { path, name, reply })
            .await
    }

    pub async fn get_loading_state(&self, path: &str) -> LoadingResult<bool> {
        let path = path.to_string();
        self.request(|reply| Command::GetLoading { path, reply })
            .await
    }

    pub async fn set_loading_state(
        &self,
        path: &str,
        loading: bool,
        options: SetLoadingOptions,
    ) -> LoadingResult<()> {
        let path = path.to_string();
        self.request(|reply| Command::SetLoading {
            path,
            loading,
            options,
            reply,
        })
        .await
    }

    pub async fn patch_config(&self, path: &str, patch: ConfigPatch) -> LoadingResult<()> {
        let path = path.to_string();
        self.request(|reply| Command::PatchConfig { path, patch, reply })
            .await
    }

    /// Register a callback. It runs on the service task.
    pub async fn subscribe<F>(&self, path: &str, callback: F) -> LoadingResult<Subscription>
    where
        F: FnMut(bool) + Send + 'static,
    {
        let path = path.to_string();
        let callback: Callback = Box::new(callback);
        self.request(|reply| Command::Subscribe {
            path,
            callback,
            reply,
        })
        .await
    }

    /// Whether the service task is gone
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
