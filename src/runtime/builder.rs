use super::block_on::run;

use core::future::Future;

/// Settings the event loop is started with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Config {
    pub(crate) cancellation: bool,
    pub(crate) wait_for_tasks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cancellation: true,
            wait_for_tasks: true,
        }
    }
}

/// Configure and start an event loop.
///
/// # Examples
///
/// ```
/// use stardos::runtime::Builder;
/// use stardos::task::spawn_abortable_task;
/// use stardos::future::resolve_future;
///
/// let spawned = Builder::new()
///     .cancellation(false)
///     .block_on(async { spawn_abortable_task(resolve_future(1)).is_ok() });
/// assert!(!spawned);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    /// Create a builder with the default settings: cancellation is available
    /// and `block_on` waits for detached tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the host offers a cancellation primitive. Without one,
    /// [`spawn_abortable_task`](crate::task::spawn_abortable_task) reports
    /// [`Error::Unsupported`](crate::Error::Unsupported).
    pub fn cancellation(mut self, enabled: bool) -> Self {
        self.config.cancellation = enabled;
        self
    }

    /// Whether `block_on` keeps running after its root future completes until
    /// every keep-alive token is released. Turning this off makes the loop
    /// return as soon as the root future is done, abandoning detached tasks.
    pub fn wait_for_tasks(mut self, enabled: bool) -> Self {
        self.config.wait_for_tasks = enabled;
        self
    }

    /// Start the event loop and run `fut` to completion.
    pub fn block_on<Fut>(self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        run(self.config, fut)
    }
}
