// tunebot-core/src/tasks/expiry.rs

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Spawns a fire-and-forget timer that runs `on_expire` once after `delay`.
///
/// The returned handle may be aborted to cancel the timer; nothing else needs
/// to hold on to it. `on_expire` must tolerate its target already being gone.
pub fn spawn_expiry<F>(delay: Duration, on_expire: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        sleep(delay).await;
        on_expire();
    })
}
