use std::future::Future;

use tokio::task::JoinHandle;

/// Spawns an actor on the current runtime, tracing when it starts and stops.
pub(crate) fn spawn<Fut>(name: &str, future: Fut) -> JoinHandle<Fut::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    log::trace!("spawn start: {name}");
    #[cfg(debug_assertions)]
    let future = {
        let name = name.to_owned();
        async move {
            let response = future.await;
            log::trace!("spawn finished: {name}");

            response
        }
    };
    tokio::spawn(future)
}
