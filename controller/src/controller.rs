use std::future::Future;
use std::sync::Arc;

use populator::kube::runtime::watcher;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::claim::ClaimReconciler;
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::ControllerResult;
use crate::event::{ClaimReflector, watch_claims};
use crate::key::QueueKey;
use crate::queue::WorkQueue;
use crate::worker::Worker;

/// Runs the claim watch and the worker pool until `shutdown` resolves, then
/// drains them in order: watch first, then queue, then workers.
pub async fn run(ctx: Arc<Context>, shutdown: impl Future<Output = ()>) -> ControllerResult<()> {
    let token = CancellationToken::new();
    let queue = WorkQueue::<QueueKey>::new();
    let (reflector, store) = ClaimReflector::new();

    tracing::info!("Watching claims in {} namespace...", ctx.scope());
    let watch = tokio::spawn(watch_claims(
        ctx.claims(),
        watcher::Config::default(),
        reflector,
        queue.clone(),
        token.clone(),
    ));

    tokio::pin!(shutdown);
    let synced = tokio::select! {
        _ = &mut shutdown => false,
        res = store.wait_synced() => {
            res?;
            true
        }
    };

    let mut workers = JoinSet::new();
    if synced {
        tracing::info!(claims = store.state().len(), "Claim cache synced");
        let reconciler = Arc::new(
            ClaimReconciler::new(
                ctx.client.clone(),
                ctx.client.clone(),
                Dispatcher::new(&ctx.config.git_image),
            )
            .missing_source(ctx.config.missing_source),
        );
        for id in 0..ctx.config.workers.max(1) {
            let worker = Arc::new(Worker::new(
                queue.clone(),
                store.clone(),
                reconciler.clone(),
                ctx.config.max_attempts,
            ));
            workers.spawn(worker.run(id));
        }
        shutdown.await;
    }

    tracing::info!("Shutting down claim controller...");
    token.cancel();
    watch.await?;
    queue.shut_down().await;
    while let Some(res) = workers.join_next().await {
        res?;
    }
    tracing::info!("Claim controller stopped");
    Ok(())
}
