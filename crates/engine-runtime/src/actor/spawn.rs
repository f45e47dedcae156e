use crate::actor::actor::{Actor, ActorContext, ActorRef};
use std::fmt::Debug;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawns a Tokio task that runs the actor event loop and returns an `ActorRef` and `JoinHandle`.
///
/// The loop ends once every `ActorRef` has been dropped.
pub fn spawn_actor<M, A>(name: impl Into<String>, mut actor: A) -> (ActorRef<M>, JoinHandle<()>)
where
    A: Actor<M>,
    M: Send + Debug + 'static,
{
    let name_str = name.into();
    let ctx = ActorContext::new(name_str.clone());
    let (actor_ref, mut rx) = ActorRef::channel(name_str);

    let handle = tokio::spawn(async move {
        if let Err(e) = actor.on_start(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_start failed");
            return;
        }

        while let Some(msg) = rx.recv().await {
            if let Err(e) = actor.handle(msg, &ctx).await {
                error!(actor = %ctx.name(), ?e, "actor handle failed");
            }
        }

        if let Err(e) = actor.on_stop(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_stop failed");
        }
    });

    (actor_ref, handle)
}
