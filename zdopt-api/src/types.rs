use crate::actor::Actor;
use crate::errors::ActorError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// Type aliases for common types
pub type BoxedActor = Arc<dyn Actor>;
pub type ActorResult<T> = Result<T, ActorError>;
pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
