/// Boxed, sendable future returned by the collaborator traits, since they have to stay object
/// safe.
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;
