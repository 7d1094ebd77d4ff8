/// Capability required of every value stored in a pool.
///
/// `on_get` runs exactly once each time the value is checked out and
/// `on_release` exactly once each time it is returned, before the value is
/// visible to the next caller.
pub trait Poolable: Send + 'static {
    /// Prepare the value for a new borrower.
    fn on_get(&mut self);

    /// Reset the value before it goes back into circulation.
    fn on_release(&mut self);
}
