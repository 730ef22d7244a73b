//! Live-reload signalling from tasks.

/// Receives live-reload signals emitted by tasks.
///
/// Paths are URL paths relative to the build root, e.g. `css/style.min.css`.
pub trait ReloadSink: Send + Sync {
    /// Ask connected clients to reload the page.
    fn reload(&self);

    /// Ask connected clients to refresh the given stylesheets in place.
    fn inject(&self, paths: &[String]);
}

/// Drops every signal; used for one-shot builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReload;

impl ReloadSink for NoReload {
    fn reload(&self) {}

    fn inject(&self, _paths: &[String]) {}
}
