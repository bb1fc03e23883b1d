use parking_lot::Mutex;

/// Host hook for forced navigation (the login redirect after an unrecoverable 401).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: &str) {
        tracing::debug!(target: "velovis::gateway", "navigation to '{}' requested; host has no router", route);
    }
}

/// Remembers every requested route; hosts poll it, tests assert on it.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self { Self::default() }
    pub fn routes(&self) -> Vec<String> { self.routes.lock().clone() }
    pub fn take(&self) -> Vec<String> { std::mem::take(&mut *self.routes.lock()) }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }
}
