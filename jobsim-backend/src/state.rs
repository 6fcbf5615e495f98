use jobsim_engine::JobService;

/// Shared application state passed to every route handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub jobs: JobService,
    /// Base URL of the callback relay; `None` disables callbacks.
    relay_url: Option<String>,
}

impl AppState {
    pub fn new(jobs: JobService, relay_url: Option<String>) -> Self {
        let relay_url = relay_url.map(|url| url.trim_end_matches('/').to_string());
        Self { jobs, relay_url }
    }

    /// Where the engine should post terminal updates for `client_id`.
    pub fn callback_target_for(&self, client_id: &str) -> Option<String> {
        self.relay_url
            .as_ref()
            .map(|base| format!("{base}/callback/{client_id}"))
    }
}
