use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::{ServerConfig, Settings};

/// Application state shared between connections
pub struct AppState {
    pub config: ServerConfig,
    pub settings: Settings,
    /// Ids of the open websocket sessions.
    pub sessions: Mutex<HashSet<String>>,
}

impl AppState {
    pub fn new(config: ServerConfig, settings: Settings) -> Self {
        Self {
            config,
            settings,
            sessions: Mutex::new(HashSet::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_count_tracks_ids() {
        let state = AppState::new(ServerConfig::default(), Settings::default());
        assert_eq!(state.session_count(), 0);

        state.sessions.lock().unwrap().insert("a".to_string());
        state.sessions.lock().unwrap().insert("b".to_string());
        assert_eq!(state.session_count(), 2);

        state.sessions.lock().unwrap().remove("a");
        assert_eq!(state.session_count(), 1);
    }
}
