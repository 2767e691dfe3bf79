use log::{debug, warn};

use crate::storage::{ACCESS_TOKEN_KEY, KeyValueStore, REFRESH_TOKEN_KEY};

pub type LogoutHook = Box<dyn Fn()>;

pub struct SessionManager {
    access_token: Option<String>,
    refresh_token: Option<String>,
    store: Box<dyn KeyValueStore>,
    session_store: Option<Box<dyn KeyValueStore>>,
    on_logout: Option<LogoutHook>,
}

impl SessionManager {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let access_token = store.get(ACCESS_TOKEN_KEY).filter(|token| !token.is_empty());
        let refresh_token = store.get(REFRESH_TOKEN_KEY).filter(|token| !token.is_empty());
        Self {
            access_token,
            refresh_token,
            store,
            session_store: None,
            on_logout: None,
        }
    }

    pub fn with_session_store(mut self, session_store: Box<dyn KeyValueStore>) -> Self {
        self.session_store = Some(session_store);
        self
    }

    pub fn with_logout_hook(mut self, hook: LogoutHook) -> Self {
        self.on_logout = Some(hook);
        self
    }

    pub fn login(&mut self, access: &str, refresh: &str) {
        self.access_token = Some(access.to_string());
        self.refresh_token = Some(refresh.to_string());
        self.persist(ACCESS_TOKEN_KEY, Some(access));
        self.persist(REFRESH_TOKEN_KEY, Some(refresh));
        debug!("Session started");
    }

    pub fn set_access_token(&mut self, access: &str) {
        self.access_token = Some(access.to_string());
        self.persist(ACCESS_TOKEN_KEY, Some(access));
    }

    pub fn logout(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.persist(ACCESS_TOKEN_KEY, None);
        self.persist(REFRESH_TOKEN_KEY, None);
        if let Some(session_store) = &self.session_store {
            if let Err(err) = session_store.clear() {
                warn!("Failed to clear session storage: {err}");
            }
        }
        debug!("Session cleared");
        if let Some(hook) = &self.on_logout {
            hook();
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    // Persistence is best-effort; the in-memory pair stays authoritative.
    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        if let Err(err) = result {
            warn!("Failed to persist {key}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, WINDOW_START_KEY};
    use std::cell::Cell;
    use std::io;
    use std::rc::Rc;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), io::Error> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        fn remove(&self, _key: &str) -> Result<(), io::Error> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        fn clear(&self) -> Result<(), io::Error> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn login_persists_both_tokens() {
        let store = Rc::new(MemoryStore::new());
        let mut session = SessionManager::new(Box::new(store.clone()));
        assert!(!session.is_logged_in());

        session.login("access", "refresh");
        assert!(session.is_logged_in());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("access"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).as_deref(), Some("refresh"));
    }

    #[test]
    fn restores_tokens_from_store() {
        let store = MemoryStore::new();
        store.set(ACCESS_TOKEN_KEY, "a").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r").unwrap();
        let session = SessionManager::new(Box::new(store));
        assert_eq!(session.access_token(), Some("a"));
        assert_eq!(session.refresh_token(), Some("r"));
    }

    #[test]
    fn set_access_token_keeps_refresh_token() {
        let store = Rc::new(MemoryStore::new());
        let mut session = SessionManager::new(Box::new(store.clone()));
        session.login("old", "refresh");
        session.set_access_token("new");
        assert_eq!(session.access_token(), Some("new"));
        assert_eq!(session.refresh_token(), Some("refresh"));
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("new"));
    }

    #[test]
    fn logout_clears_everything_and_runs_hook_each_time() {
        let store = Rc::new(MemoryStore::new());
        let session_store = Rc::new(MemoryStore::new());
        session_store.set(WINDOW_START_KEY, "2026-01-01T00:00:00.000Z").unwrap();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut session = SessionManager::new(Box::new(store.clone()))
            .with_session_store(Box::new(session_store.clone()))
            .with_logout_hook(Box::new(move || counter.set(counter.get() + 1)));

        session.login("access", "refresh");
        session.logout();
        assert!(!session.is_logged_in());
        assert_eq!(session.refresh_token(), None);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
        assert_eq!(session_store.get(WINDOW_START_KEY), None);

        session.logout();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn persistence_failure_is_not_fatal() {
        let mut session = SessionManager::new(Box::new(FailingStore));
        session.login("access", "refresh");
        assert!(session.is_logged_in());
        session.logout();
        assert!(!session.is_logged_in());
    }
}
