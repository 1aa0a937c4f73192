use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Who is signed in on this device.
pub trait Identity: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Identity set from configuration, with explicit sign in / sign out.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id: RwLock::new(user_id) }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        if let Ok(mut guard) = self.user_id.write() {
            *guard = Some(user_id.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.user_id.write() {
            *guard = None;
        }
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().ok().and_then(|g| g.clone())
    }
}

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}
