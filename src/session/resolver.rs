use std::sync::{Arc, Mutex, Weak};

use dashmap::DashSet;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{BusPayload, EventBus, Subscription, Topic};
use crate::config::{game_path, session_path, GAME_SESSION_TYPE, PARTICIPANTS_FIELD};
use crate::session::code::normalize_code;
use crate::session::identity::{Clock, Identity};
use crate::store::{Document, DocumentStore};
use crate::types::{SessionDocument, SessionEvent, SessionSelection};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a resolution stopped short. None of these reach the user; they are logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("malformed session code '{raw}'")]
    MalformedCode { raw: String },

    #[error("no session document for code {code}")]
    DocumentNotFound { code: String },

    #[error("fetching session {code} failed: {detail}")]
    DocumentFetchFailed { code: String, detail: String },

    #[error("session {code} expired at {expires_at} (now {now})")]
    SessionExpired { code: String, expires_at: i64, now: i64 },

    #[error("session {code} has unsupported type {session_type:?}")]
    UnsupportedSessionType { code: String, session_type: Option<String> },

    #[error("session {code} is missing {missing}")]
    IncompleteSession { code: String, missing: &'static str },

    #[error("no signed-in user to join session {code}")]
    MissingIdentity { code: String },

    #[error("joining game {game_id} for session {code} failed: {detail}")]
    JoinWriteFailed { code: String, game_id: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Our own output (or anyone's) coming back around.
    AlreadyResolved,
    /// A typed selection from another producer.
    TypedSelection,
    /// The chooser fired without a code.
    NoCode,
    /// The same code is already being resolved.
    AlreadyInFlight,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IgnoreReason::AlreadyResolved => "already_resolved",
            IgnoreReason::TypedSelection => "typed_selection",
            IgnoreReason::NoCode => "no_code",
            IgnoreReason::AlreadyInFlight => "already_in_flight",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Joined(SessionSelection),
    Ignored(IgnoreReason),
    Failed(ResolveError),
    /// The resolver was torn down while a fetch or write was in flight.
    Abandoned,
}

/// One finished attempt, as handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub code: Option<String>,
    pub outcome: ResolveOutcome,
}

/// Where an attempt currently is. Every early exit goes straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Validating,
    Joining,
    Republishing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Validating => "validating",
            Phase::Joining => "joining",
            Phase::Republishing => "republishing",
        };
        write!(f, "{s}")
    }
}

enum Halt {
    Failed(ResolveError),
    Abandoned,
}

impl From<ResolveError> for Halt {
    fn from(e: ResolveError) -> Self {
        Halt::Failed(e)
    }
}

fn enter(code: &str, phase: Phase) {
    debug!(code = %code, phase = %phase, "session resolver phase");
}

// ---------------------------------------------------------------------------
// SessionResolver
// ---------------------------------------------------------------------------

/// Turns a typed 6-digit code into a participant join on the owner's game and
/// republishes the result as a resolved `gameOrSessionChosen` event.
///
/// Continuations only hold a `Weak` to the resolver: once it is dropped, any fetch
/// or write still in flight finishes without further effect.
pub struct SessionResolver {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn Identity>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    /// Codes with an attempt in progress.
    in_flight: DashSet<String>,
    /// The single live bus subscription, if observing.
    subscription: Mutex<Option<Subscription>>,
}

impl SessionResolver {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn Identity>,
        clock: Arc<dyn Clock>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            identity,
            clock,
            bus,
            in_flight: DashSet::new(),
            subscription: Mutex::new(None),
        })
    }

    /// Starts consuming `gameOrSessionChosen`. Any previous subscription is closed first,
    /// so each bus event is handled once. Finished attempts go to `outcomes`.
    pub fn observe(self: &Arc<Self>, outcomes: mpsc::Sender<Resolution>) {
        self.stop_observing();

        let weak = Arc::downgrade(self);
        let subscription = self.bus.subscribe(Topic::GameOrSessionChosen, move |payload| {
            let BusPayload::Session(event) = payload else {
                return;
            };
            let weak = weak.clone();
            let outcomes = outcomes.clone();
            tokio::spawn(async move {
                let code = match &event {
                    SessionEvent::RawCodeRequest { code } => code.clone(),
                    _ => None,
                };
                let outcome = Self::run(weak, event).await;
                if let Err(e) = outcomes.try_send(Resolution { code, outcome }) {
                    warn!("resolution channel full, dropping outcome: {e}");
                }
            });
        });

        let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(subscription);
    }

    pub fn stop_observing(&self) {
        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(previous) = previous {
            previous.close();
        }
    }

    pub fn is_observing(&self) -> bool {
        self.subscription
            .lock()
            .map(|s| s.as_ref().is_some_and(|s| !s.is_closed()))
            .unwrap_or(false)
    }

    /// Runs one attempt for `event` to completion.
    #[cfg(test)]
    pub async fn resolve(self: &Arc<Self>, event: SessionEvent) -> ResolveOutcome {
        Self::run(Arc::downgrade(self), event).await
    }

    async fn run(weak: Weak<Self>, event: SessionEvent) -> ResolveOutcome {
        let raw = match event {
            SessionEvent::Resolved(_) => return ResolveOutcome::Ignored(IgnoreReason::AlreadyResolved),
            SessionEvent::Selected(_) => return ResolveOutcome::Ignored(IgnoreReason::TypedSelection),
            SessionEvent::RawCodeRequest { code: None } => {
                return ResolveOutcome::Ignored(IgnoreReason::NoCode)
            }
            SessionEvent::RawCodeRequest { code: Some(raw) } => raw,
        };
        let Some(code) = normalize_code(&raw) else {
            return ResolveOutcome::Failed(ResolveError::MalformedCode { raw });
        };

        let Some(_claim) = InFlightClaim::acquire(&weak, &code) else {
            return match weak.upgrade() {
                Some(_) => ResolveOutcome::Ignored(IgnoreReason::AlreadyInFlight),
                None => ResolveOutcome::Abandoned,
            };
        };

        let outcome = match Self::attempt(&weak, &code).await {
            Ok(selection) => ResolveOutcome::Joined(selection),
            Err(Halt::Failed(e)) => ResolveOutcome::Failed(e),
            Err(Halt::Abandoned) => ResolveOutcome::Abandoned,
        };
        enter(&code, Phase::Idle);
        outcome
    }

    async fn attempt(weak: &Weak<Self>, code: &str) -> Result<SessionSelection, Halt> {
        // Fetching
        let store = {
            let this = weak.upgrade().ok_or(Halt::Abandoned)?;
            Arc::clone(&this.store)
        };
        enter(code, Phase::Fetching);
        let fetched = store.get(&session_path(code)).await;
        let this = weak.upgrade().ok_or(Halt::Abandoned)?;

        // Validating
        enter(code, Phase::Validating);
        let document = match fetched {
            Ok(Some(document)) => document,
            Ok(None) => return Err(ResolveError::DocumentNotFound { code: code.to_string() }.into()),
            Err(e) => {
                return Err(ResolveError::DocumentFetchFailed {
                    code: code.to_string(),
                    detail: e.to_string(),
                }
                .into())
            }
        };
        let session: SessionDocument = serde_json::from_value(Value::Object(document)).map_err(|e| {
            ResolveError::DocumentFetchFailed {
                code: code.to_string(),
                detail: format!("unreadable session document: {e}"),
            }
        })?;
        let target = this.validate(code, session)?;

        // Joining
        enter(code, Phase::Joining);
        let path = game_path(&target.selection.owner_user_id, &target.selection.game_id);
        let patch = participant_patch(&target.user_id);
        let store = Arc::clone(&this.store);
        drop(this);
        let written = store.merge(&path, &patch).await;
        let this = weak.upgrade().ok_or(Halt::Abandoned)?;
        written.map_err(|e| ResolveError::JoinWriteFailed {
            code: code.to_string(),
            game_id: target.selection.game_id.clone(),
            detail: e.to_string(),
        })?;

        // Republishing
        enter(code, Phase::Republishing);
        let delivered = this.bus.publish(
            Topic::GameOrSessionChosen,
            BusPayload::Session(SessionEvent::Resolved(target.selection.clone())),
        );
        info!(
            code = %code,
            game_id = %target.selection.game_id,
            owner_user_id = %target.selection.owner_user_id,
            user_id = %target.user_id,
            subscribers = delivered,
            "SESSION JOINED | code: {code} | game: {} | subscribers: {delivered}",
            target.selection.game_id,
        );
        Ok(target.selection)
    }

    fn validate(&self, code: &str, session: SessionDocument) -> Result<JoinTarget, ResolveError> {
        let now = self.clock.now_ms();
        if let Some(expires_at) = session.expires_at {
            if expires_at < now {
                return Err(ResolveError::SessionExpired { code: code.to_string(), expires_at, now });
            }
        }

        match session.session_type.as_deref() {
            Some(GAME_SESSION_TYPE) => {}
            other => {
                return Err(ResolveError::UnsupportedSessionType {
                    code: code.to_string(),
                    session_type: other.map(str::to_string),
                })
            }
        }

        let owner_user_id = session.owner_user_id.ok_or(ResolveError::IncompleteSession {
            code: code.to_string(),
            missing: "ownerUserId",
        })?;
        let game_id = session.game_id.ok_or(ResolveError::IncompleteSession {
            code: code.to_string(),
            missing: "gameId",
        })?;
        let user_id = self
            .identity
            .current_user_id()
            .ok_or(ResolveError::MissingIdentity { code: code.to_string() })?;

        Ok(JoinTarget {
            user_id,
            selection: SessionSelection {
                session_type: GAME_SESSION_TYPE.to_string(),
                game_id,
                owner_user_id,
                opponent: session.opponent,
            },
        })
    }
}

impl Drop for SessionResolver {
    fn drop(&mut self) {
        if let Ok(slot) = self.subscription.get_mut() {
            if let Some(subscription) = slot.take() {
                subscription.close();
            }
        }
    }
}

struct JoinTarget {
    user_id: String,
    selection: SessionSelection,
}

/// `{"participants.<uid>": true}`
fn participant_patch(user_id: &str) -> Document {
    let mut patch = Map::new();
    patch.insert(format!("{PARTICIPANTS_FIELD}.{user_id}"), Value::Bool(true));
    patch
}

/// Marks a code as in flight; released on drop.
struct InFlightClaim {
    resolver: Weak<SessionResolver>,
    code: String,
}

impl InFlightClaim {
    fn acquire(resolver: &Weak<SessionResolver>, code: &str) -> Option<Self> {
        let this = resolver.upgrade()?;
        if !this.in_flight.insert(code.to_string()) {
            return None;
        }
        Some(Self { resolver: resolver.clone(), code: code.to_string() })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        if let Some(this) = self.resolver.upgrade() {
            this.in_flight.remove(&self.code);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
