use log::{ debug, info };
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::prompt::PromptConfig;
use crate::error::{ AnalysisError, ErrorKind, ExchangeError, SessionError };
use crate::history::{ ConversationState, PendingExchange };
use crate::models::analysis::RoomAnalysis;
use crate::models::chat::ChatMessage;
use crate::models::dashboard::Dashboard;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Analyzing,
    Dashboard,
}

/// A dismissible error shown above the upload zone.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorBanner {
    pub kind: ErrorKind,
    pub message: String,
}

/// Issued when an analysis starts. Completing with a ticket from before a reset is a no-op.
#[derive(Debug)]
pub struct AnalysisTicket {
    epoch: u64,
    pub image: String,
}

#[derive(Debug)]
pub struct ChatTicket {
    epoch: u64,
    pub pending: PendingExchange,
}

/// Everything one user's session owns: the selected image, its analysis, and the chat
/// grounded in it. Nothing here is shared with other sessions.
#[derive(Debug)]
pub struct RoomSession {
    id: Uuid,
    epoch: u64,
    stage: Stage,
    image: Option<String>,
    analysis: Option<RoomAnalysis>,
    chat: Option<ConversationState>,
    error: Option<ErrorBanner>,
    last_touched: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub stage: Stage,
    pub error: Option<ErrorBanner>,
    pub has_image: bool,
    pub analysis: Option<RoomAnalysis>,
    pub dashboard: Option<Dashboard>,
    pub transcript: Vec<ChatMessage>,
    pub chat_busy: bool,
}

impl RoomSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch: 0,
            stage: Stage::Upload,
            image: None,
            analysis: None,
            chat: None,
            error: None,
            last_touched: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn chat(&self) -> Option<&ConversationState> {
        self.chat.as_ref()
    }

    /// True while an analysis or a chat exchange is outstanding.
    pub fn is_busy(&self) -> bool {
        self.stage == Stage::Analyzing || self.chat.as_ref().is_some_and(|c| c.is_busy())
    }

    fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        !self.is_busy() && now.saturating_duration_since(self.last_touched) > ttl
    }

    /// Selects a new image. Any previous analysis and chat are discarded.
    pub fn begin_analysis(&mut self, image: String) -> Result<AnalysisTicket, SessionError> {
        if self.stage == Stage::Analyzing {
            return Err(SessionError::Busy);
        }
        self.discard();
        self.image = Some(image.clone());
        self.stage = Stage::Analyzing;
        Ok(AnalysisTicket { epoch: self.epoch, image })
    }

    /// Returns false when the ticket is stale and the result was dropped.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        result: Result<RoomAnalysis, AnalysisError>,
        prompts: &PromptConfig
    ) -> bool {
        if ticket.epoch != self.epoch {
            debug!("Session {}: dropping analysis result from a previous epoch", self.id);
            return false;
        }
        match result {
            Ok(analysis) => {
                self.chat = Some(ConversationState::seeded(&ticket.image, prompts));
                self.analysis = Some(analysis);
                self.stage = Stage::Dashboard;
                info!("Session {}: analysis ready", self.id);
            }
            Err(e) => {
                let kind = e.kind();
                self.image = None;
                self.stage = Stage::Upload;
                self.error = Some(ErrorBanner {
                    kind,
                    message: prompts.error_message(kind).to_string(),
                });
                info!("Session {}: analysis failed ({:?}), back to upload", self.id, kind);
            }
        }
        true
    }

    pub fn begin_chat(&mut self, text: &str) -> Result<ChatTicket, SessionError> {
        let chat = match (self.stage, self.chat.as_mut()) {
            (Stage::Dashboard, Some(chat)) => chat,
            _ => {
                return Err(SessionError::WrongStage("dashboard"));
            }
        };
        let pending = chat.begin_exchange(text)?;
        Ok(ChatTicket { epoch: self.epoch, pending })
    }

    /// Returns the rendered model entry, or `None` when the session was reset meanwhile.
    pub fn complete_chat(
        &mut self,
        ticket: ChatTicket,
        outcome: Result<String, ExchangeError>
    ) -> Option<ChatMessage> {
        if ticket.epoch != self.epoch {
            debug!("Session {}: dropping chat reply from a previous epoch", self.id);
            return None;
        }
        let chat = self.chat.as_mut()?;
        Some(chat.complete_exchange(ticket.pending, outcome).clone())
    }

    /// Back to the upload stage with nothing selected. In-flight requests are abandoned.
    pub fn reset(&mut self) {
        self.discard();
        self.stage = Stage::Upload;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    fn discard(&mut self) {
        self.epoch += 1;
        self.image = None;
        self.analysis = None;
        self.chat = None;
        self.error = None;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            stage: self.stage,
            error: self.error.clone(),
            has_image: self.image.is_some(),
            analysis: self.analysis.clone(),
            dashboard: self.analysis.as_ref().map(Dashboard::from_analysis),
            transcript: self.chat
                .as_ref()
                .map(|c| c.transcript().to_vec())
                .unwrap_or_default(),
            chat_busy: self.chat.as_ref().map(|c| c.is_busy()).unwrap_or(false),
        }
    }
}

impl Default for RoomSession {
    fn default() -> Self {
        Self::new()
    }
}

/// All live sessions. The lock is only held for synchronous state transitions, never
/// across a model request. Sessions untouched for longer than `idle_ttl` are evicted,
/// unless a request is still outstanding on them.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, RoomSession>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub async fn create(&self) -> SessionView {
        let session = RoomSession::new();
        let view = session.view();
        let mut sessions = self.sessions.lock().await;
        Self::evict(&mut sessions, Instant::now(), self.idle_ttl);
        sessions.insert(session.id(), session);
        info!("Session {} created", view.id);
        view
    }

    pub async fn view(&self, id: Uuid) -> Option<SessionView> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(&id).map(|s| {
            s.touch();
            s.view()
        })
    }

    /// Runs `f` on the session under the lock. `None` when the session does not exist.
    pub async fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut RoomSession) -> T) -> Option<T> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(&id).map(|s| {
            s.touch();
            f(s)
        })
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(&id).is_some();
        if removed {
            info!("Session {} removed", id);
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Drops every session idle for longer than the TTL as of `now`. Returns how many went.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        Self::evict(&mut sessions, now, self.idle_ttl)
    }

    fn evict(sessions: &mut HashMap<Uuid, RoomSession>, now: Instant, ttl: Duration) -> usize {
        let before = sessions.len();
        sessions.retain(|id, session| {
            let idle = session.is_idle(now, ttl);
            if idle {
                debug!("Session {} expired", id);
            }
            !idle
        });
        before - sessions.len()
    }

    /// Evicts idle sessions every `every` until the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(Instant::now()).await;
                if evicted > 0 {
                    info!("Evicted {} idle sessions, {} live", evicted, store.count().await);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{ ActionItem, Category, Difficulty };

    fn analysis() -> RoomAnalysis {
        RoomAnalysis {
            room_type: "Кабинет".into(),
            clutter_level: 85,
            summary: "Бумаги повсюду.".into(),
            space_utilization: vec![],
            action_items: vec![ActionItem {
                id: "1".into(),
                title: "Разобрать бумаги".into(),
                description: "Выбросить старые счета".into(),
                difficulty: Difficulty::Medium,
                category: Category::Discard,
            }],
            aesthetic_suggestions: vec![],
        }
    }

    fn ready_session(prompts: &PromptConfig) -> RoomSession {
        let mut session = RoomSession::new();
        let ticket = session.begin_analysis("QUJD".into()).unwrap();
        assert!(session.complete_analysis(ticket, Ok(analysis()), prompts));
        session
    }

    #[test]
    fn successful_analysis_opens_dashboard_and_seeds_chat() {
        let prompts = PromptConfig::default();
        let session = ready_session(&prompts);
        assert_eq!(session.stage(), Stage::Dashboard);
        assert_eq!(session.chat().unwrap().history().len(), 2);

        let view = session.view();
        assert!(view.has_image);
        assert!(view.transcript.is_empty());
        assert_eq!(view.dashboard.unwrap().panels.len(), 1);
    }

    #[test]
    fn failed_analysis_clears_image_and_shows_banner() {
        let prompts = PromptConfig::default();
        let mut session = RoomSession::new();
        let ticket = session.begin_analysis("QUJD".into()).unwrap();
        assert_eq!(session.begin_analysis("REVG".into()).unwrap_err(), SessionError::Busy);

        session.complete_analysis(ticket, Err(AnalysisError::RateLimit("429".into())), &prompts);
        let view = session.view();
        assert_eq!(view.stage, Stage::Upload);
        assert!(!view.has_image);
        let banner = view.error.unwrap();
        assert_eq!(banner.kind, ErrorKind::RateLimit);
        assert_eq!(banner.message, prompts.errors.rate_limit);

        session.dismiss_error();
        assert!(session.view().error.is_none());
    }

    #[test]
    fn chat_requires_dashboard() {
        let mut session = RoomSession::new();
        assert_eq!(session.begin_chat("привет").unwrap_err(), SessionError::WrongStage("dashboard"));
    }

    #[test]
    fn reset_drops_late_results() {
        let prompts = PromptConfig::default();
        let mut session = ready_session(&prompts);
        let ticket = session.begin_chat("вопрос").unwrap();
        session.reset();
        assert!(session.complete_chat(ticket, Ok("ответ".into())).is_none());
        assert_eq!(session.stage(), Stage::Upload);
        assert!(session.chat().is_none());

        let ticket = session.begin_analysis("QUJD".into()).unwrap();
        session.reset();
        assert!(!session.complete_analysis(ticket, Ok(analysis()), &prompts));
        assert!(session.view().analysis.is_none());
    }

    #[test]
    fn new_upload_replaces_previous_chat() {
        let prompts = PromptConfig::default();
        let mut session = ready_session(&prompts);
        let ticket = session.begin_chat("вопрос").unwrap();
        session.complete_chat(ticket, Ok("ответ".into())).unwrap();
        assert_eq!(session.chat().unwrap().history().len(), 4);

        let ticket = session.begin_analysis("REVG".into()).unwrap();
        assert!(session.chat().is_none());
        session.complete_analysis(ticket, Ok(analysis()), &prompts);
        assert_eq!(session.chat().unwrap().history().len(), 2);
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn store_keeps_sessions_apart() {
        let store = SessionStore::new(TTL);
        let a = store.create().await;
        let b = store.create().await;
        assert_ne!(a.id, b.id);

        let prompts = PromptConfig::default();
        store.update(a.id, |s| {
            let ticket = s.begin_analysis("QUJD".into()).unwrap();
            s.complete_analysis(ticket, Ok(analysis()), &prompts)
        }).await.unwrap();

        assert_eq!(store.view(a.id).await.unwrap().stage, Stage::Dashboard);
        assert_eq!(store.view(b.id).await.unwrap().stage, Stage::Upload);
        assert!(store.remove(b.id).await);
        assert!(store.view(b.id).await.is_none());
        assert!(store.update(b.id, |s| s.reset()).await.is_none());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = SessionStore::new(TTL);
        let stale = store.create().await;
        let fresh = store.create().await;

        assert_eq!(store.evict_idle(Instant::now()).await, 0);
        assert_eq!(store.count().await, 2);

        let later = Instant::now() + TTL + Duration::from_secs(1);
        assert_eq!(store.evict_idle(later).await, 2);
        assert!(store.view(stale.id).await.is_none());
        assert!(store.view(fresh.id).await.is_none());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn busy_session_outlives_the_ttl() {
        let store = SessionStore::new(TTL);
        let busy = store.create().await;
        let idle = store.create().await;
        store.update(busy.id, |s| s.begin_analysis("QUJD".into()).map(|_| ())).await.unwrap().unwrap();

        let later = Instant::now() + TTL + Duration::from_secs(1);
        assert_eq!(store.evict_idle(later).await, 1);
        assert_eq!(store.view(busy.id).await.unwrap().stage, Stage::Analyzing);
        assert!(store.view(idle.id).await.is_none());
    }

    #[test]
    fn idle_clock_runs_from_last_access() {
        let mut session = RoomSession::new();
        let created = session.last_touched;
        let later = created + TTL + Duration::from_secs(1);
        assert!(session.is_idle(later, TTL));

        session.last_touched = created + Duration::from_secs(30);
        assert!(!session.is_idle(later, TTL));

        session.touch();
        assert!(session.last_touched >= created);
    }
}
