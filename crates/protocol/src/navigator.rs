use permitwalk_core::{Config, Error, Record, Result, TabAvailability, TabKind};
use permitwalk_extract::{AvailabilityDecoder, DetailParser, TableExtractor};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ids::{IdGenerator, RandomIdGenerator};
use crate::request::{Action, FormId, RequestBuilder};
use crate::session::{Session, SessionManager};
use crate::transport::{HttpTransport, Response, Transport};

/// Where a single permit's walk through the wizard stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Start,
    LoggedIn,
    Detail,
    Tab(TabKind),
    Done,
    NotFound,
    Failed,
}

impl WalkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WalkState::Done | WalkState::NotFound | WalkState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    Found(Record),
    NotFound,
}

/// Warm-up sequence between session registration and the permit search.
/// Each entry is the action and how far it moves the server's track id.
const WARM_UP: [(Action, u64); 5] = [
    (Action::RegisterSession, 1),
    (Action::SetTimer, 0),
    (Action::ClickPermitButton, 1),
    (Action::SetTrackId, 1),
    (Action::SetTimer, 1),
];

/// Mutable state of one walk. Dropped with the walk, never shared.
struct Walk {
    permit: String,
    session: Option<Session>,
    record: Record,
    availability: TabAvailability,
    last_tab: Option<TabKind>,
    /// States entered so far, in order.
    trail: Vec<WalkState>,
}

impl Walk {
    fn new(permit: &str) -> Self {
        Self {
            permit: permit.to_string(),
            session: None,
            record: Record::new(permit),
            availability: TabAvailability::unknown(),
            last_tab: None,
            trail: Vec::new(),
        }
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::SessionProtocol("walk has no open session".to_string()))
    }
}

/// Drives the wizard for one permit at a time: search, detail view, then
/// every tab whose badge says it has rows.
///
/// The navigator itself is immutable; each `walk` opens its own session, so
/// one navigator can serve many concurrent walks.
pub struct TabNavigator {
    transport: Arc<dyn Transport>,
    ids: Arc<dyn IdGenerator>,
    builder: RequestBuilder,
    detail: DetailParser,
    not_found_markers: Vec<String>,
}

impl TabNavigator {
    pub fn new(config: &Config, transport: Arc<dyn Transport>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            transport,
            ids,
            builder: RequestBuilder::from_config(config),
            detail: DetailParser::default(),
            not_found_markers: config
                .site
                .not_found_markers
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Navigator over HTTP with random correlation ids.
    pub fn http(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let ids = Arc::new(RandomIdGenerator::from_config(&config.site));
        Ok(Self::new(config, transport, ids))
    }

    pub async fn walk(&self, permit: &str) -> Result<WalkOutcome> {
        let mut walk = Walk::new(permit);
        self.run(&mut walk).await
    }

    async fn run(&self, walk: &mut Walk) -> Result<WalkOutcome> {
        let mut state = WalkState::Start;

        loop {
            let (next, failure) = match self.step(walk, state).await {
                Ok(next) => (next, None),
                Err(e) => (WalkState::Failed, Some(e)),
            };
            debug!(permit = %walk.permit, from = ?state, to = ?next, "Walk transition");
            walk.trail.push(next);

            match next {
                WalkState::Done => {
                    info!(permit = %walk.permit, "Permit extracted");
                    return Ok(WalkOutcome::Found(std::mem::take(&mut walk.record)));
                }
                WalkState::NotFound => {
                    info!(permit = %walk.permit, "Permit does not exist");
                    return Ok(WalkOutcome::NotFound);
                }
                WalkState::Failed => {
                    let error = failure.unwrap_or_else(|| {
                        Error::Other(format!("walk failed in state {:?}", state))
                    });
                    warn!(
                        permit = %walk.permit,
                        state = ?state,
                        trail = ?walk.trail,
                        error = %error,
                        "Walk failed, discarding partial record"
                    );
                    walk.record = Record::new(walk.permit.as_str());
                    return Err(error);
                }
                other => state = other,
            }
        }
    }

    /// One transition of the state machine.
    async fn step(&self, walk: &mut Walk, state: WalkState) -> Result<WalkState> {
        match state {
            WalkState::Start => self.search(walk).await,
            WalkState::LoggedIn => self.open_detail(walk).await,
            WalkState::Detail => Ok(self.next_tab(walk)),
            WalkState::Tab(kind) => self.visit_tab(walk, kind).await,
            terminal => Ok(terminal),
        }
    }

    async fn search(&self, walk: &mut Walk) -> Result<WalkState> {
        let landing = self.transport.send(&RequestBuilder::bootstrap()).await?;
        let mut session = SessionManager::open(&landing)?;
        SessionManager::refresh_ajax_id(&mut session, self.ids.as_ref());

        for (action, steps) in WARM_UP.iter() {
            self.send(action, &session).await?;
            let next = action.resulting_form(session.current_form());
            SessionManager::advance_by(&mut session, *steps, next);
        }

        SessionManager::refresh_ajax_id(&mut session, self.ids.as_ref());
        let submit = Action::SubmitRecord(walk.permit.clone());
        let response = self.send(&submit, &session).await?;
        if self.is_not_found(&response) {
            return Ok(WalkState::NotFound);
        }
        let next = submit.resulting_form(session.current_form());
        SessionManager::advance(&mut session, &response, next)?;

        walk.session = Some(session);
        Ok(WalkState::LoggedIn)
    }

    async fn open_detail(&self, walk: &mut Walk) -> Result<WalkState> {
        let open = Action::OpenDetail(walk.permit.clone());
        let view = self.transition(walk.session()?, &open).await?;

        walk.record.detail = self.detail.parse(&view.body);
        walk.availability = AvailabilityDecoder::decode(&view.body);
        debug!(permit = %walk.permit, availability = ?walk.availability, "Detail parsed");
        Ok(WalkState::Detail)
    }

    fn next_tab(&self, walk: &Walk) -> WalkState {
        let candidates: Vec<TabKind> = match walk.last_tab {
            None => TabKind::VISIT_ORDER.to_vec(),
            Some(last) => last.following().collect(),
        };

        for kind in candidates {
            if walk.availability.is_available(kind) {
                return WalkState::Tab(kind);
            }
            debug!(permit = %walk.permit, tab = %kind, "Tab unavailable, skipping");
        }
        WalkState::Done
    }

    async fn visit_tab(&self, walk: &mut Walk, kind: TabKind) -> Result<WalkState> {
        let session = walk.session()?;
        let view = self.transition(session, &Action::OpenTab(kind)).await?;
        let rows = TableExtractor::extract(&view.body);

        let back = Action::GoBack(kind);
        let response = self.send(&back, session).await?;
        let next = back.resulting_form(session.current_form());
        SessionManager::advance(session, &response, next)?;

        debug!(permit = %walk.permit, tab = %kind, rows = rows.len(), "Tab extracted");
        *walk.record.rows_mut(kind) = rows;
        walk.last_tab = Some(kind);
        Ok(WalkState::Detail)
    }

    /// Fire a callback that switches views, then load the new view.
    async fn transition(&self, session: &mut Session, action: &Action) -> Result<Response> {
        let response = self.send(action, session).await?;
        let next: FormId = action.resulting_form(session.current_form());
        SessionManager::advance(session, &response, next)?;

        let view = self.send(&Action::FetchView, session).await?;
        SessionManager::keep(session, next);
        Ok(view)
    }

    async fn send(&self, action: &Action, session: &Session) -> Result<Response> {
        let request = self.builder.build(action, session)?;
        debug!(
            session_id = %session.session_id(),
            action = action.name(),
            track_id = session.track_id(),
            form = %session.current_form(),
            "Sending"
        );
        self.transport.send(&request).await
    }

    fn is_not_found(&self, response: &Response) -> bool {
        self.not_found_markers
            .iter()
            .any(|m| response.contains_ignore_case(m))
    }
}
