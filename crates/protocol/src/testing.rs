//! In-process stand-in for the permit wizard, for tests.
//!
//! `SimulatedSite` keeps per-session server state, checks every echoed track
//! id the way the real server does, and answers with the same kinds of
//! fragments: hidden-input landing page, `<trackid>` callback replies, script
//! track ids after "back", detail form with badge script, grid tabs.

use async_trait::async_trait;
use permitwalk_core::{Error, Result, TabKind};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::request::{Method, ProtocolRequest};
use crate::transport::{Response, Transport};

/// What the site knows about one permit.
#[derive(Debug, Clone, Default)]
pub struct PermitFixture {
    inputs: Vec<(String, String)>,
    memo: Option<String>,
    badges: Vec<String>,
    tabs: HashMap<TabKind, (Vec<String>, Vec<Vec<String>>)>,
}

impl PermitFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detail input by id, e.g. `IWDBEDIT2` for the status.
    pub fn input(mut self, id: &str, value: &str) -> Self {
        self.inputs.push((id.to_string(), value.to_string()));
        self
    }

    pub fn memo(mut self, text: &str) -> Self {
        self.memo = Some(text.to_string());
        self
    }

    /// Badge counts in page order: review, fees, inspection, subs, cos, permit hold.
    /// Any number of entries may be given to simulate layout drift.
    pub fn badges(mut self, counts: &[u32]) -> Self {
        self.badges = counts.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn tab(mut self, kind: TabKind, header: &[&str], rows: &[&[&str]]) -> Self {
        let header = header.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect();
        self.tabs.insert(kind, (header, rows));
        self
    }

    fn detail_html(&self) -> String {
        let inputs: String = self
            .inputs
            .iter()
            .map(|(id, v)| format!(r#"<input type="text" id="{}" value="{}">"#, id, v))
            .collect();
        let memo = self
            .memo
            .as_ref()
            .map(|m| format!("<textarea>{}</textarea>", m))
            .unwrap_or_default();
        let badges: String = self
            .badges
            .iter()
            .enumerate()
            .map(|(i, n)| format!("$('#BADGE{}').attr('data-badge','{}');", i, n))
            .collect();
        format!(
            r#"<html><head>
            <script nonce="n0">var IWCL = {{}};</script>
            <script nonce="n0">{}</script>
            </head><body>
            <form id="SubmitForm">
            <input type="button" id="BTNPRINTJOBCARD" value="Print Job Card">
            {}{}
            </form></body></html>"#,
            badges, inputs, memo
        )
    }

    fn tab_html(&self, kind: TabKind) -> String {
        let (header, rows) = self.tabs.get(&kind).cloned().unwrap_or_default();
        let header: String = header
            .iter()
            .map(|h| format!("<td><b><span>{}</span></b></td>", h))
            .collect();
        let rows: String = rows
            .iter()
            .map(|r| {
                let cells: String = r.iter().map(|v| format!("<td><div>{}</div></td>", v)).collect();
                format!("<tr>{}</tr>", cells)
            })
            .collect();
        format!(
            r#"<html><body><table><tr><td onclick="IW.grid()">
            <table id="GRID_{}"><tr>{}</tr>{}</table>
            </td></tr></table></body></html>"#,
            kind.as_str().to_uppercase(),
            header,
            rows
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Start,
    Main,
    Detail,
    Tab(TabKind),
}

#[derive(Debug)]
struct ServerSession {
    expected_track: u64,
    view: View,
    permit: Option<String>,
}

/// One request as the site saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEvent {
    pub session_id: String,
    /// Callback name, `page` for plain posts, `landing` for the bootstrap GET.
    pub label: String,
    pub track_id: Option<String>,
}

#[derive(Debug, Default)]
struct SiteState {
    next_session: u32,
    sessions: HashMap<String, ServerSession>,
    events: Vec<SiteEvent>,
}

pub struct SimulatedSite {
    permits: HashMap<String, PermitFixture>,
    not_found_text: String,
    fail_callback: Option<String>,
    state: Mutex<SiteState>,
}

impl Default for SimulatedSite {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSite {
    pub fn new() -> Self {
        Self {
            permits: HashMap::new(),
            not_found_text: "No Matching Permit Found".to_string(),
            fail_callback: None,
            state: Mutex::new(SiteState::default()),
        }
    }

    pub fn with_permit(mut self, permit: &str, fixture: PermitFixture) -> Self {
        self.permits.insert(permit.to_string(), fixture);
        self
    }

    pub fn with_not_found_text(mut self, text: &str) -> Self {
        self.not_found_text = text.to_string();
        self
    }

    /// Answer this callback (e.g. `BTNVIEWFEES.DoOnAsyncClick`) without a track id.
    pub fn failing_on(mut self, callback: &str) -> Self {
        self.fail_callback = Some(callback.to_string());
        self
    }

    pub fn events(&self) -> Vec<SiteEvent> {
        self.lock().events.clone()
    }

    /// Callback names in the order they were received.
    pub fn callbacks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.label != "page" && e.label != "landing")
            .map(|e| e.label)
            .collect()
    }

    /// Tabs opened, in order, across all sessions.
    pub fn opened_tabs(&self) -> Vec<TabKind> {
        self.callbacks()
            .iter()
            .filter_map(|c| {
                TabKind::VISIT_ORDER
                    .into_iter()
                    .find(|k| *c == format!("{}.DoOnAsyncClick", tab_button(*k)))
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, request: &ProtocolRequest) -> Result<Response> {
        let mut state = self.lock();

        if request.path.is_empty() {
            state.next_session += 1;
            let session_id = format!("SIM{:04}", state.next_session);
            state.sessions.insert(
                session_id.clone(),
                ServerSession {
                    expected_track: 1,
                    view: View::Start,
                    permit: None,
                },
            );
            state.events.push(SiteEvent {
                session_id: session_id.clone(),
                label: "landing".to_string(),
                track_id: None,
            });
            return Ok(Response::ok(format!(
                r#"<html><body><form>
                <input type="hidden" name="IW_SessionID_" value="{}">
                <input type="hidden" name="IW_WindowID_" value="I1">
                </form></body></html>"#,
                session_id
            )));
        }

        let session_id = request
            .path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let track = request.param("IW_TrackID_").map(|t| t.to_string());
        let label = request.callback().unwrap_or("page").to_string();
        state.events.push(SiteEvent {
            session_id: session_id.clone(),
            label: label.clone(),
            track_id: track.clone(),
        });

        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Error::Transport(format!("unknown session {}", session_id)))?;

        if label == "TIMERLOAD.DoOnAsyncTimer" {
            if request.method != Method::Get {
                return Ok(desync("timer must be a GET"));
            }
            if session.view == View::Main {
                session.expected_track += 1;
            }
            return Ok(Response::ok("<response></response>"));
        }

        if track.as_deref() != Some(session.expected_track.to_string().as_str()) {
            return Ok(desync("stale track id"));
        }

        if self.fail_callback.as_deref() == Some(label.as_str()) {
            return Ok(desync("internal error"));
        }

        if label == "page" {
            return Ok(self.page(session, request));
        }

        let control = label.split('.').next().unwrap_or_default();
        let reply = match control {
            "BTNPERMITS" => {
                session.view = View::Main;
                session.expected_track += 1;
                return Ok(Response::ok("<response></response>"));
            }
            "EDTPERMITNBR" => {
                let permit = request.param("EDTPERMITNBR").unwrap_or_default().to_string();
                if !self.permits.contains_key(&permit) {
                    return Ok(Response::ok(format!(
                        "<response><div class=\"msg\">{}</div></response>",
                        self.not_found_text
                    )));
                }
                session.permit = Some(permit);
                TrackReply::Tag
            }
            "BTNGUESTLOGIN" => {
                session.view = View::Detail;
                TrackReply::Tag
            }
            "IMGBACK" => {
                session.view = View::Detail;
                TrackReply::Script
            }
            other => match TabKind::VISIT_ORDER.into_iter().find(|k| tab_button(*k) == other) {
                Some(kind) if session.view == View::Detail => {
                    session.view = View::Tab(kind);
                    TrackReply::Tag
                }
                _ => return Ok(desync("unexpected control")),
            },
        };

        session.expected_track += 1;
        let track = session.expected_track;
        Ok(Response::ok(match reply {
            TrackReply::Tag => format!("<response><trackid>{}</trackid></response>", track),
            TrackReply::Script => format!(
                r#"<response><script>IW.update({{"IW_TrackID_": {}}});</script></response>"#,
                track
            ),
        }))
    }

    fn page(&self, session: &mut ServerSession, request: &ProtocolRequest) -> Response {
        if request.param("IW_width").is_some() {
            session.expected_track += 1;
            return Response::ok("<html><body>registered</body></html>");
        }

        let fixture = session.permit.as_ref().and_then(|p| self.permits.get(p));
        match (session.view, fixture) {
            (View::Main, None) => {
                session.expected_track += 1;
                Response::ok("<html><body>permit search</body></html>")
            }
            (View::Detail, Some(f)) => Response::ok(f.detail_html()),
            (View::Tab(kind), Some(f)) => Response::ok(f.tab_html(kind)),
            _ => desync("nothing to show"),
        }
    }
}

enum TrackReply {
    Tag,
    Script,
}

fn desync(reason: &str) -> Response {
    Response::ok(format!("<html><body>Session error: {}</body></html>", reason))
}

fn tab_button(kind: TabKind) -> &'static str {
    match kind {
        TabKind::Inspection => "BTNVIEWINSPECTIONS",
        TabKind::Review => "BTNVIEWPLANREVIEWS",
        TabKind::PermitHold => "BTNPERMITHOLDS",
        TabKind::Fees => "BTNVIEWFEES",
        TabKind::Subs => "BTNSUBS",
        TabKind::Cos => "BTNVIEWCOS",
    }
}

#[async_trait]
impl Transport for SimulatedSite {
    async fn send(&self, request: &ProtocolRequest) -> Result<Response> {
        self.handle(request)
    }
}
