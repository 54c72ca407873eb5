use permitwalk_core::config::ViewportConfig;
use permitwalk_core::{Config, Error, Result, TabKind};
use std::fmt;

use crate::session::Session;

/// A wizard form as the server names it: `IW_FormName` / `IW_FormClass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormId {
    pub name: &'static str,
    pub class: &'static str,
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub const FRM_START: FormId = FormId { name: "FrmStart", class: "TFrmStart" };
pub const FRM_MAIN: FormId = FormId { name: "FrmMain", class: "TFrmMain" };
pub const FRM_PERMIT_DETAIL: FormId = FormId {
    name: "FrmPermitDetail",
    class: "TFrmPermitDetail",
};

impl FormId {
    /// The form a tab button opens.
    pub fn for_tab(kind: TabKind) -> FormId {
        match kind {
            TabKind::Inspection => FormId {
                name: "FrmPermitInspections",
                class: "TFrmPermitInspections",
            },
            TabKind::Review => FormId { name: "FrmPlanReviews", class: "TFrmPlanReviews" },
            TabKind::PermitHold => FormId { name: "FrmComments", class: "TFrmComments" },
            TabKind::Fees => FormId { name: "FrmFees", class: "TFrmFees" },
            TabKind::Subs => FormId {
                name: "FrmSubContractors",
                class: "TFrmSubContractors",
            },
            TabKind::Cos => FormId { name: "FrmCertOcc", class: "TFrmCertOcc" },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Click,
    KeyUp,
    Timer,
}

/// The control whose client-side event fires an async callback.
#[derive(Debug, Clone, Copy)]
struct Trigger {
    control: &'static str,
    event: Event,
    /// Cursor position reported with clicks.
    at: (u32, u32),
}

impl Trigger {
    const fn click(control: &'static str, x: u32, y: u32) -> Self {
        Self { control, event: Event::Click, at: (x, y) }
    }

    const fn key_up(control: &'static str) -> Self {
        Self { control, event: Event::KeyUp, at: (0, 0) }
    }

    const fn timer(control: &'static str) -> Self {
        Self { control, event: Event::Timer, at: (0, 0) }
    }

    fn callback(&self) -> String {
        let event = match self.event {
            Event::Click => "DoOnAsyncClick",
            Event::KeyUp => "DoOnAsyncKeyUp",
            Event::Timer => "DoOnAsyncTimer",
        };
        format!("{}.{}", self.control, event)
    }

    fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![("callback".to_string(), self.callback())];
        if self.event == Event::Click {
            query.push(("x".to_string(), self.at.0.to_string()));
            query.push(("y".to_string(), self.at.1.to_string()));
        }
        if self.event != Event::Timer {
            query.push(("which".to_string(), "0".to_string()));
            query.push(("modifiers".to_string(), String::new()));
        }
        query
    }
}

const TIMER: Trigger = Trigger::timer("TIMERLOAD");
const PERMITS_BUTTON: Trigger = Trigger::click("BTNPERMITS", 161, 23);
const PERMIT_NUMBER: Trigger = Trigger::key_up("EDTPERMITNBR");
const GUEST_LOGIN: Trigger = Trigger::click("BTNGUESTLOGIN", 118, 29);
const BACK: Trigger = Trigger::click("IMGBACK", 46, 21);

fn tab_trigger(kind: TabKind) -> Trigger {
    match kind {
        TabKind::Inspection => Trigger::click("BTNVIEWINSPECTIONS", 42, 14),
        TabKind::Review => Trigger::click("BTNVIEWPLANREVIEWS", 36, 19),
        TabKind::PermitHold => Trigger::click("BTNPERMITHOLDS", 58, 17),
        TabKind::Fees => Trigger::click("BTNVIEWFEES", 60, 19),
        TabKind::Subs => Trigger::click("BTNSUBS", 26, 22),
        TabKind::Cos => Trigger::click("BTNVIEWCOS", 24, 16),
    }
}

/// The timer callback always reports this track id; the server ignores it.
const TIMER_TRACK_ID: &str = "1";

/// One step of the wizard, as the client would perform it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RegisterSession,
    SetTimer,
    ClickPermitButton,
    SetTrackId,
    SubmitRecord(String),
    OpenDetail(String),
    /// Load the view the previous callback switched to.
    FetchView,
    OpenTab(TabKind),
    GoBack(TabKind),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::RegisterSession => "register_session",
            Action::SetTimer => "set_timer",
            Action::ClickPermitButton => "click_permit_button",
            Action::SetTrackId => "set_track_id",
            Action::SubmitRecord(_) => "submit_record",
            Action::OpenDetail(_) => "open_detail",
            Action::FetchView => "fetch_view",
            Action::OpenTab(_) => "open_tab",
            Action::GoBack(_) => "go_back",
        }
    }

    /// Whether the action may be sent while the session sits on `form`.
    pub fn accepts_origin(&self, form: FormId) -> bool {
        match self {
            Action::RegisterSession | Action::ClickPermitButton => form == FRM_START,
            Action::SetTimer => form == FRM_START || form == FRM_MAIN,
            Action::SubmitRecord(_) | Action::OpenDetail(_) => form == FRM_MAIN,
            Action::OpenTab(_) => form == FRM_PERMIT_DETAIL,
            Action::GoBack(kind) => form == FormId::for_tab(*kind),
            Action::SetTrackId | Action::FetchView => true,
        }
    }

    /// The form the session is on once the server has accepted the action.
    pub fn resulting_form(&self, current: FormId) -> FormId {
        match self {
            Action::ClickPermitButton => FRM_MAIN,
            Action::OpenDetail(_) | Action::GoBack(_) => FRM_PERMIT_DETAIL,
            Action::OpenTab(kind) => FormId::for_tab(*kind),
            _ => current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Everything the transport needs to perform one request. `path` is
/// relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl ProtocolRequest {
    /// First value for `key`, looking at the query string then the form body.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .chain(self.form.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn callback(&self) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == "callback")
            .map(|(_, v)| v.as_str())
    }
}

fn pair(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

/// Builds protocol-correct requests from the session state. Pure: no I/O,
/// no mutation of the session.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    viewport: ViewportConfig,
}

impl RequestBuilder {
    pub fn new(viewport: ViewportConfig) -> Self {
        Self { viewport }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.site.viewport.clone())
    }

    /// Landing page request that makes the server allocate a session.
    pub fn bootstrap() -> ProtocolRequest {
        ProtocolRequest {
            method: Method::Get,
            path: String::new(),
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn build(&self, action: &Action, session: &Session) -> Result<ProtocolRequest> {
        let form = session.current_form();
        if !action.accepts_origin(form) {
            return Err(Error::Config(format!(
                "{} cannot be sent from form {} (session {})",
                action.name(),
                form,
                session.session_id()
            )));
        }

        let request = match action {
            Action::RegisterSession => self.page_post(
                session,
                vec![
                    pair("IW_width", self.viewport.width.to_string()),
                    pair("IW_height", self.viewport.height.to_string()),
                    pair("IW_dpr", self.viewport.dpr.to_string()),
                    pair("IW_SessionID_", session.session_id()),
                    pair("IW_TrackID_", session.track_id().to_string()),
                    pair("IW_WindowID_", session.window_id()),
                ],
            ),
            Action::SetTrackId | Action::FetchView => self.page_post(
                session,
                vec![
                    pair("IW_SessionID_", session.session_id()),
                    pair("IW_TrackID_", session.track_id().to_string()),
                ],
            ),
            Action::SetTimer => {
                let mut query = TIMER.query();
                query.extend([
                    pair("IW_WindowID_", session.window_id()),
                    pair("IW_TrackID_", TIMER_TRACK_ID),
                    pair("IW_SessionID_", session.session_id()),
                    pair("IW_FormClass", form.class),
                    pair("IW_FormName", form.name),
                    pair("IW_AjaxID", session.ajax_id()),
                ]);
                ProtocolRequest {
                    method: Method::Get,
                    path: callback_path(session),
                    query,
                    form: Vec::new(),
                }
            }
            Action::ClickPermitButton => {
                self.callback_post(session, PERMITS_BUTTON, vec![pair("BTNPERMITS", "")])
            }
            Action::SubmitRecord(permit) => {
                let permit = non_blank(permit)?;
                self.callback_post(session, PERMIT_NUMBER, vec![pair("EDTPERMITNBR", permit)])
            }
            Action::OpenDetail(permit) => {
                let permit = non_blank(permit)?;
                self.callback_post(
                    session,
                    GUEST_LOGIN,
                    vec![pair("EDTPERMITNBR", permit), pair("BTNGUESTLOGIN", "")],
                )
            }
            Action::OpenTab(kind) => {
                let trigger = tab_trigger(*kind);
                self.callback_post(session, trigger, vec![pair(trigger.control, "")])
            }
            Action::GoBack(_) => self.callback_post(session, BACK, Vec::new()),
        };
        Ok(request)
    }

    fn page_post(&self, session: &Session, form: Vec<(String, String)>) -> ProtocolRequest {
        ProtocolRequest {
            method: Method::Post,
            path: page_path(session),
            query: Vec::new(),
            form,
        }
    }

    fn callback_post(
        &self,
        session: &Session,
        trigger: Trigger,
        mut form: Vec<(String, String)>,
    ) -> ProtocolRequest {
        let current = session.current_form();
        form.extend([
            pair("IW_FormName", current.name),
            pair("IW_FormClass", current.class),
            pair("IW_width", self.viewport.width.to_string()),
            pair("IW_height", self.viewport.height.to_string()),
            pair("IW_Action", trigger.control),
            pair("IW_ActionParam", ""),
            pair("IW_Offset", ""),
            pair("IW_SessionID_", session.session_id()),
            pair("IW_TrackID_", session.track_id().to_string()),
            pair("IW_WindowID_", session.window_id()),
            pair("IW_AjaxID", session.ajax_id()),
        ]);
        ProtocolRequest {
            method: Method::Post,
            path: callback_path(session),
            query: trigger.query(),
            form,
        }
    }
}

fn non_blank(permit: &str) -> Result<&str> {
    let permit = permit.trim();
    if permit.is_empty() {
        return Err(Error::Validation("permit number is empty".to_string()));
    }
    Ok(permit)
}

fn page_path(session: &Session) -> String {
    format!("/{}/", session.session_id())
}

fn callback_path(session: &Session) -> String {
    format!("/{}/$/callback", session.session_id())
}
