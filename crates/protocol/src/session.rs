use once_cell::sync::Lazy;
use permitwalk_core::{Error, Result};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::ids::IdGenerator;
use crate::request::{FormId, FRM_START};
use crate::transport::Response;

static TRACK_TAG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("trackid").expect("valid selector"));
static TRACK_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""IW_TrackID_"\s*:\s*(\d+)"#).expect("valid regex"));
static SESSION_INPUT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[name="IW_SessionID_"]"#).expect("valid selector"));
static WINDOW_INPUT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[name="IW_WindowID_"]"#).expect("valid selector"));

/// Client-side view of one server wizard session.
///
/// `session_id` and `window_id` never change once assigned. `track_id` is
/// the server's sequence number for the next state-changing request; sending
/// anything but the current value desynchronizes the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: String,
    window_id: String,
    ajax_id: String,
    track_id: u64,
    current_form: FormId,
}

impl Session {
    pub fn new(session_id: impl Into<String>, window_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            window_id: window_id.into(),
            ajax_id: String::new(),
            track_id: 1,
            current_form: FRM_START,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    pub fn ajax_id(&self) -> &str {
        &self.ajax_id
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn current_form(&self) -> FormId {
        self.current_form
    }

    pub(crate) fn set_position(&mut self, track_id: u64, form: FormId) {
        self.track_id = track_id;
        self.current_form = form;
    }

    pub(crate) fn set_ajax_id(&mut self, ajax_id: impl Into<String>) {
        self.ajax_id = ajax_id.into();
    }
}

/// Creation and mutation rules for [`Session`].
pub struct SessionManager;

impl SessionManager {
    /// Start a session from the landing page's hidden id inputs.
    pub fn open(response: &Response) -> Result<Session> {
        let (session_id, window_id) = {
            let document = Html::parse_document(&response.body);
            let read = |sel: &Selector| {
                document
                    .select(sel)
                    .next()
                    .and_then(|el| el.value().attr("value"))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };
            (read(&SESSION_INPUT), read(&WINDOW_INPUT))
        };

        match (session_id, window_id) {
            (Some(session_id), Some(window_id)) => {
                debug!(session_id = %session_id, window_id = %window_id, "Session opened");
                Ok(Session::new(session_id, window_id))
            }
            _ => Err(Error::SessionProtocol(
                "landing page carries no session/window id".to_string(),
            )),
        }
    }

    /// Adopt the track id the server issued in `response` and move to `next`.
    /// A response without a recoverable track id is fatal for the session.
    pub fn advance(session: &mut Session, response: &Response, next: FormId) -> Result<()> {
        let track_id = Self::extract_track_id(&response.body).ok_or_else(|| {
            Error::SessionProtocol(format!(
                "no track id in response (session {}, form {}, last track {})",
                session.session_id, session.current_form, session.track_id
            ))
        })?;

        if track_id < session.track_id {
            warn!(
                session_id = %session.session_id,
                from = session.track_id,
                to = track_id,
                "Server moved track id backwards"
            );
        }
        debug!(session_id = %session.session_id, track_id, form = %next, "Session advanced");
        session.set_position(track_id, next);
        Ok(())
    }

    /// Warm-up steps whose responses carry nothing we rely on: the server's
    /// track id moves by a known amount.
    pub fn advance_by(session: &mut Session, steps: u64, next: FormId) {
        let track_id = session.track_id + steps;
        session.set_position(track_id, next);
    }

    /// Move to `next` without touching the track id.
    pub fn keep(session: &mut Session, next: FormId) {
        session.current_form = next;
    }

    /// New correlation token for the next logical page.
    pub fn refresh_ajax_id(session: &mut Session, ids: &dyn IdGenerator) {
        session.set_ajax_id(ids.next_id());
    }

    /// `<trackid>` tag first, then the `"IW_TrackID_": N` assignment in script text.
    pub fn extract_track_id(body: &str) -> Option<u64> {
        let tagged = {
            let document = Html::parse_document(body);
            document
                .select(&TRACK_TAG)
                .next()
                .and_then(|el| el.text().collect::<String>().trim().parse::<u64>().ok())
        };

        tagged.or_else(|| {
            TRACK_SCRIPT
                .captures(body)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequenceIdGenerator;
    use crate::request::{FRM_MAIN, FRM_PERMIT_DETAIL};

    #[test]
    fn test_open_reads_hidden_inputs() {
        let page = Response::ok(
            r#"<form><input type="hidden" name="IW_SessionID_" value="ABC123">
            <input type="hidden" name="IW_WindowID_" value="I1"></form>"#,
        );
        let session = SessionManager::open(&page).unwrap();
        assert_eq!(session.session_id(), "ABC123");
        assert_eq!(session.window_id(), "I1");
        assert_eq!(session.track_id(), 1);
        assert_eq!(session.current_form(), FRM_START);
    }

    #[test]
    fn test_open_without_ids_fails() {
        let page = Response::ok("<html><body>maintenance</body></html>");
        assert!(matches!(
            SessionManager::open(&page),
            Err(Error::SessionProtocol(_))
        ));
    }

    #[test]
    fn test_tag_wins_over_script() {
        let body = r#"<response><trackid>8</trackid><script>{"IW_TrackID_": 3}</script></response>"#;
        assert_eq!(SessionManager::extract_track_id(body), Some(8));
    }

    #[test]
    fn test_script_fallback() {
        let body = r#"<html><script nonce="x">IW.init({"IW_TrackID_": 12, "x": 1});</script></html>"#;
        assert_eq!(SessionManager::extract_track_id(body), Some(12));
    }

    #[test]
    fn test_bad_tag_falls_back_to_script() {
        let body = r#"<trackid>n/a</trackid><script>{"IW_TrackID_":4}</script>"#;
        assert_eq!(SessionManager::extract_track_id(body), Some(4));
    }

    #[test]
    fn test_advance_updates_track_and_form() {
        let mut session = Session::new("S", "I1");
        session.set_position(5, FRM_MAIN);
        SessionManager::advance(
            &mut session,
            &Response::ok("<trackid>6</trackid>"),
            FRM_PERMIT_DETAIL,
        )
        .unwrap();
        assert_eq!(session.track_id(), 6);
        assert_eq!(session.current_form(), FRM_PERMIT_DETAIL);
    }

    #[test]
    fn test_advance_without_track_is_protocol_error() {
        let mut session = Session::new("S", "I1");
        session.set_position(5, FRM_MAIN);
        let err = SessionManager::advance(
            &mut session,
            &Response::ok("<html>oops</html>"),
            FRM_PERMIT_DETAIL,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SessionProtocol(_)));
        assert_eq!(session.track_id(), 5);
        assert_eq!(session.current_form(), FRM_MAIN);
    }

    #[test]
    fn test_advance_by_and_keep() {
        let mut session = Session::new("S", "I1");
        SessionManager::advance_by(&mut session, 1, FRM_MAIN);
        assert_eq!(session.track_id(), 2);
        SessionManager::keep(&mut session, FRM_PERMIT_DETAIL);
        assert_eq!(session.track_id(), 2);
        assert_eq!(session.current_form(), FRM_PERMIT_DETAIL);
    }

    #[test]
    fn test_refresh_ajax_id() {
        let ids = SequenceIdGenerator::new("17148202878", 3);
        let mut session = Session::new("S", "I1");
        SessionManager::refresh_ajax_id(&mut session, &ids);
        assert_eq!(session.ajax_id(), "17148202878000");
        SessionManager::refresh_ajax_id(&mut session, &ids);
        assert_eq!(session.ajax_id(), "17148202878001");
    }
}
