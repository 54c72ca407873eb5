use once_cell::sync::Lazy;
use permitwalk_core::TabAvailability;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

static NONCE_SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[nonce]").expect("valid selector"));

// $('#BTNVIEWFEES').attr('data-badge','3')
static BADGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.attr\(\s*['"]data-badge['"]\s*,\s*['"](\d*)['"]\s*\)"#).expect("valid regex")
});

const BADGE_COUNT: usize = 6;

/// Reads the tab badge counters out of the detail page.
///
/// The page carries several nonce'd inline scripts; the second one sets the
/// badges for all six tabs. Anything other than exactly six counters means
/// the layout is not the one we know, and every tab is reported unknown so
/// the navigator never clicks a button that may not exist.
pub struct AvailabilityDecoder;

impl AvailabilityDecoder {
    pub fn decode(fragment: &str) -> TabAvailability {
        let script = {
            let document = Html::parse_document(fragment);
            document
                .select(&NONCE_SCRIPT)
                .nth(1)
                .map(|el| el.text().collect::<String>())
        };

        match script {
            Some(script) => Self::decode_script(&script),
            None => {
                debug!("Badge script not found, treating all tabs as unavailable");
                TabAvailability::unknown()
            }
        }
    }

    /// Decode the badge assignments from the script body itself.
    pub fn decode_script(script: &str) -> TabAvailability {
        let tokens: Vec<&str> = BADGE
            .captures_iter(script)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();

        if tokens.len() != BADGE_COUNT {
            debug!(found = tokens.len(), "Unexpected badge count, treating all tabs as unavailable");
            return TabAvailability::unknown();
        }

        let mut counts = [0u32; BADGE_COUNT];
        for (slot, token) in counts.iter_mut().zip(&tokens) {
            *slot = badge_count(token);
        }
        TabAvailability::from_badges(counts)
    }
}

/// Empty digits mean zero; a counter too large for `u32` saturates.
fn badge_count(token: &str) -> u32 {
    if token.is_empty() {
        return 0;
    }
    token.parse().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use permitwalk_core::TabKind;

    fn badge_script(counts: &[&str]) -> String {
        let buttons = [
            "BTNVIEWPLANREVIEWS",
            "BTNVIEWFEES",
            "BTNVIEWINSPECTIONS",
            "BTNSUBS",
            "BTNVIEWCOS",
            "BTNPERMITHOLDS",
        ];
        counts
            .iter()
            .zip(buttons)
            .map(|(n, b)| format!("$('#{}').attr('data-badge','{}');\n", b, n))
            .collect()
    }

    fn page(counts: &[&str]) -> String {
        format!(
            r#"<html><head>
            <script nonce="abc">var IW_TrackID_ = 7;</script>
            <script>console.log('no nonce');</script>
            <script nonce="abc">{}</script>
            </head><body></body></html>"#,
            badge_script(counts)
        )
    }

    #[test]
    fn test_six_badges_in_page_order() {
        let availability = AvailabilityDecoder::decode(&page(&["1", "0", "2", "0", "0", "3"]));
        assert_eq!(availability.review, Some(1));
        assert_eq!(availability.fees, Some(0));
        assert_eq!(availability.inspection, Some(2));
        assert_eq!(availability.subs, Some(0));
        assert_eq!(availability.cos, Some(0));
        assert_eq!(availability.permit_hold, Some(3));
    }

    #[test]
    fn test_five_badges_is_unknown() {
        let availability = AvailabilityDecoder::decode(&page(&["1", "1", "1", "1", "1"]));
        assert!(availability.is_unknown());
        assert!(!availability.is_available(TabKind::Review));
    }

    #[test]
    fn test_seven_badges_is_unknown() {
        let mut script = badge_script(&["1", "1", "1", "1", "1", "1"]);
        script.push_str("$('#X').attr('data-badge','1');");
        assert!(AvailabilityDecoder::decode_script(&script).is_unknown());
    }

    #[test]
    fn test_empty_digits_default_to_zero() {
        let availability = AvailabilityDecoder::decode(&page(&["", "4", "", "", "", ""]));
        assert_eq!(availability.review, Some(0));
        assert_eq!(availability.fees, Some(4));
        assert!(!availability.is_unknown());
        assert!(availability.is_available(TabKind::Fees));
        assert!(!availability.is_available(TabKind::Review));
    }

    #[test]
    fn test_oversized_badge_saturates() {
        let availability =
            AvailabilityDecoder::decode(&page(&["0", "99999999999", "0", "0", "0", "0"]));
        assert_eq!(availability.fees, Some(u32::MAX));
        assert!(availability.is_available(TabKind::Fees));
    }

    #[test]
    fn test_only_second_nonce_script_is_read() {
        let html = format!(
            r#"<script nonce="a">{}</script><script nonce="a">var x = 1;</script>"#,
            badge_script(&["1", "1", "1", "1", "1", "1"])
        );
        assert!(AvailabilityDecoder::decode(&html).is_unknown());
    }

    #[test]
    fn test_missing_script_is_unknown() {
        assert!(AvailabilityDecoder::decode("<html><body>nothing</body></html>").is_unknown());
    }
}
