use once_cell::sync::Lazy;
use permitwalk_core::FieldMap;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::element_text;

static FORM: Lazy<Selector> = Lazy::new(|| Selector::parse("form").expect("valid selector"));
static TEXTAREA: Lazy<Selector> =
    Lazy::new(|| Selector::parse("textarea").expect("valid selector"));

/// Id of the print button that only the permit detail form carries.
pub const DETAIL_ANCHOR_ID: &str = "BTNPRINTJOBCARD";

/// How one logical field is read from the detail form.
#[derive(Debug, Clone, Copy)]
pub enum FieldRule {
    /// `value` attribute of the input with this id.
    Input(&'static str),
    /// Several inputs, non-blank values joined with ", ".
    Joined(&'static [&'static str]),
    /// Input value if present, else the text of the form's textarea.
    InputOrTextarea(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub rule: FieldRule,
}

const fn field(name: &'static str, rule: FieldRule) -> FieldSpec {
    FieldSpec { name, rule }
}

pub const DETAIL_FIELDS: &[FieldSpec] = &[
    field("permit_status", FieldRule::Input("IWDBEDIT2")),
    field("type", FieldRule::Joined(&["IWDBEDIT12", "IWDBEDIT3"])),
    field("owner", FieldRule::Input("IWDBEDIT4")),
    field("address", FieldRule::Input("IWDBEDIT5")),
    field("parcel", FieldRule::Input("IWDBEDIT14")),
    field("dba", FieldRule::Input("IWDBEDIT6")),
    field("job_desc", FieldRule::InputOrTextarea("IWDBMEMO1")),
    field("apply_date", FieldRule::Input("IWDBEDIT13")),
    field("issued_date", FieldRule::Input("IWDBEDIT8")),
    field("co_date", FieldRule::Input("IWDBEDIT7")),
    field("expiration_date", FieldRule::Input("IWDBEDIT9")),
    field("last_inspection_request", FieldRule::Input("IWDBEDIT10")),
    field("last_inspection_result", FieldRule::Input("IWDBEDIT11")),
];

/// Reads the main permit fields from the detail view.
///
/// Fields are located by input id inside the form holding the print button,
/// never by position, so cosmetic layout changes do not shift values between
/// fields. Missing markup produces an empty string for that field.
pub struct DetailParser {
    fields: &'static [FieldSpec],
}

impl Default for DetailParser {
    fn default() -> Self {
        Self::new(DETAIL_FIELDS)
    }
}

impl DetailParser {
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn parse(&self, fragment: &str) -> FieldMap {
        let document = Html::parse_document(fragment);
        let anchor = anchor_selector();
        let form = document
            .select(&FORM)
            .find(|f| f.select(&anchor).next().is_some());

        if form.is_none() {
            debug!("Detail form anchor not found, fields will be empty");
        }

        self.fields
            .iter()
            .map(|spec| {
                let value = form.map(|f| read_rule(f, spec.rule)).unwrap_or_default();
                (spec.name, value)
            })
            .collect()
    }
}

fn anchor_selector() -> Selector {
    id_selector("input", DETAIL_ANCHOR_ID).expect("valid selector")
}

fn id_selector(tag: &str, id: &str) -> Option<Selector> {
    Selector::parse(&format!("{}[id=\"{}\"]", tag, id)).ok()
}

fn input_value(form: ElementRef<'_>, id: &str) -> Option<String> {
    let sel = id_selector("input", id)?;
    form.select(&sel)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(|v| v.trim().to_string())
}

fn read_rule(form: ElementRef<'_>, rule: FieldRule) -> String {
    match rule {
        FieldRule::Input(id) => input_value(form, id).unwrap_or_default(),
        FieldRule::Joined(ids) => ids
            .iter()
            .filter_map(|id| input_value(form, id))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        FieldRule::InputOrTextarea(id) => input_value(form, id)
            .filter(|v| !v.is_empty())
            .or_else(|| form.select(&TEXTAREA).next().map(element_text))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_page(inputs: &str, extra: &str) -> String {
        format!(
            r#"<html><body>
            <form id="other"><input id="IWDBEDIT2" value="DECOY"></form>
            <form id="main">
              <input id="BTNPRINTJOBCARD" type="button" value="Print">
              {}
              {}
            </form></body></html>"#,
            inputs, extra
        )
    }

    #[test]
    fn test_reads_fields_from_anchored_form() {
        let html = detail_page(
            r#"<input id="IWDBEDIT2" value="  ISSUED ">
               <input id="IWDBEDIT12" value="RESIDENTIAL">
               <input id="IWDBEDIT3" value="ROOF">
               <input id="IWDBEDIT4" value="SMITH JOHN">
               <input id="IWDBEDIT13" value="01/02/2024">"#,
            r#"<textarea id="IWDBMEMO1">  Replace shingles
            </textarea>"#,
        );
        let fields = DetailParser::default().parse(&html);
        assert_eq!(fields.get("permit_status"), Some("ISSUED"));
        assert_eq!(fields.get("type"), Some("RESIDENTIAL, ROOF"));
        assert_eq!(fields.get("owner"), Some("SMITH JOHN"));
        assert_eq!(fields.get("apply_date"), Some("01/02/2024"));
        assert_eq!(fields.get("job_desc"), Some("Replace shingles"));
    }

    #[test]
    fn test_missing_inputs_yield_empty_values() {
        let fields = DetailParser::default().parse(&detail_page("", ""));
        assert_eq!(fields.len(), DETAIL_FIELDS.len());
        assert_eq!(fields.get("parcel"), Some(""));
        assert_eq!(fields.get("type"), Some(""));
        assert_eq!(fields.get("job_desc"), Some(""));
    }

    #[test]
    fn test_type_with_one_part() {
        let html = detail_page(r#"<input id="IWDBEDIT3" value="POOL">"#, "");
        let fields = DetailParser::default().parse(&html);
        assert_eq!(fields.get("type"), Some("POOL"));
    }

    #[test]
    fn test_memo_input_wins_over_textarea() {
        let html = detail_page(
            r#"<input id="IWDBMEMO1" value="From input">"#,
            "<textarea>From textarea</textarea>",
        );
        let fields = DetailParser::default().parse(&html);
        assert_eq!(fields.get("job_desc"), Some("From input"));
    }

    #[test]
    fn test_without_anchor_everything_is_empty() {
        let html = r#"<form><input id="IWDBEDIT2" value="ISSUED"></form>"#;
        let fields = DetailParser::default().parse(html);
        assert_eq!(fields.get("permit_status"), Some(""));
    }

    #[test]
    fn test_field_order_follows_table() {
        let fields = DetailParser::default().parse(&detail_page("", ""));
        let names: Vec<&str> = fields.keys().collect();
        let expected: Vec<&str> = DETAIL_FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, expected);
    }
}
