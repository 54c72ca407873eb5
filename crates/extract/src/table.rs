use once_cell::sync::Lazy;
use permitwalk_core::RowMap;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::element_text;

static GRID_IN_CLICKABLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"td[onclick] table[id*="GRID_"]"#).expect("valid selector")
});
static GRID: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"table[id*="GRID_"]"#).expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static HEADER_LABEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("b span").expect("valid selector"));
static VALUE_DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").expect("valid selector"));

/// Turns the grid widget of a tab view into one map per data row.
///
/// The first row holds the column labels. Every later row is paired with
/// them by position; when the counts differ the extra cells (or labels) are
/// dropped. Blank cells are omitted and rows with nothing left are skipped.
pub struct TableExtractor;

impl TableExtractor {
    pub fn extract(fragment: &str) -> Vec<RowMap> {
        let document = Html::parse_document(fragment);
        let grid = document
            .select(&GRID_IN_CLICKABLE)
            .next()
            .or_else(|| document.select(&GRID).next());

        match grid {
            Some(grid) => Self::extract_grid(grid),
            None => {
                debug!("No grid in fragment");
                Vec::new()
            }
        }
    }

    fn extract_grid(grid: ElementRef<'_>) -> Vec<RowMap> {
        let mut rows = grid
            .select(&ROW)
            .filter(|row| owning_table(*row).map(|t| t.id()) == Some(grid.id()));

        let headers: Vec<String> = match rows.next() {
            Some(header) => cells(header).map(header_label).collect(),
            None => return Vec::new(),
        };

        let mut out = Vec::new();
        for (index, row) in rows.enumerate() {
            let values: Vec<String> = cells(row).map(cell_value).collect();
            if values.is_empty() {
                debug!(row = index + 1, "Dropping malformed grid row without cells");
                continue;
            }
            if values.len() != headers.len() {
                debug!(
                    row = index + 1,
                    cells = values.len(),
                    columns = headers.len(),
                    "Grid row width differs from header, pairing by position"
                );
            }

            let map: RowMap = headers
                .iter()
                .zip(values)
                .filter(|(label, value)| !label.is_empty() && !value.is_empty())
                .map(|(label, value)| (label.clone(), value))
                .collect();

            if !map.is_empty() {
                out.push(map);
            }
        }
        out
    }
}

/// Direct `td` children of a row.
fn cells<'a>(row: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
}

fn header_label(cell: ElementRef<'_>) -> String {
    cell.select(&HEADER_LABEL)
        .next()
        .map(element_text)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| element_text(cell))
}

/// Own text of the `div`s inside a cell; the whole cell text when it has none.
/// Hints, link labels and icons sitting beside the value div are ignored.
fn cell_value(cell: ElementRef<'_>) -> String {
    let mut divs = cell.select(&VALUE_DIV).peekable();
    if divs.peek().is_none() {
        return element_text(cell);
    }
    divs.flat_map(|div| div.children())
        .filter_map(|node| node.value().as_text().map(|t| String::from(&**t)))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Nearest enclosing table, so rows of nested tables are not mistaken for grid rows.
fn owning_table(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]], header: &[&str]) -> String {
        let header_cells: String = header
            .iter()
            .map(|h| format!("<td><b><span>{}</span></b></td>", h))
            .collect();
        let body: String = rows
            .iter()
            .map(|r| {
                let tds: String = r.iter().map(|v| format!("<td><div>{}</div></td>", v)).collect();
                format!("<tr>{}</tr>", tds)
            })
            .collect();
        format!(
            r#"<html><body><table><tr><td onclick="x()">
            <table id="GRID_IWDBGRID1"><tr>{}</tr>{}</table>
            </td></tr></table></body></html>"#,
            header_cells, body
        )
    }

    #[test]
    fn test_blank_cells_are_omitted() {
        let html = grid(&[&["x", ""], &["", "y"]], &["A", "B"]);
        let rows = TableExtractor::extract(&html);
        assert_eq!(rows.len(), 2);
        assert_eq!(serde_json::to_string(&rows[0]).unwrap(), r#"{"A":"x"}"#);
        assert_eq!(serde_json::to_string(&rows[1]).unwrap(), r#"{"B":"y"}"#);
    }

    #[test]
    fn test_all_blank_row_is_dropped() {
        let html = grid(&[&["", "  "], &["1", "2"]], &["A", "B"]);
        let rows = TableExtractor::extract(&html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("A"), Some("1"));
        assert_eq!(rows[0].get("B"), Some("2"));
    }

    #[test]
    fn test_pairing_truncates_to_shorter() {
        let html = grid(&[&["1", "2", "3"], &["4"]], &["A", "B"]);
        let rows = TableExtractor::extract(&html);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0].get("B"), Some("2"));
        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[1].get("A"), Some("4"));
    }

    #[test]
    fn test_values_are_trimmed_and_ordered() {
        let html = grid(&[&["  late ", " 2024-01-05\n"]], &["Result", "Date"]);
        let rows = TableExtractor::extract(&html);
        let pairs: Vec<(&str, &str)> = rows[0].iter().collect();
        assert_eq!(pairs, vec![("Result", "late"), ("Date", "2024-01-05")]);
    }

    #[test]
    fn test_empty_row_without_cells_is_skipped() {
        let html = r#"<table id="GRID_1"><tr><td><b><span>A</span></b></td></tr>
            <tr></tr><tr><td><div>v</div></td></tr></table>"#;
        let rows = TableExtractor::extract(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("A"), Some("v"));
    }

    #[test]
    fn test_nested_table_rows_are_ignored() {
        let html = r#"<table id="GRID_1">
            <tr><td><b><span>A</span></b></td></tr>
            <tr><td><div>outer</div><table><tr><td>inner</td></tr></table></td></tr>
            </table>"#;
        let rows = TableExtractor::extract(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("A"), Some("outer"));
    }

    #[test]
    fn test_value_comes_from_cell_div() {
        let html = r##"<table id="GRID_1">
            <tr><td><b><span>Result</span></b></td><td><b><span>Date</span></b></td></tr>
            <tr><td><img alt=""><span class="hint">Click to open</span><div>PASS</div></td>
                <td><a href="#">view</a><div> 01/05/2024 </div></td></tr>
            </table>"##;
        let rows = TableExtractor::extract(html);
        assert_eq!(rows[0].get("Result"), Some("PASS"));
        assert_eq!(rows[0].get("Date"), Some("01/05/2024"));
    }

    #[test]
    fn test_cell_without_div_uses_cell_text() {
        let html = r#"<table id="GRID_1">
            <tr><td><b><span>Fee</span></b></td></tr>
            <tr><td> <span>Permit</span> fee </td></tr>
            </table>"#;
        let rows = TableExtractor::extract(html);
        assert_eq!(rows[0].get("Fee"), Some("Permit fee"));
    }

    #[test]
    fn test_no_grid_yields_no_rows() {
        assert!(TableExtractor::extract("<table><tr><td>A</td></tr></table>").is_empty());
    }
}
