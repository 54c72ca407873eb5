use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Ordered string-to-string mapping that serializes as a JSON object,
/// keeping insertion order (columns and fields stay in document order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMap {
    entries: Vec<(String, String)>,
}

/// One grid row: column label to cell value. Blank cells are never stored.
pub type RowMap = TextMap;

/// The detail view's fixed field set.
pub type FieldMap = TextMap;

impl TextMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TextMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TextMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for TextMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The six secondary views reachable from the detail view, in visiting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabKind {
    Inspection,
    Review,
    PermitHold,
    Fees,
    Subs,
    Cos,
}

impl TabKind {
    pub const VISIT_ORDER: [TabKind; 6] = [
        TabKind::Inspection,
        TabKind::Review,
        TabKind::PermitHold,
        TabKind::Fees,
        TabKind::Subs,
        TabKind::Cos,
    ];

    /// Order of the badge counters as they appear in the detail page script.
    pub const BADGE_ORDER: [TabKind; 6] = [
        TabKind::Review,
        TabKind::Fees,
        TabKind::Inspection,
        TabKind::Subs,
        TabKind::Cos,
        TabKind::PermitHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TabKind::Inspection => "inspection",
            TabKind::Review => "review",
            TabKind::PermitHold => "permit_hold",
            TabKind::Fees => "fees",
            TabKind::Subs => "subs",
            TabKind::Cos => "cos",
        }
    }

    /// Tabs after `self` in visiting order.
    pub fn following(self) -> impl Iterator<Item = TabKind> {
        TabKind::VISIT_ORDER
            .into_iter()
            .skip_while(move |k| *k != self)
            .skip(1)
    }
}

impl fmt::Display for TabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge counts decoded from the detail page. `None` means the count could not
/// be read, which is treated the same as zero: the tab is not visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TabAvailability {
    pub review: Option<u32>,
    pub fees: Option<u32>,
    pub inspection: Option<u32>,
    pub subs: Option<u32>,
    pub cos: Option<u32>,
    pub permit_hold: Option<u32>,
}

impl TabAvailability {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Build from counts given in `TabKind::BADGE_ORDER`.
    pub fn from_badges(counts: [u32; 6]) -> Self {
        let mut availability = Self::unknown();
        for (kind, count) in TabKind::BADGE_ORDER.into_iter().zip(counts) {
            *availability.slot_mut(kind) = Some(count);
        }
        availability
    }

    pub fn get(&self, kind: TabKind) -> Option<u32> {
        match kind {
            TabKind::Inspection => self.inspection,
            TabKind::Review => self.review,
            TabKind::PermitHold => self.permit_hold,
            TabKind::Fees => self.fees,
            TabKind::Subs => self.subs,
            TabKind::Cos => self.cos,
        }
    }

    pub fn is_available(&self, kind: TabKind) -> bool {
        self.get(kind).is_some_and(|n| n > 0)
    }

    pub fn is_unknown(&self) -> bool {
        TabKind::VISIT_ORDER.iter().all(|k| self.get(*k).is_none())
    }

    fn slot_mut(&mut self, kind: TabKind) -> &mut Option<u32> {
        match kind {
            TabKind::Inspection => &mut self.inspection,
            TabKind::Review => &mut self.review,
            TabKind::PermitHold => &mut self.permit_hold,
            TabKind::Fees => &mut self.fees,
            TabKind::Subs => &mut self.subs,
            TabKind::Cos => &mut self.cos,
        }
    }
}

/// Everything extracted for one permit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub permit: String,
    pub detail: FieldMap,
    pub inspection: Vec<RowMap>,
    pub reviews: Vec<RowMap>,
    pub permit_holds: Vec<RowMap>,
    pub fees: Vec<RowMap>,
    pub subs: Vec<RowMap>,
    pub cos: Vec<RowMap>,
}

impl Record {
    pub fn new(permit: impl Into<String>) -> Self {
        Self {
            permit: permit.into(),
            ..Self::default()
        }
    }

    pub fn rows(&self, kind: TabKind) -> &[RowMap] {
        match kind {
            TabKind::Inspection => &self.inspection,
            TabKind::Review => &self.reviews,
            TabKind::PermitHold => &self.permit_holds,
            TabKind::Fees => &self.fees,
            TabKind::Subs => &self.subs,
            TabKind::Cos => &self.cos,
        }
    }

    pub fn rows_mut(&mut self, kind: TabKind) -> &mut Vec<RowMap> {
        match kind {
            TabKind::Inspection => &mut self.inspection,
            TabKind::Review => &mut self.reviews,
            TabKind::PermitHold => &mut self.permit_holds,
            TabKind::Fees => &mut self.fees,
            TabKind::Subs => &mut self.subs,
            TabKind::Cos => &mut self.cos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_map_keeps_insertion_order() {
        let mut map = TextMap::new();
        map.insert("Zeta", "1");
        map.insert("Alpha", "2");
        map.insert("Zeta", "3");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
        assert_eq!(map.get("Zeta"), Some("3"));
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"Zeta":"3","Alpha":"2"}"#
        );
    }

    #[test]
    fn test_from_badges_maps_page_order() {
        let availability = TabAvailability::from_badges([1, 0, 2, 0, 0, 3]);
        assert_eq!(availability.review, Some(1));
        assert_eq!(availability.fees, Some(0));
        assert_eq!(availability.inspection, Some(2));
        assert_eq!(availability.subs, Some(0));
        assert_eq!(availability.cos, Some(0));
        assert_eq!(availability.permit_hold, Some(3));
        assert!(availability.is_available(TabKind::Review));
        assert!(!availability.is_available(TabKind::Fees));
    }

    #[test]
    fn test_unknown_availability_visits_nothing() {
        let availability = TabAvailability::unknown();
        assert!(availability.is_unknown());
        assert!(TabKind::VISIT_ORDER
            .iter()
            .all(|k| !availability.is_available(*k)));
    }

    #[test]
    fn test_following() {
        assert_eq!(
            TabKind::PermitHold.following().collect::<Vec<_>>(),
            vec![TabKind::Fees, TabKind::Subs, TabKind::Cos]
        );
        assert_eq!(TabKind::Cos.following().count(), 0);
    }

    #[test]
    fn test_record_serializes_fixed_keys() {
        let mut record = Record::new("BP-1");
        record.rows_mut(TabKind::PermitHold).push(TextMap::from_iter([("Hold", "Yes")]));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["permit"], "BP-1");
        assert_eq!(value["permit_holds"][0]["Hold"], "Yes");
        assert!(value["reviews"].as_array().unwrap().is_empty());
    }
}
