// 🗺️ Map Builder
// Selected records → styled markers, one overlay group per affiliation

use crate::config::DEFAULT_ZOOM;
use crate::dataset::{Dataset, TempleRecord};
use crate::selector::{affiliations, AffiliationOrder, Selection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const EMPTY_SELECTION_WARNING: &str = "하나 이상의 소속단체(종단)를 선택해주세요.";
pub const NO_COORDINATES_WARNING: &str = "좌표가 있는 사찰이 없어 지도를 만들 수 없습니다.";

pub const POPUP_MAX_WIDTH: u32 = 300;

// ============================================================================
// STYLE
// ============================================================================

/// Marker icon: Leaflet color name + glyph name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerIcon {
    pub color: String,
    pub glyph: String,
}

impl MarkerIcon {
    pub fn new(color: &str, glyph: &str) -> Self {
        MarkerIcon {
            color: color.to_string(),
            glyph: glyph.to_string(),
        }
    }
}

/// Color lookup table keyed by affiliation, with an explicit fallback
#[derive(Debug, Clone)]
pub struct MarkerStyle {
    table: HashMap<String, MarkerIcon>,
    fallback: MarkerIcon,
}

impl MarkerStyle {
    pub fn new(fallback: MarkerIcon) -> Self {
        MarkerStyle {
            table: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, affiliation: &str, icon: MarkerIcon) -> Self {
        self.table.insert(affiliation.to_string(), icon);
        self
    }

    pub fn icon_for(&self, affiliation: &str) -> &MarkerIcon {
        self.table.get(affiliation).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &MarkerIcon {
        &self.fallback
    }
}

impl Default for MarkerStyle {
    /// 조계종 red, 태고종 blue, everyone else green
    fn default() -> Self {
        MarkerStyle::new(MarkerIcon::new("green", "leaf"))
            .with("조계종", MarkerIcon::new("red", "info-sign"))
            .with("태고종", MarkerIcon::new("blue", "cloud"))
    }
}

// ============================================================================
// MAP MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub affiliation: String,
    pub lat: f64,
    pub lon: f64,
    pub tooltip: String,
    /// Pre-escaped HTML
    pub popup: String,
    pub popup_max_width: u32,
    pub icon: MarkerIcon,
}

/// Togglable layer of markers sharing one affiliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayGroup {
    pub name: String,
    /// HTML-escaped name for the layer control
    pub label: String,
    pub icon: MarkerIcon,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// (lat, lon) mean over the whole dataset, not just the selection
    pub center: (f64, f64),
    pub zoom: u8,
    pub groups: Vec<OverlayGroup>,
    pub layer_control: bool,
    /// Selected records left off for lack of coordinates
    pub skipped: usize,
}

impl MapView {
    pub fn marker_count(&self) -> usize {
        self.groups.iter().map(|g| g.markers.len()).sum()
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.groups.iter().flat_map(|g| g.markers.iter())
    }

    pub fn group(&self, name: &str) -> Option<&OverlayGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MapOutcome {
    Map(MapView),
    /// Nothing selected: no map, just the warning
    Empty { warning: String },
    /// Nothing in the dataset has coordinates, so there is no center
    NoCoordinates { warning: String },
}

impl MapOutcome {
    pub fn view(&self) -> Option<&MapView> {
        match self {
            MapOutcome::Map(view) => Some(view),
            _ => None,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            MapOutcome::Map(_) => None,
            MapOutcome::Empty { warning } | MapOutcome::NoCoordinates { warning } => Some(warning),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapOptions {
    pub zoom: u8,
    pub style: MarkerStyle,
    /// Order of overlay groups (and of the layer control)
    pub order: AffiliationOrder,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            zoom: DEFAULT_ZOOM,
            style: MarkerStyle::default(),
            order: AffiliationOrder::Alphabetical,
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Arithmetic mean of every mappable record's coordinates
pub fn center_of(records: &[TempleRecord]) -> Option<(f64, f64)> {
    let (sum_lat, sum_lon, n) = records
        .iter()
        .filter_map(|r| r.coordinates())
        .fold((0.0, 0.0, 0usize), |(la, lo, n), (lat, lon)| (la + lat, lo + lon, n + 1));

    if n == 0 {
        None
    } else {
        Some((sum_lat / n as f64, sum_lon / n as f64))
    }
}

pub fn build_map(dataset: &Dataset, selection: &Selection, options: &MapOptions) -> MapOutcome {
    if selection.is_empty() {
        return MapOutcome::Empty {
            warning: EMPTY_SELECTION_WARNING.to_string(),
        };
    }

    let center = match center_of(&dataset.records) {
        Some(center) => center,
        None => {
            return MapOutcome::NoCoordinates {
                warning: NO_COORDINATES_WARNING.to_string(),
            }
        }
    };

    let universe = affiliations(&dataset.records, options.order);
    let mut groups: Vec<OverlayGroup> = selection
        .resolve(&universe)
        .into_iter()
        .map(|name| OverlayGroup {
            icon: options.style.icon_for(&name).clone(),
            label: escape_html(&name),
            name,
            markers: Vec::new(),
        })
        .collect();
    let slot: HashMap<String, usize> = groups
        .iter()
        .enumerate()
        .map(|(i, g)| (g.name.clone(), i))
        .collect();

    let mut skipped: usize = 0;
    for record in selection.filter(&dataset.records) {
        let Some((lat, lon)) = record.coordinates() else {
            skipped += 1;
            continue;
        };
        if let Some(&i) = slot.get(&record.affiliation) {
            let icon = groups[i].icon.clone();
            groups[i].markers.push(Marker {
                name: record.name.clone(),
                affiliation: record.affiliation.clone(),
                lat,
                lon,
                tooltip: escape_html(&record.name),
                popup: popup_html(record),
                popup_max_width: POPUP_MAX_WIDTH,
                icon,
            });
        }
    }

    groups.retain(|g| !g.markers.is_empty());

    if skipped > 0 {
        tracing::debug!(skipped, "selected records without coordinates");
    }

    MapOutcome::Map(MapView {
        center,
        zoom: options.zoom,
        groups,
        layer_control: true,
        skipped,
    })
}

/// Popup body listing every attribute of the record
pub fn popup_html(record: &TempleRecord) -> String {
    let coord = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

    let rows = [
        ("사찰명", escape_html(&record.name)),
        ("구분", escape_html(&record.kind)),
        ("시도", escape_html(&record.province)),
        ("상세주소", escape_html(&record.address)),
        ("위도", coord(record.latitude)),
        ("경도", coord(record.longitude)),
        ("소속단체(종단)", escape_html(&record.affiliation)),
    ];

    rows.iter()
        .map(|(label, value)| format!("<b>{}:</b> {}", label, value))
        .collect::<Vec<_>>()
        .join("<br>")
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: &[(&str, Option<f64>, Option<f64>)]) -> Dataset {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, (aff, lat, lon))| TempleRecord::new(&format!("절{}", i), aff, *lat, *lon))
            .collect();
        Dataset::from_records(records, "test")
    }

    fn abc() -> Dataset {
        dataset(&[
            ("A", Some(1.0), Some(1.0)),
            ("B", Some(2.0), Some(2.0)),
            ("A", Some(3.0), Some(3.0)),
        ])
    }

    #[test]
    fn test_worked_example() {
        let data = abc();
        let outcome = build_map(&data, &Selection::only(["A"]), &MapOptions::default());
        let view = outcome.view().expect("map should be built");

        assert_eq!(view.marker_count(), 2);
        assert_eq!(view.center, (2.0, 2.0));
        assert!(view.markers().all(|m| m.affiliation == "A"));
        assert!(view.markers().all(|m| m.icon == *MarkerStyle::default().icon_for("A")));
    }

    #[test]
    fn test_center_ignores_selection() {
        let data = dataset(&[
            ("A", Some(10.0), Some(100.0)),
            ("B", Some(20.0), Some(120.0)),
        ]);

        for selection in [Selection::All, Selection::only(["A"]), Selection::only(["B"])] {
            let outcome = build_map(&data, &selection, &MapOptions::default());
            assert_eq!(outcome.view().unwrap().center, (15.0, 110.0));
        }
    }

    #[test]
    fn test_select_all_maps_every_mappable_record() {
        let data = dataset(&[
            ("A", Some(1.0), Some(1.0)),
            ("B", None, Some(2.0)),
            ("C", Some(3.0), Some(3.0)),
            ("A", Some(4.0), None),
        ]);
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let view = outcome.view().unwrap();

        assert_eq!(view.marker_count(), data.mappable().count());
        assert_eq!(view.skipped, 2);
        assert_eq!(view.center, (2.0, 2.0));
    }

    #[test]
    fn test_empty_selection_warns() {
        let outcome = build_map(&abc(), &Selection::none(), &MapOptions::default());

        assert!(outcome.view().is_none());
        assert_eq!(outcome.warning(), Some(EMPTY_SELECTION_WARNING));
    }

    #[test]
    fn test_no_coordinates_warns() {
        let data = dataset(&[("A", None, None), ("B", Some(1.0), None)]);
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());

        assert!(matches!(outcome, MapOutcome::NoCoordinates { .. }));
    }

    #[test]
    fn test_one_group_per_affiliation() {
        let data = dataset(&[
            ("조계종", Some(1.0), Some(1.0)),
            ("태고종", Some(2.0), Some(2.0)),
            ("조계종", Some(3.0), Some(3.0)),
            ("천태종", Some(4.0), Some(4.0)),
        ]);
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let view = outcome.view().unwrap();

        let names: Vec<&str> = view.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["조계종", "천태종", "태고종"]);
        assert_eq!(view.group("조계종").unwrap().markers.len(), 2);
        assert!(view.layer_control);
    }

    #[test]
    fn test_group_order_follows_frequency() {
        let data = dataset(&[
            ("A", Some(1.0), Some(1.0)),
            ("B", Some(2.0), Some(2.0)),
            ("B", Some(3.0), Some(3.0)),
        ]);
        let options = MapOptions {
            order: AffiliationOrder::ByFrequency,
            ..MapOptions::default()
        };
        let outcome = build_map(&data, &Selection::All, &options);
        let names: Vec<&str> = outcome.view().unwrap().groups.iter().map(|g| g.name.as_str()).collect();

        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_group_without_coordinates_is_dropped() {
        let data = dataset(&[("A", Some(1.0), Some(1.0)), ("B", None, None)]);
        let outcome = build_map(&data, &Selection::only(["A", "B"]), &MapOptions::default());
        let view = outcome.view().unwrap();

        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.skipped, 1);
    }

    #[test]
    fn test_default_style_table() {
        let style = MarkerStyle::default();

        assert_eq!(style.icon_for("조계종"), &MarkerIcon::new("red", "info-sign"));
        assert_eq!(style.icon_for("태고종"), &MarkerIcon::new("blue", "cloud"));
        assert_eq!(style.icon_for("천태종"), &MarkerIcon::new("green", "leaf"));
        assert_eq!(style.icon_for(""), style.fallback());
    }

    #[test]
    fn test_marker_popup_and_tooltip() {
        let record = TempleRecord::new("불국사", "조계종", Some(35.79), Some(129.332))
            .with_kind("전통사찰")
            .with_province("경상북도")
            .with_address("경주시 <불국로> 385");
        let data = Dataset::from_records(vec![record], "test");
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let marker = outcome.view().unwrap().markers().next().unwrap().clone();

        assert_eq!(marker.tooltip, "불국사");
        assert_eq!(marker.popup_max_width, 300);
        assert!(marker.popup.contains("<b>사찰명:</b> 불국사"));
        assert!(marker.popup.contains("<b>시도:</b> 경상북도"));
        assert!(marker.popup.contains("&lt;불국로&gt;"));
        assert!(marker.popup.contains("<b>위도:</b> 35.79"));
        assert!(marker.popup.contains("<b>소속단체(종단):</b> 조계종"));
    }

    #[test]
    fn test_group_label_is_escaped() {
        let data = dataset(&[("<b>선종</b> & 교종", Some(1.0), Some(1.0))]);
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let group = &outcome.view().unwrap().groups[0];

        assert_eq!(group.name, "<b>선종</b> & 교종");
        assert_eq!(group.label, "&lt;b&gt;선종&lt;/b&gt; &amp; 교종");
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = build_map(&abc(), &Selection::none(), &MapOptions::default());
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "empty");
        assert_eq!(json["warning"], EMPTY_SELECTION_WARNING);
    }
}
