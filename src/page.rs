// 📄 Static page export
// MapOutcome + Summary → one self-contained HTML page (Leaflet map, counts, charts)

use crate::chart::BarChart;
use crate::map::{escape_html, MapOutcome};
use crate::summary::Summary;
use anyhow::{Context, Result};
use std::path::Path;

pub const PAGE_TITLE: &str = "한국 전통사찰 지도";

/// Shared Leaflet glue, also served to the browser by the web server
pub const MAP_JS: &str = include_str!("../web/map.js");

pub const LEAFLET_HEAD: &str = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"/>
<link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.css"/>
<link rel="stylesheet" href="https://netdna.bootstrapcdn.com/bootstrap/3.0.0/css/bootstrap-glyphicons.css"/>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script src="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.js"></script>"#;

/// JSON that is safe to drop inside a <script> element
pub fn script_json<T: serde::Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).context("Failed to serialize map data")?;
    Ok(json.replace("</", "<\\/"))
}

pub fn render_page(outcome: &MapOutcome, summary: &Summary) -> Result<String> {
    let map_section = match outcome {
        MapOutcome::Map(view) => format!(
            r#"<div id="map" style="height:600px"></div>
<script>
{js}
renderTempleMap("map", {data});
</script>
<p class="note">지도 밖 사찰 (좌표 없음): {skipped}</p>"#,
            js = MAP_JS,
            data = script_json(view)?,
            skipped = view.skipped,
        ),
        other => format!(
            r#"<div class="warning">{}</div>"#,
            escape_html(other.warning().unwrap_or_default())
        ),
    };

    let affiliation_chart = BarChart::by_affiliation(summary);
    let province_chart = BarChart::by_province(summary);

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="ko">
<head>
<meta charset="utf-8"/>
<title>{title}</title>
{head}
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
.warning {{ background: #fff3cd; border: 1px solid #ffe69c; padding: 1rem; }}
.note {{ color: #666; font-size: 0.9rem; }}
</style>
</head>
<body>
<h1>{title}</h1>
{map_section}
<h2>데이터 통계</h2>
<p>총 사찰 수: {total}</p>
<p>선택된 사찰 수: {filtered}</p>
<h2>{aff_title}</h2>
{aff_svg}
<h2>{prov_title}</h2>
{prov_svg}
</body>
</html>
"#,
        title = PAGE_TITLE,
        head = LEAFLET_HEAD,
        map_section = map_section,
        total = summary.total,
        filtered = summary.filtered,
        aff_title = escape_html(&affiliation_chart.title),
        aff_svg = affiliation_chart.to_svg(),
        prov_title = escape_html(&province_chart.title),
        prov_svg = province_chart.to_svg(),
    ))
}

pub fn write_page(path: &Path, outcome: &MapOutcome, summary: &Summary) -> Result<()> {
    let html = render_page(outcome, summary)?;
    std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, TempleRecord};
    use crate::map::{build_map, MapOptions, EMPTY_SELECTION_WARNING};
    use crate::selector::Selection;

    fn data() -> Dataset {
        Dataset::from_records(
            vec![
                TempleRecord::new("조계사", "조계종", Some(37.57), Some(126.98)).with_province("서울특별시"),
                TempleRecord::new("봉원사</script>", "태고종", Some(37.57), Some(126.94)).with_province("서울특별시"),
            ],
            "test",
        )
    }

    #[test]
    fn test_page_contains_map_and_charts() {
        let data = data();
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let summary = Summary::compute(&data, &Selection::All);
        let html = render_page(&outcome, &summary).unwrap();

        assert!(html.contains(r#"<div id="map""#));
        assert!(html.contains("renderTempleMap(\"map\""));
        assert!(html.contains("총 사찰 수: 2"));
        assert!(html.contains("종단별 사찰 수"));
        assert!(html.contains("시도별 사찰 수"));
        assert_eq!(html.matches("<svg").count(), 2);
    }

    #[test]
    fn test_embedded_json_cannot_close_script() {
        let data = data();
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let summary = Summary::compute(&data, &Selection::All);
        let html = render_page(&outcome, &summary).unwrap();

        assert!(!html.contains("봉원사</script>"));
    }

    #[test]
    fn test_empty_selection_page_shows_warning() {
        let data = data();
        let outcome = build_map(&data, &Selection::none(), &MapOptions::default());
        let summary = Summary::compute(&data, &Selection::none());
        let html = render_page(&outcome, &summary).unwrap();

        assert!(html.contains(EMPTY_SELECTION_WARNING));
        assert!(!html.contains(r#"<div id="map""#));
        assert!(html.contains("선택된 사찰 수: 0"));
    }

    #[test]
    fn test_write_page() {
        let data = data();
        let outcome = build_map(&data, &Selection::All, &MapOptions::default());
        let summary = Summary::compute(&data, &Selection::All);
        let path = std::env::temp_dir().join(format!("temple_map_page_{}.html", std::process::id()));

        write_page(&path, &outcome, &summary).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));

        std::fs::remove_file(&path).unwrap();
    }
}
