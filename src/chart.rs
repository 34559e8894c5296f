// Bar chart model + SVG rendering for the two count charts

use crate::map::escape_html;
use crate::summary::{FrequencyTable, Summary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn from_table(title: &str, x_label: &str, y_label: &str, table: &FrequencyTable) -> Self {
        BarChart {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            bars: table
                .entries
                .iter()
                .map(|(label, value)| Bar {
                    label: label.clone(),
                    value: *value,
                })
                .collect(),
        }
    }

    /// 종단별 사찰 수
    pub fn by_affiliation(summary: &Summary) -> Self {
        Self::from_table("종단별 사찰 수", "종단", "사찰 수", &summary.by_affiliation)
    }

    /// 시도별 사찰 수
    pub fn by_province(summary: &Summary) -> Self {
        Self::from_table("시도별 사찰 수", "시도", "사찰 수", &summary.by_province)
    }

    pub fn max_value(&self) -> usize {
        self.bars.iter().map(|b| b.value).max().unwrap_or(0)
    }

    /// Render as a standalone SVG: one rect per category, height ∝ count
    pub fn to_svg(&self) -> String {
        let width = 680;
        let height = 320;
        let margin_left = 50;
        let margin_right = 20;
        let margin_top = 40;
        let margin_bottom = 90;
        let chart_width = width - margin_left - margin_right;
        let chart_height = height - margin_top - margin_bottom;

        let max_value = self.max_value().max(1);
        let slot = if self.bars.is_empty() {
            chart_width as f64
        } else {
            chart_width as f64 / self.bars.len() as f64
        };
        let bar_width = (slot * 0.8).max(1.0);

        let mut bars = String::new();
        let mut x_labels = String::new();

        for (i, bar) in self.bars.iter().enumerate() {
            let x = margin_left as f64 + i as f64 * slot + (slot - bar_width) / 2.0;
            let bar_height = bar.value as f64 / max_value as f64 * chart_height as f64;
            let y = (margin_top + chart_height) as f64 - bar_height;
            let label = escape_html(&bar.label);

            bars.push_str(&format!(
                r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="#636efa"><title>{}: {}</title></rect>"##,
                x, y, bar_width, bar_height, label, bar.value
            ));

            let cx = x + bar_width / 2.0;
            let ly = margin_top + chart_height + 12;
            x_labels.push_str(&format!(
                r##"<text x="{:.1}" y="{}" font-size="10" text-anchor="end" transform="rotate(-45 {:.1} {})">{}</text>"##,
                cx, ly, cx, ly, label
            ));
        }

        // y axis ticks at 0, 1/2, max
        let mut y_ticks = String::new();
        for frac in [0.0, 0.5, 1.0] {
            let value = (max_value as f64 * frac).round() as usize;
            let y = (margin_top + chart_height) as f64 - frac * chart_height as f64;
            y_ticks.push_str(&format!(
                r##"<text x="{}" y="{:.1}" font-size="10" text-anchor="end">{}</text><line x1="{}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="#e5e5e5"/>"##,
                margin_left - 6,
                y + 3.0,
                value,
                margin_left,
                y,
                width - margin_right,
                y
            ));
        }

        format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" style="background:white">
<text x="{tx}" y="22" font-size="15" font-weight="bold" text-anchor="middle">{title}</text>
{y_ticks}
{bars}
{x_labels}
<text x="{tx}" y="{xl_y}" font-size="12" text-anchor="middle">{x_label}</text>
<text x="14" y="{yl_y}" font-size="12" text-anchor="middle" transform="rotate(-90 14 {yl_y})">{y_label}</text>
</svg>"##,
            w = width,
            h = height,
            tx = width / 2,
            title = escape_html(&self.title),
            y_ticks = y_ticks,
            bars = bars,
            x_labels = x_labels,
            xl_y = height - 6,
            x_label = escape_html(&self.x_label),
            yl_y = margin_top + chart_height / 2,
            y_label = escape_html(&self.y_label),
        )
    }
}
