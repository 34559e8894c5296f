use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Map as WorldMap, MapResolution, Points},
        BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap,
    },
    Frame, Terminal,
};
use std::collections::BTreeSet;
use std::io;
use temple_map::{affiliations, build_map, Dataset, MapOptions, MapOutcome, Selection, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Affiliations,
    Map,
    Statistics,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Affiliations => Page::Map,
            Page::Map => Page::Statistics,
            Page::Statistics => Page::Affiliations,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Affiliations => Page::Statistics,
            Page::Map => Page::Affiliations,
            Page::Statistics => Page::Map,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Affiliations => "소속단체(종단)",
            Page::Map => "지도",
            Page::Statistics => "데이터 통계",
        }
    }
}

pub struct App {
    pub dataset: Dataset,
    pub options: MapOptions,
    /// Selectable affiliations in the current order
    pub universe: Vec<String>,
    pub selection: Selection,
    /// Overlay groups switched off in the layer control
    pub hidden_layers: BTreeSet<String>,
    pub outcome: MapOutcome,
    pub summary: Summary,
    pub current_page: Page,
    pub affiliation_state: TableState,
    pub layer_state: TableState,
}

impl App {
    pub fn new(dataset: Dataset, zoom: u8) -> Self {
        let options = MapOptions {
            zoom,
            ..MapOptions::default()
        };
        let universe = affiliations(&dataset.records, options.order);
        let selection = Selection::All;
        let outcome = build_map(&dataset, &selection, &options);
        let summary = Summary::compute(&dataset, &selection);

        let mut affiliation_state = TableState::default();
        if !universe.is_empty() {
            affiliation_state.select(Some(0));
        }

        let mut layer_state = TableState::default();
        layer_state.select(Some(0));

        Self {
            dataset,
            options,
            universe,
            selection,
            hidden_layers: BTreeSet::new(),
            outcome,
            summary,
            current_page: Page::Affiliations,
            affiliation_state,
            layer_state,
        }
    }

    /// Rebuild the derived views after any control changes
    fn refresh(&mut self) {
        self.outcome = build_map(&self.dataset, &self.selection, &self.options);
        self.summary = Summary::compute(&self.dataset, &self.selection);

        let group_count = self.outcome.view().map(|v| v.groups.len()).unwrap_or(0);
        match self.layer_state.selected() {
            Some(i) if i >= group_count => self
                .layer_state
                .select(if group_count == 0 { None } else { Some(group_count - 1) }),
            None if group_count > 0 => self.layer_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn highlighted_affiliation(&self) -> Option<&str> {
        self.affiliation_state
            .selected()
            .and_then(|i| self.universe.get(i))
            .map(String::as_str)
    }

    // ========================================================================
    // CONTROL HANDLERS
    // ========================================================================

    /// Space on the affiliation list
    pub fn toggle_affiliation(&mut self) {
        if let Some(affiliation) = self.highlighted_affiliation().map(str::to_string) {
            self.selection.toggle(&affiliation, &self.universe);
            self.refresh();
        }
    }

    /// '전체 종단 선택'
    pub fn select_all(&mut self) {
        self.selection = Selection::All;
        self.refresh();
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::none();
        self.refresh();
    }

    /// Switch between alphabetical and by-count ordering
    pub fn toggle_order(&mut self) {
        let highlighted = self.highlighted_affiliation().map(str::to_string);

        self.options.order = self.options.order.toggle();
        self.universe = affiliations(&self.dataset.records, self.options.order);

        // keep the cursor on the same affiliation
        if let Some(name) = highlighted {
            let index = self.universe.iter().position(|a| *a == name);
            self.affiliation_state.select(index.or(Some(0)));
        }
        self.refresh();
    }

    /// Space in the layer control: show/hide one overlay group
    pub fn toggle_layer(&mut self) {
        let Some(view) = self.outcome.view() else {
            return;
        };
        if let Some(group) = self.layer_state.selected().and_then(|i| view.groups.get(i)) {
            let name = group.name.clone();
            if !self.hidden_layers.remove(&name) {
                self.hidden_layers.insert(name);
            }
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active_rows(&self) -> (usize, &TableState) {
        match self.current_page {
            Page::Map => (
                self.outcome.view().map(|v| v.groups.len()).unwrap_or(0),
                &self.layer_state,
            ),
            _ => (self.universe.len(), &self.affiliation_state),
        }
    }

    fn select_row(&mut self, index: Option<usize>) {
        match self.current_page {
            Page::Map => self.layer_state.select(index),
            _ => self.affiliation_state.select(index),
        }
    }

    pub fn next(&mut self) {
        let (len, state) = self.active_rows();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.select_row(Some(i));
    }

    pub fn previous(&mut self) {
        let (len, state) = self.active_rows();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.select_row(Some(i));
    }

    /// Returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_page();
                } else {
                    self.next_page();
                }
            }
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('1') => self.current_page = Page::Affiliations,
            KeyCode::Char('2') => self.current_page = Page::Map,
            KeyCode::Char('3') => self.current_page = Page::Statistics,
            KeyCode::Char(' ') | KeyCode::Enter => match self.current_page {
                Page::Affiliations => self.toggle_affiliation(),
                Page::Map => self.toggle_layer(),
                Page::Statistics => {}
            },
            KeyCode::Char('a') => self.select_all(),
            KeyCode::Char('n') => self.clear_selection(),
            KeyCode::Char('o') => self.toggle_order(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Home => self.select_row(Some(0)),
            KeyCode::End => {
                let (len, _) = self.active_rows();
                if len > 0 {
                    self.select_row(Some(len - 1));
                }
            }
            _ => {}
        }
        false
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Affiliations => render_affiliations(f, chunks[1], app),
        Page::Map => render_map(f, chunks[1], app),
        Page::Statistics => render_statistics(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Affiliations, Page::Map, Page::Statistics];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(format!("{} {}", i + 1, page.title()), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("총 사찰 수: {}", app.summary.total),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("선택된 사찰 수: {}", app.summary.filtered),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" 한국 전통사찰 지도 "),
    );

    f.render_widget(header, area);
}

fn render_affiliations(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["", "소속단체(종단)", "사찰 수", "마커"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.universe.iter().map(|affiliation| {
        let checked = app.selection.contains(affiliation);
        let icon = app.options.style.icon_for(affiliation);
        let count = app.summary.by_affiliation.get(affiliation).unwrap_or(0);

        let mark = if checked {
            Cell::from("[x]").style(Style::default().fg(Color::Green))
        } else {
            Cell::from("[ ]").style(Style::default().fg(Color::DarkGray))
        };

        Row::new(vec![
            mark,
            Cell::from(truncate(affiliation, 28)),
            Cell::from(format!("{:>6}", count)),
            Cell::from(format!("● {}", icon.color)).style(Style::default().fg(marker_color(&icon.color))),
        ])
        .height(1)
    });

    let title = format!(
        " 표시할 소속단체(종단)를 선택하세요 ({}) ",
        app.options.order.label()
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(30),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.affiliation_state);
}

fn render_map(f: &mut Frame, area: Rect, app: &mut App) {
    let view = match &app.outcome {
        MapOutcome::Map(view) => view,
        other => {
            let warning = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("  ⚠ {}", other.warning().unwrap_or_default()),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from("  1 페이지에서 종단을 고르거나 'a' 로 전체 종단을 선택하세요."),
            ])
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(" 지도 "));
            f.render_widget(warning, area);
            return;
        }
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    // Bounds cover the whole dataset so toggling layers never moves the view
    let (min_lat, max_lat, min_lon, max_lon) = app.dataset.mappable().filter_map(|r| r.coordinates()).fold(
        (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
        |(a, b, c, d), (lat, lon)| (a.min(lat), b.max(lat), c.min(lon), d.max(lon)),
    );
    let pad = 0.5;

    let layers: Vec<(Color, Vec<(f64, f64)>)> = view
        .groups
        .iter()
        .filter(|g| !app.hidden_layers.contains(&g.name))
        .map(|g| {
            (
                marker_color(&g.icon.color),
                g.markers.iter().map(|m| (m.lon, m.lat)).collect(),
            )
        })
        .collect();
    let center = view.center;

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" 지도 (중심 {:.3}, {:.3}) ", center.0, center.1)),
        )
        .x_bounds([min_lon - pad, max_lon + pad])
        .y_bounds([min_lat - pad, max_lat + pad])
        .paint(|ctx| {
            ctx.draw(&WorldMap {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();
            for (color, coords) in &layers {
                ctx.draw(&Points {
                    coords: coords.as_slice(),
                    color: *color,
                });
            }
            ctx.print(center.1, center.0, Span::styled("+", Style::default().fg(Color::White)));
        });
    f.render_widget(canvas, chunks[0]);

    // Layer control
    let rows = view.groups.iter().map(|g| {
        let shown = !app.hidden_layers.contains(&g.name);
        let mark = if shown {
            Cell::from("[x]").style(Style::default().fg(Color::Green))
        } else {
            Cell::from("[ ]").style(Style::default().fg(Color::DarkGray))
        };
        Row::new(vec![
            mark,
            Cell::from(truncate(&g.name, 16)).style(Style::default().fg(marker_color(&g.icon.color))),
            Cell::from(format!("{:>5}", g.markers.len())),
        ])
    });

    let title = if view.skipped > 0 {
        format!(" 레이어 (좌표 없음 {}) ", view.skipped)
    } else {
        " 레이어 ".to_string()
    };

    let table = Table::new(
        rows,
        [Constraint::Length(4), Constraint::Min(10), Constraint::Length(6)],
    )
    .block(Block::default().borders(Borders::ALL).title(title))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.layer_state);
}

fn render_statistics(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Percentage(50),
            Constraint::Percentage(50),
        ])
        .split(area);

    let totals = Paragraph::new(vec![
        Line::from(vec![
            Span::raw(" 총 사찰 수: "),
            Span::styled(app.summary.total.to_string(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
            Span::raw("   선택된 사찰 수: "),
            Span::styled(app.summary.filtered.to_string(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::raw(" 좌표 없음: "),
            Span::styled(app.summary.unmappable.to_string(), Style::default().fg(Color::Red)),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title(" 데이터 통계 "));
    f.render_widget(totals, chunks[0]);

    render_bar_chart(f, chunks[1], " 종단별 사찰 수 ", &app.summary.by_affiliation.entries, Color::Cyan);
    render_bar_chart(f, chunks[2], " 시도별 사찰 수 ", &app.summary.by_province.entries, Color::Magenta);
}

fn render_bar_chart(f: &mut Frame, area: Rect, title: &str, entries: &[(String, usize)], color: Color) {
    let bar_width: u16 = 8;
    let bar_gap: u16 = 1;
    let fits = (area.width.saturating_sub(2) / (bar_width + bar_gap)).max(1) as usize;

    let data: Vec<(&str, u64)> = entries
        .iter()
        .take(fits)
        .map(|(label, count)| (label.as_str(), *count as u64))
        .collect();

    let title = if entries.len() > fits {
        format!("{}(상위 {}개) ", title, fits)
    } else {
        title.to_string()
    };

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .bar_width(bar_width)
        .bar_gap(bar_gap)
        .bar_style(Style::default().fg(color))
        .value_style(Style::default().fg(Color::Black).bg(color))
        .data(data.as_slice());

    f.render_widget(chart, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.current_page.title()),
        Style::default().fg(Color::Cyan),
    )];

    if app.selection.is_empty() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("선택 없음", Style::default().fg(Color::Red)));
    }

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    status_spans.push(Span::raw(" | "));
    match app.current_page {
        Page::Affiliations => {
            status_spans.push(key("Space"));
            status_spans.push(Span::raw(" 선택 | "));
            status_spans.push(key("a"));
            status_spans.push(Span::raw(" 전체 | "));
            status_spans.push(key("n"));
            status_spans.push(Span::raw(" 해제 | "));
            status_spans.push(key("o"));
            status_spans.push(Span::raw(" 정렬 | "));
        }
        Page::Map => {
            status_spans.push(key("Space"));
            status_spans.push(Span::raw(" 레이어 | "));
        }
        Page::Statistics => {}
    }
    status_spans.push(key("Tab"));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(key("↑/↓"));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Leaflet marker color name → terminal color
fn marker_color(name: &str) -> Color {
    match name {
        "red" | "darkred" => Color::Red,
        "blue" | "darkblue" => Color::Blue,
        "green" | "darkgreen" => Color::Green,
        "orange" => Color::LightRed,
        "purple" | "darkpurple" => Color::Magenta,
        "cadetblue" => Color::Cyan,
        _ => Color::White,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
