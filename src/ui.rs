use anyhow::Result;
use club_dashboard::kpi::{FinancialKpis, MemberKpis, Overview};
use club_dashboard::scenario::ScenarioProjection;
use club_dashboard::{
    Config, Country, KpiAggregator, Member, MemberFilter, Outcome, ReportPeriod, Scenario,
    ScenarioForecaster, Store,
};
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Scenarios,
    Kpis,
    Members,
}

impl Page {
    const ALL: [Page; 4] = [Page::Overview, Page::Scenarios, Page::Kpis, Page::Members];

    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Scenarios,
            Page::Scenarios => Page::Kpis,
            Page::Kpis => Page::Members,
            Page::Members => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Members,
            Page::Scenarios => Page::Overview,
            Page::Kpis => Page::Scenarios,
            Page::Members => Page::Kpis,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Scenarios => "Scenarios",
            Page::Kpis => "KPIs",
            Page::Members => "Members",
        }
    }
}

/// Everything the pages show, loaded once at startup
pub struct Snapshot {
    pub as_of: NaiveDate,
    pub overview: Option<Overview>,
    pub projections: Vec<Outcome<ScenarioProjection>>,
    pub member_kpis: Option<MemberKpis>,
    pub financial_kpis: Option<FinancialKpis>,
    pub members: Vec<Member>,
    /// Load failures, shown on the overview page
    pub errors: Vec<String>,
}

impl Snapshot {
    pub fn load(store: &Store, config: &Config, as_of: NaiveDate) -> Snapshot {
        let mut errors = Vec::new();
        let kpis = KpiAggregator::new(store, config, as_of);

        let overview = kpis.overview().map_err(|e| errors.push(format!("overview: {}", e))).ok();
        let member_kpis = kpis
            .member_kpis(ReportPeriod::AllTime)
            .map_err(|e| errors.push(format!("member KPIs: {}", e)))
            .ok();
        let financial_kpis = kpis
            .financial_kpis(ReportPeriod::LastYear)
            .map_err(|e| errors.push(format!("financial KPIs: {}", e)))
            .ok();

        let forecaster = ScenarioForecaster::new(store, config, as_of);
        let projections = forecaster
            .plan(&config.into(), &config.into())
            .unwrap_or_else(|e| {
                errors.push(format!("forecast: {}", e));
                Vec::new()
            });

        let members = store
            .query_members(&MemberFilter::default())
            .unwrap_or_else(|e| {
                errors.push(format!("members: {}", e));
                Vec::new()
            });

        Snapshot {
            as_of,
            overview,
            projections,
            member_kpis,
            financial_kpis,
            members,
            errors,
        }
    }
}

pub struct App {
    pub data: Snapshot,
    pub current_page: Page,
    pub scenario_index: usize,
    pub members_state: TableState,
}

impl App {
    pub fn new(data: Snapshot) -> Self {
        let mut members_state = TableState::default();
        if !data.members.is_empty() {
            members_state.select(Some(0));
        }

        // Realistic first
        Self {
            data,
            current_page: Page::Overview,
            scenario_index: 1,
            members_state,
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next_scenario(&mut self) {
        self.scenario_index = (self.scenario_index + 1) % Scenario::ALL.len();
    }

    pub fn previous_scenario(&mut self) {
        self.scenario_index = (self.scenario_index + Scenario::ALL.len() - 1) % Scenario::ALL.len();
    }

    pub fn selected_projection(&self) -> Option<&Outcome<ScenarioProjection>> {
        self.data.projections.get(self.scenario_index)
    }

    pub fn next(&mut self) {
        let len = self.data.members.len();
        if len == 0 {
            return;
        }
        let i = match self.members_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.members_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.data.members.len();
        if len == 0 {
            return;
        }
        let i = match self.members_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.members_state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
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
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Right | KeyCode::Char('l') if app.current_page == Page::Scenarios => {
                    app.next_scenario()
                }
                KeyCode::Left | KeyCode::Char('h') if app.current_page == Page::Scenarios => {
                    app.previous_scenario()
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
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
        Page::Overview => render_overview(f, chunks[1], app),
        Page::Scenarios => render_scenarios(f, chunks[1], app),
        Page::Kpis => render_kpis(f, chunks[1], app),
        Page::Members => render_members(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn money(value: f64) -> String {
    format!("€{:.2}", value)
}

fn provenance_span<T>(outcome: &Outcome<T>) -> Span<'static> {
    let color = match outcome {
        Outcome::Observed { .. } => Color::Green,
        Outcome::Fallback { .. } => Color::Yellow,
        Outcome::Unavailable { .. } => Color::Red,
    };
    let text = match outcome.reason() {
        Some(reason) => format!("[{}: {}]", outcome.label(), reason),
        None => format!("[{}]", outcome.label()),
    };
    Span::styled(text, Style::default().fg(color))
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
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

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("As of {}", app.data.as_of),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Members: {}", app.data.members.len()),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Club Overview",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    match &app.data.overview {
        Some(overview) => {
            let cash_color = if overview.cash_position >= 0.0 {
                Color::Green
            } else {
                Color::Red
            };
            content.push(Line::from(format!("  Active members:     {}", overview.active_members)));
            content.push(Line::from(format!("  Revenue this month: {}", money(overview.month_revenue))));
            content.push(Line::from(vec![
                Span::raw("  Cash position:      "),
                Span::styled(money(overview.cash_position), Style::default().fg(cash_color)),
            ]));
            content.push(Line::from(""));
            content.push(Line::from(Span::styled("  Revenue distribution", header_style())));
            for share in &overview.revenue_distribution {
                content.push(Line::from(format!(
                    "    {:<16} {}",
                    share.transaction_type.as_str(),
                    money(share.amount)
                )));
            }
        }
        None => content.push(Line::from("  Overview unavailable")),
    }

    if let Some(kpis) = &app.data.member_kpis {
        content.push(Line::from(""));
        content.push(Line::from(Span::styled("  Members per country", header_style())));
        for country in Country::ALL {
            content.push(Line::from(format!(
                "    {:<12} {:>6.0}",
                country.as_str(),
                kpis.distribution.get(country)
            )));
        }
    }

    for error in &app.data.errors {
        content.push(Line::from(Span::styled(
            format!("  ⚠ {}", error),
            Style::default().fg(Color::Red),
        )));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Overview "),
    );
    f.render_widget(paragraph, area);
}

fn render_scenarios(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let scenario = Scenario::ALL[app.scenario_index];
    let Some(outcome) = app.selected_projection() else {
        let empty = Paragraph::new("  No projection available")
            .block(Block::default().borders(Borders::ALL).title(" Scenarios "));
        f.render_widget(empty, area);
        return;
    };

    let mut summary = vec![Line::from(vec![
        Span::styled(format!("  {} ", scenario.as_str().to_uppercase()), header_style()),
        provenance_span(outcome),
    ])];

    let Some(projection) = outcome.value() else {
        f.render_widget(
            Paragraph::new(summary).block(Block::default().borders(Borders::ALL).title(" Scenarios ")),
            area,
        );
        return;
    };

    summary.push(Line::from(format!(
        "  Expenses/yr {}  (marketing {}, salaries {}, events {}, operations {})",
        money(projection.expenses.total()),
        money(projection.expenses.marketing),
        money(projection.expenses.salaries),
        money(projection.expenses.events),
        money(projection.expenses.operations),
    )));
    for alert in projection.alerts() {
        summary.push(Line::from(Span::styled(
            format!("  ⚠ {}", alert),
            Style::default().fg(Color::Red),
        )));
    }

    f.render_widget(
        Paragraph::new(summary).block(Block::default().borders(Borders::ALL).title(" Scenarios ")),
        chunks[0],
    );

    let header_cells = ["Month", "NL", "BE", "DE", "Members", "Revenue", "Net", "Cumulative"]
        .iter()
        .map(|h| Cell::from(*h).style(header_style()));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = projection
        .revenue
        .iter()
        .zip(&projection.cashflow)
        .map(|(rev, cash)| {
            let color = if cash.cumulative_cashflow >= 0.0 {
                Color::Green
            } else {
                Color::Red
            };
            Row::new(vec![
                Cell::from(rev.period.format("%Y-%m").to_string()),
                Cell::from(format!("{:.1}", rev.members.netherlands)),
                Cell::from(format!("{:.1}", rev.members.belgium)),
                Cell::from(format!("{:.1}", rev.members.germany)),
                Cell::from(format!("{:.1}", rev.total_members)),
                Cell::from(money(rev.total_revenue)),
                Cell::from(money(cash.net_cashflow)),
                Cell::from(money(cash.cumulative_cashflow)).style(Style::default().fg(color)),
            ])
        });

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" 12-Month Projection (←/→ scenario) "),
    );

    f.render_widget(table, chunks[1]);
}

fn render_kpis(f: &mut Frame, area: Rect, app: &App) {
    let mut content = vec![Line::from("")];

    match &app.data.member_kpis {
        Some(kpis) => {
            content.push(Line::from(Span::styled("  Members (all time)", header_style())));
            content.push(Line::from(format!(
                "    Total {}  Active {}  Retention {:.1}%",
                kpis.total_members, kpis.active_members, kpis.retention_rate
            )));
            content.push(Line::from(format!(
                "    New members {}  Growth {:.1}%  Growth change {:+.1}%",
                kpis.new_members, kpis.growth_rate, kpis.growth_rate_change
            )));
        }
        None => content.push(Line::from("  Member KPIs unavailable")),
    }

    content.push(Line::from(""));
    match &app.data.financial_kpis {
        Some(kpis) => {
            content.push(Line::from(Span::styled("  Finance (last year)", header_style())));
            content.push(Line::from(format!(
                "    Revenue {}  Expenses {}  Operating margin {:.1}%",
                money(kpis.revenue),
                money(kpis.expenses),
                kpis.operating_margin
            )));
            content.push(Line::from(format!(
                "    Revenue per member {}",
                kpis.revenue_per_member.map(money).unwrap_or_else(|| "-".to_string())
            )));
            content.push(Line::from(""));
            content.push(Line::from(Span::styled("  Cash flow by month", header_style())));
            for month in &kpis.cashflow {
                let color = if month.net >= 0.0 { Color::Green } else { Color::Red };
                content.push(Line::from(vec![
                    Span::raw(format!("    {}  ", month.month.format("%Y-%m"))),
                    Span::styled(format!("{:>12}", money(month.net)), Style::default().fg(color)),
                    Span::raw(format!("  cumulative {}", money(month.cumulative))),
                ]));
            }
        }
        None => content.push(Line::from("  Financial KPIs unavailable")),
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" KPIs "),
    );
    f.render_widget(paragraph, area);
}

fn render_members(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Name", "Email", "Country", "Joined", "Type", "Status"]
        .iter()
        .map(|h| Cell::from(*h).style(header_style()));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.data.members.iter().map(|m| {
        let (status, color) = if m.active {
            ("active", Color::Green)
        } else {
            ("inactive", Color::Red)
        };
        Row::new(vec![
            Cell::from(truncate(&m.name, 24)),
            Cell::from(truncate(&m.email, 30)),
            Cell::from(m.country.as_str()),
            Cell::from(m.join_date.to_string()),
            Cell::from(format!("{:?}", m.membership_type)),
            Cell::from(status).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(32),
            Constraint::Length(13),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Members "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.members_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.current_page.title()),
        Style::default().fg(Color::Cyan),
    )];

    if app.current_page == Page::Members {
        let selected = app.members_state.selected().map(|i| i + 1).unwrap_or(0);
        status_spans.push(Span::raw(format!("Row: {}/{} | ", selected, app.data.members.len())));
        status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Nav | "));
    }
    if app.current_page == Page::Scenarios {
        status_spans.push(Span::styled("←/→", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Scenario | "));
    }

    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
