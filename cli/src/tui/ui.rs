use messbook_core::service::dto::{HouseSummaryDto, MemberRowDto};
use messbook_core::{MonthlySnapshot, StatsView};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Row, Table},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::tui::app::{App, InputMode, Message};

const NAME_WIDTH: usize = 16;

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(5), // Summary
            Constraint::Min(1),    // Members
            Constraint::Length(1), // Footer/Input
        ])
        .split(size);

    draw_header(f, app, main_chunks[0]);

    let snapshot = app.view.view.snapshot().cloned();
    match snapshot {
        Some(snapshot) if snapshot.month == app.month => {
            draw_summary(f, &snapshot, main_chunks[1]);
            draw_members(f, app, &snapshot, main_chunks[2]);
        }
        _ => {
            let loading = Paragraph::new("Loading...")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
            f.render_widget(loading, main_chunks[1]);
        }
    }

    draw_footer(f, app, main_chunks[3]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let badge = match (&app.view.view, app.view.refreshing) {
        _ if app.view.month != app.month => Span::styled(" LOADING ", Style::default().fg(Color::Black).bg(Color::DarkGray)),
        (StatsView::Loading, _) => Span::styled(" LOADING ", Style::default().fg(Color::Black).bg(Color::DarkGray)),
        (StatsView::StaleButAvailable(_), _) => Span::styled(" STALE ", Style::default().fg(Color::Black).bg(Color::Yellow)),
        (StatsView::Fresh(_), true) => Span::styled(" REFRESHING ", Style::default().fg(Color::Black).bg(Color::Blue)),
        (StatsView::Fresh(_), false) => Span::styled(" FRESH ", Style::default().fg(Color::Black).bg(Color::Green)),
    };

    let line = Line::from(vec![
        Span::styled("MESSBOOK", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  [{}]  ", app.entries.mess_id())),
        Span::styled("< ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.month.label(), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" >  ", Style::default().fg(Color::DarkGray)),
        badge,
    ]);

    let header = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(header, area);
}

fn draw_summary(f: &mut Frame, snapshot: &MonthlySnapshot, area: Rect) {
    let house = HouseSummaryDto::from_stats(&snapshot.house);
    let label = Style::default().fg(Color::Blue);

    let remaining_style = if snapshot.house.remaining_money < 0.0 {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Meals: ", label),
            Span::raw(format!("{:<10}", house.total_meal)),
            Span::styled("Bazar: ", label),
            Span::raw(format!("{:<12}", house.total_bazar)),
            Span::styled("Per meal: ", label),
            Span::styled(house.cost_per_meal, Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("Deposits: ", label),
            Span::raw(format!("{:<12}", house.total_deposit)),
            Span::styled("Guests: ", label),
            Span::raw(format!("{:<12}", house.total_guest_meal)),
            Span::styled("Remaining: ", label),
            Span::styled(house.remaining_money, remaining_style),
        ]),
        Line::from(vec![
            Span::styled("Common: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{:.2}  ", snapshot.house.total_common_expense)),
            Span::styled("Individual: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{:.2}", snapshot.house.total_individual_expense)),
        ]),
    ];

    let summary = Paragraph::new(text)
        .block(Block::default().title(" Summary ").borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(summary, area);
}

fn draw_members(f: &mut Frame, app: &mut App, snapshot: &MonthlySnapshot, area: Rect) {
    let rows: Vec<Row> = snapshot.members.iter().map(|stat| {
        let row = MemberRowDto::from_stat(stat);
        let balance_style = if row.owes {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Green)
        };

        Row::new(vec![
            Span::styled(truncate(&row.name, NAME_WIDTH), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(row.meal),
            Span::raw(row.deposit),
            Span::raw(row.common_charge),
            Span::raw(row.meal_cost),
            Span::raw(row.guest_meal_cost),
            Span::raw(row.total_cost),
            Span::styled(row.balance, balance_style),
        ])
    }).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(NAME_WIDTH as u16), // Name
            Constraint::Length(6),                 // Meals
            Constraint::Length(10),                // Deposit
            Constraint::Length(10),                // Common
            Constraint::Length(10),                // Meal cost
            Constraint::Length(10),                // Guest
            Constraint::Length(11),                // Total
            Constraint::Min(10),                   // Balance
        ]
    )
    .header(
        Row::new(vec!["Member", "Meals", "Deposit", "Common", "Meal cost", "Guest", "Total", "Balance"])
            .style(Style::default().fg(Color::Yellow)),
    )
    .block(Block::default().title(" Members ").borders(Borders::ALL).border_type(BorderType::Rounded))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let footer = match app.input_mode {
        InputMode::Adding => Paragraph::new(Line::from(vec![
            Span::styled("add> ", Style::default().fg(Color::Cyan)),
            Span::raw(app.input.as_str()),
        ])),
        InputMode::Normal => {
            let line = match (&app.message, &app.view.last_error) {
                (Some(Message::Error(e)), _) => Line::from(Span::styled(e.as_str(), Style::default().fg(Color::Red))),
                (_, Some(e)) => Line::from(Span::styled(format!("Refresh failed: {e}"), Style::default().fg(Color::Red))),
                (Some(Message::Info(info)), None) => Line::from(Span::styled(info.as_str(), Style::default().fg(Color::Green))),
                (None, None) => Line::from(Span::styled(
                    "h/l: Month | j/k: Navigate | r: Refresh | a: Add | q: Quit",
                    Style::default().fg(Color::DarkGray),
                )),
            };
            Paragraph::new(line).alignment(Alignment::Center)
        }
    };
    f.render_widget(footer, area);

    if let InputMode::Adding = app.input_mode {
        let prefix: usize = app.input.chars().take(app.cursor_position).map(|c| c.width().unwrap_or(0)).sum();
        f.set_cursor_position((area.x + 5 + prefix as u16, area.y));
    }
}

/// Cuts `name` to `max` display columns, marking the cut with an ellipsis.
fn truncate(name: &str, max: usize) -> String {
    if name.width() <= max {
        return name.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in name.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        out.push(c);
        width += w;
    }
    out.push('…');
    out
}
