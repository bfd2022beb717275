mod theme;

use crate::app::{AppModel, View};
use crate::domain::{
    DailySummary, NO_SESSION_TEXT, SessionType, format_hours_minutes, format_stopwatch,
    goal_percent, is_warn, remaining,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use time::Duration;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const TIMER_HELP: &str = "w: work • b: break • l: long break • r: reset • q: quit";
const STATUS_HELP: &str = "q: quit";

pub fn render(frame: &mut Frame, model: &AppModel) {
    let area = layout_area(frame.area(), model.terminal_size);
    if area.width == 0 || area.height == 0 {
        return;
    }

    match &model.view {
        View::Timer => render_timer(frame, area, model),
        View::Status(summary) => render_status(frame, area, model, summary),
    }
}

fn render_timer(frame: &mut Frame, area: Rect, model: &AppModel) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(5),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .split(area);
    let clock_area = centered_width(chunks[1], 44);

    let Some(session) = model.running_session() else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::BORDER));
        let paragraph = Paragraph::new(vec![Line::from(""), Line::from(NO_SESSION_TEXT)])
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme::MUTED))
            .block(block);
        frame.render_widget(paragraph, clock_area);
        render_footer(frame, chunks[2], chunks[3], model, TIMER_HELP);
        return;
    };

    let left = remaining(session, model.now);
    let color = clock_color(session.kind, left, model);
    let clock = format!("{} {}", model.prefix, format_stopwatch(left));

    let mut title = format!(" {} ", session.kind.label());
    if !session.context_tag.is_empty() {
        let budget = usize::from(clock_area.width)
            .saturating_sub(UnicodeWidthStr::width(title.as_str()) + 6);
        title.push_str(&format!(
            "· {} ",
            truncate_to_width(&session.context_tag, budget)
        ));
    }

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            clock,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(paragraph, clock_area);

    render_footer(frame, chunks[2], chunks[3], model, TIMER_HELP);
}

fn clock_color(kind: SessionType, left: Duration, model: &AppModel) -> Color {
    if left <= Duration::ZERO {
        theme::OVERRUN
    } else if is_warn(left, model.settings.countdown.warn_threshold) {
        theme::WARN
    } else if kind.is_rest() {
        theme::REST
    } else {
        theme::WORK
    }
}

fn render_status(frame: &mut Frame, area: Rect, model: &AppModel, summary: &DailySummary) {
    let area = inner_area(area);
    let contexts = summary.top_contexts(5);
    let contexts_height = if contexts.is_empty() {
        0
    } else {
        u16::try_from(contexts.len()).unwrap_or(5) + 2
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(contexts_height),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let sessions = SessionType::ALL
        .into_iter()
        .map(|kind| {
            Line::from(vec![
                Span::styled(format!("{:<12}", kind.label()), Style::default().fg(theme::MUTED)),
                Span::styled(
                    format_hours_minutes(summary.total_for(kind)),
                    Style::default().fg(theme::FG),
                ),
            ])
        })
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(sessions).block(
            Block::default()
                .title(format!(" Sessions Today ({}) ", summary.session_count))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::BORDER))
                .padding(Padding::horizontal(1)),
        ),
        chunks[0],
    );

    let goals_block = Block::default()
        .title(" Goals ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .padding(Padding::new(1, 1, 1, 0));
    let goals_area = goals_block.inner(chunks[1]);
    frame.render_widget(goals_block, chunks[1]);

    let goal_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(goals_area);
    let goals = &model.settings.goals;
    render_goal(frame, goal_rows[0], goal_rows[1], "Work", summary.work(), goals.work, theme::WORK);
    render_goal(frame, goal_rows[3], goal_rows[4], "Rest", summary.rest(), goals.rest, theme::REST);

    if !contexts.is_empty() {
        let lines = contexts
            .into_iter()
            .map(|(tag, spent)| {
                Line::from(vec![
                    Span::styled(
                        format!("{:>7}  ", format_hours_minutes(spent)),
                        Style::default().fg(theme::FG),
                    ),
                    Span::styled(
                        truncate_to_width(tag, usize::from(chunks[2].width).saturating_sub(13)),
                        Style::default().fg(theme::MUTED),
                    ),
                ])
            })
            .collect::<Vec<_>>();
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .title(" Contexts ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme::BORDER))
                    .padding(Padding::horizontal(1)),
            ),
            chunks[2],
        );
    }

    render_footer(frame, chunks[4], chunks[5], model, STATUS_HELP);
}

fn render_goal(
    frame: &mut Frame,
    label_area: Rect,
    gauge_area: Rect,
    label: &str,
    actual: Duration,
    goal: Duration,
    color: Color,
) {
    let percent = goal_percent(actual, goal);
    let text = format!(
        "{label}: {} / {}  =>  {percent:.2}%",
        format_hours_minutes(actual),
        format_hours_minutes(goal)
    );
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(theme::FG)),
        label_area,
    );

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(color).bg(theme::GAUGE_BG))
        .ratio((percent / 100.0).clamp(0.0, 1.0))
        .label("");
    frame.render_widget(gauge, gauge_area);
}

fn render_footer(frame: &mut Frame, help_area: Rect, notice_area: Rect, model: &AppModel, help: &str) {
    frame.render_widget(
        Paragraph::new(help)
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme::DIM)),
        help_area,
    );
    if let Some(notice) = &model.notice {
        frame.render_widget(
            Paragraph::new(notice.as_str())
                .alignment(Alignment::Center)
                .style(Style::default().fg(theme::OVERRUN)),
            notice_area,
        );
    }
}

/// The last size the terminal reported, clipped to the frame; `(0, 0)` means
/// no size has been reported yet.
fn layout_area(frame_area: Rect, (width, height): (u16, u16)) -> Rect {
    if width == 0 || height == 0 {
        return frame_area;
    }
    frame_area.intersection(Rect::new(frame_area.x, frame_area.y, width, height))
}

fn inner_area(area: Rect) -> Rect {
    if area.width < 40 || area.height < 12 {
        return area;
    }
    area.inner(Margin {
        vertical: 1,
        horizontal: 2,
    })
}

fn centered_width(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y,
        width,
        height: area.height,
    }
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width + 1 > max_width {
            break;
        }
        out.push(ch);
        used += width;
    }
    out.push('…');
    out
}
