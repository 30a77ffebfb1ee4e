use chrono::Duration;
use ratatui::{prelude::*, widgets::*};

use crate::{
    app::{break_actions, task_actions, Action, AppState, Mode},
    timer::{Completion, PhaseKind, Pomodoro},
};

const RUNNING_COLOR: Color = Color::Green;
const PAUSED_COLOR: Color = Color::Magenta;
const BORDER_COLOR: Color = Color::Rgb(0, 200, 255);
const ACCENT_COLOR: Color = Color::Rgb(255, 100, 0);

// ============================================================================
// Labels
// ============================================================================

/// `MM:SS`, never negative.
pub fn format_mmss(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Text drawn over the progress gauge, e.g. `[PAUSED] Write report / 12:30`.
pub fn progress_label(p: &Pomodoro) -> Option<String> {
    let remaining = format_mmss(p.remaining()?);
    let prefix = if p.kind().is_paused() { "[PAUSED] " } else { "" };
    let subject = match p.active_task() {
        Some(task) => task.title.as_str(),
        None => "BREAK TIME",
    };
    Some(format!("{}{} / {}", prefix, subject, remaining))
}

/// `elapsed/total`, e.g. `05:00/25:00`.
pub fn fraction_label(p: &Pomodoro) -> Option<String> {
    Some(format!("{}/{}", format_mmss(p.elapsed()?), format_mmss(p.total()?)))
}

fn phase_color(kind: PhaseKind) -> Color {
    if kind.is_paused() { PAUSED_COLOR } else { RUNNING_COLOR }
}

// ============================================================================
// UI Rendering
// ============================================================================

pub fn render_ui(f: &mut Frame, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.size());

    render_tasks(f, app, chunks[0]);
    render_actions(f, app, chunks[1]);
    render_timer(f, app, chunks[2]);
    render_status(f, app, chunks[3]);

    if let Some(completion) = app.pomodoro.completion() {
        render_dialog(f, completion);
    } else if app.mode == Mode::Help {
        render_help(f);
    }
}

fn render_tasks(f: &mut Frame, app: &AppState, area: Rect) {
    let pending = app.pomodoro.pending();
    let mut items: Vec<ListItem> = pending
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let title = match &app.mode {
                Mode::Editing { index, input } if *index == i => format!("{}▏", input),
                _ => task.title.clone(),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("Task #{:<3} ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::raw(title),
            ]))
        })
        .collect();

    let new_task = match &app.mode {
        Mode::Adding(input) => Line::from(vec![
            Span::styled("New Task  ", Style::default().fg(RUNNING_COLOR).add_modifier(Modifier::BOLD)),
            Span::raw(format!("{}▏", input)),
        ]),
        _ => Line::from(Span::styled(
            "New Task  (press A)",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    };
    items.push(ListItem::new(new_task));

    let selected = match app.mode {
        Mode::Adding(_) => Some(pending.len()),
        _ if pending.is_empty() => None,
        _ => Some(app.selected),
    };
    let mut state = ListState::default().with_selected(selected);

    let list = List::new(items)
        .block(
            Block::default()
                .title(Span::styled(" 🍅 POMOTASK ", Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD)))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_COLOR)),
        )
        .highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");

    f.render_stateful_widget(list, area, &mut state);
}

fn action_line(actions: Vec<Action>) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, a) in actions.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  •  "));
        }
        spans.push(Span::styled(a.key, Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
        spans.push(Span::raw(a.label));
    }
    Line::from(spans)
}

fn render_actions(f: &mut Frame, app: &AppState, area: Rect) {
    let kind = app.pomodoro.kind();
    let lines = vec![action_line(task_actions(kind)), action_line(break_actions(kind))];
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded)),
        area,
    );
}

fn render_timer(f: &mut Frame, app: &AppState, area: Rect) {
    let block = Block::default().borders(Borders::ALL).border_type(BorderType::Rounded);
    let p = &app.pomodoro;

    match (progress_label(p), fraction_label(p)) {
        (Some(label), Some(fraction)) => {
            f.render_widget(
                Gauge::default()
                    .block(block.title(format!(" {} ", fraction)))
                    .gauge_style(Style::default().fg(phase_color(p.kind())).bg(Color::Black))
                    .ratio(p.ratio())
                    .label(label),
                area,
            );
        }
        _ => {
            f.render_widget(
                Paragraph::new("Idle")
                    .style(Style::default().fg(Color::DarkGray))
                    .alignment(Alignment::Center)
                    .block(block),
                area,
            );
        }
    }
}

fn render_status(f: &mut Frame, app: &AppState, area: Rect) {
    let text = app.status.clone().unwrap_or_default();
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::Gray)).alignment(Alignment::Center),
        area,
    );
}

fn render_dialog(f: &mut Frame, completion: Completion) {
    let area = centered_rect(50, 30, f.size());
    let (title, choices) = match completion {
        Completion::Task => ("Task Finished!", [("F", "FINISH TASK"), ("C", "CONTINUE TASK")]),
        Completion::Break => ("Break Finished!", [("D", "DONE"), ("N", "NEXT TASK")]),
    };

    let mut choice_spans = Vec::new();
    for (i, (key, label)) in choices.into_iter().enumerate() {
        if i > 0 {
            choice_spans.push(Span::raw("     "));
        }
        choice_spans.push(Span::styled(key, Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD)));
        choice_spans.push(Span::raw(format!(" {}", label)));
    }

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(title, Style::default().fg(RUNNING_COLOR).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(choice_spans),
    ];

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(popup_block(" Pomodoro ")),
        area,
    );
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(70, 85, f.size());
    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled("⌨️  KEYBOARD SHORTCUTS", Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from("  Tasks:"),
        help_line("↑↓ / JK", "Select task"),
        help_line("A", "Add task"),
        help_line("E / Enter", "Edit selected task"),
        help_line("D / Del", "Remove selected task"),
        help_line("Shift+K / Shift+J", "Move selected task up / down"),
        Line::from(""),
        Line::from("  Timer:"),
        help_line("S", "Start next task"),
        help_line("B", "Start break"),
        help_line("Space", "Pause / resume"),
        help_line("R", "Restart current timer"),
        help_line("X", "Stop current timer"),
        Line::from(""),
        Line::from("  General:"),
        help_line("Q / Esc", "Quit, keep the running timer for next time"),
        help_line("Shift+Q", "Quit and discard the running timer"),
        help_line("Ctrl+C", "Force quit"),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(help_text)
            .alignment(Alignment::Left)
            .block(popup_block(" Help ")),
        area,
    );
}

fn popup_block(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_COLOR))
}

fn help_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw("    "),
        Span::styled(key, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {}", desc)),
    ])
}

fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h) / 2),
            Constraint::Percentage(h),
            Constraint::Percentage((100 - h) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w) / 2),
            Constraint::Percentage(w),
            Constraint::Percentage((100 - w) / 2),
        ])
        .split(v[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskQueue;
    use chrono::{TimeZone, Utc};

    fn pomodoro(titles: &[&str]) -> Pomodoro {
        Pomodoro::with_default_lengths(titles.iter().copied().collect::<TaskQueue>())
    }

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(Duration::minutes(25)), "25:00");
        assert_eq!(format_mmss(Duration::seconds(61)), "01:01");
        assert_eq!(format_mmss(Duration::seconds(-5)), "00:00");
    }

    #[test]
    fn test_labels_follow_phase() {
        let mut p = pomodoro(&["Write report"]);
        assert_eq!(progress_label(&p), None);

        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        p.tick(t0);
        p.start_task();
        p.tick(t0 + Duration::seconds(90));
        assert_eq!(progress_label(&p).as_deref(), Some("Write report / 23:30"));
        assert_eq!(fraction_label(&p).as_deref(), Some("01:30/25:00"));

        p.pause_task();
        assert_eq!(progress_label(&p).as_deref(), Some("[PAUSED] Write report / 23:30"));

        p.start_break();
        assert_eq!(progress_label(&p).as_deref(), Some("BREAK TIME / 05:00"));
        p.pause_break();
        assert_eq!(progress_label(&p).as_deref(), Some("[PAUSED] BREAK TIME / 05:00"));
    }

    #[test]
    fn test_dialog_renders_in_titled_popup() {
        let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(60, 20)).unwrap();
        terminal.draw(|f| render_dialog(f, Completion::Task)).unwrap();
        let text: String = terminal.backend().buffer().content.iter().map(|c| c.symbol()).collect();
        assert!(text.contains(" Pomodoro "));
        assert!(text.contains('╭'));
    }

    #[test]
    fn test_phase_color() {
        assert_eq!(phase_color(PhaseKind::TaskRunning), RUNNING_COLOR);
        assert_eq!(phase_color(PhaseKind::BreakPaused), PAUSED_COLOR);
    }
}
