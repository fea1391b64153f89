//! TUI rendering — orchestrates all panes.

pub mod day;
pub mod people;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Screen};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(f.area());

  draw_header(f, rows[0]);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect) {
  let date = Local::now().format("%a %Y-%m-%d").to_string();

  let left = Span::styled(
    " pillwatch  [/] search  [t] taken  [q] quit",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(format!("{date} "), Style::default().fg(Color::Gray));

  let pad = area
    .width
    .saturating_sub(left.content.len() as u16)
    .saturating_sub(right.content.len() as u16);

  let line = Line::from(vec![left, Span::raw(" ".repeat(pad as usize)), right]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
    .split(area);

  people::draw(f, cols[0], app);

  if app.selected.is_some() {
    day::draw(f, cols[1], app);
  } else {
    draw_empty_day(f, cols[1]);
  }
}

fn draw_empty_day(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .title(" Today ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new(Span::styled(
      "Select a person and press Enter.",
      Style::default().fg(Color::DarkGray),
    )),
    inner,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match &app.screen {
    Screen::People if app.filter_active => ("SEARCH", "Type to filter  Esc cancel  Enter select"),
    Screen::People => ("NORMAL", "↑↓/jk navigate  / search  Enter open  q quit"),
    Screen::Day => ("TODAY", "↑↓/jk dose  t mark taken  r reload  Esc back  q quit"),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let line = Line::from(vec![
    Span::styled(
      format!(" {mode_label} "),
      Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled(format!("  {status}"), Style::default().fg(Color::DarkGray)),
  ]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
