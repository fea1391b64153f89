//! People pane — left panel.

use pillwatch_core::user::Role;
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::app::App;

/// Render the people list into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let filtered = app.filtered_people();
  let total = app.people.len();

  let title = if app.filter_active || !app.filter.is_empty() {
    format!(" People ({}/{}) ", filtered.len(), total)
  } else {
    format!(" People ({total}) ")
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let items: Vec<ListItem> = filtered
    .iter()
    .enumerate()
    .map(|(i, user)| {
      let role = match user.role {
        Some(Role::Caretaker) => "care ",
        Some(Role::Elder) => "     ",
        None => "  ?  ",
      };

      let style = if i == app.list_cursor {
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD)
      } else {
        Style::default()
      };

      ListItem::new(Line::from(vec![
        Span::styled(role, Style::default().fg(Color::DarkGray)),
        Span::styled(user.display_name(), style),
      ]))
    })
    .collect();

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  if (app.filter_active || !app.filter.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let filter_text = if app.filter_active {
      format!("/{}_", app.filter)
    } else {
      format!("/{}", app.filter)
    };
    f.render_widget(
      Paragraph::new(filter_text).style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  let mut state = ListState::default();
  state.select(if filtered.is_empty() {
    None
  } else {
    Some(app.list_cursor)
  });

  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    inner_area,
    &mut state,
  );
}
