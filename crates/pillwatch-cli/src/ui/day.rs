//! Day pane — right panel: today's doses, then the medication list.

use pillwatch_core::schedule::{DaySet, MedicationSchedule};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::App;

/// Render the day pane into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let name = app
    .selected_person()
    .map(|u| u.display_name())
    .unwrap_or_else(|| "(unknown)".into());

  let block = Block::default()
    .title(format!(" {name} "))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let inner = block.inner(area);
  f.render_widget(block, area);

  let heading = Style::default()
    .fg(Color::Cyan)
    .add_modifier(Modifier::BOLD);
  let dim = Style::default().fg(Color::DarkGray);

  let mut lines: Vec<Line> = vec![Line::from(Span::styled("Today", heading))];

  if app.doses.is_empty() {
    lines.push(Line::from(Span::styled("  No doses scheduled.", dim)));
  }
  for (i, dose) in app.doses.iter().enumerate() {
    let style = if i == app.dose_cursor {
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
    } else {
      Style::default()
    };
    lines.push(Line::from(vec![
      Span::styled(format!("  {}  ", dose.time), style),
      Span::styled(dose.medication_name.clone(), style),
      Span::styled(format!("  ×{}", dose.pill_count), dim),
    ]));
  }

  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled("Medications", heading)));
  if app.medications.is_empty() {
    lines.push(Line::from(Span::styled("  None.", dim)));
  }
  for med in &app.medications {
    lines.push(Line::from(vec![
      Span::raw(format!("  {:<20}", med.medication.name)),
      Span::styled(describe_schedule(&med.schedule), dim),
    ]));
  }

  f.render_widget(Paragraph::new(lines), inner);
}

/// `08:00 ×1, 20:00 ×2 · M W F`
pub fn describe_schedule(schedule: &MedicationSchedule) -> String {
  let times: Vec<String> = schedule
    .doses()
    .map(|(time, pills)| format!("{time} ×{pills}"))
    .collect();
  let days = match schedule.days() {
    DaySet::Everyday => "every day".to_string(),
    DaySet::Days(days) => days.iter().map(|d| d.code()).collect::<Vec<_>>().join(" "),
  };
  format!("{} · {days}", times.join(", "))
}

#[cfg(test)]
mod tests {
  use pillwatch_core::schedule::DayCode;

  use super::*;

  #[test]
  fn describes_times_and_days() {
    let schedule = MedicationSchedule::new(
      vec!["08:00".parse().unwrap(), "20:00".parse().unwrap()],
      vec![1, 2],
      DaySet::days([DayCode::Fri, DayCode::Mon]).unwrap(),
    )
    .unwrap();
    assert_eq!(describe_schedule(&schedule), "08:00 ×1, 20:00 ×2 · M F");

    let daily = MedicationSchedule::new(vec!["09:30".parse().unwrap()], vec![1], DaySet::Everyday).unwrap();
    assert_eq!(describe_schedule(&daily), "09:30 ×1 · every day");
  }
}
