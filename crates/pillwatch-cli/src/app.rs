//! Dashboard state machine and event dispatcher.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use pillwatch_core::{
  evaluator::ScheduledDose,
  medication::UserMedication,
  user::{User, UserId},
};

use crate::client::ApiClient;

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the people list.
  People,
  /// Focus on the selected person's day.
  Day,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level dashboard state.
pub struct App {
  pub screen: Screen,

  /// The signed-in user first, then the elders they care for.
  pub people: Vec<User>,

  pub filter:        String,
  pub filter_active: bool,

  /// Cursor position within the *filtered* people list.
  pub list_cursor: usize,

  /// Person whose day is shown in the right pane.
  pub selected: Option<UserId>,

  /// Today's doses for `selected`, in time order.
  pub doses: Vec<ScheduledDose>,

  pub medications: Vec<UserMedication>,

  /// Highlighted dose in the day pane.
  pub dose_cursor: usize,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  pub client: Arc<ApiClient>,
}

impl App {
  pub fn new(client: ApiClient) -> Self {
    Self {
      screen: Screen::People,
      people: Vec::new(),
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      selected: None,
      doses: Vec::new(),
      medications: Vec::new(),
      dose_cursor: 0,
      status_msg: String::new(),
      client: Arc::new(client),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Load `user_id` and, for caretakers, their elders.
  pub async fn load_people(&mut self, user_id: &UserId) -> anyhow::Result<()> {
    self.status_msg = "Loading…".into();
    let me = match self.client.get_user(user_id).await {
      Ok(user) => user,
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        return Err(e);
      }
    };
    let elders = if me.is_caretaker() {
      self.client.list_elders(user_id).await?
    } else {
      Vec::new()
    };
    self.people = std::iter::once(me).chain(elders).collect();
    self.list_cursor = 0;
    self.status_msg = String::new();
    Ok(())
  }

  async fn load_day(&mut self, user_id: &UserId) -> anyhow::Result<()> {
    self.status_msg = "Loading…".into();
    let day = self.client.schedule(user_id, None).await;
    let meds = self.client.list_medications(user_id).await;
    match (day, meds) {
      (Ok(day), Ok(meds)) => {
        self.doses = day.doses;
        self.medications = meds;
        self.dose_cursor = 0;
        self.status_msg = String::new();
        Ok(())
      }
      (Err(e), _) | (_, Err(e)) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  // ── Filtered list ─────────────────────────────────────────────────────────

  /// People whose name or phone matches the current filter query.
  pub fn filtered_people(&self) -> Vec<&User> {
    if self.filter.is_empty() {
      return self.people.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    self
      .people
      .iter()
      .filter(|u| {
        matcher.fuzzy_match(&u.display_name(), &self.filter).is_some()
          || matcher.fuzzy_match(&u.phone, &self.filter).is_some()
      })
      .collect()
  }

  pub fn cursor_person(&self) -> Option<&User> {
    self.filtered_people().get(self.list_cursor).copied()
  }

  pub fn selected_person(&self) -> Option<&User> {
    let id = self.selected.as_ref()?;
    self.people.iter().find(|u| &u.user_id == id)
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if self.filter_active {
      return self.handle_filter_key(key).await;
    }

    match self.screen {
      Screen::People => self.handle_list_key(key).await,
      Screen::Day => self.handle_day_key(key).await,
    }
  }

  async fn handle_filter_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        let only = match self.filtered_people().as_slice() {
          [one] => Some(one.user_id.clone()),
          _ => None,
        };
        if let Some(id) = only {
          self.open_day(id).await?;
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
    Ok(true)
  }

  async fn handle_list_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_people().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(id) = self.cursor_person().map(|u| u.user_id.clone()) {
          self.open_day(id).await?;
        }
      }

      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_day_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => {
        self.screen = Screen::People;
        self.selected = None;
        self.doses.clear();
        self.medications.clear();
      }

      KeyCode::Down | KeyCode::Char('j') => {
        if self.dose_cursor + 1 < self.doses.len() {
          self.dose_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.dose_cursor = self.dose_cursor.saturating_sub(1);
      }

      KeyCode::Char('t') => self.mark_highlighted_taken().await,

      KeyCode::Char('r') => {
        if let Some(id) = self.selected.clone() {
          self.load_day(&id).await?;
        }
      }

      _ => {}
    }
    Ok(true)
  }

  /// Relay the highlighted dose as taken. Failures land in the status bar.
  async fn mark_highlighted_taken(&mut self) {
    let (Some(id), Some(dose)) = (self.selected.clone(), self.doses.get(self.dose_cursor)) else {
      return;
    };
    let (name, time) = (dose.medication_name.clone(), dose.time);
    self.status_msg = match self.client.mark_taken(&id, &name, time).await {
      Ok(_) => format!("Marked {name} at {time} taken"),
      Err(e) => format!("Error: {e}"),
    };
  }

  /// Transition to `Day` for `user_id`, loading schedule and medications.
  async fn open_day(&mut self, user_id: UserId) -> anyhow::Result<()> {
    self.load_day(&user_id).await?;
    self.selected = Some(user_id);
    self.screen = Screen::Day;
    Ok(())
  }
}
