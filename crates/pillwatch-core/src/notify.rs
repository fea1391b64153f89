//! Reminders and the [`Notifier`] trait through which they are delivered.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{evaluator::ScheduledDose, schedule::ClockTime, user::UserId};

pub const REMINDER_TITLE: &str = "Medication Reminder";

/// A user-facing reminder for one upcoming dose.
///
/// `medication_name` and `time` travel with the reminder so that a "marked
/// taken" click can be relayed back and matched to the dose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
  pub user_id:         UserId,
  pub title:           String,
  pub body:            String,
  /// Stable per dose; display layers use it to collapse repeats.
  pub tag:             String,
  pub medication_name: String,
  pub time:            ClockTime,
  pub pill_count:      u32,
}

impl Reminder {
  pub fn for_dose(user_id: UserId, dose: &ScheduledDose) -> Self {
    Self {
      user_id,
      title: REMINDER_TITLE.to_owned(),
      body: format!(
        "Time to take {} - {} pill(s)\nClick to mark as taken",
        dose.medication_name, dose.pill_count
      ),
      tag: format!("medication-{}-{}", dose.medication_name, dose.time),
      medication_name: dose.medication_name.clone(),
      time: dose.time,
      pill_count: dose.pill_count,
    }
  }
}

/// A channel that can display or deliver reminders.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    reminder: &'a Reminder,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Short name for logs (e.g. `"log"`, `"webhook"`).
  fn channel_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn reminder_text_and_tag() {
    let dose = ScheduledDose {
      medication_id:   Uuid::new_v4(),
      medication_name: "Lisinopril".into(),
      time:            "08:00".parse().unwrap(),
      pill_count:      2,
    };
    let r = Reminder::for_dose("user_1".into(), &dose);
    assert_eq!(r.title, "Medication Reminder");
    assert_eq!(r.body, "Time to take Lisinopril - 2 pill(s)\nClick to mark as taken");
    assert_eq!(r.tag, "medication-Lisinopril-08:00");
    assert_eq!(r.pill_count, 2);
  }
}
