//! Persisted workflow state.
//!
//! Field names and the `%Y-%m-%d %H:%M:%S` timestamp format match the JSON
//! files earlier deployments wrote, so existing data directories keep loading.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const REMINDER_KEY: &str = "reminder_state";
pub const MANAGER_KEY: &str = "manager_state";
pub const JOB_TRACKER_KEY: &str = "job_applications";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderState {
    #[serde(default)]
    pub reminder_count: u64,
    #[serde(default, with = "local_time::option")]
    pub last_remind_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(with = "local_time")]
    pub timestamp: NaiveDateTime,
    #[serde(alias = "user")]
    pub user_id: String,
    pub user_status: String,
    pub bot_response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerState {
    #[serde(default)]
    pub conversations: Vec<ConversationRecord>,
    #[serde(default, with = "local_time::option")]
    pub last_check_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[default]
    Applied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub company: String,
    /// `YYYY-MM-DD` of the collection run.
    pub date: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub notes: String,
}

impl ApplicationRecord {
    pub fn applied(company: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            company: company.into(),
            date: date.format("%Y-%m-%d").to_string(),
            status: ApplicationStatus::Applied,
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobTrackerState {
    #[serde(default)]
    pub applications: Vec<ApplicationRecord>,
    #[serde(default)]
    pub last_check_date: Option<NaiveDate>,
}

/// Drop the oldest entries so at most `cap` remain. `cap == 0` keeps all.
pub fn trim_oldest<T>(records: &mut Vec<T>, cap: usize) -> usize {
    if cap == 0 || records.len() <= cap {
        return 0;
    }
    let excess = records.len() - cap;
    records.drain(..excess);
    excess
}

/// Local wall-clock timestamps as `%Y-%m-%d %H:%M:%S`. ISO `T`-separated
/// values are accepted on read.
pub mod local_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(at) => super::serialize(at, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_legacy_files() {
        let manager: ManagerState = serde_json::from_str(
            r#"{"conversations": [{"timestamp": "2025-03-01 10:15:00", "user": "alice#0001",
                "user_status": "refactoring", "bot_response": "nice"}],
                "last_check_time": "2025-03-01 10:15:00"}"#,
        )
        .unwrap();
        assert_eq!(manager.conversations[0].user_id, "alice#0001");
        assert_eq!(
            manager.last_check_time.unwrap().format("%H:%M").to_string(),
            "10:15"
        );

        let jobs: JobTrackerState = serde_json::from_str(
            r#"{"applications": [{"company": "Acme - SWE", "date": "2025-03-01",
                "status": "Applied", "notes": ""}], "last_check_date": "2025-03-01"}"#,
        )
        .unwrap();
        assert_eq!(jobs.applications[0].status, ApplicationStatus::Applied);

        let reminder: ReminderState =
            serde_json::from_str(r#"{"reminder_count": 12, "last_remind_time": null}"#).unwrap();
        assert_eq!(reminder.reminder_count, 12);
        assert_eq!(reminder.last_remind_time, None);
    }

    #[test]
    fn test_timestamp_format_on_write() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(20, 5, 9)
            .unwrap();
        let state = ReminderState {
            reminder_count: 1,
            last_remind_time: Some(at),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["last_remind_time"], "2026-10-17 20:05:09");
    }

    #[test]
    fn test_trim_oldest() {
        let mut records = vec![1, 2, 3, 4, 5];
        assert_eq!(trim_oldest(&mut records, 0), 0);
        assert_eq!(trim_oldest(&mut records, 3), 2);
        assert_eq!(records, vec![3, 4, 5]);
    }
}
