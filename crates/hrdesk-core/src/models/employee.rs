//! Employee portal records as returned by the `me/*` endpoints.
//!
//! Field names follow the backend's JSON. Most fields are optional because
//! the backend leaves them null until HR fills them in.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub personal_info_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub fullname: String,
    #[serde(default)]
    pub citizen_card: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl PersonalInfo {
    /// Format the address as a single line.
    pub fn formatted_address(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.address, &self.city, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Department {
    #[serde(default)]
    pub department_id: Option<String>,
    pub department_name: String,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveType {
    Normal,
    Student,
    Illness,
    Marriage,
}

impl std::fmt::Display for LeaveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaveType::Normal => write!(f, "Normal"),
            LeaveType::Student => write!(f, "Student"),
            LeaveType::Illness => write!(f, "Illness"),
            LeaveType::Marriage => write!(f, "Marriage"),
        }
    }
}

impl std::str::FromStr for LeaveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(LeaveType::Normal),
            "student" => Ok(LeaveType::Student),
            "illness" | "sick" => Ok(LeaveType::Illness),
            "marriage" => Ok(LeaveType::Marriage),
            other => Err(format!("Unknown leave type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Approved,
    Rejected,
    #[default]
    Pending,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Approved => write!(f, "Approved"),
            ApplicationStatus::Rejected => write!(f, "Rejected"),
            ApplicationStatus::Pending => write!(f, "Pending"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveApplication {
    pub application_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub leave_type: Option<LeaveType>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

impl LeaveApplication {
    /// Inclusive number of days covered, when both dates are known
    pub fn days(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_days() + 1),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.unwrap_or_default() == ApplicationStatus::Pending
    }
}

/// Body of a new leave application. The server assigns the owner and id.
#[derive(Debug, Clone, Serialize)]
pub struct NewLeaveApplication {
    pub leave_type: LeaveType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ApplicationStatus,
}

impl NewLeaveApplication {
    pub fn new(leave_type: LeaveType, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            leave_type,
            reason: None,
            start_date,
            end_date,
            status: ApplicationStatus::Pending,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.reason = if reason.trim().is_empty() { None } else { Some(reason) };
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalEvent {
    pub event_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub event_title: String,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub event_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub event_end_date: Option<NaiveDate>,
}

impl PersonalEvent {
    /// Whether the event covers `day`
    pub fn occurs_on(&self, day: NaiveDate) -> bool {
        match (self.event_start_date, self.event_end_date) {
            (Some(start), Some(end)) => start <= day && day <= end,
            (Some(start), None) => start == day,
            _ => false,
        }
    }
}

/// One attendance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingDay {
    pub working_id: String,
    #[serde(default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub starting_hours: Option<NaiveDateTime>,
    #[serde(default)]
    pub ending_hours: Option<NaiveDateTime>,
}

impl WorkingDay {
    /// Time between check-in and check-out; None while still checked in
    pub fn hours_worked(&self) -> Option<Duration> {
        let start = self.starting_hours?;
        let end = self.ending_hours?;
        (end >= start).then(|| end - start)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub holiday_id: String,
    pub holiday_name: String,
    pub holiday_date: NaiveDate,
}

/// Everything the portal home screen shows, fetched in one go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub personal_info: PersonalInfo,
    pub department: Department,
    pub events: Vec<PersonalEvent>,
    pub applications: Vec<LeaveApplication>,
}

impl Dashboard {
    pub fn pending_applications(&self) -> usize {
        self.applications.iter().filter(|a| a.is_pending()).count()
    }

    /// The employee manages their own department
    pub fn is_manager(&self) -> bool {
        match (&self.personal_info.user_id, &self.department.manager_id) {
            (Some(user), Some(manager)) => user == manager,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_parse_personal_info_with_nulls() {
        let json = r#"{
            "personal_info_id": "p1",
            "user_id": "u1",
            "fullname": "Alice Nguyen",
            "citizen_card": null,
            "date_of_birth": "1990-04-12",
            "city": "Hanoi",
            "country": "Vietnam"
        }"#;
        let info: PersonalInfo = serde_json::from_str(json).expect("parse");
        assert_eq!(info.fullname, "Alice Nguyen");
        assert_eq!(info.date_of_birth, Some(date(1990, 4, 12)));
        assert_eq!(info.formatted_address().as_deref(), Some("Hanoi, Vietnam"));
    }

    #[test]
    fn test_parse_application() {
        let json = r#"{
            "application_id": "a1",
            "user_id": "u1",
            "leave_type": "Illness",
            "reason": "Flu",
            "start_date": "2024-03-04",
            "end_date": "2024-03-06",
            "status": "Pending"
        }"#;
        let app: LeaveApplication = serde_json::from_str(json).expect("parse");
        assert_eq!(app.leave_type, Some(LeaveType::Illness));
        assert_eq!(app.days(), Some(3));
        assert!(app.is_pending());
    }

    #[test]
    fn test_new_application_serializes_backend_names() {
        let app = NewLeaveApplication::new(LeaveType::Marriage, date(2024, 6, 1), date(2024, 6, 3))
            .with_reason("  ");
        let value = serde_json::to_value(&app).expect("serialize");
        assert_eq!(value["leave_type"], "Marriage");
        assert_eq!(value["start_date"], "2024-06-01");
        assert_eq!(value["status"], "Pending");
        assert!(value.get("reason").is_none());
    }

    #[test]
    fn test_leave_type_from_str() {
        assert_eq!("sick".parse::<LeaveType>(), Ok(LeaveType::Illness));
        assert_eq!("Normal".parse::<LeaveType>(), Ok(LeaveType::Normal));
        assert!("vacation".parse::<LeaveType>().is_err());
    }

    #[test]
    fn test_hours_worked() {
        let json = r#"{
            "working_id": "w1",
            "day": "2024-05-02",
            "starting_hours": "2024-05-02T08:30:00",
            "ending_hours": "2024-05-02T17:00:00"
        }"#;
        let day: WorkingDay = serde_json::from_str(json).expect("parse");
        assert_eq!(day.hours_worked(), Some(Duration::minutes(510)));

        let open = WorkingDay {
            ending_hours: None,
            ..day
        };
        assert_eq!(open.hours_worked(), None);
    }

    #[test]
    fn test_event_occurs_on() {
        let event = PersonalEvent {
            event_id: "e1".into(),
            user_id: None,
            event_title: "Training".into(),
            event_description: None,
            event_start_date: Some(date(2024, 1, 10)),
            event_end_date: Some(date(2024, 1, 12)),
        };
        assert!(event.occurs_on(date(2024, 1, 11)));
        assert!(!event.occurs_on(date(2024, 1, 13)));
    }

    #[test]
    fn test_dashboard_manager_detection() {
        let dashboard = Dashboard {
            personal_info: PersonalInfo {
                user_id: Some("u1".into()),
                fullname: "Alice".into(),
                ..PersonalInfo::default()
            },
            department: Department {
                department_name: "Engineering".into(),
                manager_id: Some("u1".into()),
                ..Department::default()
            },
            events: Vec::new(),
            applications: Vec::new(),
        };
        assert!(dashboard.is_manager());
        assert_eq!(dashboard.pending_applications(), 0);
    }
}
