//! Data models for the employee portal.
//!
//! - `PersonalInfo`, `Department`: who the employee is and where they work
//! - `LeaveApplication`, `NewLeaveApplication`: leave requests
//! - `PersonalEvent`, `WorkingDay`, `Holiday`: calendar and attendance
//! - `Dashboard`: the combined home-screen view

pub mod employee;

pub use employee::{
    ApplicationStatus, Dashboard, Department, Holiday, LeaveApplication, LeaveType,
    NewLeaveApplication, PersonalEvent, PersonalInfo, WorkingDay,
};
