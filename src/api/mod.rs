pub mod attendance;
pub mod attendance_status;
pub mod dashboard;
pub mod employee;
pub mod statistics;
