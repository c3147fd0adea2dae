pub mod attendance_record;
pub mod attendance_status;
pub mod employee;
pub mod user;
