pub mod announcements;
pub mod attendance;
pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod health;
pub mod leads;
pub mod payments;
pub mod plans;
pub mod students;
pub mod teachers;
pub mod tenants;
