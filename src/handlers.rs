pub mod appointments;
pub mod endpoints;
pub mod health;
pub mod leads;
