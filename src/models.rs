pub mod appointment;
pub mod contact;
pub mod deletion;
pub mod endpoint;
pub mod forwarding;
pub mod lead;
pub mod routing;
