pub mod appointment_service;
pub use appointment_service::AppointmentService;
pub mod forwarding_service;
pub use forwarding_service::{ForwardError, ForwardingService};
pub mod lead_service;
pub use lead_service::LeadService;
pub mod lifecycle_service;
pub use lifecycle_service::{LifecyclePolicy, LifecycleService};
pub mod routing_service;
pub use routing_service::RoutingService;
