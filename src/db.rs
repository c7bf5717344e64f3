pub mod contact_repo;
pub use contact_repo::ContactRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod routing_repo;
pub use routing_repo::{RoutingRepository, RuleScope};
pub mod forwarding_repo;
pub use forwarding_repo::ForwardingRepository;
pub mod endpoint_repo;
pub use endpoint_repo::{DailyStatsDelta, EndpointRepository};
pub mod deletion_repo;
pub use deletion_repo::DeletionRepository;
pub mod appointment_repo;
pub use appointment_repo::AppointmentRepository;
