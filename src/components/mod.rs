pub mod errors_container;
pub mod home_container;
pub mod home_network;
pub mod query_boundary;
