pub mod errors;
pub mod home;
