pub mod capture;
pub mod extract;
