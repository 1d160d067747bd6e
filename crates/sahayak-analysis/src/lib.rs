pub mod controller;
pub mod evaluate;
pub mod metrics;
