pub mod availability;
pub mod calendar;
pub mod guard;
pub mod lifecycle;
pub mod pricing;
pub mod scheduling;
