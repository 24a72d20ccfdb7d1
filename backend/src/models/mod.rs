//! Domain models.

pub mod artifact;
pub mod checksum;
pub mod job;
pub mod repository;
pub mod routing;
