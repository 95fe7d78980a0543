//! Request middleware.
//!
//! - [`admission::admit`] -- Gates generation routes on the admission controller.

pub mod admission;
