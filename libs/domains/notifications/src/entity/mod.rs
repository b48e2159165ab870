//! Sea-ORM entities for the email tables.

pub mod email_feedback;
pub mod email_job;
pub mod email_suppression;
