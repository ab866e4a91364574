pub mod api_client;
pub mod configuration;
pub mod domain;
pub mod mail_merge;
pub mod recipient_set;
pub mod session;
pub mod startup;
pub mod telemetry;
pub mod workflow;
