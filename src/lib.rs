//! Custsync: customer record administration with live bulk-sync tracking
//!
//! A client for a customer-records backend. It starts or resumes a server-side
//! bulk sync job, follows its progress over a server-sent event stream, and
//! keeps a snapshot of progress, elapsed time, and ETA for presentation.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod customers;
pub mod error;
pub mod http;
pub mod job;
pub mod logging;
pub mod stream;
pub mod timefmt;
