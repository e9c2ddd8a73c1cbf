//! Integration tests for the custsync client

mod http_api;
mod test_utils;
