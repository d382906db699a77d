//! Integration tests for the connectors, the manager and the downloader
//!
//! Every source is pointed at a wiremock server; nothing leaves the machine.

mod common;
mod download_tests;
mod fanfox_tests;
mod hentaifox_tests;
mod mangahub_tests;
mod manager_tests;
mod omegascans_tests;
