//! Integration tests for campusdesk-api
//!
//! Uses wiremock to simulate the CampusDesk backend and verifies end-to-end
//! behavior of uploads, credential renewal, session termination, storage
//! helpers and cancellation.


mod test_storage;
mod test_upload;
mod test_upload_batch;
