//! Integration tests for the fragment mirror

mod bootstrap;
mod config_integration;
mod conflict_detection;
mod delete_association;
mod local_backend;
mod partial_failure;
mod shape_validation;
mod test_utils;
