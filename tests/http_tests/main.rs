//! HTTP API tests

mod api_tests;
