mod api_tests;
mod fake_backend;
