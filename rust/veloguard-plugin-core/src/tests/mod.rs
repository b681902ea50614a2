mod property_tests;
mod resolve_tests;
