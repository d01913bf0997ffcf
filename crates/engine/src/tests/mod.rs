mod helpers;
mod ttl_tests;
mod write_tests;
