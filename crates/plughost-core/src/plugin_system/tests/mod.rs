mod support;

pub mod jobs_tests;
pub mod running_tests;
pub mod scope_tests;
