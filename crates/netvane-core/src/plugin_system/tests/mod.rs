mod lifecycle_tests;

pub(crate) mod common;
