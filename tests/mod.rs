mod support;

mod broadcast_tests;
mod util_tests;
