pub mod breakpoint;
pub mod controller;
pub mod poller;
