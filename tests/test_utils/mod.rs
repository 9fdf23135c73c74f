pub mod fake_server;

pub mod fixtures;

pub use fake_server::FakeLogstash;
