pub mod mocks;

pub use mocks::{MemorySink, MockEvent, MockSession, MockTranscoder};
