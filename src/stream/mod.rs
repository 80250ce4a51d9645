//! Streaming response decoding

pub mod decoder;

pub use decoder::{AnswerAccumulator, Frame, FrameDecoder};
