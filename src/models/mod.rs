pub mod weather;

pub use weather::{MessageOutcome, Weather};
