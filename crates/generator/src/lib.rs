//! Generator strategies for the StyleForge pipeline.
//!
//! A generator turns one input image plus one style preset into one output
//! image, reporting coarse progress along the way. Three variants exist:
//! a deterministic local transform ([`StubGenerator`]), a remote inference
//! endpoint that may be cold-starting ([`WarmupGenerator`]), and a remote
//! face-preserving img2img service ([`SynchronousGenerator`]).
//!
//! Generators never touch the job record store. They only report progress
//! through the channel they are handed and return errors; translating
//! outcomes into record mutations is the worker's job.

mod base;
mod progress;
mod select;
pub mod stub;
#[cfg(test)]
mod testserver;
pub mod synchronous;
pub mod warmup;

pub use base::{validate_input, GenerationError, ImageGenerator};
pub use progress::{progress_channel, report, ProgressReceiver, ProgressSender};
pub use select::build_generator;
pub use stub::StubGenerator;
pub use synchronous::SynchronousGenerator;
pub use warmup::WarmupGenerator;
