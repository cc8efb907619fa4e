pub mod cpu;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use cpu::MotionBackend;
pub use stub::{StubBackend, StubStep};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
