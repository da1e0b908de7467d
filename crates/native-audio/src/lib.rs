pub mod audio;
pub mod device;
pub mod recorder;

pub use device::MicInput;
pub use recorder::{Recorder, SampleSource};
