pub mod raw_sample;

pub use raw_sample::RawSample;
