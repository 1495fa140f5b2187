pub mod attempts;
pub mod cycles;
pub mod meta;
pub mod progress;
pub mod scenarios;
