mod calibration;
mod club;
mod config;
mod error;
mod event;
mod health;
mod message;
mod sample;
mod swing;
mod template;
mod validation;

pub use calibration::*;
pub use club::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use health::*;
pub use message::*;
pub use sample::*;
pub use swing::*;
pub use template::*;
pub use validation::*;
