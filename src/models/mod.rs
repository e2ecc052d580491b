pub mod appointment;
pub mod chat;
pub mod medication;
pub mod profile;
pub mod settings;

pub use appointment::*;
pub use chat::*;
pub use medication::*;
pub use profile::*;
pub use settings::*;
