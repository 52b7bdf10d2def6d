pub mod response;
pub mod scheduled;
pub mod settings;
pub mod transfer;
pub mod webhook;

pub use response::*;
pub use scheduled::*;
pub use settings::*;
pub use transfer::*;
pub use webhook::*;
