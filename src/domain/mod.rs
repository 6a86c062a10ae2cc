pub mod battery_settings;
pub mod decision;
pub mod economic;
pub mod energy;
pub mod price;

pub use battery_settings::*;
pub use decision::*;
pub use economic::*;
pub use energy::*;
pub use price::*;
