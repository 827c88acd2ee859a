pub mod attendance;
pub mod audit;
pub mod observations;
pub mod pdps;
pub mod people;
pub mod sessions;
pub mod tags;

pub use attendance::*;
pub use audit::*;
pub use observations::*;
pub use pdps::*;
pub use people::*;
pub use sessions::*;
pub use tags::*;
