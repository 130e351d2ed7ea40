pub mod enums;
pub mod medication;
pub mod patient;
pub mod pharmacy;
pub mod sync_record;

pub use enums::*;
pub use medication::*;
pub use patient::*;
pub use pharmacy::*;
pub use sync_record::*;
