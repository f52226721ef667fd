pub mod endpoint;
pub mod payment;
pub mod response;

pub use endpoint::*;
pub use payment::*;
pub use response::*;
