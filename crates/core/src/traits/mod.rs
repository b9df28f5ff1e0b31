pub mod clock;
pub mod expression;
pub mod messaging;
pub mod policy;
pub mod runner;
pub mod serializer;
pub mod store;
pub mod transport;

pub use clock::*;
pub use expression::*;
pub use messaging::*;
pub use policy::*;
pub use runner::*;
pub use serializer::*;
pub use store::*;
pub use transport::*;
