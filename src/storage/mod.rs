pub mod memory;
pub mod postgres;
pub mod traits;

pub use postgres::PostgresBeliefStore;
pub use traits::BeliefStore;
