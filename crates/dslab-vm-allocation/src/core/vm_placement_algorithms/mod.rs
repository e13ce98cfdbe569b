pub mod best_fit;
pub mod first_fit;
pub mod migration_worst_fit;
pub mod random;
pub mod round_robin;
pub mod worst_fit;
