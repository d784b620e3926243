pub mod job_repo;
pub mod product_repo;
pub mod unit_repo;

pub use job_repo::JobRepo;
pub use product_repo::ProductRepo;
pub use unit_repo::UnitRepo;
