pub mod subscription;
pub mod fetch;
pub mod enrich;
pub mod render;
pub mod organize;
