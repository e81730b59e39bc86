//! Model artifact loading.

pub mod layout;
pub mod repository;

pub use layout::ArtifactLayout;
pub use repository::ArtifactRepository;
