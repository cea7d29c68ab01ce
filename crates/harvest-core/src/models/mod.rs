pub mod file_metadata;
pub mod media;
pub mod media_type;
pub mod pagination;
pub mod problem;
pub mod statistics;
pub mod upload_mode;

pub use file_metadata::{extension_of, FileHashes, FileMetadata};
pub use media::{Media, MediaId};
pub use media_type::MediaType;
pub use pagination::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use problem::{Problem, ProblemKind, ProblemStatus};
pub use statistics::{MediaCountFilter, Statistics};
pub use upload_mode::UploadMode;
