pub mod like;
pub mod like_control;
pub mod profile;
pub mod project;
pub mod tag;

pub use like::LikeService;
pub use like_control::{ControlState, LikeControl, LikeSnapshot};
pub use profile::ProfileService;
pub use project::ProjectService;
pub use tag::TagService;
