pub mod auth;
pub mod like;
pub mod profile;
pub mod project;
pub mod tag;

pub use auth::{Claims, RequestContext, Session, UserMetadata};
pub use like::{Like, LikeOutcome};
pub use profile::{Profile, ProfileSummary};
pub use project::{Project, ProjectForm, ProjectResponse, ProjectUpdateForm};
pub use tag::{ProjectTag, Tag};
