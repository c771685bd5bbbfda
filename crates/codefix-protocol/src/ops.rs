//! Operation-specific types.

pub mod upload;
pub mod job;
pub mod result;

pub use upload::{ArtifactType, CreateUploadUrlRequest, CreateUploadUrlResponse, UploadContext, UploadIntent};
pub use job::{
    GetFixJobRequest, GetFixJobResponse, JobStatus, Position, Range, RecommendationCustomization,
    ReferenceTrackerConfiguration, StartFixJobRequest, StartFixJobResponse,
};
pub use result::{CodeReference, ContentSpan, GetFixResultRequest, GetFixResultResponse, SuggestedFix};
