//! # canvas-cloud-client
//!
//! Async Rust client for the CanvasCloud picture-management backend.
//!
//! Provides a typed client for the upload endpoints, a uniform
//! `{code, message, data}` envelope classifier, a multipart serializer for
//! payload-plus-file requests, and a polling client for AI out-painting
//! tasks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use canvas_cloud_client::{Attachment, ImageParameters, PictureClient, PictureFileUpload};
//!
//! # async fn example() -> canvas_cloud_client::Result<()> {
//! let anon = PictureClient::new("http://localhost:8001");
//! let session = anon.login("alice", "12345678").await?;
//! let client = anon.with_session(session);
//!
//! // Upload a picture
//! let file = Attachment::new("cat.png", std::fs::read("cat.png").unwrap());
//! let picture = client.upload_picture(&PictureFileUpload::default(), file).await?;
//! let picture_id = picture.id.unwrap_or_default();
//!
//! // Expand it and wait for the result
//! let task = client
//!     .outpaint(&ImageParameters::scale(2.0, 2.0), &picture_id, |t| {
//!         println!("{} {}", t.task_id, t.status)
//!     })
//!     .await?;
//! println!("Result: {:?}", task.output_image_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Multipart payloads
//!
//! ```
//! use canvas_cloud_client::{build_multipart, Attachment, Payload, Value};
//!
//! let payload = Payload::new()
//!     .field("id", Value::Null) // skipped
//!     .field("tags", vec!["sky", "sea"]) // two parts named "tags"
//!     .field("meta", Payload::new().field("w", 800)); // one JSON part
//! let body = build_multipart(payload, Some(Attachment::new("a.png", vec![1, 2]))).unwrap();
//!
//! let names: Vec<_> = body.names().collect();
//! assert_eq!(names, ["file", "tags", "tags", "meta"]);
//! assert_eq!(body.texts("meta"), [r#"{"w":800}"#]);
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod multipart;
pub mod session;
pub mod task;
pub mod types;

pub use client::PictureClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use envelope::{parse_envelope, Envelope};
pub use error::{ClientError, Result};
pub use multipart::{build_multipart, Attachment, MultipartBody, Part, PartValue, Payload, Value};
pub use session::Session;
pub use task::{poll_task, submit_and_wait, OutpaintingTask, PollOptions, TaskApi, TaskStatus};
pub use types::{
    ImageParameters, LoginUser, PictureFileUpload, PictureUploadByBatchRequest,
    PictureUploadRequest, PictureVO, TaskMetrics,
};
