//! Wire types for the endpoints this crate wraps. Field names follow the
//! backend's camelCase JSON; snowflake IDs travel as strings.

use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// Logged-in user as returned by `/v1/user/login` and `/v1/user/get/login`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: Option<String>,
    pub user_account: Option<String>,
    pub user_name: Option<String>,
    pub user_avatar: Option<String>,
    pub user_profile: Option<String>,
    pub user_role: Option<String>,
    pub create_time: Option<String>,
    pub edit_time: Option<String>,
    pub update_time: Option<String>,
    /// Bearer token, present on login responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Public view of another user, embedded in [`PictureVO`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVO {
    pub id: Option<String>,
    pub user_account: Option<String>,
    pub user_name: Option<String>,
    pub user_avatar: Option<String>,
    pub user_profile: Option<String>,
    pub user_role: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_account: String,
    pub user_password: String,
}

/// Picture view returned by the upload endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureVO {
    pub id: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub name: Option<String>,
    pub introduction: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub pic_size: Option<i64>,
    pub pic_width: Option<i64>,
    pub pic_height: Option<i64>,
    pub pic_scale: Option<f64>,
    pub pic_format: Option<String>,
    pub pic_color: Option<String>,
    pub user_id: Option<String>,
    pub space_id: Option<String>,
    pub create_time: Option<String>,
    pub edit_time: Option<String>,
    pub update_time: Option<String>,
    pub user: Option<UserVO>,
    #[serde(default)]
    pub permission_list: Vec<String>,
}

/// Form fields for `/v1/picture/upload`. With `id` set the upload
/// replaces an existing picture.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureFileUpload {
    pub id: Option<String>,
    pub space_id: Option<String>,
}

/// Body for `/v1/picture/upload/url`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureUploadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pic_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
}

/// Body for `/v1/picture/upload/batch` (admin only).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureUploadByBatchRequest {
    pub search_text: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
}

/// Out-painting parameters. Unset fields are left to the server's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<i32>,
    /// Aspect ratio such as `"16:9"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ratio: Option<String>,
    /// Horizontal scale, 1.0 to 3.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_scale: Option<f32>,
    /// Vertical scale, 1.0 to 3.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_quality: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_image_size: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_watermark: Option<bool>,
}

impl ImageParameters {
    /// Expand by the given horizontal and vertical factors.
    pub fn scale(x: f32, y: f32) -> Self {
        Self {
            x_scale: Some(x),
            y_scale: Some(y),
            ..Default::default()
        }
    }

    pub fn output_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.output_ratio = Some(ratio.into());
        self
    }

    pub fn angle(mut self, degrees: i32) -> Self {
        self.angle = Some(degrees);
        self
    }

    /// Pixel offsets added on each side: top, bottom, left, right.
    pub fn offsets(mut self, top: i32, bottom: i32, left: i32, right: i32) -> Self {
        self.top_offset = Some(top);
        self.bottom_offset = Some(bottom);
        self.left_offset = Some(left);
        self.right_offset = Some(right);
        self
    }

    pub fn best_quality(mut self, enabled: bool) -> Self {
        self.best_quality = Some(enabled);
        self
    }

    pub fn limit_image_size(mut self, enabled: bool) -> Self {
        self.limit_image_size = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutPaintingTaskRequest {
    pub parameters: ImageParameters,
    pub picture_id: String,
}

/// `data` of the task-creation envelope.
///
/// The upstream AI service reports its own failures in `code`/`message`
/// even when the envelope itself succeeded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutPaintingTaskResponse {
    pub output: Option<TaskOutput>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutput {
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_status: TaskStatus,
}

/// `data` of the task-query envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOutPaintingResponse {
    pub output: Option<TaskDetailOutput>,
    pub request_id: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetailOutput {
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_status: TaskStatus,
    pub task_metrics: Option<TaskMetrics>,
    pub submit_time: Option<String>,
    pub scheduled_time: Option<String>,
    pub end_time: Option<String>,
    pub output_image_url: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Sub-task counters, reported while a task runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub image_count: u32,
}
