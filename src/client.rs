use reqwest::cookie::CookieStore;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::envelope::{parse_envelope, Envelope};
use crate::error::{ClientError, Result};
use crate::multipart::{build_multipart, Attachment, MultipartBody, Payload};
use crate::session::Session;
use crate::task::{self, OutpaintingTask, TaskApi};
use crate::types::*;

const OUT_PAINTING_TASK: &str = "/v1/picture/out_painting/create_task";

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Async client for a CanvasCloud backend.
///
/// Every reply goes through the [`Envelope`] classifier, so each method
/// returns either the endpoint's data, a [`ClientError::Domain`] carrying
/// the server's message, or a [`ClientError::Transport`].
///
/// # Example
/// ```no_run
/// use canvas_cloud_client::{PictureClient, Session};
///
/// # async fn example() -> canvas_cloud_client::Result<()> {
/// let anon = PictureClient::new("http://localhost:8001");
/// let session = anon.login("alice", "12345678").await?;
/// let client = anon.with_session(session);
/// let me = client.login_user().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PictureClient {
    http: Client,
    config: ClientConfig,
    session: Session,
}

impl PictureClient {
    /// Create an anonymous client pointing at the given backend.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::builder().with_endpoint(endpoint).build())
    }

    /// Create an anonymous client from a full config.
    pub fn with_config(mut config: ClientConfig) -> Self {
        config.endpoint = normalize(config.endpoint);
        Self {
            http: Client::new(),
            config,
            session: Session::anonymous(),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Attach a login session. Requests carry its cookies and bearer token.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint, path)
    }

    fn authorize(session: &Session, req: RequestBuilder) -> RequestBuilder {
        match session.authorization() {
            Some(header) => req.header(AUTHORIZATION, header),
            None => req,
        }
    }

    // ── Transport ───────────────────────────────────────────────────

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        path: &str,
        timeout: Duration,
    ) -> Result<Envelope<T>> {
        self.send_as(&self.session, req, path, timeout).await
    }

    /// Send on behalf of `session`: attach its cookies and token, and keep
    /// any cookies the reply sets.
    async fn send_as<T: DeserializeOwned>(
        &self,
        session: &Session,
        req: RequestBuilder,
        path: &str,
        timeout: Duration,
    ) -> Result<Envelope<T>> {
        let mut request = Self::authorize(session, req)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ClientError::Serialization(format!("Cannot build {} request: {}", path, e))
            })?;
        let cookie = session.cookie_jar().cookies(request.url());
        if let Some(cookie) = cookie {
            request.headers_mut().insert(COOKIE, cookie);
        }

        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|e| {
                ClientError::network(
                    format!(
                        "Cannot reach CanvasCloud at {} ({}) \u{2014} is the service running?",
                        self.config.endpoint, path
                    ),
                    e,
                )
            })?;

        {
            let mut set_cookies = resp.headers().get_all(SET_COOKIE).iter();
            session.cookie_jar().set_cookies(&mut set_cookies, resp.url());
        }

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ClientError::network(format!("Failed to read {} response", path), e))?;

        tracing::debug!(path, status, bytes = body.len(), "received response");
        parse_envelope(status, &body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Envelope<T>> {
        let url = reqwest::Url::parse_with_params(&self.url(path), params)
            .map_err(|e| ClientError::InvalidResponse(format!("Bad request URL: {}", e)))?;
        self.send(self.http.get(url), path, self.config.request_timeout)
            .await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>> {
        let req = self.http.post(self.url(path)).json(body);
        self.send(req, path, self.config.request_timeout).await
    }

    /// POST a multipart body built by [`build_multipart`].
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        body: MultipartBody,
    ) -> Result<Envelope<T>> {
        let parts = body.len();
        let form = body.into_form()?;
        tracing::debug!(path, parts, "uploading multipart body");
        let req = self.http.post(self.url(path)).multipart(form);
        self.send(req, path, self.config.upload_timeout).await
    }

    // ── User ────────────────────────────────────────────────────────

    /// Log in and return the resulting session.
    ///
    /// The session keeps the login cookie and, from a JWT backend, the
    /// token. The client itself is unchanged; install the session with
    /// [`with_session`](Self::with_session).
    pub async fn login(&self, account: &str, password: &str) -> Result<Session> {
        let body = LoginRequest {
            user_account: account.to_string(),
            user_password: password.to_string(),
        };
        let session = Session::anonymous();
        let req = self.http.post(self.url("/v1/user/login")).json(&body);
        let user: LoginUser = self
            .send_as(&session, req, "/v1/user/login", self.config.request_timeout)
            .await?
            .into_data()?;
        tracing::info!(account, token = user.token.is_some(), "logged in");
        Ok(session.logged_in(user))
    }

    /// Fetch the user the current session belongs to.
    pub async fn login_user(&self) -> Result<LoginUser> {
        self.get_json("/v1/user/get/login", &[]).await?.into_data()
    }

    /// Re-fetch the login user and store it in this client's session.
    pub async fn refresh_session(&mut self) -> Result<&LoginUser> {
        let user = self.login_user().await?;
        self.session.set_user(user);
        self.session
            .user()
            .ok_or_else(|| ClientError::InvalidResponse("Session lost its user".into()))
    }

    pub async fn logout(&self) -> Result<bool> {
        self.post_json("/v1/user/logout", &serde_json::json!({}))
            .await?
            .into_data_or_default()
    }

    /// Upload a new avatar for the logged-in user.
    pub async fn upload_avatar(&self, file: Attachment) -> Result<bool> {
        let body = build_multipart(Payload::new(), Some(file))?;
        self.post_multipart("/v1/user/avatar", body)
            .await?
            .into_data_or_default()
    }

    // ── Pictures ────────────────────────────────────────────────────

    /// Upload a picture file. With `request.id` set, replaces that picture.
    pub async fn upload_picture(
        &self,
        request: &PictureFileUpload,
        file: Attachment,
    ) -> Result<PictureVO> {
        let body = build_multipart(Payload::from_serialize(request)?, Some(file))?;
        self.post_multipart("/v1/picture/upload", body)
            .await?
            .into_data()
    }

    /// Have the backend fetch a picture from `request.file_url`.
    pub async fn upload_picture_by_url(&self, request: &PictureUploadRequest) -> Result<PictureVO> {
        self.post_json("/v1/picture/upload/url", request)
            .await?
            .into_data()
    }

    /// Grab pictures by search text (admin). Returns how many were stored.
    pub async fn upload_picture_by_batch(
        &self,
        request: &PictureUploadByBatchRequest,
    ) -> Result<u64> {
        self.post_json("/v1/picture/upload/batch", request)
            .await?
            .into_data_or_default()
    }

    /// Admin upload probe. Returns the stored object's URL.
    pub async fn test_upload(&self, file: Attachment) -> Result<String> {
        let body = build_multipart(Payload::new(), Some(file))?;
        self.post_multipart("/v1/file/test/upload", body)
            .await?
            .into_data()
    }

    // ── Out-painting ────────────────────────────────────────────────

    /// Create an out-painting task for a picture. Returns the task id.
    pub async fn submit_task(
        &self,
        parameters: &ImageParameters,
        picture_id: &str,
    ) -> Result<String> {
        let body = CreateOutPaintingTaskRequest {
            parameters: parameters.clone(),
            picture_id: picture_id.to_string(),
        };
        let data: CreateOutPaintingTaskResponse =
            self.post_json(OUT_PAINTING_TASK, &body).await?.into_data()?;
        task_id_from(data)
    }

    /// Fetch one snapshot of a task.
    pub async fn query_task(&self, task_id: &str) -> Result<OutpaintingTask> {
        let data: GetOutPaintingResponse = self
            .get_json(OUT_PAINTING_TASK, &[("taskId", task_id)])
            .await?
            .into_data()?;
        let detail = data.output.ok_or_else(|| {
            ClientError::InvalidResponse(format!("Task {} response missing output", task_id))
        })?;
        Ok(OutpaintingTask::from_detail(task_id, detail))
    }

    /// Poll a task with this client's configured policy.
    pub async fn wait_for_task<F>(&self, task_id: &str, on_progress: F) -> Result<OutpaintingTask>
    where
        F: FnMut(&OutpaintingTask),
    {
        task::poll_task(self, task_id, &self.config.poll, on_progress).await
    }

    /// Submit a task and wait for it with the configured policy.
    pub async fn outpaint<F>(
        &self,
        parameters: &ImageParameters,
        picture_id: &str,
        on_progress: F,
    ) -> Result<OutpaintingTask>
    where
        F: FnMut(&OutpaintingTask),
    {
        task::submit_and_wait(self, parameters, picture_id, &self.config.poll, on_progress).await
    }
}

impl TaskApi for PictureClient {
    fn submit(
        &self,
        parameters: &ImageParameters,
        picture_id: &str,
    ) -> impl Future<Output = Result<String>> + Send {
        self.submit_task(parameters, picture_id)
    }

    fn query(&self, task_id: &str) -> impl Future<Output = Result<OutpaintingTask>> + Send {
        self.query_task(task_id)
    }
}

/// Pull the task id out of a creation response. The upstream service
/// reports its own failures in `code`/`message` inside a success envelope.
fn task_id_from(data: CreateOutPaintingTaskResponse) -> Result<String> {
    match data.output.and_then(|o| o.task_id).filter(|id| !id.is_empty()) {
        Some(id) => Ok(id),
        None => Err(ClientError::InvalidResponse(format!(
            "Out-painting task was not created: {} {}",
            data.code.as_deref().unwrap_or("(no code)"),
            data.message.as_deref().unwrap_or("(no message)")
        ))),
    }
}
