//! Upload a picture, expand it with AI out-painting, and print the result.
//!
//! Reads `CANVAS_*` settings plus `CANVAS_ACCOUNT`, `CANVAS_PASSWORD` from
//! the environment or a `.env` file.
//!
//! ```sh
//! RUST_LOG=canvas_cloud_client=debug cargo run --example outpaint -- photo.jpg
//! ```

use canvas_cloud_client::{
    Attachment, ClientConfig, ClientError, ImageParameters, PictureClient, PictureFileUpload,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: outpaint <image>")?;
    let account = std::env::var("CANVAS_ACCOUNT")?;
    let password = std::env::var("CANVAS_PASSWORD")?;

    let anon = PictureClient::with_config(ClientConfig::from_env());
    let session = anon.login(&account, &password).await?;
    let client = anon.with_session(session);

    let file = Attachment::from_path(&path)?;
    let picture = client
        .upload_picture(&PictureFileUpload::default(), file)
        .await?;
    let picture_id = picture.id.ok_or("upload returned no picture id")?;
    println!("Uploaded picture {}", picture_id);

    let params = ImageParameters::scale(1.5, 1.5).best_quality(true);
    let result = client
        .outpaint(&params, &picture_id, |task| {
            match task.metrics {
                Some(m) => println!("  {} ({}/{} done)", task.status, m.succeeded, m.total),
                None => println!("  {}", task.status),
            }
        })
        .await;

    match result {
        Ok(task) => println!("Done: {}", task.output_image_url.unwrap_or_default()),
        Err(ClientError::TaskFailed { code, message, .. }) => eprintln!(
            "Failed: {} {}",
            code.unwrap_or_default(),
            message.unwrap_or_default()
        ),
        Err(ClientError::PollTimeout { last_status, .. }) => {
            eprintln!("Still {} when we stopped waiting", last_status)
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
