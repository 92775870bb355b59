//! FFmpeg-backed media conversion
//!
//! Converts the original file of a queued media object and writes the result
//! next to it (or into `MEDIA_OUTPUT_DIR`). FFmpeg's stderr tail is reported
//! through the item's status detail when the process fails.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use gallery_core::models::{MediaConversionType, MediaRotation, QueueItem};
use gallery_worker::{ConversionContext, ConversionHandler, ConversionOutcome};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::catalog::MediaCatalog;

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

pub struct FfmpegConversionHandler {
    ffmpeg_path: String,
    output_dir: Option<PathBuf>,
    catalog: Arc<dyn MediaCatalog>,
}

impl FfmpegConversionHandler {
    pub fn new(
        ffmpeg_path: String,
        output_dir: Option<PathBuf>,
        catalog: Arc<dyn MediaCatalog>,
    ) -> Result<Self> {
        let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
        if ffmpeg_path.chars().any(|c| dangerous_chars.contains(&c)) {
            return Err(anyhow!("Invalid ffmpeg_path: contains dangerous characters"));
        }

        Ok(Self {
            ffmpeg_path,
            output_dir,
            catalog,
        })
    }

    fn output_path(&self, input: &Path, conversion_type: MediaConversionType) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Original file has no name: {}", input.display()))?;
        let extension = input.extension().and_then(|e| e.to_str());
        let file_name = output_file_name(stem, extension, conversion_type);

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Ok(dir.join(file_name))
    }
}

/// `clip.mov` becomes `clip_optimized.mp4` or `clip_rotated.mov`.
fn output_file_name(
    stem: &str,
    extension: Option<&str>,
    conversion_type: MediaConversionType,
) -> String {
    match conversion_type {
        MediaConversionType::CreateOptimized => format!("{}_optimized.mp4", stem),
        MediaConversionType::RotateImage | MediaConversionType::RotateVideo => match extension {
            Some(ext) => format!("{}_rotated.{}", stem, ext),
            None => format!("{}_rotated", stem),
        },
    }
}

/// FFmpeg `transpose` chain for a clockwise rotation.
fn rotation_filter(rotation: MediaRotation) -> Result<&'static str> {
    match rotation {
        MediaRotation::Rotate90 => Ok("transpose=1"),
        MediaRotation::Rotate180 => Ok("transpose=1,transpose=1"),
        MediaRotation::Rotate270 => Ok("transpose=2"),
        MediaRotation::Rotate0 | MediaRotation::NotSet => {
            Err(anyhow!("Rotation requires 90, 180 or 270 degrees"))
        }
    }
}

fn build_args(
    conversion_type: MediaConversionType,
    rotation: MediaRotation,
    input: &Path,
    output: &Path,
) -> Result<Vec<String>> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    match conversion_type {
        MediaConversionType::CreateOptimized => {
            args.extend(
                [
                    "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac",
                    "-movflags", "+faststart",
                ]
                .map(String::from),
            );
        }
        MediaConversionType::RotateVideo => {
            args.extend_from_slice(&["-vf".to_string(), rotation_filter(rotation)?.to_string()]);
            args.extend_from_slice(&["-c:a".to_string(), "copy".to_string()]);
        }
        MediaConversionType::RotateImage => {
            args.extend_from_slice(&["-vf".to_string(), rotation_filter(rotation)?.to_string()]);
            args.extend_from_slice(&["-frames:v".to_string(), "1".to_string()]);
        }
    }

    args.push(output.to_string_lossy().to_string());
    Ok(args)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl ConversionHandler for FfmpegConversionHandler {
    async fn convert(&self, item: &QueueItem, ctx: &ConversionContext) -> Result<ConversionOutcome> {
        let media_object = self
            .catalog
            .media_object(item.media_object_id)?
            .ok_or_else(|| anyhow!("Media object {} not found", item.media_object_id))?;

        let input = PathBuf::from(&media_object.original_path);
        if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
            return Err(anyhow!("Original file {} does not exist", input.display()));
        }
        let output = self.output_path(&input, item.conversion_type)?;
        let args = build_args(item.conversion_type, item.rotation, &input, &output)?;

        ctx.append_status_detail(&format!(
            "{} {} -> {}\n",
            item.conversion_type,
            input.display(),
            output.display()
        ))?;

        tracing::debug!(
            media_queue_id = ctx.media_queue_id(),
            ffmpeg = %self.ffmpeg_path,
            args = ?args,
            "Running ffmpeg"
        );

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !result.status.success() {
            return Err(anyhow!(
                "FFmpeg {} failed ({}): {}",
                item.conversion_type,
                result.status,
                stderr_tail(&result.stderr)
            ));
        }

        let new_filename = output
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Output path has no file name"))?;
        ctx.set_new_filename(&new_filename)?;
        ctx.append_status_detail("Conversion finished\n")?;

        Ok(ConversionOutcome {
            new_filename: Some(new_filename),
        })
    }
}
