//! The render orchestrator.
//!
//! One request runs a single logical pipeline with two concurrent flows
//! sharing backpressured channels: frame production (animation evaluation,
//! compositing, PNG encode, on a blocking thread) feeding the encoder's
//! stdin, and the encoder's stdout being pumped into the response body as
//! bytes become available. The client starts receiving MP4 bytes before the
//! last frame has been composited.
//!
//! Validation, policy, and quota failures all short-circuit before any
//! frame is rendered or any subprocess is spawned. The quota record is
//! committed only after the encoder exited cleanly and every output byte
//! was handed to the response stream.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use futures_util::stream;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hilite_media::{BaseCanvas, EncoderCommand, EncoderSession, MediaError, MediaResult};
use hilite_models::{
    canonical_hex, frame_time, normalize_opacity, parse_hex, Animation, HighlightRect, PlanTier,
    QuotaCheck, RenderSpec, DEFAULT_DURATION_SEC, DEFAULT_FPS,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::ledger::{check_quota, ExportLedger};
use crate::metrics;
use crate::state::AppState;

/// Fill color when the editor omits one.
const DEFAULT_COLOR: &str = "#ffff00";
/// Frames buffered between the compositor thread and the encoder writer.
const FRAME_CHANNEL_DEPTH: usize = 4;
/// Encoder output chunks buffered toward the response body.
const BODY_CHANNEL_DEPTH: usize = 8;
/// Read size for the encoder output pump.
const OUTPUT_CHUNK_BYTES: usize = 64 * 1024;

/// Raw multipart fields, prior to validation.
#[derive(Default)]
struct RenderForm {
    image: Option<Bytes>,
    x: Option<String>,
    y: Option<String>,
    w: Option<String>,
    h: Option<String>,
    color: Option<String>,
    opacity: Option<String>,
    duration: Option<String>,
    fps: Option<String>,
    anim: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<RenderForm> {
    let mut form = RenderForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read image: {e}")))?;
            form.image = Some(bytes);
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read field {name}: {e}")))?;

        match name.as_str() {
            "x" => form.x = Some(text),
            "y" => form.y = Some(text),
            "w" => form.w = Some(text),
            "h" => form.h = Some(text),
            "color" => form.color = Some(text),
            "opacity" => form.opacity = Some(text),
            "duration" => form.duration = Some(text),
            "fps" => form.fps = Some(text),
            "anim" => form.anim = Some(text),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// Parse a numeric form field; absent or unparsable becomes NaN so the
/// finiteness check catches it.
fn parse_float(value: Option<&String>) -> f64 {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Validate the form against the caller's plan and produce a normalized
/// render spec. 400 for malformed input, 403 for entitlements.
fn validated_spec(form: &RenderForm, plan: PlanTier) -> ApiResult<RenderSpec> {
    let caps = plan.capabilities();

    let rect = HighlightRect::new(
        parse_float(form.x.as_ref()),
        parse_float(form.y.as_ref()),
        parse_float(form.w.as_ref()),
        parse_float(form.h.as_ref()),
    );
    if !rect.is_finite() {
        return Err(ApiError::bad_request("Invalid rectangle coordinates"));
    }

    let color_raw = form.color.as_deref().unwrap_or(DEFAULT_COLOR);
    let color = canonical_hex(color_raw)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid color {color_raw}")))?;
    if !plan.allows_color(&color) {
        return Err(ApiError::policy_denied(format!(
            "Color {color} is not available on {} plan",
            caps.name
        )));
    }

    let anim_label = form.anim.as_deref().unwrap_or("left-to-right");
    let animation = Animation::from_label(anim_label)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown animation \"{anim_label}\"")))?;
    if !plan.allows_animation(animation) {
        return Err(ApiError::policy_denied(format!(
            "Animation \"{}\" is not available on {} plan",
            animation.label(),
            caps.name
        )));
    }

    let opacity_raw = form
        .opacity
        .as_ref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(1.0);
    let opacity = normalize_opacity(opacity_raw);

    let duration_sec = form
        .duration
        .as_ref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(DEFAULT_DURATION_SEC);

    let fps = form
        .fps
        .as_ref()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_FPS);

    Ok(RenderSpec {
        rect,
        color,
        opacity,
        duration_sec,
        fps,
        animation,
    })
}

/// Render an animated highlight video.
///
/// POST /api/render (multipart: `image` + rect/color/opacity/duration/fps/anim)
///
/// Success is a streamed `video/mp4` attachment named `highlight.mp4`.
pub async fn render_video(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = read_form(multipart).await?;

    let Some(image) = form.image.clone() else {
        metrics::record_render_rejected("missing_image");
        return Err(ApiError::bad_request("Image file is required"));
    };

    let spec = match validated_spec(&form, user.plan) {
        Ok(spec) => spec,
        Err(e) => {
            metrics::record_render_rejected("validation");
            return Err(e);
        }
    };

    // Quota admission before any expensive work.
    let quota = check_quota(state.ledger.as_ref(), &user.user_id, user.plan).await?;
    if !quota.allowed {
        let limit = quota.limit.unwrap_or(0);
        let used = quota.used.unwrap_or(0);
        metrics::record_render_rejected("quota");
        return Err(ApiError::QuotaExceeded {
            message: format!(
                "Export limit reached. {limit} exports per day allowed on {} plan.",
                user.plan.capabilities().name
            ),
            limit,
            used,
        });
    }

    // Asset loading. The watermark is fetched only for plans that bake it
    // in, so a missing asset cannot fail watermark-free renders.
    let caps = user.plan.capabilities();
    let watermark = if caps.watermark {
        Some(state.watermark.get().await?)
    } else {
        None
    };

    let max_resolution = caps.max_resolution;
    let base = tokio::task::spawn_blocking(move || {
        BaseCanvas::build(&image, max_resolution, watermark.as_deref())
    })
    .await
    .map_err(|e| ApiError::internal(format!("Canvas build task failed: {e}")))??;

    let total_frames = spec.total_frames();
    info!(
        user_id = %user.user_id,
        plan = %user.plan,
        animation = spec.animation.code(),
        total_frames,
        width = base.width(),
        height = base.height(),
        "Starting render"
    );

    let session = EncoderSession::spawn(&EncoderCommand::new(spec.fps)).map_err(|e| {
        warn!(error = %e, "Encoder spawn failed");
        metrics::record_render_outcome("failed");
        ApiError::from(e)
    })?;
    let mut session = session.with_timeout(state.config.encoder_timeout_secs);
    let stdout = session.take_stdout()?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>(FRAME_CHANNEL_DEPTH);
    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(BODY_CHANNEL_DEPTH);

    let producer = spawn_frame_producer(base, spec, total_frames, frame_tx, cancel_rx);
    let writer = tokio::spawn(feed_encoder(session, frame_rx));
    let pump = tokio::spawn(pump_output(stdout, body_tx, cancel_tx));

    let ledger = Arc::clone(&state.ledger);
    let tier = user.plan;
    let user_id = user.user_id.clone();
    tokio::spawn(async move {
        finalize_render(producer, writer, pump, ledger, tier, user_id).await;
    });

    // Stream encoder output as it arrives; the client can start playing
    // a fast-start MP4 before encoding completes.
    let body = Body::from_stream(stream::unfold(body_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"highlight.mp4\"",
        )
        .body(body)
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}

/// Composite frames in order on a blocking thread.
///
/// Stops early when cancelled (client gone) or when the writer side hangs
/// up. Returns the number of frames produced.
fn spawn_frame_producer(
    base: BaseCanvas,
    spec: RenderSpec,
    total_frames: u32,
    frame_tx: mpsc::Sender<Vec<u8>>,
    cancel_rx: watch::Receiver<bool>,
) -> JoinHandle<MediaResult<u32>> {
    tokio::task::spawn_blocking(move || {
        // Canonical color always parses; the fallback is unreachable.
        let color = parse_hex(&spec.color).unwrap_or([255, 255, 0]);
        let mut produced = 0;

        for index in 0..total_frames {
            if *cancel_rx.borrow() {
                debug!(frame = index, "Frame production cancelled");
                break;
            }

            let t = frame_time(index, total_frames);
            let params = spec.animation.evaluate(t, spec.rect.w, spec.opacity);
            let png = base.render_frame(&spec.rect, color, params.width, params.opacity)?;

            if frame_tx.blocking_send(png).is_err() {
                // Writer side is gone; nothing left to feed.
                break;
            }
            produced += 1;
        }

        Ok(produced)
    })
}

/// Feed composited frames to the encoder's stdin, then wait for it to exit.
async fn feed_encoder(
    mut session: EncoderSession,
    mut frames: mpsc::Receiver<Vec<u8>>,
) -> MediaResult<()> {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = session.write_frame(&frame).await {
            frames.close();
            session.abort().await;
            return Err(e);
        }
    }
    session.finish().await
}

/// Terminal state of the output pump.
enum PumpOutcome {
    /// Encoder output reached EOF with every byte handed to the response.
    Delivered(u64),
    /// The response body was dropped; client disconnected mid-stream.
    ClientGone,
    Failed(std::io::Error),
}

/// Pipe encoder stdout into the response body channel.
async fn pump_output(
    mut stdout: ChildStdout,
    body_tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    cancel_tx: watch::Sender<bool>,
) -> PumpOutcome {
    // Any exit from this task, including a panic, stops frame production.
    let _cancel = scopeguard::guard(cancel_tx, |tx| {
        let _ = tx.send(true);
    });

    let mut delivered: u64 = 0;
    let mut buf = vec![0u8; OUTPUT_CHUNK_BYTES];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => return PumpOutcome::Delivered(delivered),
            Ok(n) => {
                delivered += n as u64;
                if body_tx
                    .send(Ok(Bytes::copy_from_slice(&buf[..n])))
                    .await
                    .is_err()
                {
                    return PumpOutcome::ClientGone;
                }
            }
            Err(e) => return PumpOutcome::Failed(e),
        }
    }
}

/// Await all pipeline tasks, log the terminal state, and commit the quota
/// record only on full success.
async fn finalize_render(
    producer: JoinHandle<MediaResult<u32>>,
    writer: JoinHandle<MediaResult<()>>,
    pump: JoinHandle<PumpOutcome>,
    ledger: Arc<dyn ExportLedger>,
    tier: PlanTier,
    user_id: String,
) {
    let produced = producer.await;
    let encoded = writer.await;
    let pumped = pump.await;

    let frames = match produced {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!(user_id, error = %e, "Frame production failed");
            metrics::record_render_outcome("failed");
            return;
        }
        Err(e) => {
            warn!(user_id, error = %e, "Frame producer panicked");
            metrics::record_render_outcome("failed");
            return;
        }
    };

    match (encoded, pumped) {
        (Ok(Ok(())), Ok(PumpOutcome::Delivered(bytes))) => {
            if QuotaCheck::should_record(tier) {
                if let Err(e) = ledger.record_export(&user_id).await {
                    warn!(user_id, error = %e, "Failed to record export");
                }
            }
            metrics::record_render_outcome("success");
            info!(user_id, frames, bytes, "Render complete");
        }
        (Ok(Err(MediaError::OutputClosed)), _) | (_, Ok(PumpOutcome::ClientGone)) => {
            metrics::record_render_outcome("aborted");
            info!(user_id, frames, "Client disconnected mid-stream; render aborted");
        }
        (Ok(Err(e)), _) => {
            metrics::record_render_outcome("failed");
            warn!(user_id, error = %e, "Encoder failed");
        }
        (Err(e), _) => {
            metrics::record_render_outcome("failed");
            warn!(user_id, error = %e, "Encoder writer panicked");
        }
        (_, Ok(PumpOutcome::Failed(e))) => {
            metrics::record_render_outcome("failed");
            warn!(user_id, error = %e, "Output pump failed");
        }
        (_, Err(e)) => {
            metrics::record_render_outcome("failed");
            warn!(user_id, error = %e, "Output pump panicked");
        }
    }
}
