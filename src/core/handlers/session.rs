//! Session lifecycle handlers: upload, status, history, save, exit

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{HandlerResult, report};
use crate::capability::{Capability, UploadReceipt};
use crate::core::app::App;
use crate::core::task::{SlotKey, Task};
use crate::domain::{Raster, Selection};
use crate::error::{CapabilityError, CapabilityResult, EditError, ValidationError};
use crate::require;
use crate::session::lifecycle::{OpKind, Ticket};
use crate::session::messages::{Msg, SessionMsg};
use crate::session::notice::Notice;
use crate::session::state::EditSession;

pub fn update<C: Capability>(app: &mut App<C>, msg: SessionMsg) -> HandlerResult {
    match msg {
        SessionMsg::Upload(path) => handle_upload(app, path),
        SessionMsg::Uploaded { ticket, result } => handle_uploaded(app, ticket, result),
        SessionMsg::Status => {
            let status = describe_status(app);
            app.notices.push(Notice::info(status));
            Task::none()
        }
        SessionMsg::History => handle_history(app),
        SessionMsg::Save(path) => handle_save(app, &path),
        SessionMsg::Exit => {
            if close_session(app) {
                app.notices.push(Notice::info("left the editing session"));
            } else {
                app.notices.push(ValidationError::NoSession.into());
            }
            Task::none()
        }
    }
}

/// Read and decode an image file
pub fn load_image(path: &Path) -> anyhow::Result<Raster> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    Raster::decode(&bytes).with_context(|| format!("Failed to decode image: {}", path.display()))
}

fn handle_upload<C: Capability>(app: &mut App<C>, path: PathBuf) -> HandlerResult {
    let image = match load_image(&path) {
        Ok(image) => image,
        Err(err) => {
            app.notices.push(Notice::warning(format!("{err:#}")));
            return Task::none();
        }
    };
    log::info!(
        "Uploading {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    start_upload(app, image)
}

/// Upload `image` through the upload slot; a newer upload supersedes it
pub fn start_upload<C: Capability>(app: &mut App<C>, image: Raster) -> HandlerResult {
    let ticket = app.upload_slot.begin(OpKind::Upload);
    let capability = app.capability.clone();
    let options = app.config.upload;
    Task::perform(
        async move {
            let receipt = capability.upload(image.clone(), options).await?;
            Ok::<_, CapabilityError>((receipt, image))
        },
        move |result| Msg::Session(SessionMsg::Uploaded { ticket, result }),
    )
    .bound_to(SlotKey::Upload, ticket)
}

/// Fetch an image by URL, then upload it, all under the upload slot
pub fn start_open<C: Capability>(app: &mut App<C>, url: String) -> HandlerResult {
    let ticket = app.upload_slot.begin(OpKind::Upload);
    let capability = app.capability.clone();
    let options = app.config.upload;
    log::info!("Opening {}", url);
    Task::perform(
        async move {
            let image = capability.fetch_image(url).await?;
            let receipt = capability.upload(image.clone(), options).await?;
            Ok::<_, CapabilityError>((receipt, image))
        },
        move |result| Msg::Session(SessionMsg::Uploaded { ticket, result }),
    )
    .bound_to(SlotKey::Upload, ticket)
}

fn handle_uploaded<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<(UploadReceipt, Raster)>,
) -> HandlerResult {
    if let Err(err) = app.upload_slot.settle(ticket) {
        report(&mut app.notices, err);
        return Task::none();
    }
    let (receipt, image) = match result {
        Ok(uploaded) => uploaded,
        Err(err) => {
            report(&mut app.notices, EditError::Capability(err));
            return Task::none();
        }
    };

    close_session(app);
    let session = EditSession::new(receipt, image, app.config.history_limit);
    let meta = *session.meta();
    log::info!("Session {} ready", session.id());
    let hint = if meta.segmentation_mode.supports_granularity() {
        "; click a point to select a region, 'granularity' refines it"
    } else {
        "; click a point to select a region"
    };
    app.notices.push(Notice::info(format!(
        "session {} ready: {}x{} ({:?} segmentation){}",
        session.id(),
        meta.width,
        meta.height,
        meta.segmentation_mode,
        hint
    )));
    app.session = Some(session);
    Task::none()
}

/// Drop the session and its auxiliary workflows, cancelling their pending
/// calls. Returns whether a session was open.
pub fn close_session<C: Capability>(app: &mut App<C>) -> bool {
    app.remap = None;
    app.crop = None;
    match app.session.take() {
        Some(mut session) => {
            if let Some(ticket) = session.cancel_pending() {
                log::debug!(
                    "Cancelled pending {} #{} of session {}",
                    ticket.kind(),
                    ticket.id(),
                    session.id()
                );
            }
            true
        }
        None => false,
    }
}

pub fn describe_status<C: Capability>(app: &App<C>) -> String {
    let mut lines = Vec::new();
    match &app.session {
        Some(session) => {
            let meta = session.meta();
            lines.push(format!(
                "session {} ({}x{}, {:?} segmentation)",
                session.id(),
                meta.width,
                meta.height,
                meta.segmentation_mode
            ));
            lines.push(match session.selection() {
                Selection::Picked { layer, mask } => {
                    format!("selection: {} ({:.1}% of image)", layer, mask.coverage() * 100.0)
                }
                Selection::None => "selection: none".to_string(),
            });
            if !session.instruction().is_empty() {
                lines.push(format!("instruction: \"{}\"", session.instruction()));
            }
            lines.push(format!("history: {} snapshot(s)", session.history().len()));
            lines.push(match session.pending_kind() {
                Some(kind) => format!("busy: {kind} pending"),
                None => "busy: no".to_string(),
            });
        }
        None => lines.push("no session; 'upload <path>' or 'open <n>' to start".to_string()),
    }
    if let Some(kind) = app.upload_slot.pending() {
        lines.push(format!("{kind} pending"));
    }
    if let Some(kind) = app.primary.slot.pending() {
        lines.push(format!("{kind} pending"));
    }
    if !app.primary.hints.is_empty() {
        lines.push(format!("style hints: {}", app.primary.hints));
    }
    if let Some(remap) = &app.remap {
        let state = match (remap.pending_kind(), remap.chosen_variant()) {
            (Some(kind), _) => format!("{kind} pending"),
            (None, Some(index)) => format!("variant {} previewed", index + 1),
            (None, None) if remap.preview().is_some() => "preview ready".to_string(),
            (None, None) => "idle".to_string(),
        };
        lines.push(format!(
            "color remap: {} colors, {} mapped, tolerance {}, luminance {}, {}",
            remap.palette().len(),
            remap.mapping().pairs(),
            remap.tolerance(),
            if remap.preserve_luminance() { "kept" } else { "free" },
            state
        ));
    }
    if let Some(crop) = &app.crop {
        let state = match (crop.is_busy(), crop.preview()) {
            (true, _) => "preview pending".to_string(),
            (false, Some(preview)) => format!("preview {}", preview.describe()),
            (false, None) => "no preview".to_string(),
        };
        match crop.last_spec() {
            Some(spec) => lines.push(format!(
                "crop: {}x{} cm at {} ({}), {state}",
                spec.width_cm, spec.height_cm, spec.dpi, spec.mode
            )),
            None => lines.push(format!("crop: {state}")),
        }
    }
    lines.join("\n")
}

fn handle_history<C: Capability>(app: &mut App<C>) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let last = session.history().len() - 1;
    let listing: Vec<String> = session
        .history()
        .iter()
        .enumerate()
        .map(|(i, snapshot)| {
            format!(
                "{} {:>2}: {} at {} ({}x{})",
                if i == last { "*" } else { " " },
                i,
                snapshot.origin,
                snapshot.recorded_at.format("%H:%M:%S"),
                snapshot.image.width(),
                snapshot.image.height()
            )
        })
        .collect();
    app.notices.push(Notice::info(listing.join("\n")));
    Task::none()
}

fn handle_save<C: Capability>(app: &mut App<C>, path: &Path) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    match session.current_image().save(path) {
        Ok(()) => app
            .notices
            .push(Notice::info(format!("saved {}", path.display()))),
        Err(err) => {
            log::error!("{:#}", err);
            app.notices.push(Notice::error(format!("{err:#}")));
        }
    }
    Task::none()
}
