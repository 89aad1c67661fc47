//! Crop-to-size workflow handlers

use super::{HandlerResult, report};
use crate::capability::{Capability, CropPreview};
use crate::core::app::App;
use crate::core::task::{SlotKey, Task};
use crate::domain::{CropMode, CropSpec, Dpi};
use crate::error::{CapabilityResult, EditError, ValidationError};
use crate::session::lifecycle::Ticket;
use crate::session::messages::{CropMsg, Msg};
use crate::session::notice::Notice;
use crate::transform::CropToSize;
use crate::{require, try_or_report};

pub fn update<C: Capability>(app: &mut App<C>, msg: CropMsg) -> HandlerResult {
    match msg {
        CropMsg::Preview {
            width_cm,
            height_cm,
            dpi,
            mode,
        } => handle_preview(app, width_cm, height_cm, dpi, mode),
        CropMsg::Previewed { ticket, result } => handle_previewed(app, ticket, result),
        CropMsg::Commit => handle_commit(app),
        CropMsg::Cancel => {
            if app.crop.take().is_some() {
                app.notices.push(Notice::info("crop discarded"));
            } else {
                app.notices.push(ValidationError::NoCrop.into());
            }
            Task::none()
        }
    }
}

fn handle_preview<C: Capability>(
    app: &mut App<C>,
    width_cm: f64,
    height_cm: f64,
    dpi: Option<Dpi>,
    mode: Option<CropMode>,
) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let mode = mode.unwrap_or(app.config.default_crop_mode);
    let spec = CropSpec {
        width_cm,
        height_cm,
        dpi: dpi.unwrap_or(app.config.default_dpi),
        mode,
        border_mask: if mode.needs_border_mask() {
            session.selection().mask().cloned()
        } else {
            None
        },
    };

    // a crop always works on the image currently shown
    let current = session.current_image();
    if app
        .crop
        .as_ref()
        .is_some_and(|crop| !crop.source().ptr_eq(current))
    {
        app.crop = None;
    }
    let crop = app
        .crop
        .get_or_insert_with(|| CropToSize::new(current.clone()));
    let (ticket, request) = try_or_report!(app, crop.begin_preview(spec));

    let capability = app.capability.clone();
    Task::perform(async move { capability.crop_to_size(request).await }, move |result| {
        Msg::Crop(CropMsg::Previewed { ticket, result })
    })
    .bound_to(SlotKey::Crop, ticket)
}

fn handle_previewed<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<CropPreview>,
) -> HandlerResult {
    let Some(crop) = app.crop.as_mut() else {
        log::debug!("Dropping crop preview for a discarded crop");
        return Task::none();
    };
    let preview = try_or_report!(app, crop.settle_preview(ticket, result));
    let message = format!("crop preview: {}; 'commit-crop' to keep it", preview.describe());
    app.notices.push(Notice::info(message));
    Task::none()
}

fn handle_commit<C: Capability>(app: &mut App<C>) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let Some(crop) = app.crop.as_mut() else {
        app.notices.push(ValidationError::NoCrop.into());
        return Task::none();
    };
    match crop.commit(session) {
        Ok(len) => {
            app.crop = None;
            app.notices.push(Notice::info(format!(
                "crop committed; history has {len} snapshot(s)"
            )));
        }
        Err(EditError::Validation(ValidationError::StaleSource)) => {
            app.crop = None;
            app.notices.push(ValidationError::StaleSource.into());
            app.notices
                .push(Notice::info("crop discarded; run 'crop' again on the current image"));
        }
        Err(err) => report(&mut app.notices, err),
    }
    Task::none()
}
