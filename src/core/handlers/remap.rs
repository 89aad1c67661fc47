//! Color remap workflow handlers

use super::{HandlerResult, report};
use crate::capability::{Capability, ColorVariant};
use crate::core::app::App;
use crate::core::task::{SlotKey, Task};
use crate::domain::{PaletteEntry, Raster, Rgb};
use crate::error::{CapabilityResult, EditError, ValidationError};
use crate::session::lifecycle::Ticket;
use crate::session::messages::{Msg, RemapMsg};
use crate::session::notice::Notice;
use crate::transform::ColorRemap;
use crate::{require, try_or_report};

pub fn update<C: Capability>(app: &mut App<C>, msg: RemapMsg) -> HandlerResult {
    match msg {
        RemapMsg::Start => handle_start(app),
        RemapMsg::Extract(n) => {
            let n = n.unwrap_or(app.config.palette_size);
            extract(app, n)
        }
        RemapMsg::Extracted { ticket, result } => handle_extracted(app, ticket, result),
        RemapMsg::Assign { index, target } => handle_assign(app, index, target),
        RemapMsg::Tolerance(tolerance) => {
            let remap = require!(app.remap, ValidationError::NoRemap);
            try_or_report!(app, remap.set_tolerance(tolerance));
            Task::none()
        }
        RemapMsg::Luminance(on) => {
            let remap = require!(app.remap, ValidationError::NoRemap);
            remap.set_preserve_luminance(on);
            Task::none()
        }
        RemapMsg::Preview => handle_preview(app),
        RemapMsg::Previewed { ticket, result } => handle_previewed(app, ticket, result),
        RemapMsg::Variants(n) => {
            let n = n.unwrap_or(app.config.variant_colors);
            handle_variants(app, n)
        }
        RemapMsg::VariantsReady { ticket, result } => handle_variants_ready(app, ticket, result),
        RemapMsg::UseVariant(number) => {
            let remap = require!(app.remap, ValidationError::NoRemap);
            let index = number.checked_sub(1).ok_or(ValidationError::NoVariant(number));
            try_or_report!(app, index.and_then(|i| remap.choose_variant(i)));
            app.notices.push(Notice::info(format!(
                "variant {number} ready; 'commit-colors' to keep it"
            )));
            Task::none()
        }
        RemapMsg::Commit => handle_commit(app),
        RemapMsg::Cancel => {
            if app.remap.take().is_some() {
                app.notices.push(Notice::info("color remap discarded"));
            } else {
                app.notices.push(ValidationError::NoRemap.into());
            }
            Task::none()
        }
    }
}

fn handle_start<C: Capability>(app: &mut App<C>) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let source = session.current_image().clone();
    app.remap = Some(ColorRemap::new(
        source,
        app.config.tolerance,
        app.config.preserve_luminance,
    ));
    let n = app.config.palette_size;
    extract(app, n)
}

/// Generate hue variants of the current image, reusing the remap in
/// progress when it was started on that image
fn handle_variants<C: Capability>(app: &mut App<C>, n_colors: u8) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let current = session.current_image();
    if app
        .remap
        .as_ref()
        .is_some_and(|remap| !remap.source().ptr_eq(current))
    {
        app.remap = None;
    }
    let (tolerance, luminance) = (app.config.tolerance, app.config.preserve_luminance);
    let remap = app
        .remap
        .get_or_insert_with(|| ColorRemap::new(current.clone(), tolerance, luminance));
    let ticket = try_or_report!(app, remap.begin_variants(n_colors));
    log::debug!("Generating hue variants with {} colors", n_colors);

    let capability = app.capability.clone();
    let image = remap.source().clone();
    Task::perform(
        async move { capability.color_variants(image, n_colors).await },
        move |result| Msg::Remap(RemapMsg::VariantsReady { ticket, result }),
    )
    .bound_to(SlotKey::Remap, ticket)
}

fn handle_variants_ready<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<Vec<ColorVariant>>,
) -> HandlerResult {
    let Some(remap) = app.remap.as_mut() else {
        log::debug!("Dropping variants for a discarded remap");
        return Task::none();
    };
    try_or_report!(app, remap.settle_variants(ticket, result));
    let listing: Vec<String> = remap
        .variants()
        .iter()
        .enumerate()
        .map(|(i, variant)| {
            let colors: Vec<String> = variant.colors.iter().map(|c| c.to_hex()).collect();
            format!("{:>3}. {}", i + 1, colors.join(" "))
        })
        .collect();
    app.notices.push(Notice::info(format!(
        "{}\n'use-variant <n>' to preview one",
        listing.join("\n")
    )));
    Task::none()
}

fn extract<C: Capability>(app: &mut App<C>, n_colors: u8) -> HandlerResult {
    let remap = require!(app.remap, ValidationError::NoRemap);
    let ticket = try_or_report!(app, remap.begin_extract(n_colors));
    log::debug!("Extracting {} palette colors", n_colors);

    let capability = app.capability.clone();
    let image = remap.source().clone();
    Task::perform(
        async move { capability.extract_palette(image, n_colors).await },
        move |result| Msg::Remap(RemapMsg::Extracted { ticket, result }),
    )
    .bound_to(SlotKey::Remap, ticket)
}

fn handle_extracted<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<Vec<PaletteEntry>>,
) -> HandlerResult {
    let Some(remap) = app.remap.as_mut() else {
        log::debug!("Dropping palette for a discarded remap");
        return Task::none();
    };
    try_or_report!(app, remap.settle_extract(ticket, result));
    let listing: Vec<String> = remap
        .palette()
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{:>3}. {} ({:.1}%)", i + 1, entry.hex, entry.ratio * 100.0))
        .collect();
    app.notices.push(Notice::info(format!(
        "{}\n'map <n> <#rrggbb>' to recolor an entry",
        listing.join("\n")
    )));
    Task::none()
}

fn handle_assign<C: Capability>(app: &mut App<C>, index: usize, target: Option<Rgb>) -> HandlerResult {
    let remap = require!(app.remap, ValidationError::NoRemap);
    let result = match index.checked_sub(1) {
        Some(i) => remap.assign(i, target),
        None => Err(ValidationError::PaletteIndex {
            index,
            len: remap.palette().len(),
        }),
    };
    // entries are numbered from 1 in the shell
    let result = result.map_err(|err| match err {
        ValidationError::PaletteIndex { len, .. } => ValidationError::PaletteIndex { index, len },
        other => other,
    });
    try_or_report!(app, result);

    let assigned = remap.palette().iter().zip(remap.targets()).nth(index - 1);
    if let Some((entry, target)) = assigned {
        let message = match target {
            Some(target) => format!("{}. {} -> {}", index, entry.hex, target.to_hex()),
            None => format!("{}. {} left unchanged", index, entry.hex),
        };
        app.notices.push(Notice::info(message));
    }
    Task::none()
}

fn handle_preview<C: Capability>(app: &mut App<C>) -> HandlerResult {
    let remap = require!(app.remap, ValidationError::NoRemap);
    let (ticket, request) = try_or_report!(app, remap.begin_preview());
    log::debug!("Previewing {} color pair(s)", request.mapping.pairs());

    let capability = app.capability.clone();
    Task::perform(
        async move { capability.apply_color_mapping(request).await },
        move |result| Msg::Remap(RemapMsg::Previewed { ticket, result }),
    )
    .bound_to(SlotKey::Remap, ticket)
}

fn handle_previewed<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<Raster>,
) -> HandlerResult {
    let Some(remap) = app.remap.as_mut() else {
        log::debug!("Dropping mapping preview for a discarded remap");
        return Task::none();
    };
    try_or_report!(app, remap.settle_preview(ticket, result));
    app.notices.push(Notice::info(
        "preview ready; 'commit-colors' to keep it",
    ));
    Task::none()
}

fn handle_commit<C: Capability>(app: &mut App<C>) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let Some(remap) = app.remap.as_mut() else {
        app.notices.push(ValidationError::NoRemap.into());
        return Task::none();
    };
    match remap.commit(session) {
        Ok(len) => {
            app.remap = None;
            app.notices.push(Notice::info(format!(
                "colors committed; history has {len} snapshot(s)"
            )));
        }
        Err(EditError::Validation(ValidationError::StaleSource)) => {
            // the palette belongs to the old image too
            app.remap = None;
            app.notices.push(ValidationError::StaleSource.into());
            app.notices
                .push(Notice::info("color remap discarded; run 'colors' on the current image"));
        }
        Err(err) => report(&mut app.notices, err),
    }
    Task::none()
}
