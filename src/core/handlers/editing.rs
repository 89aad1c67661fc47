//! Region selection and instruction edit handlers

use super::HandlerResult;
use crate::capability::{Capability, EditResult};
use crate::core::app::App;
use crate::core::task::{SlotKey, Task};
use crate::domain::{DisplayBox, Granularity, RegionPick, UndoOutcome};
use crate::error::{CapabilityResult, ValidationError};
use crate::session::lifecycle::Ticket;
use crate::session::messages::{EditMsg, Msg};
use crate::session::notice::Notice;
use crate::session::state::PickOutcome;
use crate::{require, try_or_report};

pub fn update<C: Capability>(app: &mut App<C>, msg: EditMsg) -> HandlerResult {
    match msg {
        EditMsg::Click { x, y, display } => handle_click(app, x, y, display),
        EditMsg::Granularity(level) => handle_granularity(app, level),
        EditMsg::Picked { ticket, result } => handle_picked(app, ticket, result),
        EditMsg::Deselect => {
            let session = require!(app.session, ValidationError::NoSession);
            session.clear_selection();
            Task::none()
        }
        EditMsg::Say(text) => {
            let session = require!(app.session, ValidationError::NoSession);
            session.set_instruction(text);
            Task::none()
        }
        EditMsg::Apply(text) => handle_apply(app, text),
        EditMsg::Applied { ticket, result } => handle_applied(app, ticket, result),
        EditMsg::Undo => handle_undo(app),
    }
}

fn handle_click<C: Capability>(app: &mut App<C>, x: f64, y: f64, display: DisplayBox) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let point = try_or_report!(app, session.map_click(x, y, display));
    let ticket = try_or_report!(app, session.begin_pick());
    log::debug!("Pick at ({}, {}) -> {:?}", x, y, point);

    let capability = app.capability.clone();
    let id = session.id().clone();
    Task::perform(async move { capability.pick(id, point).await }, move |result| {
        Msg::Edit(EditMsg::Picked { ticket, result })
    })
    .bound_to(SlotKey::LayerEdit, ticket)
}

fn handle_granularity<C: Capability>(app: &mut App<C>, level: Granularity) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    let ticket = try_or_report!(app, session.begin_switch_granularity());
    log::debug!("Switching granularity to {:?}", level);

    let capability = app.capability.clone();
    let id = session.id().clone();
    Task::perform(
        async move { capability.switch_granularity(id, level).await },
        move |result| Msg::Edit(EditMsg::Picked { ticket, result }),
    )
    .bound_to(SlotKey::LayerEdit, ticket)
}

fn handle_picked<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<RegionPick>,
) -> HandlerResult {
    let Some(session) = app.session.as_mut() else {
        log::debug!("Dropping {} result for a closed session", ticket.kind());
        return Task::none();
    };
    match try_or_report!(app, session.settle_pick(ticket, result)) {
        PickOutcome::Selected { layer, coverage_pct } => app
            .notices
            .push(Notice::info(format!("selected {layer} ({coverage_pct}% of image)"))),
        PickOutcome::NothingThere => app
            .notices
            .push(Notice::info("no editable region at that point")),
    }
    Task::none()
}

fn handle_apply<C: Capability>(app: &mut App<C>, text: Option<String>) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    if let Some(text) = text {
        session.set_instruction(text);
    }
    let (ticket, request) = try_or_report!(app, session.begin_edit());
    log::info!("Editing {} with \"{}\"", request.layer, request.instruction);

    let capability = app.capability.clone();
    Task::perform(async move { capability.apply_edit(request).await }, move |result| {
        Msg::Edit(EditMsg::Applied { ticket, result })
    })
    .bound_to(SlotKey::LayerEdit, ticket)
}

fn handle_applied<C: Capability>(
    app: &mut App<C>,
    ticket: Ticket,
    result: CapabilityResult<EditResult>,
) -> HandlerResult {
    let Some(session) = app.session.as_mut() else {
        log::debug!("Dropping edit result for a closed session");
        return Task::none();
    };
    try_or_report!(app, session.settle_edit(ticket, result));
    let len = session.history().len();
    app.notices.push(Notice::info(format!(
        "edit applied; history has {len} snapshot(s)"
    )));
    Task::none()
}

fn handle_undo<C: Capability>(app: &mut App<C>) -> HandlerResult {
    let session = require!(app.session, ValidationError::NoSession);
    match session.undo() {
        UndoOutcome::Restored { remaining } => {
            let message = format!(
                "restored {} ({remaining} snapshot(s) left)",
                session.history().current().origin
            );
            app.notices.push(Notice::info(message));
        }
        UndoOutcome::AtInitialState => app
            .notices
            .push(Notice::info("already at initial state")),
    }
    Task::none()
}
