//! Generation and search handlers
//!
//! Both share the primary slot: starting one cancels whichever is still
//! outstanding. Results are kept so any of them can be opened for editing,
//! or refined by a follow-up generation.

use super::session::start_open;
use super::{HandlerResult, report};
use crate::capability::{Capability, GenerateReference, GenerateRequest, SearchHit, SearchRequest};
use crate::core::app::{App, ResultEntry};
use crate::core::task::{SlotKey, Task};
use crate::domain::Raster;
use crate::error::{CapabilityResult, EditError, ValidationError};
use crate::session::lifecycle::{OpKind, Ticket};
use crate::session::messages::{Msg, PrimaryMsg};
use crate::session::notice::Notice;
use crate::require;

pub fn update<C: Capability>(app: &mut App<C>, msg: PrimaryMsg) -> HandlerResult {
    match msg {
        PrimaryMsg::Generate(prompt) => handle_generate(app, prompt, None),
        PrimaryMsg::Restyle(prompt) => {
            let session = require!(app.session, ValidationError::NoSession);
            let image = session.current_image().clone();
            handle_generate(app, prompt, Some(GenerateReference::Image(image)))
        }
        PrimaryMsg::Refine { index, prompt } => {
            let Some(entry) = result_entry(app, index) else {
                app.notices.push(ValidationError::NoResult(index).into());
                return Task::none();
            };
            let url = entry.url.clone();
            handle_generate(app, prompt, Some(GenerateReference::Url(url)))
        }
        PrimaryMsg::Search(text) => handle_search(app, text, None),
        PrimaryMsg::SearchSimilar(text) => {
            let session = require!(app.session, ValidationError::NoSession);
            let image = session.current_image().clone();
            handle_search(app, text, Some(image))
        }
        PrimaryMsg::Hint { key, value } => {
            app.primary.hints.set(key, value);
            app.notices.push(Notice::info(app.primary.hints.to_string()));
            Task::none()
        }
        PrimaryMsg::Hints => {
            app.notices.push(Notice::info(app.primary.hints.to_string()));
            Task::none()
        }
        PrimaryMsg::Generated { ticket, result } => {
            let Some(generation) = settle(app, ticket, result) else {
                return Task::none();
            };
            if let Some(confirm) = generation.assistant_confirm.filter(|c| !c.is_empty()) {
                app.notices.push(Notice::info(confirm));
            }
            let entries = generation
                .urls
                .into_iter()
                .enumerate()
                .map(|(i, url)| ResultEntry {
                    label: format!("generated #{}", i + 1),
                    url,
                })
                .collect();
            show_results(app, entries);
            Task::none()
        }
        PrimaryMsg::Found { ticket, result } => {
            let Some(hits) = settle(app, ticket, result) else {
                return Task::none();
            };
            let entries = hits.into_iter().map(ResultEntry::from).collect();
            show_results(app, entries);
            Task::none()
        }
        PrimaryMsg::Results => {
            let listing = list_results(&app.primary.results);
            app.notices.push(Notice::info(listing));
            Task::none()
        }
        PrimaryMsg::Open(index) => {
            let Some(entry) = result_entry(app, index) else {
                app.notices.push(ValidationError::NoResult(index).into());
                return Task::none();
            };
            let url = entry.url.clone();
            start_open(app, url)
        }
    }
}

/// Result by its 1-based number
fn result_entry<C: Capability>(app: &App<C>, index: usize) -> Option<&ResultEntry> {
    index.checked_sub(1).and_then(|i| app.primary.results.get(i))
}

fn handle_generate<C: Capability>(
    app: &mut App<C>,
    prompt: String,
    reference: Option<GenerateReference>,
) -> HandlerResult {
    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        app.notices.push(ValidationError::EmptyPrompt.into());
        return Task::none();
    }
    let ticket = app.primary.slot.begin(OpKind::Generate);
    let request = GenerateRequest {
        prompt,
        count: app.config.generate_count,
        size: app.config.generate_size.clone(),
        reference,
        hints: app.primary.hints.clone(),
    };
    let from = match &request.reference {
        None => "text".to_string(),
        Some(GenerateReference::Image(image)) => format!("a {}x{} image", image.width(), image.height()),
        Some(GenerateReference::Url(url)) => url.clone(),
    };
    log::info!(
        "Generating {} image(s) for \"{}\" from {} ({})",
        request.count,
        request.prompt,
        from,
        request.hints
    );

    let capability = app.capability.clone();
    Task::perform(async move { capability.generate(request).await }, move |result| {
        Msg::Primary(PrimaryMsg::Generated { ticket, result })
    })
    .bound_to(SlotKey::Primary, ticket)
}

/// Text, image, or combined search; at least one must be given
fn handle_search<C: Capability>(app: &mut App<C>, text: String, image: Option<Raster>) -> HandlerResult {
    let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
    if text.is_none() && image.is_none() {
        app.notices.push(ValidationError::EmptyPrompt.into());
        return Task::none();
    }
    let ticket = app.primary.slot.begin(OpKind::Search);
    let request = SearchRequest {
        text,
        image,
        top_k: app.config.search_top_k,
        hints: app.primary.hints.clone(),
    };
    log::info!(
        "Searching for {:?}{}",
        request.text.as_deref().unwrap_or(""),
        if request.image.is_some() { " by image" } else { "" }
    );

    let capability = app.capability.clone();
    Task::perform(async move { capability.search(request).await }, move |result| {
        Msg::Primary(PrimaryMsg::Found { ticket, result })
    })
    .bound_to(SlotKey::Primary, ticket)
}

/// Settle the primary slot; `None` when the result was superseded or failed
fn settle<C: Capability, T>(app: &mut App<C>, ticket: Ticket, result: CapabilityResult<T>) -> Option<T> {
    if let Err(err) = app.primary.slot.settle(ticket) {
        report(&mut app.notices, err);
        return None;
    }
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            report(&mut app.notices, EditError::Capability(err));
            None
        }
    }
}

fn show_results<C: Capability>(app: &mut App<C>, entries: Vec<ResultEntry>) {
    app.primary.results = entries;
    let listing = list_results(&app.primary.results);
    app.notices.push(Notice::info(listing));
}

fn list_results(results: &[ResultEntry]) -> String {
    if results.is_empty() {
        return "no results".to_string();
    }
    let mut lines: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{:>3}. {}", i + 1, entry.label))
        .collect();
    lines.push("'open <n>' to edit one".to_string());
    lines.join("\n")
}

impl From<SearchHit> for ResultEntry {
    fn from(hit: SearchHit) -> Self {
        Self {
            label: format!("{} ({:.3})", hit.id, hit.score),
            url: hit.path,
        }
    }
}

