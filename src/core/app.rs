use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::capability::Capability;
use crate::config::RugEditConfig;
use crate::core::control::{self, HELP};
use crate::core::handlers;
use crate::core::task::{SlotKey, Task};
use crate::domain::StyleHints;
use crate::session::lifecycle::{Slot, Ticket};
use crate::session::messages::Msg;
use crate::session::notice::{Notice, NoticeLevel};
use crate::session::state::EditSession;
use crate::transform::{ColorRemap, CropToSize};

/// Run the event loop until the command reader sends `Quit`
pub async fn run<C: Capability>(mut app: App<C>) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(control::read_commands(tx.clone()));

    while let Some(msg) = rx.recv().await {
        let task = app.update(msg);
        print_notices(app.take_notices());
        app.spawn(task, &tx);
        if !app.is_running() {
            break;
        }
    }

    reader.await.context("Command reader panicked")?;
    log::info!("Shut down");
    Ok(())
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => println!("{notice}"),
            NoticeLevel::Warning | NoticeLevel::Error => eprintln!("{notice}"),
        }
    }
}

/// One generated or found image that can be opened for editing
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub label: String,
    pub url: String,
}

/// Shared generate/search slot and its latest results
#[derive(Debug)]
pub struct PrimaryState {
    pub slot: Slot,
    pub results: Vec<ResultEntry>,
    /// Sent with every generation and search
    pub hints: StyleHints,
}

pub struct App<C: Capability> {
    pub capability: Arc<C>,
    pub config: RugEditConfig,
    /// Session being edited, if any
    pub session: Option<EditSession>,
    /// Upload and open share one slot; a newer one supersedes the older
    pub upload_slot: Slot,
    pub primary: PrimaryState,
    /// Color remap in progress on the current image
    pub remap: Option<ColorRemap>,
    /// Crop-to-size in progress on the current image
    pub crop: Option<CropToSize>,
    /// Notices produced by the last update, drained by the event loop
    pub notices: Vec<Notice>,
    running: bool,
}

impl<C: Capability> App<C> {
    pub fn new(capability: C, config: RugEditConfig) -> Self {
        let hints = config.style.clone();
        Self {
            capability: Arc::new(capability),
            config,
            session: None,
            upload_slot: Slot::new("upload"),
            primary: PrimaryState {
                slot: Slot::new("primary"),
                results: Vec::new(),
                hints,
            },
            remap: None,
            crop: None,
            notices: Vec::new(),
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn update(&mut self, msg: Msg) -> Task {
        match msg {
            Msg::Session(m) => handlers::session::update(self, m),
            Msg::Edit(m) => handlers::editing::update(self, m),
            Msg::Primary(m) => handlers::primary::update(self, m),
            Msg::Remap(m) => handlers::remap::update(self, m),
            Msg::Crop(m) => handlers::crop::update(self, m),
            Msg::Unrecognized(reason) => {
                self.notices.push(Notice::warning(reason));
                Task::none()
            }
            Msg::Help => {
                self.notices.push(Notice::info(HELP));
                Task::none()
            }
            Msg::Quit => {
                self.shutdown();
                Task::none()
            }
        }
    }

    /// Cancel everything outstanding and stop the loop
    fn shutdown(&mut self) {
        handlers::session::close_session(self);
        self.upload_slot.cancel();
        self.primary.slot.cancel();
        self.running = false;
    }

    /// Spawn a task on the runtime, sending its message back over `tx`
    pub fn spawn(&mut self, task: Task, tx: &mpsc::UnboundedSender<Msg>) {
        let (future, binding) = task.into_parts();
        let Some(future) = future else {
            return;
        };
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            let msg = future.await;
            if tx.send(msg).is_err() {
                log::debug!("Event loop gone; dropping message");
            }
        });
        if let Some((key, ticket)) = binding {
            self.attach_abort(key, ticket, handle.abort_handle());
        }
    }

    /// Hand a task's abort handle to the slot that owns it. If the owner is
    /// gone the task is aborted.
    fn attach_abort(&mut self, key: SlotKey, ticket: Ticket, handle: AbortHandle) {
        match key {
            SlotKey::Upload => self.upload_slot.attach(ticket, handle),
            SlotKey::Primary => self.primary.slot.attach(ticket, handle),
            SlotKey::LayerEdit => match self.session.as_mut() {
                Some(session) => session.attach_abort(ticket, handle),
                None => handle.abort(),
            },
            SlotKey::Remap => match self.remap.as_mut() {
                Some(remap) => remap.attach_abort(ticket, handle),
                None => handle.abort(),
            },
            SlotKey::Crop => match self.crop.as_mut() {
                Some(crop) => crop.attach_abort(ticket, handle),
                None => handle.abort(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::GenerateReference;
    use crate::capability::fake::{FakeCapability, solid};
    use crate::domain::{CropMode, LayerName, Rgb, Selection, SnapshotOrigin, StyleKey};
    use crate::session::messages::{EditMsg, PrimaryMsg, RemapMsg, SessionMsg};
    use tempfile::TempDir;

    fn app() -> App<FakeCapability> {
        App::new(FakeCapability::new(), RugEditConfig::default())
    }

    /// Feed `msg` and every follow-up message until nothing is left
    async fn drive(app: &mut App<FakeCapability>, msg: Msg) {
        let mut next = Some(msg);
        while let Some(msg) = next.take() {
            next = app.update(msg).resolve().await;
        }
    }

    async fn upload(app: &mut App<FakeCapability>) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rug.png");
        solid(8, 6, 100).save(&path).unwrap();
        drive(app, Msg::upload(path.clone())).await;
        app.take_notices();
        dir
    }

    fn levels(notices: &[Notice]) -> Vec<NoticeLevel> {
        notices.iter().map(|n| n.level).collect()
    }

    #[tokio::test]
    async fn test_upload_pick_edit_undo() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.id().as_str(), "session-1");
        assert_eq!(session.history().len(), 1);

        drive(&mut app, Msg::click(4.0, 3.0, 8.0, 6.0)).await;
        let notices = app.take_notices();
        assert_eq!(notices[0].message, "selected field (6% of image)");
        assert_eq!(
            app.session.as_ref().unwrap().selection().layer(),
            Some(LayerName::Field)
        );

        drive(&mut app, Msg::say("deep navy with gold")).await;
        drive(&mut app, Msg::apply_edit()).await;
        let notices = app.take_notices();
        assert_eq!(notices[0].message, "edit applied; history has 2 snapshot(s)");
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(*session.selection(), Selection::None);
        assert_eq!(session.instruction(), "");
        assert!(matches!(
            session.history().current().origin,
            SnapshotOrigin::Edit { layer: LayerName::Field, .. }
        ));

        drive(&mut app, Msg::undo()).await;
        drive(&mut app, Msg::undo()).await;
        let notices = app.take_notices();
        assert_eq!(notices[1].message, "already at initial state");
        assert_eq!(app.session.as_ref().unwrap().history().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_makes_no_call() {
        let mut app = app();
        drive(&mut app, Msg::upload("/nonexistent/rug.png")).await;
        let notices = app.take_notices();
        assert_eq!(levels(&notices), vec![NoticeLevel::Warning]);
        assert!(notices[0].message.contains("Failed to read image"));
        assert_eq!(app.capability.total_calls(), 0);
        assert!(app.session.is_none());
    }

    #[tokio::test]
    async fn test_edit_without_selection_makes_no_call() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::Edit(EditMsg::Apply(Some("recolor".into())))).await;
        let notices = app.take_notices();
        assert_eq!(levels(&notices), vec![NoticeLevel::Warning]);
        assert_eq!(FakeCapability::count(&app.capability.calls.apply_edit), 0);
    }

    #[tokio::test]
    async fn test_commands_without_session_are_rejected() {
        let mut app = app();
        for msg in [Msg::click(1.0, 1.0, 8.0, 6.0), Msg::undo(), Msg::crop(10.0, 10.0, None, None)] {
            assert!(app.update(msg).is_none());
        }
        let notices = app.take_notices();
        assert_eq!(notices.len(), 3);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Warning));
        assert_eq!(app.capability.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_later_pick_wins() {
        let mut app = app();
        let _dir = upload(&mut app).await;

        let first = app.update(Msg::click(1.0, 1.0, 8.0, 6.0));
        let second = app.update(Msg::click(6.0, 5.0, 8.0, 6.0));

        *app.capability.pick_layer.lock().unwrap() = Some(LayerName::Border);
        let msg = second.resolve().await.unwrap();
        assert!(app.update(msg).is_none());

        *app.capability.pick_layer.lock().unwrap() = Some(LayerName::Field);
        let msg = first.resolve().await.unwrap();
        assert!(app.update(msg).is_none());

        let notices = app.take_notices();
        assert_eq!(notices.len(), 1, "the superseded pick stays silent");
        assert_eq!(
            app.session.as_ref().unwrap().selection().layer(),
            Some(LayerName::Border)
        );
    }

    #[tokio::test]
    async fn test_edit_rejected_while_pick_pending() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        let pick = app.update(Msg::click(1.0, 1.0, 8.0, 6.0));

        drive(&mut app, Msg::say("gold")).await;
        assert!(app.update(Msg::apply_edit()).is_none());
        assert_eq!(app.take_notices()[0].message, "an operation is still running for this session");

        let msg = pick.resolve().await.unwrap();
        drive(&mut app, msg).await;
        drive(&mut app, Msg::apply_edit()).await;
        assert_eq!(FakeCapability::count(&app.capability.calls.apply_edit), 1);
        assert_eq!(app.session.as_ref().unwrap().history().len(), 2);
    }

    #[tokio::test]
    async fn test_late_pick_after_exit_is_dropped() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        let pick = app.update(Msg::click(1.0, 1.0, 8.0, 6.0));
        drive(&mut app, Msg::exit_session()).await;
        app.take_notices();

        let msg = pick.resolve().await.unwrap();
        assert!(app.update(msg).is_none());
        assert!(app.take_notices().is_empty());
        assert!(app.session.is_none());
    }

    #[tokio::test]
    async fn test_preserve_border_without_mask_makes_no_call() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::crop(160.0, 230.0, None, Some(crate::domain::CropMode::PreserveBorder))).await;
        let notices = app.take_notices();
        assert_eq!(levels(&notices), vec![NoticeLevel::Warning]);
        assert_eq!(FakeCapability::count(&app.capability.calls.crop_to_size), 0);
    }

    #[tokio::test]
    async fn test_crop_preview_and_commit() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::click(1.0, 1.0, 8.0, 6.0)).await;
        drive(&mut app, Msg::crop(16.0, 23.0, Some(crate::domain::Dpi::High), Some(crate::domain::CropMode::PreserveBorder))).await;
        let notices = app.take_notices();
        let preview = notices.last().unwrap();
        assert!(preview.message.contains("1890x2717 px"), "{}", preview.message);
        drive(&mut app, Msg::status()).await;
        let status = app.take_notices().remove(0).message;
        assert!(status.contains("crop: 16x23 cm at 300 dpi (preserve_border), preview 1890x2717"), "{status}");

        drive(&mut app, Msg::commit_crop()).await;
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(*session.selection(), Selection::None);
        assert!(app.crop.is_none());
    }

    #[tokio::test]
    async fn test_color_remap_needs_a_pair() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::Remap(crate::session::messages::RemapMsg::Start)).await;
        assert_eq!(app.remap.as_ref().unwrap().palette().len(), 5);
        app.take_notices();

        drive(&mut app, Msg::preview_colors()).await;
        assert_eq!(levels(&app.take_notices()), vec![NoticeLevel::Warning]);
        assert_eq!(FakeCapability::count(&app.capability.calls.apply_color_mapping), 0);

        drive(&mut app, Msg::assign_color(9, Some(crate::domain::Rgb::new(0, 255, 0)))).await;
        assert_eq!(
            app.take_notices()[0].message,
            "palette entry 9 does not exist (palette has 5)"
        );

        drive(&mut app, Msg::assign_color(2, Some(crate::domain::Rgb::new(0, 255, 0)))).await;
        assert_eq!(app.take_notices()[0].message, "2. #140000 -> #00ff00");
        drive(&mut app, Msg::status()).await;
        assert!(app.take_notices()[0].message.contains("1 mapped, tolerance 40, luminance kept"));
        drive(&mut app, Msg::preview_colors()).await;
        drive(&mut app, Msg::commit_colors()).await;
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(
            session.history().current().origin,
            SnapshotOrigin::ColorRemap { pairs: 1 }
        );
        assert!(app.remap.is_none());
    }

    #[tokio::test]
    async fn test_stale_color_commit_keeps_newer_edit() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::Remap(RemapMsg::Start)).await;
        drive(&mut app, Msg::assign_color(1, Some(Rgb::new(0, 77, 0)))).await;
        drive(&mut app, Msg::preview_colors()).await;

        drive(&mut app, Msg::click(1.0, 1.0, 8.0, 6.0)).await;
        drive(&mut app, Msg::say("gold thread")).await;
        drive(&mut app, Msg::apply_edit()).await;
        app.take_notices();

        drive(&mut app, Msg::commit_colors()).await;
        let notices = app.take_notices();
        assert_eq!(levels(&notices), vec![NoticeLevel::Warning, NoticeLevel::Info]);
        assert_eq!(notices[0].message, "the image changed since this preview was made");
        assert!(app.remap.is_none());

        let session = app.session.as_ref().unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.current_image().rgba().get_pixel(0, 0).0, [11, 11, 11, 255]);
    }

    #[tokio::test]
    async fn test_stale_crop_commit_after_undo_is_refused() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::click(1.0, 1.0, 8.0, 6.0)).await;
        drive(&mut app, Msg::say("ivory")).await;
        drive(&mut app, Msg::apply_edit()).await;
        drive(&mut app, Msg::crop(16.0, 23.0, None, Some(CropMode::Fit))).await;
        drive(&mut app, Msg::undo()).await;
        app.take_notices();

        drive(&mut app, Msg::commit_crop()).await;
        assert_eq!(app.take_notices()[0].level, NoticeLevel::Warning);
        assert!(app.crop.is_none());
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.current_image().width(), 8);
    }

    #[tokio::test]
    async fn test_generate_then_open() {
        let mut app = app();
        drive(&mut app, Msg::generate("persian rug, blue field")).await;
        assert_eq!(app.primary.results.len(), 1);
        assert_eq!(app.primary.results[0].url, "/generated/0.png");

        drive(&mut app, Msg::open(2)).await;
        assert!(app.session.is_none());
        drive(&mut app, Msg::open(1)).await;
        assert_eq!(FakeCapability::count(&app.capability.calls.fetch_image), 1);
        let session = app.session.as_ref().unwrap();
        assert_eq!((session.meta().width, session.meta().height), (6, 4));
    }

    #[tokio::test]
    async fn test_restyle_uploads_current_image_with_hints() {
        let mut app = app();
        assert!(app.update(Msg::Primary(PrimaryMsg::Restyle("indigo".into()))).is_none());
        assert_eq!(app.take_notices()[0].message, "no image is being edited; upload one first");

        let _dir = upload(&mut app).await;
        let hint = PrimaryMsg::Hint {
            key: StyleKey::Style,
            value: Some("tabriz".into()),
        };
        drive(&mut app, Msg::Primary(hint)).await;
        drive(&mut app, Msg::Primary(PrimaryMsg::Restyle("indigo field".into()))).await;

        let request = app.capability.last_generate().unwrap();
        assert_eq!(request.prompt, "indigo field");
        assert_eq!(request.hints.get(StyleKey::Style), Some("tabriz"));
        match request.reference {
            Some(GenerateReference::Image(image)) => {
                assert!(image.ptr_eq(app.session.as_ref().unwrap().current_image()))
            }
            other => panic!("unexpected reference {other:?}"),
        }
        assert_eq!(app.primary.results.len(), 1);
    }

    #[tokio::test]
    async fn test_refine_references_an_earlier_result() {
        let mut app = app();
        drive(&mut app, Msg::Primary(PrimaryMsg::Refine { index: 1, prompt: "more red".into() })).await;
        assert_eq!(app.take_notices()[0].message, "no result #1 to open");
        assert_eq!(app.capability.total_calls(), 0);

        drive(&mut app, Msg::generate("medallion rug")).await;
        drive(&mut app, Msg::Primary(PrimaryMsg::Refine { index: 1, prompt: "more red".into() })).await;
        let request = app.capability.last_generate().unwrap();
        assert_eq!(request.reference, Some(GenerateReference::Url("/generated/0.png".into())));
        assert!(request.hints.is_empty());
    }

    #[tokio::test]
    async fn test_search_similar_sends_image_and_optional_text() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::Primary(PrimaryMsg::SearchSimilar("  ".into()))).await;
        let request = app.capability.last_search().unwrap();
        assert_eq!(request.text, None);
        assert_eq!(request.image.as_ref().map(|i| (i.width(), i.height())), Some((8, 6)));
        assert_eq!(app.primary.results.len(), 3);

        drive(&mut app, Msg::Primary(PrimaryMsg::SearchSimilar("border".into()))).await;
        assert_eq!(app.capability.last_search().unwrap().text.as_deref(), Some("border"));

        drive(&mut app, Msg::search("lotus")).await;
        assert!(app.capability.last_search().unwrap().image.is_none());
    }

    #[tokio::test]
    async fn test_variant_preview_and_commit() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::Remap(RemapMsg::Variants(Some(9)))).await;
        assert_eq!(app.take_notices()[0].message, "variant color count 9 is outside 2..=5");
        assert_eq!(FakeCapability::count(&app.capability.calls.color_variants), 0);

        drive(&mut app, Msg::Remap(RemapMsg::Variants(None))).await;
        let notices = app.take_notices();
        assert!(notices[0].message.starts_with("  1. #646464 #646464 #646464"), "{}", notices[0].message);

        drive(&mut app, Msg::Remap(RemapMsg::UseVariant(4))).await;
        assert_eq!(app.take_notices()[0].message, "no color variant #4; run 'variants' first");
        drive(&mut app, Msg::Remap(RemapMsg::UseVariant(3))).await;
        drive(&mut app, Msg::commit_colors()).await;

        let session = app.session.as_ref().unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().current().origin, SnapshotOrigin::ColorVariant { number: 3 });
        assert_eq!(session.current_image().rgba().get_pixel(0, 0).0[0], 200);
    }

    #[tokio::test]
    async fn test_empty_prompt_makes_no_call() {
        let mut app = app();
        assert!(app.update(Msg::generate("   ")).is_none());
        assert!(app.update(Msg::search("")).is_none());
        assert!(app.update(Msg::Primary(PrimaryMsg::SearchSimilar(String::new()))).is_none());
        assert_eq!(levels(&app.take_notices()), vec![NoticeLevel::Warning; 3]);
        assert_eq!(app.capability.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_supersedes_generate() {
        let mut app = app();
        let generate = app.update(Msg::generate("rug"));
        let search = app.update(Msg::search("red medallion"));

        let msg = search.resolve().await.unwrap();
        drive(&mut app, msg).await;
        let msg = generate.resolve().await.unwrap();
        drive(&mut app, msg).await;

        assert_eq!(app.primary.results.len(), 3);
        assert!(app.primary.results[0].label.starts_with("hit-0"));
    }

    #[tokio::test]
    async fn test_new_upload_replaces_session() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        drive(&mut app, Msg::click(1.0, 1.0, 8.0, 6.0)).await;
        drive(&mut app, Msg::Remap(crate::session::messages::RemapMsg::Start)).await;
        let _second = upload(&mut app).await;

        let session = app.session.as_ref().unwrap();
        assert_eq!(session.id().as_str(), "session-2");
        assert_eq!(*session.selection(), Selection::None);
        assert!(app.remap.is_none());
    }

    #[tokio::test]
    async fn test_quit_stops_loop() {
        let mut app = app();
        let _dir = upload(&mut app).await;
        assert!(app.update(Msg::Quit).is_none());
        assert!(!app.is_running());
        assert!(app.session.is_none());
        assert!(app.update(Msg::Session(SessionMsg::Status)).is_none());
        assert!(app.take_notices()[0].message.starts_with("no session"));
    }
}
