//! The post-authoring state machine.
//!
//! ```text
//! (absent) ──/create_post──► AwaitingTitle ──text──► AwaitingContent ──text──► AwaitingTags
//! AwaitingTags ──Continue──► AwaitingSources ──Continue──► AwaitingPublishDate
//! AwaitingPublishDate ──valid date (post created)──► (absent)
//! text / toggle on AwaitingTags or AwaitingSources: stay
//! any ──Cancel──► (absent)
//! ```
//!
//! Every interaction goes through [`Conversation::handle`], which checks the
//! allow list, serializes the user's interactions, applies the interaction
//! timeout and then dispatches on the stored step. Input that does not belong to the
//! current step is ignored without touching the session.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::kernel::session_store::{SessionStore, UserId, UserLocks};
use crate::kernel::{BaseCatalog, BasePostStore};

use super::checkbox::CheckboxList;
use super::draft::{parse_list, Session};
use super::reply::*;
use super::step::{SelectionKind, Step};

/// Command that starts (or restarts) a conversation.
pub const START_COMMAND: &str = "/create_post";
/// Aborts the conversation from any step.
pub const CANCEL: &str = "Cancel";
/// Leaves a selection step.
pub const CONTINUE: &str = "Continue";
/// Publish date input, read in the configured zone.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One user action, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Start,
    Text(String),
    Toggle { kind: SelectionKind, value: String },
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("failed to load {kind} options: {source}")]
    Catalog {
        kind: SelectionKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create post: {0}")]
    Create(#[source] anyhow::Error),

    #[error("interaction timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub time_zone: Tz,
    pub timeout: Duration,
    /// Users allowed to author posts. Everyone else is ignored.
    pub allowed_users: HashSet<UserId>,
}

impl ConversationSettings {
    pub fn new(time_zone: Tz) -> Self {
        Self {
            time_zone,
            timeout: DEFAULT_TIMEOUT,
            allowed_users: HashSet::new(),
        }
    }

    pub fn allow(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.allowed_users.extend(users);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct Conversation {
    sessions: Arc<dyn SessionStore<Session>>,
    locks: UserLocks,
    posts: Arc<dyn BasePostStore>,
    catalog: Arc<dyn BaseCatalog>,
    settings: ConversationSettings,
}

impl Conversation {
    pub fn new(
        sessions: Arc<dyn SessionStore<Session>>,
        posts: Arc<dyn BasePostStore>,
        catalog: Arc<dyn BaseCatalog>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            sessions,
            locks: UserLocks::new(),
            posts,
            catalog,
            settings,
        }
    }

    pub fn is_allowed(&self, user: UserId) -> bool {
        self.settings.allowed_users.contains(&user)
    }

    /// Current session of `user`, `None` when no conversation is in progress.
    pub fn session(&self, user: UserId) -> Option<Session> {
        self.sessions.get(user)
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    /// Apply one interaction and return what to show the user.
    ///
    /// Errors leave the session as it was before the interaction, so the user
    /// can simply retry.
    pub async fn handle(
        &self,
        user: UserId,
        interaction: Interaction,
    ) -> Result<Vec<Reply>, ConversationError> {
        if !self.is_allowed(user) {
            debug!(user, "ignoring interaction from user not on the allow list");
            return Ok(Vec::new());
        }

        let limit = self.settings.timeout;
        let serialized = async {
            let _guard = self.locks.acquire(user).await;
            self.dispatch(user, interaction).await
        };

        match tokio::time::timeout(limit, serialized).await {
            Ok(result) => result,
            Err(_) => {
                warn!(user, ?limit, "interaction timed out");
                Err(ConversationError::Timeout(limit))
            }
        }
    }

    async fn dispatch(
        &self,
        user: UserId,
        interaction: Interaction,
    ) -> Result<Vec<Reply>, ConversationError> {
        // Cancel wins over every step.
        if let Interaction::Text(text) = &interaction {
            if text.trim() == CANCEL {
                self.sessions.delete(user);
                info!(user, "conversation cancelled");
                return Ok(vec![Reply::text(CANCELLED, Controls::None)]);
            }
        }

        match interaction {
            Interaction::Start => {
                self.sessions.set(user, Session::start());
                info!(user, "conversation started");
                Ok(vec![Reply::text(ASK_TITLE, Controls::Cancel)])
            }
            Interaction::Text(text) => match self.sessions.get(user) {
                Some(session) => self.on_text(user, session, text.trim()).await,
                None => Ok(Vec::new()),
            },
            Interaction::Toggle { kind, value } => match self.sessions.get(user) {
                Some(session) => Ok(self.on_toggle(user, session, kind, &value)),
                None => Ok(Vec::new()),
            },
        }
    }

    async fn on_text(
        &self,
        user: UserId,
        mut session: Session,
        text: &str,
    ) -> Result<Vec<Reply>, ConversationError> {
        let advance = text == CONTINUE;

        match session.step {
            Step::AwaitingTitle => {
                if advance {
                    return Ok(Vec::new());
                }
                if text.is_empty() {
                    return Ok(vec![Reply::text(EMPTY_TITLE, Controls::Cancel)]);
                }
                session.draft.title = text.to_string();
                session.step = Step::AwaitingContent;
                self.sessions.set(user, session);
                Ok(vec![Reply::text(ASK_CONTENT, Controls::Cancel)])
            }

            Step::AwaitingContent => {
                if advance {
                    return Ok(Vec::new());
                }
                if text.is_empty() {
                    return Ok(vec![Reply::text(EMPTY_CONTENT, Controls::Cancel)]);
                }
                let tags = self.load_options(SelectionKind::Tag).await?;
                session.draft.content = text.to_string();
                session.step = Step::AwaitingTags;
                session.checkboxes = CheckboxList::new(tags);
                let replies = selection_prompt(SelectionKind::Tag, &session.checkboxes);
                self.sessions.set(user, session);
                Ok(replies)
            }

            Step::AwaitingTags if advance => {
                let sources = self.load_options(SelectionKind::Source).await?;
                let selected = session.checkboxes.selected().map(str::to_string);
                session.draft.tags.extend(selected.collect::<Vec<_>>());
                session.step = Step::AwaitingSources;
                session.checkboxes = CheckboxList::new(sources);
                let replies = selection_prompt(SelectionKind::Source, &session.checkboxes);
                self.sessions.set(user, session);
                Ok(replies)
            }

            Step::AwaitingSources if advance => {
                let selected = session.checkboxes.selected().map(str::to_string);
                session.draft.sources.extend(selected.collect::<Vec<_>>());
                session.step = Step::AwaitingPublishDate;
                session.checkboxes = CheckboxList::default();
                self.sessions.set(user, session);
                Ok(vec![Reply::text(self.ask_publish_date(), Controls::Cancel)])
            }

            Step::AwaitingTags => {
                session.draft.tags = parse_list(text).collect();
                let reply = Reply::text(
                    format!("Tags: {}", joined(&session.draft.tags)),
                    Controls::ContinueOrCancel,
                );
                self.sessions.set(user, session);
                Ok(vec![reply])
            }

            Step::AwaitingSources => {
                session.draft.sources = parse_list(text).collect();
                let reply = Reply::text(
                    format!("Sources: {}", joined(&session.draft.sources)),
                    Controls::ContinueOrCancel,
                );
                self.sessions.set(user, session);
                Ok(vec![reply])
            }

            Step::AwaitingPublishDate => {
                if advance {
                    return Ok(Vec::new());
                }
                let Some(publish_at) = parse_publish_date(text, &self.settings.time_zone) else {
                    return Ok(vec![Reply::text(self.invalid_publish_date(), Controls::Cancel)]);
                };

                let request = session.draft.to_create_post(publish_at);
                let post = self
                    .posts
                    .create_post(request)
                    .await
                    .map_err(ConversationError::Create)?;

                self.sessions.delete(user);
                info!(
                    user,
                    post_id = %post.id,
                    publish_date = %post.publish_date,
                    "post scheduled"
                );
                Ok(vec![Reply::text(SCHEDULED, Controls::None)])
            }
        }
    }

    fn on_toggle(
        &self,
        user: UserId,
        mut session: Session,
        kind: SelectionKind,
        value: &str,
    ) -> Vec<Reply> {
        if session.step.selection() != Some(kind) {
            debug!(user, step = ?session.step, %kind, "ignoring toggle outside its step");
            return Vec::new();
        }
        if !session.checkboxes.toggle(value) {
            debug!(user, %kind, value, "ignoring toggle of unknown item");
            return Vec::new();
        }

        let reply = Reply::RefreshCheckboxes {
            text: picker_title(kind).to_string(),
            kind,
            list: session.checkboxes.clone(),
        };
        self.sessions.set(user, session);
        vec![reply]
    }

    async fn load_options(&self, kind: SelectionKind) -> Result<Vec<String>, ConversationError> {
        let result = match kind {
            SelectionKind::Tag => self.catalog.list_tags().await,
            SelectionKind::Source => self.catalog.list_sources().await,
        };
        result.map_err(|source| ConversationError::Catalog { kind, source })
    }

    fn ask_publish_date(&self) -> String {
        format!(
            "Enter the publish date as YYYY-MM-DD HH:MM ({} time).",
            self.settings.time_zone
        )
    }

    fn invalid_publish_date(&self) -> String {
        format!(
            "Invalid date. Use YYYY-MM-DD HH:MM ({} time), for example 2025-01-31 18:30.",
            self.settings.time_zone
        )
    }
}

/// Parse `YYYY-MM-DD HH:MM` as wall-clock time in `zone`.
///
/// A time skipped by a daylight-saving jump does not exist and is rejected.
/// A time repeated when clocks go back resolves to its first occurrence.
pub fn parse_publish_date(input: &str, zone: &Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), DATE_FORMAT).ok()?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn picker_title(kind: SelectionKind) -> &'static str {
    match kind {
        SelectionKind::Tag => PICK_TAGS,
        SelectionKind::Source => PICK_SOURCES,
    }
}

fn selection_prompt(kind: SelectionKind, list: &CheckboxList) -> Vec<Reply> {
    let (ask, empty) = match kind {
        SelectionKind::Tag => (ASK_TAGS, NO_TAGS),
        SelectionKind::Source => (ASK_SOURCES, NO_SOURCES),
    };

    if list.is_empty() {
        return vec![Reply::text(empty, Controls::ContinueOrCancel)];
    }

    vec![
        Reply::text(ask, Controls::ContinueOrCancel),
        Reply::Checkboxes {
            text: picker_title(kind).to_string(),
            kind,
            list: list.clone(),
        },
    ]
}

fn joined<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::session_store::MemorySessionStore;
    use crate::kernel::test_dependencies::{MockCatalog, MockPostStore};
    use std::collections::BTreeSet;

    const USER: UserId = 7;

    struct Fixture {
        conversation: Conversation,
        posts: Arc<MockPostStore>,
        catalog: Arc<MockCatalog>,
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockCatalog::new()
                .with_tags(["news", "sport"])
                .with_sources(["Telegram", "Site"]),
        )
    }

    fn fixture_with(catalog: MockCatalog) -> Fixture {
        fixture_in(chrono_tz::Asia::Yekaterinburg, catalog)
    }

    fn fixture_in(zone: Tz, catalog: MockCatalog) -> Fixture {
        let posts = Arc::new(MockPostStore::new());
        let catalog = Arc::new(catalog);
        let conversation = Conversation::new(
            Arc::new(MemorySessionStore::<Session>::new()),
            posts.clone(),
            catalog.clone(),
            ConversationSettings::new(zone).allow([USER, USER + 1]),
        );
        Fixture {
            conversation,
            posts,
            catalog,
        }
    }

    async fn send(c: &Conversation, interaction: Interaction) -> Vec<Reply> {
        c.handle(USER, interaction).await.unwrap()
    }

    fn text(s: &str) -> Interaction {
        Interaction::Text(s.to_string())
    }

    fn toggle(kind: SelectionKind, value: &str) -> Interaction {
        Interaction::Toggle {
            kind,
            value: value.to_string(),
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn step(c: &Conversation) -> Option<Step> {
        c.session(USER).map(|s| s.step)
    }

    /// Drive a fresh conversation up to `target`.
    async fn advance_to(c: &Conversation, target: Step) {
        send(c, Interaction::Start).await;
        let script: &[(Step, &str)] = &[
            (Step::AwaitingTitle, "Title"),
            (Step::AwaitingContent, "Body"),
            (Step::AwaitingTags, CONTINUE),
            (Step::AwaitingSources, CONTINUE),
        ];
        for (at, input) in script {
            if *at == target {
                break;
            }
            send(c, text(input)).await;
        }
        assert_eq!(step(c), Some(target));
    }

    #[tokio::test]
    async fn test_start_enters_title_step() {
        let f = fixture();
        let replies = send(&f.conversation, Interaction::Start).await;

        assert_eq!(step(&f.conversation), Some(Step::AwaitingTitle));
        assert_eq!(replies, vec![Reply::text(ASK_TITLE, Controls::Cancel)]);
    }

    #[tokio::test]
    async fn test_restart_discards_draft() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingTags).await;

        send(&f.conversation, Interaction::Start).await;

        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.step, Step::AwaitingTitle);
        assert!(session.draft.title.is_empty());
    }

    #[tokio::test]
    async fn test_title_and_content_are_stored() {
        let f = fixture();
        send(&f.conversation, Interaction::Start).await;

        send(&f.conversation, text("  My Title ")).await;
        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.step, Step::AwaitingContent);
        assert_eq!(session.draft.title, "My Title");

        let replies = send(&f.conversation, text("Hello world")).await;
        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.step, Step::AwaitingTags);
        assert_eq!(session.draft.content, "Hello world");
        assert_eq!(f.catalog.tag_calls(), 1);

        assert_eq!(replies.len(), 2);
        match &replies[1] {
            Reply::Checkboxes { kind, list, .. } => {
                assert_eq!(*kind, SelectionKind::Tag);
                assert_eq!(list.items().len(), 2);
                assert_eq!(list.selected().count(), 0);
            }
            other => panic!("expected checkboxes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_title_keeps_step() {
        let f = fixture();
        send(&f.conversation, Interaction::Start).await;

        let replies = send(&f.conversation, text("   ")).await;

        assert_eq!(replies, vec![Reply::text(EMPTY_TITLE, Controls::Cancel)]);
        assert_eq!(step(&f.conversation), Some(Step::AwaitingTitle));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_not_an_error() {
        let f = fixture_with(MockCatalog::new());
        advance_to(&f.conversation, Step::AwaitingContent).await;

        let replies = send(&f.conversation, text("Body")).await;

        assert_eq!(step(&f.conversation), Some(Step::AwaitingTags));
        assert_eq!(replies, vec![Reply::text(NO_TAGS, Controls::ContinueOrCancel)]);
    }

    #[tokio::test]
    async fn test_catalog_failure_keeps_step() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingContent).await;
        f.catalog.set_failing(true);

        let err = f.conversation.handle(USER, text("Body")).await.unwrap_err();

        assert!(matches!(err, ConversationError::Catalog { kind: SelectionKind::Tag, .. }));
        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.step, Step::AwaitingContent);
        assert!(session.draft.content.is_empty());
    }

    #[tokio::test]
    async fn test_input_for_other_steps_is_ignored() {
        let f = fixture();

        // Absent: nothing happens, nothing is created.
        assert!(send(&f.conversation, text("hello")).await.is_empty());
        assert!(send(&f.conversation, toggle(SelectionKind::Tag, "news")).await.is_empty());
        assert_eq!(f.conversation.session(USER), None);

        // Continue and toggles outside of selection steps.
        for target in [Step::AwaitingTitle, Step::AwaitingContent, Step::AwaitingPublishDate] {
            advance_to(&f.conversation, target).await;
            let before = f.conversation.session(USER);

            assert!(send(&f.conversation, text(CONTINUE)).await.is_empty());
            assert!(send(&f.conversation, toggle(SelectionKind::Tag, "news")).await.is_empty());
            let replies = send(&f.conversation, toggle(SelectionKind::Source, "Telegram")).await;
            assert!(replies.is_empty());

            assert_eq!(f.conversation.session(USER), before);
        }

        // A source toggle while picking tags, and the reverse.
        advance_to(&f.conversation, Step::AwaitingTags).await;
        let before = f.conversation.session(USER);
        assert!(send(&f.conversation, toggle(SelectionKind::Source, "Telegram")).await.is_empty());
        assert_eq!(f.conversation.session(USER), before);

        advance_to(&f.conversation, Step::AwaitingSources).await;
        let before = f.conversation.session(USER);
        assert!(send(&f.conversation, toggle(SelectionKind::Tag, "news")).await.is_empty());
        assert_eq!(f.conversation.session(USER), before);

        assert!(f.posts.created().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_from_every_step() {
        for target in [
            Step::AwaitingTitle,
            Step::AwaitingContent,
            Step::AwaitingTags,
            Step::AwaitingSources,
            Step::AwaitingPublishDate,
        ] {
            let f = fixture();
            advance_to(&f.conversation, target).await;

            let replies = send(&f.conversation, text(CANCEL)).await;

            assert_eq!(replies, vec![Reply::text(CANCELLED, Controls::None)]);
            assert_eq!(f.conversation.session(USER), None, "cancel from {:?}", target);
        }
    }

    #[tokio::test]
    async fn test_cancel_without_session_still_acknowledges() {
        let f = fixture();
        let replies = send(&f.conversation, text(CANCEL)).await;
        assert_eq!(replies, vec![Reply::text(CANCELLED, Controls::None)]);
    }

    #[tokio::test]
    async fn test_tag_union_of_text_and_checkboxes() {
        let cases: &[(&str, &[&str], &[&str])] = &[
            // overlapping
            ("a, b", &["b"], &["a", "b"]),
            // disjoint
            ("a", &["b"], &["a", "b"]),
            // checkbox only
            ("", &["a"], &["a"]),
            // text only, with blanks and repeats
            ("a, ,a ,b", &[], &["a", "b"]),
            // toggled twice: deselected
            ("a", &["b", "b"], &["a"]),
        ];

        for (typed, toggles, expected) in cases {
            let f = fixture_with(MockCatalog::new().with_tags(["a", "b"]));
            advance_to(&f.conversation, Step::AwaitingTags).await;

            if !typed.is_empty() {
                send(&f.conversation, text(typed)).await;
                assert_eq!(step(&f.conversation), Some(Step::AwaitingTags));
            }
            for value in *toggles {
                let replies = send(&f.conversation, toggle(SelectionKind::Tag, value)).await;
                assert!(matches!(replies[0], Reply::RefreshCheckboxes { .. }));
            }
            send(&f.conversation, text(CONTINUE)).await;

            let session = f.conversation.session(USER).unwrap();
            assert_eq!(session.step, Step::AwaitingSources);
            assert_eq!(
                session.draft.tags,
                set(expected),
                "typed {:?} toggled {:?}",
                typed,
                toggles
            );
        }
    }

    #[tokio::test]
    async fn test_retyped_list_replaces_previous_one() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingTags).await;

        send(&f.conversation, text("nwes")).await;
        let replies = send(&f.conversation, text("news, update")).await;
        assert_eq!(replies[0].body(), "Tags: news, update");
        send(&f.conversation, toggle(SelectionKind::Tag, "sport")).await;
        send(&f.conversation, text(CONTINUE)).await;

        send(&f.conversation, text("Site, Blgo")).await;
        send(&f.conversation, text("Blog")).await;
        send(&f.conversation, text(CONTINUE)).await;

        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.step, Step::AwaitingPublishDate);
        assert_eq!(session.draft.tags, set(&["news", "sport", "update"]));
        assert_eq!(session.draft.sources, set(&["Blog"]));
    }

    #[tokio::test]
    async fn test_toggle_redraws_with_mark() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingTags).await;

        let replies = send(&f.conversation, toggle(SelectionKind::Tag, "sport")).await;

        match &replies[0] {
            Reply::RefreshCheckboxes { list, .. } => {
                let labels: Vec<String> = list.items().iter().map(|i| i.label()).collect();
                assert_eq!(labels, vec!["news", "✅ sport"]);
            }
            other => panic!("expected refresh, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_checkboxes_rebuilt_on_step_entry() {
        let f = fixture_with(MockCatalog::new().with_tags(["x"]).with_sources(["x"]));
        advance_to(&f.conversation, Step::AwaitingTags).await;
        send(&f.conversation, toggle(SelectionKind::Tag, "x")).await;
        send(&f.conversation, text(CONTINUE)).await;

        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.checkboxes.selected().count(), 0);
        assert_eq!(session.draft.sources, set(&[]));
    }

    #[tokio::test]
    async fn test_free_text_sources_union_with_toggles() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingSources).await;

        send(&f.conversation, text("Newsletter")).await;
        send(&f.conversation, toggle(SelectionKind::Source, "Telegram")).await;
        assert_eq!(step(&f.conversation), Some(Step::AwaitingSources));
        send(&f.conversation, text(CONTINUE)).await;

        let session = f.conversation.session(USER).unwrap();
        assert_eq!(session.step, Step::AwaitingPublishDate);
        assert_eq!(session.draft.sources, set(&["Newsletter", "Telegram"]));
    }

    #[tokio::test]
    async fn test_bad_date_keeps_step_and_draft() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingPublishDate).await;
        let before = f.conversation.session(USER);

        for input in ["tomorrow", "2025-13-01 10:00", "2025-01-01", "01.02.2025 10:00"] {
            let replies = send(&f.conversation, text(input)).await;
            assert!(replies[0].body().starts_with("Invalid date"), "{}", input);
        }

        assert_eq!(f.conversation.session(USER), before);
        assert!(f.posts.created().is_empty());
    }

    #[tokio::test]
    async fn test_date_submits_and_clears() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingPublishDate).await;

        let replies = send(&f.conversation, text("2030-06-01 18:30")).await;

        assert_eq!(replies, vec![Reply::text(SCHEDULED, Controls::None)]);
        assert_eq!(f.conversation.session(USER), None);

        let created = f.posts.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "Title");
        // 18:30 in Yekaterinburg (+05:00)
        assert_eq!(created[0].publish_date, Utc.with_ymd_and_hms(2030, 6, 1, 13, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_skipped_local_time_keeps_step() {
        let f = fixture_in(chrono_tz::Europe::Berlin, MockCatalog::new());
        advance_to(&f.conversation, Step::AwaitingPublishDate).await;

        // Clocks jump from 02:00 to 03:00 that night
        let replies = send(&f.conversation, text("2030-03-31 02:30")).await;
        assert!(replies[0].body().starts_with("Invalid date"));
        assert_eq!(step(&f.conversation), Some(Step::AwaitingPublishDate));
        assert!(f.posts.created().is_empty());

        send(&f.conversation, text("2030-07-01 12:00")).await;
        assert_eq!(f.conversation.session(USER), None);
        // Summer time, +02:00
        assert_eq!(
            f.posts.created()[0].publish_date,
            Utc.with_ymd_and_hms(2030, 7, 1, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_failure_keeps_session_for_retry() {
        let f = fixture();
        advance_to(&f.conversation, Step::AwaitingPublishDate).await;
        let before = f.conversation.session(USER);
        f.posts.set_fail_create(true);

        let err = f.conversation.handle(USER, text("2030-06-01 18:30")).await.unwrap_err();
        assert!(matches!(err, ConversationError::Create(_)));
        assert_eq!(f.conversation.session(USER), before);

        f.posts.set_fail_create(false);
        send(&f.conversation, text("2030-06-01 18:30")).await;
        assert_eq!(f.conversation.session(USER), None);
        assert_eq!(f.posts.created().len(), 2);
    }

    #[tokio::test]
    async fn test_users_not_on_allow_list_are_ignored() {
        let f = fixture();

        let replies = f.conversation.handle(999, Interaction::Start).await.unwrap();

        assert!(replies.is_empty());
        assert_eq!(f.conversation.session(999), None);
    }

    #[tokio::test]
    async fn test_users_do_not_share_state() {
        let f = fixture();
        let other = USER + 1;

        send(&f.conversation, Interaction::Start).await;
        f.conversation.handle(other, Interaction::Start).await.unwrap();
        send(&f.conversation, text("Mine")).await;
        f.conversation.handle(other, text("Theirs")).await.unwrap();
        f.conversation.handle(other, text(CANCEL)).await.unwrap();

        assert_eq!(f.conversation.session(USER).unwrap().draft.title, "Mine");
        assert_eq!(f.conversation.session(other), None);
    }

    #[test]
    fn test_parse_publish_date() {
        let zone = chrono_tz::Asia::Yekaterinburg;
        assert_eq!(
            parse_publish_date(" 2025-01-31 18:30 ", &zone),
            Some(Utc.with_ymd_and_hms(2025, 1, 31, 13, 30, 0).unwrap())
        );
        assert_eq!(parse_publish_date("2025-02-30 10:00", &zone), None);
        assert_eq!(parse_publish_date("", &zone), None);
    }

    #[test]
    fn test_parse_publish_date_across_daylight_saving() {
        let zone = chrono_tz::Europe::Berlin;

        // Winter +01:00, summer +02:00
        assert_eq!(
            parse_publish_date("2025-01-15 12:00", &zone),
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 11, 0, 0).unwrap())
        );
        assert_eq!(
            parse_publish_date("2025-07-15 12:00", &zone),
            Some(Utc.with_ymd_and_hms(2025, 7, 15, 10, 0, 0).unwrap())
        );
        // Skipped hour on 2025-03-30
        assert_eq!(parse_publish_date("2025-03-30 02:30", &zone), None);
        // Repeated hour on 2025-10-26: first pass, still +02:00
        assert_eq!(
            parse_publish_date("2025-10-26 02:30", &zone),
            Some(Utc.with_ymd_and_hms(2025, 10, 26, 0, 30, 0).unwrap())
        );
    }
}
