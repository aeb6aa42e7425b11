//! Behaviour-driven development (BDD) tests for the launch flow.
//!
//! These scenarios follow a group from the bot's deep link to the group the
//! mini-app session resolves, and check the user bookkeeping done when a
//! session opens.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use serde_json::json;
use taskboard::domain::ports::UserRepository;
use taskboard::domain::{
    BotCommandHandler, Error, GroupContextResolver, GroupId, GroupResolutionError,
    IdentityError, IdentityResolver, IncomingMessage, LAUNCH_PARAM, LaunchContext,
    OutgoingMessage, PlatformIdentity, PlatformUserId, RunMode, UserDocument, UserRecord,
};
use taskboard::outbound::realtime::InMemoryUserRepository;
use tokio::runtime::Runtime;
use tracing::Span;
use url::Url;

// -----------------------------------------------------------------------------
// Test World
// -----------------------------------------------------------------------------

/// Wrapper for non-Clone types to enable storage in `Slot`.
#[derive(Clone)]
struct RuntimeHandle(Arc<Runtime>);

/// Clock pinned to one instant.
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

fn first_seen() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn session_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// Test world holding configuration and the latest results.
#[derive(Default, ScenarioState)]
struct LaunchWorld {
    runtime: Slot<RuntimeHandle>,
    users: Slot<Arc<InMemoryUserRepository>>,
    mode: Slot<RunMode>,
    webapp_url: Slot<Url>,
    replies: Slot<Vec<OutgoingMessage>>,
    group: Slot<Result<GroupId, GroupResolutionError>>,
    identity: Slot<Result<PlatformIdentity, IdentityError>>,
}

impl LaunchWorld {
    fn mode(&self) -> RunMode {
        self.mode.get().expect("mode should be set")
    }

    fn users(&self) -> Arc<InMemoryUserRepository> {
        self.users.get().expect("user repository")
    }

    fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        let runtime = self.runtime.get().expect("runtime");
        runtime.0.block_on(future)
    }

    fn resolve_group(&self, param: Option<&str>) {
        let resolver = GroupContextResolver::new(self.mode(), Span::none());
        self.group.set(resolver.resolve(param));
    }

    fn resolve_identity(&self, context: &LaunchContext) {
        let users: Arc<dyn UserRepository> = self.users();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(session_time()));
        let resolver = IdentityResolver::new(users, clock, self.mode(), Span::none());
        let result = self.block_on(resolver.resolve(context));
        self.identity.set(result);
    }

    fn stored_user(&self, id: &str) -> UserRecord {
        let id = PlatformUserId::new(id.parse().expect("numeric user id"));
        self.block_on(self.users().find_document(&id))
            .expect("lookup")
            .expect("stored user")
            .into_record()
            .expect("canonical record")
    }
}

#[fixture]
fn world() -> LaunchWorld {
    let world = LaunchWorld::default();
    world
        .runtime
        .set(RuntimeHandle(Arc::new(Runtime::new().expect("create runtime"))));
    world.users.set(Arc::new(InMemoryUserRepository::new()));
    world
}

// -----------------------------------------------------------------------------
// Given Steps
// -----------------------------------------------------------------------------

#[given("the service runs in {mode} mode")]
fn the_service_runs_in_mode(world: &LaunchWorld, mode: String) {
    world.mode.set(mode.parse().expect("known run mode"));
}

#[given("the mini-app is served at {url}")]
fn the_mini_app_is_served_at(world: &LaunchWorld, url: String) {
    world.webapp_url.set(Url::parse(&url).expect("webapp url"));
}

#[given("user {id} was first seen with legacy field names")]
fn user_was_first_seen_with_legacy_field_names(world: &LaunchWorld, id: String) {
    let raw_id: i64 = id.parse().expect("numeric user id");
    let document = UserDocument::from_value(json!({
        "id": raw_id,
        "first_name": "Old name",
        "language_code": "fr",
        "createdAt": first_seen(),
        "updatedAt": first_seen(),
        "lastLogin": first_seen(),
        "groups": ["g-legacy"]
    }))
    .expect("object document");
    let users = world.users();
    world
        .block_on(users.save(&PlatformUserId::new(raw_id), &document))
        .expect("seeded user");
}

// -----------------------------------------------------------------------------
// When Steps
// -----------------------------------------------------------------------------

#[when("the bot receives {command} in chat {chat_id}")]
fn the_bot_receives_command_in_chat(world: &LaunchWorld, command: String, chat_id: String) {
    let handler = BotCommandHandler::new(world.webapp_url.get(), world.mode(), Span::none());
    let message = IncomingMessage {
        chat_id: chat_id.parse().expect("numeric chat id"),
        chat_kind: "supergroup".to_owned(),
        text: Some(command),
    };
    world.replies.set(handler.replies(&message));
}

#[when("a session opens with launch parameter {param}")]
fn a_session_opens_with_launch_parameter(world: &LaunchWorld, param: String) {
    world.resolve_group(Some(&param));
}

#[when("a session opens without a launch parameter")]
fn a_session_opens_without_a_launch_parameter(world: &LaunchWorld) {
    world.resolve_group(None);
}

#[when("user {id} named {name} opens the mini-app")]
fn user_named_opens_the_mini_app(world: &LaunchWorld, id: String, name: String) {
    let identity = PlatformIdentity {
        id: PlatformUserId::new(id.parse().expect("numeric user id")),
        first_name: name,
        last_name: None,
        username: None,
        language_code: Some("en".to_owned()),
        is_premium: None,
    };
    world.resolve_identity(&LaunchContext::with_user(identity));
}

#[when("a session opens without platform data")]
fn a_session_opens_without_platform_data(world: &LaunchWorld) {
    world.resolve_identity(&LaunchContext::empty());
}

// -----------------------------------------------------------------------------
// Then Steps
// -----------------------------------------------------------------------------

#[then("the bot replies with an {label} button")]
fn the_bot_replies_with_a_button(world: &LaunchWorld, label: String) {
    let replies = world.replies.get().expect("replies");
    let button = replies
        .first()
        .and_then(|reply| reply.button.as_ref())
        .expect("first reply has a button");
    assert_eq!(button.text, label);
}

#[then("the button opens the board for group {group}")]
fn the_button_opens_the_board_for_group(world: &LaunchWorld, group: String) {
    let replies = world.replies.get().expect("replies");
    let link = &replies
        .first()
        .and_then(|reply| reply.button.as_ref())
        .expect("button")
        .url;
    let param = link
        .query_pairs()
        .find(|(key, _)| key == LAUNCH_PARAM)
        .map(|(_, value)| value.into_owned());
    let resolver = GroupContextResolver::new(world.mode(), Span::none());
    let resolved = resolver.resolve(param.as_deref()).expect("group resolves");
    assert_eq!(resolved.to_string(), group);
}

#[then("the bot sends {count} messages")]
fn the_bot_sends_messages(world: &LaunchWorld, count: String) {
    let replies = world.replies.get().expect("replies");
    assert_eq!(replies.len(), count.parse::<usize>().expect("numeric count"));
}

#[then("the last message mentions {text}")]
fn the_last_message_mentions(world: &LaunchWorld, text: String) {
    let replies = world.replies.get().expect("replies");
    let last = replies.last().expect("at least one reply");
    assert!(
        last.text.contains(&text),
        "expected {text:?} in {:?}",
        last.text
    );
}

#[then("group resolution fails with {code}")]
fn group_resolution_fails_with(world: &LaunchWorld, code: String) {
    let error = world
        .group
        .get()
        .expect("group result")
        .expect_err("resolution should fail");
    assert_eq!(Error::from(error).code().as_str(), code);
}

#[then("the session group is {group}")]
fn the_session_group_is(world: &LaunchWorld, group: String) {
    let resolved = world.group.get().expect("group result").expect("group");
    assert_eq!(resolved.to_string(), group);
}

#[then("the stored user {id} is named {name}")]
fn the_stored_user_is_named(world: &LaunchWorld, id: String, name: String) {
    let record = world.stored_user(&id);
    assert_eq!(record.first_name, name);
    assert_eq!(record.language_code.as_deref(), Some("en"));
    assert_eq!(record.last_seen, session_time());
}

#[then("the stored user {id} keeps its first sighting")]
fn the_stored_user_keeps_its_first_sighting(world: &LaunchWorld, id: String) {
    let record = world.stored_user(&id);
    assert_eq!(record.created_at, first_seen());
    assert_eq!(record.updated_at, session_time());
}

#[then("the stored user {id} keeps group {group}")]
fn the_stored_user_keeps_group(world: &LaunchWorld, id: String, group: String) {
    let record = world.stored_user(&id);
    assert_eq!(record.groups, vec![group]);
}

#[then("identity resolution is unavailable")]
fn identity_resolution_is_unavailable(world: &LaunchWorld) {
    let result = world.identity.get().expect("identity result");
    assert_eq!(result, Err(IdentityError::NotAvailable));
}

#[then("the resolved identity is {username}")]
fn the_resolved_identity_is(world: &LaunchWorld, username: String) {
    let identity = world
        .identity
        .get()
        .expect("identity result")
        .expect("identity");
    assert_eq!(identity.username.as_deref(), Some(username.as_str()));
}

// -----------------------------------------------------------------------------
// Scenario Bindings
// -----------------------------------------------------------------------------

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "The bot deep link opens the chat's board"
)]
fn bot_deep_link_opens_the_board(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "Development replies carry diagnostics"
)]
fn development_replies_carry_diagnostics(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "Production rejects an undecodable launch parameter"
)]
fn production_rejects_undecodable_parameter(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "Production requires a launch parameter"
)]
fn production_requires_a_parameter(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "Development falls back to the shared test group"
)]
fn development_falls_back_to_test_group(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "A returning user keeps history while the profile refreshes"
)]
fn returning_user_keeps_history(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "Production sessions without platform data have no identity"
)]
fn production_sessions_have_no_identity(world: LaunchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/launch_flow.feature",
    name = "Development sessions use the stand-in identity"
)]
fn development_sessions_use_stand_in_identity(world: LaunchWorld) {
    let _ = world;
}
