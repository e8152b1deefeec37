use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use navi_core::backend::{CollectionPath, DocumentPath, DocumentStore};
use navi_core::{
    ActionError, ActiveScreen, App, AuthUser, ManualClock, PreferencesPatch, Route, Session,
    SqliteDocumentStore, StoreError, TaskListPatch, ThemeMode, ToastKind, ValidationError, Zone,
};
use std::sync::Arc;

struct Fixture {
    app: App,
    backend: Arc<SqliteDocumentStore>,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    fixture_at(
        Utc.with_ymd_and_hms(2025, 6, 10, 7, 30, 0).unwrap(),
        Some(Zone::Named(chrono_tz::UTC)),
    )
}

fn fixture_at(start: DateTime<Utc>, zone_override: Option<Zone>) -> Fixture {
    let clock = Arc::new(ManualClock::new(start));
    let backend = Arc::new(
        SqliteDocumentStore::in_memory()
            .unwrap()
            .with_clock(clock.clone()),
    );
    let mut session = Session::new(backend.clone(), clock.clone());
    if let Some(zone) = zone_override {
        session = session.with_zone_override(zone);
    }
    Fixture {
        app: App::new(session),
        backend,
        clock,
    }
}

fn alice() -> AuthUser {
    AuthUser::new("u1", "alice@example.com")
}

fn toast_messages(app: &App) -> Vec<(ToastKind, String)> {
    app.notifications()
        .drain()
        .into_iter()
        .map(|toast| (toast.kind, toast.message))
        .collect()
}

#[test]
fn sign_up_writes_defaults_and_attaches_stores() {
    let fixture = fixture();
    let profile = fixture.app.sign_up(alice()).unwrap();

    assert_eq!(profile.email, "alice@example.com");
    assert_eq!(profile.preferences.theme, ThemeMode::System);
    assert_eq!(profile.preferences.reset_time, "00:00");

    let session = fixture.app.session();
    assert!(session.is_signed_in());
    assert!(session.lists().is_subscribed());
    assert!(session.active().is_subscribed());
    assert!(session.notes().is_subscribed());
}

#[test]
fn sign_out_clears_local_state() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();
    fixture.app.create_list("Morning", 7).unwrap();
    assert_eq!(fixture.app.session().lists().lists().len(), 1);

    fixture.app.sign_out();

    let session = fixture.app.session();
    assert!(!session.is_signed_in());
    assert!(!session.lists().is_subscribed());
    assert!(session.lists().lists().is_empty());
    assert!(session.lists().state().is_loading);
}

#[test]
fn switching_users_never_shows_previous_data() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();
    fixture.app.create_list("Alice's list", 7).unwrap();

    fixture
        .app
        .sign_up(AuthUser::new("u2", "bob@example.com"))
        .unwrap();
    assert!(fixture.app.session().lists().lists().is_empty());

    fixture.app.sign_in(alice()).unwrap();
    let titles: Vec<String> = fixture
        .app
        .session()
        .lists()
        .lists()
        .into_iter()
        .map(|list| list.title)
        .collect();
    assert_eq!(titles, vec!["Alice's list"]);
}

#[test]
fn sign_in_without_profile_uses_default_preferences() {
    let fixture = fixture();
    fixture.app.sign_in(alice()).unwrap();
    assert_eq!(fixture.app.session().preferences().reset_time, "00:00");
    assert!(fixture.app.session().lists().is_subscribed());
}

#[test]
fn invalid_input_never_reaches_the_backend() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();

    let blank = fixture.app.create_list("   ", 7).unwrap_err();
    assert!(matches!(
        blank,
        ActionError::Invalid(ValidationError::EmptyField("title"))
    ));
    let short = fixture.app.create_list("Focus", 0).unwrap_err();
    assert!(matches!(
        short,
        ActionError::Invalid(ValidationError::DurationTooShort(0))
    ));

    let stored = fixture
        .backend
        .list_documents(&CollectionPath::lists("u1"), None)
        .unwrap();
    assert!(stored.is_empty());
    assert!(fixture.app.notifications().pending().is_empty());
}

#[test]
fn actions_require_a_signed_in_user() {
    let fixture = fixture();
    let err = fixture.app.create_list("Focus", 7).unwrap_err();
    assert!(matches!(err, ActionError::NotSignedIn));
}

#[test]
fn backend_failures_are_reported_as_toasts() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();

    let err = fixture
        .app
        .update_list(
            "ghost",
            TaskListPatch {
                duration: Some(14),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, ActionError::Reported(StoreError::ListNotFound(_))));
    assert_eq!(
        toast_messages(&fixture.app),
        vec![(ToastKind::Error, "Failed to update list".to_string())]
    );
}

#[test]
fn activation_toasts_describe_the_outcome() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();
    let list_id = fixture.app.create_list("Morning", 7).unwrap();
    fixture.app.notifications().drain();

    let err = fixture.app.activate_list(&list_id).unwrap_err();
    assert!(matches!(
        err,
        ActionError::Invalid(ValidationError::EmptyTaskList)
    ));
    assert_eq!(
        toast_messages(&fixture.app),
        vec![(
            ToastKind::Error,
            "Add some tasks before activating".to_string()
        )]
    );

    fixture.app.add_task(&list_id, "Stretch", true).unwrap();
    fixture.app.activate_list(&list_id).unwrap();
    assert_eq!(
        toast_messages(&fixture.app),
        vec![(ToastKind::Success, "\"Morning\" is now active!".to_string())]
    );
}

#[test]
fn active_view_tracks_the_running_challenge() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();
    assert_eq!(fixture.app.active_view().unwrap(), ActiveScreen::Idle);

    let list_id = fixture.app.create_list("Morning", 7).unwrap();
    let stretch = fixture.app.add_task(&list_id, "Stretch", true).unwrap();
    fixture.app.add_task(&list_id, "Book venue", false).unwrap();
    fixture.app.activate_list(&list_id).unwrap();

    assert!(fixture.app.set_task_done(&stretch.id, true).unwrap());
    let ActiveScreen::Challenge(view) = fixture.app.active_view().unwrap() else {
        panic!("expected a running challenge");
    };
    assert_eq!(view.day.day_number, 1);
    assert_eq!(view.progress.completed, 1);
    assert_eq!(view.progress.total, 2);
    assert_eq!(view.tasks[0].task.title, "Stretch");
    assert!(view.tasks[0].done);

    fixture.clock.advance(Duration::days(1));
    let ActiveScreen::Challenge(view) = fixture.app.active_view().unwrap() else {
        panic!("expected a running challenge");
    };
    assert_eq!(view.today, NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());
    assert_eq!(view.day.day_number, 2);
    assert_eq!(view.progress.completed, 0);
    let active = fixture.app.session().active().current().unwrap();
    assert_eq!(active.last_reset_date, view.today);

    fixture.app.delete_list(&list_id).unwrap();
    assert_eq!(
        fixture.app.active_view().unwrap(),
        ActiveScreen::SourceMissing {
            list_title: "Morning".to_string()
        }
    );
}

#[test]
fn preferences_are_validated_and_merged() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();

    let err = fixture
        .app
        .update_preferences(PreferencesPatch {
            reset_time: Some("25:00".to_string()),
            ..PreferencesPatch::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::Invalid(ValidationError::InvalidResetTime(_))
    ));

    let merged = fixture
        .app
        .update_preferences(PreferencesPatch {
            theme: Some(ThemeMode::Dark),
            reset_time: Some("08:00".to_string()),
            ..PreferencesPatch::default()
        })
        .unwrap();
    assert_eq!(merged.theme, ThemeMode::Dark);
    assert_eq!(fixture.app.session().preferences().reset_time, "08:00");

    // 07:30 UTC is before the 08:00 boundary, so it still counts as June 9.
    assert_eq!(
        fixture.app.session().today(),
        NaiveDate::from_ymd_opt(2025, 6, 9).unwrap()
    );
}

#[test]
fn routes_follow_the_auth_guard() {
    let fixture = fixture();
    assert_eq!(fixture.app.route("/notes"), Route::SignIn);
    assert_eq!(fixture.app.route("/signup"), Route::SignUp);

    fixture.app.sign_up(alice()).unwrap();
    assert_eq!(fixture.app.route("/signin"), Route::Home);
    assert_eq!(fixture.app.route("/notes?view=archive"), Route::Notes);
    assert_eq!(fixture.app.route("/nowhere"), Route::Home);
}

#[test]
fn stored_timezone_decides_today_and_daily_completion() {
    let fixture = fixture_at(Utc.with_ymd_and_hms(2025, 6, 11, 3, 30, 0).unwrap(), None);
    fixture.app.sign_up(alice()).unwrap();
    fixture
        .app
        .update_preferences(PreferencesPatch {
            timezone: Some("America/New_York".to_string()),
            ..PreferencesPatch::default()
        })
        .unwrap();

    // 03:30 UTC is 23:30 on June 10 in New York.
    let june_10 = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
    assert_eq!(fixture.app.session().today(), june_10);

    let list_id = fixture.app.create_list("Evening", 7).unwrap();
    let stretch = fixture.app.add_task(&list_id, "Stretch", true).unwrap();
    fixture.app.activate_list(&list_id).unwrap();
    fixture.app.set_task_done(&stretch.id, true).unwrap();
    let active = fixture.app.session().active().current().unwrap();
    assert_eq!(active.completions(&stretch.id)[0].date, june_10);

    // One hour later it is past local midnight.
    fixture.clock.advance(Duration::hours(1));
    let ActiveScreen::Challenge(view) = fixture.app.active_view().unwrap() else {
        panic!("expected a running challenge");
    };
    assert_eq!(view.today, NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());
    assert_eq!(view.day.day_number, 1);
    assert!(!view.tasks[0].done);
    assert_eq!(view.progress.completed, 0);
}

#[test]
fn signing_up_again_keeps_the_existing_profile() {
    let fixture = fixture();
    fixture.app.sign_up(alice()).unwrap();
    fixture
        .app
        .update_preferences(PreferencesPatch {
            reset_time: Some("06:00".to_string()),
            ..PreferencesPatch::default()
        })
        .unwrap();
    fixture.app.notifications().drain();

    let err = fixture.app.sign_up(alice()).unwrap_err();
    assert!(matches!(
        err,
        ActionError::Reported(StoreError::ProfileExists(_))
    ));
    assert_eq!(
        toast_messages(&fixture.app),
        vec![(ToastKind::Error, "Failed to create account".to_string())]
    );

    let stored = fixture
        .backend
        .get_document(&DocumentPath::profile("u1"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.data["preferences"]["resetTime"], "06:00");
    assert_eq!(fixture.app.session().preferences().reset_time, "06:00");
}
