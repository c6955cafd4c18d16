use crux_core::testing::AppTester;
use shared::api::{
    ActivitySort, Alert, AlertId, AlertListResponse, CameraId, CameraStatusResponse,
    CheckForAlertsResponse, FetchError, StatusResponse,
};
use shared::audio::{PlayRequest, PlaybackOutcome, PlaybackStrategy};
use shared::capabilities::{AudioOperation, NavigationOperation};
use shared::{
    AlertConfig, AudioState, Effect, Event, Model, PresentationState, Secret, UnixTimeMs,
    LIVE_CAMERA_ROUTE,
};

const T0: u64 = 1_700_000_000_000;

type Tester = AppTester<shared::App, Effect>;

fn alert(id: &str, camera: &str) -> Alert {
    Alert {
        id: AlertId::new(id),
        camera_id: CameraId::new("cam-1"),
        camera_name: camera.to_string(),
        thumbnail: Some("/media/thumb.jpg".to_string()),
        timestamp: "2026-10-18T10:00:00Z".to_string(),
        video_clip: None,
    }
}

fn http_urls(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Http(req) => Some(req.operation.url.clone()),
            _ => None,
        })
        .collect()
}

fn audio_ops(effects: &[Effect]) -> Vec<AudioOperation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Audio(req) => Some(req.operation.clone()),
            _ => None,
        })
        .collect()
}

fn play_requests(effects: &[Effect]) -> Vec<PlayRequest> {
    audio_ops(effects)
        .into_iter()
        .filter_map(|op| match op {
            AudioOperation::Play(request) => Some(request),
            _ => None,
        })
        .collect()
}

fn tick(app: &Tester, model: &mut Model, at: u64) -> Vec<Effect> {
    app.update(Event::Tick { now: UnixTimeMs(at) }, model).effects
}

/// Mounted with a credential and the load window already closed by an
/// interaction at `T0`.
fn ready(config: Option<AlertConfig>) -> (Tester, Model) {
    let app = Tester::default();
    let mut model = Model::default();
    app.update(
        Event::Mounted {
            now: UnixTimeMs(T0),
            config: config.map(Box::new),
            credential: Some(Secret::new("token-abc")),
        },
        &mut model,
    );
    app.update(Event::UserInteracted, &mut model);
    assert!(!model.guard.app_just_loaded());
    (app, model)
}

/// Drives one alert through poll result and camera gate.
fn deliver(app: &Tester, model: &mut Model, alert: Alert) -> Vec<Effect> {
    let update = app.update(
        Event::AlertsChecked(Box::new(Ok(CheckForAlertsResponse {
            status: "success".to_string(),
            unreviewed_count: 1,
            latest_alert: Some(alert.clone()),
        }))),
        model,
    );
    assert!(
        http_urls(&update.effects)
            .iter()
            .any(|u| u.ends_with("check-camera-status/cam-1/")),
        "expected a camera status lookup"
    );
    app.update(
        Event::CameraStatusChecked {
            alert: Box::new(alert),
            result: Ok(CameraStatusResponse {
                status: "active".to_string(),
            }),
        },
        model,
    )
    .effects
}

fn start_playing(app: &Tester, model: &mut Model, request: &PlayRequest) {
    app.update(
        Event::PlaybackSettled {
            session: request.session,
            outcome: PlaybackOutcome::Started,
        },
        model,
    );
}

#[test]
fn test_mount_polls_with_bearer_token() {
    let app = Tester::default();
    let mut model = Model::default();
    let update = app.update(
        Event::Mounted {
            now: UnixTimeMs(T0),
            config: None,
            credential: Some(Secret::new("token-abc")),
        },
        &mut model,
    );

    let request = update
        .effects
        .iter()
        .find_map(|e| match e {
            Effect::Http(req) => Some(req.operation.clone()),
            _ => None,
        })
        .expect("poll request");
    assert_eq!(
        request.url,
        format!("http://localhost:8000/api/check-for-alerts/?t={T0}")
    );
    assert!(request
        .headers
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case("authorization") && h.value == "Bearer token-abc"));

    let kv_reads = update
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::KeyValue(_)))
        .count();
    assert_eq!(kv_reads, 5);
    assert!(audio_ops(&update.effects).contains(&AudioOperation::Stop { session: None }));
}

#[test]
fn test_no_credential_means_no_poll() {
    let app = Tester::default();
    let mut model = Model::default();
    let update = app.update(
        Event::Mounted {
            now: UnixTimeMs(T0),
            config: None,
            credential: None,
        },
        &mut model,
    );
    assert!(http_urls(&update.effects).is_empty());

    let effects = tick(&app, &mut model, T0 + 5_000);
    assert!(http_urls(&effects).is_empty());
    assert_eq!(model.poller.polls_issued(), 0);
}

#[test]
fn test_accepted_alert_is_shown_and_plays() {
    let (app, mut model) = ready(None);

    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let plays = play_requests(&effects);
    assert_eq!(plays.len(), 1);
    assert!(plays[0].looped);
    assert_eq!(plays[0].strategy, PlaybackStrategy::Primary);
    assert!(plays[0].src.starts_with("/alert-sound.mp3?v="));

    let view = app.view(&model);
    assert_eq!(view.presentation, PresentationState::Visible);
    assert_eq!(view.unreviewed_count, 1);
    let card = view.alert.expect("alert card");
    assert_eq!(card.id, "42");
    assert_eq!(card.headline, "SHOPLIFTING ALERT!!");
    assert_eq!(card.camera_name, "Front Entrance");

    start_playing(&app, &mut model, &plays[0]);
    assert_eq!(app.view(&model).audio, AudioState::Playing);
}

#[test]
fn test_camera_lookup_failure_drops_alert() {
    let (app, mut model) = ready(None);
    let a = alert("7", "Aisle 3");

    app.update(
        Event::AlertsChecked(Box::new(Ok(CheckForAlertsResponse {
            status: "success".to_string(),
            unreviewed_count: 0,
            latest_alert: Some(a.clone()),
        }))),
        &mut model,
    );
    let update = app.update(
        Event::CameraStatusChecked {
            alert: Box::new(a.clone()),
            result: Err(FetchError::Status { status: 500 }),
        },
        &mut model,
    );
    assert!(play_requests(&update.effects).is_empty());
    assert_eq!(app.view(&model).presentation, PresentationState::Hidden);

    // Seen again on the next poll: already processed, no second lookup.
    let update = app.update(
        Event::AlertsChecked(Box::new(Ok(CheckForAlertsResponse {
            status: "success".to_string(),
            unreviewed_count: 0,
            latest_alert: Some(a),
        }))),
        &mut model,
    );
    assert!(http_urls(&update.effects).is_empty());
}

#[test]
fn test_inactive_camera_drops_alert() {
    let (app, mut model) = ready(None);
    let a = alert("8", "Loading Dock");
    app.update(
        Event::AlertsChecked(Box::new(Ok(CheckForAlertsResponse {
            status: "success".to_string(),
            unreviewed_count: 0,
            latest_alert: Some(a.clone()),
        }))),
        &mut model,
    );
    app.update(
        Event::CameraStatusChecked {
            alert: Box::new(a.clone()),
            result: Ok(CameraStatusResponse {
                status: "inactive".to_string(),
            }),
        },
        &mut model,
    );
    assert!(model.filter.is_known(&a.id));
    assert_eq!(model.presenter.state(), PresentationState::Hidden);
}

#[test]
fn test_same_alert_is_shown_once() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    assert_eq!(play_requests(&effects).len(), 1);

    let update = app.update(
        Event::AlertsChecked(Box::new(Ok(CheckForAlertsResponse {
            status: "success".to_string(),
            unreviewed_count: 1,
            latest_alert: Some(alert("42", "Front Entrance")),
        }))),
        &mut model,
    );
    assert!(http_urls(&update.effects).is_empty());
    assert_eq!(model.presenter.queued_len(), 0);
}

#[test]
fn test_dismiss_hides_after_transition_and_holds_user_stop() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let play = play_requests(&effects).remove(0);
    start_playing(&app, &mut model, &play);

    tick(&app, &mut model, T0 + 100);
    let update = app.update(Event::DismissRequested, &mut model);
    assert!(audio_ops(&update.effects).contains(&AudioOperation::Stop {
        session: Some(play.session)
    }));
    assert_eq!(model.audio.state(), AudioState::Stopped);
    assert!(model.audio.user_stopped());
    assert_eq!(app.view(&model).presentation, PresentationState::Dismissing);

    tick(&app, &mut model, T0 + 399);
    assert_eq!(model.presenter.state(), PresentationState::Dismissing);

    tick(&app, &mut model, T0 + 400);
    assert_eq!(model.presenter.state(), PresentationState::Hidden);
    assert!(app.view(&model).alert.is_none());
    assert!(model.audio.user_stopped());

    tick(&app, &mut model, T0 + 1_399);
    assert!(model.audio.user_stopped());
    tick(&app, &mut model, T0 + 1_400);
    assert!(!model.audio.user_stopped());
}

#[test]
fn test_dismiss_releases_audio_exactly_once() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let play = play_requests(&effects).remove(0);
    start_playing(&app, &mut model, &play);
    let stops = |effects: &[Effect]| {
        audio_ops(effects)
            .into_iter()
            .filter(|op| matches!(op, AudioOperation::Stop { .. }))
            .count()
    };

    let mut released = stops(&app.update(Event::DismissRequested, &mut model).effects);
    let again = app.update(Event::DismissRequested, &mut model);
    assert_eq!(stops(&again.effects), 0, "second dismiss while dismissing");
    released += stops(&tick(&app, &mut model, T0 + 300));

    assert_eq!(released, 1);
    assert_eq!(model.presenter.state(), PresentationState::Hidden);
    assert_eq!(model.audio.stop_count(), 1);
}

#[test]
fn test_escape_key_dismisses_visible_alert() {
    let (app, mut model) = ready(None);
    deliver(&app, &mut model, alert("42", "Front Entrance"));

    app.update(
        Event::KeyPressed {
            key: "Enter".to_string(),
        },
        &mut model,
    );
    assert_eq!(model.presenter.state(), PresentationState::Visible);

    app.update(
        Event::KeyPressed {
            key: "Escape".to_string(),
        },
        &mut model,
    );
    assert_eq!(model.presenter.state(), PresentationState::Dismissing);
}

#[test]
fn test_backlog_promotes_after_dismiss() {
    let config = AlertConfig {
        cooldown_ms: 0,
        ..AlertConfig::default()
    };
    let (app, mut model) = ready(Some(config));

    deliver(&app, &mut model, alert("1", "Entrance"));
    let effects = deliver(&app, &mut model, alert("2", "Register"));
    assert!(play_requests(&effects).is_empty());
    assert_eq!(app.view(&model).queued_count, 1);
    assert_eq!(app.view(&model).alert.expect("first").id, "1");

    app.update(Event::DismissRequested, &mut model);
    let effects = tick(&app, &mut model, T0 + 300);

    let view = app.view(&model);
    assert_eq!(view.presentation, PresentationState::Visible);
    assert_eq!(view.alert.expect("second").id, "2");
    assert_eq!(view.queued_count, 0);
    assert_eq!(play_requests(&effects).len(), 1);
    assert!(!model.audio.user_stopped());
}

#[test]
fn test_throttled_alert_waits_for_cooldown() {
    let (app, mut model) = ready(None);
    deliver(&app, &mut model, alert("1", "Entrance"));

    tick(&app, &mut model, T0 + 1_000);
    deliver(&app, &mut model, alert("2", "Register"));
    assert_eq!(model.presenter.queued_len(), 1);

    app.update(Event::DismissRequested, &mut model);
    tick(&app, &mut model, T0 + 1_300);
    assert_eq!(model.presenter.state(), PresentationState::Hidden);

    tick(&app, &mut model, T0 + 29_999);
    assert_eq!(model.presenter.state(), PresentationState::Hidden);

    let effects = tick(&app, &mut model, T0 + 30_000);
    assert_eq!(model.presenter.state(), PresentationState::Visible);
    assert_eq!(app.view(&model).alert.expect("second").id, "2");
    assert_eq!(play_requests(&effects).len(), 1);
}

#[test]
fn test_watchdog_restarts_silently_dead_audio() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let play = play_requests(&effects).remove(0);
    start_playing(&app, &mut model, &play);

    let effects = tick(&app, &mut model, T0 + 2_000);
    assert!(audio_ops(&effects).contains(&AudioOperation::CheckActive {
        session: play.session
    }));

    let update = app.update(
        Event::PlaybackChecked {
            session: play.session,
            active: false,
        },
        &mut model,
    );
    let restarted = play_requests(&update.effects);
    assert_eq!(restarted.len(), 1);
    assert_ne!(restarted[0].session, play.session);
}

#[test]
fn test_fallback_then_system_notification() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let primary = play_requests(&effects).remove(0);

    let update = app.update(
        Event::PlaybackSettled {
            session: primary.session,
            outcome: PlaybackOutcome::Failed {
                reason: "NotAllowedError".to_string(),
            },
        },
        &mut model,
    );
    let fallback = play_requests(&update.effects).remove(0);
    assert_eq!(fallback.strategy, PlaybackStrategy::Fallback);
    assert!(fallback.muted_until_attached);

    let update = app.update(
        Event::PlaybackSettled {
            session: fallback.session,
            outcome: PlaybackOutcome::Failed {
                reason: "NotAllowedError".to_string(),
            },
        },
        &mut model,
    );
    assert!(update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Notification(_))));
    assert!(model.audio.is_silenced());

    // Chain exhausted: the watchdog leaves this alert quiet.
    let effects = tick(&app, &mut model, T0 + 2_000);
    assert!(play_requests(&effects).is_empty());
}

#[test]
fn test_view_camera_pauses_polling_and_navigates() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let play = play_requests(&effects).remove(0);
    start_playing(&app, &mut model, &play);

    let update = app.update(Event::ViewCameraRequested, &mut model);
    assert!(update.effects.iter().any(|e| matches!(
        e,
        Effect::Navigation(req) if req.operation == NavigationOperation::Navigate {
            route: LIVE_CAMERA_ROUTE.to_string()
        }
    )));
    assert!(model.poller.is_paused());
    assert!(model.audio.user_stopped());
    assert!(app.view(&model).polling_paused);

    // Poll beat while paused issues nothing.
    let polls = model.poller.polls_issued();
    tick(&app, &mut model, T0 + 4_999);
    assert_eq!(model.poller.polls_issued(), polls);

    tick(&app, &mut model, T0 + 5_000);
    assert!(!model.poller.is_paused());
}

#[test]
fn test_route_change_hides_immediately() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let play = play_requests(&effects).remove(0);
    start_playing(&app, &mut model, &play);

    let update = app.update(
        Event::RouteChanged {
            path: "/settings".to_string(),
        },
        &mut model,
    );
    assert!(audio_ops(&update.effects).contains(&AudioOperation::Stop {
        session: Some(play.session)
    }));
    assert_eq!(model.presenter.state(), PresentationState::Hidden);
    assert!(model.audio.user_stopped());

    // No cooldown timer: the flag stays set.
    tick(&app, &mut model, T0 + 3_000);
    assert!(model.audio.user_stopped());
}

#[test]
fn test_mark_reviewed_success_and_failure() {
    let (app, mut model) = ready(None);
    let update = app.update(
        Event::MarkReviewedRequested {
            alert_id: AlertId::new("42"),
        },
        &mut model,
    );
    let request = update
        .effects
        .iter()
        .find_map(|e| match e {
            Effect::Http(req) => Some(req.operation.clone()),
            _ => None,
        })
        .expect("mark reviewed request");
    assert_eq!(request.method, "POST");
    assert!(request.url.ends_with("mark-alert-as-reviewed/42/"));
    assert_eq!(request.body, b"{}".to_vec());

    app.update(
        Event::AlertMarkedReviewed {
            alert_id: AlertId::new("42"),
            result: Ok(StatusResponse {
                status: "success".to_string(),
            }),
        },
        &mut model,
    );
    assert!(model.filter.is_known(&AlertId::new("42")));
    let toast = app.view(&model).toast.expect("toast");
    assert_eq!(toast.kind, "success");
    assert_eq!(
        toast.message,
        "Alert marked as reviewed and scheduled for deletion"
    );

    app.update(
        Event::AlertMarkedReviewed {
            alert_id: AlertId::new("43"),
            result: Err(FetchError::transport("offline")),
        },
        &mut model,
    );
    let toast = app.view(&model).toast.expect("toast");
    assert_eq!(toast.kind, "error");

    tick(&app, &mut model, T0 + 3_000);
    assert!(app.view(&model).toast.is_none());
}

#[test]
fn test_unmount_stops_audio_and_ignores_late_responses() {
    let (app, mut model) = ready(None);
    let effects = deliver(&app, &mut model, alert("42", "Front Entrance"));
    let play = play_requests(&effects).remove(0);
    start_playing(&app, &mut model, &play);

    let update = app.update(Event::Unmounted, &mut model);
    assert!(audio_ops(&update.effects).contains(&AudioOperation::Stop {
        session: Some(play.session)
    }));
    assert_eq!(model.scheduler.active_count(), 0);

    let update = app.update(
        Event::AlertsChecked(Box::new(Ok(CheckForAlertsResponse {
            status: "success".to_string(),
            unreviewed_count: 9,
            latest_alert: Some(alert("99", "Back Door")),
        }))),
        &mut model,
    );
    assert!(update.effects.is_empty());
    assert_eq!(model.unreviewed_count, 0);
}

#[test]
fn test_activity_feed_pages_in_time_order() {
    let (app, mut model) = ready(None);
    let update = app.update(Event::ActivityRequested, &mut model);
    assert!(http_urls(&update.effects)
        .iter()
        .any(|u| u.contains("shoplifting-alerts/?t=")));
    assert!(app.view(&model).activity.is_loading);

    let mut alerts: Vec<Alert> = (0..11)
        .map(|n| Alert {
            timestamp: format!("2026-10-18T09:{n:02}:00Z"),
            ..alert(&n.to_string(), "Aisle")
        })
        .collect();
    alerts.push(Alert {
        timestamp: "2026-10-18T09:10:00.5Z".to_string(),
        ..alert("10.5", "Aisle")
    });
    app.update(
        Event::ActivityLoaded(Box::new(Ok(AlertListResponse {
            status: "success".to_string(),
            alerts,
        }))),
        &mut model,
    );

    let feed = app.view(&model).activity;
    assert!(!feed.is_loading);
    assert_eq!(feed.total_items, 12);
    assert_eq!((feed.page, feed.page_count, feed.page_size), (1, 2, 10));
    let ids: Vec<&str> = feed.items.iter().take(2).map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["10.5", "10"]);

    app.update(Event::ActivityPageChanged { page: 2 }, &mut model);
    let feed = app.view(&model).activity;
    assert_eq!(feed.page, 2);
    assert_eq!(feed.items.len(), 2);

    app.update(
        Event::ActivitySortChanged {
            sort: ActivitySort::Oldest,
        },
        &mut model,
    );
    let feed = app.view(&model).activity;
    assert_eq!(feed.page, 2);
    assert_eq!(feed.items.last().map(|i| i.id.as_str()), Some("10.5"));

    app.update(Event::ActivityPageSizeChanged { page_size: 20 }, &mut model);
    let feed = app.view(&model).activity;
    assert_eq!((feed.page, feed.page_count, feed.items.len()), (1, 1, 12));
}
