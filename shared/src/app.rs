use tracing::{debug, error, info, warn};

use crate::api::{
    Alert, AlertId, AlertListResponse, CameraStatusResponse, CheckForAlertsResponse, FetchResult,
    StatusResponse,
};
use crate::audio::AudioCommand;
use crate::capabilities::{bearer, into_fetch_result, Capabilities};
use crate::config::AlertConfig;
use crate::event::{Event, Secret};
use crate::model::Model;
use crate::persistence::{read_outcome, write_outcome, StorageSlot, StoredValue};
use crate::poller::PollDecision;
use crate::presenter::PresentationState;
use crate::scheduler::TimerKind;
use crate::{
    ActivityFeedView, ActivityItem, AlertAnimation, AlertCard, Clock, ToastKind, ToastMessage,
    ToastView, UnixTimeMs, ViewModel, ACTIVITY_REVIEW_ROUTE, ALERT_HEADLINE, LIVE_CAMERA_ROUTE,
    SYSTEM_NOTIFICATION_TITLE,
};

const REVIEWED_TOAST: &str = "Alert marked as reviewed and scheduled for deletion";
const REVIEW_FAILED_TOAST: &str = "Error marking alert as reviewed";

#[derive(Default)]
pub struct App;

impl App {
    // --- persistence ---

    fn load_slot(slot: StorageSlot, caps: &Capabilities) {
        match slot.key() {
            Ok(key) => caps.kv.get(key.raw(), move |result| Event::StorageLoaded {
                slot,
                result: read_outcome(slot, result),
            }),
            Err(e) => error!(?slot, error = %e, "storage key rejected"),
        }
    }

    fn persist(value: &StoredValue, caps: &Capabilities) {
        let slot = value.slot();
        match value.encode() {
            Ok((key, bytes)) => caps.kv.set(key, bytes, move |result| Event::StorageWritten {
                slot,
                result: write_outcome(slot, result),
            }),
            Err(e) => warn!(?slot, error = %e, "storage write skipped"),
        }
    }

    /// Writes the current value of `slot`, unless its stored value has not
    /// been read back yet. Held writes are replayed by `StorageLoaded`.
    fn persist_slot(slot: StorageSlot, model: &mut Model, caps: &Capabilities) {
        if !model.storage.admit(slot) {
            debug!(?slot, "write held until stored value is read");
            return;
        }
        let value = match slot {
            StorageSlot::LastAlertId => {
                StoredValue::LastAlertId(model.filter.last_alert_id().cloned())
            }
            StorageSlot::LastAlertTime => StoredValue::LastAlertTime(model.filter.last_alert_at()),
            StorageSlot::ShownIds => StoredValue::ShownIds(model.filter.shown_ids()),
            StorageSlot::ProcessedIds => StoredValue::ProcessedIds(model.filter.reviewed_ids()),
            StorageSlot::Heartbeat => StoredValue::Heartbeat(Some(model.clock.now())),
        };
        Self::persist(&value, caps);
    }

    fn persist_last_alert(model: &mut Model, caps: &Capabilities) {
        Self::persist_slot(StorageSlot::LastAlertId, model, caps);
        Self::persist_slot(StorageSlot::LastAlertTime, model, caps);
    }

    fn restore(value: StoredValue, model: &mut Model, caps: &Capabilities) {
        match value {
            StoredValue::LastAlertId(id) => model.filter.restore_last(id, None),
            StoredValue::LastAlertTime(at) => model.filter.restore_last(None, at),
            StoredValue::ShownIds(ids) => model.filter.restore_shown(ids),
            StoredValue::ProcessedIds(ids) => model.filter.restore_reviewed(ids),
            StoredValue::Heartbeat(previous) => {
                if model.guard.heartbeat_checked() {
                    return;
                }
                let reload = model.guard.on_heartbeat_loaded(
                    previous,
                    &mut model.scheduler,
                    model.config.reload_detection_ms,
                    model.config.reload_window_ms,
                );
                debug!(reload, "heartbeat checked");
                Self::persist_slot(StorageSlot::Heartbeat, model, caps);
                let now = model.clock.now();
                model.scheduler.schedule_every(
                    TimerKind::Heartbeat,
                    now,
                    model.config.heartbeat_interval_ms,
                );
            }
        }
    }

    // --- backend ---

    fn poll(model: &mut Model, caps: &Capabilities) {
        let decision = model
            .poller
            .decide(model.guard.is_mounted(), model.has_credential());
        if decision != PollDecision::Fetch {
            debug!(?decision, "poll skipped");
            return;
        }
        let Some(token) = model.bearer_token() else {
            return;
        };
        let url = match model.api.check_for_alerts(model.clock.now()) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "alert check URL rejected");
                return;
            }
        };

        caps.http
            .get(url)
            .header("Authorization", bearer(token))
            .expect_json::<CheckForAlertsResponse>()
            .send(|result| Event::AlertsChecked(Box::new(into_fetch_result(result))));
        model.poller.record_poll();
    }

    fn alerts_checked(
        result: FetchResult<CheckForAlertsResponse>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match result {
            Ok(response) if response.is_success() => {
                model.unreviewed_count = response.unreviewed_count;
                if let Some(alert) = response.latest_alert {
                    Self::consider_alert(alert, model, caps);
                }
            }
            Ok(response) => warn!(status = %response.status, "alert check rejected"),
            Err(e) => warn!(error = %e, "alert check failed"),
        }
    }

    /// Entry point for a freshly fetched alert, ahead of the camera gate.
    fn consider_alert(alert: Alert, model: &mut Model, caps: &Capabilities) {
        if model.guard.app_just_loaded() {
            if model.filter.last_alert_id() != Some(&alert.id) {
                debug!(alert_id = %alert.id, "alert suppressed during load window");
                model.filter.record_suppressed(&alert.id);
                Self::persist_last_alert(model, caps);
            }
            return;
        }

        if model.filter.is_known(&alert.id) || model.presenter.contains(&alert.id) {
            return;
        }

        let url = match model.api.camera_status(&alert.camera_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "camera id rejected");
                model.filter.record_processed(&alert.id);
                return;
            }
        };
        let Some(token) = model.bearer_token() else {
            return;
        };
        let auth = bearer(token);
        if !model.poller.begin_camera_check(&alert.id) {
            debug!(alert_id = %alert.id, "camera check already in flight");
            return;
        }

        debug!(alert_id = %alert.id, camera_id = %alert.camera_id, "checking camera status");
        let alert = Box::new(alert);
        caps.http
            .get(url)
            .header("Authorization", auth)
            .expect_json::<CameraStatusResponse>()
            .send(move |result| Event::CameraStatusChecked {
                alert,
                result: into_fetch_result(result),
            });
    }

    fn camera_checked(
        alert: Alert,
        result: FetchResult<CameraStatusResponse>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.poller.finish_camera_check(&alert.id);

        match result {
            Ok(response) if response.is_active() => {}
            Ok(response) => {
                debug!(
                    alert_id = %alert.id,
                    status = %response.status,
                    "camera not active, alert dropped"
                );
                model.filter.record_processed(&alert.id);
                return;
            }
            Err(e) => {
                warn!(
                    alert_id = %alert.id,
                    error = %e,
                    "camera status lookup failed, alert dropped"
                );
                model.filter.record_processed(&alert.id);
                return;
            }
        }

        let now = model.clock.now();
        let verdict = model.filter.evaluate(&alert, now);
        let Some(slot) = verdict.display_slot(now) else {
            return;
        };

        model.filter.mark_accepted(&alert.id, slot);
        Self::persist_last_alert(model, caps);
        info!(
            alert_id = %alert.id,
            camera = %alert.camera_name,
            ready_at = %slot,
            "alert accepted"
        );
        model.presenter.enqueue(alert, slot);
        Self::drain(model, caps);
    }

    fn mark_reviewed(alert_id: AlertId, model: &mut Model, caps: &Capabilities) {
        let Some(token) = model.bearer_token() else {
            warn!(alert_id = %alert_id, "mark reviewed without credential");
            return;
        };
        let auth = bearer(token);
        let url = match model.api.mark_reviewed(&alert_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(alert_id = %alert_id, error = %e, "mark reviewed URL rejected");
                Self::show_toast(REVIEW_FAILED_TOAST, ToastKind::Error, model);
                return;
            }
        };

        caps.http
            .post(url)
            .header("Authorization", auth)
            .header("Content-Type", "application/json")
            .body_string("{}".to_owned())
            .expect_json::<StatusResponse>()
            .send(move |result| Event::AlertMarkedReviewed {
                alert_id,
                result: into_fetch_result(result),
            });
    }

    fn marked_reviewed(
        alert_id: AlertId,
        result: FetchResult<StatusResponse>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match result {
            Ok(response) if response.is_success() => {
                model.filter.record_reviewed(&alert_id);
                Self::persist_slot(StorageSlot::ProcessedIds, model, caps);
                model.activity.remove(&alert_id);
                model.presenter.remove_queued(&alert_id);
                info!(alert_id = %alert_id, "alert marked as reviewed");
                Self::show_toast(REVIEWED_TOAST, ToastKind::Success, model);
            }
            Ok(response) => {
                warn!(alert_id = %alert_id, status = %response.status, "mark reviewed rejected");
                Self::show_toast(REVIEW_FAILED_TOAST, ToastKind::Error, model);
            }
            Err(e) => {
                warn!(alert_id = %alert_id, error = %e, "mark reviewed failed");
                Self::show_toast(REVIEW_FAILED_TOAST, ToastKind::Error, model);
            }
        }
    }

    fn load_activity(model: &mut Model, caps: &Capabilities) {
        let Some(token) = model.bearer_token() else {
            debug!("activity feed skipped: no credential");
            return;
        };
        let auth = bearer(token);
        let url = match model.api.alert_list(model.clock.now()) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "alert list URL rejected");
                return;
            }
        };

        model.activity.is_loading = true;
        caps.http
            .get(url)
            .header("Authorization", auth)
            .expect_json::<AlertListResponse>()
            .send(|result| Event::ActivityLoaded(Box::new(into_fetch_result(result))));
    }

    fn activity_loaded(result: FetchResult<AlertListResponse>, model: &mut Model) {
        model.activity.is_loading = false;
        match result {
            Ok(response) if response.is_success() => {
                debug!(count = response.alerts.len(), "activity feed loaded");
                model.activity.replace(response.alerts);
            }
            Ok(response) => warn!(status = %response.status, "activity feed rejected"),
            Err(e) => warn!(error = %e, "activity feed failed"),
        }
    }

    fn show_toast(message: &str, kind: ToastKind, model: &mut Model) {
        let mut toast = ToastMessage::new(message, kind, model.clock.now());
        toast.duration_ms = model.config.toast_duration_ms;
        model.toast = Some(toast);
    }

    // --- presentation ---

    /// Promotes the backlog head if possible, otherwise arms the release
    /// timer for when it becomes due.
    fn drain(model: &mut Model, caps: &Capabilities) {
        let now = model.clock.now();
        model.scheduler.cancel(TimerKind::QueueRelease);

        let Some(alert) = model.presenter.promote_next(now).cloned() else {
            if let Some(ready_at) = model.presenter.next_ready_at(now) {
                model.scheduler.schedule_at(TimerKind::QueueRelease, ready_at);
            }
            return;
        };

        info!(alert_id = %alert.id, camera = %alert.camera_name, "alert shown");
        if model.filter.record_shown(&alert.id) {
            Self::persist_slot(StorageSlot::ShownIds, model, caps);
        }

        let commands = model.audio.begin_alert(
            model.guard.app_just_loaded(),
            &mut model.scheduler,
            now,
        );
        Self::run_audio(commands, caps);
        model.scheduler.schedule_every(
            TimerKind::AudioWatchdog,
            now,
            model.config.watchdog_interval_ms,
        );
    }

    /// Animated dismiss of the visible alert. Returns `false` if nothing was visible.
    fn dismiss(model: &mut Model, caps: &Capabilities) -> bool {
        if !model.presenter.begin_dismiss() {
            return false;
        }
        let commands = model.audio.user_stop(&mut model.scheduler);
        Self::run_audio(commands, caps);
        model.scheduler.cancel(TimerKind::AudioWatchdog);
        model.scheduler.schedule_once(
            TimerKind::DismissTransition,
            model.clock.now(),
            model.config.dismiss_transition_ms,
        );
        info!("alert dismissing");
        true
    }

    fn finish_dismiss(model: &mut Model, caps: &Capabilities) {
        if let Some(alert) = model.presenter.finish_dismiss() {
            debug!(alert_id = %alert.id, "alert hidden");
        }
        model.scheduler.schedule_once(
            TimerKind::UserStopCooldown,
            model.clock.now(),
            model.config.user_stop_cooldown_ms,
        );
        Self::drain(model, caps);
    }

    /// View camera / view evidence: silence, dismiss, hold polling, navigate.
    fn leave_alert_for(route: &str, model: &mut Model, caps: &Capabilities) {
        if model.presenter.state() == PresentationState::Hidden {
            return;
        }
        if !Self::dismiss(model, caps) {
            let commands = model.audio.user_stop(&mut model.scheduler);
            Self::run_audio(commands, caps);
        }
        model.poller.pause(
            &mut model.scheduler,
            model.clock.now(),
            model.config.poll_pause_ms,
        );
        info!(route, "leaving alert");
        caps.navigation.navigate(route);
    }

    /// The page changed under a shown alert: hide at once and keep the
    /// alarm silenced for it.
    fn route_changed(path: &str, model: &mut Model, caps: &Capabilities) {
        if model.presenter.state() == PresentationState::Hidden {
            return;
        }
        let commands = model.audio.user_stop(&mut model.scheduler);
        Self::run_audio(commands, caps);
        for kind in [
            TimerKind::AudioWatchdog,
            TimerKind::DismissTransition,
            TimerKind::UserStopCooldown,
        ] {
            model.scheduler.cancel(kind);
        }
        if let Some(alert) = model.presenter.dismiss_immediately() {
            info!(alert_id = %alert.id, path, "alert hidden by route change");
        }
        Self::drain(model, caps);
    }

    // --- audio ---

    fn run_audio(commands: Vec<AudioCommand>, caps: &Capabilities) {
        for command in commands {
            match command {
                AudioCommand::Play(request) => caps.audio.play(request, |session, outcome| {
                    Event::PlaybackSettled { session, outcome }
                }),
                AudioCommand::CheckActive(session) => {
                    caps.audio.check_active(session, |session, active| {
                        Event::PlaybackChecked { session, active }
                    });
                }
                AudioCommand::Stop(session) => caps.audio.stop(session),
                AudioCommand::SystemNotification => {
                    caps.notification
                        .get_permission_status(Event::NotificationPermission);
                }
            }
        }
    }

    // --- timers & lifecycle ---

    fn fire(kind: TimerKind, model: &mut Model, caps: &Capabilities) {
        let now = model.clock.now();
        match kind {
            TimerKind::Poll => Self::poll(model, caps),
            TimerKind::PollResume => model.poller.resume(),
            TimerKind::LoadWindow => {
                if model.guard.end_window() {
                    info!("load window closed");
                }
            }
            TimerKind::Heartbeat => Self::persist_slot(StorageSlot::Heartbeat, model, caps),
            TimerKind::ProcessedSweep => {
                let evicted = model.filter.sweep();
                if evicted > 0 {
                    debug!(
                        evicted,
                        remaining = model.filter.processed_len(),
                        "processed ids swept"
                    );
                }
            }
            TimerKind::QueueRelease => Self::drain(model, caps),
            TimerKind::DismissTransition => Self::finish_dismiss(model, caps),
            TimerKind::UserStopCooldown => model.audio.clear_user_stop(),
            TimerKind::AudioWatchdog => {
                let visible = model.presenter.is_visible();
                if !visible {
                    model.scheduler.cancel(TimerKind::AudioWatchdog);
                }
                let commands = model.audio.watchdog(
                    visible,
                    model.guard.app_just_loaded(),
                    &mut model.scheduler,
                    now,
                );
                Self::run_audio(commands, caps);
            }
            TimerKind::AudioSafetyStop => {
                let commands = model.audio.safety_stop_fired(&mut model.scheduler);
                Self::run_audio(commands, caps);
            }
        }
    }

    fn mount(
        now: UnixTimeMs,
        config: Option<AlertConfig>,
        credential: Option<&Secret>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if model.guard.is_mounted() {
            Self::teardown(model, caps);
        }

        let (config, api) = AlertConfig::resolve(config);
        *model = Model::mounted_with(config, api, Clock::starting_at(now));
        model.set_credential(credential.map(Secret::expose));
        model.guard.mount(now, &mut model.scheduler, model.config.load_window_ms);

        // Release anything a previous page left playing.
        caps.audio.stop(None);

        for slot in StorageSlot::RESTORED_ON_MOUNT {
            Self::load_slot(slot, caps);
        }
        Self::load_slot(StorageSlot::Heartbeat, caps);

        model
            .poller
            .start(&mut model.scheduler, now, model.config.poll_interval_ms);
        model.scheduler.schedule_every(
            TimerKind::ProcessedSweep,
            now,
            model.config.sweep_interval_ms,
        );
        info!(%now, api = model.api.as_str(), "alert core mounted");
        Self::poll(model, caps);
    }

    fn teardown(model: &mut Model, caps: &Capabilities) {
        let commands = model.audio.force_stop(&mut model.scheduler);
        Self::run_audio(commands, caps);
        model.poller.reset(&mut model.scheduler);
        let cancelled = model.scheduler.cancel_all();
        model.presenter.reset();
        model.audio.reset();
        model.guard.unmount();
        info!(cancelled, "alert core unmounted");
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if event.is_user_interaction() && model.guard.on_user_interaction(&mut model.scheduler) {
            Self::poll(model, caps);
        }

        match event {
            Event::Mounted {
                now,
                config,
                credential,
            } => {
                Self::mount(now, config.map(|c| *c), credential.as_ref(), model, caps);
            }

            Event::Unmounted => {
                if !model.guard.is_mounted() {
                    return;
                }
                Self::teardown(model, caps);
                *model = Model::default();
            }

            Event::Tick { now } => {
                if !model.clock.advance_to(now) {
                    debug!(%now, "clock reading ignored");
                }
                let now = model.clock.now();
                let due = model.scheduler.take_due(now);
                let mut changed = !due.is_empty();
                for kind in due {
                    Self::fire(kind, model, caps);
                }
                if model.toast.as_ref().is_some_and(|t| t.is_expired(now)) {
                    model.toast = None;
                    changed = true;
                }
                if !changed {
                    return;
                }
            }

            Event::CredentialChanged { credential } => {
                model.set_credential(credential.as_ref().map(Secret::expose));
                debug!(present = model.has_credential(), "credential changed");
                return;
            }

            Event::RouteChanged { path } => Self::route_changed(&path, model, caps),

            Event::UserInteracted => {}

            Event::KeyPressed { key } => {
                if key == "Escape" && model.presenter.is_visible() {
                    Self::dismiss(model, caps);
                }
            }

            Event::DismissRequested => {
                Self::dismiss(model, caps);
            }

            Event::ViewCameraRequested => Self::leave_alert_for(LIVE_CAMERA_ROUTE, model, caps),

            Event::ViewEvidenceRequested => {
                Self::leave_alert_for(ACTIVITY_REVIEW_ROUTE, model, caps);
            }

            Event::MarkReviewedRequested { alert_id } => Self::mark_reviewed(alert_id, model, caps),

            Event::ActivityRequested => Self::load_activity(model, caps),

            Event::ActivitySortChanged { sort } => model.activity.resort(sort),

            Event::ActivityPageChanged { page } => model.activity.set_page(page),

            Event::ActivityPageSizeChanged { page_size } => {
                if !model.activity.set_page_size(page_size) {
                    debug!(page_size, "unsupported page size ignored");
                    return;
                }
            }

            Event::AlertsChecked(result) => {
                if !model.guard.is_mounted() {
                    debug!("alert check after unmount ignored");
                    return;
                }
                Self::alerts_checked(*result, model, caps);
            }

            Event::CameraStatusChecked { alert, result } => {
                if !model.guard.is_mounted() {
                    debug!(alert_id = %alert.id, "camera status after unmount ignored");
                    return;
                }
                Self::camera_checked(*alert, result, model, caps);
            }

            Event::AlertMarkedReviewed { alert_id, result } => {
                if !model.guard.is_mounted() {
                    debug!(alert_id = %alert_id, "review response after unmount ignored");
                    return;
                }
                Self::marked_reviewed(alert_id, result, model, caps);
            }

            Event::ActivityLoaded(result) => {
                if !model.guard.is_mounted() {
                    debug!("activity feed after unmount ignored");
                    return;
                }
                Self::activity_loaded(*result, model);
            }

            Event::StorageLoaded { slot, result } => {
                if !model.guard.is_mounted() {
                    return;
                }
                let bytes = result.unwrap_or_else(|e| {
                    warn!(?slot, error = %e, "storage read failed");
                    None
                });
                let held = model.storage.mark_restored(slot);
                Self::restore(slot.decode(bytes.as_deref()), model, caps);
                if held && slot != StorageSlot::Heartbeat {
                    Self::persist_slot(slot, model, caps);
                }
                return;
            }

            Event::StorageWritten { slot, result } => {
                if let Err(e) = result {
                    warn!(?slot, error = %e, "storage write failed");
                }
                return;
            }

            Event::PlaybackSettled { session, outcome } => {
                let now = model.clock.now();
                let commands = model
                    .audio
                    .on_play_settled(session, outcome, &mut model.scheduler, now);
                Self::run_audio(commands, caps);
            }

            Event::PlaybackInterrupted { session, cause } => {
                let now = model.clock.now();
                let commands = model
                    .audio
                    .on_interrupted(session, cause, &mut model.scheduler, now);
                Self::run_audio(commands, caps);
            }

            Event::PlaybackChecked { session, active } => {
                let now = model.clock.now();
                let commands = model
                    .audio
                    .on_activity_report(session, active, &mut model.scheduler, now);
                Self::run_audio(commands, caps);
                return;
            }

            Event::NotificationPermission(permission) => {
                model.notification_permission = permission;
                if !permission.is_granted() {
                    debug!(?permission, "system notification not permitted");
                    return;
                }
                if let Some(alert) = model.presenter.current() {
                    caps.notification.show(
                        SYSTEM_NOTIFICATION_TITLE,
                        format!("Shoplifting detected at {}", alert.camera_name),
                    );
                }
                return;
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let animation = match model.presenter.state() {
            PresentationState::Dismissing => AlertAnimation::SlideOut,
            PresentationState::Hidden | PresentationState::Visible => AlertAnimation::SlideIn,
        };
        let alert = model.presenter.current().map(|a| AlertCard {
            id: a.id.to_string(),
            headline: ALERT_HEADLINE.to_string(),
            message: format!("Shoplifting Detected At {}", a.camera_name),
            camera_name: a.camera_name.clone(),
            thumbnail: a.thumbnail.clone(),
            timestamp: a.timestamp.clone(),
            animation,
        });

        ViewModel {
            presentation: model.presenter.state(),
            alert,
            queued_count: model.presenter.queued_len(),
            unreviewed_count: model.unreviewed_count,
            audio: model.audio.state(),
            polling_paused: model.poller.is_paused(),
            activity: ActivityFeedView {
                items: model
                    .activity
                    .current_page()
                    .iter()
                    .map(|a| ActivityItem {
                        id: a.id.to_string(),
                        camera_name: a.camera_name.clone(),
                        timestamp: a.timestamp.clone(),
                        thumbnail: a.thumbnail.clone(),
                        video_clip: a.video_clip.clone(),
                    })
                    .collect(),
                sort: model.activity.sort,
                is_loading: model.activity.is_loading,
                total_items: model.activity.alerts.len(),
                page: model.activity.page(),
                page_count: model.activity.page_count(),
                page_size: model.activity.page_size(),
            },
            toast: model.toast.as_ref().map(ToastView::from),
        }
    }
}
