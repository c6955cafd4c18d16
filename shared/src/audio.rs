//! Alarm playback controller.
//!
//! The controller is the only owner of the shell's playback resource and
//! tracks at most one live attempt. It never talks to the shell itself:
//! every transition returns the [`AudioCommand`]s the update loop must issue.
//! Each attempt carries a fresh [`PlaybackSession`] that the shell echoes
//! back, so a callback from a superseded attempt is recognized and its
//! resource released.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::scheduler::{Scheduler, TimerHandle, TimerKind};
use crate::UnixTimeMs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioState {
    #[default]
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackSession(Uuid);

impl PlaybackSession {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStrategy {
    /// The page's preloaded alarm element.
    Primary,
    /// A freshly created element, muted until attached then unmuted.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub session: PlaybackSession,
    pub strategy: PlaybackStrategy,
    pub src: String,
    pub looped: bool,
    pub muted_until_attached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackOutcome {
    Started,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptCause {
    Ended,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Play(PlayRequest),
    CheckActive(PlaybackSession),
    /// `None` releases whatever the shell still holds.
    Stop(Option<PlaybackSession>),
    /// Both elements failed; raise a system notification if permitted.
    SystemNotification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting {
        session: PlaybackSession,
        strategy: PlaybackStrategy,
    },
    Playing {
        session: PlaybackSession,
        strategy: PlaybackStrategy,
    },
}

#[derive(Debug)]
pub struct AudioController {
    sound_path: String,
    safety_stop_ms: u64,
    phase: Phase,
    user_stopped: bool,
    // Safety stop fired or the fallback chain ran out for the current alert.
    silenced: bool,
    safety_stop: Option<TimerHandle>,
    // Playbacks released through `force_stop`; idle stops are not counted.
    stop_count: u64,
}

impl Default for AudioController {
    fn default() -> Self {
        Self::new(crate::ALERT_SOUND_PATH, crate::AUDIO_SAFETY_STOP_MS)
    }
}

impl AudioController {
    #[must_use]
    pub fn new(sound_path: impl Into<String>, safety_stop_ms: u64) -> Self {
        Self {
            sound_path: sound_path.into(),
            safety_stop_ms,
            phase: Phase::Idle,
            user_stopped: false,
            silenced: false,
            safety_stop: None,
            stop_count: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> AudioState {
        match self.phase {
            Phase::Playing { .. } => AudioState::Playing,
            Phase::Idle | Phase::Starting { .. } => AudioState::Stopped,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Starting { .. })
    }

    #[must_use]
    pub fn user_stopped(&self) -> bool {
        self.user_stopped
    }

    #[must_use]
    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    #[must_use]
    pub fn stop_count(&self) -> u64 {
        self.stop_count
    }

    #[must_use]
    pub fn session(&self) -> Option<PlaybackSession> {
        match self.phase {
            Phase::Idle => None,
            Phase::Starting { session, .. } | Phase::Playing { session, .. } => Some(session),
        }
    }

    /// A new alert became visible: clear the per-alert silence and the user
    /// stop, then start playing unless the suppression window is open.
    pub fn begin_alert(
        &mut self,
        just_loaded: bool,
        sched: &mut Scheduler,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        self.silenced = false;
        self.user_stopped = false;
        self.request_play(just_loaded, sched, now)
    }

    /// Always force-stops first so two loops never overlap.
    pub fn request_play(
        &mut self,
        just_loaded: bool,
        sched: &mut Scheduler,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        let mut commands = self.force_stop(sched);
        if self.user_stopped {
            debug!("play refused: user stopped");
            return commands;
        }
        if just_loaded {
            debug!("play refused: app just loaded");
            return commands;
        }
        commands.push(self.start(PlaybackStrategy::Primary, now));
        commands
    }

    fn start(&mut self, strategy: PlaybackStrategy, now: UnixTimeMs) -> AudioCommand {
        let session = PlaybackSession::new();
        self.phase = Phase::Starting { session, strategy };
        debug!(%session, ?strategy, "starting playback");
        AudioCommand::Play(PlayRequest {
            session,
            strategy,
            src: format!("{}?v={}", self.sound_path, now.0),
            looped: true,
            muted_until_attached: strategy == PlaybackStrategy::Fallback,
        })
    }

    pub fn on_play_settled(
        &mut self,
        session: PlaybackSession,
        outcome: PlaybackOutcome,
        sched: &mut Scheduler,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        let strategy = match self.phase {
            Phase::Starting { session: live, strategy } if live == session => strategy,
            _ => {
                debug!(%session, "settlement for superseded attempt");
                return match outcome {
                    PlaybackOutcome::Started => vec![AudioCommand::Stop(Some(session))],
                    PlaybackOutcome::Failed { .. } => Vec::new(),
                };
            }
        };

        match outcome {
            PlaybackOutcome::Started => {
                self.phase = Phase::Playing { session, strategy };
                self.safety_stop = Some(sched.schedule_once(
                    TimerKind::AudioSafetyStop,
                    now,
                    self.safety_stop_ms,
                ));
                info!(%session, ?strategy, "alarm playing");
                Vec::new()
            }
            PlaybackOutcome::Failed { reason } => self.fail_over(strategy, &reason, now),
        }
    }

    fn fail_over(
        &mut self,
        failed: PlaybackStrategy,
        reason: &str,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        warn!(strategy = ?failed, reason, "alarm playback failed");
        self.phase = Phase::Idle;
        if self.user_stopped {
            return Vec::new();
        }
        match failed {
            PlaybackStrategy::Primary => vec![self.start(PlaybackStrategy::Fallback, now)],
            PlaybackStrategy::Fallback => {
                self.silenced = true;
                vec![AudioCommand::SystemNotification]
            }
        }
    }

    /// The shell reported that a live element stopped on its own.
    pub fn on_interrupted(
        &mut self,
        session: PlaybackSession,
        cause: InterruptCause,
        sched: &mut Scheduler,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        let strategy = match self.phase {
            Phase::Playing { session: live, strategy } | Phase::Starting { session: live, strategy }
                if live == session =>
            {
                strategy
            }
            _ => return Vec::new(),
        };
        self.disarm_safety_stop(sched);

        match cause {
            InterruptCause::Ended => {
                debug!(%session, "alarm ended");
                self.phase = Phase::Idle;
                Vec::new()
            }
            InterruptCause::Error => {
                let mut commands = vec![AudioCommand::Stop(Some(session))];
                commands.extend(self.fail_over(strategy, "media error", now));
                commands
            }
        }
    }

    /// Periodic liveness check while an alert is visible.
    pub fn watchdog(
        &mut self,
        visible: bool,
        just_loaded: bool,
        sched: &mut Scheduler,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        if !visible {
            return Vec::new();
        }
        match self.phase {
            Phase::Playing { session, .. } => vec![AudioCommand::CheckActive(session)],
            Phase::Starting { .. } => Vec::new(),
            Phase::Idle => {
                if self.user_stopped || self.silenced || just_loaded {
                    return Vec::new();
                }
                info!("watchdog restarting alarm");
                self.request_play(just_loaded, sched, now)
            }
        }
    }

    pub fn on_activity_report(
        &mut self,
        session: PlaybackSession,
        active: bool,
        sched: &mut Scheduler,
        now: UnixTimeMs,
    ) -> Vec<AudioCommand> {
        let live = matches!(self.phase, Phase::Playing { session: s, .. } if s == session);
        if !live || active {
            return Vec::new();
        }
        if self.user_stopped {
            return self.force_stop(sched);
        }
        warn!(%session, "alarm reported inactive, restarting");
        self.request_play(false, sched, now)
    }

    pub fn safety_stop_fired(&mut self, sched: &mut Scheduler) -> Vec<AudioCommand> {
        info!("alarm safety stop");
        self.safety_stop = None;
        self.silenced = true;
        self.force_stop(sched)
    }

    pub fn user_stop(&mut self, sched: &mut Scheduler) -> Vec<AudioCommand> {
        self.user_stopped = true;
        self.force_stop(sched)
    }

    pub fn clear_user_stop(&mut self) {
        self.user_stopped = false;
    }

    /// Releases the owned resource and disarms the safety stop. Idempotent.
    pub fn force_stop(&mut self, sched: &mut Scheduler) -> Vec<AudioCommand> {
        self.disarm_safety_stop(sched);
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => Vec::new(),
            Phase::Starting { session, .. } | Phase::Playing { session, .. } => {
                self.stop_count += 1;
                debug!(%session, stops = self.stop_count, "alarm stopped");
                vec![AudioCommand::Stop(Some(session))]
            }
        }
    }

    fn disarm_safety_stop(&mut self, sched: &mut Scheduler) {
        if let Some(handle) = self.safety_stop.take() {
            sched.cancel_handle(handle);
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.user_stopped = false;
        self.silenced = false;
        self.safety_stop = None;
    }
}
