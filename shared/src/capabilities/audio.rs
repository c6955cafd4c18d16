use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::audio::{PlayRequest, PlaybackOutcome, PlaybackSession};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum AudioOperation {
    Play(PlayRequest),
    CheckActive { session: PlaybackSession },
    /// `None` stops every element the shell owns.
    Stop { session: Option<PlaybackSession> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum AudioOutput {
    Started,
    Failed { reason: String },
    Status { active: bool },
    Stopped,
}

impl Operation for AudioOperation {
    type Output = AudioOutput;
}

impl AudioOutput {
    #[must_use]
    pub fn into_outcome(self) -> PlaybackOutcome {
        match self {
            Self::Started => PlaybackOutcome::Started,
            Self::Failed { reason } => PlaybackOutcome::Failed { reason },
            other => PlaybackOutcome::Failed {
                reason: format!("unexpected play output {other:?}"),
            },
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Status { active: true } | Self::Started)
    }
}

pub struct Audio<Ev> {
    context: CapabilityContext<AudioOperation, Ev>,
}

impl<Ev> Capability<Ev> for Audio<Ev> {
    type Operation = AudioOperation;
    type MappedSelf<MappedEv> = Audio<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Audio::new(self.context.map_event(f))
    }
}

impl<Ev> Audio<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<AudioOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn play<F>(&self, request: PlayRequest, make_event: F)
    where
        F: FnOnce(PlaybackSession, PlaybackOutcome) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        let session = request.session;
        self.context.spawn(async move {
            let output = ctx.request_from_shell(AudioOperation::Play(request)).await;
            ctx.update_app(make_event(session, output.into_outcome()));
        });
    }

    pub fn check_active<F>(&self, session: PlaybackSession, make_event: F)
    where
        F: FnOnce(PlaybackSession, bool) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(AudioOperation::CheckActive { session }).await;
            ctx.update_app(make_event(session, output.is_active()));
        });
    }

    pub fn stop(&self, session: Option<PlaybackSession>) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(AudioOperation::Stop { session }).await;
        });
    }
}
