use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionState {
    #[default]
    NotDetermined,
    Denied,
    Granted,
}

impl PermissionState {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum NotificationOperation {
    GetPermissionStatus,
    Show { title: String, body: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum NotificationOutput {
    PermissionStatus(PermissionState),
    Shown,
}

impl NotificationOutput {
    #[must_use]
    pub const fn permission_status(&self) -> Option<PermissionState> {
        match self {
            Self::PermissionStatus(state) => Some(*state),
            Self::Shown => None,
        }
    }
}

impl Operation for NotificationOperation {
    type Output = NotificationOutput;
}

pub struct Notification<Ev> {
    context: CapabilityContext<NotificationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Notification<Ev> {
    type Operation = NotificationOperation;
    type MappedSelf<MappedEv> = Notification<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Notification::new(self.context.map_event(f))
    }
}

impl<Ev> Notification<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<NotificationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn get_permission_status<F>(&self, make_event: F)
    where
        F: FnOnce(PermissionState) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let status = ctx
                .request_from_shell(NotificationOperation::GetPermissionStatus)
                .await
                .permission_status()
                .unwrap_or_default();
            ctx.update_app(make_event(status));
        });
    }

    pub fn show(&self, title: impl Into<String>, body: impl Into<String>) {
        let ctx = self.context.clone();
        let op = NotificationOperation::Show {
            title: title.into(),
            body: body.into(),
        };
        self.context.spawn(async move {
            ctx.notify_shell(op).await;
        });
    }
}
