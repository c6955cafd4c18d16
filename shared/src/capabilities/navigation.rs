use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NavigationOperation {
    Navigate { route: String },
}

impl Operation for NavigationOperation {
    type Output = ();
}

pub struct Navigation<Ev> {
    context: CapabilityContext<NavigationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Navigation<Ev> {
    type Operation = NavigationOperation;
    type MappedSelf<MappedEv> = Navigation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigation::new(self.context.map_event(f))
    }
}

impl<Ev> Navigation<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<NavigationOperation, Ev>) -> Self {
        Self { context }
    }

    /// Fire and forget; the shell reports the resulting route change back.
    pub fn navigate(&self, route: impl Into<String>) {
        let ctx = self.context.clone();
        let route = route.into();
        self.context.spawn(async move {
            ctx.notify_shell(NavigationOperation::Navigate { route }).await;
        });
    }
}
