mod audio;
mod http;
mod kv;
mod navigation;
mod notification;

pub use self::audio::{Audio, AudioOperation, AudioOutput};
pub use self::http::{bearer, into_fetch_result, ApiBase, HttpError};
pub use self::kv::{KeyNamespace, KvError, KvKey, TypedKvSlot};
pub use self::navigation::{Navigation, NavigationOperation};
pub use self::notification::{
    Notification, NotificationOperation, NotificationOutput, PermissionState,
};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
    pub audio: Audio<Event>,
    pub navigation: Navigation<Event>,
    pub notification: Notification<Event>,
}
