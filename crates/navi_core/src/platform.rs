//! Installed-app lifecycle signals: pending update and connectivity.

use crate::observe::{Observable, Subscription};
use log::info;

pub struct PlatformSignals {
    update_ready: Observable<bool>,
    online: Observable<bool>,
}

impl Default for PlatformSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSignals {
    /// Starts online with no update pending.
    pub fn new() -> Self {
        Self {
            update_ready: Observable::new(false),
            online: Observable::new(true),
        }
    }

    pub fn update_ready(&self) -> bool {
        self.update_ready.get()
    }

    pub fn is_online(&self) -> bool {
        self.online.get()
    }

    /// A new app version finished installing and waits for a reload.
    pub fn mark_update_ready(&self) {
        if self.update_ready.set(true) {
            info!("event=update_ready module=platform status=ok");
        }
    }

    pub fn dismiss_update(&self) {
        self.update_ready.set(false);
    }

    pub fn set_online(&self, online: bool) {
        if self.online.set(online) {
            info!("event=connectivity module=platform status=ok online={online}");
        }
    }

    pub fn on_update_ready(&self, listener: impl Fn(&bool) + Send + Sync + 'static) -> Subscription {
        self.update_ready.subscribe(listener)
    }

    pub fn on_connectivity(&self, listener: impl Fn(&bool) + Send + Sync + 'static) -> Subscription {
        self.online.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::PlatformSignals;
    use std::sync::{Arc, Mutex};

    #[test]
    fn connectivity_fires_only_on_change() {
        let signals = PlatformSignals::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = signals.on_connectivity(move |online| sink.lock().unwrap().push(*online));

        signals.set_online(true);
        signals.set_online(false);
        signals.set_online(true);
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn update_flag_can_be_dismissed() {
        let signals = PlatformSignals::new();
        signals.mark_update_ready();
        assert!(signals.update_ready());
        signals.dismiss_update();
        assert!(!signals.update_ready());
    }
}
