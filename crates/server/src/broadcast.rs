//! Running-state fan-out to the non-interactive UI surfaces.
//!
//! The state is reduced to "any server running" and pushed to a widget,
//! a persistent status notification and automation listeners. Every
//! surface is best effort: a failure is logged and the remaining surfaces
//! are still updated.

use crate::config::ServerConfig;
use crate::keys::KeyFingerprintProvider;
use crate::logging;
use crate::service::ServersRunningState;
use bridgeftpd_platform::BridgeResult;
use tracing::debug;

/// Widget icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetIcon {
    /// Offers to start
    Play,
    /// Offers to stop
    Stop,
}

/// Widget background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetBackground {
    /// Servers running
    Enabled,
    /// Servers stopped
    Disabled,
}

/// Visual state of the start/stop widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetView {
    /// Icon
    pub icon: WidgetIcon,
    /// Button label
    pub label: &'static str,
    /// Background
    pub background: WidgetBackground,
}

impl WidgetView {
    /// One of the two fixed views.
    pub fn for_state(running: bool) -> Self {
        if running {
            Self {
                icon: WidgetIcon::Stop,
                label: "Stop",
                background: WidgetBackground::Enabled,
            }
        } else {
            Self {
                icon: WidgetIcon::Play,
                label: "Start",
                background: WidgetBackground::Disabled,
            }
        }
    }
}

/// Content of the status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusContent {
    /// Title line
    pub title: String,
    /// One URL per running server
    pub urls: Vec<String>,
    /// Host key fingerprints, when known
    pub fingerprints: Option<KeyFingerprintProvider>,
}

impl StatusContent {
    /// Builds the notification for `state`, with URLs pointing at `host`.
    pub fn new(
        config: &ServerConfig,
        state: ServersRunningState,
        host: &str,
        fingerprints: Option<&KeyFingerprintProvider>,
    ) -> Self {
        let mut urls = Vec::new();
        if state.ftp {
            urls.push(format!("ftp://{}:{}", host, config.port));
        }
        if state.ssh {
            urls.push(format!(
                "sftp://{}@{}:{}",
                config.user_name, host, config.secure_port
            ));
        }
        Self {
            title: "Servers running".to_string(),
            urls,
            fingerprints: fingerprints.cloned(),
        }
    }

    /// Body text, one item per line.
    pub fn body(&self) -> String {
        let mut lines = self.urls.clone();
        if let Some(fp) = &self.fingerprints {
            lines.push(fp.sha256().to_string());
            lines.push(format!("SHA1:{}", fp.sha1()));
        }
        lines.join("\n")
    }
}

/// Home-screen widget.
pub trait WidgetRenderer: Send + Sync {
    /// Replaces the widget's appearance.
    fn render(&self, view: &WidgetView) -> BridgeResult<()>;
}

/// Persistent status notification.
pub trait StatusNotifier: Send + Sync {
    /// Creates or replaces the notification.
    fn show(&self, content: &StatusContent) -> BridgeResult<()>;

    /// Removes the notification, if any.
    fn remove(&self) -> BridgeResult<()>;
}

/// External automation tool.
pub trait AutomationListener: Send + Sync {
    /// Pushes the new state.
    fn send_state_update(&self, running: bool) -> BridgeResult<()>;

    /// Asks the tool to re-query its condition.
    fn request_query_condition(&self) -> BridgeResult<()>;
}

/// Fans the running state out to every registered surface.
#[derive(Default)]
pub struct StateBroadcastSink {
    widgets: Vec<Box<dyn WidgetRenderer>>,
    notifier: Option<Box<dyn StatusNotifier>>,
    automation: Vec<Box<dyn AutomationListener>>,
}

impl StateBroadcastSink {
    /// Sink with no surfaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a widget.
    pub fn with_widget(mut self, widget: Box<dyn WidgetRenderer>) -> Self {
        self.widgets.push(widget);
        self
    }

    /// Sets the status notifier.
    pub fn with_notifier(mut self, notifier: Box<dyn StatusNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Adds an automation listener.
    pub fn with_automation_listener(mut self, listener: Box<dyn AutomationListener>) -> Self {
        self.automation.push(listener);
        self
    }

    /// Updates every surface. Returns the names of surfaces that failed.
    pub fn broadcast(
        &self,
        state: ServersRunningState,
        content: &StatusContent,
    ) -> Vec<&'static str> {
        let running = state.any_running();
        debug!(running = running, "broadcasting state");
        let mut failed = Vec::new();

        let view = WidgetView::for_state(running);
        for widget in &self.widgets {
            check("widget", widget.render(&view), &mut failed);
        }

        if let Some(notifier) = &self.notifier {
            let result = if running {
                notifier.show(content)
            } else {
                notifier.remove()
            };
            check("notification", result, &mut failed);
        }

        for listener in &self.automation {
            check(
                "automation",
                listener.send_state_update(running),
                &mut failed,
            );
            check("automation", listener.request_query_condition(), &mut failed);
        }

        failed
    }
}

fn check(surface: &'static str, result: BridgeResult<()>, failed: &mut Vec<&'static str>) {
    if let Err(e) = result {
        logging::log_surface_failed(surface, &e.to_string());
        failed.push(surface);
    }
}
