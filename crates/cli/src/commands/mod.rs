//! Subcommand implementations.
//!
//! Every networked command opens a [`Session`]: settings, one view, one
//! desk, and the runtime that drives it.

pub(crate) mod actions;
pub(crate) mod records;

use std::path::PathBuf;
use std::sync::Arc;

use lgdesk_interchange::SubscriptionStatus;
use lgdesk_orchestrator::{can_mutate, ActionDesk, HttpAuthority};
use lgdesk_storage::{RecordView, RefreshMode, ReloadSummary};

use crate::config;
use crate::output::{ConsoleNotifier, ConsolePresenter};
use crate::{fail, OutputFormat};

/// Flags shared by every subcommand.
#[derive(Debug, Clone)]
pub(crate) struct Globals {
    pub output: OutputFormat,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub subscription: SubscriptionStatus,
}

pub(crate) struct Session {
    pub desk: ActionDesk,
    runtime: tokio::runtime::Runtime,
}

impl Session {
    /// Load settings and wire a desk over `view`. Exits on any setup error.
    pub fn open(globals: &Globals, view: Arc<dyn RecordView>) -> Self {
        // Expired subscriptions get neither reads nor writes.
        if globals.subscription == SubscriptionStatus::Expired {
            fail(
                "subscription expired: renew it to access LG records",
                globals,
            );
        }

        let settings = match config::load(globals.config.as_deref()) {
            Ok(s) => s,
            Err(e) => fail(&e.to_string(), globals),
        };
        let authority = match HttpAuthority::from_settings(&settings.authority) {
            Ok(a) => a,
            Err(e) => fail(&e.to_string(), globals),
        };
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => fail(&format!("failed to create tokio runtime: {}", e), globals),
        };
        tracing::debug!(
            base_url = authority.base_url(),
            subscription = %globals.subscription,
            mutations = can_mutate(globals.subscription),
            "session opened"
        );

        let desk = ActionDesk::new(
            view,
            Arc::new(authority),
            Arc::new(globals.subscription),
            Arc::new(ConsolePresenter::new(globals.output, globals.quiet)),
            Arc::new(ConsoleNotifier::new(globals.output, globals.quiet)),
            &settings.orchestrator,
        );
        Session { desk, runtime }
    }

    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Load the view, exiting when the authority cannot be read.
    ///
    /// In text mode the notifier has already printed the failure.
    pub fn load(&self, globals: &Globals) -> ReloadSummary {
        match self.block_on(self.desk.refresh(RefreshMode::Initial)) {
            Ok(summary) => summary,
            Err(e) => match globals.output {
                OutputFormat::Json => fail(
                    &format!("Could not load LG records: {}", e.user_message()),
                    globals,
                ),
                OutputFormat::Text => std::process::exit(1),
            },
        }
    }
}
