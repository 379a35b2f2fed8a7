//! Lazily created, idempotently destroyed browser session

use std::sync::Arc;

use pagecheck_common::{BrowserKind, HarnessConfig};
use tracing::{debug, info, warn};

use crate::driver::{BrowserDriver, DriverFactory, LaunchOptions};
use crate::error::E2eResult;
use crate::wait::{RetryPolicy, RetryingWait};

/// The live automation connection
pub struct Session {
    id: u64,
    browser: BrowserKind,
    driver: Arc<dyn BrowserDriver>,
    policy: RetryPolicy,
}

impl Session {
    /// Sequence number assigned by the owning registry
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn browser(&self) -> BrowserKind {
        self.browser
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    /// A fresh wait helper bound to this session's driver
    pub fn wait(&self) -> RetryingWait {
        RetryingWait::new(self.driver.clone(), self.policy)
    }
}

/// Holds at most one live [`Session`]
pub struct SessionRegistry<F> {
    factory: F,
    browser: BrowserKind,
    options: LaunchOptions,
    policy: RetryPolicy,
    slot: Option<Session>,
    launched: u64,
}

impl<F: DriverFactory> SessionRegistry<F> {
    pub fn new(factory: F, config: &HarnessConfig) -> Self {
        Self {
            factory,
            browser: config.browser,
            options: LaunchOptions::for_browser(config.browser, config.headless),
            policy: RetryPolicy::from_config(config),
            slot: None,
            launched: 0,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Browser variant this registry launches
    pub fn browser(&self) -> BrowserKind {
        self.browser
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    /// The live session without launching one
    pub fn current(&self) -> Option<&Session> {
        self.slot.as_ref()
    }

    /// The live session, launching one if none exists. Launch failures propagate.
    pub async fn get(&mut self) -> E2eResult<&Session> {
        let session = match self.slot.take() {
            Some(session) => session,
            None => self.launch().await?,
        };
        Ok(self.slot.insert(session))
    }

    /// A wait helper bound to the current session's driver
    pub async fn wait(&mut self) -> E2eResult<RetryingWait> {
        Ok(self.get().await?.wait())
    }

    async fn launch(&mut self) -> E2eResult<Session> {
        info!("Launching {} session", self.browser);
        let driver = self.factory.launch(self.browser, &self.options).await?;
        self.launched += 1;
        debug!("Session #{} ready", self.launched);
        Ok(Session {
            id: self.launched,
            browser: self.browser,
            driver,
            policy: self.policy,
        })
    }

    /// Close the session if present. Close failures are logged; the slot is always cleared.
    pub async fn destroy(&mut self) {
        let Some(session) = self.slot.take() else {
            debug!("No session to destroy");
            return;
        };

        match session.driver.quit().await {
            Ok(()) => info!("Session #{} closed", session.id),
            Err(e) => warn!(
                "Session #{} was already closed or failed to close: {}",
                session.id, e
            ),
        }
    }
}
