//! Advertiser - makes the local peer discoverable.

use tokio::sync::Mutex;

use crate::error::ExchangeError;
use crate::session::PeerSession;
use crate::transport::Transport;

/// Publishes the session's identity under its service type.
///
/// Advertising peers accept every invitation they receive.
pub struct Advertiser<T: Transport> {
    session: PeerSession<T>,
    advertising: Mutex<bool>,
}

impl<T: Transport> Advertiser<T> {
    /// Create an advertiser for `session`. Nothing is published until
    /// [`start`](Self::start).
    pub fn new(session: PeerSession<T>) -> Self {
        Self {
            session,
            advertising: Mutex::new(false),
        }
    }

    /// Begin advertising. Calling this while already advertising is a no-op.
    pub async fn start(&self) -> Result<(), ExchangeError> {
        let mut advertising = self.advertising.lock().await;
        if *advertising && self.session.is_open() {
            return Ok(());
        }

        self.session
            .transport()
            .start_advertising(self.session.service_type())
            .await
            .map_err(ExchangeError::TransportUnavailable)?;
        *advertising = true;

        tracing::info!(
            "Advertising {} as {}",
            self.session.service_type(),
            self.session.identity()
        );
        Ok(())
    }

    /// Stop advertising. A no-op if never started or if the session has
    /// been disconnected, which ends advertising.
    pub async fn stop(&self) -> Result<(), ExchangeError> {
        let mut advertising = self.advertising.lock().await;
        if !*advertising {
            return Ok(());
        }
        if !self.session.is_open() {
            *advertising = false;
            return Ok(());
        }

        self.session
            .transport()
            .stop_advertising()
            .await
            .map_err(ExchangeError::TransportUnavailable)?;
        *advertising = false;

        tracing::info!("Stopped advertising");
        Ok(())
    }

    /// Check if advertising.
    pub async fn is_advertising(&self) -> bool {
        *self.advertising.lock().await && self.session.is_open()
    }
}
