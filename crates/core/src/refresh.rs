//! Single-flight credential renewal
//!
//! [`RefreshCoordinator::renew_once`] hands every caller the same shared
//! pending renewal while one is outstanding. The slot is claimed before the
//! first suspension point, so two callers in the same tick can never both
//! start a network call. After the renewal settles the slot is kept for a
//! short grace period: late callers that raced the settlement receive the
//! settled outcome instead of starting another renewal.
//!
//! A flight only progresses while some caller awaits it. If every
//! [`PendingRenewal`] handle is dropped before it settles, the flight is
//! abandoned: [`RefreshCoordinator::is_renewing`] reports false and the next
//! caller starts a fresh renewal.

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::context::SessionContext;
use crate::credential::AccessCredential;
use crate::error::RenewalFailure;
use crate::transport::ApiRequest;

pub type RenewalOutcome = Result<AccessCredential, RenewalFailure>;

type SharedOutcome = Shared<LocalBoxFuture<'static, RenewalOutcome>>;

#[derive(Debug, Deserialize)]
struct RenewalResponse {
    access_token: Option<String>,
}

#[derive(Default)]
struct FlightState {
    settled_at: Cell<Option<u64>>,
    waiters: Cell<usize>,
}

impl FlightState {
    fn in_progress(&self) -> bool {
        self.settled_at.get().is_none() && self.waiters.get() > 0
    }
}

struct Flight {
    outcome: SharedOutcome,
    state: Rc<FlightState>,
}

impl Flight {
    fn join(&self) -> PendingRenewal {
        self.state.waiters.set(self.state.waiters.get() + 1);
        PendingRenewal {
            outcome: self.outcome.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

/// Handle on the renewal shared by every caller of one flight
#[must_use = "a renewal only progresses while it is awaited"]
pub struct PendingRenewal {
    outcome: SharedOutcome,
    state: Rc<FlightState>,
}

impl Clone for PendingRenewal {
    fn clone(&self) -> Self {
        self.state.waiters.set(self.state.waiters.get() + 1);
        Self {
            outcome: self.outcome.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl Drop for PendingRenewal {
    fn drop(&mut self) {
        let waiters = self.state.waiters.get().saturating_sub(1);
        self.state.waiters.set(waiters);
        if waiters == 0 && self.state.settled_at.get().is_none() {
            debug!("renewal abandoned by every caller");
        }
    }
}

impl Future for PendingRenewal {
    type Output = RenewalOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.outcome.poll_unpin(cx)
    }
}

/// Owns the renewal call. Construct once per session and share by `Rc`.
pub struct RefreshCoordinator {
    ctx: SessionContext,
    flight: RefCell<Option<Flight>>,
    started: Cell<u64>,
}

impl RefreshCoordinator {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            flight: RefCell::new(None),
            started: Cell::new(0),
        }
    }

    /// Perform one renewal call, bypassing single-flight.
    ///
    /// # Errors
    ///
    /// Returns a `RenewalFailure` for non-2xx responses, a response without a
    /// credential, or a network failure
    pub async fn renew(&self) -> RenewalOutcome {
        self.started.set(self.started.get() + 1);
        perform_renewal(self.ctx.clone()).await
    }

    /// Join the pending renewal, or start one if none is pending
    pub fn renew_once(&self) -> PendingRenewal {
        let now = self.ctx.clock.now_ms();
        let grace = self.ctx.config.timing.renewal_grace_ms;

        let mut slot = self.flight.borrow_mut();
        if let Some(flight) = slot.as_ref() {
            match flight.state.settled_at.get() {
                None if flight.state.waiters.get() > 0 => {
                    debug!("joining pending renewal");
                    return flight.join();
                }
                None => debug!("replacing abandoned renewal"),
                Some(settled) if now.saturating_sub(settled) < grace => {
                    debug!("reusing renewal settled {}ms ago", now.saturating_sub(settled));
                    return flight.join();
                }
                Some(_) => {}
            }
        }

        self.started.set(self.started.get() + 1);
        let state = Rc::new(FlightState::default());
        let marker = Rc::clone(&state);
        let ctx = self.ctx.clone();

        let outcome = async move {
            let clock = Rc::clone(&ctx.clock);
            let result = perform_renewal(ctx).await;
            marker.settled_at.set(Some(clock.now_ms()));
            result
        }
        .boxed_local()
        .shared();

        let flight = Flight { outcome, state };
        let pending = flight.join();
        *slot = Some(flight);
        pending
    }

    /// Whether a renewal call is outstanding and still awaited by someone
    pub fn is_renewing(&self) -> bool {
        self.flight
            .borrow()
            .as_ref()
            .is_some_and(|flight| flight.state.in_progress())
    }

    /// Number of renewal calls started by this coordinator
    pub fn renewal_count(&self) -> u64 {
        self.started.get()
    }
}

async fn perform_renewal(ctx: SessionContext) -> RenewalOutcome {
    let target = ctx.resolve(&ctx.config.endpoints.renew)?;
    let mut request = ApiRequest::post(target.url.as_str());
    if !ctx.attach_csrf(&mut request.headers) {
        debug!("renewing without anti-forgery token");
    }

    let response = ctx.transport.send(request).await.inspect_err(|e| {
        warn!(error = %e, "renewal request failed");
    })?;

    if !response.status.is_success() {
        warn!(status = response.status.as_u16(), "renewal rejected");
        return Err(RenewalFailure::Rejected {
            status: response.status.as_u16(),
        });
    }

    let body: RenewalResponse = response
        .json()
        .map_err(|e| RenewalFailure::MalformedResponse(e.to_string()))?;
    let token = body
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| RenewalFailure::MalformedResponse("missing access_token".to_string()))?;

    ctx.store.set(token.as_str());
    info!("access credential renewed");
    Ok(AccessCredential::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, json_response};
    use http::StatusCode;

    #[tokio::test]
    async fn test_renew_stores_credential() {
        let harness = Harness::new();
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::OK, r#"{"access_token":"fresh","token_type":"bearer"}"#),
        );

        let coordinator = RefreshCoordinator::new(harness.ctx());
        let credential = coordinator.renew().await.unwrap();

        assert_eq!(credential.as_str(), "fresh");
        assert_eq!(harness.store.get().unwrap().as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_renew_sends_csrf_header_and_empty_body() {
        let harness = Harness::new();
        harness.cookies.set("XSRF-TOKEN", "csrf-1");
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::OK, r#"{"access_token":"fresh"}"#),
        );

        RefreshCoordinator::new(harness.ctx()).renew().await.unwrap();

        let sent = harness.transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, http::Method::POST);
        assert_eq!(sent[0].headers["x-csrf-token"], "csrf-1");
        assert!(sent[0].body.is_none());
        assert!(sent[0].headers.get(http::header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_renew_failures() {
        let harness = Harness::new();
        let coordinator = RefreshCoordinator::new(harness.ctx());

        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::UNAUTHORIZED, r#"{"detail":"Not authenticated"}"#),
        );
        assert_eq!(
            coordinator.renew().await,
            Err(RenewalFailure::Rejected { status: 401 })
        );

        harness
            .transport
            .respond_to("/auth/refresh", json_response(StatusCode::OK, r#"{"token_type":"bearer"}"#));
        assert!(matches!(
            coordinator.renew().await,
            Err(RenewalFailure::MalformedResponse(_))
        ));

        harness
            .transport
            .respond_to("/auth/refresh", json_response(StatusCode::OK, "<html>"));
        assert!(matches!(
            coordinator.renew().await,
            Err(RenewalFailure::MalformedResponse(_))
        ));

        harness.transport.fail("/auth/refresh", "connection refused");
        assert!(matches!(
            coordinator.renew().await,
            Err(RenewalFailure::Network(_))
        ));

        assert!(harness.store.get().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let harness = Harness::new();
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::OK, r#"{"access_token":"shared"}"#),
        );
        let coordinator = RefreshCoordinator::new(harness.ctx());

        let (a, b, c, d) = futures::join!(
            coordinator.renew_once(),
            coordinator.renew_once(),
            coordinator.renew_once(),
            coordinator.renew_once(),
        );

        assert_eq!(harness.transport.calls_to("/auth/refresh"), 1);
        assert_eq!(coordinator.renewal_count(), 1);
        for outcome in [&a, &b, &c, &d] {
            assert_eq!(outcome.as_ref().unwrap().as_str(), "shared");
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let harness = Harness::new();
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::INTERNAL_SERVER_ERROR, "{}"),
        );
        let coordinator = RefreshCoordinator::new(harness.ctx());

        let (a, b) = futures::join!(coordinator.renew_once(), coordinator.renew_once());

        assert_eq!(harness.transport.calls_to("/auth/refresh"), 1);
        assert_eq!(a, Err(RenewalFailure::Rejected { status: 500 }));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_is_renewing_tracks_flight() {
        let harness = Harness::new();
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::OK, r#"{"access_token":"t"}"#),
        );
        let coordinator = RefreshCoordinator::new(harness.ctx());
        assert!(!coordinator.is_renewing());

        let pending = coordinator.renew_once();
        assert!(coordinator.is_renewing());

        pending.await.unwrap();
        assert!(!coordinator.is_renewing());
    }

    #[tokio::test]
    async fn test_dropped_flight_is_replaced() {
        let harness = Harness::new();
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::OK, r#"{"access_token":"second"}"#),
        );
        let coordinator = RefreshCoordinator::new(harness.ctx());

        let mut first = coordinator.renew_once();
        let joined = first.clone();
        assert!(futures::poll!(&mut first).is_pending());
        assert_eq!(harness.transport.calls_to("/auth/refresh"), 1);

        drop(first);
        assert!(coordinator.is_renewing());
        drop(joined);
        assert!(!coordinator.is_renewing());

        let outcome = coordinator.renew_once().await;
        assert_eq!(outcome.unwrap().as_str(), "second");
        assert_eq!(harness.transport.calls_to("/auth/refresh"), 2);
        assert_eq!(coordinator.renewal_count(), 2);
    }

    #[tokio::test]
    async fn test_grace_period_then_new_flight() {
        let harness = Harness::new();
        harness.transport.respond_to(
            "/auth/refresh",
            json_response(StatusCode::OK, r#"{"access_token":"t"}"#),
        );
        let coordinator = RefreshCoordinator::new(harness.ctx());

        coordinator.renew_once().await.unwrap();

        harness.clock.advance(100);
        coordinator.renew_once().await.unwrap();
        assert_eq!(harness.transport.calls_to("/auth/refresh"), 1);

        harness.clock.advance(300);
        coordinator.renew_once().await.unwrap();
        assert_eq!(harness.transport.calls_to("/auth/refresh"), 2);
    }
}
