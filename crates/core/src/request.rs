//! Authenticated request wrapper
//!
//! Attaches the bearer credential and anti-forgery header, classifies the
//! response and, on a recoverable 401, renews through the shared coordinator
//! and retries exactly once. Unrecoverable outcomes go to the failure handler.

use http::header::{AUTHORIZATION, HeaderValue};
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::rc::Rc;

use crate::context::SessionContext;
use crate::credential::AccessCredential;
use crate::error::{ClientError, TransportError};
use crate::failure::SessionFailureHandler;
use crate::paths::{Target, is_auth_endpoint};
use crate::refresh::RefreshCoordinator;
use crate::transport::{ApiRequest, ApiResponse};

/// Shown when a 403 body carries no usable detail
pub const GENERIC_FORBIDDEN_DETAIL: &str = "You do not have permission to perform this action.";

const DETAIL_FIELDS: [&str; 4] = ["detail", "error_details", "errorDetails", "message"];

/// Extract the human-readable reason from a 403 body.
///
/// Field priority: `detail`, then `error_details`, then `message`.
pub fn forbidden_detail(body: &[u8]) -> String {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        return GENERIC_FORBIDDEN_DETAIL.to_string();
    };
    DETAIL_FIELDS
        .iter()
        .find_map(|field| {
            fields
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
        })
        .map_or_else(|| GENERIC_FORBIDDEN_DETAIL.to_string(), ToString::to_string)
}

/// How a request target is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Classification {
    /// Same-origin and not a bare auth endpoint
    eligible: bool,
    /// Static asset: never renews, never escalates
    skippable: bool,
}

/// Client wrapping every same-origin call the admin pages make
pub struct AuthenticatedClient {
    ctx: SessionContext,
    coordinator: Rc<RefreshCoordinator>,
    failures: Rc<SessionFailureHandler>,
}

impl AuthenticatedClient {
    pub const fn new(
        ctx: SessionContext,
        coordinator: Rc<RefreshCoordinator>,
        failures: Rc<SessionFailureHandler>,
    ) -> Self {
        Self {
            ctx,
            coordinator,
            failures,
        }
    }

    /// Send a request, renewing and retrying once on a recoverable 401.
    ///
    /// Auth failures are reported to the failure handler and the response is
    /// still returned to the caller; any other status is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the URL is invalid or the network fails
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let target = self.ctx.resolve(&request.url)?;
        let class = self.classify(&target);
        let credential = self.ctx.store.get();

        let outbound = self.prepare(&request, &target, class, credential.as_ref());
        let response = self.ctx.transport.send(outbound).await?;

        match response.status {
            StatusCode::FORBIDDEN if !class.skippable => {
                self.report_forbidden(&target, &response);
                Ok(response)
            }
            StatusCode::UNAUTHORIZED if class.skippable || !class.eligible => {
                debug!(path = target.path(), "passing through 401");
                Ok(response)
            }
            StatusCode::UNAUTHORIZED => self.recover(&request, &target, class, response).await,
            _ => Ok(response),
        }
    }

    async fn recover(
        &self,
        request: &ApiRequest,
        target: &Target,
        class: Classification,
        original: ApiResponse,
    ) -> Result<ApiResponse, TransportError> {
        if self.ctx.store.is_empty() {
            info!(path = target.path(), "401 without a stored credential");
            self.failures.expired().await;
            return Ok(original);
        }

        if self.coordinator.is_renewing() {
            debug!(path = target.path(), "renewal already in progress, returning 401");
            return Ok(original);
        }

        let fresh = match self.coordinator.renew_once().await {
            Ok(fresh) => fresh,
            Err(failure) => {
                warn!(error = %failure, path = target.path(), "renewal after 401 failed");
                self.failures.expired().await;
                return Ok(original);
            }
        };

        debug!(path = target.path(), "retrying with renewed credential");
        let retry = self.prepare(request, target, class, Some(&fresh));
        let retried = self.ctx.transport.send(retry).await?;

        match retried.status {
            StatusCode::FORBIDDEN => self.report_forbidden(target, &retried),
            StatusCode::UNAUTHORIZED => {
                warn!(path = target.path(), "still unauthorized after renewal");
                self.failures.expired().await;
            }
            _ => {}
        }
        Ok(retried)
    }

    fn classify(&self, target: &Target) -> Classification {
        let path = target.path();
        let endpoints = self.ctx.config.endpoints.auth_endpoints();
        Classification {
            eligible: target.same_origin && !is_auth_endpoint(path, endpoints),
            skippable: self.ctx.config.skip.is_skippable(path),
        }
    }

    /// Build the wire request; headers are rebuilt from scratch on every call
    /// so a retry always carries the fresh credential and anti-forgery token.
    fn prepare(
        &self,
        request: &ApiRequest,
        target: &Target,
        class: Classification,
        credential: Option<&AccessCredential>,
    ) -> ApiRequest {
        let mut outbound = request.clone();
        outbound.url = target.url.to_string();
        outbound.headers.remove(AUTHORIZATION);

        if class.eligible {
            if let Some(credential) = credential {
                match HeaderValue::from_str(&credential.bearer()) {
                    Ok(mut value) => {
                        value.set_sensitive(true);
                        outbound.headers.insert(AUTHORIZATION, value);
                    }
                    Err(_) => warn!("stored credential is not a valid header value"),
                }
            }
        }

        if target.same_origin && outbound.method != Method::GET {
            self.ctx.attach_csrf(&mut outbound.headers);
        }

        outbound
    }

    fn report_forbidden(&self, target: &Target, response: &ApiResponse) {
        let detail = forbidden_detail(&response.body);
        info!(path = target.path(), detail = %detail, "request forbidden");
        self.failures.forbidden(detail);
    }

    /// Send and decode a 2xx JSON body; other statuses become `ClientError`
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` for transport failures, non-2xx statuses and
    /// undecodable bodies
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        if response.status.is_success() {
            Ok(response.json()?)
        } else {
            Err(ClientError::from_status(response.status, response.text()))
        }
    }

    /// GET a JSON resource
    ///
    /// # Errors
    ///
    /// See [`Self::send_json`]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        self.send_json(ApiRequest::get(url)).await
    }

    /// POST a JSON body and decode the JSON reply
    ///
    /// # Errors
    ///
    /// See [`Self::send_json`]
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send_json(ApiRequest::post(url).json(body)?).await
    }

    /// DELETE a resource, discarding the body
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` for transport failures and non-2xx statuses
    pub async fn delete(&self, url: &str) -> Result<(), ClientError> {
        let response = self.send(ApiRequest::delete(url)).await?;
        if response.status.is_success() {
            Ok(())
        } else {
            Err(ClientError::from_status(response.status, response.text()))
        }
    }
}
