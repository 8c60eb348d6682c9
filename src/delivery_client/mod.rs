//! Outbound HTTP delivery.
//!
//! [`DeliveryClient`] is the seam the pipeline calls once per message.
//! [`HttpDeliveryClient`] implements it with a pooled `ureq` agent: one
//! synchronous form POST per call, success meaning status 200 exactly.
//! Failures are audited here so the pipeline only has to branch on a bool.

mod url_encoding;

use std::sync::Arc;

use ureq::{Agent, AgentBuilder};

use crate::config::{ApplicationConfig, RequestConfig};
use crate::level::CourierLevel;
use crate::logger::CourierLogger;
use crate::payload::Payload;

pub(crate) use url_encoding::encode_form;

/// Log category for delivery requests.
pub const REQUEST_CATEGORY: &str = "request";

/// Sends one task to the delivery target.
pub trait DeliveryClient: Send + Sync {
    /// Deliver `form` and report whether the target accepted it.
    ///
    /// Implementations never panic and never return errors; every failure
    /// is `false`.
    fn send(&self, form: &Payload) -> bool;
}

impl<T: DeliveryClient + ?Sized> DeliveryClient for Arc<T> {
    fn send(&self, form: &Payload) -> bool {
        (**self).send(form)
    }
}

/// `ureq`-backed delivery client.
pub struct HttpDeliveryClient {
    agent: Agent,
    url: String,
    user_agent: String,
    logger: Arc<CourierLogger>,
}

impl HttpDeliveryClient {
    pub fn new(request: &RequestConfig, app: &ApplicationConfig, logger: Arc<CourierLogger>) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(request.timeout)
            .timeout(request.timeout)
            .build();
        Self {
            agent,
            url: request.url(),
            user_agent: app.user_agent(),
            logger,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn log_rejection(&self, form: &Payload, status: u16, reason: &str, response: ureq::Response) {
        let body = response
            .into_string()
            .unwrap_or_else(|err| format!("<unreadable response body: {err}>"));
        self.logger.log(
            format!(
                "Request to {} failed with status {status} {reason}. Params: {form}. Response: {body}",
                self.url
            ),
            CourierLevel::Error,
            REQUEST_CATEGORY,
        );
    }
}

impl DeliveryClient for HttpDeliveryClient {
    fn send(&self, form: &Payload) -> bool {
        self.logger.log(
            format!("Request target URL: {}", self.url),
            CourierLevel::Info,
            REQUEST_CATEGORY,
        );
        let body = encode_form(form);
        let result = self
            .agent
            .post(&self.url)
            .set("User-Agent", &self.user_agent)
            .set("Content-Type", "application/x-www-form-urlencoded")
            .send_string(&body);
        match result {
            Ok(response) if response.status() == 200 => true,
            Ok(response) => {
                let status = response.status();
                let reason = response.status_text().to_owned();
                self.log_rejection(form, status, &reason, response);
                false
            }
            Err(ureq::Error::Status(status, response)) => {
                let reason = response.status_text().to_owned();
                self.log_rejection(form, status, &reason, response);
                false
            }
            Err(ureq::Error::Transport(err)) => {
                self.logger.log(
                    format!("Request to {} failed: {err}. Params: {form}", self.url),
                    CourierLevel::Error,
                    REQUEST_CATEGORY,
                );
                false
            }
        }
    }
}
