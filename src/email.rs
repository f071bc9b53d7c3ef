//! Receipt email delivery via the Resend API.
//!
//! Receipts are a settlement side effect: failures are logged and never
//! propagated back into the settlement outcome.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Order;

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

/// Per-request timeout. The receipt task runs detached, but a hung request
/// would still pin it through every retry, so each attempt is bounded.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Format minor units as a decimal amount with the currency uppercased.
fn format_amount(amount: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount / 100,
        amount % 100,
        currency.to_uppercase()
    )
}

/// Result of attempting to send a receipt email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was sent successfully via Resend
    Sent,
    /// No API key configured, email skipped
    NoApiKey,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Email service using Resend API.
#[derive(Clone)]
pub struct EmailService {
    /// Resend API key (from ENV). None disables delivery.
    api_key: Option<String>,
    /// "from" address (from ENV)
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Send a purchase receipt for a settled order.
    pub async fn send_receipt(&self, order: &Order) -> Result<EmailSendResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(
                order_no = %order.order_no,
                "No Resend API key configured, skipping receipt email"
            );
            return Ok(EmailSendResult::NoApiKey);
        };

        // Receipts go to the address the payer used at the provider when we
        // have it, otherwise the account email from checkout.
        let to_email = order.paid_email.as_deref().unwrap_or(&order.user_email);

        let subject = format!("Receipt for your {} purchase", order.plan_name);
        let date = format_date(order.paid_at.unwrap_or(order.created_at));
        let amount = format_amount(order.amount, &order.currency);

        let text = format!(
            "Receipt for your {} purchase\n\nThank you for your purchase.\n\nPlan: {}\nAmount: {}\nCredits: {}\nDate: {}\nOrder: {}\n\nIf you have any questions, just reply to this email.",
            order.plan_name, order.plan_name, amount, order.credits, date, order.order_no
        );
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Receipt for your {} purchase</h2>
<p>Thank you for your purchase.</p>
<table style="border-collapse: collapse; width: 100%;">
<tr><td style="padding: 8px 0; color: #666;">Plan</td><td style="padding: 8px 0;"><strong>{}</strong></td></tr>
<tr><td style="padding: 8px 0; color: #666;">Amount</td><td style="padding: 8px 0;"><strong>{}</strong></td></tr>
<tr><td style="padding: 8px 0; color: #666;">Credits</td><td style="padding: 8px 0;">{}</td></tr>
<tr><td style="padding: 8px 0; color: #666;">Date</td><td style="padding: 8px 0;">{}</td></tr>
<tr><td style="padding: 8px 0; color: #666;">Order</td><td style="padding: 8px 0;"><code>{}</code></td></tr>
</table>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">If you have any questions, just reply to this email.</p>
</body>
</html>"#,
            order.plan_name, order.plan_name, amount, order.credits, date, order.order_no
        );

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to_email],
            subject,
            text,
            html,
        };

        self.send_request_with_retry(api_key, &request, to_email, &order.order_no)
            .await
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    /// Fails immediately on non-transient errors (4xx except 429).
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
        to_email: &str,
        order_no: &str,
    ) -> Result<EmailSendResult> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            // Sleep before retry (skip on first attempt)
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying email send after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt,
                            to = %to_email,
                            order_no = %order_no,
                            "Email sent successfully after retry"
                        );
                    } else {
                        tracing::info!(
                            to = %to_email,
                            order_no = %order_no,
                            "Receipt email sent via Resend"
                        );
                    }
                    return Ok(EmailSendResult::Sent);
                }
                Err((error, is_transient)) => {
                    if is_transient {
                        last_error = Some(error);
                        // Continue to next retry
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        // All retries exhausted
        tracing::error!(
            to = %to_email,
            order_no = %order_no,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Send a single request to Resend API.
    ///
    /// Returns Ok(()) on success, or Err((AppError, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                // Network errors are transient
                (
                    AppError::Internal(format!("Email service error: {}", e)),
                    true,
                )
            })?;

        let status = response.status();

        if status.is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Internal("Email service response error".into()), false)
            })?;
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();

            let is_transient = status.as_u16() == 429 // Rate limited
                || status.is_server_error(); // 5xx errors

            if is_transient {
                tracing::warn!(
                    status = %status,
                    body = %body,
                    "Resend API returned transient error"
                );
            } else {
                tracing::error!(
                    status = %status,
                    body = %body,
                    "Resend API returned non-transient error"
                );
            }

            Err((
                AppError::Internal(format!("Email service error: {} - {}", status, body)),
                is_transient,
            ))
        }
    }
}
