use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use tracing::warn;

use crate::billing::ports::NotificationDispatcher;
use crate::billing::types::{DispatchOutcome, SendInvoiceRequest};
use crate::repository::table_service::{create_row, get_row};

/// Dispatcher that queues tenant-facing messages in `message_logs` (the
/// transport workers drain that table) and optionally posts the invoice
/// event to a configured webhook. Always fire-and-collect: every failure is
/// recorded in the outcome, nothing is thrown.
pub struct QueueNotificationDispatcher {
    pool: PgPool,
    http_client: reqwest::Client,
    webhook_url: Option<String>,
    app_public_url: String,
}

impl QueueNotificationDispatcher {
    pub fn new(
        pool: PgPool,
        http_client: reqwest::Client,
        webhook_url: Option<String>,
        app_public_url: String,
    ) -> Self {
        Self {
            pool,
            http_client,
            webhook_url,
            app_public_url,
        }
    }

    async fn queue_whatsapp_message(
        &self,
        request: &SendInvoiceRequest,
        invoice: &Value,
        errors: &mut Vec<String>,
    ) {
        let tenant = match get_row(&self.pool, "tenants", &request.tenant_id, "id").await {
            Ok(tenant) => tenant,
            Err(error) => {
                errors.push(format!("Could not load tenant {}: {error}", request.tenant_id));
                return;
            }
        };

        let tenant_phone = val_str(&tenant, "phone_e164");
        if tenant_phone.is_empty() {
            errors.push(format!("Tenant {} has no phone number.", request.tenant_id));
            return;
        }

        let tenant_name = val_str(&tenant, "full_name");
        let due_date = val_str(invoice, "due_date");
        let currency = val_str(invoice, "currency");
        let total = invoice
            .as_object()
            .and_then(|obj| obj.get("total"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let amount_display = format_amount(total, &currency);
        let app_public_url = &self.app_public_url;

        let body = format!(
            "Hola {tenant_name} 👋\n\n\
             Tu factura de alquiler por {amount_display} ya está disponible.\n\
             Fecha límite de pago: {due_date}.\n\n\
             Consulta el detalle y paga en:\n\
             {app_public_url}/tenant/invoices\n\n\
             — Vivenda"
        );

        let mut message = Map::new();
        message.insert(
            "organization_id".to_string(),
            Value::String(request.organization_id.clone()),
        );
        message.insert("channel".to_string(), Value::String("whatsapp".to_string()));
        message.insert("recipient".to_string(), Value::String(tenant_phone));
        message.insert("status".to_string(), Value::String("queued".to_string()));
        message.insert(
            "scheduled_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        let mut payload = Map::new();
        payload.insert("body".to_string(), Value::String(body));
        payload.insert(
            "notice_type".to_string(),
            Value::String("invoice_issued".to_string()),
        );
        payload.insert(
            "invoice_id".to_string(),
            Value::String(request.invoice_id.clone()),
        );
        message.insert("payload".to_string(), Value::Object(payload));

        if let Err(error) = create_row(&self.pool, "message_logs", &message).await {
            errors.push(format!(
                "Failed to queue message for invoice {}: {error}",
                request.invoice_id
            ));
        }
    }

    async fn post_webhook(&self, request: &SendInvoiceRequest, invoice: &Value, errors: &mut Vec<String>) {
        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };

        let event = json!({
            "event": "invoice.issued",
            "invoice_id": request.invoice_id,
            "organization_id": request.organization_id,
            "tenant_id": request.tenant_id,
            "total": invoice.as_object().and_then(|obj| obj.get("total")).cloned().unwrap_or(Value::Null),
            "due_date": val_str(invoice, "due_date"),
        });

        match self.http_client.post(url).json(&event).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                errors.push(format!("Invoice webhook returned {}.", response.status()));
            }
            Err(error) => {
                errors.push(format!("Invoice webhook failed: {error}"));
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for QueueNotificationDispatcher {
    async fn send_invoice_to_tenant(&self, request: SendInvoiceRequest) -> DispatchOutcome {
        let mut errors = Vec::new();

        let invoice = match get_row(&self.pool, "invoices", &request.invoice_id, "id").await {
            Ok(invoice) => invoice,
            Err(error) => {
                warn!(invoice_id = %request.invoice_id, %error, "Dispatch could not load invoice");
                return DispatchOutcome::failed(vec![format!(
                    "Could not load invoice {}: {error}",
                    request.invoice_id
                )]);
            }
        };

        for channel in &request.channels {
            match channel.as_str() {
                "whatsapp" => {
                    self.queue_whatsapp_message(&request, &invoice, &mut errors)
                        .await;
                }
                other => {
                    errors.push(format!("Unsupported channel '{other}'."));
                }
            }
        }

        self.post_webhook(&request, &invoice, &mut errors).await;

        if errors.is_empty() {
            DispatchOutcome::ok()
        } else {
            DispatchOutcome::failed(errors)
        }
    }
}

fn format_amount(amount: f64, currency: &str) -> String {
    match currency {
        "COP" => format!("$ {}", format_number_with_dots(amount as i64)),
        "USD" => format!("${amount:.2}"),
        _ => format!("{amount:.2} {currency}"),
    }
}

fn format_number_with_dots(n: i64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push('.');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

fn val_str(row: &Value, key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{format_amount, format_number_with_dots};

    #[test]
    fn formats_cop_amounts_with_dot_separators() {
        assert_eq!(format_number_with_dots(1500000), "1.500.000");
        assert_eq!(format_number_with_dots(950), "950");
        assert_eq!(format_amount(1500000.0, "COP"), "$ 1.500.000");
        assert_eq!(format_amount(120.5, "USD"), "$120.50");
    }
}
