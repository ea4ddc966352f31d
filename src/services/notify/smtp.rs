use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{format_currency, Notifier};
use crate::models::BookingSnapshot;

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
        from: String,
    ) -> anyhow::Result<Self> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay: {host}"))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { mailer, from })
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(to.parse().context("invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .context("failed to build email")?;

        self.mailer
            .send(email)
            .await
            .context("failed to send email")?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn payment_confirmed(&self, booking: &BookingSnapshot) -> anyhow::Result<()> {
        self.send(
            &booking.recipient_email,
            "Booking Confirmation - Payment Successful",
            confirmation_html(booking),
        )
        .await?;

        tracing::info!(booking_id = %booking.booking_id, "confirmation email sent");
        Ok(())
    }

    async fn proof_received(&self, booking: &BookingSnapshot) -> anyhow::Result<()> {
        self.send(
            &booking.recipient_email,
            "Payment Proof Received",
            proof_html(booking),
        )
        .await?;

        tracing::info!(booking_id = %booking.booking_id, "proof receipt email sent");
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn passenger_rows(booking: &BookingSnapshot) -> String {
    booking
        .passengers
        .iter()
        .map(|p| {
            format!(
                "<tr><td>{} {}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&p.first_name),
                escape_html(&p.last_name),
                p.age,
                escape_html(&p.seat_number)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn confirmation_html(booking: &BookingSnapshot) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">Your booking is confirmed</h2>
        <p>Hi {name}, thank you for your payment.</p>
        <p>
            <strong>Booking:</strong> {id}<br>
            <strong>Journey:</strong> {from} to {to}<br>
            <strong>Departure:</strong> {departure}<br>
            <strong>Payment reference:</strong> {reference}
        </p>
        <table style="width: 100%; border-collapse: collapse;">
            <tr><th align="left">Passenger</th><th align="left">Age</th><th align="left">Seat</th></tr>
            {rows}
        </table>
        <p><strong>Total paid:</strong> {total}</p>
    </div>
</body>
</html>
"#,
        name = escape_html(&booking.recipient_first_name),
        id = escape_html(&booking.booking_id),
        from = escape_html(&booking.from_location),
        to = escape_html(&booking.to_location),
        departure = booking.departure_at.format("%Y-%m-%d %H:%M"),
        reference = escape_html(booking.payment_id.as_deref().unwrap_or("-")),
        rows = passenger_rows(booking),
        total = format_currency(booking.total_fare),
    )
}

fn proof_html(booking: &BookingSnapshot) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">We received your proof of payment</h2>
        <p>Hi {name}, your bank transfer proof for booking {id} ({from} to {to}) has been received.</p>
        <p>Amount due: {total}. We will confirm your seats once the transfer is verified.</p>
    </div>
</body>
</html>
"#,
        name = escape_html(&booking.recipient_first_name),
        id = escape_html(&booking.booking_id),
        from = escape_html(&booking.from_location),
        to = escape_html(&booking.to_location),
        total = format_currency(booking.total_fare),
    )
}
