//! Interactive terminal checkout.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::time::{Instant, MissedTickBehavior};

use pix_hex::{CheckoutSession, CheckoutView, LifecycleError};
use pix_types::{CustomerForm, PixGateway};

/// Creates the charge, then shows the countdown and polls until the checkout
/// settles. Ctrl-C abandons the checkout without cancelling it upstream.
pub async fn run<G: PixGateway>(
    session: &CheckoutSession<G>,
    form: &CustomerForm,
    poll_every: Duration,
) -> Result<()> {
    let tx = match session.submit(form).await {
        Ok(tx) => tx,
        Err(LifecycleError::Validation(errors)) => {
            for err in errors.iter() {
                eprintln!("✗ {}: {}", err.field, err.message);
            }
            bail!("Invalid payer data");
        }
        Err(err) => return Err(err.into()),
    };

    println!("Transaction {}", tx.id());
    println!("PIX copia e cola:");
    println!("{}", tx.pix().copy_and_paste);
    println!();

    let mut updates = session.subscribe();
    let mut poll = tokio::time::interval_at(Instant::now() + poll_every, poll_every);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        match session.view() {
            CheckoutView::AwaitingPayment { countdown, .. } => {
                print!("\rWaiting for payment, expires in {}  ", countdown);
                io::stdout().flush()?;
            }
            CheckoutView::Paid { transaction_id } => {
                println!("\n✓ Payment confirmed ({})", transaction_id);
                return Ok(());
            }
            CheckoutView::Expired => {
                println!();
                bail!("The PIX code expired. Start a new checkout");
            }
            CheckoutView::Refunded => {
                println!("\n✓ Transaction refunded");
                return Ok(());
            }
            CheckoutView::Failed { message } => bail!(message),
            CheckoutView::Form => bail!("Checkout is no longer active"),
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                session.back();
                println!("\nCheckout abandoned");
                return Ok(());
            }
            _ = poll.tick() => match session.confirm_payment().await {
                Ok(_) | Err(LifecycleError::Expired) => {}
                Err(err) => eprintln!("\n✗ Status check failed: {}", err),
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    bail!("Checkout stopped");
                }
            }
        }
    }
}
