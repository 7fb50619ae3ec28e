//! Checkout: order the selected items of the server cart.

use shopfront_client::api::ShippingInfo;
use shopfront_client::{
    ApiError, CartController, ClientError, Notice, Notifier, OrderDraft, place_order,
};
use shopfront_core::{AddressId, PaymentMethod};

use super::{CliError, Context, cart::format_cart, money};

pub async fn run(
    ctx: &Context,
    address: Option<AddressId>,
    payment: PaymentMethod,
) -> Result<(), CliError> {
    let book = ctx.addresses();
    let address = match address {
        Some(id) => book.get(id).await?,
        None => book.default_address().await?.ok_or_else(|| {
            ClientError::BadRequest(
                "no saved address; add one with `shopfront address add`".to_string(),
            )
        })?,
    };

    let api = ctx.api()?;
    let (notifier, mut notices) = Notifier::channel();
    let cart = CartController::new(api.clone(), notifier, ctx.config.sync_debounce);
    let snapshot = cart.load().await;
    // An empty cart from a failed load must not read as "nothing selected".
    if let Ok(notice) = notices.try_recv() {
        return Err(match notice {
            Notice::AuthRequired { message } => ApiError::Unauthorized(message).into(),
            other => ClientError::BadRequest(other.to_string()).into(),
        });
    }
    println!("{}", format_cart(&snapshot));

    let draft = OrderDraft::from_snapshot(
        &snapshot,
        ShippingInfo::from(&address),
        payment,
        &ctx.config.pricing,
    )?;
    let totals = draft.totals();
    println!(
        "Items {}  Shipping {}  Tax {}  Total {}",
        money(totals.items),
        money(totals.shipping),
        money(totals.tax),
        money(totals.total)
    );
    println!("Shipping to {}, paying by {payment}", address.fields.full_name);

    let order = place_order(&cart, api.as_ref(), &draft).await?;
    println!(
        "Order {} placed ({}), total {}",
        order.id,
        order.status,
        money(order.total_price)
    );
    Ok(())
}
