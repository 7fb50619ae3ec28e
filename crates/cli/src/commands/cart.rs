//! Cart commands and the interactive cart session.
//!
//! The session reads one command per line from stdin. Edits apply locally at
//! once and reach the backend after the sync quiet period; notices from
//! failed syncs are printed as they arrive.

use std::fmt::Write as _;

use shopfront_client::{CartController, CartService, CartSnapshot, Notifier};
use shopfront_core::ProductId;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{CliError, Context, money};

const HELP: &str = "\
commands:
  show            list the cart
  inc <id>        add one
  dec <id>        remove one
  toggle <id>     select or deselect for checkout
  all | none      select every item / clear the selection
  rm <id>         remove an item
  total           selected total
  reload          sync and fetch the cart again
  quit            sync pending changes and exit";

/// One line of session input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Show,
    Increment(ProductId),
    Decrement(ProductId),
    Toggle(ProductId),
    SelectAll,
    SelectNone,
    Remove(ProductId),
    Total,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("usage: {0} <product-id>")]
    MissingId(&'static str),
}

impl SessionCommand {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let mut id = |verb: &'static str| {
            words
                .next()
                .map(ProductId::new)
                .ok_or(ParseError::MissingId(verb))
        };

        let command = match verb {
            "show" | "ls" => Self::Show,
            "inc" | "+" => Self::Increment(id("inc")?),
            "dec" | "-" => Self::Decrement(id("dec")?),
            "toggle" => Self::Toggle(id("toggle")?),
            "all" => Self::SelectAll,
            "none" => Self::SelectNone,
            "rm" | "remove" => Self::Remove(id("rm")?),
            "total" => Self::Total,
            "reload" => Self::Reload,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Render a cart listing.
pub fn format_cart(snapshot: &CartSnapshot) -> String {
    if snapshot.items.is_empty() {
        return "Cart is empty.".to_string();
    }

    let mut out = String::new();
    for item in &snapshot.items {
        let mark = if snapshot.is_selected(&item.product_id) {
            "[x]"
        } else {
            "[ ]"
        };
        let stock = if item.is_sold_out() {
            "sold out".to_string()
        } else {
            format!("{} in stock", item.stock_limit)
        };
        let _ = writeln!(
            out,
            "{mark} {}  {}  {} x {} = {}  ({stock})",
            item.product_id,
            item.name,
            item.quantity,
            money(item.unit_price),
            money(item.line_total()),
        );
    }
    let _ = write!(
        out,
        "{} items, selected total {}",
        snapshot.item_count,
        money(snapshot.selected_total)
    );
    out
}

/// Run the interactive session until `quit` or end of input.
pub async fn session(ctx: &Context) -> Result<(), CliError> {
    let (notifier, mut notices) = Notifier::channel();
    let cart = CartController::new(ctx.api()?, notifier, ctx.config.sync_debounce);

    println!("{}", format_cart(&cart.load().await));
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            Some(notice) = notices.recv() => println!("! {notice}"),
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                };
                match SessionCommand::parse(&line) {
                    Ok(Some(SessionCommand::Quit)) => break Ok(()),
                    Ok(Some(command)) => apply(&cart, command).await,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
        }
    };

    // Pending edits are sent even if stdin failed.
    cart.shutdown().await;
    while let Ok(notice) = notices.try_recv() {
        println!("! {notice}");
    }
    result.map_err(CliError::from)
}

async fn apply(cart: &CartController, command: SessionCommand) {
    match command {
        SessionCommand::Show => println!("{}", format_cart(&cart.snapshot())),
        SessionCommand::Increment(id) => {
            if let Ok(quantity) = cart.change_quantity(&id, 1) {
                println!("{id}: {quantity}");
            }
        }
        SessionCommand::Decrement(id) => {
            if let Ok(quantity) = cart.change_quantity(&id, -1) {
                println!("{id}: {quantity}");
            }
        }
        SessionCommand::Toggle(id) => {
            let state = if cart.toggle_selection(&id) {
                "selected"
            } else {
                "not selected"
            };
            println!("{id}: {state}");
        }
        SessionCommand::SelectAll => cart.select_all(),
        SessionCommand::SelectNone => cart.clear_selection(),
        SessionCommand::Remove(id) => {
            if cart.delete_item(&id) {
                println!("Removed {id}");
            } else {
                println!("{id} is not in the cart");
            }
        }
        SessionCommand::Total => println!("Selected total: {}", money(cart.selected_total())),
        SessionCommand::Reload => {
            cart.flush_pending().await;
            println!("{}", format_cart(&cart.load().await));
        }
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => {}
    }
}

/// Add a product to the server cart.
pub async fn add(ctx: &Context, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let product_id = ProductId::new(product_id);
    ctx.api()?.add_item(&product_id, quantity).await?;
    println!("Added {quantity} x {product_id}");
    Ok(())
}

/// Empty the server cart.
pub async fn clear(ctx: &Context) -> Result<(), CliError> {
    ctx.api()?.clear_cart().await?;
    println!("Cart cleared.");
    Ok(())
}
