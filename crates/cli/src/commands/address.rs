//! Saved shipping address commands.

use shopfront_client::{Address, NewAddress};
use shopfront_core::AddressId;

use super::{CliError, Context};

fn format_address(address: &Address) -> String {
    let marker = if address.is_default { "*" } else { " " };
    let f = &address.fields;
    format!(
        "{marker} {}  {}, {}, {} {}, {} ({})",
        address.id, f.full_name, f.line1, f.city, f.postal_code, f.country, f.phone
    )
}

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let addresses = ctx.addresses().list().await?;
    if addresses.is_empty() {
        println!("No saved addresses.");
    }
    for address in &addresses {
        println!("{}", format_address(address));
    }
    Ok(())
}

pub async fn add(ctx: &Context, fields: NewAddress) -> Result<(), CliError> {
    let address = ctx.addresses().add(fields).await?;
    println!("Saved {}", format_address(&address));
    Ok(())
}

pub async fn remove(ctx: &Context, id: AddressId) -> Result<(), CliError> {
    ctx.addresses().remove(id).await?;
    println!("Removed {id}");
    Ok(())
}

pub async fn set_default(ctx: &Context, id: AddressId) -> Result<(), CliError> {
    ctx.addresses().set_default(id).await?;
    println!("{id} is now the default address");
    Ok(())
}
