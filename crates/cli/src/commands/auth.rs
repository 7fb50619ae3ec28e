//! Bearer token management.

use secrecy::SecretString;

use super::{CliError, Context};

/// Store `token` for later requests.
pub async fn login(ctx: &Context, token: String) -> Result<(), CliError> {
    let token = SecretString::from(token);
    ctx.tokens().save(&token).await?;
    tracing::info!("Token stored");
    println!("Signed in.");
    Ok(())
}

/// Forget the stored token.
pub async fn logout(ctx: &Context) -> Result<(), CliError> {
    ctx.tokens().clear().await?;
    tracing::info!("Token cleared");
    println!("Signed out.");
    Ok(())
}
