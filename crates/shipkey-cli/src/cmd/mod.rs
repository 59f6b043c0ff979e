//! Command implementations

pub mod genkey;
pub mod release;
pub mod upgrade;
pub mod upload;
pub mod verify;

use std::str::FromStr;

use shipkey_core::Error;
use shipkey_core::api::HttpReleaseApi;
use shipkey_schema::SchemaError;

use crate::Globals;

/// Parse an algorithm, encoding or channel selector.
fn selector<T: FromStr<Err = SchemaError>>(text: &str) -> Result<T, Error> {
    text.parse().map_err(Error::from)
}

/// API client for the configured account.
fn client(globals: &Globals) -> anyhow::Result<HttpReleaseApi> {
    let config = globals.client_config()?;
    Ok(HttpReleaseApi::new(config).map_err(Error::Remote)?)
}
