//! Prints a TripIt authorization URL and, when given the URL TripIt redirected back to,
//! completes the sign-in and prints the resulting identity.
//!
//! ```sh
//! TRIPIT_CLIENT_ID=... TRIPIT_CLIENT_SECRET=... cargo run --example sign_in
//! TRIPIT_CLIENT_ID=... TRIPIT_CLIENT_SECRET=... TRIPIT_STATE_SECRET=... \
//!     cargo run --example sign_in -- 'https://localhost/signin-tripit?code=...&state=...' \
//!     '<correlation cookie printed by the first run>'
//! ```

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use url::Url;
// self
use oauth2_tripit::{
	flows::{CallbackOutcome, Dispatch, TripItAuthentication},
	options::ProviderOptions,
	provider::StaticHost,
	state::{AuthorizationState, SignedStateCodec, state_purposes},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let client_id = env::var("TRIPIT_CLIENT_ID")?;
	let client_secret = env::var("TRIPIT_CLIENT_SECRET")?;
	// Both runs must share this key.
	let state_secret =
		env::var("TRIPIT_STATE_SECRET").unwrap_or_else(|_| "demo-state-secret".into());
	let codec = SignedStateCodec::new(state_secret, &state_purposes("TripIt"))?;
	let options = ProviderOptions::builder(client_id, client_secret)
		.state_codec(Arc::new(codec))
		.sign_in_as("DemoCookie")
		.build();
	let auth = TripItAuthentication::new(options, &StaticHost::default())?;

	match env::args().nth(1) {
		None => {
			let current = Url::parse("https://localhost/trips")?;
			let redirect = auth
				.challenge(&current, AuthorizationState::new("/trips").with_property("demo", "1"))?;

			println!("Send your user to {}.", redirect.url);
			println!("Set cookie {}={}.", auth.correlation_cookie_name(), redirect.correlation);
			println!("Rerun with the URL TripIt redirects back to and the cookie value.");
		},
		Some(callback) => {
			let callback = Url::parse(&callback)?;
			let correlation = env::args().nth(2);
			let outcome = match auth.invoke(&callback, correlation.as_deref(), || async {}).await {
				Dispatch::Callback(outcome) => outcome,
				Dispatch::Next(()) =>
					return Err(eyre!("`{callback}` is not on the {} path.", auth.callback_path())),
			};

			match outcome {
				CallbackOutcome::Succeeded(sign_in) => {
					println!(
						"Signed in {} ({}) for {}.",
						sign_in.identity.external_id,
						sign_in.identity.display_name.as_deref().unwrap_or("no display name"),
						sign_in.sign_in_as
					);

					for claim in &sign_in.identity.claims {
						println!("  {} = {}", claim.claim_type, claim.value);
					}
				},
				CallbackOutcome::Failed(failure) => {
					eprintln!("Sign-in failed ({}): {}.", failure.reason, failure.error);

					if let Some(uri) = failure.redirect_uri {
						eprintln!("The host would redirect to {uri}.");
					}
				},
			}
		},
	}

	Ok(())
}
