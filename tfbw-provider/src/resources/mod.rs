//! Managed resources: `bitwarden_project` and `bitwarden_secret`.
//!
//! Both manage a batch of items under one Terraform resource.  The resource
//! `id` is a locally generated tracking id; the server-assigned ids live on
//! the items.

pub mod project;
pub mod secret;

use rand::TryRngCore;
use tfbw_core::{AttributePath, DeleteOutcome, Diagnostics};

/// Random v4 UUID for the resource `id`, drawn from the OS RNG.
pub(crate) fn tracking_id() -> Result<String, Diagnostics> {
    tracking_id_with(|bytes| {
        rand::rngs::OsRng
            .try_fill_bytes(bytes)
            .map_err(|e| e.to_string())
    })
}

fn tracking_id_with(
    fill: impl FnOnce(&mut [u8; 16]) -> Result<(), String>,
) -> Result<String, Diagnostics> {
    let mut bytes = [0u8; 16];
    match fill(&mut bytes) {
        Ok(()) => Ok(uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string()),
        Err(e) => Err(Diagnostics::attribute_error(
            AttributePath::root("id"),
            "Unable to generate resource id",
            format!("The resource couldn't be created due to an id generation issue: {e}"),
        )),
    }
}

/// Turn per-id refusals from a bulk delete into errors.
pub(crate) fn delete_errors(kind: &str, outcomes: &[DeleteOutcome]) -> Diagnostics {
    let mut diags = Diagnostics::new();
    for outcome in outcomes {
        if let Some(error) = &outcome.error {
            diags.add_error(
                format!("Error deleting {kind}"),
                format!("Could not delete {kind} {}: {error}", outcome.id),
            );
        }
    }
    diags
}
