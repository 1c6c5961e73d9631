//! access_ca_certificate - short-lived certificate CA of an Access application
//!
//! The certificate is keyed remotely by its application, at account or zone
//! level. There is nothing to update in place: every user-settable attribute
//! forces replacement, so `update` never talks to the API.
//!
//! Import IDs take the form `account/<account_id>/<certificate_id>` or
//! `zone/<zone_id>/<certificate_id>`.

use carina_core::provider::{BoxFuture, Context, Diagnostics, ProviderError, ProviderResult};
use carina_core::resource::State;
use log::{debug, info};

use crate::client::{AccessCaCertificate, AccessCaCertificateApi, ApiResult};
use crate::identifier::{IdentifierType, init_identifier};
use crate::schemas::access_ca_certificate::{APPLICATION_ID, AUD, PUBLIC_KEY};

pub const RESOURCE_TYPE: &str = "access_ca_certificate";

type CertificateCall<C> =
    for<'a> fn(&'a C, &'a str, &'a str) -> BoxFuture<'a, ApiResult<AccessCaCertificate>>;
type DeleteCall<C> = for<'a> fn(&'a C, &'a str, &'a str) -> BoxFuture<'a, ApiResult<()>>;

/// Client operations for one scope kind
struct ScopeOps<C> {
    create: CertificateCall<C>,
    get: CertificateCall<C>,
    delete: DeleteCall<C>,
}

impl<C: AccessCaCertificateApi> ScopeOps<C> {
    fn for_type(kind: IdentifierType) -> Self {
        match kind {
            IdentifierType::Account => Self {
                create: C::create_access_ca_certificate,
                get: C::access_ca_certificate,
                delete: C::delete_access_ca_certificate,
            },
            IdentifierType::Zone => Self {
                create: C::create_zone_level_access_ca_certificate,
                get: C::zone_level_access_ca_certificate,
                delete: C::delete_zone_level_access_ca_certificate,
            },
        }
    }
}

pub async fn create<C: AccessCaCertificateApi>(
    ctx: &Context,
    client: &C,
    state: &mut State,
) -> Diagnostics {
    let identifier = match init_identifier(state) {
        Ok(identifier) => identifier,
        Err(e) => return Diagnostics::from_err(&e),
    };
    let application_id = state.get_str(APPLICATION_ID).to_string();
    let ops = ScopeOps::<C>::for_type(identifier.kind);

    let result = match ctx
        .run((ops.create)(client, &identifier.value, &application_id))
        .await
    {
        Ok(result) => result,
        Err(_) => return Diagnostics::cancelled(),
    };

    let cert = match result {
        Ok(cert) => cert,
        Err(e) => {
            return ProviderError::new(format!(
                "error creating Access CA Certificate for {} {:?}: {}",
                identifier.kind, identifier.value, e
            ))
            .with_cause(e)
            .into();
        }
    };

    state.set_identifier(cert.id);

    read(ctx, client, state).await
}

pub async fn read<C: AccessCaCertificateApi>(
    ctx: &Context,
    client: &C,
    state: &mut State,
) -> Diagnostics {
    let application_id = state.get_str(APPLICATION_ID).to_string();
    let identifier = match init_identifier(state) {
        Ok(identifier) => identifier,
        Err(e) => return Diagnostics::from_err(&e),
    };
    let ops = ScopeOps::<C>::for_type(identifier.kind);

    let result = match ctx
        .run((ops.get)(client, &identifier.value, &application_id))
        .await
    {
        Ok(result) => result,
        Err(_) => return Diagnostics::cancelled(),
    };

    match result {
        Ok(cert) => {
            state.set_attribute(AUD, cert.aud);
            state.set_attribute(PUBLIC_KEY, cert.public_key);
            Diagnostics::new()
        }
        Err(e) if e.is_not_found() => {
            info!(
                "Access CA Certificate {} no longer exists",
                state.identifier_str()
            );
            state.clear_identifier();
            Diagnostics::new()
        }
        Err(e) => ProviderError::new(format!(
            "error finding Access CA Certificate {:?}: {}",
            state.identifier_str(),
            e
        ))
        .with_cause(e)
        .into(),
    }
}

pub fn update(_state: &mut State) -> Diagnostics {
    Diagnostics::new()
}

pub async fn delete<C: AccessCaCertificateApi>(
    ctx: &Context,
    client: &C,
    state: &mut State,
) -> Diagnostics {
    let application_id = state.get_str(APPLICATION_ID).to_string();

    debug!(
        "Deleting Cloudflare CA Certificate using ID: {}",
        state.identifier_str()
    );

    let identifier = match init_identifier(state) {
        Ok(identifier) => identifier,
        Err(e) => return Diagnostics::from_err(&e),
    };
    let ops = ScopeOps::<C>::for_type(identifier.kind);

    match ctx
        .run((ops.delete)(client, &identifier.value, &application_id))
        .await
    {
        Ok(Ok(())) => {
            state.clear_identifier();
            Diagnostics::new()
        }
        Ok(Err(e)) => Diagnostics::from_err(&e),
        Err(_) => Diagnostics::cancelled(),
    }
}

/// Split an import ID into scope kind, container ID and certificate ID
pub fn parse_import_id(id: &str) -> ProviderResult<(IdentifierType, &str, &str)> {
    let invalid = || {
        ProviderError::new(format!(
            "invalid id (\"{}\") specified, should be in format \
             \"account/accountID/accessCACertificateID\" or \
             \"zone/zoneID/accessCACertificateID\"",
            id
        ))
    };

    let attributes: Vec<&str> = id.split('/').collect();
    let &[kind, container_id, certificate_id] = attributes.as_slice() else {
        return Err(invalid());
    };
    if container_id.is_empty() || certificate_id.is_empty() {
        return Err(invalid());
    }
    let kind: IdentifierType = kind.parse().map_err(|_| invalid())?;

    Ok((kind, container_id, certificate_id))
}

/// Import by composite ID held in `state.identifier`
///
/// A failing read is reported without its underlying diagnostics.
pub async fn import<C: AccessCaCertificateApi>(
    ctx: &Context,
    client: &C,
    mut state: State,
) -> ProviderResult<Vec<State>> {
    let import_id = state.identifier_str().to_string();
    let (kind, container_id, certificate_id) = parse_import_id(&import_id)?;

    debug!(
        "Importing Cloudflare Access CA Certificate: id {} for {} {}",
        certificate_id, kind, container_id
    );

    state.set_attribute(kind.attribute(), container_id);
    state.set_identifier(certificate_id);

    let diags = read(ctx, client, &mut state).await;
    if !diags.is_empty() {
        return Err(ProviderError::new(
            "failed to read Access CA Certificate state",
        ));
    }

    Ok(vec![state])
}
