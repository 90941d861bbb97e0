use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{properties_element, required_id, BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, TrustedCert};
use crate::core::error::BundleResult;
use crate::document::{Entity, PropertyValue};
use crate::xml::Element;

/// Trusted certificates with their encoded data and trust flags
#[derive(Debug, Default)]
pub struct TrustedCertEntityBuilder;

impl EntityBuilder for TrustedCertEntityBuilder {
    fn name(&self) -> &str {
        "trusted-cert"
    }

    fn order(&self) -> i32 {
        300
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .trusted_certs
            .iter()
            .map(|(name, cert)| build_cert(context, name, cert))
            .collect()
    }
}

fn build_cert(context: &BuildContext<'_>, name: &str, cert: &TrustedCert) -> BundleResult<Entity> {
    let id = required_id(&cert.id, EntityKind::TrustedCert, name)?;
    let file = context.bundle.certificate_files.get(name).map(|path| path.as_path());
    let data = context.certificates.resolve(cert, file)?;

    let flags = [
        ("revocationCheckingEnabled", cert.revocation_checking_enabled),
        ("trustAnchor", cert.trust_anchor),
        ("trustedAsSamlAttestingEntity", cert.trusted_as_saml_attesting_entity),
        ("trustedAsSamlIssuer", cert.trusted_as_saml_issuer),
        ("trustedForSigningClientCerts", cert.trusted_for_signing_client_certs),
        ("trustedForSigningServerCerts", cert.trusted_for_signing_server_certs),
        ("trustedForSsl", cert.trusted_for_ssl),
        ("verifyHostname", cert.verify_hostname),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), PropertyValue::Boolean(value)));

    let payload = Element::new("l7:TrustedCertificate")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(
            Element::new("l7:CertificateData")
                .with_child(Element::text_element("l7:IssuerName", data.issuer_name.as_str()))
                .with_child(Element::text_element("l7:SerialNumber", data.serial_number.as_str()))
                .with_child(Element::text_element("l7:SubjectName", data.subject_name.as_str()))
                .with_child(Element::text_element("l7:Encoded", STANDARD.encode(&data.encoded))),
        )
        .with_optional_child(properties_element(flags));
    Ok(Entity::new(EntityKind::TrustedCert, name, id, payload))
}
