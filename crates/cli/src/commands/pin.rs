use ferrous_doh_application::services::CertificatePinValidator;
use ferrous_doh_domain::Config;
use ferrous_doh_infrastructure::doh::TlsCertificateProbe;

use crate::di::Services;

pub async fn pin(services: &Services, config: &Config) -> anyhow::Result<()> {
    let resolver = config.resolver_config()?;
    let der = TlsCertificateProbe::fetch(&resolver, services.protector.clone()).await?;
    let fingerprint = services.pins.save(&der, &resolver.hostname)?;

    println!("Pinned {}: {}", resolver.hostname, fingerprint);
    Ok(())
}

pub fn unpin(services: &Services, config: &Config) -> anyhow::Result<()> {
    let resolver = config.resolver_config()?;
    if services.pins.remove(&resolver.hostname)? {
        println!("Removed pin for {}", resolver.hostname);
    } else {
        println!("No pin stored for {}", resolver.hostname);
    }
    Ok(())
}

pub async fn fingerprint(services: &Services, config: &Config) -> anyhow::Result<()> {
    let resolver = config.resolver_config()?;
    let der = TlsCertificateProbe::fetch(&resolver, services.protector.clone()).await?;
    let presented = CertificatePinValidator::compute_fingerprint(&der);

    println!("Host:      {}", resolver.hostname);
    println!("Presented: {}", presented);
    match services.pins.stored_pin(&resolver.hostname)? {
        Some(stored) => {
            println!("Pinned:    {}", stored);
            println!(
                "Status:    {}",
                if presented.matches(&stored) { "match" } else { "MISMATCH" }
            );
        }
        None => println!("Pinned:    (none, trust on first use)"),
    }
    Ok(())
}
