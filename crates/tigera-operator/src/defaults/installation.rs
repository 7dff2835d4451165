use ipnet::{IpNet, Ipv4Net};
use snafu::{ResultExt, Snafu, ensure};

use crate::crd::{
    installation::{
        CalicoNetworkSpec, ClusterManagementType, EncapsulationType, Installation,
        InstallationSpec, IpPool, NatOutgoing, ProductVariant, Provider,
    },
    network::Network,
};

/// Used for the IPv4 pool when the cluster network does not dictate one.
pub const DEFAULT_IPV4_POOL_CIDR: &str = "192.168.0.0/16";

pub const DEFAULT_NODE_SELECTOR: &str = "all()";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "calicoNetwork must not be set on provider {provider}, it manages pod networking itself"
    ))]
    CalicoNetworkNotSupported { provider: Provider },

    #[snafu(display("failed to parse CIDR {cidr:?} of IP pool"))]
    InvalidPoolCidr {
        source: ipnet::AddrParseError,
        cidr: String,
    },

    #[snafu(display("at most one IPv4 pool is supported, but {count} were given"))]
    TooManyIpv4Pools { count: usize },

    #[snafu(display("at most one IPv6 pool is supported, but {count} were given"))]
    TooManyIpv6Pools { count: usize },

    #[snafu(display(
        "IPv4 pool {cidr:?} is not within any of the cluster network CIDRs {cluster_cidrs:?}"
    ))]
    PoolOutsideClusterNetwork {
        cidr: String,
        cluster_cidrs: Vec<String>,
    },
}

/// Fills the defaults of an Installation without any external network configuration.
///
/// See [`merge_and_fill_defaults`].
pub fn fill_defaults(installation: &mut Installation) -> Result<()> {
    merge_and_fill_defaults(installation, None)
}

/// Merges the OpenShift cluster network configuration into the Installation and fills every
/// remaining default.
///
/// On error the Installation is left untouched.
pub fn merge_and_fill_defaults(
    installation: &mut Installation,
    network: Option<&Network>,
) -> Result<()> {
    let cluster_cidrs = network.map(ipv4_cluster_cidrs).unwrap_or_default();

    let mut spec = installation.spec.clone();
    fill_spec_defaults(&mut spec, &cluster_cidrs)?;
    installation.spec = spec;

    Ok(())
}

fn fill_spec_defaults(spec: &mut InstallationSpec, cluster_cidrs: &[Ipv4Net]) -> Result<()> {
    spec.variant.get_or_insert(ProductVariant::Calico);
    spec.cluster_management_type
        .get_or_insert(ClusterManagementType::Standalone);

    ensure_trailing_slash(&mut spec.registry);
    ensure_trailing_slash(&mut spec.calico_namespace);

    match spec.kubernetes_provider {
        Some(provider) if provider.is_restricted_network() => {
            ensure!(
                spec.calico_network.is_none(),
                CalicoNetworkNotSupportedSnafu { provider }
            );
            tracing::debug!(%provider, "not defaulting calicoNetwork on restricted provider");
            Ok(())
        }
        _ => fill_network_defaults(
            spec.calico_network.get_or_insert_with(CalicoNetworkSpec::default),
            cluster_cidrs,
        ),
    }
}

fn fill_network_defaults(network: &mut CalicoNetworkSpec, cluster_cidrs: &[Ipv4Net]) -> Result<()> {
    validate_pools(&network.ip_pools, cluster_cidrs)?;

    if network.ip_pools.is_empty() {
        let cidr = match cluster_cidrs {
            [cluster_cidr] => cluster_cidr.trunc().to_string(),
            _ => DEFAULT_IPV4_POOL_CIDR.to_owned(),
        };
        tracing::debug!(%cidr, "no IP pools configured, adding default IPv4 pool");

        network.ip_pools.push(IpPool {
            cidr,
            ..IpPool::default()
        });
    }

    for pool in &mut network.ip_pools {
        pool.encapsulation
            .get_or_insert(EncapsulationType::IpipCrossSubnet);
        pool.nat_outgoing.get_or_insert(NatOutgoing::Enabled);
        pool.node_selector
            .get_or_insert_with(|| DEFAULT_NODE_SELECTOR.to_owned());
    }

    Ok(())
}

fn validate_pools(pools: &[IpPool], cluster_cidrs: &[Ipv4Net]) -> Result<()> {
    let mut ipv4_count: usize = 0;
    let mut ipv6_count: usize = 0;

    for pool in pools {
        let network: IpNet = pool.cidr.parse().context(InvalidPoolCidrSnafu {
            cidr: pool.cidr.clone(),
        })?;

        match network {
            IpNet::V4(network) => {
                ipv4_count += 1;
                ensure!(
                    cluster_cidrs.is_empty()
                        || cluster_cidrs.iter().any(|cidr| cidr.contains(&network)),
                    PoolOutsideClusterNetworkSnafu {
                        cidr: pool.cidr.clone(),
                        cluster_cidrs: cluster_cidrs
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>(),
                    }
                );
            }
            IpNet::V6(_) => ipv6_count += 1,
        }
    }

    ensure!(ipv4_count <= 1, TooManyIpv4PoolsSnafu { count: ipv4_count });
    ensure!(ipv6_count <= 1, TooManyIpv6PoolsSnafu { count: ipv6_count });

    Ok(())
}

/// The IPv4 pod CIDRs of the cluster network. Entries that fail to parse are ignored.
fn ipv4_cluster_cidrs(network: &Network) -> Vec<Ipv4Net> {
    network
        .spec
        .cluster_network
        .iter()
        .filter_map(|entry| match entry.cidr.parse::<IpNet>() {
            Ok(IpNet::V4(cidr)) => Some(cidr),
            Ok(IpNet::V6(_)) => None,
            Err(_) => {
                tracing::warn!(cidr = %entry.cidr, "ignoring unparsable cluster network CIDR");
                None
            }
        })
        .collect()
}

fn ensure_trailing_slash(value: &mut String) {
    if !value.is_empty() && !value.ends_with('/') {
        value.push('/');
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use k8s_openapi::api::core::v1::LocalObjectReference;
    use rstest::rstest;

    use super::*;
    use crate::crd::{
        installation::NodeAddressAutodetection,
        network::{ClusterNetworkEntry, NetworkSpec},
    };

    fn installation(spec: InstallationSpec) -> Installation {
        Installation::new("default", spec)
    }

    fn openshift_network(cidrs: &[&str]) -> Network {
        Network::new(
            "cluster",
            NetworkSpec {
                cluster_network: cidrs
                    .iter()
                    .map(|cidr| ClusterNetworkEntry {
                        cidr: (*cidr).to_owned(),
                        host_prefix: 23,
                    })
                    .collect(),
                ..NetworkSpec::default()
            },
        )
    }

    fn pool(cidr: &str) -> IpPool {
        IpPool {
            cidr: cidr.to_owned(),
            ..IpPool::default()
        }
    }

    fn assert_fully_defaulted_pools(installation: &Installation) {
        let network = installation.spec.calico_network.as_ref().unwrap();
        let v4_pool = network.ipv4_pool().unwrap();
        assert!(!v4_pool.cidr.is_empty());
        assert!(v4_pool.encapsulation.is_some());
        assert!(v4_pool.nat_outgoing.is_some());
        assert!(!v4_pool.node_selector.as_deref().unwrap().is_empty());
        assert!(network.ipv6_pool().is_none());
    }

    #[rstest]
    #[case(None, ProductVariant::Calico)]
    #[case(Some(ProductVariant::TigeraSecureEnterprise), ProductVariant::TigeraSecureEnterprise)]
    fn empty_instance(#[case] variant: Option<ProductVariant>, #[case] expected: ProductVariant) {
        let mut installation = installation(InstallationSpec {
            variant,
            ..InstallationSpec::default()
        });
        fill_defaults(&mut installation).unwrap();

        let spec = &installation.spec;
        assert_eq!(spec.variant, Some(expected));
        assert_eq!(
            spec.cluster_management_type,
            Some(ClusterManagementType::Standalone)
        );
        assert!(spec.registry.is_empty());
        assert!(spec.calico_namespace.is_empty());

        let network = spec.calico_network.as_ref().unwrap();
        assert_eq!(network.ip_pools.len(), 1);
        assert_eq!(
            network.ipv4_pool(),
            Some(&IpPool {
                cidr: "192.168.0.0/16".to_owned(),
                encapsulation: Some(EncapsulationType::IpipCrossSubnet),
                nat_outgoing: Some(NatOutgoing::Enabled),
                node_selector: Some("all()".to_owned()),
            })
        );
        assert!(network.ipv6_pool().is_none());
    }

    #[test]
    fn calico_network_on_eks_is_rejected() {
        let spec = InstallationSpec {
            variant: Some(ProductVariant::TigeraSecureEnterprise),
            kubernetes_provider: Some(Provider::Eks),
            calico_network: Some(CalicoNetworkSpec::default()),
            ..InstallationSpec::default()
        };
        let mut installation = installation(spec.clone());

        let err = fill_defaults(&mut installation).unwrap_err();
        assert_eq!(
            err,
            Error::CalicoNetworkNotSupported {
                provider: Provider::Eks
            }
        );
        assert_eq!(installation.spec, spec);
    }

    #[test]
    fn eks_without_calico_network_stays_without() {
        let mut installation = installation(InstallationSpec {
            kubernetes_provider: Some(Provider::Eks),
            ..InstallationSpec::default()
        });
        fill_defaults(&mut installation).unwrap();

        assert_eq!(installation.spec.variant, Some(ProductVariant::Calico));
        assert!(installation.spec.calico_network.is_none());
    }

    #[test]
    fn custom_configuration_is_not_overridden() {
        let spec = InstallationSpec {
            variant: Some(ProductVariant::TigeraSecureEnterprise),
            registry: "test-reg/".to_owned(),
            image_pull_secrets: vec![
                LocalObjectReference {
                    name: "pullSecret1".to_owned(),
                },
                LocalObjectReference {
                    name: "pullSecret2".to_owned(),
                },
            ],
            calico_network: Some(CalicoNetworkSpec {
                ip_pools: vec![IpPool {
                    cidr: "1.2.3.0/24".to_owned(),
                    encapsulation: Some(EncapsulationType::IpipCrossSubnet),
                    nat_outgoing: Some(NatOutgoing::Enabled),
                    node_selector: Some("has(thiskey)".to_owned()),
                }],
                mtu: Some(1500),
                node_address_autodetection_v4: Some(NodeAddressAutodetection {
                    first_found: Some(true),
                    ..NodeAddressAutodetection::default()
                }),
                node_address_autodetection_v6: None,
            }),
            node_metrics_port: Some(9081),
            cluster_management_type: Some(ClusterManagementType::Management),
            ..InstallationSpec::default()
        };
        let mut installation = installation(spec.clone());

        fill_defaults(&mut installation).unwrap();
        assert_eq!(installation.spec, spec);
    }

    #[test]
    fn partially_set_pools_keep_their_values() {
        let mut installation = installation(InstallationSpec {
            calico_network: Some(CalicoNetworkSpec {
                ip_pools: vec![
                    IpPool {
                        encapsulation: Some(EncapsulationType::Vxlan),
                        ..pool("10.0.0.0/16")
                    },
                    IpPool {
                        nat_outgoing: Some(NatOutgoing::Disabled),
                        ..pool("fd00:10::/64")
                    },
                ],
                ..CalicoNetworkSpec::default()
            }),
            ..InstallationSpec::default()
        });
        fill_defaults(&mut installation).unwrap();

        let network = installation.spec.calico_network.unwrap();
        assert_eq!(
            network.ip_pools,
            vec![
                IpPool {
                    cidr: "10.0.0.0/16".to_owned(),
                    encapsulation: Some(EncapsulationType::Vxlan),
                    nat_outgoing: Some(NatOutgoing::Enabled),
                    node_selector: Some("all()".to_owned()),
                },
                IpPool {
                    cidr: "fd00:10::/64".to_owned(),
                    encapsulation: Some(EncapsulationType::IpipCrossSubnet),
                    nat_outgoing: Some(NatOutgoing::Disabled),
                    node_selector: Some("all()".to_owned()),
                },
            ]
        );
    }

    #[rstest]
    #[case("test-reg", "test-reg/")]
    #[case("test-reg/", "test-reg/")]
    #[case("quay.io/tigera", "quay.io/tigera/")]
    #[case("", "")]
    fn registry_gets_trailing_slash(#[case] registry: &str, #[case] expected: &str) {
        let mut installation = installation(InstallationSpec {
            registry: registry.to_owned(),
            ..InstallationSpec::default()
        });
        fill_defaults(&mut installation).unwrap();

        assert_eq!(installation.spec.registry, expected);
    }

    #[test]
    fn calico_namespace_gets_trailing_slash() {
        let mut installation = installation(InstallationSpec {
            calico_namespace: "custom-ns".to_owned(),
            ..InstallationSpec::default()
        });
        fill_defaults(&mut installation).unwrap();

        assert_eq!(installation.spec.calico_namespace, "custom-ns/");
    }

    #[rstest]
    #[case::empty_config(InstallationSpec::default(), Network::default())]
    #[case::openshift_only_cidr(
        InstallationSpec {
            calico_network: Some(CalicoNetworkSpec::default()),
            ..InstallationSpec::default()
        },
        openshift_network(&["10.0.0.0/8"])
    )]
    #[case::openshift_and_calico_cidr(
        InstallationSpec {
            calico_network: Some(CalicoNetworkSpec {
                ip_pools: vec![pool("10.0.0.0/24")],
                ..CalicoNetworkSpec::default()
            }),
            ..InstallationSpec::default()
        },
        openshift_network(&["10.0.0.0/8"])
    )]
    fn merged_pools_have_all_fields_set(#[case] spec: InstallationSpec, #[case] network: Network) {
        let mut installation = installation(spec);
        merge_and_fill_defaults(&mut installation, Some(&network)).unwrap();

        assert_fully_defaulted_pools(&installation);
    }

    #[rstest]
    #[case(&["10.128.0.0/14"], "10.128.0.0/14")]
    #[case(&["10.128.1.0/14"], "10.128.0.0/14")]
    #[case(&["10.128.0.0/14", "fd01::/48"], "10.128.0.0/14")]
    #[case(&["10.128.0.0/14", "10.0.0.0/16"], "192.168.0.0/16")]
    #[case(&[], "192.168.0.0/16")]
    #[case(&["fd01::/48"], "192.168.0.0/16")]
    fn pool_cidr_from_cluster_network(#[case] cluster_cidrs: &[&str], #[case] expected: &str) {
        let mut installation = installation(InstallationSpec::default());
        merge_and_fill_defaults(&mut installation, Some(&openshift_network(cluster_cidrs)))
            .unwrap();

        let network = installation.spec.calico_network.unwrap();
        assert_eq!(network.ip_pools.len(), 1);
        assert_eq!(network.ip_pools[0].cidr, expected);
    }

    #[test]
    fn pool_outside_cluster_network_is_a_conflict() {
        let spec = InstallationSpec {
            calico_network: Some(CalicoNetworkSpec {
                ip_pools: vec![pool("192.168.0.0/16")],
                ..CalicoNetworkSpec::default()
            }),
            ..InstallationSpec::default()
        };
        let mut installation = installation(spec.clone());

        let err = merge_and_fill_defaults(
            &mut installation,
            Some(&openshift_network(&["10.0.0.0/8"])),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PoolOutsideClusterNetwork { .. }));
        assert_eq!(installation.spec, spec);
    }

    #[rstest]
    #[case(&["10.0.0.0/16", "10.1.0.0/16"], Error::TooManyIpv4Pools { count: 2 })]
    #[case(&["fd00::/64", "10.0.0.0/16", "fd01::/64"], Error::TooManyIpv6Pools { count: 2 })]
    fn more_than_one_pool_per_family_is_rejected(
        #[case] cidrs: &[&str],
        #[case] expected: Error,
    ) {
        let mut installation = installation(InstallationSpec {
            calico_network: Some(CalicoNetworkSpec {
                ip_pools: cidrs.iter().map(|cidr| pool(cidr)).collect(),
                ..CalicoNetworkSpec::default()
            }),
            ..InstallationSpec::default()
        });

        assert_eq!(fill_defaults(&mut installation).unwrap_err(), expected);
    }

    #[test]
    fn errors_have_total_equality() {
        fn assert_eq_impl<T: Eq>() {}
        assert_eq_impl::<Error>();
    }

    #[test]
    fn unparsable_pool_cidr_is_rejected() {
        let mut installation = installation(InstallationSpec {
            calico_network: Some(CalicoNetworkSpec {
                ip_pools: vec![pool("10.0.0.0/33")],
                ..CalicoNetworkSpec::default()
            }),
            ..InstallationSpec::default()
        });

        assert!(matches!(
            fill_defaults(&mut installation),
            Err(Error::InvalidPoolCidr { cidr, .. }) if cidr == "10.0.0.0/33"
        ));
    }

    #[test]
    fn defaulting_is_idempotent() {
        let input = indoc! {"
            apiVersion: operator.tigera.io/v1
            kind: Installation
            metadata:
              name: default
            spec:
              registry: quay.io
              kubernetesProvider: OpenShift
              calicoNetwork:
                ipPools:
                  - cidr: 10.128.0.0/16
                    encapsulation: VXLAN
        "};
        let network = openshift_network(&["10.128.0.0/14"]);

        let mut once: Installation = serde_yaml::from_str(input).unwrap();
        merge_and_fill_defaults(&mut once, Some(&network)).unwrap();

        let mut twice = once.clone();
        merge_and_fill_defaults(&mut twice, Some(&network)).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.spec.registry, "quay.io/");
    }
}
