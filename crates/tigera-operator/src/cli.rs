//! Command line options influencing what gets rendered.

use crate::crd::installation::Provider;

pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

#[derive(Clone, Debug, PartialEq, Eq, clap::Parser)]
#[command(next_help_heading = "Render Options")]
pub struct RenderOptions {
    /// The Kubernetes platform the cluster runs on.
    ///
    /// Takes precedence over the `kubernetesProvider` of the Installation.
    #[arg(long, env, value_enum)]
    pub kubernetes_provider: Option<Provider>,

    /// Kubernetes cluster domain, usually this is `cluster.local`.
    #[arg(long, env, default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,

    /// Render the (initially empty) secret the ECK operator stores its webhook certificate in.
    #[arg(long, env)]
    pub create_webhook_secret: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            kubernetes_provider: None,
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_owned(),
            create_webhook_secret: false,
        }
    }
}

impl RenderOptions {
    /// Resolves the provider, falling back to the one configured in the Installation.
    pub fn provider(&self, installation_provider: Option<Provider>) -> Option<Provider> {
        self.kubernetes_provider.or(installation_provider)
    }
}
