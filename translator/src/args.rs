use crate::{Inputs, LogFormat};
use anyhow::{bail, Context, Result};
use clap::Parser;
use meshplane_k8s_api::ObjectRef;
use meshplane_translator_core::{ClusterDomains, Reports};
use meshplane_translator_istio::{decorators::Registry, Outputs, Translator};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, info_span, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "meshplane-translator",
    about = "Translates multi-cluster mesh policies into Istio configuration"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "meshplane=info,warn",
        env = "MESHPLANE_TRANSLATOR_LOG"
    )]
    log_level: String,

    #[clap(long, default_value = "plain")]
    log_format: LogFormat,

    /// A YAML stream of destinations, meshes, virtual meshes and settings.
    #[clap(long, env = "MESHPLANE_TRANSLATOR_SNAPSHOT")]
    snapshot: PathBuf,

    /// A YAML stream of user-owned VirtualServices and DestinationRules that translated objects
    /// must not conflict with.
    #[clap(long)]
    user_resources: Option<PathBuf>,

    /// Overrides the DNS domain of one cluster, as `<cluster>=<domain>`.
    #[clap(long = "cluster-domain")]
    cluster_domains: Vec<ClusterDomain>,

    #[clap(long, default_value = ClusterDomains::DEFAULT_DOMAIN)]
    default_cluster_domain: String,

    /// The suffix of federated hostnames.
    #[clap(long, default_value = ClusterDomains::DEFAULT_GLOBAL_SUFFIX)]
    global_suffix: String,

    /// Where to write translated objects. Defaults to stdout.
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ClusterDomain {
    cluster: String,
    domain: String,
}

impl Args {
    #[inline]
    pub fn parse_and_run() -> Result<()> {
        Self::parse().run()
    }

    pub fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            snapshot,
            user_resources,
            cluster_domains,
            default_cluster_domain,
            global_suffix,
            output,
        } = self;

        log_format.try_init(&log_level)?;

        let mut inputs = read_inputs(&snapshot)?;
        if let Some(path) = user_resources {
            inputs.extend(read_inputs(&path)?);
        }
        let (snapshot, user_resources) = inputs.into_snapshot();

        let cluster_domains = cluster_domains
            .into_iter()
            .fold(
                ClusterDomains::new(default_cluster_domain, global_suffix),
                |domains, ClusterDomain { cluster, domain }| {
                    domains.with_cluster_domain(cluster, domain)
                },
            )
            .with_federated_hostnames(&snapshot);

        let mut translator = Translator::new(Arc::new(cluster_domains), Registry::istio());
        if !user_resources.is_empty() {
            translator = translator.with_user_resources(Arc::new(user_resources));
        }

        let mut outputs = Outputs::default();
        let mut reports = Reports::default();
        for destination in snapshot.destinations() {
            let dst = ObjectRef::from_resource(destination);
            let _span = info_span!("destination", ns = %dst.namespace, name = %dst.name).entered();
            translator.translate(&snapshot, destination, None, &mut outputs, &mut reports);
        }

        for report in &reports {
            warn!(
                kind = %report.kind,
                target = %report.target,
                source = %report.source,
                error = %report.message,
                "Failed to translate"
            );
        }
        info!(
            destinations = snapshot.destinations().len(),
            outputs = outputs.len(),
            errors = reports.len(),
            "Translated snapshot"
        );

        let yaml = outputs.to_yaml()?;
        match output {
            Some(path) => fs::write(&path, yaml)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => io::stdout().lock().write_all(yaml.as_bytes())?,
        }
        Ok(())
    }
}

fn read_inputs(path: &Path) -> Result<Inputs> {
    let yaml =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Inputs::from_yaml(&yaml).with_context(|| format!("failed to parse {}", path.display()))
}

impl std::str::FromStr for ClusterDomain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((cluster, domain)) = s.split_once('=') else {
            bail!("expected <cluster>=<domain>: {s}");
        };
        if cluster.is_empty() || domain.is_empty() {
            bail!("expected <cluster>=<domain>: {s}");
        }
        Ok(Self {
            cluster: cluster.to_string(),
            domain: domain.to_string(),
        })
    }
}
