//! Per-region tag search with disk-cache memoization.

use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::Client as Ec2Client;
use aws_types::SdkConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aws_config::{available_profiles, configure_aws};
use crate::cache::{CacheError, DiskCache};
use crate::cli::{parse_region_arg, parse_tag_spec, Cli, CliError, RegionSelection, TagFilter};
use crate::ec2::{self, InstanceSummary, VolumeSummary};

/// How long cached query results stay fresh.
pub const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("unknown profile '{name}'; available profiles: {available}")]
    UnknownProfile { name: String, available: String },

    #[error("no region configured; pass --region or set one in the profile")]
    NoRegion,

    #[error("EC2 API request failed: {0}")]
    Api(#[from] aws_sdk_ec2::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Everything a search run needs, extracted from the CLI.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub profile: Option<String>,
    pub regions: RegionSelection,
    pub filters: Vec<TagFilter>,
    pub ignore_cache: bool,
    pub compress: bool,
}

impl SearchOptions {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Ok(Self {
            profile: cli.profile.clone(),
            regions: parse_region_arg(cli.region.as_deref()),
            filters: parse_tag_spec(&cli.tags)?,
            ignore_cache: cli.ignore_cache,
            compress: cli.compress,
        })
    }
}

/// The matches for one region; also the unit of caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    pub region: String,
    pub instances: Vec<InstanceSummary>,
    pub volumes: Vec<VolumeSummary>,
}

/// Cache key for one (profile, region, filter set) query.
pub fn cache_key(profile: Option<&str>, region: &str, filters: &[TagFilter]) -> String {
    let filter_part: Vec<String> = filters
        .iter()
        .map(|f| format!("tag:{}={}", f.key, f.values.join(",")))
        .collect();

    format!(
        "{}_{}_{}",
        profile.unwrap_or("default"),
        region,
        filter_part.join(";")
    )
}

fn validate_profile(profile: &str) -> Result<(), SearchError> {
    let known = available_profiles();
    // no profile files at all: credentials may come from the environment,
    // leave resolution to the SDK
    if known.is_empty() || known.iter().any(|p| p == profile) {
        return Ok(());
    }
    Err(SearchError::UnknownProfile {
        name: profile.to_string(),
        available: known.join(", "),
    })
}

async fn query_region(
    config: &SdkConfig,
    region: &str,
    filters: &[TagFilter],
) -> Result<RegionReport, aws_sdk_ec2::Error> {
    let conf = aws_sdk_ec2::config::Builder::from(config)
        .region(Region::new(region.to_string()))
        .build();
    let client = Ec2Client::from_conf(conf);

    let instances = ec2::matching_instances(&client, filters).await?;
    let volumes = ec2::matching_volumes(&client, filters).await?;
    debug!(
        "{}: {} instances, {} volumes matched",
        region,
        instances.len(),
        volumes.len()
    );

    Ok(RegionReport {
        region: region.to_string(),
        instances,
        volumes,
    })
}

/// Runs the search across the selected regions, one report per region.
///
/// Fresh cache entries short-circuit the API; expired entries are only
/// served when the refresh itself fails, and never under `--ignore-cache`.
pub async fn run_search(opts: &SearchOptions) -> Result<Vec<RegionReport>, SearchError> {
    if let Some(profile) = opts.profile.as_deref() {
        validate_profile(profile)?;
    }

    let config = configure_aws(opts.profile.as_deref(), None).await;

    let regions = match &opts.regions {
        RegionSelection::All => {
            let client = Ec2Client::new(&config);
            ec2::list_regions(&client).await?
        }
        RegionSelection::Named(named) => named.clone(),
        RegionSelection::Default => {
            let region = config
                .region()
                .map(|r| r.as_ref().to_string())
                .ok_or(SearchError::NoRegion)?;
            vec![region]
        }
    };
    debug!("searching regions: {:?}", regions);

    let cache = DiskCache::open()?.with_compression(opts.compress);
    let profile = opts.profile.as_deref();

    let mut reports = Vec::with_capacity(regions.len());
    for region in regions {
        let key = cache_key(profile, &region, &opts.filters);

        let cached = if opts.ignore_cache {
            None
        } else {
            cache.read::<RegionReport>(&key)
        };

        let stale = match cached {
            Some(hit) if !hit.is_expired => {
                debug!("{}: cache hit, cached at {}", region, hit.cached_at);
                reports.push(hit.data);
                continue;
            }
            other => other,
        };

        info!("{}: querying EC2", region);
        match query_region(&config, &region, &opts.filters).await {
            Ok(report) => {
                if let Err(err) = cache.write(&key, &report, DEFAULT_TTL_SECS) {
                    warn!("{}: could not write cache entry: {}", region, err);
                }
                reports.push(report);
            }
            Err(err) => match stale {
                Some(hit) => {
                    warn!(
                        "{}: query failed ({}); serving expired entry cached at {}",
                        region, err, hit.cached_at
                    );
                    reports.push(hit.data);
                }
                None => return Err(err.into()),
            },
        }
    }

    Ok(reports)
}
