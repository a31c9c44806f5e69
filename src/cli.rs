use clap::{ArgAction, Parser};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    #[error("empty tag spec; expected e.g. 'stack_name=test,test01;role=hadoop'")]
    EmptyTagSpec,

    #[error("invalid tag filter '{0}'; expected 'key=value' or 'key=value1,value2'")]
    InvalidTagFilter(String),
}

/// Search EC2 instances and volumes by tag across regions.
#[derive(Parser, Debug)]
#[command(name = "awstags")]
#[command(about = "Find EC2 instances and volumes matching tag filters, as JSON")]
#[command(version)]
pub struct Cli {
    /// Region(s) to search: 'us-west-1,us-west-2', or 'all' for every
    /// region visible to the account. Defaults to the profile's region.
    #[arg(short, long, value_name = "REGIONS")]
    pub region: Option<String>,

    /// AWS profile to use
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Do not load from the cache; refresh entries from the API
    #[arg(short, long)]
    pub ignore_cache: bool,

    /// Store cache entries zlib-compressed
    #[arg(long)]
    pub compress: bool,

    /// Increase log verbosity (up to -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Tags to search, e.g. 'stack_name=test,test01;role=hadoop,hbase'
    pub tags: String,
}

/// One `tag:<key>` filter: matches resources whose tag `key` has any of
/// the listed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub values: Vec<String>,
}

/// Which regions to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    /// The region the profile/default chain resolves to
    Default,
    /// Every region returned by describe_regions
    All,
    /// An explicit list
    Named(Vec<String>),
}

/// Parses a tag spec of the form `key=v1,v2;key2=v3` into filters.
///
/// Semicolons separate tag keys (all must match), commas separate
/// alternative values for one key (any may match).
pub fn parse_tag_spec(spec: &str) -> Result<Vec<TagFilter>, CliError> {
    let mut filters = Vec::new();

    for part in spec.split(';').filter(|p| !p.trim().is_empty()) {
        let (key, values) = part
            .split_once('=')
            .ok_or_else(|| CliError::InvalidTagFilter(part.to_string()))?;

        let key = key.trim();
        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        if key.is_empty() || values.is_empty() {
            return Err(CliError::InvalidTagFilter(part.to_string()));
        }

        filters.push(TagFilter {
            key: key.to_string(),
            values,
        });
    }

    if filters.is_empty() {
        return Err(CliError::EmptyTagSpec);
    }
    Ok(filters)
}

/// Parses the `--region` argument into a selection.
pub fn parse_region_arg(arg: Option<&str>) -> RegionSelection {
    match arg {
        None => RegionSelection::Default,
        Some(s) if s.trim().eq_ignore_ascii_case("all") => RegionSelection::All,
        Some(s) => RegionSelection::Named(
            s.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    }
}
