use std::path::PathBuf;

use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use configparser::ini::Ini;

pub async fn configure_aws(profile: Option<&str>, region: Option<String>) -> aws_types::SdkConfig {
    let region_provider =
        RegionProviderChain::first_try(region.map(Region::new)).or_default_provider();

    let mut loader = aws_config::defaults(BehaviorVersion::v2024_03_28()).region(region_provider);
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

fn profile_files() -> Vec<PathBuf> {
    dirs_next::home_dir()
        .map(|home| vec![home.join(".aws/credentials"), home.join(".aws/config")])
        .unwrap_or_default()
}

/// Profile names found in ~/.aws/credentials and ~/.aws/config.
///
/// Config file sections are named `profile <name>` except for `default`;
/// the prefix is stripped so both files yield plain names. Missing or
/// unreadable files contribute nothing.
pub fn available_profiles() -> Vec<String> {
    let mut profiles = Vec::new();

    for path in profile_files() {
        // new_cs: profile names are case-sensitive
        let mut ini = Ini::new_cs();
        if ini.load(&path).is_err() {
            continue;
        }
        for section in ini.sections() {
            let name = section.strip_prefix("profile ").unwrap_or(&section);
            if !name.is_empty() && !profiles.iter().any(|p| p == name) {
                profiles.push(name.to_string());
            }
        }
    }

    profiles.sort();
    profiles
}
