use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use aws_sdk_ec2::types::{Filter, Instance, Tag, Volume, VolumeAttachment};
use aws_sdk_ec2::Client as Ec2Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cli::TagFilter;

/// A resource tag as it appears in the JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

/// The instance fields worth printing and caching. SDK output types do not
/// serialize, so matches are copied into this owned form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub image_id: Option<String>,
    pub instance_type: Option<String>,
    pub state: Option<String>,
    pub availability_zone: Option<String>,
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
    pub tags: Vec<ResourceTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub volume_id: String,
    pub volume_type: Option<String>,
    pub state: Option<String>,
    pub size_gib: Option<i32>,
    pub availability_zone: Option<String>,
    pub encrypted: Option<bool>,
    pub create_time: Option<DateTime<Utc>>,
    pub attachments: Vec<AttachmentSummary>,
    pub tags: Vec<ResourceTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub instance_id: Option<String>,
    pub device: Option<String>,
    pub state: Option<String>,
}

fn to_utc(dt: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn convert_tags(tags: &[Tag]) -> Vec<ResourceTag> {
    tags.iter()
        .map(|t| ResourceTag {
            key: t.key().unwrap_or_default().to_string(),
            value: t.value().unwrap_or_default().to_string(),
        })
        .collect()
}

impl From<&Instance> for InstanceSummary {
    fn from(inst: &Instance) -> Self {
        Self {
            instance_id: inst.instance_id().unwrap_or_default().to_string(),
            image_id: inst.image_id().map(str::to_string),
            instance_type: inst.instance_type().map(|t| t.as_str().to_string()),
            state: inst
                .state()
                .and_then(|s| s.name())
                .map(|n| n.as_str().to_string()),
            availability_zone: inst
                .placement()
                .and_then(|p| p.availability_zone())
                .map(str::to_string),
            private_ip_address: inst.private_ip_address().map(str::to_string),
            public_ip_address: inst.public_ip_address().map(str::to_string),
            launch_time: inst.launch_time().and_then(to_utc),
            tags: convert_tags(inst.tags()),
        }
    }
}

impl From<&Volume> for VolumeSummary {
    fn from(vol: &Volume) -> Self {
        Self {
            volume_id: vol.volume_id().unwrap_or_default().to_string(),
            volume_type: vol.volume_type().map(|t| t.as_str().to_string()),
            state: vol.state().map(|s| s.as_str().to_string()),
            size_gib: vol.size(),
            availability_zone: vol.availability_zone().map(str::to_string),
            encrypted: vol.encrypted(),
            create_time: vol.create_time().and_then(to_utc),
            attachments: vol.attachments().iter().map(AttachmentSummary::from).collect(),
            tags: convert_tags(vol.tags()),
        }
    }
}

impl From<&VolumeAttachment> for AttachmentSummary {
    fn from(att: &VolumeAttachment) -> Self {
        Self {
            instance_id: att.instance_id().map(str::to_string),
            device: att.device().map(str::to_string),
            state: att.state().map(|s| s.as_str().to_string()),
        }
    }
}

/// Builds `tag:<key>` API filters from the parsed tag spec.
pub fn tag_filters(filters: &[TagFilter]) -> Vec<Filter> {
    filters
        .iter()
        .map(|f| {
            Filter::builder()
                .name(format!("tag:{}", f.key))
                .set_values(Some(f.values.clone()))
                .build()
        })
        .collect()
}

pub async fn list_regions(client: &Ec2Client) -> Result<Vec<String>, aws_sdk_ec2::Error> {
    let resp = client
        .describe_regions()
        .send()
        .await
        .map_err(aws_sdk_ec2::Error::from)?;

    let mut regions: Vec<String> = resp
        .regions()
        .iter()
        .filter_map(|r| r.region_name().map(str::to_string))
        .collect();
    regions.sort();

    Ok(regions)
}

pub async fn matching_instances(
    client: &Ec2Client,
    filters: &[TagFilter],
) -> Result<Vec<InstanceSummary>, aws_sdk_ec2::Error> {
    let mut instances = Vec::new();

    let mut pages = client
        .describe_instances()
        .set_filters(Some(tag_filters(filters)))
        .into_paginator()
        .send();

    while let Some(page) = pages.next().await {
        let page = page.map_err(aws_sdk_ec2::Error::from)?;
        for reservation in page.reservations() {
            instances.extend(reservation.instances().iter().map(InstanceSummary::from));
        }
    }

    Ok(instances)
}

pub async fn matching_volumes(
    client: &Ec2Client,
    filters: &[TagFilter],
) -> Result<Vec<VolumeSummary>, aws_sdk_ec2::Error> {
    let mut volumes = Vec::new();

    let mut pages = client
        .describe_volumes()
        .set_filters(Some(tag_filters(filters)))
        .into_paginator()
        .send();

    while let Some(page) = pages.next().await {
        let page = page.map_err(aws_sdk_ec2::Error::from)?;
        volumes.extend(page.volumes().iter().map(VolumeSummary::from));
    }

    Ok(volumes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{
        InstanceState, InstanceStateName, InstanceType, Placement, VolumeAttachmentState,
        VolumeState, VolumeType,
    };

    fn tag(key: &str, value: &str) -> Tag {
        Tag::builder().key(key).value(value).build()
    }

    #[test]
    fn tag_filters_use_tag_prefix_and_all_values() {
        let filters = tag_filters(&[TagFilter {
            key: "role".to_string(),
            values: vec!["hadoop".to_string(), "hbase".to_string()],
        }]);

        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].name(), Some("tag:role"));
        assert_eq!(filters[0].values(), ["hadoop", "hbase"]);
    }

    #[test]
    fn instance_summary_copies_fields() {
        let inst = Instance::builder()
            .instance_id("i-0abc123")
            .image_id("ami-12345")
            .instance_type(InstanceType::T3Micro)
            .state(
                InstanceState::builder()
                    .name(InstanceStateName::Running)
                    .build(),
            )
            .placement(Placement::builder().availability_zone("us-west-2a").build())
            .private_ip_address("10.0.0.12")
            .launch_time(AwsDateTime::from_secs(1_700_000_000))
            .tags(tag("role", "hadoop"))
            .build();

        let summary = InstanceSummary::from(&inst);

        assert_eq!(summary.instance_id, "i-0abc123");
        assert_eq!(summary.image_id.as_deref(), Some("ami-12345"));
        assert_eq!(summary.instance_type.as_deref(), Some("t3.micro"));
        assert_eq!(summary.state.as_deref(), Some("running"));
        assert_eq!(summary.availability_zone.as_deref(), Some("us-west-2a"));
        assert_eq!(summary.private_ip_address.as_deref(), Some("10.0.0.12"));
        assert!(summary.public_ip_address.is_none());
        assert_eq!(
            summary.launch_time.unwrap().timestamp(),
            1_700_000_000
        );
        assert_eq!(
            summary.tags,
            vec![ResourceTag {
                key: "role".to_string(),
                value: "hadoop".to_string(),
            }]
        );
    }

    #[test]
    fn volume_summary_copies_fields_and_attachments() {
        let vol = Volume::builder()
            .volume_id("vol-0def456")
            .volume_type(VolumeType::Gp3)
            .state(VolumeState::InUse)
            .size(100)
            .availability_zone("us-west-2a")
            .encrypted(true)
            .create_time(AwsDateTime::from_secs(1_650_000_000))
            .attachments(
                VolumeAttachment::builder()
                    .instance_id("i-0abc123")
                    .device("/dev/sdf")
                    .state(VolumeAttachmentState::Attached)
                    .build(),
            )
            .tags(tag("stack_name", "test"))
            .build();

        let summary = VolumeSummary::from(&vol);

        assert_eq!(summary.volume_id, "vol-0def456");
        assert_eq!(summary.volume_type.as_deref(), Some("gp3"));
        assert_eq!(summary.state.as_deref(), Some("in-use"));
        assert_eq!(summary.size_gib, Some(100));
        assert_eq!(summary.encrypted, Some(true));
        assert_eq!(summary.attachments.len(), 1);
        assert_eq!(
            summary.attachments[0].instance_id.as_deref(),
            Some("i-0abc123")
        );
        assert_eq!(summary.attachments[0].state.as_deref(), Some("attached"));
    }

    #[test]
    fn timestamps_serialize_as_rfc3339() {
        let summary = InstanceSummary {
            instance_id: "i-0abc123".to_string(),
            image_id: None,
            instance_type: None,
            state: None,
            availability_zone: None,
            private_ip_address: None,
            public_ip_address: None,
            launch_time: DateTime::from_timestamp(1_700_000_000, 0),
            tags: Vec::new(),
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["launch_time"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn summaries_roundtrip_through_json() {
        let summary = VolumeSummary {
            volume_id: "vol-1".to_string(),
            volume_type: Some("gp2".to_string()),
            state: Some("available".to_string()),
            size_gib: Some(8),
            availability_zone: Some("eu-west-1b".to_string()),
            encrypted: Some(false),
            create_time: DateTime::from_timestamp(1_600_000_000, 0),
            attachments: Vec::new(),
            tags: vec![ResourceTag {
                key: "env".to_string(),
                value: "prod".to_string(),
            }],
        };

        let json = serde_json::to_string(&summary).unwrap();
        let back: VolumeSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
